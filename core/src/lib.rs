#![deny(missing_docs)]

//! # Typeforge Core
//!
//! Resolution engine that turns an OpenAPI document into a normalized,
//! language-agnostic type and validation model.
//!
//! The pipeline: reference resolution (local pointers plus cached external
//! documents), schema-composition resolution (`allOf` merge, `oneOf`
//! discriminated families, `anyOf` unions), type mapping into target
//! descriptors, and validation-directive synthesis, including a small
//! conditional-expression language with its own parser, evaluator, and
//! result cache.

/// Shared error types.
pub mod error;

/// OpenAPI document handling: models, pointers, store, composition, batch.
pub mod oas;

/// Resolved schema -> target type descriptor mapping.
pub mod type_mapper;

/// Validation rule registry and directive synthesis.
pub mod validation;

/// Conditional expression parsing and evaluation.
pub mod condition;

pub use condition::{
    evaluate_condition, parse_condition, ConditionData, ConditionEngine, ConditionEngineConfig,
    ConditionExpression,
};
pub use error::{EngineError, EngineResult, ErrorCode};
pub use oas::{
    load_document, resolve_document, resolve_document_str, resolve_schema, DocumentContext,
    DocumentResolution, RawSchema, ReferenceStore, ReferenceStoreConfig, ResolvedSchema,
    SchemaKind, SchemaOrRef,
};
pub use type_mapper::{map_type, FieldDescriptor, RecordType, SumType, TypeDescriptor};
pub use validation::{
    synthesize, type_and_validations_for, RuleRegistry, SynthesizedValidations,
    ValidationDirective, ValidationRule,
};
