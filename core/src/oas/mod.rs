#![deny(missing_docs)]

//! # OpenAPI Resolution Module
//!
//! - **models**: wire-level (`RawSchema`) and normalized (`ResolvedSchema`) forms.
//! - **pointer**: local `#/...` JSON-pointer walking.
//! - **store**: external document fetching with a bounded TTL cache.
//! - **composition**: `$ref`/`allOf`/`oneOf`/`anyOf` resolution.
//! - **document**: root validation and batch resolution.

pub mod composition;
pub mod document;
pub mod models;
pub mod pointer;
pub mod store;

pub use composition::{any_of_required_policy, resolve_schema, DocumentContext};
pub use document::{
    load_document, resolve_document, resolve_document_str, validate_root, DocumentResolution,
};
pub use models::{
    DependencyKind, Discriminator, FieldEqualityRule, RawConditionalRule, RawFieldDependency,
    RawReference, RawSchema, ReferenceTarget, ResolvedSchema, SchemaKind, SchemaOrRef,
    SchemaVariant, XValidation,
};
pub use pointer::{pointer_segments, resolve_pointer};
pub use store::{ReferenceStore, ReferenceStoreConfig};
