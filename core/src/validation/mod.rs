#![deny(missing_docs)]

//! # Validation Module
//!
//! - **rules**: the named-rule registry (built-ins plus runtime registrations).
//! - **synthesizer**: the directive synthesis pipeline.
//! - **conditional**: conditional-rule and field-dependency collections.

pub mod conditional;
pub mod rules;
pub mod synthesizer;

pub use conditional::{
    ConditionalRuleSet, ConditionalValidationRule, FieldDependency, FieldDependencySet,
};
pub use rules::{RuleRegistry, ValidationRule};
pub use synthesizer::{
    synthesize, type_and_validations_for, SynthesizedValidations, ValidationDirective,
};
