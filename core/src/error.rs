#![deny(missing_docs)]

//! # Error Handling
//!
//! Provides the `EngineError` type surfaced across the engine boundary.
//!
//! Every error carries a stable machine-readable code, the schema path from
//! the document root to the failing node, and an optional remediation
//! suggestion. Errors may wrap a lower-level cause.

use derive_more::Display;
use std::fmt;

/// Stable machine-readable error codes.
///
/// The `Display` form is the wire identifier asserted on by callers and tests.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The document could not be read or parsed at all.
    #[display("INVALID_DOCUMENT")]
    InvalidDocument,
    /// A mandatory top-level field (version, `info.title`, `info.version`) is missing.
    #[display("MISSING_FIELD")]
    MissingField,
    /// The document declares a version this engine does not handle.
    #[display("UNSUPPORTED_VERSION")]
    UnsupportedVersion,
    /// A local pointer or external fragment did not resolve to a node.
    #[display("REFERENCE_NOT_FOUND")]
    ReferenceNotFound,
    /// An external document does not exist at the given location.
    #[display("DOCUMENT_NOT_FOUND")]
    DocumentNotFound,
    /// A `$ref` chain revisited a reference already on the resolution path.
    #[display("CIRCULAR_REFERENCE")]
    CircularReference,
    /// The external location's host is not on the configured allow-list.
    #[display("DOMAIN_NOT_ALLOWED")]
    DomainNotAllowed,
    /// An external document could not be fetched after exhausting retries.
    #[display("FETCH_FAILED")]
    FetchFailed,
    /// An external document was fetched but could not be parsed or validated.
    #[display("PARSE_FAILED")]
    ParseFailed,
    /// Two `allOf` members declare the same property with different primitive types.
    #[display("ALL_OF_CONFLICT")]
    AllOfConflict,
    /// A `oneOf` schema lacks `discriminator.propertyName`.
    #[display("ONE_OF_MISSING_DISCRIMINATOR")]
    OneOfMissingDiscriminator,
    /// An `anyOf` schema has no members.
    #[display("ANY_OF_EMPTY")]
    AnyOfEmpty,
    /// The schema declares a `type` the mapper has no target representation for.
    #[display("UNSUPPORTED_TYPE")]
    UnsupportedType,
    /// A property or type was requested that the resolved schema does not carry.
    #[display("MISSING_TYPE")]
    MissingType,
    /// A condition expression could not be tokenized or parsed.
    #[display("CONDITION_SYNTAX")]
    ConditionSyntax,
    /// A named validation rule is not present in the registry.
    #[display("UNKNOWN_RULE")]
    UnknownRule,
}

/// The error payload surfaced to collaborators.
///
/// `schema_path` is the breadcrumb from the document root to the failing node,
/// e.g. `["components", "schemas", "Order", "allOf", "1", "properties", "total"]`.
#[derive(Debug)]
pub struct EngineError {
    /// Human-readable description of the failure.
    pub message: String,
    /// Stable machine-readable code.
    pub code: ErrorCode,
    /// Breadcrumb from document root to the failing node.
    pub schema_path: Vec<String>,
    /// Optional remediation hint.
    pub suggestion: Option<String>,
    /// Optional wrapped lower-level cause.
    pub caused_by: Option<Box<EngineError>>,
}

impl EngineError {
    /// Creates an error with a code and message; path and suggestion start empty.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            schema_path: Vec::new(),
            suggestion: None,
            caused_by: None,
        }
    }

    /// Attaches the schema path breadcrumb.
    pub fn at(mut self, path: impl Into<Vec<String>>) -> Self {
        self.schema_path = path.into();
        self
    }

    /// Attaches a remediation suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Wraps a lower-level cause.
    pub fn caused_by(mut self, cause: EngineError) -> Self {
        self.caused_by = Some(Box::new(cause));
        self
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if !self.schema_path.is_empty() {
            write!(f, " at path: {}", self.schema_path.join("."))?;
        }
        write!(f, " [{}]", self.code)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {}", suggestion)?;
        }
        if let Some(cause) = &self.caused_by {
            write!(f, "\nCaused by: {}", cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for EngineError {}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::new(ErrorCode::FetchFailed, format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::new(ErrorCode::ParseFailed, format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for EngineError {
    fn from(err: serde_yaml::Error) -> Self {
        EngineError::new(ErrorCode::ParseFailed, format!("YAML error: {}", err))
    }
}

/// Helper type alias for Result using EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_path_and_code() {
        let err = EngineError::new(ErrorCode::AllOfConflict, "type clash on 'total'")
            .at(vec![
                "components".to_string(),
                "schemas".to_string(),
                "Order".to_string(),
            ])
            .with_suggestion("align the property types across allOf members");

        let rendered = format!("{}", err);
        assert!(rendered.contains("type clash on 'total'"));
        assert!(rendered.contains("at path: components.schemas.Order"));
        assert!(rendered.contains("[ALL_OF_CONFLICT]"));
        assert!(rendered.contains("Suggestion: align the property types"));
    }

    #[test]
    fn test_cause_chain_rendering() {
        let cause = EngineError::new(ErrorCode::FetchFailed, "connection refused");
        let err = EngineError::new(ErrorCode::ReferenceNotFound, "could not resolve reference")
            .caused_by(cause);

        let rendered = format!("{}", err);
        assert!(rendered.contains("Caused by: connection refused"));
    }

    #[test]
    fn test_io_conversion_maps_to_fetch_failed() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: EngineError = io_err.into();
        assert_eq!(err.code, ErrorCode::FetchFailed);
    }
}
