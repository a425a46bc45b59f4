#![deny(missing_docs)]

//! # Document Resolution
//!
//! Root-document parsing and validation, plus the batch entry point that
//! resolves every schema under `components.schemas`.
//!
//! Batch resolution fans out across a small bounded worker pool. Completion
//! order is not guaranteed; the aggregate output is keyed by schema name and
//! reassembled in declaration order. Failures are isolated per schema name:
//! one broken schema never aborts its siblings, and every failure is
//! recorded and surfaced.

use crate::error::{EngineError, EngineResult, ErrorCode};
use crate::oas::composition::{resolve_schema, DocumentContext};
use crate::oas::models::{ResolvedSchema, SchemaOrRef};
use crate::oas::store::ReferenceStore;
use futures_util::stream::{self, StreamExt};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Lower bound of the resolution worker pool.
const MIN_WORKERS: usize = 2;
/// Upper bound of the resolution worker pool.
const MAX_WORKERS: usize = 8;

/// The aggregate output of batch resolution.
///
/// `schemas` is keyed by schema name (declaration order); callers must not
/// rely on any completion ordering beyond that.
#[derive(Debug, Default)]
pub struct DocumentResolution {
    /// Successfully resolved schemas by name.
    pub schemas: IndexMap<String, ResolvedSchema>,
    /// Per-schema failures by name. Recorded, never silently dropped.
    pub failures: IndexMap<String, EngineError>,
}

/// Parses document text as JSON or YAML and validates the root.
pub fn load_document(text: &str) -> EngineResult<JsonValue> {
    let document: JsonValue = serde_json::from_str(text)
        .or_else(|_| serde_yaml::from_str(text))
        .map_err(|e: serde_yaml::Error| {
            EngineError::new(
                ErrorCode::InvalidDocument,
                format!("document is neither valid JSON nor YAML: {}", e),
            )
        })?;
    validate_root(&document)?;
    Ok(document)
}

/// Validates the mandatory top-level fields of a root document.
///
/// Failures here are fatal for the whole resolution: a missing version field
/// or info block means the input is not a usable specification.
pub fn validate_root(document: &JsonValue) -> EngineResult<()> {
    if !document.is_object() {
        return Err(EngineError::new(
            ErrorCode::InvalidDocument,
            "document root is not an object".to_string(),
        ));
    }

    let version = document
        .get("openapi")
        .or_else(|| document.get("swagger"))
        .and_then(|v| v.as_str());
    let Some(version) = version else {
        return Err(EngineError::new(
            ErrorCode::MissingField,
            "missing top-level version field".to_string(),
        )
        .with_suggestion("add an 'openapi: 3.x' field to the document root"));
    };
    if !version.starts_with("3.") {
        return Err(EngineError::new(
            ErrorCode::UnsupportedVersion,
            format!("unsupported specification version '{}'", version),
        )
        .with_suggestion("only 3.x documents are supported"));
    }

    let info = document.get("info");
    if info
        .and_then(|i| i.get("title"))
        .and_then(|t| t.as_str())
        .is_none()
    {
        return Err(EngineError::new(
            ErrorCode::MissingField,
            "missing required field: info.title".to_string(),
        )
        .at(vec!["info".to_string(), "title".to_string()]));
    }
    if info
        .and_then(|i| i.get("version"))
        .and_then(|v| v.as_str())
        .is_none()
    {
        return Err(EngineError::new(
            ErrorCode::MissingField,
            "missing required field: info.version".to_string(),
        )
        .at(vec!["info".to_string(), "version".to_string()]));
    }

    Ok(())
}

/// Resolves every schema under `components.schemas`.
///
/// Fails only on root-document malformation; reference and composition
/// failures are isolated per schema name and reported in
/// [`DocumentResolution::failures`].
pub async fn resolve_document(
    root: JsonValue,
    store: Option<Arc<ReferenceStore>>,
) -> EngineResult<DocumentResolution> {
    validate_root(&root)?;

    let declared: Vec<(String, JsonValue)> = root
        .get("components")
        .and_then(|c| c.get("schemas"))
        .and_then(|s| s.as_object())
        .map(|schemas| {
            schemas
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default();

    let ctx = match store {
        Some(store) => DocumentContext::with_store(root, store),
        None => DocumentContext::local(root),
    };

    let workers = declared.len().clamp(MIN_WORKERS, MAX_WORKERS);
    let order: Vec<String> = declared.iter().map(|(name, _)| name.clone()).collect();

    let mut outcomes: IndexMap<String, EngineResult<ResolvedSchema>> =
        stream::iter(declared.into_iter().map(|(name, value)| {
            let ctx = ctx.clone();
            async move {
                let outcome = resolve_named_schema(&name, value, &ctx).await;
                (name, outcome)
            }
        }))
        .buffer_unordered(workers)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect();

    // Reassemble in declaration order so the output is deterministic.
    let mut resolution = DocumentResolution::default();
    for name in order {
        match outcomes.shift_remove(&name) {
            Some(Ok(schema)) => {
                resolution.schemas.insert(name, schema);
            }
            Some(Err(err)) => {
                tracing::warn!(schema = %name, error = %err, "schema failed to resolve");
                resolution.failures.insert(name, err);
            }
            None => {}
        }
    }

    tracing::debug!(
        resolved = resolution.schemas.len(),
        failed = resolution.failures.len(),
        "batch resolution finished"
    );
    Ok(resolution)
}

/// Convenience wrapper: parse text, validate, and resolve in one call.
pub async fn resolve_document_str(
    text: &str,
    store: Option<Arc<ReferenceStore>>,
) -> EngineResult<DocumentResolution> {
    let root = load_document(text)?;
    resolve_document(root, store).await
}

async fn resolve_named_schema(
    name: &str,
    value: JsonValue,
    ctx: &DocumentContext,
) -> EngineResult<ResolvedSchema> {
    let path = vec![
        "components".to_string(),
        "schemas".to_string(),
        name.to_string(),
    ];
    let node: SchemaOrRef = serde_json::from_value(value).map_err(|e| {
        EngineError::new(
            ErrorCode::ParseFailed,
            format!("schema '{}' is not a valid schema object: {}", name, e),
        )
        .at(path.clone())
    })?;
    resolve_schema(&node, ctx, &path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oas::models::SchemaKind;
    use serde_json::json;

    fn valid_doc(schemas: JsonValue) -> JsonValue {
        json!({
            "openapi": "3.0.3",
            "info": {"title": "Test API", "version": "1.0.0"},
            "components": {"schemas": schemas}
        })
    }

    #[test]
    fn test_load_document_accepts_json_and_yaml() {
        let json_text = r#"{"openapi": "3.1.0", "info": {"title": "T", "version": "1"}}"#;
        assert!(load_document(json_text).is_ok());

        let yaml_text = "openapi: 3.1.0\ninfo:\n  title: T\n  version: '1'\n";
        assert!(load_document(yaml_text).is_ok());
    }

    #[test]
    fn test_missing_version_field_is_fatal() {
        let err = load_document("info:\n  title: T\n  version: '1'\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingField);
    }

    #[test]
    fn test_non_3x_version_is_rejected() {
        let err = load_document("swagger: '2.0'\ninfo:\n  title: T\n  version: '1'\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedVersion);
    }

    #[test]
    fn test_missing_info_title_names_the_field() {
        let err = load_document("openapi: 3.0.0\ninfo:\n  version: '1'\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingField);
        assert_eq!(err.schema_path, vec!["info".to_string(), "title".to_string()]);
    }

    #[tokio::test]
    async fn test_batch_resolution_isolates_failures() {
        let doc = valid_doc(json!({
            "Good": {"type": "object", "properties": {"id": {"type": "integer"}}},
            "Broken": {"oneOf": [{"type": "object"}, {"type": "object"}]},
            "AlsoGood": {"type": "string"}
        }));

        let resolution = resolve_document(doc, None).await.unwrap();

        assert_eq!(resolution.schemas.len(), 2);
        assert!(resolution.schemas.contains_key("Good"));
        assert!(resolution.schemas.contains_key("AlsoGood"));
        assert_eq!(resolution.failures.len(), 1);
        assert_eq!(
            resolution.failures["Broken"].code,
            ErrorCode::OneOfMissingDiscriminator
        );
    }

    #[tokio::test]
    async fn test_batch_output_keeps_declaration_order() {
        let doc = valid_doc(json!({
            "Zebra": {"type": "string"},
            "Apple": {"type": "integer"},
            "Mango": {"type": "boolean"}
        }));

        let resolution = resolve_document(doc, None).await.unwrap();
        let names: Vec<&str> = resolution.schemas.keys().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["Zebra", "Apple", "Mango"]);
    }

    #[tokio::test]
    async fn test_failure_path_names_the_schema() {
        let doc = valid_doc(json!({
            "Order": {"$ref": "#/components/schemas/Missing"}
        }));

        let resolution = resolve_document(doc, None).await.unwrap();
        let err = &resolution.failures["Order"];
        assert_eq!(err.code, ErrorCode::ReferenceNotFound);
        assert_eq!(
            err.schema_path,
            vec!["components".to_string(), "schemas".to_string(), "Order".to_string()]
        );
    }

    #[tokio::test]
    async fn test_document_without_schemas_resolves_empty() {
        let doc = json!({
            "openapi": "3.0.3",
            "info": {"title": "T", "version": "1"}
        });
        let resolution = resolve_document(doc, None).await.unwrap();
        assert!(resolution.schemas.is_empty());
        assert!(resolution.failures.is_empty());
    }

    #[tokio::test]
    async fn test_schema_kind_survives_batch() {
        let doc = valid_doc(json!({
            "Tag": {"type": "string", "enum": ["a", "b"]}
        }));
        let resolution = resolve_document(doc, None).await.unwrap();
        let tag = &resolution.schemas["Tag"];
        assert!(matches!(&tag.kind, SchemaKind::Primitive(t) if t == "string"));
        assert_eq!(tag.enum_values.len(), 2);
    }
}
