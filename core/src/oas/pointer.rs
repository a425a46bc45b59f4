#![deny(missing_docs)]

//! # Local Pointer Resolution
//!
//! Walks `#/...` JSON-pointer paths inside an in-memory document.
//!
//! These helpers never fetch external documents; external `$ref` targets go
//! through the reference store and come back here for their fragment part.

use crate::error::{EngineError, EngineResult, ErrorCode};
use percent_encoding::percent_decode_str;
use serde_json::Value as JsonValue;

/// Decodes a JSON Pointer segment (handles `~1`, `~0`, and percent encoding).
pub(crate) fn decode_pointer_segment(segment: &str) -> String {
    let decoded = segment.replace("~1", "/").replace("~0", "~");
    percent_decode_str(&decoded)
        .decode_utf8_lossy()
        .into_owned()
}

/// Splits a pointer into decoded segments.
///
/// Accepts `#/a/b`, `/a/b`, or `a/b`; an empty pointer yields no segments.
pub fn pointer_segments(pointer: &str) -> Vec<String> {
    let trimmed = pointer
        .trim_start_matches('#')
        .trim_start_matches('/');
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.split('/').map(decode_pointer_segment).collect()
}

/// Resolves a JSON pointer against a document root.
///
/// Fails with `REFERENCE_NOT_FOUND` carrying the breadcrumb of segments
/// walked so far, so diagnostics name the exact missing step.
pub fn resolve_pointer<'a>(root: &'a JsonValue, pointer: &str) -> EngineResult<&'a JsonValue> {
    let segments = pointer_segments(pointer);
    let mut current = root;
    let mut walked: Vec<String> = Vec::with_capacity(segments.len());

    for segment in segments {
        walked.push(segment.clone());
        current = match current {
            JsonValue::Object(map) => map.get(&segment).ok_or_else(|| {
                EngineError::new(
                    ErrorCode::ReferenceNotFound,
                    format!("pointer segment '{}' not found", segment),
                )
                .at(walked.clone())
                .with_suggestion(format!(
                    "check that '#/{}' exists in the document",
                    walked.join("/")
                ))
            })?,
            JsonValue::Array(items) => {
                let index: usize = segment.parse().map_err(|_| {
                    EngineError::new(
                        ErrorCode::ReferenceNotFound,
                        format!("pointer segment '{}' is not an array index", segment),
                    )
                    .at(walked.clone())
                })?;
                items.get(index).ok_or_else(|| {
                    EngineError::new(
                        ErrorCode::ReferenceNotFound,
                        format!("array index {} out of bounds", index),
                    )
                    .at(walked.clone())
                })?
            }
            _ => {
                return Err(EngineError::new(
                    ErrorCode::ReferenceNotFound,
                    format!("cannot descend into scalar at '{}'", segment),
                )
                .at(walked));
            }
        };
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_simple_pointer() {
        let doc = json!({"components": {"schemas": {"User": {"type": "object"}}}});
        let node = resolve_pointer(&doc, "#/components/schemas/User").unwrap();
        assert_eq!(node, &json!({"type": "object"}));
    }

    #[test]
    fn test_resolve_empty_pointer_is_root() {
        let doc = json!({"a": 1});
        let node = resolve_pointer(&doc, "#").unwrap();
        assert_eq!(node, &doc);
    }

    #[test]
    fn test_resolve_array_index() {
        let doc = json!({"items": [{"id": 1}, {"id": 2}]});
        let node = resolve_pointer(&doc, "/items/1/id").unwrap();
        assert_eq!(node, &json!(2));
    }

    #[test]
    fn test_missing_segment_reports_breadcrumb() {
        let doc = json!({"components": {"schemas": {}}});
        let err = resolve_pointer(&doc, "#/components/schemas/Ghost").unwrap_err();
        assert_eq!(err.code, ErrorCode::ReferenceNotFound);
        assert_eq!(
            err.schema_path,
            vec!["components".to_string(), "schemas".to_string(), "Ghost".to_string()]
        );
    }

    #[test]
    fn test_decode_pointer_segment_escapes() {
        assert_eq!(decode_pointer_segment("a~1b"), "a/b");
        assert_eq!(decode_pointer_segment("a~0b"), "a~b");
        assert_eq!(decode_pointer_segment("User%20Profile"), "User Profile");
    }
}
