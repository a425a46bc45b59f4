#![deny(missing_docs)]

//! # Schema Models
//!
//! Wire-level and normalized schema representations.
//!
//! - `RawSchema` / `SchemaOrRef`: the as-parsed document nodes, never mutated.
//! - `ReferenceTarget`: a classified `$ref` string (local pointer vs external).
//! - `ResolvedSchema` / `SchemaKind`: the composition- and reference-free
//!   normalized form consumed by type mapping and validation synthesis.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A schema node or a `$ref` to one, as deserialized from the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaOrRef {
    /// A `$ref` object.
    Reference(RawReference),
    /// An inline schema node.
    Schema(Box<RawSchema>),
}

/// A raw `$ref` object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReference {
    /// The reference string, e.g. `#/components/schemas/User` or
    /// `https://example.com/common.yaml#/components/schemas/Address`.
    #[serde(rename = "$ref")]
    pub reference: String,
}

/// The as-parsed schema node. Produced once per document and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RawSchema {
    /// Declared JSON type, when present.
    #[serde(default, rename = "type")]
    pub schema_type: Option<String>,
    /// Format refinement (`email`, `int64`, `date-time`, ...).
    #[serde(default)]
    pub format: Option<String>,
    /// Schema title, also used to name composition variants.
    #[serde(default)]
    pub title: Option<String>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Default value for the instance.
    #[serde(default)]
    pub default: Option<JsonValue>,
    /// Example value.
    #[serde(default)]
    pub example: Option<JsonValue>,
    /// Enumerated allowed values.
    #[serde(default, rename = "enum")]
    pub enum_values: Vec<JsonValue>,

    // Numeric constraints
    /// Inclusive lower bound.
    #[serde(default)]
    pub minimum: Option<f64>,
    /// Inclusive upper bound.
    #[serde(default)]
    pub maximum: Option<f64>,

    // String constraints
    /// Minimum string length.
    #[serde(default, rename = "minLength")]
    pub min_length: Option<u32>,
    /// Maximum string length.
    #[serde(default, rename = "maxLength")]
    pub max_length: Option<u32>,
    /// Regular-expression pattern the string must match.
    #[serde(default)]
    pub pattern: Option<String>,

    // Array constraints
    /// Minimum element count.
    #[serde(default, rename = "minItems")]
    pub min_items: Option<u32>,
    /// Maximum element count.
    #[serde(default, rename = "maxItems")]
    pub max_items: Option<u32>,
    /// Element schema for arrays.
    #[serde(default)]
    pub items: Option<Box<SchemaOrRef>>,

    // Object shape
    /// Declared properties, insertion order preserved.
    #[serde(default)]
    pub properties: IndexMap<String, SchemaOrRef>,
    /// Names of required properties.
    #[serde(default)]
    pub required: Vec<String>,

    // Composition keywords. `Some(vec![])` is distinct from absence: an
    // explicitly empty `anyOf` is a hard error rather than a plain schema.
    /// `allOf` members.
    #[serde(default, rename = "allOf")]
    pub all_of: Option<Vec<SchemaOrRef>>,
    /// `oneOf` members.
    #[serde(default, rename = "oneOf")]
    pub one_of: Option<Vec<SchemaOrRef>>,
    /// `anyOf` members.
    #[serde(default, rename = "anyOf")]
    pub any_of: Option<Vec<SchemaOrRef>>,
    /// Discriminator for `oneOf` families.
    #[serde(default)]
    pub discriminator: Option<Discriminator>,

    /// OpenAPI 3.0 nullability flag.
    #[serde(default)]
    pub nullable: Option<bool>,

    /// Validation extension metadata.
    #[serde(default, rename = "x-validation")]
    pub x_validation: Option<XValidation>,
}

/// Discriminator object: selects which `oneOf` variant an instance represents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discriminator {
    /// Name of the property whose value selects the variant.
    #[serde(rename = "propertyName")]
    pub property_name: String,
    /// Optional explicit mapping from discriminator value to `$ref` target.
    #[serde(default)]
    pub mapping: IndexMap<String, String>,
}

/// The `x-validation` extension block attached to a schema or property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct XValidation {
    /// Names of registered custom rules to apply.
    #[serde(default, rename = "customRules")]
    pub custom_rules: Vec<String>,
    /// Rules that apply only when a condition holds at runtime.
    #[serde(default, rename = "conditionalRules")]
    pub conditional_rules: Vec<RawConditionalRule>,
    /// Cross-field equality over a named set of sibling fields.
    #[serde(default, rename = "fieldEquality")]
    pub field_equality: Option<FieldEqualityRule>,
    /// Cross-field presence dependencies.
    #[serde(default)]
    pub dependencies: Vec<RawFieldDependency>,
}

/// A conditional rule as written in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawConditionalRule {
    /// Optional stable identifier; positional when omitted.
    #[serde(default)]
    pub id: Option<String>,
    /// Condition expression text.
    pub condition: String,
    /// Names of validation rules applied when the condition holds.
    #[serde(default)]
    pub validations: Vec<String>,
    /// Optional message override.
    #[serde(default)]
    pub message: Option<String>,
    /// Higher priority rules are evaluated first.
    #[serde(default)]
    pub priority: i32,
}

/// Cross-field equality rule: the named sibling fields must carry equal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEqualityRule {
    /// Names of the sibling fields that must match.
    pub fields: Vec<String>,
    /// Optional message override.
    #[serde(default)]
    pub message: Option<String>,
}

/// How a field dependency binds the target field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyKind {
    /// Target must be present when the source is present.
    Required,
    /// Target may be present when the source is present.
    Optional,
    /// Target must be absent when the source is present.
    Forbidden,
    /// Target presence is governed by the attached condition.
    Conditional,
}

/// A field dependency as written in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFieldDependency {
    /// Field whose presence triggers the dependency.
    #[serde(rename = "sourceField")]
    pub source_field: String,
    /// Field the dependency constrains.
    #[serde(rename = "targetField")]
    pub target_field: String,
    /// Dependency kind.
    pub kind: DependencyKind,
    /// Condition text for `Conditional` dependencies.
    #[serde(default)]
    pub condition: Option<String>,
}

/// A classified `$ref` target.
///
/// References are never mutated; they are resolved to a `ResolvedSchema` on
/// demand and may be cached by the reference store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceTarget {
    /// A `#/json/pointer` inside the current document.
    Local {
        /// JSON pointer, without the leading `#`.
        pointer: String,
    },
    /// A reference into another document, by URL or filesystem path.
    External {
        /// URL or filesystem path of the target document.
        location: String,
        /// Optional JSON pointer inside the target document.
        fragment: Option<String>,
    },
}

impl ReferenceTarget {
    /// Classifies a `$ref` string into local and external forms.
    pub fn parse(ref_str: &str) -> Self {
        if let Some(pointer) = ref_str.strip_prefix('#') {
            return ReferenceTarget::Local {
                pointer: pointer.to_string(),
            };
        }
        match ref_str.split_once('#') {
            Some((location, fragment)) => ReferenceTarget::External {
                location: location.to_string(),
                fragment: if fragment.is_empty() {
                    None
                } else {
                    Some(fragment.to_string())
                },
            },
            None => ReferenceTarget::External {
                location: ref_str.to_string(),
                fragment: None,
            },
        }
    }
}

/// A named member of a `oneOf` family or `anyOf` union.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaVariant {
    /// Variant name: discriminator-mapping key, member title, `$ref` target
    /// name, or a positional fallback, in that order of preference.
    pub name: String,
    /// The resolved member schema.
    pub schema: ResolvedSchema,
}

/// The concrete shape of a resolved schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SchemaKind {
    /// A declared scalar type, carrying the raw type token
    /// (`string`, `integer`, `number`, `boolean`, or an unrecognized value
    /// the type mapper will reject).
    Primitive(String),
    /// An ordered sequence of elements.
    Array(Box<ResolvedSchema>),
    /// An object with declared properties.
    Object {
        /// Properties by name, insertion order preserved, names unique.
        properties: IndexMap<String, ResolvedSchema>,
        /// Required property names.
        required: Vec<String>,
    },
    /// A discriminated `oneOf` family.
    OneOfFamily {
        /// Discriminator property name; lives on the base carrier.
        discriminator: String,
        /// Common fields shared by all variants (discriminator included).
        properties: IndexMap<String, ResolvedSchema>,
        /// Required names on the base carrier.
        required: Vec<String>,
        /// Ordered variant list.
        variants: Vec<SchemaVariant>,
    },
    /// An `anyOf` union.
    AnyOfUnion {
        /// Union of all members' properties, first seen wins.
        properties: IndexMap<String, ResolvedSchema>,
        /// Required names as produced by the anyOf required policy.
        required: Vec<String>,
        /// Ordered member list.
        variants: Vec<SchemaVariant>,
    },
    /// A schema with no declared type and no distinguishing shape.
    /// Maps to the dynamic type descriptor rather than failing.
    Any,
}

/// The composition-free, reference-free normalized schema form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSchema {
    /// Concrete shape.
    pub kind: SchemaKind,
    /// Title carried from the source node.
    pub title: Option<String>,
    /// Description carried from the source node.
    pub description: Option<String>,
    /// Example carried from the source node.
    pub example: Option<JsonValue>,
    /// Default value carried from the source node.
    pub default: Option<JsonValue>,
    /// Whether the instance may be null.
    pub nullable: bool,
    /// Format refinement carried from the source node.
    pub format: Option<String>,
    /// Enumerated allowed values.
    pub enum_values: Vec<JsonValue>,
    /// Inclusive numeric lower bound.
    pub minimum: Option<f64>,
    /// Inclusive numeric upper bound.
    pub maximum: Option<f64>,
    /// Minimum string length.
    pub min_length: Option<u32>,
    /// Maximum string length.
    pub max_length: Option<u32>,
    /// String pattern.
    pub pattern: Option<String>,
    /// Minimum array element count.
    pub min_items: Option<u32>,
    /// Maximum array element count.
    pub max_items: Option<u32>,
    /// Validation extension metadata carried from the source node.
    pub x_validation: Option<XValidation>,
}

impl ResolvedSchema {
    /// Creates a resolved schema of the given kind with empty metadata.
    pub fn of_kind(kind: SchemaKind) -> Self {
        Self {
            kind,
            title: None,
            description: None,
            example: None,
            default: None,
            nullable: false,
            format: None,
            enum_values: Vec::new(),
            minimum: None,
            maximum: None,
            min_length: None,
            max_length: None,
            pattern: None,
            min_items: None,
            max_items: None,
            x_validation: None,
        }
    }

    /// Returns the object-like property map, when the kind carries one.
    pub fn properties(&self) -> Option<&IndexMap<String, ResolvedSchema>> {
        match &self.kind {
            SchemaKind::Object { properties, .. }
            | SchemaKind::OneOfFamily { properties, .. }
            | SchemaKind::AnyOfUnion { properties, .. } => Some(properties),
            _ => None,
        }
    }

    /// Returns the required-name set, when the kind carries one.
    pub fn required(&self) -> Option<&[String]> {
        match &self.kind {
            SchemaKind::Object { required, .. }
            | SchemaKind::OneOfFamily { required, .. }
            | SchemaKind::AnyOfUnion { required, .. } => Some(required),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_target_local() {
        let target = ReferenceTarget::parse("#/components/schemas/User");
        assert_eq!(
            target,
            ReferenceTarget::Local {
                pointer: "/components/schemas/User".to_string()
            }
        );
    }

    #[test]
    fn test_reference_target_external_with_fragment() {
        let target = ReferenceTarget::parse("https://example.com/common.yaml#/components/schemas/Address");
        assert_eq!(
            target,
            ReferenceTarget::External {
                location: "https://example.com/common.yaml".to_string(),
                fragment: Some("/components/schemas/Address".to_string()),
            }
        );
    }

    #[test]
    fn test_reference_target_external_whole_document() {
        let target = ReferenceTarget::parse("./schemas/base.json");
        assert_eq!(
            target,
            ReferenceTarget::External {
                location: "./schemas/base.json".to_string(),
                fragment: None,
            }
        );
    }

    #[test]
    fn test_raw_schema_deserializes_wire_casing() {
        let yaml = r#"
type: string
minLength: 2
maxLength: 10
x-validation:
  customRules: [strong-password]
"#;
        let schema: RawSchema = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(schema.schema_type.as_deref(), Some("string"));
        assert_eq!(schema.min_length, Some(2));
        assert_eq!(schema.max_length, Some(10));
        let xv = schema.x_validation.unwrap();
        assert_eq!(xv.custom_rules, vec!["strong-password".to_string()]);
    }

    #[test]
    fn test_schema_or_ref_untagged() {
        let json = r##"{"$ref": "#/components/schemas/User"}"##;
        let node: SchemaOrRef = serde_json::from_str(json).unwrap();
        assert!(matches!(node, SchemaOrRef::Reference(_)));

        let json = r#"{"type": "object", "properties": {"id": {"type": "integer"}}}"#;
        let node: SchemaOrRef = serde_json::from_str(json).unwrap();
        assert!(matches!(node, SchemaOrRef::Schema(_)));
    }
}
