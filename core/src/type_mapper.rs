#![deny(missing_docs)]

//! # Type Mapping
//!
//! Converts a [`ResolvedSchema`] into a language-agnostic [`TypeDescriptor`]
//! from which target-language source can be rendered.
//!
//! Primitives refine by `format` (string formats, integer widths, number
//! precisions). Objects become named records or open string-keyed maps.
//! `oneOf` families become closed sum types; `anyOf` unions become open
//! wrapper types. Schemas that declare nothing at all map to the explicit
//! `Dynamic` descriptor so downstream renderers must handle them
//! deliberately.

use crate::error::{EngineError, EngineResult, ErrorCode};
use crate::oas::models::{ResolvedSchema, SchemaKind};
use heck::ToPascalCase;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// String refinements keyed off `format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StringFormat {
    /// No format refinement.
    Plain,
    /// `format: email`.
    Email,
    /// `format: date`.
    Date,
    /// `format: date-time`.
    DateTime,
    /// `format: uuid`.
    Uuid,
    /// `format: uri`.
    Uri,
    /// `format: byte` / `format: binary`.
    Binary,
}

/// Integer widths keyed off `format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IntegerWidth {
    /// Default 32-bit integer.
    I32,
    /// `format: int64`.
    I64,
}

/// Number precisions keyed off `format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NumberFormat {
    /// `format: float`.
    Float,
    /// `format: double`.
    Double,
    /// No format: arbitrary-precision decimal.
    Decimal,
}

/// A field of a record, variant, or base carrier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    /// Property name as declared in the document.
    pub name: String,
    /// Mapped field type.
    pub ty: TypeDescriptor,
    /// Whether the owning schema lists the field as required.
    pub required: bool,
    /// Whether the field may be null (nullable schema or not required).
    pub nullable: bool,
    /// Property description.
    pub description: Option<String>,
    /// Default value, when declared.
    pub default: Option<JsonValue>,
}

/// A named record type with ordered fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordType {
    /// Pascal-cased type name.
    pub name: String,
    /// Ordered fields.
    pub fields: Vec<FieldDescriptor>,
}

/// A closed sum type produced from a `oneOf` family.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SumType {
    /// Pascal-cased family name.
    pub name: String,
    /// Discriminator property name; lives only on the base carrier.
    pub discriminator: String,
    /// Base carrier holding the common fields (discriminator included).
    pub base: RecordType,
    /// One variant per member: common fields plus its own, minus the
    /// discriminator.
    pub variants: Vec<RecordType>,
}

/// An open wrapper type produced from an `anyOf` union: an opaque value plus
/// the set of variant names it is known to satisfy, with one named
/// constructor per variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnionWrapper {
    /// Pascal-cased wrapper name.
    pub name: String,
    /// Constructor names, one per union member.
    pub variants: Vec<String>,
}

/// The language-agnostic target type of a resolved schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TypeDescriptor {
    /// Text, refined by format.
    String(StringFormat),
    /// Integer, refined by width.
    Integer(IntegerWidth),
    /// Floating or arbitrary-precision number.
    Number(NumberFormat),
    /// Boolean.
    Boolean,
    /// Ordered sequence of elements.
    Sequence(Box<TypeDescriptor>),
    /// Named record with declared fields.
    Record(RecordType),
    /// Generic string-keyed map (object without declared properties).
    StringMap,
    /// Closed discriminated sum type.
    SumType(SumType),
    /// Open union wrapper.
    UnionWrapper(UnionWrapper),
    /// Open/dynamic type for schemas that declare nothing. Downstream
    /// renderers must handle this explicitly.
    Dynamic,
}

/// Maps a resolved schema to its target type descriptor.
///
/// `path` names the schema's position in the document and seeds generated
/// type names when the schema has no title.
pub fn map_type(schema: &ResolvedSchema, path: &[String]) -> EngineResult<TypeDescriptor> {
    match &schema.kind {
        SchemaKind::Primitive(token) => map_primitive(token, schema, path),
        SchemaKind::Array(element) => {
            let mut item_path = path.to_vec();
            item_path.push("items".to_string());
            Ok(TypeDescriptor::Sequence(Box::new(map_type(
                element, &item_path,
            )?)))
        }
        SchemaKind::Object {
            properties,
            required,
        } => {
            if properties.is_empty() {
                return Ok(TypeDescriptor::StringMap);
            }
            Ok(TypeDescriptor::Record(RecordType {
                name: type_name(schema, path),
                fields: map_fields(properties, required, path)?,
            }))
        }
        SchemaKind::OneOfFamily {
            discriminator,
            properties,
            required,
            variants,
        } => {
            let family_name = type_name(schema, path);
            let base = RecordType {
                name: family_name.clone(),
                fields: map_fields(properties, required, path)?,
            };

            let mut variant_records = Vec::with_capacity(variants.len());
            for variant in variants {
                let mut fields: Vec<FieldDescriptor> = base
                    .fields
                    .iter()
                    .filter(|f| f.name != *discriminator)
                    .cloned()
                    .collect();

                if let Some(own_props) = variant.schema.properties() {
                    let own_required = variant.schema.required().unwrap_or(&[]);
                    let mut variant_path = path.to_vec();
                    variant_path.push(variant.name.clone());
                    let own_fields =
                        map_fields_filtered(own_props, own_required, &variant_path, |name| {
                            name != discriminator.as_str()
                                && !fields.iter().any(|f| f.name == name)
                        })?;
                    fields.extend(own_fields);
                }

                variant_records.push(RecordType {
                    name: variant.name.to_pascal_case(),
                    fields,
                });
            }

            Ok(TypeDescriptor::SumType(SumType {
                name: family_name,
                discriminator: discriminator.clone(),
                base,
                variants: variant_records,
            }))
        }
        SchemaKind::AnyOfUnion { variants, .. } => Ok(TypeDescriptor::UnionWrapper(UnionWrapper {
            name: type_name(schema, path),
            variants: variants.iter().map(|v| v.name.to_pascal_case()).collect(),
        })),
        SchemaKind::Any => Ok(TypeDescriptor::Dynamic),
    }
}

fn map_primitive(
    token: &str,
    schema: &ResolvedSchema,
    path: &[String],
) -> EngineResult<TypeDescriptor> {
    match token {
        "string" => Ok(TypeDescriptor::String(match schema.format.as_deref() {
            Some("email") => StringFormat::Email,
            Some("date") => StringFormat::Date,
            Some("date-time") => StringFormat::DateTime,
            Some("uuid") => StringFormat::Uuid,
            Some("uri") => StringFormat::Uri,
            Some("byte") | Some("binary") => StringFormat::Binary,
            _ => StringFormat::Plain,
        })),
        "integer" => Ok(TypeDescriptor::Integer(match schema.format.as_deref() {
            Some("int64") => IntegerWidth::I64,
            _ => IntegerWidth::I32,
        })),
        "number" => Ok(TypeDescriptor::Number(match schema.format.as_deref() {
            Some("float") => NumberFormat::Float,
            Some("double") => NumberFormat::Double,
            _ => NumberFormat::Decimal,
        })),
        "boolean" => Ok(TypeDescriptor::Boolean),
        other => Err(EngineError::new(
            ErrorCode::UnsupportedType,
            format!("no target representation for type '{}'", other),
        )
        .at(path.to_vec())
        .with_suggestion("use one of: string, integer, number, boolean, array, object")),
    }
}

fn map_fields(
    properties: &IndexMap<String, ResolvedSchema>,
    required: &[String],
    path: &[String],
) -> EngineResult<Vec<FieldDescriptor>> {
    map_fields_filtered(properties, required, path, |_| true)
}

fn map_fields_filtered(
    properties: &IndexMap<String, ResolvedSchema>,
    required: &[String],
    path: &[String],
    keep: impl Fn(&str) -> bool,
) -> EngineResult<Vec<FieldDescriptor>> {
    let mut fields = Vec::with_capacity(properties.len());
    for (name, prop) in properties {
        if !keep(name) {
            continue;
        }
        let mut field_path = path.to_vec();
        field_path.push("properties".to_string());
        field_path.push(name.clone());

        let is_required = required.contains(name);
        fields.push(FieldDescriptor {
            name: name.clone(),
            ty: map_type(prop, &field_path)?,
            required: is_required,
            nullable: prop.nullable || !is_required,
            description: prop.description.clone(),
            default: prop.default.clone(),
        });
    }
    Ok(fields)
}

/// Derives a type name: the schema title when present, else the last path
/// segment, pascal-cased.
fn type_name(schema: &ResolvedSchema, path: &[String]) -> String {
    schema
        .title
        .clone()
        .or_else(|| path.last().cloned())
        .map(|n| n.to_pascal_case())
        .unwrap_or_else(|| "Anonymous".to_string())
}
