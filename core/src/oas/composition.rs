#![deny(missing_docs)]

//! # Composition Resolution
//!
//! Turns a graph of `$ref` pointers and composition keywords (`allOf`,
//! `oneOf`, `anyOf`) into a single normalized [`ResolvedSchema`].
//!
//! Handles:
//! - Local pointer and external (store-backed) dereferencing, with a
//!   visited-path guard that fails fast on circular chains.
//! - `allOf` property merging with primitive-type conflict detection.
//! - `oneOf` discriminated families (discriminator mandatory, injected into
//!   the base carrier).
//! - `anyOf` unions (property union, required-name policy).
//!
//! Composition keywords are mutually exclusive per node; when mixed, the
//! first of `allOf` > `oneOf` > `anyOf` wins.

use crate::error::{EngineError, EngineResult, ErrorCode};
use crate::oas::models::{
    Discriminator, RawSchema, ReferenceTarget, ResolvedSchema, SchemaKind, SchemaOrRef,
    SchemaVariant,
};
use crate::oas::pointer::resolve_pointer;
use crate::oas::store::ReferenceStore;
use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// The document a resolution walks, plus the store for external hops.
#[derive(Clone)]
pub struct DocumentContext {
    /// Root of the current document.
    pub root: Arc<JsonValue>,
    /// Store for external references; `None` disables external resolution.
    pub store: Option<Arc<ReferenceStore>>,
    /// Location of the current document, for diagnostics and cycle identity.
    pub location: Option<String>,
}

impl DocumentContext {
    /// Context over an in-memory document with no external resolution.
    pub fn local(root: JsonValue) -> Self {
        Self {
            root: Arc::new(root),
            store: None,
            location: None,
        }
    }

    /// Context over an in-memory document with a reference store attached.
    pub fn with_store(root: JsonValue, store: Arc<ReferenceStore>) -> Self {
        Self {
            root: Arc::new(root),
            store: Some(store),
            location: None,
        }
    }

    fn ref_identity(&self, reference: &str) -> String {
        match &self.location {
            Some(location) => format!("{}::{}", location, reference),
            None => reference.to_string(),
        }
    }
}

/// Resolves a schema node into its normalized, composition-free form.
pub async fn resolve_schema(
    node: &SchemaOrRef,
    ctx: &DocumentContext,
    path: &[String],
) -> EngineResult<ResolvedSchema> {
    resolve_node(node.clone(), ctx.clone(), path.to_vec(), Vec::new()).await
}

/// Boxed recursion: reference hops and nested members re-enter here.
///
/// `visited` is the chain of reference identities on the current resolution
/// path; a revisit is a circular chain and fails fast instead of recursing.
fn resolve_node(
    node: SchemaOrRef,
    ctx: DocumentContext,
    path: Vec<String>,
    visited: Vec<String>,
) -> BoxFuture<'static, EngineResult<ResolvedSchema>> {
    Box::pin(async move {
        match node {
            SchemaOrRef::Reference(raw_ref) => {
                resolve_reference(&raw_ref.reference, ctx, path, visited).await
            }
            SchemaOrRef::Schema(raw) => resolve_raw(*raw, ctx, path, visited).await,
        }
    })
}

async fn resolve_reference(
    reference: &str,
    ctx: DocumentContext,
    path: Vec<String>,
    mut visited: Vec<String>,
) -> EngineResult<ResolvedSchema> {
    let identity = ctx.ref_identity(reference);
    if visited.contains(&identity) {
        return Err(EngineError::new(
            ErrorCode::CircularReference,
            format!("circular reference chain at '{}'", reference),
        )
        .at(path)
        .with_suggestion("break the cycle by extracting the shared part into its own schema"));
    }
    visited.push(identity);

    match ReferenceTarget::parse(reference) {
        ReferenceTarget::Local { pointer } => {
            let target = resolve_pointer(&ctx.root, &pointer).map_err(|e| {
                EngineError::new(
                    ErrorCode::ReferenceNotFound,
                    format!("reference '{}' not found", reference),
                )
                .at(path.clone())
                .caused_by(e)
            })?;
            let next: SchemaOrRef = serde_json::from_value(target.clone()).map_err(|e| {
                EngineError::new(
                    ErrorCode::ParseFailed,
                    format!("reference '{}' target is not a schema: {}", reference, e),
                )
                .at(path.clone())
            })?;
            resolve_node(next, ctx, path, visited).await
        }
        ReferenceTarget::External { location, fragment } => {
            let Some(store) = ctx.store.clone() else {
                return Err(EngineError::new(
                    ErrorCode::FetchFailed,
                    format!("external reference '{}' but no reference store configured", reference),
                )
                .at(path)
                .with_suggestion("attach a ReferenceStore to resolve external documents"));
            };

            let document = store.resolve_document(&location).await.map_err(|e| e.at(path.clone()))?;
            let target = match &fragment {
                Some(pointer) => resolve_pointer(&document, pointer)
                    .map_err(|e| {
                        EngineError::new(
                            ErrorCode::ReferenceNotFound,
                            format!("reference '{}' not found", reference),
                        )
                        .at(path.clone())
                        .caused_by(e)
                    })?
                    .clone(),
                None => (*document).clone(),
            };
            let next: SchemaOrRef = serde_json::from_value(target).map_err(|e| {
                EngineError::new(
                    ErrorCode::ParseFailed,
                    format!("reference '{}' target is not a schema: {}", reference, e),
                )
                .at(path.clone())
            })?;

            let next_ctx = DocumentContext {
                root: document,
                store: Some(store),
                location: Some(location),
            };
            resolve_node(next, next_ctx, path, visited).await
        }
    }
}

async fn resolve_raw(
    raw: RawSchema,
    ctx: DocumentContext,
    path: Vec<String>,
    visited: Vec<String>,
) -> EngineResult<ResolvedSchema> {
    // Mutual exclusivity: first keyword found wins.
    if let Some(members) = raw.all_of.clone() {
        return resolve_all_of(raw, members, ctx, path, visited).await;
    }
    if let Some(members) = raw.one_of.clone() {
        return resolve_one_of(raw, members, ctx, path, visited).await;
    }
    if let Some(members) = raw.any_of.clone() {
        return resolve_any_of(raw, members, ctx, path, visited).await;
    }
    resolve_plain(raw, ctx, path, visited).await
}

/// Resolves a schema node without composition keywords.
async fn resolve_plain(
    raw: RawSchema,
    ctx: DocumentContext,
    path: Vec<String>,
    visited: Vec<String>,
) -> EngineResult<ResolvedSchema> {
    let kind = match raw.schema_type.as_deref() {
        Some("array") => {
            let element = match &raw.items {
                Some(items) => {
                    let mut item_path = path.clone();
                    item_path.push("items".to_string());
                    resolve_node((**items).clone(), ctx.clone(), item_path, visited.clone())
                        .await?
                }
                None => ResolvedSchema::of_kind(SchemaKind::Any),
            };
            SchemaKind::Array(Box::new(element))
        }
        Some("object") => SchemaKind::Object {
            properties: resolve_properties(&raw.properties, &ctx, &path, &visited).await?,
            required: dedup_names(raw.required.clone()),
        },
        Some(other) => SchemaKind::Primitive(other.to_string()),
        None if !raw.properties.is_empty() => SchemaKind::Object {
            properties: resolve_properties(&raw.properties, &ctx, &path, &visited).await?,
            required: dedup_names(raw.required.clone()),
        },
        None => SchemaKind::Any,
    };

    Ok(carry_metadata(&raw, kind))
}

/// `allOf`: merge every member's properties into one object schema.
///
/// The node's own properties seed the accumulator; members then merge in
/// array order. A property re-declared with a different primitive type is a
/// merge conflict naming the property and the member index. Required names
/// union; `title`/`description`/`example` keep the first supplier.
async fn resolve_all_of(
    raw: RawSchema,
    members: Vec<SchemaOrRef>,
    ctx: DocumentContext,
    path: Vec<String>,
    visited: Vec<String>,
) -> EngineResult<ResolvedSchema> {
    let mut properties = resolve_properties(&raw.properties, &ctx, &path, &visited).await?;
    let mut required = raw.required.clone();
    let mut title = raw.title.clone();
    let mut description = raw.description.clone();
    let mut example = raw.example.clone();

    for (index, member) in members.into_iter().enumerate() {
        let mut member_path = path.clone();
        member_path.push("allOf".to_string());
        member_path.push(index.to_string());

        let resolved =
            resolve_node(member, ctx.clone(), member_path.clone(), visited.clone()).await?;

        if title.is_none() {
            title = resolved.title.clone();
        }
        if description.is_none() {
            description = resolved.description.clone();
        }
        if example.is_none() {
            example = resolved.example.clone();
        }

        let SchemaKind::Object {
            properties: member_props,
            required: member_required,
        } = resolved.kind
        else {
            // Members without an object shape contribute no properties.
            continue;
        };

        for (name, prop) in member_props {
            if let Some(existing) = properties.get(&name) {
                if primitive_conflict(existing, &prop) {
                    let mut conflict_path = member_path.clone();
                    conflict_path.push("properties".to_string());
                    conflict_path.push(name.clone());
                    return Err(EngineError::new(
                        ErrorCode::AllOfConflict,
                        format!(
                            "allOf member {} re-declares property '{}' with a different type",
                            index, name
                        ),
                    )
                    .at(conflict_path)
                    .with_suggestion(
                        "give the property the same type in every allOf member, or rename one",
                    ));
                }
            }
            properties.insert(name, prop);
        }
        required.extend(member_required);
    }

    let mut resolved = carry_metadata(
        &raw,
        SchemaKind::Object {
            properties,
            required: dedup_names(required),
        },
    );
    resolved.title = title;
    resolved.description = description;
    resolved.example = example;
    Ok(resolved)
}

/// `oneOf`: a discriminated variant family.
///
/// `discriminator.propertyName` is mandatory; the engine intentionally does
/// not guess one. The discriminator property is injected into the base
/// carrier as a required string.
async fn resolve_one_of(
    raw: RawSchema,
    members: Vec<SchemaOrRef>,
    ctx: DocumentContext,
    path: Vec<String>,
    visited: Vec<String>,
) -> EngineResult<ResolvedSchema> {
    let Some(discriminator) = raw.discriminator.clone() else {
        return Err(EngineError::new(
            ErrorCode::OneOfMissingDiscriminator,
            "oneOf schema has no discriminator.propertyName".to_string(),
        )
        .at(path)
        .with_suggestion("declare discriminator.propertyName so variants can be told apart"));
    };

    let mut base_properties = resolve_properties(&raw.properties, &ctx, &path, &visited).await?;
    let mut base_required = dedup_names(raw.required.clone());

    let mut variants = Vec::with_capacity(members.len());
    for (index, member) in members.into_iter().enumerate() {
        let mut member_path = path.clone();
        member_path.push("oneOf".to_string());
        member_path.push(index.to_string());

        let ref_name = member_ref_name(&member);
        let mapped = mapping_rename(&discriminator, &member);
        let resolved = resolve_node(member, ctx.clone(), member_path, visited.clone()).await?;

        let name = mapped
            .or_else(|| resolved.title.clone())
            .or(ref_name)
            .unwrap_or_else(|| format!("Variant{}", index + 1));
        variants.push(SchemaVariant {
            name,
            schema: resolved,
        });
    }

    let discriminator_name = discriminator.property_name;
    if !base_properties.contains_key(&discriminator_name) {
        let mut disc_schema = ResolvedSchema::of_kind(SchemaKind::Primitive("string".to_string()));
        disc_schema.description = Some("Selects the concrete variant.".to_string());
        base_properties.insert(discriminator_name.clone(), disc_schema);
    }
    if !base_required.contains(&discriminator_name) {
        base_required.push(discriminator_name.clone());
    }

    Ok(carry_metadata(
        &raw,
        SchemaKind::OneOfFamily {
            discriminator: discriminator_name,
            properties: base_properties,
            required: base_required,
            variants,
        },
    ))
}

/// `anyOf`: an open union of members.
///
/// The resulting object's property set is the union of all members'
/// properties (first seen wins); the required set comes from
/// [`any_of_required_policy`]. An explicitly empty member list is an error.
async fn resolve_any_of(
    raw: RawSchema,
    members: Vec<SchemaOrRef>,
    ctx: DocumentContext,
    path: Vec<String>,
    visited: Vec<String>,
) -> EngineResult<ResolvedSchema> {
    if members.is_empty() {
        return Err(EngineError::new(
            ErrorCode::AnyOfEmpty,
            "anyOf has no members".to_string(),
        )
        .at(path)
        .with_suggestion("list at least one member schema or drop the anyOf keyword"));
    }

    let mut variants = Vec::with_capacity(members.len());
    for (index, member) in members.into_iter().enumerate() {
        let mut member_path = path.clone();
        member_path.push("anyOf".to_string());
        member_path.push(index.to_string());

        let ref_name = member_ref_name(&member);
        let resolved = resolve_node(member, ctx.clone(), member_path, visited.clone()).await?;
        let name = resolved
            .title
            .clone()
            .or(ref_name)
            .unwrap_or_else(|| format!("Option{}", index + 1));
        variants.push(SchemaVariant {
            name,
            schema: resolved,
        });
    }

    let mut properties: IndexMap<String, ResolvedSchema> = IndexMap::new();
    for variant in &variants {
        if let Some(member_props) = variant.schema.properties() {
            for (name, prop) in member_props {
                properties.entry(name.clone()).or_insert_with(|| prop.clone());
            }
        }
    }

    let required = any_of_required_policy(&variants);

    Ok(carry_metadata(
        &raw,
        SchemaKind::AnyOfUnion {
            properties,
            required,
            variants,
        },
    ))
}

/// Required-name policy for `anyOf` unions: the union of every member's
/// required names.
///
/// A field required in only one branch is therefore reported as required
/// overall. Callers wanting intersection (or no required set at all) swap
/// this function; the resolver's control flow does not change.
pub fn any_of_required_policy(variants: &[SchemaVariant]) -> Vec<String> {
    let mut required = Vec::new();
    for variant in variants {
        if let Some(names) = variant.schema.required() {
            required.extend(names.iter().cloned());
        }
    }
    dedup_names(required)
}

async fn resolve_properties(
    properties: &IndexMap<String, SchemaOrRef>,
    ctx: &DocumentContext,
    path: &[String],
    visited: &[String],
) -> EngineResult<IndexMap<String, ResolvedSchema>> {
    let mut resolved = IndexMap::with_capacity(properties.len());
    for (name, node) in properties {
        let mut prop_path = path.to_vec();
        prop_path.push("properties".to_string());
        prop_path.push(name.clone());
        let schema =
            resolve_node(node.clone(), ctx.clone(), prop_path, visited.to_vec()).await?;
        resolved.insert(name.clone(), schema);
    }
    Ok(resolved)
}

/// Copies source-node metadata and constraints onto the resolved form.
fn carry_metadata(raw: &RawSchema, kind: SchemaKind) -> ResolvedSchema {
    ResolvedSchema {
        kind,
        title: raw.title.clone(),
        description: raw.description.clone(),
        example: raw.example.clone(),
        default: raw.default.clone(),
        nullable: raw.nullable.unwrap_or(false),
        format: raw.format.clone(),
        enum_values: raw.enum_values.clone(),
        minimum: raw.minimum,
        maximum: raw.maximum,
        min_length: raw.min_length,
        max_length: raw.max_length,
        pattern: raw.pattern.clone(),
        min_items: raw.min_items,
        max_items: raw.max_items,
        x_validation: raw.x_validation.clone(),
    }
}

/// Two properties conflict when both are primitives of different types.
fn primitive_conflict(existing: &ResolvedSchema, incoming: &ResolvedSchema) -> bool {
    match (&existing.kind, &incoming.kind) {
        (SchemaKind::Primitive(a), SchemaKind::Primitive(b)) => a != b,
        _ => false,
    }
}

/// Last path segment of a `$ref` member, used as a variant name fallback.
fn member_ref_name(member: &SchemaOrRef) -> Option<String> {
    let SchemaOrRef::Reference(raw_ref) = member else {
        return None;
    };
    raw_ref
        .reference
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Reverse lookup into `discriminator.mapping`: the mapping key whose value
/// targets this member's `$ref`.
fn mapping_rename(discriminator: &Discriminator, member: &SchemaOrRef) -> Option<String> {
    let SchemaOrRef::Reference(raw_ref) = member else {
        return None;
    };
    let member_name = member_ref_name(member)?;
    for (key, target) in &discriminator.mapping {
        if target == &raw_ref.reference
            || target.rsplit('/').next() == Some(member_name.as_str())
        {
            return Some(key.clone());
        }
    }
    None
}

fn dedup_names(names: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
