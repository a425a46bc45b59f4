#![deny(missing_docs)]

//! # Validation Synthesis
//!
//! Derives the ordered set of validation directives attached to a property.
//!
//! Directive sources apply in a fixed order (presence, format-driven,
//! bounds, nested validity, extension metadata) and the final list is
//! de-duplicated by rendered form, first occurrence winning.
//!
//! Expression errors inside `x-validation` are fatal only for the single
//! condition involved: they are recorded alongside the directives and never
//! abort synthesis of the surrounding schema.

use crate::condition::parse_condition;
use crate::error::{EngineError, EngineResult, ErrorCode};
use crate::oas::models::{ResolvedSchema, SchemaKind, XValidation};
use crate::type_mapper::{map_type, TypeDescriptor};
use crate::validation::conditional::{ConditionalRuleSet, ConditionalValidationRule};
use crate::validation::rules::{RuleRegistry, ValidationRule};
use indexmap::IndexMap;
use std::collections::HashSet;

/// One synthesized validation constraint attached to a property.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationDirective {
    /// Annotation identifier, e.g. `NotNull`, `Size`, `UniqueEmail`.
    pub annotation: String,
    /// Annotation parameters, insertion order preserved.
    pub params: IndexMap<String, String>,
    /// Optional violation message.
    pub message: Option<String>,
    /// Imports/dependencies the rendered annotation requires.
    pub imports: Vec<String>,
    /// Condition text gating the directive, for conditional rules.
    pub condition: Option<String>,
}

impl ValidationDirective {
    /// A directive with no parameters.
    pub fn plain(annotation: impl Into<String>) -> Self {
        Self {
            annotation: annotation.into(),
            params: IndexMap::new(),
            message: None,
            imports: Vec::new(),
            condition: None,
        }
    }

    /// Adds a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// The canonical rendered form used for de-duplication.
    pub fn rendered(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        let mut rendered = format!("@{}({})", self.annotation, params.join(", "));
        if let Some(condition) = &self.condition {
            rendered.push_str(" if ");
            rendered.push_str(condition);
        }
        if let Some(message) = &self.message {
            rendered.push_str(" : ");
            rendered.push_str(message);
        }
        rendered
    }
}

impl From<&ValidationRule> for ValidationDirective {
    fn from(rule: &ValidationRule) -> Self {
        Self {
            annotation: rule.annotation.clone(),
            params: rule.params.clone(),
            message: Some(rule.message_template.clone()),
            imports: rule.imports.clone(),
            condition: None,
        }
    }
}

/// The outcome of synthesizing one property.
#[derive(Debug, Default)]
pub struct SynthesizedValidations {
    /// Ordered, de-duplicated directives.
    pub directives: Vec<ValidationDirective>,
    /// Per-condition failures: recorded, surfaced, and non-fatal.
    pub condition_errors: Vec<EngineError>,
}

/// Collects directives in source order, dropping rendered-form duplicates.
#[derive(Default)]
struct DirectiveAccumulator {
    directives: Vec<ValidationDirective>,
    seen: HashSet<String>,
}

impl DirectiveAccumulator {
    fn push(&mut self, directive: ValidationDirective) {
        if self.seen.insert(directive.rendered()) {
            self.directives.push(directive);
        }
    }
}

/// Synthesizes the validation directives for a property.
///
/// `owner` is the schema the property belongs to; its `x-validation` block
/// supplies the cross-field rules that mention this property.
pub fn synthesize(
    property: &ResolvedSchema,
    property_name: &str,
    is_required: bool,
    owner: &ResolvedSchema,
    registry: &RuleRegistry,
) -> SynthesizedValidations {
    let mut acc = DirectiveAccumulator::default();
    let mut condition_errors = Vec::new();

    // 1. Presence.
    if is_required && !property.nullable {
        acc.push(ValidationDirective::plain("NotNull"));
    }

    // 2. Format-driven.
    synthesize_format(property, registry, &mut acc);

    // 3. Bounds.
    synthesize_bounds(property, &mut acc);

    // 4. Nested validity.
    if matches!(
        property.kind,
        SchemaKind::Object { .. } | SchemaKind::OneOfFamily { .. } | SchemaKind::AnyOfUnion { .. }
    ) {
        acc.push(ValidationDirective::plain("Valid"));
    }

    // 5. Extension metadata.
    if let Some(extension) = &property.x_validation {
        synthesize_custom_rules(extension, registry, &mut acc, &mut condition_errors);
        synthesize_conditional_rules(extension, registry, &mut acc, &mut condition_errors);
    }
    if let Some(owner_extension) = &owner.x_validation {
        synthesize_cross_field(owner_extension, property_name, &mut acc, &mut condition_errors);
    }

    SynthesizedValidations {
        directives: acc.directives,
        condition_errors,
    }
}

/// Maps a property and synthesizes its directives in one call.
///
/// Fails with `MISSING_TYPE` when the owner does not declare the property.
pub fn type_and_validations_for(
    owner: &ResolvedSchema,
    property_name: &str,
    registry: &RuleRegistry,
    path: &[String],
) -> EngineResult<(TypeDescriptor, SynthesizedValidations)> {
    let property = owner
        .properties()
        .and_then(|props| props.get(property_name))
        .ok_or_else(|| {
            EngineError::new(
                ErrorCode::MissingType,
                format!("schema declares no property '{}'", property_name),
            )
            .at(path.to_vec())
            .with_suggestion("check the property name against the resolved schema")
        })?;

    let is_required = owner
        .required()
        .map(|names| names.iter().any(|n| n == property_name))
        .unwrap_or(false);

    let mut property_path = path.to_vec();
    property_path.push("properties".to_string());
    property_path.push(property_name.to_string());

    let descriptor = map_type(property, &property_path)?;
    let validations = synthesize(property, property_name, is_required, owner, registry);
    Ok((descriptor, validations))
}

fn synthesize_format(
    property: &ResolvedSchema,
    registry: &RuleRegistry,
    acc: &mut DirectiveAccumulator,
) {
    let requested = |name: &str| {
        property
            .x_validation
            .as_ref()
            .map(|xv| xv.custom_rules.iter().any(|r| r == name))
            .unwrap_or(false)
    };

    match property.format.as_deref() {
        Some("email") => {
            if requested("email-uniqueness") {
                if let Some(rule) = registry.get("email-uniqueness") {
                    acc.push(rule.into());
                }
            } else {
                acc.push(ValidationDirective::plain("Email"));
            }
        }
        Some("password") => {
            if requested("strong-password") {
                if let Some(rule) = registry.get("strong-password") {
                    acc.push(rule.into());
                }
            }
        }
        Some("phone") => {
            if requested("phone-number") {
                if let Some(rule) = registry.get("phone-number") {
                    acc.push(rule.into());
                }
            }
        }
        _ => {}
    }
}

fn synthesize_bounds(property: &ResolvedSchema, acc: &mut DirectiveAccumulator) {
    if property.min_length.is_some() || property.max_length.is_some() {
        let mut size = ValidationDirective::plain("Size");
        if let Some(min) = property.min_length {
            size = size.with_param("min", min.to_string());
        }
        if let Some(max) = property.max_length {
            size = size.with_param("max", max.to_string());
        }
        acc.push(size);
    }
    if let Some(pattern) = &property.pattern {
        acc.push(ValidationDirective::plain("Pattern").with_param("regexp", pattern.clone()));
    }
    if let Some(minimum) = property.minimum {
        acc.push(ValidationDirective::plain("Min").with_param("value", format_bound(minimum)));
    }
    if let Some(maximum) = property.maximum {
        acc.push(ValidationDirective::plain("Max").with_param("value", format_bound(maximum)));
    }
    if property.min_items.is_some() || property.max_items.is_some() {
        let mut size = ValidationDirective::plain("Size");
        if let Some(min) = property.min_items {
            size = size.with_param("min", min.to_string());
        }
        if let Some(max) = property.max_items {
            size = size.with_param("max", max.to_string());
        }
        acc.push(size);
    }
}

fn synthesize_custom_rules(
    extension: &XValidation,
    registry: &RuleRegistry,
    acc: &mut DirectiveAccumulator,
    errors: &mut Vec<EngineError>,
) {
    for name in &extension.custom_rules {
        match registry.get(name) {
            Some(rule) => acc.push(rule.into()),
            None => errors.push(
                EngineError::new(
                    ErrorCode::UnknownRule,
                    format!("validation rule '{}' is not registered", name),
                )
                .with_suggestion("register the rule before generation or remove the reference"),
            ),
        }
    }
}

fn synthesize_conditional_rules(
    extension: &XValidation,
    registry: &RuleRegistry,
    acc: &mut DirectiveAccumulator,
    errors: &mut Vec<EngineError>,
) {
    let mut set = ConditionalRuleSet::new();
    for (index, raw) in extension.conditional_rules.iter().enumerate() {
        let condition = match parse_condition(&raw.condition) {
            Ok(parsed) => parsed,
            Err(err) => {
                // Fatal for this condition only.
                errors.push(err);
                continue;
            }
        };
        set.insert(ConditionalValidationRule {
            id: raw
                .id
                .clone()
                .unwrap_or_else(|| format!("conditional-{}", index + 1)),
            condition_text: raw.condition.clone(),
            condition,
            validations: raw.validations.clone(),
            message: raw.message.clone(),
            priority: raw.priority,
        });
    }

    for rule in set.iter() {
        for validation_name in &rule.validations {
            let Some(registered) = registry.get(validation_name) else {
                errors.push(
                    EngineError::new(
                        ErrorCode::UnknownRule,
                        format!(
                            "conditional rule '{}' references unregistered validation '{}'",
                            rule.id, validation_name
                        ),
                    )
                    .with_suggestion("register the rule before generation"),
                );
                continue;
            };
            let mut directive: ValidationDirective = registered.into();
            directive.condition = Some(rule.condition_text.clone());
            if rule.message.is_some() {
                directive.message = rule.message.clone();
            }
            acc.push(directive);
        }
    }
}

fn synthesize_cross_field(
    owner_extension: &XValidation,
    property_name: &str,
    acc: &mut DirectiveAccumulator,
    errors: &mut Vec<EngineError>,
) {
    if let Some(equality) = &owner_extension.field_equality {
        if equality.fields.iter().any(|f| f == property_name) {
            let mut directive = ValidationDirective::plain("FieldMatch")
                .with_param("fields", equality.fields.join(","));
            directive.message = equality.message.clone();
            acc.push(directive);
        }
    }

    for dependency in &owner_extension.dependencies {
        if dependency.target_field != property_name {
            continue;
        }
        if let Some(condition_text) = &dependency.condition {
            // Malformed dependency conditions are recorded; the dependency
            // then simply never fires.
            if let Err(err) = parse_condition(condition_text) {
                errors.push(err);
                continue;
            }
        }
        let mut directive = ValidationDirective::plain("DependsOn")
            .with_param("source", dependency.source_field.clone())
            .with_param("kind", format!("{:?}", dependency.kind));
        directive.condition = dependency.condition.clone();
        acc.push(directive);
    }
}

fn format_bound(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oas::composition::{resolve_schema, DocumentContext};
    use crate::oas::models::SchemaOrRef;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn resolve(node: serde_json::Value) -> ResolvedSchema {
        let node: SchemaOrRef = serde_json::from_value(node).unwrap();
        let ctx = DocumentContext::local(json!({}));
        resolve_schema(&node, &ctx, &[]).await.unwrap()
    }

    fn annotations(result: &SynthesizedValidations) -> Vec<&str> {
        result
            .directives
            .iter()
            .map(|d| d.annotation.as_str())
            .collect()
    }

    #[tokio::test]
    async fn test_required_plain_string_yields_exactly_not_null() {
        let owner = resolve(json!({
            "type": "object",
            "properties": {"name": {"type": "string"}},
            "required": ["name"]
        }))
        .await;
        let property = owner.properties().unwrap().get("name").unwrap();

        let registry = RuleRegistry::with_builtins();
        let result = synthesize(property, "name", true, &owner, &registry);
        assert_eq!(annotations(&result), vec!["NotNull"]);
        assert!(result.condition_errors.is_empty());
    }

    #[tokio::test]
    async fn test_optional_nullable_field_has_no_presence_directive() {
        let owner = resolve(json!({
            "type": "object",
            "properties": {"nickname": {"type": "string", "nullable": true}}
        }))
        .await;
        let property = owner.properties().unwrap().get("nickname").unwrap();

        let registry = RuleRegistry::with_builtins();
        let result = synthesize(property, "nickname", false, &owner, &registry);
        assert!(result.directives.is_empty());
    }

    #[tokio::test]
    async fn test_email_format_defaults_to_plain_email_rule() {
        let property = resolve(json!({"type": "string", "format": "email"})).await;
        let owner = resolve(json!({"type": "object"})).await;

        let registry = RuleRegistry::with_builtins();
        let result = synthesize(&property, "email", false, &owner, &registry);
        assert_eq!(annotations(&result), vec!["Email"]);
    }

    #[tokio::test]
    async fn test_email_uniqueness_replaces_plain_email_when_requested() {
        let property = resolve(json!({
            "type": "string",
            "format": "email",
            "x-validation": {"customRules": ["email-uniqueness"]}
        }))
        .await;
        let owner = resolve(json!({"type": "object"})).await;

        let registry = RuleRegistry::with_builtins();
        let result = synthesize(&property, "email", false, &owner, &registry);
        assert_eq!(annotations(&result), vec!["UniqueEmail"]);
        assert_eq!(
            result.directives[0].imports,
            vec!["validation.UniqueEmail".to_string()]
        );
    }

    #[tokio::test]
    async fn test_password_rule_applies_only_when_requested() {
        let registry = RuleRegistry::with_builtins();
        let owner = resolve(json!({"type": "object"})).await;

        let bare = resolve(json!({"type": "string", "format": "password"})).await;
        let result = synthesize(&bare, "password", false, &owner, &registry);
        assert!(result.directives.is_empty());

        let requested = resolve(json!({
            "type": "string",
            "format": "password",
            "x-validation": {"customRules": ["strong-password"]}
        }))
        .await;
        let result = synthesize(&requested, "password", false, &owner, &registry);
        assert_eq!(annotations(&result), vec!["StrongPassword"]);
        assert_eq!(
            result.directives[0].params.get("minLength").map(String::as_str),
            Some("12")
        );
    }

    #[tokio::test]
    async fn test_bounds_directives() {
        let owner = resolve(json!({"type": "object"})).await;
        let registry = RuleRegistry::with_builtins();

        let text = resolve(json!({
            "type": "string",
            "minLength": 2,
            "maxLength": 40,
            "pattern": "^[a-z]+$"
        }))
        .await;
        let result = synthesize(&text, "slug", false, &owner, &registry);
        assert_eq!(annotations(&result), vec!["Size", "Pattern"]);
        assert_eq!(result.directives[0].rendered(), "@Size(min=2, max=40)");

        let number = resolve(json!({"type": "integer", "minimum": 0, "maximum": 120})).await;
        let result = synthesize(&number, "age", false, &owner, &registry);
        assert_eq!(annotations(&result), vec!["Min", "Max"]);

        let array = resolve(json!({
            "type": "array",
            "items": {"type": "string"},
            "minItems": 1,
            "maxItems": 10
        }))
        .await;
        let result = synthesize(&array, "tags", false, &owner, &registry);
        assert_eq!(annotations(&result), vec!["Size"]);
    }

    #[tokio::test]
    async fn test_object_property_cascades() {
        let owner = resolve(json!({"type": "object"})).await;
        let nested = resolve(json!({
            "type": "object",
            "properties": {"street": {"type": "string"}}
        }))
        .await;

        let registry = RuleRegistry::with_builtins();
        let result = synthesize(&nested, "address", false, &owner, &registry);
        assert_eq!(annotations(&result), vec!["Valid"]);
    }

    #[tokio::test]
    async fn test_conditional_rules_order_by_priority_and_carry_condition() {
        let property = resolve(json!({
            "type": "string",
            "x-validation": {"conditionalRules": [
                {"condition": "tier == 'basic'", "validations": ["phone-number"], "priority": 1},
                {"condition": "tier == 'premium'", "validations": ["strong-password"],
                 "message": "premium accounts need strong passwords", "priority": 10}
            ]}
        }))
        .await;
        let owner = resolve(json!({"type": "object"})).await;

        let registry = RuleRegistry::with_builtins();
        let result = synthesize(&property, "secret", false, &owner, &registry);

        assert_eq!(annotations(&result), vec!["StrongPassword", "PhoneNumber"]);
        assert_eq!(
            result.directives[0].condition.as_deref(),
            Some("tier == 'premium'")
        );
        assert_eq!(
            result.directives[0].message.as_deref(),
            Some("premium accounts need strong passwords")
        );
    }

    #[tokio::test]
    async fn test_malformed_condition_is_recorded_not_fatal() {
        let property = resolve(json!({
            "type": "string",
            "minLength": 1,
            "x-validation": {"conditionalRules": [
                {"condition": "role == ", "validations": ["phone-number"]}
            ]}
        }))
        .await;
        let owner = resolve(json!({"type": "object"})).await;

        let registry = RuleRegistry::with_builtins();
        let result = synthesize(&property, "contact", false, &owner, &registry);

        // The rest of the synthesis still happens.
        assert_eq!(annotations(&result), vec!["Size"]);
        assert_eq!(result.condition_errors.len(), 1);
        assert_eq!(result.condition_errors[0].code, ErrorCode::ConditionSyntax);
        assert!(result.condition_errors[0].message.contains("role == "));
    }

    #[tokio::test]
    async fn test_unknown_custom_rule_is_recorded() {
        let property = resolve(json!({
            "type": "string",
            "x-validation": {"customRules": ["no-such-rule"]}
        }))
        .await;
        let owner = resolve(json!({"type": "object"})).await;

        let registry = RuleRegistry::with_builtins();
        let result = synthesize(&property, "field", false, &owner, &registry);
        assert!(result.directives.is_empty());
        assert_eq!(result.condition_errors[0].code, ErrorCode::UnknownRule);
    }

    #[tokio::test]
    async fn test_cross_field_rules_attach_to_named_properties() {
        let owner = resolve(json!({
            "type": "object",
            "properties": {
                "password": {"type": "string"},
                "password_confirm": {"type": "string"},
                "state": {"type": "string"},
                "country": {"type": "string"}
            },
            "x-validation": {
                "fieldEquality": {
                    "fields": ["password", "password_confirm"],
                    "message": "passwords must match"
                },
                "dependencies": [
                    {"sourceField": "country", "targetField": "state", "kind": "Required"}
                ]
            }
        }))
        .await;
        let registry = RuleRegistry::with_builtins();

        let password = owner.properties().unwrap().get("password").unwrap();
        let result = synthesize(password, "password", false, &owner, &registry);
        assert_eq!(annotations(&result), vec!["FieldMatch"]);
        assert_eq!(
            result.directives[0].message.as_deref(),
            Some("passwords must match")
        );

        let state = owner.properties().unwrap().get("state").unwrap();
        let result = synthesize(state, "state", false, &owner, &registry);
        assert_eq!(annotations(&result), vec!["DependsOn"]);
        assert_eq!(
            result.directives[0].params.get("source").map(String::as_str),
            Some("country")
        );

        // Unrelated siblings get neither directive.
        let country = owner.properties().unwrap().get("country").unwrap();
        let result = synthesize(country, "country", false, &owner, &registry);
        assert!(result.directives.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_directives_collapse_by_rendered_form() {
        // email format plus an explicit email-uniqueness custom rule would
        // produce the same directive twice; only the first survives.
        let property = resolve(json!({
            "type": "string",
            "format": "email",
            "x-validation": {"customRules": ["email-uniqueness"]}
        }))
        .await;
        let owner = resolve(json!({"type": "object"})).await;

        let registry = RuleRegistry::with_builtins();
        let result = synthesize(&property, "email", true, &owner, &registry);
        assert_eq!(annotations(&result), vec!["NotNull", "UniqueEmail"]);
    }

    #[tokio::test]
    async fn test_type_and_validations_for_unknown_property_fails() {
        let owner = resolve(json!({
            "type": "object",
            "properties": {"id": {"type": "integer"}}
        }))
        .await;
        let registry = RuleRegistry::with_builtins();
        let err = type_and_validations_for(&owner, "ghost", &registry, &[]).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingType);
    }

    #[tokio::test]
    async fn test_type_and_validations_for_combines_both_pipelines() {
        let owner = resolve(json!({
            "type": "object",
            "properties": {
                "email": {"type": "string", "format": "email", "maxLength": 254}
            },
            "required": ["email"]
        }))
        .await;
        let registry = RuleRegistry::with_builtins();
        let (descriptor, validations) =
            type_and_validations_for(&owner, "email", &registry, &[]).unwrap();

        assert!(matches!(
            descriptor,
            TypeDescriptor::String(crate::type_mapper::StringFormat::Email)
        ));
        assert_eq!(annotations(&validations), vec!["NotNull", "Email", "Size"]);
    }
}
