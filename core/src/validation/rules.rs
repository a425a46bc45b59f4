#![deny(missing_docs)]

//! # Validation Rule Registry
//!
//! Named validation rules: the built-in set plus any rules registered by the
//! caller at runtime.
//!
//! The registry is an explicit object passed by reference into the
//! synthesizer, never a module-level singleton, so callers and tests can
//! construct isolated registries.

use indexmap::IndexMap;

/// A named validation rule.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationRule {
    /// Registry name, e.g. `email-uniqueness`.
    pub name: String,
    /// Annotation identifier rendered onto the target property.
    pub annotation: String,
    /// Annotation parameters.
    pub params: IndexMap<String, String>,
    /// Message template for violation reporting.
    pub message_template: String,
    /// Imports/dependencies the rendered annotation requires.
    pub imports: Vec<String>,
}

impl ValidationRule {
    /// Creates a rule with no parameters.
    pub fn new(
        name: impl Into<String>,
        annotation: impl Into<String>,
        message_template: impl Into<String>,
        imports: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            annotation: annotation.into(),
            params: IndexMap::new(),
            message_template: message_template.into(),
            imports,
        }
    }
}

/// Name-keyed collection of validation rules.
///
/// Registration replaces by name: the last registration for a given name
/// wins, built-ins included.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: IndexMap<String, ValidationRule>,
}

impl RuleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the built-in rule set.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ValidationRule::new(
            "email-uniqueness",
            "UniqueEmail",
            "email address is already registered",
            vec!["validation.UniqueEmail".to_string()],
        ));

        let mut strong_password = ValidationRule::new(
            "strong-password",
            "StrongPassword",
            "password does not meet strength requirements",
            vec!["validation.StrongPassword".to_string()],
        );
        strong_password
            .params
            .insert("minLength".to_string(), "12".to_string());
        strong_password
            .params
            .insert("requireSymbol".to_string(), "true".to_string());
        registry.register(strong_password);

        registry.register(ValidationRule::new(
            "phone-number",
            "PhoneNumber",
            "not a valid phone number",
            vec!["validation.PhoneNumber".to_string()],
        ));
        registry
    }

    /// Registers a rule under its name, replacing any previous registration.
    pub fn register(&mut self, rule: ValidationRule) {
        self.rules.insert(rule.name.clone(), rule);
    }

    /// Looks up a rule by name.
    pub fn get(&self, name: &str) -> Option<&ValidationRule> {
        self.rules.get(name)
    }

    /// Number of registered rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the registry has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Registered rule names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(|s| s.as_str())
    }
}
