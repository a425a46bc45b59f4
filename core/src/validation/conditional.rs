#![deny(missing_docs)]

//! # Conditional & Cross-Field Rule Collections
//!
//! Queryable collections built from `x-validation` metadata:
//!
//! - [`ConditionalRuleSet`]: rules gated on a condition, ordered by
//!   descending priority with ties kept in insertion order.
//! - [`FieldDependencySet`]: presence dependencies between sibling fields,
//!   queried by target field.
//!
//! Both are populated once at construction time and queried read-only
//! during generation.

use crate::condition::{evaluate_expression, ConditionData, ConditionExpression};
use crate::error::EngineResult;
use crate::oas::models::DependencyKind;

/// A validation rule that applies only while its condition holds.
#[derive(Debug, Clone)]
pub struct ConditionalValidationRule {
    /// Stable identifier for reporting.
    pub id: String,
    /// Original condition text, kept for diagnostics and caching.
    pub condition_text: String,
    /// Parsed condition chain.
    pub condition: ConditionExpression,
    /// Names of the validation rules applied when the condition holds.
    pub validations: Vec<String>,
    /// Optional message override.
    pub message: Option<String>,
    /// Higher priorities apply first.
    pub priority: i32,
}

/// Rules ordered by descending priority; equal priorities keep insertion
/// order.
#[derive(Debug, Default)]
pub struct ConditionalRuleSet {
    rules: Vec<ConditionalValidationRule>,
}

impl ConditionalRuleSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a rule at its priority position.
    pub fn insert(&mut self, rule: ConditionalValidationRule) {
        let position = self
            .rules
            .iter()
            .position(|existing| existing.priority < rule.priority)
            .unwrap_or(self.rules.len());
        self.rules.insert(position, rule);
    }

    /// All rules, highest priority first.
    pub fn iter(&self) -> impl Iterator<Item = &ConditionalValidationRule> {
        self.rules.iter()
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The rules whose conditions hold for the given data.
    ///
    /// Conditions mentioning fields absent from the data simply never fire;
    /// that is not an error.
    pub fn applicable(
        &self,
        data: &ConditionData,
    ) -> EngineResult<Vec<&ConditionalValidationRule>> {
        let mut matched = Vec::new();
        for rule in &self.rules {
            if evaluate_expression(&rule.condition, data)? {
                matched.push(rule);
            }
        }
        Ok(matched)
    }
}

/// A presence dependency between two sibling fields.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDependency {
    /// Field whose presence triggers the dependency.
    pub source_field: String,
    /// Field the dependency constrains.
    pub target_field: String,
    /// How the target is bound.
    pub kind: DependencyKind,
    /// Condition text for `Conditional` dependencies.
    pub condition: Option<String>,
}

/// Flat dependency collection queried by target field.
#[derive(Debug, Default)]
pub struct FieldDependencySet {
    dependencies: Vec<FieldDependency>,
}

impl FieldDependencySet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a dependency.
    pub fn add(&mut self, dependency: FieldDependency) {
        self.dependencies.push(dependency);
    }

    /// All dependencies constraining the given target field.
    pub fn for_target<'a>(
        &'a self,
        target_field: &'a str,
    ) -> impl Iterator<Item = &'a FieldDependency> {
        self.dependencies
            .iter()
            .filter(move |dep| dep.target_field == target_field)
    }

    /// Number of dependencies.
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::parse_condition;
    use serde_json::json;

    fn rule(id: &str, condition: &str, priority: i32) -> ConditionalValidationRule {
        ConditionalValidationRule {
            id: id.to_string(),
            condition_text: condition.to_string(),
            condition: parse_condition(condition).unwrap(),
            validations: vec!["strong-password".to_string()],
            message: None,
            priority,
        }
    }

    #[test]
    fn test_ordering_by_priority_then_insertion() {
        let mut set = ConditionalRuleSet::new();
        set.insert(rule("low", "a == 1", 1));
        set.insert(rule("high", "a == 1", 10));
        set.insert(rule("mid-first", "a == 1", 5));
        set.insert(rule("mid-second", "a == 1", 5));

        let ids: Vec<&str> = set.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "mid-first", "mid-second", "low"]);
    }

    #[test]
    fn test_applicable_filters_by_condition() {
        let mut set = ConditionalRuleSet::new();
        set.insert(rule("adult", "age >= 18", 0));
        set.insert(rule("admin", "role == 'admin'", 0));

        let data: ConditionData = [
            ("age".to_string(), json!(30)),
            ("role".to_string(), json!("user")),
        ]
        .into_iter()
        .collect();

        let matched = set.applicable(&data).unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, "adult");
    }

    #[test]
    fn test_rule_with_missing_fields_never_fires() {
        let mut set = ConditionalRuleSet::new();
        set.insert(rule("ghost", "missing_field == 'x'", 0));

        let matched = set.applicable(&ConditionData::new()).unwrap();
        assert!(matched.is_empty());
    }

    #[test]
    fn test_dependency_query_by_target() {
        let mut set = FieldDependencySet::new();
        set.add(FieldDependency {
            source_field: "country".to_string(),
            target_field: "state".to_string(),
            kind: DependencyKind::Required,
            condition: None,
        });
        set.add(FieldDependency {
            source_field: "company".to_string(),
            target_field: "vat_id".to_string(),
            kind: DependencyKind::Conditional,
            condition: Some("country == 'DE'".to_string()),
        });

        let for_state: Vec<_> = set.for_target("state").collect();
        assert_eq!(for_state.len(), 1);
        assert_eq!(for_state[0].source_field, "country");
        assert!(set.for_target("unknown").next().is_none());
    }
}
