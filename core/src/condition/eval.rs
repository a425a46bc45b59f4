#![deny(missing_docs)]

//! # Condition Evaluation
//!
//! Walks a parsed condition chain against a flat field->value map.
//!
//! Evaluation is pure: identical `(condition text, relevant field values)`
//! inputs always produce the same result, which makes results cacheable. The
//! engine keys its cache by the condition text plus a projection of only the
//! fields the text mentions, with FIFO eviction at a configurable bound.
//!
//! Unknown fields evaluate as undefined: every comparison is false except
//! `is_null`, which is true.

use crate::condition::parser::{
    parse_condition, referenced_fields, ConditionExpression, ConditionValue, LogicalOp, Operator,
};
use crate::error::{EngineError, EngineResult, ErrorCode};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::sync::RwLock;

/// Flat field->value data a condition evaluates against.
pub type ConditionData = IndexMap<String, JsonValue>;

/// Configuration for the caching condition engine.
#[derive(Debug, Clone)]
pub struct ConditionEngineConfig {
    /// Maximum number of cached results; oldest entries evict first.
    pub max_cache_size: usize,
}

impl Default for ConditionEngineConfig {
    fn default() -> Self {
        Self {
            max_cache_size: 256,
        }
    }
}

/// Evaluates condition texts with a bounded FIFO result cache.
pub struct ConditionEngine {
    config: ConditionEngineConfig,
    cache: RwLock<IndexMap<String, bool>>,
}

impl Default for ConditionEngine {
    fn default() -> Self {
        Self::new(ConditionEngineConfig::default())
    }
}

impl ConditionEngine {
    /// Creates an engine with the given configuration.
    pub fn new(config: ConditionEngineConfig) -> Self {
        Self {
            config,
            cache: RwLock::new(IndexMap::new()),
        }
    }

    /// Evaluates a condition text against the data map, consulting the cache.
    pub fn evaluate(&self, text: &str, data: &ConditionData) -> EngineResult<bool> {
        let key = cache_key(text, data);

        if let Some(hit) = self
            .cache
            .read()
            .expect("condition cache lock poisoned")
            .get(&key)
        {
            return Ok(*hit);
        }

        let expr = parse_condition(text)?;
        let result = evaluate_expression(&expr, data)?;

        let mut cache = self.cache.write().expect("condition cache lock poisoned");
        while cache.len() >= self.config.max_cache_size {
            if cache.shift_remove_index(0).is_none() {
                break;
            }
        }
        cache.insert(key, result);

        Ok(result)
    }

    /// Number of live cache entries.
    pub fn cache_size(&self) -> usize {
        self.cache
            .read()
            .expect("condition cache lock poisoned")
            .len()
    }
}

/// One-shot evaluation without a cache, usable standalone.
pub fn evaluate_condition(text: &str, data: &ConditionData) -> EngineResult<bool> {
    let expr = parse_condition(text)?;
    evaluate_expression(&expr, data)
}

/// Cache key: condition text plus a projection of only the fields the text
/// mentions. Unrelated data changes therefore still hit the cache.
fn cache_key(text: &str, data: &ConditionData) -> String {
    let mut key = String::from(text);
    key.push('\u{1}');
    for field in referenced_fields(text) {
        key.push_str(&field);
        key.push('=');
        match data.get(&field) {
            Some(value) => key.push_str(&value.to_string()),
            None => key.push('\u{0}'),
        }
        key.push(';');
    }
    key
}

/// Walks the chain: the head combines with the recursively evaluated
/// remainder. Evaluation is pure, so both sides always evaluate.
pub fn evaluate_expression(expr: &ConditionExpression, data: &ConditionData) -> EngineResult<bool> {
    let head = evaluate_single(expr, data)?;
    match &expr.chain {
        None => Ok(head),
        Some((LogicalOp::And, rest)) => Ok(head & evaluate_expression(rest, data)?),
        Some((LogicalOp::Or, rest)) => Ok(head | evaluate_expression(rest, data)?),
    }
}

fn evaluate_single(expr: &ConditionExpression, data: &ConditionData) -> EngineResult<bool> {
    let actual = data.get(&expr.field);

    match expr.operator {
        Operator::IsNull => return Ok(actual.map_or(true, |v| v.is_null())),
        Operator::IsNotNull => return Ok(actual.is_some_and(|v| !v.is_null())),
        _ => {}
    }

    // Undefined fields fail every remaining comparison.
    let Some(actual) = actual else {
        return Ok(false);
    };

    let expected = expr.value.as_ref().ok_or_else(|| {
        EngineError::new(
            ErrorCode::ConditionSyntax,
            format!("operator '{}' requires a value", expr.operator),
        )
    })?;

    match expr.operator {
        Operator::Eq => Ok(values_equal(actual, expected)),
        Operator::Ne => Ok(!values_equal(actual, expected)),
        Operator::Gt => Ok(compare(actual, expected).is_some_and(|o| o.is_gt())),
        Operator::Ge => Ok(compare(actual, expected).is_some_and(|o| o.is_ge())),
        Operator::Lt => Ok(compare(actual, expected).is_some_and(|o| o.is_lt())),
        Operator::Le => Ok(compare(actual, expected).is_some_and(|o| o.is_le())),
        Operator::In => Ok(list_contains(expected, actual)),
        Operator::NotIn => Ok(!list_contains(expected, actual)),
        Operator::Contains => Ok(contains(actual, expected)),
        Operator::Matches => matches_regex(actual, expected),
        Operator::IsNull | Operator::IsNotNull => unreachable!("handled above"),
    }
}

fn values_equal(actual: &JsonValue, expected: &ConditionValue) -> bool {
    match expected {
        ConditionValue::Str(s) => actual.as_str() == Some(s.as_str()),
        ConditionValue::Number(n) => actual.as_f64() == Some(*n),
        ConditionValue::Bool(b) => actual.as_bool() == Some(*b),
        ConditionValue::Null => actual.is_null(),
        ConditionValue::List(_) | ConditionValue::Regex { .. } => false,
    }
}

fn compare(actual: &JsonValue, expected: &ConditionValue) -> Option<std::cmp::Ordering> {
    match expected {
        ConditionValue::Number(n) => actual.as_f64().and_then(|a| a.partial_cmp(n)),
        ConditionValue::Str(s) => actual.as_str().map(|a| a.cmp(s.as_str())),
        _ => None,
    }
}

fn list_contains(expected: &ConditionValue, actual: &JsonValue) -> bool {
    let ConditionValue::List(items) = expected else {
        return false;
    };
    items.iter().any(|item| values_equal(actual, item))
}

/// `contains` supports string substring and array membership.
fn contains(actual: &JsonValue, expected: &ConditionValue) -> bool {
    match actual {
        JsonValue::String(haystack) => {
            let needle = match expected {
                ConditionValue::Str(s) => s.clone(),
                ConditionValue::Number(n) => format_number(*n),
                ConditionValue::Bool(b) => b.to_string(),
                _ => return false,
            };
            haystack.contains(&needle)
        }
        JsonValue::Array(items) => items.iter().any(|item| values_equal(item, expected)),
        _ => false,
    }
}

/// Compiles the pattern at evaluation time; flags map onto inline groups.
fn matches_regex(actual: &JsonValue, expected: &ConditionValue) -> EngineResult<bool> {
    let ConditionValue::Regex { pattern, flags } = expected else {
        return Ok(false);
    };
    let Some(haystack) = actual.as_str() else {
        return Ok(false);
    };

    let mut inline = String::new();
    for flag in flags.chars() {
        match flag {
            'i' => inline.push('i'),
            'm' => inline.push('m'),
            's' => inline.push('s'),
            other => {
                return Err(EngineError::new(
                    ErrorCode::ConditionSyntax,
                    format!("unsupported regex flag '{}'", other),
                ));
            }
        }
    }
    let full_pattern = if inline.is_empty() {
        pattern.clone()
    } else {
        format!("(?{}){}", inline, pattern)
    };

    let regex = Regex::new(&full_pattern).map_err(|e| {
        EngineError::new(
            ErrorCode::ConditionSyntax,
            format!("invalid regex '{}': {}", pattern, e),
        )
    })?;
    Ok(regex.is_match(haystack))
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
