#![deny(missing_docs)]

//! # Condition Parsing
//!
//! Tokenizer and parser for the conditional-validation expression language.
//!
//! The grammar is deliberately small: a chain of single conditions joined by
//! `AND`/`OR`, with no parentheses and no operator precedence. Parsing splits
//! on the **first** logical operator found, so `a AND b OR c` parses as
//! `a AND (b OR c)`: chains lean right. Keywords are case-insensitive.

use crate::error::{EngineError, EngineResult, ErrorCode};
use derive_more::Display;
use regex::Regex;
use std::sync::OnceLock;

/// Comparison, membership, and presence operators.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `==`
    #[display("==")]
    Eq,
    /// `!=`
    #[display("!=")]
    Ne,
    /// `>`
    #[display(">")]
    Gt,
    /// `>=`
    #[display(">=")]
    Ge,
    /// `<`
    #[display("<")]
    Lt,
    /// `<=`
    #[display("<=")]
    Le,
    /// `in [..]`
    #[display("in")]
    In,
    /// `not in [..]`
    #[display("not_in")]
    NotIn,
    /// substring / array membership
    #[display("contains")]
    Contains,
    /// regular-expression match
    #[display("matches")]
    Matches,
    /// field absent or null
    #[display("is_null")]
    IsNull,
    /// field present and non-null
    #[display("is_not_null")]
    IsNotNull,
}

/// Logical connective between chained conditions.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// Both sides must hold.
    #[display("AND")]
    And,
    /// Either side must hold.
    #[display("OR")]
    Or,
}

/// A literal value on the right-hand side of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    /// Quoted string or bare word.
    Str(String),
    /// Numeric literal.
    Number(f64),
    /// `true` / `false`.
    Bool(bool),
    /// `null`.
    Null,
    /// `[v, v, ...]` membership list.
    List(Vec<ConditionValue>),
    /// `/pattern/flags` regex literal.
    Regex {
        /// The pattern between the slashes.
        pattern: String,
        /// Trailing flags (`i`, `m`, `s`).
        flags: String,
    },
}

/// A parsed condition: one comparison plus an optional chained continuation.
///
/// A bare `field` condition desugars to `field == true`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionExpression {
    /// Field name looked up in the evaluation data map.
    pub field: String,
    /// Operator applied to the field.
    pub operator: Operator,
    /// Right-hand value, absent for presence operators.
    pub value: Option<ConditionValue>,
    /// Chained continuation: the rest of the expression after the first
    /// logical operator.
    pub chain: Option<(LogicalOp, Box<ConditionExpression>)>,
}

const KEYWORDS: &[&str] = &[
    "and", "or", "is", "not", "in", "null", "contains", "matches", "true", "false",
];

fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|k| word.eq_ignore_ascii_case(k))
}

/// Scans a condition text for the field identifiers it mentions.
///
/// This is a plain identifier scan excluding grammar keywords. It may
/// over-approximate by picking up bare-word values, which is harmless for
/// its purpose (projecting the evaluation data for the result cache).
pub fn referenced_fields(text: &str) -> Vec<String> {
    static IDENT_RE: OnceLock<Regex> = OnceLock::new();
    let re = IDENT_RE.get_or_init(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_.]*").expect("static regex"));

    let mut fields = Vec::new();
    for found in re.find_iter(text) {
        let word = found.as_str();
        if is_keyword(word) {
            continue;
        }
        if !fields.iter().any(|f| f == word) {
            fields.push(word.to_string());
        }
    }
    fields
}

/// Parses a condition text into its chain representation.
pub fn parse_condition(text: &str) -> EngineResult<ConditionExpression> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(syntax_error(text, "condition is empty"));
    }
    parse_chain(&tokens, text)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    Number(f64),
    Compare(&'static str),
    ListStart,
    ListEnd,
    Comma,
    Regex { pattern: String, flags: String },
}

fn syntax_error(text: &str, reason: &str) -> EngineError {
    EngineError::new(
        ErrorCode::ConditionSyntax,
        format!("invalid condition '{}': {}", text, reason),
    )
    .with_suggestion("expected: FIELD <op> <value>, FIELD is [not] null, FIELD [not] in [..]")
}

fn tokenize(text: &str) -> EngineResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some(ch) = chars.next() {
                    if ch == '\\' {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    } else if ch == quote {
                        closed = true;
                        break;
                    } else {
                        value.push(ch);
                    }
                }
                if !closed {
                    return Err(syntax_error(text, "unterminated string literal"));
                }
                tokens.push(Token::Quoted(value));
            }
            '/' => {
                chars.next();
                let mut pattern = String::new();
                let mut closed = false;
                while let Some(ch) = chars.next() {
                    if ch == '\\' {
                        if let Some(escaped) = chars.next() {
                            if escaped != '/' {
                                pattern.push('\\');
                            }
                            pattern.push(escaped);
                        }
                    } else if ch == '/' {
                        closed = true;
                        break;
                    } else {
                        pattern.push(ch);
                    }
                }
                if !closed {
                    return Err(syntax_error(text, "unterminated regex literal"));
                }
                let mut flags = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphabetic() {
                        flags.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Regex { pattern, flags });
            }
            '[' => {
                chars.next();
                tokens.push(Token::ListStart);
            }
            ']' => {
                chars.next();
                tokens.push(Token::ListEnd);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '=' | '!' | '<' | '>' => {
                chars.next();
                let eq_follows = chars.peek() == Some(&'=');
                let op = match (c, eq_follows) {
                    ('=', true) => "==",
                    ('!', true) => "!=",
                    ('<', true) => "<=",
                    ('>', true) => ">=",
                    ('<', false) => "<",
                    ('>', false) => ">",
                    _ => return Err(syntax_error(text, &format!("stray '{}'", c))),
                };
                if eq_follows {
                    chars.next();
                }
                tokens.push(Token::Compare(op));
            }
            _ => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' || ch == '.' || ch == '-' {
                        word.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if word.is_empty() {
                    return Err(syntax_error(text, &format!("unexpected character '{}'", c)));
                }
                if let Ok(number) = word.parse::<f64>() {
                    tokens.push(Token::Number(number));
                } else {
                    tokens.push(Token::Word(word));
                }
            }
        }
    }

    Ok(tokens)
}

/// Splits on the first top-level `AND`/`OR`; the remainder parses
/// recursively, which is what makes chains lean right.
fn parse_chain(tokens: &[Token], text: &str) -> EngineResult<ConditionExpression> {
    let mut depth = 0usize;
    for (index, token) in tokens.iter().enumerate() {
        match token {
            Token::ListStart => depth += 1,
            Token::ListEnd => depth = depth.saturating_sub(1),
            Token::Word(word) if depth == 0 => {
                let logical = if word.eq_ignore_ascii_case("and") {
                    Some(LogicalOp::And)
                } else if word.eq_ignore_ascii_case("or") {
                    Some(LogicalOp::Or)
                } else {
                    None
                };
                if let Some(op) = logical {
                    let mut head = parse_single(&tokens[..index], text)?;
                    let rest = parse_chain(&tokens[index + 1..], text)?;
                    head.chain = Some((op, Box::new(rest)));
                    return Ok(head);
                }
            }
            _ => {}
        }
    }
    parse_single(tokens, text)
}

fn parse_single(tokens: &[Token], text: &str) -> EngineResult<ConditionExpression> {
    let Some((first, rest)) = tokens.split_first() else {
        return Err(syntax_error(text, "missing condition before or after a logical operator"));
    };
    let Token::Word(field) = first else {
        return Err(syntax_error(text, "condition must start with a field name"));
    };
    if is_keyword(field) {
        return Err(syntax_error(
            text,
            &format!("'{}' is a reserved keyword, not a field name", field),
        ));
    }

    let condition = |operator, value| ConditionExpression {
        field: field.clone(),
        operator,
        value,
        chain: None,
    };

    match rest {
        // Bare field: truthiness shorthand.
        [] => Ok(condition(Operator::Eq, Some(ConditionValue::Bool(true)))),

        [Token::Word(w1), Token::Word(w2)]
            if w1.eq_ignore_ascii_case("is") && w2.eq_ignore_ascii_case("null") =>
        {
            Ok(condition(Operator::IsNull, None))
        }
        [Token::Word(w1), Token::Word(w2), Token::Word(w3)]
            if w1.eq_ignore_ascii_case("is")
                && w2.eq_ignore_ascii_case("not")
                && w3.eq_ignore_ascii_case("null") =>
        {
            Ok(condition(Operator::IsNotNull, None))
        }

        [Token::Word(w1), Token::Word(w2), list @ ..]
            if w1.eq_ignore_ascii_case("not") && w2.eq_ignore_ascii_case("in") =>
        {
            Ok(condition(Operator::NotIn, Some(parse_list(list, text)?)))
        }
        [Token::Word(w), list @ ..] if w.eq_ignore_ascii_case("in") => {
            Ok(condition(Operator::In, Some(parse_list(list, text)?)))
        }

        [Token::Word(w), value] if w.eq_ignore_ascii_case("contains") => {
            Ok(condition(Operator::Contains, Some(parse_value(value, text)?)))
        }

        [Token::Word(w), Token::Regex { pattern, flags }] if w.eq_ignore_ascii_case("matches") => {
            Ok(condition(
                Operator::Matches,
                Some(ConditionValue::Regex {
                    pattern: pattern.clone(),
                    flags: flags.clone(),
                }),
            ))
        }

        [Token::Compare(op), value] => {
            let operator = match *op {
                "==" => Operator::Eq,
                "!=" => Operator::Ne,
                ">" => Operator::Gt,
                ">=" => Operator::Ge,
                "<" => Operator::Lt,
                "<=" => Operator::Le,
                _ => return Err(syntax_error(text, &format!("unknown operator '{}'", op))),
            };
            Ok(condition(operator, Some(parse_value(value, text)?)))
        }

        _ => Err(syntax_error(text, "unrecognized condition form")),
    }
}

fn parse_value(token: &Token, text: &str) -> EngineResult<ConditionValue> {
    match token {
        Token::Quoted(s) => Ok(ConditionValue::Str(s.clone())),
        Token::Number(n) => Ok(ConditionValue::Number(*n)),
        Token::Word(w) if w.eq_ignore_ascii_case("true") => Ok(ConditionValue::Bool(true)),
        Token::Word(w) if w.eq_ignore_ascii_case("false") => Ok(ConditionValue::Bool(false)),
        Token::Word(w) if w.eq_ignore_ascii_case("null") => Ok(ConditionValue::Null),
        Token::Word(w) if !is_keyword(w) => Ok(ConditionValue::Str(w.clone())),
        _ => Err(syntax_error(text, "expected a value")),
    }
}

fn parse_list(tokens: &[Token], text: &str) -> EngineResult<ConditionValue> {
    let Some((Token::ListStart, inner)) = tokens.split_first() else {
        return Err(syntax_error(text, "expected '[' after in/not in"));
    };
    let Some((Token::ListEnd, items)) = inner.split_last() else {
        return Err(syntax_error(text, "membership list is not closed with ']'"));
    };

    let mut values = Vec::new();
    let mut expect_value = true;
    for token in items {
        if expect_value {
            values.push(parse_value(token, text)?);
            expect_value = false;
        } else {
            if *token != Token::Comma {
                return Err(syntax_error(text, "list values must be comma-separated"));
            }
            expect_value = true;
        }
    }
    if expect_value && !values.is_empty() {
        return Err(syntax_error(text, "trailing comma in membership list"));
    }
    if values.is_empty() {
        return Err(syntax_error(text, "membership list is empty"));
    }
    Ok(ConditionValue::List(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_single_comparison_has_no_chain() {
        let expr = parse_condition("age >= 18").unwrap();
        assert_eq!(expr.field, "age");
        assert_eq!(expr.operator, Operator::Ge);
        assert_eq!(expr.value, Some(ConditionValue::Number(18.0)));
        assert!(expr.chain.is_none());
    }

    #[test]
    fn test_quoted_string_value() {
        let expr = parse_condition("status == 'ACTIVE'").unwrap();
        assert_eq!(expr.operator, Operator::Eq);
        assert_eq!(expr.value, Some(ConditionValue::Str("ACTIVE".to_string())));
    }

    #[test]
    fn test_membership_list() {
        let expr = parse_condition("role in ['admin', 'user']").unwrap();
        assert_eq!(expr.operator, Operator::In);
        assert_eq!(
            expr.value,
            Some(ConditionValue::List(vec![
                ConditionValue::Str("admin".to_string()),
                ConditionValue::Str("user".to_string()),
            ]))
        );
    }

    #[test]
    fn test_not_in_list() {
        let expr = parse_condition("country not in ['US', 'CA']").unwrap();
        assert_eq!(expr.operator, Operator::NotIn);
    }

    #[test]
    fn test_null_checks() {
        let expr = parse_condition("deleted_at is null").unwrap();
        assert_eq!(expr.operator, Operator::IsNull);
        assert!(expr.value.is_none());

        let expr = parse_condition("deleted_at IS NOT NULL").unwrap();
        assert_eq!(expr.operator, Operator::IsNotNull);
    }

    #[test]
    fn test_regex_literal_with_flags() {
        let expr = parse_condition("email matches /@example\\.com$/i").unwrap();
        assert_eq!(
            expr.value,
            Some(ConditionValue::Regex {
                pattern: "@example\\.com$".to_string(),
                flags: "i".to_string(),
            })
        );
    }

    #[test]
    fn test_chain_splits_on_first_logical_operator() {
        let expr = parse_condition("a == 1 AND b == 2 OR c == 3").unwrap();
        assert_eq!(expr.field, "a");

        let (op, rest) = expr.chain.as_ref().unwrap();
        assert_eq!(*op, LogicalOp::And);
        assert_eq!(rest.field, "b");

        // The remainder chains right: b == 2 OR c == 3.
        let (op2, rest2) = rest.chain.as_ref().unwrap();
        assert_eq!(*op2, LogicalOp::Or);
        assert_eq!(rest2.field, "c");
        assert!(rest2.chain.is_none());
    }

    #[test]
    fn test_bare_field_desugars_to_truthy() {
        let expr = parse_condition("approved").unwrap();
        assert_eq!(expr.operator, Operator::Eq);
        assert_eq!(expr.value, Some(ConditionValue::Bool(true)));
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let expr = parse_condition("x == 1 and y == 2").unwrap();
        assert_eq!(expr.chain.as_ref().unwrap().0, LogicalOp::And);
    }

    #[test]
    fn test_logical_operator_inside_list_does_not_split() {
        // 'and' between brackets is a value, not a connective.
        let expr = parse_condition("tag in [and, or]");
        // Keyword values inside lists are rejected as values, which is fine:
        // the parse must not silently split the chain there.
        assert!(expr.is_err());
    }

    #[test]
    fn test_malformed_conditions_fail_with_offending_text() {
        for text in ["", "==", "age >=", "role in [", "a ANDAND b", "is null"] {
            let err = parse_condition(text).unwrap_err();
            assert_eq!(err.code, ErrorCode::ConditionSyntax, "text: {}", text);
        }
        let err = parse_condition("age >=").unwrap_err();
        assert!(err.message.contains("age >="), "message carries the text");
    }

    #[test]
    fn test_referenced_fields_excludes_keywords() {
        let fields = referenced_fields("age >= 18 AND status in ['A'] OR flag");
        assert_eq!(
            fields,
            vec!["age".to_string(), "status".to_string(), "flag".to_string()]
        );
    }

    #[test]
    fn test_referenced_fields_dedup_preserves_order() {
        let fields = referenced_fields("a == 1 OR a == 2 OR b == 3");
        assert_eq!(fields, vec!["a".to_string(), "b".to_string()]);
    }
}
