#![deny(missing_docs)]

//! # Conditional Expression Engine
//!
//! - **parser**: tokenizer and chain parser for the expression language.
//! - **eval**: pure evaluator plus the bounded FIFO result cache.
//!
//! Usable standalone via [`evaluate_condition`], independent of the
//! validation pipeline.

pub mod eval;
pub mod parser;

pub use eval::{
    evaluate_condition, evaluate_expression, ConditionData, ConditionEngine,
    ConditionEngineConfig,
};
pub use parser::{
    parse_condition, referenced_fields, ConditionExpression, ConditionValue, LogicalOp, Operator,
};
