#![deny(missing_docs)]

//! # Check-Condition Command
//!
//! Exercises the standalone condition entry point: parse an expression,
//! evaluate it against `key=value` bindings, and print the verdict.

use clap::Args;
use serde_json::Value as JsonValue;
use typeforge_core::{evaluate_condition, ConditionData, EngineError, EngineResult, ErrorCode};

/// Arguments for `typeforge check-condition`.
#[derive(Args, Debug)]
pub struct CheckConditionArgs {
    /// The condition expression, e.g. `"age >= 18 AND role in ['admin']"`.
    pub expression: String,

    /// Data binding as `key=value`; values parse as JSON, else as strings.
    /// Repeatable.
    #[clap(long = "data", short = 'd')]
    pub data: Vec<String>,
}

/// Runs the check-condition command.
pub fn execute(args: &CheckConditionArgs) -> EngineResult<()> {
    let data = parse_bindings(&args.data)?;
    let verdict = evaluate_condition(&args.expression, &data)?;
    println!("{}", verdict);
    Ok(())
}

fn parse_bindings(pairs: &[String]) -> EngineResult<ConditionData> {
    let mut data = ConditionData::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(EngineError::new(
                ErrorCode::ConditionSyntax,
                format!("data binding '{}' must look like key=value", pair),
            ));
        };
        let value: JsonValue =
            serde_json::from_str(value).unwrap_or_else(|_| JsonValue::String(value.to_string()));
        data.insert(key.to_string(), value);
    }
    Ok(data)
}
