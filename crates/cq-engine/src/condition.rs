//! Built-in conditions
//!
//! Both conditions look at the first input whose id is `"input"` and ignore
//! every later input with the same id. Without such an input they evaluate to
//! `false`.

use async_trait::async_trait;
use cq_core::{first_value, inputs, Condition, ConditionFailure, UserInputValue};
use serde_json::Value;

/// True when the first `"input"` value is boolean `true`
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysTrue;

/// True when the first `"input"` value is boolean `false`
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysFalse;

fn first_input_is(inputs: &[UserInputValue], expected: bool) -> bool {
    matches!(first_value(inputs, inputs::INPUT), Some(Value::Bool(b)) if *b == expected)
}

#[async_trait]
impl Condition for AlwaysTrue {
    fn name(&self) -> &str {
        "always_true"
    }

    async fn evaluate(&self, inputs: &[UserInputValue]) -> Result<bool, ConditionFailure> {
        Ok(first_input_is(inputs, true))
    }
}

#[async_trait]
impl Condition for AlwaysFalse {
    fn name(&self) -> &str {
        "always_false"
    }

    async fn evaluate(&self, inputs: &[UserInputValue]) -> Result<bool, ConditionFailure> {
        Ok(first_input_is(inputs, false))
    }
}
