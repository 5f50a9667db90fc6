//! Built-in actions

use std::sync::Arc;

use async_trait::async_trait;
use cq_core::{first_value, Action, ActionFailure, UserInputValue};
use cq_variables::{ReadWriteVariable, Variable};
use tracing::debug;

/// Id of the input holding the value written by [`UpdateVariable`]
pub const VALUE_INPUT: &str = "value";

/// Writes the first `"value"` input into a read-write variable
///
/// Listener failures raised by the update are reported as an action failure;
/// the value itself has already been stored by then.
pub struct UpdateVariable {
    variable: Arc<ReadWriteVariable<serde_json::Value>>,
}

impl UpdateVariable {
    pub fn new(variable: Arc<ReadWriteVariable<serde_json::Value>>) -> Self {
        Self { variable }
    }
}

#[async_trait]
impl Action for UpdateVariable {
    fn name(&self) -> &str {
        "update_variable"
    }

    async fn perform(&self, inputs: &[UserInputValue]) -> Result<(), ActionFailure> {
        let value = first_value(inputs, VALUE_INPUT).cloned().ok_or_else(|| {
            ActionFailure::new(format!(
                "no '{}' input for variable {}",
                VALUE_INPUT,
                self.variable.unique_id()
            ))
        })?;

        debug!(variable_id = %self.variable.unique_id(), "Updating variable from action");

        self.variable.update_value(value).await.map_err(|e| {
            ActionFailure::with_source(
                format!("updating variable {}", self.variable.unique_id()),
                e,
            )
        })
    }
}
