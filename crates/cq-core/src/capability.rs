//! Condition and action capabilities
//!
//! Addons supply concrete conditions and actions as trait objects. The engine
//! only ever sees them through these two small interfaces.

use async_trait::async_trait;

use crate::{ActionFailure, ConditionFailure, UserInputValue};

/// An asynchronous predicate over a list of input values
///
/// Implementations must be deterministic in their inputs and free of side
/// effects. When several inputs share an id, only the first one is consulted.
#[async_trait]
pub trait Condition: Send + Sync {
    /// Name used in logs and traces
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Evaluate the condition against the configured inputs
    async fn evaluate(&self, inputs: &[UserInputValue]) -> Result<bool, ConditionFailure>;
}

/// An asynchronous side effect driven by a list of input values
#[async_trait]
pub trait Action: Send + Sync {
    /// Name used in logs and traces
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Perform the action with the configured inputs
    async fn perform(&self, inputs: &[UserInputValue]) -> Result<(), ActionFailure>;
}
