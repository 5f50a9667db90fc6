//! Error types for variables

use cq_core::ListenerFailure;
use thiserror::Error;

/// Result type for variable operations
pub type VariableResult<T> = Result<T, VariableError>;

/// Errors raised by variable operations
#[derive(Debug, Error)]
pub enum VariableError {
    /// One or more change listeners failed
    ///
    /// The update itself was applied and every other listener was still
    /// notified.
    #[error("{} change listener(s) of variable {variable_id} failed", .failures.len())]
    ListenerFailures {
        variable_id: String,
        failures: Vec<ListenerFailure>,
    },
}
