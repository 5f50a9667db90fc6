//! Core types for Consequences
//!
//! This crate provides the fundamental types shared by every other crate in
//! the workspace: user input values, the `Condition` and `Action`
//! capabilities, their failure types, event records and the `Context` used to
//! trace causality across re-entrant chain dispatches.

mod capability;
mod context;
mod event;
mod failure;
mod input;

pub use capability::{Action, Condition};
pub use context::Context;
pub use event::{EventId, EventOccurrence, EventOrigin, EventRecord, EventSource};
pub use failure::{ActionFailure, BoxError, ConditionFailure, ListenerFailure};
pub use input::{first_value, UserInputValue};

/// Well-known input ids
pub mod inputs {
    /// Id of the single input consumed by the boolean conditions
    pub const INPUT: &str = "input";
}
