//! Variables for Consequences
//!
//! Variables are named, typed state cells owned by addon instances. Conditions
//! read them and actions write them. Two flavours exist:
//!
//! - [`ReadOnlyVariable`] holds the value it was created with forever
//! - [`ReadWriteVariable`] can be updated and notifies change listeners
//!
//! A [`VariableValueChangedEvent`] turns changes of a read-write variable into
//! event occurrences on the bus, which is how a variable change re-enters the
//! engine and dispatches further chains.
//!
//! # Notification policy
//!
//! `update_value` stores the new value first, then snapshots the listener list
//! and calls each listener in registration order, awaiting it to completion.
//! Listeners added or removed while a round is in flight do not affect that
//! round. A listener that updates a variable itself starts a nested round that
//! completes before the outer round moves on to its next listener.

mod change_event;
mod error;
mod listener;
mod variable;

pub use change_event::VariableValueChangedEvent;
pub use error::{VariableError, VariableResult};
pub use listener::{ChangeListener, ListenerFuture, ListenerHandle};
pub use variable::{ReadOnlyVariable, ReadWriteVariable, Variable, VariableOptions};
