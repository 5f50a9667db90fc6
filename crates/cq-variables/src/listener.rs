//! Change listener registrations

use std::sync::Arc;

use cq_core::ListenerFailure;
use futures::future::BoxFuture;

/// Future returned by a change listener
pub type ListenerFuture = BoxFuture<'static, Result<(), ListenerFailure>>;

/// Change listener function type
///
/// Receives the new value of the variable.
pub type ChangeListener<T> = Arc<dyn Fn(T) -> ListenerFuture + Send + Sync>;

/// Token identifying one listener registration
///
/// Registering the same listener twice yields two distinct handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(pub(crate) u64);

impl ListenerHandle {
    /// Raw registration number
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}
