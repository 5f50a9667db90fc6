//! Context type for tracking causality across dispatches

use std::future::Future;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

tokio::task_local! {
    static CURRENT: Context;
}

/// Context for tracking the origin and causality of event firings
///
/// Every event occurrence carries a Context. A dispatched chain runs inside
/// [`Context::scope`] with its occurrence's context; when it changes a
/// variable and that change raises another event, the second occurrence
/// carries [`Context::caused`], a child of the first context, so re-entrant
/// cascades can be traced back to the firing that started them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Unique identifier for this context (ULID)
    pub id: String,

    /// Parent context ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl Context {
    /// Create a new root context with a fresh ULID
    pub fn new() -> Self {
        Self {
            id: Ulid::new().to_string(),
            parent_id: None,
        }
    }

    /// Create a root context with a specific ID
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
        }
    }

    /// Create a child context with this context as parent
    pub fn child(&self) -> Self {
        Self {
            id: Ulid::new().to_string(),
            parent_id: Some(self.id.clone()),
        }
    }

    /// Whether this context started a cascade
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Context the current task is running under, if any
    pub fn current() -> Option<Context> {
        CURRENT.try_with(Context::clone).ok()
    }

    /// Context for an occurrence raised by the current task
    ///
    /// A child of [`Context::current`] inside a scope, otherwise a new root.
    pub fn caused() -> Context {
        Self::current()
            .map(|current| current.child())
            .unwrap_or_default()
    }

    /// Run `future` with this context as the current one
    pub async fn scope<F: Future>(self, future: F) -> F::Output {
        CURRENT.scope(self, future).await
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_links_to_parent() {
        let root = Context::with_id("root");
        let child = root.child();

        assert!(root.is_root());
        assert!(!child.is_root());
        assert_eq!(child.parent_id.as_deref(), Some("root"));
        assert_ne!(child.id, root.id);
    }

    #[tokio::test]
    async fn test_caused_outside_scope_is_root() {
        assert!(Context::current().is_none());
        assert!(Context::caused().is_root());
    }

    #[tokio::test]
    async fn test_caused_inside_scope_is_child() {
        let root = Context::with_id("dispatch");

        let (current, caused) = root
            .clone()
            .scope(async {
                tokio::task::yield_now().await;
                (Context::current(), Context::caused())
            })
            .await;

        assert_eq!(current, Some(root));
        assert_eq!(caused.parent_id.as_deref(), Some("dispatch"));
        assert!(Context::current().is_none());
    }
}
