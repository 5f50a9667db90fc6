//! Read-only and read-write variables

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use cq_core::{Condition, EventRecord, ListenerFailure};
use indexmap::IndexMap;
use tracing::{debug, instrument, trace, warn};

use crate::error::{VariableError, VariableResult};
use crate::listener::{ChangeListener, ListenerFuture, ListenerHandle};

/// A named, typed state cell
#[async_trait]
pub trait Variable<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    /// Unique id of the variable
    fn unique_id(&self) -> &str;

    /// Display name of the variable
    fn name(&self) -> &str;

    /// Conditions describing when the variable may change
    ///
    /// Informational only; the variable never evaluates them.
    fn conditions(&self) -> &[Arc<dyn Condition>];

    /// Events associated with the variable
    ///
    /// Informational only; the variable never fires them.
    fn events(&self) -> &[EventRecord];

    /// Current value of the variable
    async fn retrieve_value(&self) -> T;
}

/// Options used to construct a variable
pub struct VariableOptions<T> {
    pub unique_id: String,
    pub name: String,
    pub starting_value: T,
    pub conditions: Vec<Arc<dyn Condition>>,
    pub events: Vec<EventRecord>,
}

impl<T> VariableOptions<T> {
    /// Options with no conditions or events
    pub fn new(unique_id: impl Into<String>, name: impl Into<String>, starting_value: T) -> Self {
        Self {
            unique_id: unique_id.into(),
            name: name.into(),
            starting_value,
            conditions: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn with_conditions(mut self, conditions: Vec<Arc<dyn Condition>>) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn with_events(mut self, events: Vec<EventRecord>) -> Self {
        self.events = events;
        self
    }
}

/// A variable whose value is fixed at construction
pub struct ReadOnlyVariable<T> {
    unique_id: String,
    name: String,
    starting_value: T,
    conditions: Vec<Arc<dyn Condition>>,
    events: Vec<EventRecord>,
}

impl<T> ReadOnlyVariable<T> {
    pub fn new(options: VariableOptions<T>) -> Self {
        Self {
            unique_id: options.unique_id,
            name: options.name,
            starting_value: options.starting_value,
            conditions: options.conditions,
            events: options.events,
        }
    }

    /// The value the variable was created with
    pub fn starting_value(&self) -> &T {
        &self.starting_value
    }
}

#[async_trait]
impl<T> Variable<T> for ReadOnlyVariable<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn conditions(&self) -> &[Arc<dyn Condition>] {
        &self.conditions
    }

    fn events(&self) -> &[EventRecord] {
        &self.events
    }

    async fn retrieve_value(&self) -> T {
        self.starting_value.clone()
    }
}

/// A mutable variable that notifies change listeners
///
/// The value is guarded by its own lock, which is never held while listeners
/// run. Concurrent updates from independent chains race; the last write wins.
pub struct ReadWriteVariable<T> {
    unique_id: String,
    name: String,
    starting_value: T,
    current_value: tokio::sync::RwLock<T>,
    conditions: Vec<Arc<dyn Condition>>,
    events: Vec<EventRecord>,
    /// Registered listeners in registration order
    listeners: RwLock<IndexMap<ListenerHandle, ChangeListener<T>>>,
    /// Counter for generating listener handles
    next_listener_id: AtomicU64,
}

impl<T> ReadWriteVariable<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(options: VariableOptions<T>) -> Self {
        Self {
            unique_id: options.unique_id,
            name: options.name,
            current_value: tokio::sync::RwLock::new(options.starting_value.clone()),
            starting_value: options.starting_value,
            conditions: options.conditions,
            events: options.events,
            listeners: RwLock::new(IndexMap::new()),
            next_listener_id: AtomicU64::new(1),
        }
    }

    /// The value the variable was created with
    pub fn starting_value(&self) -> &T {
        &self.starting_value
    }

    /// Register an async change listener
    pub fn add_change_event_listener<F, Fut>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ListenerFailure>> + Send + 'static,
    {
        let listener: ChangeListener<T> =
            Arc::new(move |value| Box::pin(listener(value)) as ListenerFuture);
        self.register_listener(listener)
    }

    /// Register an already boxed listener
    ///
    /// Registering the same `Arc` twice stores it twice, and it is called
    /// twice per update.
    pub fn register_listener(&self, listener: ChangeListener<T>) -> ListenerHandle {
        let handle = ListenerHandle(self.next_listener_id.fetch_add(1, Ordering::SeqCst));

        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle, listener);

        trace!(variable_id = %self.unique_id, %handle, "Added change listener");
        handle
    }

    /// Remove a listener registration
    ///
    /// Returns `false` when the handle was not registered.
    pub fn remove_change_event_listener(&self, handle: ListenerHandle) -> bool {
        let removed = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .shift_remove(&handle)
            .is_some();

        trace!(variable_id = %self.unique_id, %handle, removed, "Removed change listener");
        removed
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Store a new value and notify listeners
    ///
    /// By the time this resolves, `retrieve_value` returns `new_value` unless
    /// a listener or a concurrent caller has written again since. Every
    /// listener registered when notification starts is called exactly once,
    /// even if earlier ones fail; failures are returned together.
    #[instrument(skip(self, new_value), fields(variable_id = %self.unique_id))]
    pub async fn update_value(&self, new_value: T) -> VariableResult<()> {
        {
            let mut current = self.current_value.write().await;
            *current = new_value.clone();
        }

        let snapshot: Vec<(ListenerHandle, ChangeListener<T>)> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(handle, listener)| (*handle, listener.clone()))
            .collect();

        debug!(listeners = snapshot.len(), "Variable updated, notifying listeners");

        let mut failures = Vec::new();
        for (handle, listener) in snapshot {
            if let Err(failure) = listener(new_value.clone()).await {
                warn!(%handle, error = %failure, "Change listener failed");
                failures.push(failure);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(VariableError::ListenerFailures {
                variable_id: self.unique_id.clone(),
                failures,
            })
        }
    }
}

#[async_trait]
impl<T> Variable<T> for ReadWriteVariable<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn conditions(&self) -> &[Arc<dyn Condition>] {
        &self.conditions
    }

    fn events(&self) -> &[EventRecord] {
        &self.events
    }

    async fn retrieve_value(&self) -> T {
        self.current_value.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cq_core::{ConditionFailure, EventSource, UserInputValue};
    use std::sync::Mutex;

    struct Never;

    #[async_trait]
    impl Condition for Never {
        async fn evaluate(&self, _inputs: &[UserInputValue]) -> Result<bool, ConditionFailure> {
            Ok(false)
        }
    }

    fn read_write(starting: &str) -> ReadWriteVariable<String> {
        ReadWriteVariable::new(VariableOptions::new(
            "variable-1",
            "Variable 1",
            starting.to_string(),
        ))
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> ChangeListener<String> {
        let log = log.clone();
        Arc::new(move |value: String| {
            let log = log.clone();
            Box::pin(async move {
                log.lock().unwrap().push(format!("{tag}:{value}"));
                Ok(())
            }) as ListenerFuture
        })
    }

    #[tokio::test]
    async fn test_read_only_stores_constructor_values() {
        let condition: Arc<dyn Condition> = Arc::new(Never);
        let event = EventRecord::new("event-1").with_source(EventSource::VariableValueChanged {
            variable_id: "nested-variable-1".to_string(),
        });

        let variable = ReadOnlyVariable::new(
            VariableOptions::new("variable-1", "Variable 1", String::new())
                .with_conditions(vec![condition.clone()])
                .with_events(vec![event.clone()]),
        );

        assert_eq!(variable.unique_id(), "variable-1");
        assert_eq!(variable.name(), "Variable 1");
        assert_eq!(variable.retrieve_value().await, "");
        assert_eq!(variable.conditions().len(), 1);
        assert!(Arc::ptr_eq(&variable.conditions()[0], &condition));
        assert_eq!(variable.events(), &[event]);
    }

    #[tokio::test]
    async fn test_read_only_value_never_changes() {
        let variable = ReadOnlyVariable::new(VariableOptions::new("v", "V", 42_i64));

        for _ in 0..3 {
            assert_eq!(variable.retrieve_value().await, 42);
        }
        assert_eq!(*variable.starting_value(), 42);
    }

    #[tokio::test]
    async fn test_update_value_is_visible_immediately() {
        let variable = read_write("");

        variable.update_value("new value".to_string()).await.unwrap();

        assert_eq!(variable.retrieve_value().await, "new value");
        assert_eq!(variable.starting_value(), "");
    }

    #[tokio::test]
    async fn test_all_listeners_called_with_new_value() {
        let variable = read_write("");
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c", "d", "e"] {
            variable.register_listener(recorder(&log, tag));
        }

        variable.update_value("new value".to_string()).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "a:new value",
                "b:new value",
                "c:new value",
                "d:new value",
                "e:new value"
            ]
        );
    }

    #[tokio::test]
    async fn test_removed_listener_not_called() {
        let variable = read_write("");
        let log = Arc::new(Mutex::new(Vec::new()));

        let removed = variable.register_listener(recorder(&log, "removed"));
        for tag in ["a", "b", "c"] {
            variable.register_listener(recorder(&log, tag));
        }

        assert!(variable.remove_change_event_listener(removed));
        assert!(!variable.remove_change_event_listener(removed));

        variable.update_value("new value".to_string()).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:new value", "b:new value", "c:new value"]
        );
        assert_eq!(variable.listener_count(), 3);
    }

    #[tokio::test]
    async fn test_same_listener_registered_twice_fires_twice() {
        let variable = read_write("");
        let log = Arc::new(Mutex::new(Vec::new()));
        let listener = recorder(&log, "twice");

        let first = variable.register_listener(listener.clone());
        let second = variable.register_listener(listener);
        assert_ne!(first, second);

        variable.update_value("x".to_string()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["twice:x", "twice:x"]);

        variable.remove_change_event_listener(first);
        variable.update_value("y".to_string()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["twice:x", "twice:x", "twice:y"]);
    }

    #[tokio::test]
    async fn test_poisoned_listener_lock_keeps_registrations() {
        let variable = read_write("");
        let log = Arc::new(Mutex::new(Vec::new()));

        let poisoned = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = variable.listeners.write().unwrap();
            panic!("listener table poisoned");
        }));
        assert!(poisoned.is_err());
        assert!(variable.listeners.is_poisoned());

        let handle = variable.register_listener(recorder(&log, "kept"));
        assert_eq!(variable.listener_count(), 1);

        variable.update_value("on".to_string()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["kept:on"]);

        assert!(variable.remove_change_event_listener(handle));
        assert_eq!(variable.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_stop_delivery() {
        let variable = read_write("");
        let log = Arc::new(Mutex::new(Vec::new()));

        variable.register_listener(recorder(&log, "before"));
        variable.add_change_event_listener(|_value: String| async move {
            Err(ListenerFailure::new("display offline"))
        });
        variable.register_listener(recorder(&log, "after"));

        let err = variable.update_value("on".to_string()).await.unwrap_err();
        let VariableError::ListenerFailures {
            variable_id,
            failures,
        } = err;
        assert_eq!(variable_id, "variable-1");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].message(), "display offline");

        assert_eq!(variable.retrieve_value().await, "on");
        assert_eq!(*log.lock().unwrap(), vec!["before:on", "after:on"]);
    }

    #[tokio::test]
    async fn test_reentrant_update_runs_nested_round() {
        let variable = Arc::new(read_write("start"));
        let log = Arc::new(Mutex::new(Vec::new()));

        let weak = Arc::downgrade(&variable);
        let log_a = log.clone();
        variable.add_change_event_listener(move |value: String| {
            let weak = weak.clone();
            let log = log_a.clone();
            async move {
                log.lock().unwrap().push(format!("a:{value}"));
                if value == "first" {
                    if let Some(variable) = weak.upgrade() {
                        variable
                            .update_value("second".to_string())
                            .await
                            .map_err(|e| ListenerFailure::with_source("nested update", e))?;
                    }
                }
                Ok(())
            }
        });
        variable.register_listener(recorder(&log, "b"));

        variable.update_value("first".to_string()).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:first", "a:second", "b:second", "b:first"]
        );
        assert_eq!(variable.retrieve_value().await, "second");
    }

    #[tokio::test]
    async fn test_listener_added_during_round_waits_for_next_round() {
        let variable = Arc::new(read_write(""));
        let log = Arc::new(Mutex::new(Vec::new()));

        let weak = Arc::downgrade(&variable);
        let late = recorder(&log, "late");
        let added = Arc::new(Mutex::new(false));
        variable.add_change_event_listener(move |_value: String| {
            let weak = weak.clone();
            let late = late.clone();
            let added = added.clone();
            async move {
                let mut added = added.lock().unwrap();
                if !*added {
                    if let Some(variable) = weak.upgrade() {
                        variable.register_listener(late);
                    }
                    *added = true;
                }
                Ok(())
            }
        });

        variable.update_value("one".to_string()).await.unwrap();
        assert!(log.lock().unwrap().is_empty());

        variable.update_value("two".to_string()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["late:two"]);
    }
}
