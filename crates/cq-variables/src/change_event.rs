//! Events raised by variable value changes

use std::sync::Arc;

use cq_core::{Context, EventId, EventOrigin, EventRecord, EventSource, ListenerFailure};
use cq_event_bus::EventBus;
use serde::Serialize;
use tracing::debug;

use crate::listener::ListenerHandle;
use crate::variable::{ReadWriteVariable, Variable};

/// An event associated with one variable
///
/// The record is a plain [`EventRecord`] whose source names the variable, so
/// it can be listed among another variable's events or bound to chains like
/// any other event. [`attach`](Self::attach) wires the variable to the bus so
/// that every update fires the event with the new value as its data.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableValueChangedEvent {
    record: EventRecord,
}

impl VariableValueChangedEvent {
    /// Associate a new event with `variable`
    pub fn new<T, V>(unique_id: impl Into<EventId>, variable: &V) -> Self
    where
        T: Clone + Send + Sync + 'static,
        V: Variable<T> + ?Sized,
    {
        Self::from_record(EventRecord::new(unique_id), variable)
    }

    /// Associate an existing record with `variable`, keeping its timestamp
    pub fn from_record<T, V>(record: EventRecord, variable: &V) -> Self
    where
        T: Clone + Send + Sync + 'static,
        V: Variable<T> + ?Sized,
    {
        Self {
            record: record.with_source(EventSource::VariableValueChanged {
                variable_id: variable.unique_id().to_string(),
            }),
        }
    }

    pub fn event_id(&self) -> &EventId {
        &self.record.unique_id
    }

    /// Id of the associated variable
    pub fn variable_id(&self) -> &str {
        self.record.variable_id().unwrap_or_default()
    }

    pub fn record(&self) -> &EventRecord {
        &self.record
    }

    pub fn into_record(self) -> EventRecord {
        self.record
    }

    /// Fire this event on `bus` whenever `variable` is updated
    ///
    /// Returns the listener handle so the bridge can be detached with
    /// `remove_change_event_listener`.
    pub fn attach<T>(&self, variable: &ReadWriteVariable<T>, bus: Arc<EventBus>) -> ListenerHandle
    where
        T: Clone + Serialize + Send + Sync + 'static,
    {
        let event_id = self.record.unique_id.clone();
        debug!(
            event_id = %event_id,
            variable_id = %variable.unique_id(),
            "Attaching value changed event"
        );

        variable.add_change_event_listener(move |value: T| {
            let bus = bus.clone();
            let event_id = event_id.clone();
            async move {
                bus.fire_with(event_id, &value, EventOrigin::Variable, Context::caused())
                    .map_err(|e| ListenerFailure::with_source("failed to serialize new value", e))
            }
        })
    }
}

impl From<VariableValueChangedEvent> for EventRecord {
    fn from(event: VariableValueChangedEvent) -> Self {
        event.record
    }
}
