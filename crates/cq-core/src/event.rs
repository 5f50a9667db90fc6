//! Event types
//!
//! An [`EventRecord`] describes a named trigger and when it last fired. An
//! [`EventOccurrence`] is one firing of that trigger as carried on the event
//! bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Context;

/// Process-wide event identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Create a new event id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the event id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&EventId> for EventId {
    fn from(id: &EventId) -> Self {
        id.clone()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What raises an event
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventSource {
    /// Raised by an addon or the hosting runtime
    #[default]
    External,

    /// Raised whenever the associated variable's value changes
    VariableValueChanged { variable_id: String },
}

/// A named trigger and the last time it fired
///
/// `last_triggered` is advertised, not managed by variables or links: the
/// event registry that owns the record stamps it when the event fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Unique id of the event
    pub unique_id: EventId,

    /// When the event last fired
    pub last_triggered: Option<DateTime<Utc>>,

    /// What raises the event
    #[serde(default)]
    pub source: EventSource,
}

impl EventRecord {
    /// Create a record for an externally raised event that has never fired
    pub fn new(unique_id: impl Into<EventId>) -> Self {
        Self {
            unique_id: unique_id.into(),
            last_triggered: None,
            source: EventSource::External,
        }
    }

    /// Set the source of the event
    pub fn with_source(mut self, source: EventSource) -> Self {
        self.source = source;
        self
    }

    /// Set the last triggered time
    pub fn with_last_triggered(mut self, at: DateTime<Utc>) -> Self {
        self.last_triggered = Some(at);
        self
    }

    /// Id of the variable this event watches, if any
    pub fn variable_id(&self) -> Option<&str> {
        match &self.source {
            EventSource::VariableValueChanged { variable_id } => Some(variable_id),
            EventSource::External => None,
        }
    }
}

/// A single firing of an event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventOccurrence<T = serde_json::Value> {
    /// The event that fired
    pub event_id: EventId,

    /// Data attached to the firing
    pub data: T,

    /// Who raised the event
    pub origin: EventOrigin,

    /// When the event was fired
    pub time_fired: DateTime<Utc>,

    /// Context tracking the origin and causality
    pub context: Context,
}

impl<T> EventOccurrence<T> {
    /// Create a new occurrence with the current timestamp
    pub fn new(event_id: impl Into<EventId>, data: T, context: Context) -> Self {
        Self {
            event_id: event_id.into(),
            data,
            origin: EventOrigin::Host,
            time_fired: Utc::now(),
            context,
        }
    }

    /// Set the origin of the occurrence
    pub fn with_origin(mut self, origin: EventOrigin) -> Self {
        self.origin = origin;
        self
    }
}

/// Origin of an event occurrence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOrigin {
    /// Fired by the hosting runtime
    #[default]
    Host,
    /// Fired by an addon
    Addon,
    /// Fired by a variable value change
    Variable,
}
