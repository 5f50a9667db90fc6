//! Event bus for Consequences
//!
//! This crate provides the EventBus, the process-wide broker through which
//! event occurrences travel. Addons, the hosting runtime and variable change
//! bridges fire occurrences; the chain dispatcher subscribes and starts the
//! chains bound to each event.

use cq_core::{Context, EventId, EventOccurrence, EventOrigin};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, trace};

/// Default channel capacity for event subscriptions
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// The event bus for publishing and subscribing to event occurrences
///
/// Supports:
/// - Subscribing to a single event id
/// - Subscribing to every event, bounded or lossless
/// - Firing occurrences to all matching subscribers
/// - Typed subscriptions that parse occurrence data
pub struct EventBus {
    /// Map of event ids to their broadcast senders
    listeners: DashMap<EventId, broadcast::Sender<EventOccurrence>>,
    /// Sender for subscribers to every event
    all_sender: broadcast::Sender<EventOccurrence>,
    /// Unbounded subscribers to every event
    sinks: DashMap<u64, mpsc::UnboundedSender<EventOccurrence>>,
    /// Counter for generating sink ids
    next_sink_id: AtomicU64,
    /// Channel capacity
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with specified channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (all_sender, _) = broadcast::channel(capacity);
        Self {
            listeners: DashMap::new(),
            all_sender,
            sinks: DashMap::new(),
            next_sink_id: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to occurrences of one event
    pub fn subscribe(&self, event_id: impl Into<EventId>) -> broadcast::Receiver<EventOccurrence> {
        let event_id = event_id.into();
        trace!(event_id = %event_id, "Subscribing to event");

        self.listeners
            .entry(event_id)
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.capacity);
                tx
            })
            .subscribe()
    }

    /// Subscribe to occurrences of one event, parsing their data as `T`
    pub fn subscribe_typed<T: serde::de::DeserializeOwned>(
        &self,
        event_id: impl Into<EventId>,
    ) -> TypedEventReceiver<T> {
        TypedEventReceiver::new(self.subscribe(event_id))
    }

    /// Subscribe to every event
    pub fn subscribe_all(&self) -> broadcast::Receiver<EventOccurrence> {
        self.all_sender.subscribe()
    }

    /// Subscribe to every event without a capacity bound
    ///
    /// The receiver never lags: occurrences queue until received. Dropping
    /// the receiver ends the subscription on the next fire.
    pub fn subscribe_all_unbounded(&self) -> mpsc::UnboundedReceiver<EventOccurrence> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_sink_id.fetch_add(1, Ordering::Relaxed);
        self.sinks.insert(id, tx);
        rx
    }

    /// Fire an occurrence to all subscribers
    ///
    /// The occurrence is delivered to subscribers of its event id and to
    /// every subscriber of all events.
    pub fn fire(&self, occurrence: EventOccurrence) {
        debug!(
            event_id = %occurrence.event_id,
            origin = ?occurrence.origin,
            context_id = %occurrence.context.id,
            "Firing event"
        );

        if let Some(sender) = self.listeners.get(&occurrence.event_id) {
            // Send errors only mean there are no active receivers
            let _ = sender.send(occurrence.clone());
        }

        self.sinks
            .retain(|_, sink| sink.send(occurrence.clone()).is_ok());

        let _ = self.all_sender.send(occurrence);
    }

    /// Serialize `data` and fire it as an occurrence of `event_id`
    pub fn fire_with<T: serde::Serialize>(
        &self,
        event_id: impl Into<EventId>,
        data: &T,
        origin: EventOrigin,
        context: Context,
    ) -> Result<(), serde_json::Error> {
        let data = serde_json::to_value(data)?;
        self.fire(EventOccurrence::new(event_id, data, context).with_origin(origin));
        Ok(())
    }

    /// Number of event ids with at least one subscription channel
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A receiver that parses occurrence data
pub struct TypedEventReceiver<T> {
    rx: broadcast::Receiver<EventOccurrence>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: serde::de::DeserializeOwned> TypedEventReceiver<T> {
    fn new(rx: broadcast::Receiver<EventOccurrence>) -> Self {
        Self {
            rx,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Receive the next occurrence whose data parses as `T`
    ///
    /// Occurrences with data of another shape are skipped.
    pub async fn recv(&mut self) -> Result<EventOccurrence<T>, broadcast::error::RecvError> {
        loop {
            let occurrence = self.rx.recv().await?;
            if let Ok(data) = serde_json::from_value::<T>(occurrence.data.clone()) {
                return Ok(EventOccurrence {
                    event_id: occurrence.event_id,
                    data,
                    origin: occurrence.origin,
                    time_fired: occurrence.time_fired,
                    context: occurrence.context,
                });
            }
            trace!(event_id = %occurrence.event_id, "Skipping occurrence with unexpected data");
        }
    }
}
