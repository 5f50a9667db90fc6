//! Registry of known events

use chrono::{DateTime, Utc};
use cq_core::{EventId, EventRecord};
use dashmap::DashMap;
use tracing::debug;

#[derive(Debug)]
struct Entry {
    record: EventRecord,
    /// Owners that registered the event
    owners: Vec<String>,
    /// Registered without an owner; never released
    pinned: bool,
}

/// Known events keyed by id, holding their last triggered time
///
/// Events registered on behalf of an owner (an addon instance) are dropped
/// once every owner has released them. Firing an unregistered event does not
/// add it.
#[derive(Debug, Default)]
pub struct EventRegistry {
    events: DashMap<EventId, Entry>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event, keeping the timestamp of an existing record
    pub fn register(&self, record: EventRecord) {
        self.upsert(record, None);
    }

    /// Register an event on behalf of `owner`
    pub fn register_owned(&self, owner: &str, record: EventRecord) {
        self.upsert(record, Some(owner));
    }

    /// Make sure `event_id` is known, without replacing an existing record
    pub fn claim(&self, event_id: &EventId, owner: Option<&str>) {
        let mut entry = self.events.entry(event_id.clone()).or_insert_with(|| Entry {
            record: EventRecord::new(event_id.clone()),
            owners: Vec::new(),
            pinned: false,
        });
        add_owner(&mut entry, owner);
    }

    fn upsert(&self, record: EventRecord, owner: Option<&str>) {
        debug!(event_id = %record.unique_id, owner, "Registering event");
        match self.events.get_mut(&record.unique_id) {
            Some(mut existing) => {
                let last_triggered = existing.record.last_triggered.or(record.last_triggered);
                existing.record = record;
                existing.record.last_triggered = last_triggered;
                add_owner(&mut existing, owner);
            }
            None => {
                let mut entry = Entry {
                    record,
                    owners: Vec::new(),
                    pinned: false,
                };
                add_owner(&mut entry, owner);
                self.events.insert(entry.record.unique_id.clone(), entry);
            }
        }
    }

    pub fn get(&self, event_id: &EventId) -> Option<EventRecord> {
        self.events.get(event_id).map(|e| e.record.clone())
    }

    pub fn all(&self) -> Vec<EventRecord> {
        self.events.iter().map(|e| e.record.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Record that `event_id` fired at `at`
    ///
    /// Returns `false` for events that are not registered.
    pub fn mark_triggered(&self, event_id: &EventId, at: DateTime<Utc>) -> bool {
        match self.events.get_mut(event_id) {
            Some(mut entry) => {
                entry.record.last_triggered = Some(at);
                true
            }
            None => false,
        }
    }

    /// Release every event registered by `owner`
    ///
    /// Events left without owners are removed unless they were also
    /// registered without one. Returns the number removed.
    pub fn release_owner(&self, owner: &str) -> usize {
        let mut orphaned = Vec::new();
        for mut entry in self.events.iter_mut() {
            let before = entry.owners.len();
            entry.owners.retain(|o| o != owner);
            if entry.owners.len() != before && entry.owners.is_empty() && !entry.pinned {
                orphaned.push(entry.key().clone());
            }
        }

        orphaned
            .iter()
            .filter(|event_id| self.remove(event_id).is_some())
            .count()
    }

    pub fn remove(&self, event_id: &EventId) -> Option<EventRecord> {
        self.events.remove(event_id).map(|(_, e)| e.record)
    }
}

fn add_owner(entry: &mut Entry, owner: Option<&str>) {
    match owner {
        Some(owner) if !entry.owners.iter().any(|o| o == owner) => {
            entry.owners.push(owner.to_string())
        }
        Some(_) => {}
        None => entry.pinned = true,
    }
}
