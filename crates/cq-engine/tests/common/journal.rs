//! Shared ordered journal

use std::sync::{Arc, Mutex};

/// Ordered log shared between mocks
#[derive(Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.lock().unwrap().iter().any(|e| e == entry)
    }

    /// Assert the journal holds exactly `expected`, in order
    pub fn assert_entries(&self, expected: &[&str]) {
        let entries = self.entries();
        assert_eq!(
            entries, expected,
            "Journal mismatch: got {:?}, expected {:?}",
            entries, expected
        );
    }
}
