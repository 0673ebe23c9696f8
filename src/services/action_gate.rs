//! Action gate
//!
//! Keeps a screen from re-triggering an action while the same action is
//! still in flight. Holding an [`ActionTicket`] marks its key busy; dropping
//! the ticket frees it, whether the action finished, failed or was abandoned.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Set of in-flight action keys, shared by clones
#[derive(Debug, Clone, Default)]
pub struct ActionGate {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl ActionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`, or `None` while another ticket for it is alive
    pub fn try_begin(&self, key: &str) -> Option<ActionTicket> {
        if !lock(&self.in_flight).insert(key.to_string()) {
            tracing::debug!(key, "Action already in flight");
            return None;
        }

        Some(ActionTicket {
            key: key.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn is_busy(&self, key: &str) -> bool {
        lock(&self.in_flight).contains(key)
    }
}

/// Proof that an action is running. Releases its key on drop.
#[derive(Debug)]
pub struct ActionTicket {
    key: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl ActionTicket {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for ActionTicket {
    fn drop(&mut self) {
        lock(&self.in_flight).remove(&self.key);
    }
}

// A panic while holding the lock leaves the set itself intact
fn lock(set: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
