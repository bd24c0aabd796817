//! Per-key mutual exclusion
//!
//! Attendance operations for one user must be serialized while operations
//! for different users run in parallel. `KeyedLocks` hands out one mutex per
//! key; the map itself is only locked long enough to find or create a slot.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::UserId;

/// Map of lazily-created per-key mutexes
#[derive(Debug)]
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

/// Per-user lock map
pub type UserLocks = KeyedLocks<UserId>;

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Get (or create) the mutex guarding `key`
    pub fn slot(&self, key: &K) -> Arc<Mutex<()>> {
        let mut slots = lock_recovering(&self.slots);
        slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run `f` while holding the mutex for `key`
    pub fn with<R>(&self, key: &K, f: impl FnOnce() -> R) -> R {
        let slot = self.slot(key);
        let _guard = lock_recovering(&slot);
        f()
    }

    /// Drop slots nobody is currently holding. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let mut slots = lock_recovering(&self.slots);
        let before = slots.len();
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        before - slots.len()
    }

    /// Number of keys with a live slot
    pub fn len(&self) -> usize {
        lock_recovering(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock a mutex whose protected data stays valid even if a holder panicked.
///
/// Every structure locked through this helper is only written after the
/// operation it records has completed, so a poisoned guard still sees a
/// consistent value.
pub fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("Recovering poisoned lock");
        poisoned.into_inner()
    })
}
