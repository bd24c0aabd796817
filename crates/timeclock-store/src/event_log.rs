//! Per-user transactional access to an event store

use std::sync::Arc;
use timeclock_api::OpenMarkers;
use timeclock_util::{UserId, UserLocks};

use crate::{EventStore, StoreResult};

/// An event store plus one mutex per user.
///
/// Everything run inside [`EventLog::transact`] for a user is serialized
/// against every other transaction for the same user, so a check of the
/// open markers and the append that follows it cannot interleave with a
/// concurrent request. Different users never wait on each other here.
#[derive(Clone)]
pub struct EventLog {
    store: Arc<dyn EventStore>,
    locks: Arc<UserLocks>,
}

impl EventLog {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            store,
            locks: Arc::new(UserLocks::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// Run `f` against the store while holding `user_id`'s lock
    pub fn transact<R>(&self, user_id: &UserId, f: impl FnOnce(&dyn EventStore) -> R) -> R {
        self.locks.with(user_id, || f(self.store.as_ref()))
    }

    /// Open Entry and open Pause, read together under the user's lock
    pub fn open_markers(&self, user_id: &UserId) -> StoreResult<OpenMarkers> {
        self.transact(user_id, |store| read_markers(store, user_id))
    }

    /// Drop lock slots for users with no transaction in flight
    pub fn compact_locks(&self) -> usize {
        self.locks.cleanup()
    }
}

/// Read both open markers from a store the caller already holds
pub fn read_markers(store: &dyn EventStore, user_id: &UserId) -> StoreResult<OpenMarkers> {
    Ok(OpenMarkers {
        entry: store.open_entry(user_id)?,
        pause: store.open_pause(user_id)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SqliteStore;
    use timeclock_api::{CycleState, EventKind};
    use timeclock_util::SystemClock;

    #[test]
    fn check_then_append_is_atomic_per_user() {
        let store = Arc::new(SqliteStore::in_memory(Arc::new(SystemClock)).unwrap());
        let log = EventLog::new(store.clone());
        let user = UserId::new("U1");

        std::thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| {
                    log.transact(&user, |store| {
                        if store.open_entry(&user).unwrap().is_none() {
                            store.append(&user, "U1", EventKind::Entry).unwrap();
                        }
                    });
                });
            }
        });

        let entries = store.events_for_user(&user).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(log.open_markers(&user).unwrap().state(), CycleState::Working);
    }
}
