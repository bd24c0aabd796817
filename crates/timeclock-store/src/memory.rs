//! In-memory store implementation
//!
//! Same contract as the SQLite store, without durability. Open markers are
//! computed with the pure derivation from `timeclock-api`.

use std::sync::{Arc, Mutex, MutexGuard};
use timeclock_api::{AttendanceEvent, EventKind, derive_open_markers};
use timeclock_util::{Clock, UserId};
use tracing::debug;

use crate::{EventStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Inner {
    events: Vec<AttendanceEvent>,
    next_id: i64,
}

/// Volatile event log
pub struct MemoryStore {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                events: Vec::new(),
                next_id: 1,
            }),
            clock,
        }
    }

    fn inner(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn user_events(&self, user_id: &UserId) -> StoreResult<Vec<AttendanceEvent>> {
        let inner = self.inner()?;
        Ok(inner
            .events
            .iter()
            .filter(|e| &e.user_id == user_id)
            .cloned()
            .collect())
    }
}

impl EventStore for MemoryStore {
    fn append(
        &self,
        user_id: &UserId,
        display_name: &str,
        kind: EventKind,
    ) -> StoreResult<AttendanceEvent> {
        let mut inner = self.inner()?;

        let latest = inner
            .events
            .iter()
            .filter(|e| &e.user_id == user_id)
            .map(|e| e.timestamp)
            .max();
        let now = self.clock.now();
        let timestamp = match latest {
            Some(latest) if latest > now => {
                debug!(user_id = %user_id, "Clock behind latest event, reusing its timestamp");
                latest
            }
            _ => now,
        };

        let event = AttendanceEvent {
            id: inner.next_id,
            user_id: user_id.clone(),
            display_name: display_name.to_string(),
            timestamp,
            kind,
        };
        inner.next_id += 1;
        inner.events.push(event.clone());

        debug!(event_id = event.id, user_id = %user_id, kind = %kind, "Attendance event appended");
        Ok(event)
    }

    fn open_entry(&self, user_id: &UserId) -> StoreResult<Option<AttendanceEvent>> {
        Ok(derive_open_markers(&self.user_events(user_id)?).entry)
    }

    fn open_pause(&self, user_id: &UserId) -> StoreResult<Option<AttendanceEvent>> {
        Ok(derive_open_markers(&self.user_events(user_id)?).pause)
    }

    fn events_for_user(&self, user_id: &UserId) -> StoreResult<Vec<AttendanceEvent>> {
        let mut events = self.user_events(user_id)?;
        events.sort_by_key(|e| e.order_key());
        Ok(events)
    }

    fn recent_events(&self, limit: usize) -> StoreResult<Vec<AttendanceEvent>> {
        let mut events = self.inner()?.events.clone();
        events.sort_by_key(|e| std::cmp::Reverse(e.order_key()));
        events.truncate(limit);
        Ok(events)
    }

    fn is_healthy(&self) -> bool {
        self.inner.lock().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use timeclock_util::ManualClock;

    #[test]
    fn test_append_and_markers() {
        let clock = Arc::new(ManualClock::new(
            Local.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
        ));
        let store = MemoryStore::new(clock.clone());
        let user = UserId::new("U1");

        let entry = store.append(&user, "U1", EventKind::Entry).unwrap();
        assert_eq!(entry.id, 1);
        assert_eq!(store.open_entry(&user).unwrap(), Some(entry));

        clock.advance_secs(-10);
        let exit = store.append(&user, "U1", EventKind::Exit).unwrap();
        assert_eq!(exit.id, 2);
        assert_eq!(exit.timestamp, clock.now() + chrono::Duration::seconds(10));
        assert!(store.open_entry(&user).unwrap().is_none());
        assert!(store.is_healthy());
    }

    #[test]
    fn test_recent_events_limit() {
        let clock = Arc::new(ManualClock::new(
            Local.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
        ));
        let store = MemoryStore::new(clock.clone());

        for i in 0..5 {
            store
                .append(&UserId::new(format!("U{i}")), "x", EventKind::Entry)
                .unwrap();
            clock.advance_secs(1);
        }

        let recent = store.recent_events(3).unwrap();
        let ids: Vec<_> = recent.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![5, 4, 3]);
    }
}
