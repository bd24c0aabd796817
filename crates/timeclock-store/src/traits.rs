//! Store trait definitions

use timeclock_api::{AttendanceEvent, EventKind};
use timeclock_util::UserId;

use crate::StoreResult;

/// Append-only attendance event log
///
/// Individual calls are atomic, but a read followed by an append is not;
/// callers that validate before appending go through [`crate::EventLog`].
pub trait EventStore: Send + Sync {
    // Writes

    /// Record an event stamped with the store's current time.
    ///
    /// The timestamp never goes backwards for a user: if the clock reads
    /// earlier than that user's latest event, the latest timestamp is reused.
    fn append(
        &self,
        user_id: &UserId,
        display_name: &str,
        kind: EventKind,
    ) -> StoreResult<AttendanceEvent>;

    // Open markers

    /// Most recent Entry with no Exit after it
    fn open_entry(&self, user_id: &UserId) -> StoreResult<Option<AttendanceEvent>>;

    /// Most recent Pause with no Resume after it
    fn open_pause(&self, user_id: &UserId) -> StoreResult<Option<AttendanceEvent>>;

    // History

    /// All events for a user in log order
    fn events_for_user(&self, user_id: &UserId) -> StoreResult<Vec<AttendanceEvent>>;

    /// Most recent events across all users, newest first
    fn recent_events(&self, limit: usize) -> StoreResult<Vec<AttendanceEvent>>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
