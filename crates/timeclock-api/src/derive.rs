//! Pure derivation of cycle state from an event history

use crate::{AttendanceEvent, CycleState, EventKind};

/// The unmatched Entry and Pause of one user's history
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenMarkers {
    /// Most recent Entry with no Exit after it
    pub entry: Option<AttendanceEvent>,

    /// Most recent Pause with no Resume after it
    pub pause: Option<AttendanceEvent>,
}

impl OpenMarkers {
    pub fn state(&self) -> CycleState {
        state_from(self.entry.is_some(), self.pause.is_some())
    }
}

/// Combine the two independent existence checks into a state
pub fn state_from(open_entry: bool, open_pause: bool) -> CycleState {
    match (open_entry, open_pause) {
        (false, _) => CycleState::Idle,
        (true, false) => CycleState::Working,
        (true, true) => CycleState::OnBreak,
    }
}

/// Find the open Entry and open Pause in one user's events.
///
/// The input may be in any order; it is walked in `(timestamp, id)` order.
/// An event of kind K is open when no closing event comes after it, so the
/// answer is the latest K provided the latest closer is older.
pub fn derive_open_markers(events: &[AttendanceEvent]) -> OpenMarkers {
    OpenMarkers {
        entry: latest_unmatched(events, EventKind::Entry),
        pause: latest_unmatched(events, EventKind::Pause),
    }
}

/// Convenience wrapper over [`derive_open_markers`]
pub fn derive_cycle_state(events: &[AttendanceEvent]) -> CycleState {
    derive_open_markers(events).state()
}

fn latest_unmatched(events: &[AttendanceEvent], kind: EventKind) -> Option<AttendanceEvent> {
    let closer = kind.closed_by()?;

    let latest_open = events
        .iter()
        .filter(|e| e.kind == kind)
        .max_by_key(|e| e.order_key())?;

    let closed = events
        .iter()
        .filter(|e| e.kind == closer)
        .any(|e| e.is_after(latest_open));

    if closed { None } else { Some(latest_open.clone()) }
}
