//! Attendance state machine
//!
//! The machine never stores a current state. Every request re-reads the
//! user's open Entry and open Pause from the log, validates the requested
//! action against them and, if it is legal, appends the matching event.

use thiserror::Error;
use timeclock_api::{
    Action, ActionRejection, AttendanceEvent, CycleState, OpenMarkers, derive_cycle_state,
    state_from,
};
use timeclock_store::{EventLog, StoreError, StoreResult, read_markers};
use timeclock_util::UserId;
use tracing::{debug, info};

/// Failure of a single state machine request
#[derive(Debug, Error)]
pub enum MachineError {
    #[error(transparent)]
    Rejected(#[from] ActionRejection),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// An accepted, recorded transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub event: AttendanceEvent,
    pub from: CycleState,
    pub to: CycleState,
}

/// Check `action` against the user's open markers
pub fn validate(action: Action, markers: &OpenMarkers) -> Result<(), ActionRejection> {
    let open_entry = markers.entry.is_some();
    let open_pause = markers.pause.is_some();

    match action {
        Action::StartEntry if open_entry => Err(ActionRejection::AlreadyOpen),
        Action::StartEntry => Ok(()),
        Action::StartPause if !open_entry => Err(ActionRejection::NoOpenEntry),
        Action::StartPause if open_pause => Err(ActionRejection::PauseAlreadyActive),
        Action::StartPause => Ok(()),
        Action::Resume if !open_pause => Err(ActionRejection::NoActivePause),
        Action::Resume => Ok(()),
        Action::FinishExit if !open_entry => Err(ActionRejection::NoOpenEntry),
        Action::FinishExit => Ok(()),
    }
}

/// State after a validated `action` is recorded
fn state_after(action: Action, markers: &OpenMarkers) -> CycleState {
    match action {
        Action::StartEntry => state_from(true, markers.pause.is_some()),
        Action::StartPause => CycleState::OnBreak,
        Action::Resume => state_from(markers.entry.is_some(), false),
        Action::FinishExit => CycleState::Idle,
    }
}

/// Derives cycle state from the log and records legal transitions
#[derive(Clone)]
pub struct AttendanceMachine {
    log: EventLog,
}

impl AttendanceMachine {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Current state from the store's open-marker queries
    pub fn state(&self, user_id: &UserId) -> StoreResult<CycleState> {
        Ok(self.log.open_markers(user_id)?.state())
    }

    /// Current state replayed from the user's full history
    pub fn derive_state(&self, user_id: &UserId) -> StoreResult<CycleState> {
        let events = self
            .log
            .transact(user_id, |store| store.events_for_user(user_id))?;
        Ok(derive_cycle_state(&events))
    }

    /// The user's events in log order
    pub fn history(&self, user_id: &UserId) -> StoreResult<Vec<AttendanceEvent>> {
        self.log.store().events_for_user(user_id)
    }

    /// Validate and record `action` for `user_id`.
    ///
    /// Without a `display_name`, the name captured with the open Entry is
    /// reused, falling back to the user id.
    pub fn apply(
        &self,
        user_id: &UserId,
        display_name: Option<&str>,
        action: Action,
    ) -> Result<Transition, MachineError> {
        self.log.transact(user_id, |store| {
            let markers = read_markers(store, user_id)?;
            let from = markers.state();

            if let Err(rejection) = validate(action, &markers) {
                debug!(
                    user_id = %user_id,
                    action = %action,
                    state = %from,
                    ?rejection,
                    "Action rejected"
                );
                return Err(rejection.into());
            }

            let name = display_name
                .map(str::to_string)
                .or_else(|| markers.entry.as_ref().map(|e| e.display_name.clone()))
                .unwrap_or_else(|| user_id.to_string());

            let event = store.append(user_id, &name, action.event_kind())?;
            let to = state_after(action, &markers);

            info!(
                user_id = %user_id,
                event_id = event.id,
                kind = %event.kind,
                from = %from,
                to = %to,
                "Attendance recorded"
            );

            Ok(Transition { event, from, to })
        })
    }
}
