//! Session coordinator
//!
//! Ties the per-user session record (open panel, last clock-out) to the
//! attendance state machine. All bookkeeping for a user happens while that
//! user's session slot is held, and the session is only changed after the
//! matching event has been appended.

use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use timeclock_api::{
    Action, ActionRejection, AttendanceEvent, CycleStarted, CycleState, PanelToken, Session,
    StartRejection,
};
use timeclock_config::SessionPolicy;
use timeclock_store::{StoreError, StoreResult};
use timeclock_util::{Clock, PanelId, UserId, ceil_seconds};
use tracing::{debug, error, info};

use crate::{AttendanceMachine, MachineError, PanelRecord, SessionRegistry, Transition};

/// A coordinator request that did not go through
#[derive(Debug, Error)]
pub enum CoordinatorError<R> {
    /// The request was illegal in the current state
    #[error("{0}")]
    Rejected(R),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl<R> CoordinatorError<R> {
    pub fn rejection(&self) -> Option<&R> {
        match self {
            Self::Rejected(r) => Some(r),
            Self::Storage(_) => None,
        }
    }
}

pub type StartResult<T> = Result<T, CoordinatorError<StartRejection>>;
pub type ActionResult<T> = Result<T, CoordinatorError<ActionRejection>>;

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

/// Front door for every attendance request
pub struct Coordinator {
    machine: AttendanceMachine,
    registry: Arc<SessionRegistry>,
    clock: Arc<dyn Clock>,
    policy: SessionPolicy,
}

impl Coordinator {
    pub fn new(
        machine: AttendanceMachine,
        registry: Arc<SessionRegistry>,
        clock: Arc<dyn Clock>,
        policy: SessionPolicy,
    ) -> Self {
        info!(
            cooldown_secs = policy.cooldown.as_secs(),
            eviction_grace_secs = policy.eviction_grace.as_secs(),
            "Coordinator initialized"
        );

        Self {
            machine,
            registry,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn machine(&self) -> &AttendanceMachine {
        &self.machine
    }

    /// Panel and cooldown checks for a new cycle
    fn check_start(&self, session: &Session, now: DateTime<Local>) -> Result<(), StartRejection> {
        if session.panel_open {
            return Err(StartRejection::AlreadyOpen);
        }

        if let Some(last_exit) = session.last_exit_at {
            let elapsed = now.signed_duration_since(last_exit);
            let cooldown = to_chrono(self.policy.cooldown);
            if elapsed < cooldown {
                let remaining_seconds = cooldown
                    .checked_sub(&elapsed)
                    .map(ceil_seconds)
                    .unwrap_or(u64::MAX);
                return Err(StartRejection::CooldownActive { remaining_seconds });
            }
        }

        Ok(())
    }

    /// Open a panel for `user_id` without recording anything.
    ///
    /// The cycle itself starts when the owner presses Entry on the panel.
    pub fn request_start(&self, user_id: &UserId) -> Result<PanelToken, StartRejection> {
        self.registry.with_session(user_id, |session| {
            let now = self.clock.now();
            if let Err(rejection) = self.check_start(session, now) {
                debug!(user_id = %user_id, ?rejection, "Start request rejected");
                return Err(rejection);
            }

            let token = self.registry.open_panel(session, user_id.as_str(), now);
            info!(user_id = %user_id, panel_id = %token.panel_id, "Panel opened");
            Ok(token)
        })
    }

    /// Check the session, record an Entry and open the owner's panel
    pub fn start_cycle(&self, user_id: &UserId, display_name: &str) -> StartResult<CycleStarted> {
        self.registry.with_session(user_id, |session| {
            let now = self.clock.now();
            if let Err(rejection) = self.check_start(session, now) {
                debug!(user_id = %user_id, ?rejection, "Start request rejected");
                return Err(CoordinatorError::Rejected(rejection));
            }

            let applied = self
                .machine
                .apply(user_id, Some(display_name), Action::StartEntry);
            let transition = match applied {
                Ok(transition) => transition,
                Err(MachineError::Rejected(_)) => {
                    debug!(user_id = %user_id, "Start rejected, log has an open entry");
                    return Err(CoordinatorError::Rejected(StartRejection::AlreadyOpen));
                }
                Err(MachineError::Storage(e)) => {
                    error!(user_id = %user_id, error = %e, "Failed to record entry");
                    return Err(CoordinatorError::Storage(e));
                }
            };

            let at = transition.event.timestamp;
            let panel = self.registry.open_panel(session, display_name, at);
            info!(
                user_id = %user_id,
                panel_id = %panel.panel_id,
                at = %at,
                "Cycle started"
            );

            Ok(CycleStarted { panel, at })
        })
    }

    /// Apply `action` while the caller holds `session`
    fn apply_locked(
        &self,
        session: &mut Session,
        display_name: Option<&str>,
        action: Action,
    ) -> ActionResult<Transition> {
        let user_id = session.user_id.clone();

        match self.machine.apply(&user_id, display_name, action) {
            Ok(transition) => {
                if action == Action::FinishExit {
                    session.last_exit_at = Some(transition.event.timestamp);
                    if let Some(panel_id) = self.registry.close_panel(session) {
                        info!(user_id = %user_id, panel_id = %panel_id, "Panel closed");
                    }
                }
                Ok(transition)
            }
            Err(MachineError::Rejected(rejection)) => Err(CoordinatorError::Rejected(rejection)),
            Err(MachineError::Storage(e)) => {
                error!(user_id = %user_id, action = %action, error = %e, "Failed to record action");
                Err(CoordinatorError::Storage(e))
            }
        }
    }

    fn act(&self, user_id: &UserId, action: Action) -> ActionResult<AttendanceEvent> {
        self.registry.with_session(user_id, |session| {
            let display_name = session
                .panel_id
                .and_then(|id| self.registry.panel(&id))
                .map(|record| record.display_name);
            self.apply_locked(session, display_name.as_deref(), action)
                .map(|t| t.event)
        })
    }

    /// Start a break for `user_id`
    pub fn pause(&self, user_id: &UserId) -> ActionResult<DateTime<Local>> {
        self.act(user_id, Action::StartPause).map(|e| e.timestamp)
    }

    /// End the break of `user_id`
    pub fn resume(&self, user_id: &UserId) -> ActionResult<DateTime<Local>> {
        self.act(user_id, Action::Resume).map(|e| e.timestamp)
    }

    /// Clock `user_id` out, closing their panel
    pub fn finish(&self, user_id: &UserId) -> ActionResult<DateTime<Local>> {
        self.act(user_id, Action::FinishExit).map(|e| e.timestamp)
    }

    /// A button pressed on a panel by `actor`
    pub fn act_on_panel(
        &self,
        panel_id: PanelId,
        actor: &UserId,
        action: Action,
    ) -> ActionResult<Transition> {
        let Some(record) = self.registry.panel(&panel_id) else {
            debug!(panel_id = %panel_id, actor = %actor, "Action on unknown panel");
            return Err(CoordinatorError::Rejected(ActionRejection::PanelClosed));
        };

        if &record.owner != actor {
            debug!(
                panel_id = %panel_id,
                owner = %record.owner,
                actor = %actor,
                "Action on another user's panel"
            );
            return Err(CoordinatorError::Rejected(ActionRejection::NotOwner));
        }

        self.registry.with_session(actor, |session| {
            if record.closed || session.panel_id != Some(panel_id) {
                debug!(panel_id = %panel_id, actor = %actor, "Action on closed panel");
                return Err(CoordinatorError::Rejected(ActionRejection::PanelClosed));
            }
            self.apply_locked(session, Some(&record.display_name), action)
        })
    }

    pub fn state(&self, user_id: &UserId) -> StoreResult<CycleState> {
        self.machine.state(user_id)
    }

    pub fn session(&self, user_id: &UserId) -> Option<Session> {
        self.registry.session(user_id)
    }

    pub fn panel(&self, panel_id: &PanelId) -> Option<PanelRecord> {
        self.registry.panel(panel_id)
    }

    pub fn history(&self, user_id: &UserId) -> StoreResult<Vec<AttendanceEvent>> {
        self.machine.history(user_id)
    }

    /// Most recent events across all users, newest first
    pub fn recent(&self, limit: usize) -> StoreResult<Vec<AttendanceEvent>> {
        self.machine.log().store().recent_events(limit)
    }

    /// Drop idle sessions whose last clock-out is older than cooldown plus
    /// grace. Returns how many were dropped.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let ttl = to_chrono(self.policy.cooldown.saturating_add(self.policy.eviction_grace));

        let evicted = self.registry.evict(|session| {
            !session.panel_open
                && session
                    .last_exit_at
                    .is_none_or(|last_exit| now.signed_duration_since(last_exit) >= ttl)
        });

        if !evicted.is_empty() {
            let locks = self.machine.log().compact_locks();
            info!(count = evicted.len(), locks, "Evicted idle sessions");
        }
        evicted.len()
    }
}
