//! In-memory session registry
//!
//! One [`Session`] per user behind its own mutex, plus an index of every
//! panel handed out so far. Sessions are not persisted; a restart starts
//! from an empty registry.

use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, TryLockError};
use timeclock_api::{PanelToken, Session};
use timeclock_util::{PanelId, UserId, lock_recovering};
use tracing::{debug, warn};

/// What the registry remembers about a panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelRecord {
    pub owner: UserId,
    pub display_name: String,
    pub opened_at: DateTime<Local>,
    pub closed: bool,
}

/// Per-user sessions and the panels they own.
///
/// Lock order is session map, then one session, then the panel index.
/// Nothing here takes the panel index and then waits on a session.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<UserId, Arc<Mutex<Session>>>>,
    panels: Mutex<HashMap<PanelId, PanelRecord>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, user_id: &UserId) -> Arc<Mutex<Session>> {
        let mut sessions = lock_recovering(&self.sessions);
        sessions
            .entry(user_id.clone())
            .or_insert_with(|| {
                debug!(user_id = %user_id, "Session created");
                Arc::new(Mutex::new(Session::new(user_id.clone())))
            })
            .clone()
    }

    /// Run `f` with exclusive access to the user's session, creating it
    /// if needed. Requests for the same user are serialized here.
    pub fn with_session<R>(&self, user_id: &UserId, f: impl FnOnce(&mut Session) -> R) -> R {
        let slot = self.slot(user_id);
        let mut session = lock_recovering(&slot);
        f(&mut session)
    }

    /// Copy of the user's session, if one exists
    pub fn session(&self, user_id: &UserId) -> Option<Session> {
        let slot = lock_recovering(&self.sessions).get(user_id).cloned()?;
        let session = lock_recovering(&slot).clone();
        Some(session)
    }

    /// Copies of every live session
    pub fn snapshot(&self) -> Vec<Session> {
        let slots: Vec<_> = lock_recovering(&self.sessions).values().cloned().collect();
        slots.iter().map(|slot| lock_recovering(slot).clone()).collect()
    }

    pub fn len(&self) -> usize {
        lock_recovering(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open a new panel for `session`. The caller holds the session.
    pub fn open_panel(
        &self,
        session: &mut Session,
        display_name: &str,
        opened_at: DateTime<Local>,
    ) -> PanelToken {
        let panel_id = PanelId::new();
        lock_recovering(&self.panels).insert(
            panel_id,
            PanelRecord {
                owner: session.user_id.clone(),
                display_name: display_name.to_string(),
                opened_at,
                closed: false,
            },
        );

        session.panel_open = true;
        session.panel_id = Some(panel_id);

        PanelToken {
            panel_id,
            owner: session.user_id.clone(),
            opened_at,
        }
    }

    /// Close the session's panel, if any. The caller holds the session.
    pub fn close_panel(&self, session: &mut Session) -> Option<PanelId> {
        session.panel_open = false;
        let panel_id = session.panel_id.take()?;
        if let Some(record) = lock_recovering(&self.panels).get_mut(&panel_id) {
            record.closed = true;
        }
        Some(panel_id)
    }

    pub fn panel(&self, panel_id: &PanelId) -> Option<PanelRecord> {
        lock_recovering(&self.panels).get(panel_id).cloned()
    }

    /// Drop every session matching `expired`, together with its panels.
    ///
    /// A session whose slot is held by an in-flight request is skipped
    /// and looked at again on the next sweep.
    pub fn evict(&self, mut expired: impl FnMut(&Session) -> bool) -> Vec<UserId> {
        let mut sessions = lock_recovering(&self.sessions);
        let mut evicted = Vec::new();

        sessions.retain(|user_id, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            let session = match slot.try_lock() {
                Ok(session) => session,
                Err(TryLockError::Poisoned(poisoned)) => {
                    warn!(user_id = %user_id, "Recovering poisoned session lock");
                    poisoned.into_inner()
                }
                Err(TryLockError::WouldBlock) => return true,
            };
            if expired(&session) {
                evicted.push(user_id.clone());
                false
            } else {
                true
            }
        });
        drop(sessions);

        if !evicted.is_empty() {
            lock_recovering(&self.panels).retain(|_, record| !evicted.contains(&record.owner));
        }
        evicted
    }

    /// Forget every session and panel
    pub fn clear(&self) {
        let mut sessions = lock_recovering(&self.sessions);
        let count = sessions.len();
        sessions.clear();
        drop(sessions);
        lock_recovering(&self.panels).clear();
        debug!(count, "Session registry cleared");
    }
}
