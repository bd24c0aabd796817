//! Shared types for timeclock

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use timeclock_util::{PanelId, UserId};

/// Kind of an attendance event as recorded in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Clock-in
    Entry,
    /// Break start
    Pause,
    /// Break return
    Resume,
    /// Clock-out
    Exit,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Entry,
        EventKind::Pause,
        EventKind::Resume,
        EventKind::Exit,
    ];

    /// Convert enum → DB string
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Entry => "entry",
            EventKind::Pause => "pause",
            EventKind::Resume => "resume",
            EventKind::Exit => "exit",
        }
    }

    /// Convert DB string → enum
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "entry" => Some(EventKind::Entry),
            "pause" => Some(EventKind::Pause),
            "resume" => Some(EventKind::Resume),
            "exit" => Some(EventKind::Exit),
            _ => None,
        }
    }

    /// The kind that closes an open event of this kind, if any
    pub fn closed_by(&self) -> Option<EventKind> {
        match self {
            EventKind::Entry => Some(EventKind::Exit),
            EventKind::Pause => Some(EventKind::Resume),
            EventKind::Resume | EventKind::Exit => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable row of the attendance log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    /// Store-assigned, monotonically increasing
    pub id: i64,

    pub user_id: UserId,

    /// Label captured at event time; never used for logic
    pub display_name: String,

    pub timestamp: DateTime<Local>,

    pub kind: EventKind,
}

impl AttendanceEvent {
    /// Log ordering key: timestamp first, id breaks ties
    pub fn order_key(&self) -> (DateTime<Local>, i64) {
        (self.timestamp, self.id)
    }

    /// Whether this event comes strictly after `other` in log order
    pub fn is_after(&self, other: &AttendanceEvent) -> bool {
        self.order_key() > other.order_key()
    }
}

/// Where a user currently is in the attendance cycle (always derived)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Idle,
    Working,
    OnBreak,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleState::Idle => f.write_str("idle"),
            CycleState::Working => f.write_str("working"),
            CycleState::OnBreak => f.write_str("on break"),
        }
    }
}

/// A requested attendance transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    StartEntry,
    StartPause,
    Resume,
    FinishExit,
}

impl Action {
    /// Event appended when the action is accepted
    pub fn event_kind(&self) -> EventKind {
        match self {
            Action::StartEntry => EventKind::Entry,
            Action::StartPause => EventKind::Pause,
            Action::Resume => EventKind::Resume,
            Action::FinishExit => EventKind::Exit,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::StartEntry => f.write_str("entry"),
            Action::StartPause => f.write_str("pause"),
            Action::Resume => f.write_str("resume"),
            Action::FinishExit => f.write_str("finish"),
        }
    }
}

/// Transient per-user session record kept by the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,

    /// A cycle panel is currently active for this user
    pub panel_open: bool,

    /// The open panel, when `panel_open` is set
    pub panel_id: Option<PanelId>,

    /// Timestamp of the most recent recorded exit
    pub last_exit_at: Option<DateTime<Local>>,
}

impl Session {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            panel_open: false,
            panel_id: None,
            last_exit_at: None,
        }
    }
}

/// Handle to an open panel, bound to exactly one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelToken {
    pub panel_id: PanelId,
    pub owner: UserId,
    pub opened_at: DateTime<Local>,
}

/// Result of a successful cycle start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStarted {
    pub panel: PanelToken,

    /// Timestamp recorded for the entry event
    pub at: DateTime<Local>,
}
