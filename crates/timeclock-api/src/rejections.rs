//! Typed rejections
//!
//! Rejections are expected, user-facing outcomes of an illegal request.
//! They never touch the log and are never retried.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a new cycle could not be started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StartRejection {
    #[error("you already have an open entry; finish it before starting a new one")]
    AlreadyOpen,

    #[error("a new cycle can start in {remaining_seconds}s")]
    CooldownActive { remaining_seconds: u64 },
}

/// Why an action on a cycle was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionRejection {
    #[error("you have no open entry; clock in first")]
    NoOpenEntry,

    #[error("you already have an open entry")]
    AlreadyOpen,

    #[error("you are already on a break; resume before pausing again")]
    PauseAlreadyActive,

    #[error("you have no active break to return from")]
    NoActivePause,

    #[error("this panel belongs to someone else")]
    NotOwner,

    #[error("this panel is closed; start a new cycle")]
    PanelClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_message_includes_remaining() {
        let rejection = StartRejection::CooldownActive {
            remaining_seconds: 42,
        };
        assert_eq!(rejection.to_string(), "a new cycle can start in 42s");
    }

    #[test]
    fn start_rejection_serializes_with_reason_tag() {
        let json = serde_json::to_value(StartRejection::CooldownActive {
            remaining_seconds: 5,
        })
        .unwrap();
        assert_eq!(json["reason"], "cooldown_active");
        assert_eq!(json["remaining_seconds"], 5);
    }
}
