//! Attendance core for timeclock
//!
//! This crate holds the domain logic:
//! - The attendance state machine (Idle, Working, OnBreak), derived from
//!   the event log on every request
//! - The per-user session registry (open panel, last clock-out)
//! - The coordinator that enforces panel ownership and the restart cooldown

mod coordinator;
mod machine;
mod registry;

pub use coordinator::*;
pub use machine::*;
pub use registry::*;
