//! Shared utilities for timeclock
//!
//! This crate provides:
//! - ID types (UserId, PanelId)
//! - Time utilities (clock abstraction, mock time, duration helpers)
//! - Per-user lock maps
//! - Default paths for config and data directories

mod ids;
mod locks;
mod paths;
mod time;

pub use ids::*;
pub use locks::*;
pub use paths::*;
pub use time::*;
