//! Domain types for timeclock
//!
//! This crate defines the vocabulary shared by the store, the core and any
//! front end:
//! - Attendance events and their kinds
//! - Derived cycle state and the pure derivation over an event history
//! - Actions and the typed rejections returned for illegal ones
//! - Transient session and panel records

mod derive;
mod rejections;
mod types;

pub use derive::*;
pub use rejections::*;
pub use types::*;
