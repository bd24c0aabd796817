//! Persistence layer for timeclock
//!
//! Provides:
//! - The append-only attendance event log (`EventStore`)
//! - SQLite and in-memory implementations
//! - `EventLog`, which makes read-then-append atomic per user

mod event_log;
mod memory;
mod sqlite;
mod traits;

pub use event_log::*;
pub use memory::*;
pub use sqlite::*;
pub use traits::*;

use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid record {id}: {message}")]
    InvalidRecord { id: i64, message: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
