//! SQLite-based store implementation

use chrono::{DateTime, Local, SecondsFormat, Utc};
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use timeclock_api::{AttendanceEvent, EventKind};
use timeclock_util::{Clock, UserId};
use tracing::{debug, warn};

use crate::{EventStore, StoreError, StoreResult};

const EVENT_COLUMNS: &str = "id, user_id, display_name, timestamp_us, kind";

/// Row as read back from `attendance_events`, before validation
type RawRow = (i64, String, String, i64, String);

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
            clock,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory(clock: Arc<dyn Clock>) -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
            clock,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Attendance log (append-only)
            CREATE TABLE IF NOT EXISTS attendance_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                display_name TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                timestamp_us INTEGER NOT NULL,
                kind TEXT NOT NULL CHECK (kind IN ('entry', 'pause', 'resume', 'exit'))
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_events_user_order
                ON attendance_events(user_id, timestamp_us, id);
            CREATE INDEX IF NOT EXISTS idx_events_user_kind
                ON attendance_events(user_id, kind);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }

    /// Latest unmatched event of `kind`, closed by `closer`
    fn open_marker(
        &self,
        user_id: &UserId,
        kind: EventKind,
        closer: EventKind,
    ) -> StoreResult<Option<AttendanceEvent>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {EVENT_COLUMNS} FROM attendance_events AS e
            WHERE e.user_id = ?1 AND e.kind = ?2
              AND NOT EXISTS (
                SELECT 1 FROM attendance_events AS c
                WHERE c.user_id = e.user_id
                  AND c.kind = ?3
                  AND (c.timestamp_us > e.timestamp_us
                       OR (c.timestamp_us = e.timestamp_us AND c.id > e.id))
              )
            ORDER BY e.timestamp_us DESC, e.id DESC
            LIMIT 1
            "#
        ))?;

        let mut rows = stmt.query_map(
            params![user_id.as_str(), kind.as_str(), closer.as_str()],
            read_row,
        )?;

        match rows.next() {
            Some(row) => Ok(Some(into_event(row?)?)),
            None => Ok(None),
        }
    }

    fn query_events(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> StoreResult<Vec<AttendanceEvent>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, read_row)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(into_event(row?)?);
        }
        Ok(events)
    }
}

impl EventStore for SqliteStore {
    fn append(
        &self,
        user_id: &UserId,
        display_name: &str,
        kind: EventKind,
    ) -> StoreResult<AttendanceEvent> {
        let conn = self.conn()?;

        let latest_us: Option<i64> = conn.query_row(
            "SELECT MAX(timestamp_us) FROM attendance_events WHERE user_id = ?",
            [user_id.as_str()],
            |row| row.get(0),
        )?;

        let mut timestamp_us = self.clock.now().timestamp_micros();
        if let Some(latest_us) = latest_us
            && timestamp_us < latest_us
        {
            debug!(
                user_id = %user_id,
                behind_us = latest_us - timestamp_us,
                "Clock behind latest event, reusing its timestamp"
            );
            timestamp_us = latest_us;
        }
        let timestamp = micros_to_local(timestamp_us).ok_or(StoreError::InvalidRecord {
            id: 0,
            message: format!("timestamp {timestamp_us}us out of range"),
        })?;

        conn.execute(
            "INSERT INTO attendance_events (user_id, display_name, timestamp, timestamp_us, kind)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id.as_str(),
                display_name,
                timestamp.to_rfc3339_opts(SecondsFormat::Micros, false),
                timestamp_us,
                kind.as_str(),
            ],
        )?;

        let event = AttendanceEvent {
            id: conn.last_insert_rowid(),
            user_id: user_id.clone(),
            display_name: display_name.to_string(),
            timestamp,
            kind,
        };
        debug!(event_id = event.id, user_id = %user_id, kind = %kind, "Attendance event appended");

        Ok(event)
    }

    fn open_entry(&self, user_id: &UserId) -> StoreResult<Option<AttendanceEvent>> {
        self.open_marker(user_id, EventKind::Entry, EventKind::Exit)
    }

    fn open_pause(&self, user_id: &UserId) -> StoreResult<Option<AttendanceEvent>> {
        self.open_marker(user_id, EventKind::Pause, EventKind::Resume)
    }

    fn events_for_user(&self, user_id: &UserId) -> StoreResult<Vec<AttendanceEvent>> {
        self.query_events(
            &format!(
                "SELECT {EVENT_COLUMNS} FROM attendance_events
                 WHERE user_id = ? ORDER BY timestamp_us ASC, id ASC"
            ),
            [user_id.as_str()],
        )
    }

    fn recent_events(&self, limit: usize) -> StoreResult<Vec<AttendanceEvent>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_events(
            &format!(
                "SELECT {EVENT_COLUMNS} FROM attendance_events
                 ORDER BY timestamp_us DESC, id DESC LIMIT ?"
            ),
            [limit],
        )
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn into_event(
    (id, user_id, display_name, timestamp_us, kind): RawRow,
) -> StoreResult<AttendanceEvent> {
    let kind = EventKind::from_db_str(&kind).ok_or_else(|| StoreError::InvalidRecord {
        id,
        message: format!("unknown kind '{kind}'"),
    })?;
    let timestamp = micros_to_local(timestamp_us).ok_or_else(|| StoreError::InvalidRecord {
        id,
        message: format!("timestamp {timestamp_us}us out of range"),
    })?;

    Ok(AttendanceEvent {
        id,
        user_id: UserId::new(user_id),
        display_name,
        timestamp,
        kind,
    })
}

fn micros_to_local(us: i64) -> Option<DateTime<Local>> {
    DateTime::<Utc>::from_timestamp_micros(us).map(|dt| dt.with_timezone(&Local))
}
