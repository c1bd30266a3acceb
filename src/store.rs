use std::path::Path;

use chrono::NaiveDateTime;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};

use crate::error::StoreError;
use crate::models::{DelayEvent, Reason};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS delay_event (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    start_time  TEXT NOT NULL,
    end_time    TEXT,
    reason      TEXT NOT NULL
);
";

const COLUMNS: &str = "id, start_time, end_time, reason";

impl ToSql for Reason {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(ValueRef::Text(self.as_str().as_bytes())))
    }
}

impl FromSql for Reason {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let label = value.as_str()?;
        Reason::parse(label).ok_or(FromSqlError::InvalidType)
    }
}

/// SQLite-backed delay log. At most one row has a null `end_time`.
pub struct DelayStore {
    conn: Connection,
}

impl DelayStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    fn row_to_event(row: &Row<'_>) -> rusqlite::Result<DelayEvent> {
        Ok(DelayEvent {
            id: row.get(0)?,
            start_time: row.get(1)?,
            end_time: row.get(2)?,
            reason: row.get(3)?,
        })
    }

    pub fn active_event(&self) -> Result<Option<DelayEvent>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM delay_event WHERE end_time IS NULL ORDER BY id LIMIT 1"
        );
        let event = self
            .conn
            .query_row(&sql, [], Self::row_to_event)
            .optional()?;
        Ok(event)
    }

    /// Opens a new delay, refusing while another one is still running
    pub fn start(&mut self, reason: Reason, at: NaiveDateTime) -> Result<i64, StoreError> {
        let tx = self.conn.transaction()?;
        let active: Option<i64> = tx
            .query_row(
                "SELECT id FROM delay_event WHERE end_time IS NULL LIMIT 1",
                [],
                |r| r.get(0),
            )
            .optional()?;
        if active.is_some() {
            return Err(StoreError::AlreadyActive);
        }

        tx.execute(
            "INSERT INTO delay_event(start_time, end_time, reason) VALUES (?1, NULL, ?2)",
            params![at, reason],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }

    /// Closes the running delay at `at` and returns it
    pub fn end_active(&mut self, at: NaiveDateTime) -> Result<DelayEvent, StoreError> {
        let tx = self.conn.transaction()?;
        let sql = format!(
            "SELECT {COLUMNS} FROM delay_event WHERE end_time IS NULL ORDER BY id LIMIT 1"
        );
        let mut event = tx
            .query_row(&sql, [], Self::row_to_event)
            .optional()?
            .ok_or(StoreError::NoActiveEvent)?;

        tx.execute(
            "UPDATE delay_event SET end_time = ?1 WHERE id = ?2",
            params![at, event.id],
        )?;
        tx.commit()?;

        event.end_time = Some(at);
        Ok(event)
    }

    pub fn all_events(&self) -> Result<Vec<DelayEvent>, StoreError> {
        self.query_events(&format!("SELECT {COLUMNS} FROM delay_event ORDER BY id"))
    }

    pub fn finished_events(&self) -> Result<Vec<DelayEvent>, StoreError> {
        self.query_events(&format!(
            "SELECT {COLUMNS} FROM delay_event WHERE end_time IS NOT NULL ORDER BY id"
        ))
    }

    fn query_events(&self, sql: &str) -> Result<Vec<DelayEvent>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], Self::row_to_event)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    /// Drops every stored delay, returning how many were removed
    pub fn delete_all(&mut self) -> Result<usize, StoreError> {
        Ok(self.conn.execute("DELETE FROM delay_event", [])?)
    }
}
