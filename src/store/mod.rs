//! SQLite-backed state store for the sync cycle.
//!
//! Three single-row tables back the three pieces of persisted state:
//! session credentials, the last event snapshot, and the destination
//! calendar id. Single writer; the scheduler must not run cycles
//! concurrently.

mod types;

pub use types::{SessionCredentials, StoredSnapshot};

use rusqlite::{Connection, OptionalExtension};
use std::sync::Mutex;
use thiserror::Error;

const SCHEMA_SQL: &str = include_str!("../../sql/init_store.sql");

/// A persisted value could not be read or written.
#[derive(Debug, Error)]
#[error("state store error: {0}")]
pub struct StoreError(#[from] rusqlite::Error);

pub struct SyncStore {
    db: Mutex<Connection>,
}

impl SyncStore {
    /// Opens (or creates) the store at the given path and applies the schema.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    pub fn credentials(&self) -> Result<Option<SessionCredentials>, StoreError> {
        let db = self.db.lock().unwrap();
        let row = db
            .query_row(
                "SELECT username, session_hash FROM credentials WHERE id = 1",
                [],
                |row| {
                    Ok(SessionCredentials {
                        username: row.get(0)?,
                        session_hash: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn put_credentials(&self, credentials: &SessionCredentials) -> Result<(), StoreError> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT OR REPLACE INTO credentials (id, username, session_hash, updated_at)
             VALUES (1, ?1, ?2, datetime('now'))",
            (&credentials.username, &credentials.session_hash),
        )?;
        Ok(())
    }

    pub fn snapshot(&self) -> Result<Option<StoredSnapshot>, StoreError> {
        let db = self.db.lock().unwrap();
        let row = db
            .query_row(
                "SELECT body, fetched_at FROM snapshots WHERE id = 1",
                [],
                |row| {
                    Ok(StoredSnapshot {
                        body: row.get(0)?,
                        fetched_at: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn put_snapshot(&self, body: &str) -> Result<(), StoreError> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT OR REPLACE INTO snapshots (id, body, fetched_at)
             VALUES (1, ?1, datetime('now'))",
            [body],
        )?;
        Ok(())
    }

    pub fn calendar_id(&self) -> Result<Option<String>, StoreError> {
        let db = self.db.lock().unwrap();
        let row = db
            .query_row(
                "SELECT calendar_id FROM calendars WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(row)
    }

    pub fn put_calendar_id(&self, calendar_id: &str) -> Result<(), StoreError> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT OR REPLACE INTO calendars (id, calendar_id, created_at)
             VALUES (1, ?1, datetime('now'))",
            [calendar_id],
        )?;
        Ok(())
    }
}
