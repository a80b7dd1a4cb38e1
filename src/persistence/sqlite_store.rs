//! SQLite implementation of the BlacklistStore trait

use super::{BlacklistStore, PersistenceError};
use crate::models::BlacklistEntry;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// SQLite-based blacklist storage
///
/// Rows keep a `position` column so the list loads back in the order it
/// was saved.
pub struct SqliteBlacklistStore {
    conn: Mutex<Connection>,
}

impl SqliteBlacklistStore {
    /// Open (or create) the database at `db_path` and initialize the schema
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, PersistenceError> {
        let conn = Connection::open(db_path)?;
        let store = SqliteBlacklistStore {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory SQLite database (useful for testing)
    pub fn in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteBlacklistStore {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), PersistenceError> {
        let conn = self.lock()?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, PersistenceError> {
        self.conn.lock().map_err(|_| PersistenceError::LockPoisoned)
    }

    fn parse_ip(ip_str: &str) -> Result<Ipv4Addr, PersistenceError> {
        Ipv4Addr::from_str(ip_str)
            .map_err(|_| PersistenceError::InvalidData(format!("Invalid IP address: {}", ip_str)))
    }

    fn parse_timestamp(value: &str) -> Result<NaiveDateTime, PersistenceError> {
        NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
            .map_err(|_| PersistenceError::InvalidData(format!("Invalid timestamp: {}", value)))
    }
}

impl BlacklistStore for SqliteBlacklistStore {
    fn load(&self) -> Result<Vec<BlacklistEntry>, PersistenceError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT ip, last_seen, attempt_count, users FROM blacklist ORDER BY position",
        )?;

        let rows = stmt
            .query_map([], |row| {
                let ip: String = row.get(0)?;
                let last_seen: String = row.get(1)?;
                let attempt_count: i64 = row.get(2)?;
                let users: String = row.get(3)?;
                Ok((ip, last_seen, attempt_count, users))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(ip, last_seen, attempt_count, users)| -> Result<BlacklistEntry, PersistenceError> {
                let users: BTreeSet<String> = serde_json::from_str(&users)?;
                let attempt_count = usize::try_from(attempt_count).map_err(|_| {
                    PersistenceError::InvalidData(format!("Invalid attempt count: {}", attempt_count))
                })?;
                Ok(BlacklistEntry {
                    address: Self::parse_ip(&ip)?,
                    last_seen: Self::parse_timestamp(&last_seen)?,
                    attempt_count,
                    users,
                })
            })
            .collect()
    }

    fn save(&self, entries: &[BlacklistEntry]) -> Result<(), PersistenceError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM blacklist", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO blacklist (position, ip, last_seen, attempt_count, users)
                 VALUES (?, ?, ?, ?, ?)",
            )?;
            for (position, entry) in entries.iter().enumerate() {
                stmt.execute(params![
                    position as i64,
                    entry.address.to_string(),
                    entry.last_seen.format(TIMESTAMP_FORMAT).to_string(),
                    entry.attempt_count as i64,
                    serde_json::to_string(&entry.users)?,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
