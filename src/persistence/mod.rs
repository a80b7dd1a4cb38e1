//! Persistence module for the blacklist
//!
//! The blacklist survives between runs and records every address that has
//! ever crossed the attempt threshold. Backends overwrite the whole list
//! on save.

pub mod json_store;
pub mod sqlite_store;

pub use json_store::JsonBlacklistStore;
pub use sqlite_store::SqliteBlacklistStore;

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::path::Path;

use thiserror::Error;

use crate::models::BlacklistEntry;

/// Errors that can occur during persistence operations
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid data in store: {0}")]
    InvalidData(String),

    #[error("Unknown persistence backend: {0}")]
    UnknownBackend(String),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Trait for blacklist persistence backends
pub trait BlacklistStore: Send + Sync {
    /// Load the persisted blacklist. A store with no prior state yields an
    /// empty list.
    fn load(&self) -> Result<Vec<BlacklistEntry>, PersistenceError>;

    /// Replace the persisted blacklist with `entries`
    fn save(&self, entries: &[BlacklistEntry]) -> Result<(), PersistenceError>;
}

/// Open the backend named in the configuration
pub fn open_store(backend: &str, path: &Path) -> Result<Box<dyn BlacklistStore>, PersistenceError> {
    match backend.to_lowercase().as_str() {
        "json" => Ok(Box::new(JsonBlacklistStore::new(path.to_path_buf()))),
        "sqlite" => Ok(Box::new(SqliteBlacklistStore::new(path)?)),
        other => Err(PersistenceError::UnknownBackend(other.to_string())),
    }
}

/// Union of the persisted blacklist and new suspects, keyed by address.
///
/// Persisted entries come first and win: when an address is on both sides
/// the stored count, timestamp and users are kept and the fresh values are
/// dropped. Duplicates on either side collapse to their first occurrence.
pub fn merge(persisted: &[BlacklistEntry], new_suspects: &[BlacklistEntry]) -> Vec<BlacklistEntry> {
    let mut seen: HashSet<Ipv4Addr> = HashSet::new();

    persisted
        .iter()
        .chain(new_suspects.iter())
        .filter(|entry| seen.insert(entry.address))
        .cloned()
        .collect()
}
