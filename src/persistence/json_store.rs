//! JSON file implementation of the BlacklistStore trait

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use super::{BlacklistStore, PersistenceError};
use crate::models::BlacklistEntry;

/// Blacklist stored as a JSON array in a single file
pub struct JsonBlacklistStore {
    path: PathBuf,
}

impl JsonBlacklistStore {
    pub fn new(path: PathBuf) -> Self {
        JsonBlacklistStore { path }
    }
}

impl BlacklistStore for JsonBlacklistStore {
    fn load(&self) -> Result<Vec<BlacklistEntry>, PersistenceError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("No blacklist at {:?}, starting empty", self.path);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, entries: &[BlacklistEntry]) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(entries)?;
        // Replace atomically via rename
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        log::debug!("Saved {} blacklist entries to {:?}", entries.len(), self.path);
        Ok(())
    }
}
