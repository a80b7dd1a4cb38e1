//! Input sources and text-format parsers
//!
//! The authentication log and the firewall ruleset dump are the two raw
//! inputs of a run. Reading them is delegated to collaborators so tests can
//! feed fixed fixtures; parsing them is pure.

pub mod auth_log;
pub mod firewall_state;

pub use auth_log::AuthLogParser;
pub use firewall_state::FirewallStateParser;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised while fetching raw input text
#[derive(Error, Debug)]
pub enum InputError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Errors raised while turning raw text into records
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed firewall dump: no line starting with `{0}`")]
    MissingAnchor(String),

    #[error("Drop rule without an IPv4 address: {line}")]
    MissingAddress { line: String },

    #[error("Invalid IPv4 address: {value}")]
    InvalidAddress { value: String },

    #[error("Failed login line without a timestamp: {line}")]
    MissingTimestamp { line: String },

    #[error("Unparseable log timestamp: {value}")]
    InvalidTimestamp { value: String },

    #[error("No failed login events to anchor the lookbehind window")]
    NoEvents,

    #[error("Lookbehind of {minutes} minutes is outside the representable time range")]
    WindowOutOfRange { minutes: i64 },
}

/// Source of the current authentication log text
#[async_trait]
pub trait AuthLogSource: Send + Sync {
    async fn read_log(&self) -> Result<String, InputError>;
}

/// Reads the authentication log from a file on disk
pub struct FileAuthLog {
    path: PathBuf,
}

impl FileAuthLog {
    pub fn new(path: PathBuf) -> Self {
        FileAuthLog { path }
    }
}

#[async_trait]
impl AuthLogSource for FileAuthLog {
    async fn read_log(&self) -> Result<String, InputError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|source| InputError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
