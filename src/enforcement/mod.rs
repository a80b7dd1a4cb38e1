//! Firewall enforcement
//!
//! Bans are applied one address at a time, in list order, each awaited
//! before the next starts. The first failure stops the run.

pub mod command;

pub use command::CommandFirewall;

use std::net::Ipv4Addr;

use async_trait::async_trait;
use thiserror::Error;

use crate::input::InputError;
use crate::models::BlacklistEntry;

/// Errors raised by a ban action
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Failed to spawn ban command for {address}: {source}")]
    Spawn {
        address: Ipv4Addr,
        #[source]
        source: std::io::Error,
    },

    #[error("Ban command `{command}` for {address} exited with {status}: {stderr}")]
    CommandFailed {
        address: Ipv4Addr,
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("Ban of {address} rejected: {reason}")]
    Rejected { address: Ipv4Addr, reason: String },
}

/// The host firewall as seen by the pipeline
#[async_trait]
pub trait Firewall: Send + Sync {
    /// Dump the current ruleset as text
    async fn current_state(&self) -> Result<String, InputError>;

    /// Drop all traffic from `address`
    async fn ban(&self, address: Ipv4Addr) -> Result<(), ActionError>;
}

/// Outcome of one enforcement pass
#[derive(Debug, Default)]
pub struct EnforcementReport {
    /// Addresses banned successfully, in the order they were applied
    pub banned: Vec<Ipv4Addr>,
    /// First failed ban, after which nothing else was attempted
    pub failure: Option<ActionError>,
}

impl EnforcementReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    pub fn into_result(self) -> Result<Vec<Ipv4Addr>, ActionError> {
        match self.failure {
            Some(e) => Err(e),
            None => Ok(self.banned),
        }
    }
}

/// Ban every pending address sequentially, stopping at the first failure
pub async fn enforce<F: Firewall + ?Sized>(firewall: &F, pending: &[BlacklistEntry]) -> EnforcementReport {
    let mut report = EnforcementReport::default();

    for entry in pending {
        match firewall.ban(entry.address).await {
            Ok(()) => report.banned.push(entry.address),
            Err(e) => {
                log::error!("Ban of {} failed: {}", entry.address, e);
                report.failure = Some(e);
                break;
            }
        }
    }

    report
}
