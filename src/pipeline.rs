//! One detection and enforcement run
//!
//! Order of operations: read and parse the firewall state, read and parse
//! the authentication log, aggregate and threshold, merge with the stored
//! blacklist, diff against the firewall, ban, then save. Every error aborts
//! the run.

use std::net::Ipv4Addr;

use thiserror::Error;

use crate::config::Config;
use crate::detection::{partition_suspects, pending_bans, WindowAggregator};
use crate::enforcement::{enforce, ActionError, EnforcementReport, Firewall};
use crate::input::{AuthLogParser, AuthLogSource, FirewallStateParser, InputError, ParseError};
use crate::models::BlacklistEntry;
use crate::output::RunReport;
use crate::persistence::{merge, BlacklistStore, PersistenceError};

/// Errors that end a run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Wires the collaborators of a run together
pub struct Pipeline<'a> {
    config: &'a Config,
    auth_log: &'a dyn AuthLogSource,
    firewall: &'a dyn Firewall,
    store: &'a dyn BlacklistStore,
    log_parser: AuthLogParser,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a Config,
        auth_log: &'a dyn AuthLogSource,
        firewall: &'a dyn Firewall,
        store: &'a dyn BlacklistStore,
    ) -> Self {
        Pipeline {
            config,
            auth_log,
            firewall,
            store,
            log_parser: AuthLogParser::new(),
        }
    }

    /// Replace the log parser (e.g. to pin the assumed year)
    pub fn with_log_parser(mut self, log_parser: AuthLogParser) -> Self {
        self.log_parser = log_parser;
        self
    }

    /// Execute one run
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let firewall_parser = FirewallStateParser::with_anchors(
            &self.config.firewall.chain_header,
            &self.config.firewall.drop_token,
        );
        let dump = self.firewall.current_state().await?;
        let currently_banned = firewall_parser.parse(&dump)?;
        log::info!("Firewall currently drops {} address(es)", currently_banned.len());

        let log_text = self.auth_log.read_log().await?;
        let events = self.log_parser.parse(&log_text)?;
        let aggregation =
            WindowAggregator::from_minutes(self.config.detection.lookbehind_minutes).aggregate(&events)?;
        let split = partition_suspects(
            aggregation.summaries.clone(),
            self.config.detection.max_attempts_per_ip,
        );

        let persisted = self.store.load()?;
        let fresh: Vec<BlacklistEntry> = split.suspects.iter().cloned().map(BlacklistEntry::from).collect();
        let blacklist = merge(&persisted, &fresh);
        log::info!(
            "Blacklist: {} stored, {} suspect(s), {} after merge",
            persisted.len(),
            fresh.len(),
            blacklist.len()
        );

        let pending = pending_bans(&blacklist, &currently_banned);
        let banned = self.apply_bans(&pending, &blacklist).await?;

        self.store.save(&blacklist)?;

        Ok(RunReport {
            window: aggregation.bounds,
            events_total: aggregation.total_events,
            events_kept: aggregation.kept_events,
            suspects: split.suspects,
            below_threshold: split.below,
            pending,
            banned,
            blacklist_size: blacklist.len(),
            dry_run: self.config.firewall.dry_run,
        })
    }

    async fn apply_bans(
        &self,
        pending: &[BlacklistEntry],
        blacklist: &[BlacklistEntry],
    ) -> Result<Vec<Ipv4Addr>, PipelineError> {
        let EnforcementReport { banned, failure } = enforce(self.firewall, pending).await;
        let error = match failure {
            None => return Ok(banned),
            Some(error) => error,
        };

        if !banned.is_empty() {
            let done: Vec<String> = banned.iter().map(|a| a.to_string()).collect();
            log::warn!("Banned before failure: {}", done.join(" "));
        }

        if self.config.persistence.persist_on_partial_failure {
            log::warn!("Saving blacklist despite failed ban; unbanned entries stay pending");
            // The ban failure is the error the run reports
            if let Err(save_error) = self.store.save(blacklist) {
                log::error!("Failed to save blacklist after failed ban: {}", save_error);
            }
        }

        Err(error.into())
    }
}
