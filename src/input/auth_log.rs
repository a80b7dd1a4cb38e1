//! sshd authentication log parser
//!
//! Extracts failed password attempts, both for existing accounts and for
//! `invalid user` attempts. Syslog timestamps carry no year, so the parser
//! stamps every event with a fixed year (the current one by default).
//! A log that spans New Year will date its December lines into the
//! future relative to its January lines.
//!
//! The client picks the username, and sshd logs it verbatim, so it may
//! itself contain `from <address>`. The source address is therefore taken
//! from the last `from <address>` that sshd terminates with `port <n>`.

use std::net::Ipv4Addr;
use std::str::FromStr;

use chrono::{Datelike, Local, NaiveDateTime};
use regex::Regex;

use super::ParseError;
use crate::models::AuthEvent;

const FAILED_LOGIN_PATTERN: &str = r"Failed password for( invalid user)? (.+) from (\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})(?: port \d+|\s*$)";
const TIMESTAMP_PATTERN: &str = r"^\w+\s+\d+\s+[0-9:]+";

/// Parser for sshd failed-login lines
pub struct AuthLogParser {
    failed_login: Regex,
    timestamp: Regex,
    year: i32,
}

impl AuthLogParser {
    /// Create a parser that assumes events happened in the current year
    pub fn new() -> Self {
        Self::with_year(Local::now().year())
    }

    /// Create a parser that stamps events with the given year
    pub fn with_year(year: i32) -> Self {
        AuthLogParser {
            failed_login: Regex::new(FAILED_LOGIN_PATTERN).expect("failed login pattern is valid"),
            timestamp: Regex::new(TIMESTAMP_PATTERN).expect("timestamp pattern is valid"),
            year,
        }
    }

    /// Parse the whole log, returning one event per failed password line
    pub fn parse(&self, text: &str) -> Result<Vec<AuthEvent>, ParseError> {
        let normalized = text.replace("\r\n", "\n");
        let mut events = Vec::new();

        for line in normalized.split('\n') {
            if let Some(event) = self.parse_line(line)? {
                events.push(event);
            }
        }

        log::debug!("Parsed {} failed login event(s)", events.len());
        Ok(events)
    }

    /// Parse one line. Lines that are not failed logins yield `None`.
    pub fn parse_line(&self, line: &str) -> Result<Option<AuthEvent>, ParseError> {
        let caps = match self.failed_login.captures(line) {
            Some(caps) => caps,
            None => return Ok(None),
        };

        let stamp = self
            .timestamp
            .find(line)
            .ok_or_else(|| ParseError::MissingTimestamp { line: line.to_string() })?;
        let timestamp = self.parse_timestamp(stamp.as_str())?;

        let raw_ip = &caps[3];
        let source_address = Ipv4Addr::from_str(raw_ip)
            .map_err(|_| ParseError::InvalidAddress { value: raw_ip.to_string() })?;

        Ok(Some(AuthEvent {
            timestamp,
            source_address,
            username: caps[2].to_string(),
        }))
    }

    fn parse_timestamp(&self, stamp: &str) -> Result<NaiveDateTime, ParseError> {
        // "Jan  5 10:00:00" -> "2024 Jan 5 10:00:00"
        let collapsed = stamp.split_whitespace().collect::<Vec<_>>().join(" ");
        let full = format!("{} {}", self.year, collapsed);
        NaiveDateTime::parse_from_str(&full, "%Y %b %d %H:%M:%S")
            .map_err(|_| ParseError::InvalidTimestamp { value: stamp.to_string() })
    }
}

impl Default for AuthLogParser {
    fn default() -> Self {
        Self::new()
    }
}
