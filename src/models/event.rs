use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A single failed password attempt taken from the authentication log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub timestamp: NaiveDateTime,
    pub source_address: Ipv4Addr,
    pub username: String,
}

/// Failed-login activity of one address within the lookbehind window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub address: Ipv4Addr,
    pub last_seen: NaiveDateTime,
    pub attempt_count: usize,
    pub users: BTreeSet<String>,
}

impl ActivitySummary {
    /// Start a summary from the first event seen for an address
    pub fn from_event(event: &AuthEvent) -> Self {
        let mut users = BTreeSet::new();
        users.insert(event.username.clone());
        ActivitySummary {
            address: event.source_address,
            last_seen: event.timestamp,
            attempt_count: 1,
            users,
        }
    }

    /// Fold another event from the same address into this summary
    pub fn absorb(&mut self, event: &AuthEvent) {
        debug_assert_eq!(self.address, event.source_address);
        if event.timestamp > self.last_seen {
            self.last_seen = event.timestamp;
        }
        self.attempt_count += 1;
        self.users.insert(event.username.clone());
    }

    /// Comma separated user list for log lines
    pub fn users_display(&self) -> String {
        self.users.iter().cloned().collect::<Vec<_>>().join(",")
    }
}
