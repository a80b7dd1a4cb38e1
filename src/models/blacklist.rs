use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

use super::ActivitySummary;

/// Persisted record of an address that crossed the attempt threshold.
///
/// Field names on disk follow the historical `blacklist.json` layout
/// (`ip`, `date`, `count`, `users`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    #[serde(rename = "ip")]
    pub address: Ipv4Addr,
    #[serde(rename = "date", deserialize_with = "deserialize_last_seen")]
    pub last_seen: NaiveDateTime,
    #[serde(rename = "count")]
    pub attempt_count: usize,
    pub users: BTreeSet<String>,
}

impl BlacklistEntry {
    pub fn users_display(&self) -> String {
        self.users.iter().cloned().collect::<Vec<_>>().join(",")
    }
}

impl From<ActivitySummary> for BlacklistEntry {
    fn from(summary: ActivitySummary) -> Self {
        BlacklistEntry {
            address: summary.address,
            last_seen: summary.last_seen,
            attempt_count: summary.attempt_count,
            users: summary.users,
        }
    }
}

/// Accept both naive timestamps and RFC 3339 ones with an offset; the
/// latter are converted to local time.
fn deserialize_last_seen<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(naive) = raw.parse::<NaiveDateTime>() {
        return Ok(naive);
    }
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Local).naive_local())
        .map_err(serde::de::Error::custom)
}

/// An address currently dropped by the firewall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FirewallBanEntry {
    pub address: Ipv4Addr,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserializes_offset_timestamps() {
        let json = r#"{"ip":"203.0.113.7","date":"2024-03-14T09:26:53.000Z","count":6,"users":["root"]}"#;
        let entry: BlacklistEntry = serde_json::from_str(json).unwrap();

        let expected = DateTime::parse_from_rfc3339("2024-03-14T09:26:53Z")
            .unwrap()
            .with_timezone(&Local)
            .naive_local();
        assert_eq!(entry.last_seen, expected);
        assert_eq!(entry.address, Ipv4Addr::new(203, 0, 113, 7));
    }

    #[test]
    fn test_rejects_garbage_timestamps() {
        let json = r#"{"ip":"203.0.113.7","date":"yesterday","count":6,"users":[]}"#;
        assert!(serde_json::from_str::<BlacklistEntry>(json).is_err());
    }
}
