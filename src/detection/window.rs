//! Lookbehind window aggregation of failed logins
//!
//! The window is anchored at the newest event in the log rather than at the
//! wall clock, so an old log still produces a meaningful result.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::input::ParseError;
use crate::models::{ActivitySummary, AuthEvent};

/// Resolved window bounds. Events strictly after `lower` are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowBounds {
    pub lower: NaiveDateTime,
    pub upper: NaiveDateTime,
}

impl WindowBounds {
    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        timestamp > self.lower
    }
}

/// Result of one aggregation pass
#[derive(Debug, Clone)]
pub struct WindowAggregation {
    pub bounds: WindowBounds,
    pub total_events: usize,
    pub kept_events: usize,
    /// One summary per address, in order of first appearance
    pub summaries: Vec<ActivitySummary>,
}

impl WindowAggregation {
    pub fn discarded_events(&self) -> usize {
        self.total_events - self.kept_events
    }
}

/// Groups failed logins per source address inside a trailing window
pub struct WindowAggregator {
    lookbehind_minutes: i64,
}

impl WindowAggregator {
    pub fn from_minutes(minutes: i64) -> Self {
        WindowAggregator {
            lookbehind_minutes: minutes,
        }
    }

    /// Compute the window bounds anchored at the newest event
    pub fn bounds(&self, events: &[AuthEvent]) -> Result<WindowBounds, ParseError> {
        let upper = events
            .iter()
            .map(|e| e.timestamp)
            .max()
            .ok_or(ParseError::NoEvents)?;
        let lower = Duration::try_minutes(self.lookbehind_minutes)
            .and_then(|lookbehind| upper.checked_sub_signed(lookbehind))
            .ok_or(ParseError::WindowOutOfRange {
                minutes: self.lookbehind_minutes,
            })?;
        Ok(WindowBounds { lower, upper })
    }

    /// Aggregate `events` into per-address summaries
    pub fn aggregate(&self, events: &[AuthEvent]) -> Result<WindowAggregation, ParseError> {
        let bounds = self.bounds(events)?;
        log::info!("Date range: {} .. {}", bounds.lower, bounds.upper);

        let kept = filter_window(events, &bounds);
        log::info!(
            "Found {} failed login(s) in window, {} older discarded",
            kept.len(),
            events.len() - kept.len()
        );

        let summaries = summarize(&kept);
        Ok(WindowAggregation {
            bounds,
            total_events: events.len(),
            kept_events: kept.len(),
            summaries,
        })
    }
}

/// Keep only events inside `bounds`
pub fn filter_window(events: &[AuthEvent], bounds: &WindowBounds) -> Vec<AuthEvent> {
    events
        .iter()
        .filter(|e| bounds.contains(e.timestamp))
        .cloned()
        .collect()
}

/// Reduce events to one summary per address
pub fn summarize(events: &[AuthEvent]) -> Vec<ActivitySummary> {
    let mut index: HashMap<Ipv4Addr, usize> = HashMap::new();
    let mut summaries: Vec<ActivitySummary> = Vec::new();

    for event in events {
        match index.get(&event.source_address) {
            Some(&slot) => summaries[slot].absorb(event),
            None => {
                index.insert(event.source_address, summaries.len());
                summaries.push(ActivitySummary::from_event(event));
            }
        }
    }

    summaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;
    use std::str::FromStr;

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn event(ip: &str, user: &str, timestamp: NaiveDateTime) -> AuthEvent {
        AuthEvent {
            timestamp,
            source_address: Ipv4Addr::from_str(ip).unwrap(),
            username: user.to_string(),
        }
    }

    #[test]
    fn test_empty_events_is_an_error() {
        let aggregator = WindowAggregator::from_minutes(10);
        assert_eq!(aggregator.aggregate(&[]).unwrap_err(), ParseError::NoEvents);
    }

    #[test]
    fn test_oversized_lookbehind_is_an_error() {
        let events = vec![event("10.0.0.1", "root", ts(9, 0, 0))];

        // Representable as a duration, but the lower bound is before the earliest date
        let result = WindowAggregator::from_minutes(200_000_000_000).aggregate(&events);
        assert_eq!(
            result.unwrap_err(),
            ParseError::WindowOutOfRange { minutes: 200_000_000_000 }
        );

        let result = WindowAggregator::from_minutes(i64::MAX).bounds(&events);
        assert_eq!(result, Err(ParseError::WindowOutOfRange { minutes: i64::MAX }));
    }

    #[test]
    fn test_bounds_anchor_on_newest_event() {
        let aggregator = WindowAggregator::from_minutes(10);
        let events = vec![
            event("10.0.0.1", "root", ts(9, 30, 0)),
            event("10.0.0.1", "root", ts(9, 0, 0)),
        ];

        let bounds = aggregator.bounds(&events).unwrap();
        assert_eq!(bounds.upper, ts(9, 30, 0));
        assert_eq!(bounds.lower, ts(9, 20, 0));
    }

    #[test]
    fn test_lower_bound_is_exclusive() {
        let aggregator = WindowAggregator::from_minutes(10);
        let events = vec![
            event("10.0.0.1", "root", ts(9, 20, 0)),
            event("10.0.0.2", "root", ts(9, 20, 1)),
            event("10.0.0.3", "root", ts(9, 30, 0)),
        ];

        let result = aggregator.aggregate(&events).unwrap();
        assert_eq!(result.kept_events, 2);
        assert_eq!(result.discarded_events(), 1);
        let kept: Vec<_> = result.summaries.iter().map(|s| s.address.to_string()).collect();
        assert_eq!(kept, vec!["10.0.0.2", "10.0.0.3"]);
    }

    #[test]
    fn test_summary_counts_and_users() {
        let aggregator = WindowAggregator::from_minutes(60);
        let events = vec![
            event("10.0.0.5", "root", ts(9, 0, 0)),
            event("10.0.0.5", "admin", ts(9, 5, 0)),
            event("10.0.0.9", "pi", ts(9, 6, 0)),
            event("10.0.0.5", "root", ts(9, 2, 0)),
        ];

        let result = aggregator.aggregate(&events).unwrap();
        assert_eq!(result.summaries.len(), 2);

        let first = &result.summaries[0];
        assert_eq!(first.address, Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(first.attempt_count, 3);
        assert_eq!(first.last_seen, ts(9, 5, 0));
        let users: BTreeSet<String> = ["admin", "root"].iter().map(|u| u.to_string()).collect();
        assert_eq!(first.users, users);
    }

    #[test]
    fn test_filtering_is_idempotent() {
        let aggregator = WindowAggregator::from_minutes(5);
        let events = vec![
            event("10.0.0.1", "a", ts(9, 0, 0)),
            event("10.0.0.1", "b", ts(9, 4, 0)),
            event("10.0.0.2", "c", ts(9, 8, 0)),
        ];
        let bounds = aggregator.bounds(&events).unwrap();

        let once = filter_window(&events, &bounds);
        let twice = filter_window(&once, &bounds);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_summary_independent_of_event_order() {
        let events = vec![
            event("10.0.0.5", "root", ts(9, 0, 0)),
            event("10.0.0.5", "admin", ts(9, 5, 0)),
            event("10.0.0.5", "oracle", ts(9, 1, 0)),
            event("10.0.0.5", "root", ts(9, 3, 0)),
        ];
        let mut reversed = events.clone();
        reversed.reverse();

        let forward = summarize(&events);
        let backward = summarize(&reversed);
        assert_eq!(forward, backward);
        assert_eq!(forward[0].attempt_count, 4);
        assert_eq!(forward[0].users.len(), 3);
    }
}
