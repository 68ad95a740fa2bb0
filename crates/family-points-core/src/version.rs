//! Version tag generation and ordering.
//!
//! Version tags are ISO-8601 UTC timestamps with millisecond precision
//! (`2024-01-01T00:00:00.000Z`). Their lexicographic order equals their
//! chronological order, so comparison is a plain string comparison.
//!
//! Ordering is only meaningful between tags produced by an oracle. Tags
//! minted on different devices are ordered by their wall clocks; clock skew
//! between devices is not corrected.

use std::cmp::Ordering;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Sentinel used when a replica has no version yet. Sorts before every tag.
pub const OLDEST_VERSION: &str = "0";

/// Source of version tags.
pub trait VersionOracle: Send + Sync {
    /// Mint a tag strictly greater than every tag this oracle returned before.
    fn generate(&self) -> String;

    fn compare(&self, left: &str, right: &str) -> Ordering {
        compare_versions(left, right)
    }
}

/// Lexicographic comparison of two version tags.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    left.cmp(right)
}

/// Format an instant as a version tag.
pub fn format_version(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Wall-clock oracle.
///
/// If the clock has not advanced past the last issued tag (same millisecond,
/// or the clock stepped backwards) the next tag is the last one plus 1 ms.
pub struct ClockVersionOracle {
    clock: Clock,
    last: Mutex<Option<DateTime<Utc>>>,
}

impl ClockVersionOracle {
    pub fn new() -> Self {
        Self::with_clock(Utc::now)
    }

    pub fn with_clock(clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        Self {
            clock: Box::new(clock),
            last: Mutex::new(None),
        }
    }
}

impl Default for ClockVersionOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ClockVersionOracle {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let last = *self.last.lock().unwrap_or_else(PoisonError::into_inner);
        formatter
            .debug_struct("ClockVersionOracle")
            .field("last", &last.map(format_version))
            .finish_non_exhaustive()
    }
}

impl VersionOracle for ClockVersionOracle {
    fn generate(&self) -> String {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let now = truncate_to_millis((self.clock)());
        let next = match *last {
            Some(previous) if now <= previous => previous + Duration::milliseconds(1),
            _ => now,
        };
        *last = Some(next);
        format_version(next)
    }
}

fn truncate_to_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(instant.timestamp_millis()).unwrap_or(instant)
}
