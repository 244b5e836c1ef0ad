//! Wall-clock timestamps in the simulator's one literal log format.

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A wall-clock timestamp in the local zone.
///
/// Every user-visible time in the system (process logs, fault records,
/// snapshot headers, report lines) renders through [`fmt::Display`] as
/// `(MM/DD/YYYY hh:mm:ssAM/PM)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Local>);

impl Timestamp {
    /// Captures the current local time.
    pub fn now() -> Self {
        Self(Local::now())
    }

    /// Builds a timestamp from a unix epoch second count.
    ///
    /// Used by tests that need reproducible timestamps.
    pub fn from_epoch_secs(secs: i64) -> Self {
        Self(
            Local
                .timestamp_opt(secs, 0)
                .single()
                .unwrap_or_else(|| Local.timestamp_opt(0, 0).single().expect("epoch")),
        )
    }

    /// Returns the inner chrono value.
    pub fn as_datetime(&self) -> DateTime<Local> {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("(%m/%d/%Y %I:%M:%S%p)"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_shape() {
        let rendered = format!("{}", Timestamp::now());
        // (MM/DD/YYYY hh:mm:ssAM) or (…PM): 22 characters, parenthesized.
        assert!(rendered.starts_with('('));
        assert!(rendered.ends_with("M)"));
        assert_eq!(rendered.len(), 23);
        assert_eq!(&rendered[3..4], "/");
        assert_eq!(&rendered[6..7], "/");
        assert_eq!(&rendered[11..12], " ");
    }

    #[test]
    fn test_ordering() {
        let early = Timestamp::from_epoch_secs(1_000);
        let late = Timestamp::from_epoch_secs(2_000);
        assert!(early < late);
    }
}
