//! Snapshot archive URL handling.
//!
//! The Wayback Machine serves captures under a wrapper URL embedding a
//! 14-digit capture timestamp, an optional asset-kind tag, and the original
//! resource URL. This module owns both directions of that translation:
//!
//! - [`codec`] - encode/decode wrapper URLs, extract originals embedded in text
//! - [`timeframe`] - expanding-window timestamp fallback when a capture is
//!   missing at the primary timestamp

pub mod codec;
pub mod timeframe;

pub use codec::{AssetTag, Decoded, FormatError, decode, encode, extract_original, is_wrapped};
pub use timeframe::TimeframeResolver;

use std::fmt;

use chrono::{Duration, NaiveDateTime};

/// A capture timestamp in the archive's `YYYYMMDDHHMMSS` form.
///
/// Wrapper URLs occasionally carry fewer than 14 digits; short timestamps are
/// zero-padded on parse so arithmetic always works on a full datetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp {
    raw: String,
    when: NaiveDateTime,
}

impl Timestamp {
    /// Parses a timestamp from the digits of a wrapper URL.
    ///
    /// Leading digits are taken up to 14; shorter values are padded to a
    /// valid datetime (missing month/day become January 1st, missing time
    /// midnight). Returns `None` when the digits do not form a valid
    /// datetime.
    #[must_use]
    pub fn parse(digits: &str) -> Option<Self> {
        let numeric: String = digits.chars().take_while(char::is_ascii_digit).collect();
        if numeric.len() < 4 {
            return None;
        }
        let padded = if numeric.len() >= 14 {
            numeric[..14].to_string()
        } else {
            // Pad missing month/day with 01 and missing time with zeros.
            let mut s = numeric.clone();
            if s.len() < 6 {
                s.push_str("01");
            }
            if s.len() < 8 {
                s.push_str("01");
            }
            while s.len() < 14 {
                s.push('0');
            }
            s.truncate(14);
            s
        };
        let when = NaiveDateTime::parse_from_str(&padded, "%Y%m%d%H%M%S").ok()?;
        Some(Self { raw: padded, when })
    }

    /// Builds a timestamp from a datetime.
    #[must_use]
    pub fn from_datetime(when: NaiveDateTime) -> Self {
        Self {
            raw: when.format("%Y%m%d%H%M%S").to_string(),
            when,
        }
    }

    /// The 14-digit archive form.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The parsed datetime.
    #[must_use]
    pub fn datetime(&self) -> NaiveDateTime {
        self.when
    }

    /// A timestamp offset by whole hours (negative for earlier captures).
    #[must_use]
    pub fn offset_by_hours(&self, hours: i64) -> Self {
        Self::from_datetime(self.when + Duration::hours(hours))
    }

    /// Absolute distance to another timestamp, in seconds.
    #[must_use]
    pub fn abs_offset_secs(&self, other: &Self) -> i64 {
        (self.when - other.when).num_seconds().abs()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
