use chrono::{DateTime, Datelike, FixedOffset, Offset, Utc};
use std::fmt;
use std::str::FromStr;

/// The viewer's timezone as a fixed UTC offset. Report buckets and labels are
/// computed in this local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerTimezone(FixedOffset);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid timezone {0:?}: expected UTC, +HH:MM or -HH:MM")]
pub struct TimezoneParseError(pub String);

impl ViewerTimezone {
    pub fn utc() -> Self {
        Self(Utc.fix())
    }

    pub fn offset_secs(&self) -> i32 {
        self.0.local_minus_utc()
    }

    fn local(&self, timestamp: i64) -> Option<DateTime<FixedOffset>> {
        DateTime::from_timestamp(timestamp, 0).map(|t| t.with_timezone(&self.0))
    }

    /// Calendar day containing `timestamp`, as (year, day of year).
    pub fn day_key(&self, timestamp: i64) -> Option<(i32, u32)> {
        self.local(timestamp).map(|t| (t.year(), t.ordinal()))
    }

    /// ISO-8601 week containing `timestamp`, as (ISO year, week number).
    pub fn week_key(&self, timestamp: i64) -> Option<(i32, u32)> {
        self.local(timestamp).map(|t| {
            let week = t.iso_week();
            (week.year(), week.week())
        })
    }

    pub fn month_key(&self, timestamp: i64) -> Option<(i32, u32)> {
        self.local(timestamp).map(|t| (t.year(), t.month()))
    }

    /// Short date, e.g. `Oct 18 2026`.
    pub fn date_label(&self, timestamp: i64) -> String {
        self.local(timestamp)
            .map(|t| t.format("%b %-d %Y").to_string())
            .unwrap_or_default()
    }

    /// Month and year, e.g. `October, 2026`.
    pub fn month_label(&self, timestamp: i64) -> String {
        self.local(timestamp)
            .map(|t| t.format("%B, %Y").to_string())
            .unwrap_or_default()
    }
}

impl Default for ViewerTimezone {
    fn default() -> Self {
        Self::utc()
    }
}

impl FromStr for ViewerTimezone {
    type Err = TimezoneParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || TimezoneParseError(s.to_string());
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("utc") || trimmed.eq_ignore_ascii_case("z") {
            return Ok(Self::utc());
        }

        let (sign, rest) = match trimmed.as_bytes().first() {
            Some(b'+') => (1, &trimmed[1..]),
            Some(b'-') => (-1, &trimmed[1..]),
            _ => return Err(err()),
        };
        let digits: String = rest.chars().filter(|c| *c != ':').collect();
        if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }
        // "+05:30" and "+0530" only; reject "+0:530" style placements.
        if rest.contains(':') && rest.find(':') != Some(2) {
            return Err(err());
        }
        let hours: i32 = digits[..2].parse().map_err(|_| err())?;
        let minutes: i32 = digits[2..].parse().map_err(|_| err())?;
        if hours > 23 || minutes > 59 {
            return Err(err());
        }
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(Self)
            .ok_or_else(err)
    }
}

impl fmt::Display for ViewerTimezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pick the first usable timezone. Unusable candidates are logged and skipped.
pub fn resolve_timezone<'a>(
    candidates: impl IntoIterator<Item = (&'static str, Option<&'a str>)>,
    default: ViewerTimezone,
) -> ViewerTimezone {
    for (source, value) in candidates {
        let Some(value) = value else { continue };
        match value.parse::<ViewerTimezone>() {
            Ok(tz) => return tz,
            Err(e) => {
                tracing::warn!(source, error = %e, "ignoring unusable viewer timezone");
            }
        }
    }
    default
}
