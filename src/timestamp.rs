//! Relative timestamp formatting for message lists.
//!
//! Message times arrive as ISO-8601 strings. Older servers omit the zone marker, so a
//! timestamp without one is read as UTC. Formatting never fails: a value that does not
//! parse renders as [`INVALID_TIME`].

use chrono::{DateTime, Datelike, Local, TimeZone, Utc};

use crate::error::{MessengerError, Result};

/// Rendered in place of a timestamp that does not parse
pub const INVALID_TIME: &str = "Invalid time";
/// Rendered when the server sent no timestamp at all
pub const UNKNOWN_TIME: &str = "Unknown time";

/// Whether `raw` carries `Z` or a numeric offset after the date part
fn has_zone_marker(raw: &str) -> bool {
    let Some(tail) = raw.get(10..) else {
        return false;
    };
    tail.ends_with(['Z', 'z']) || tail.contains('+') || tail.contains('-')
}

/// Parse a message timestamp, treating zone-less values as UTC
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    let parsed = if has_zone_marker(raw) {
        DateTime::parse_from_rfc3339(raw)
    } else {
        DateTime::parse_from_rfc3339(&format!("{raw}Z"))
    };

    parsed
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MessengerError::InvalidTimestamp(format!("{raw}: {e}")))
}

/// Age of a timestamp relative to a sampled "now"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeAge {
    /// Timestamp lies after "now" (clock skew)
    Future,
    /// Less than a minute
    JustNow,
    /// Whole minutes, under an hour
    Minutes(i64),
    /// Whole hours, under a day
    Hours(i64),
    /// Whole days, under a week
    Days(i64),
    /// Whole weeks, under 30 days
    Weeks(i64),
    /// Whole 30-day months, under 365 days
    Months(i64),
    /// A year or more
    Distant,
}

impl RelativeAge {
    /// Bucket the distance between `timestamp` and `now`
    #[must_use]
    pub fn between(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let delta = now.signed_duration_since(timestamp);
        if delta < chrono::Duration::zero() {
            return Self::Future;
        }

        let minutes = delta.num_minutes();
        let hours = delta.num_hours();
        let days = delta.num_days();

        if minutes < 1 {
            Self::JustNow
        } else if minutes < 60 {
            Self::Minutes(minutes)
        } else if hours < 24 {
            Self::Hours(hours)
        } else if days < 7 {
            Self::Days(days)
        } else if days < 30 {
            Self::Weeks(days / 7)
        } else if days < 365 {
            Self::Months(days / 30)
        } else {
            Self::Distant
        }
    }
}

fn ago(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("{n} {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

/// Renders timestamps relative to "now", with absolute fallbacks in a display zone
#[derive(Debug, Clone)]
pub struct RelativeFormatter<Tz: TimeZone> {
    tz: Tz,
}

impl RelativeFormatter<Local> {
    /// Formatter that shows absolute times in the machine's local zone
    #[must_use]
    pub const fn local() -> Self {
        Self { tz: Local }
    }
}

impl<Tz> RelativeFormatter<Tz>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    /// Formatter that shows absolute times in `tz`
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Format a raw server timestamp; never fails
    pub fn format(&self, raw: &str, now: DateTime<Utc>) -> String {
        if raw.trim().is_empty() {
            return UNKNOWN_TIME.to_string();
        }
        match parse_timestamp(raw) {
            Ok(timestamp) => self.format_instant(timestamp, now),
            Err(err) => {
                tracing::debug!(error = %err, "Rendering placeholder for unparseable timestamp");
                INVALID_TIME.to_string()
            },
        }
    }

    /// Labels for a run of raw timestamps, in order. Comparing two runs tells whether a
    /// new sample of "now" changed anything on screen.
    pub fn labels<'a, I>(&self, raws: I, now: DateTime<Utc>) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        raws.into_iter().map(|raw| self.format(raw, now)).collect()
    }

    /// Format an already parsed instant
    pub fn format_instant(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
        let local = timestamp.with_timezone(&self.tz);
        match RelativeAge::between(timestamp, now) {
            RelativeAge::Future => local.format("%-I:%M %p").to_string(),
            RelativeAge::JustNow => "Just now".to_string(),
            RelativeAge::Minutes(n) => ago(n, "minute"),
            RelativeAge::Hours(n) => ago(n, "hour"),
            RelativeAge::Days(n) => ago(n, "day"),
            RelativeAge::Weeks(n) => ago(n, "week"),
            RelativeAge::Months(n) => ago(n, "month"),
            RelativeAge::Distant => {
                let now_year = now.with_timezone(&self.tz).year();
                if local.year() == now_year {
                    local.format("%b %-d").to_string()
                } else {
                    local.format("%b %-d, %Y").to_string()
                }
            },
        }
    }
}

/// Format `raw` relative to `now`, with absolute fallbacks in local time
pub fn format_relative(raw: &str, now: DateTime<Utc>) -> String {
    RelativeFormatter::local().format(raw, now)
}
