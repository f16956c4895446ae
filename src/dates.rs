//! Publication date normalization.
//!
//! Feeds publish dates in whatever shape their generator prefers. Rather than
//! guessing, [`normalize`] walks [`DATE_FORMATS`] in order and returns the
//! first successful parse; anything not covered by the table is rejected.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc, Weekday};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized publication date {input:?}")]
pub struct DateParseError {
    pub input: String,
}

/// How the zone part of a format is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneStyle {
    /// `+0700` / `-07:00`, parsed by the pattern's `%z`.
    Numeric,
    /// A trailing abbreviation such as `GMT` or `PDT`.
    Named,
    /// RFC 3339: either `Z` or a colon-separated offset.
    Rfc3339,
    /// No zone in the input; the time is taken as UTC.
    Utc,
}

#[derive(Debug, PartialEq, Eq)]
pub struct DateFormat {
    pub name: &'static str,
    /// chrono pattern applied after the weekday prefix (and, for
    /// [`ZoneStyle::Named`], the zone abbreviation) has been removed.
    pub pattern: &'static str,
    /// Input starts with `Mon, `. The weekday is checked for syntax only.
    pub weekday: bool,
    pub zone: ZoneStyle,
}

/// Supported formats, highest priority first.
pub const DATE_FORMATS: &[DateFormat] = &[
    DateFormat {
        name: "RFC 1123 numeric zone",
        pattern: "%d %b %Y %H:%M:%S %z",
        weekday: true,
        zone: ZoneStyle::Numeric,
    },
    DateFormat {
        name: "RFC 1123 named zone",
        pattern: "%d %b %Y %H:%M:%S",
        weekday: true,
        zone: ZoneStyle::Named,
    },
    DateFormat {
        name: "RFC 822 numeric zone",
        pattern: "%d %b %y %H:%M %z",
        weekday: false,
        zone: ZoneStyle::Numeric,
    },
    DateFormat {
        name: "RFC 822 named zone",
        pattern: "%d %b %y %H:%M",
        weekday: false,
        zone: ZoneStyle::Named,
    },
    DateFormat {
        name: "ISO 8601",
        pattern: "%Y-%m-%dT%H:%M:%S%:z",
        weekday: false,
        zone: ZoneStyle::Rfc3339,
    },
    // never reached: "ISO 8601" accepts every input this pattern does. Kept so
    // the table order stays the documented priority order.
    DateFormat {
        name: "ISO 8601 numeric offset",
        pattern: "%Y-%m-%dT%H:%M:%S%:z",
        weekday: false,
        zone: ZoneStyle::Numeric,
    },
    DateFormat {
        name: "plain datetime",
        pattern: "%Y-%m-%d %H:%M:%S",
        weekday: false,
        zone: ZoneStyle::Utc,
    },
    // never reached: chrono's %d already accepts a one-digit day, so the first
    // entry wins. Kept last for the same reason as above.
    DateFormat {
        name: "RFC 1123 numeric zone, single-digit day",
        pattern: "%-d %b %Y %H:%M:%S %z",
        weekday: true,
        zone: ZoneStyle::Numeric,
    },
];

/// Parse a raw `pubDate` into a UTC timestamp.
pub fn normalize(input: &str) -> Result<DateTime<Utc>, DateParseError> {
    normalize_with_format(input).map(|(parsed, _)| parsed)
}

/// Like [`normalize`], also returning the table entry that matched.
pub fn normalize_with_format(
    input: &str,
) -> Result<(DateTime<Utc>, &'static DateFormat), DateParseError> {
    let trimmed = input.trim();
    if !trimmed.is_empty() {
        for format in DATE_FORMATS {
            if let Some(parsed) = format.parse(trimmed) {
                return Ok((parsed, format));
            }
        }
    }
    Err(DateParseError {
        input: input.to_string(),
    })
}

impl DateFormat {
    fn parse(&self, input: &str) -> Option<DateTime<Utc>> {
        let input = if self.weekday {
            strip_weekday(input)?
        } else {
            input
        };

        match self.zone {
            ZoneStyle::Numeric => DateTime::parse_from_str(input, self.pattern)
                .ok()
                .map(|parsed| parsed.with_timezone(&Utc)),
            ZoneStyle::Rfc3339 => DateTime::parse_from_rfc3339(input)
                .ok()
                .map(|parsed| parsed.with_timezone(&Utc)),
            ZoneStyle::Utc => NaiveDateTime::parse_from_str(input, self.pattern)
                .ok()
                .map(|naive| naive.and_utc()),
            ZoneStyle::Named => {
                let (local, zone) = input.rsplit_once(' ')?;
                let offset = named_zone_offset(zone)?;
                let naive = NaiveDateTime::parse_from_str(local.trim_end(), self.pattern).ok()?;
                offset
                    .from_local_datetime(&naive)
                    .single()
                    .map(|parsed| parsed.with_timezone(&Utc))
            }
        }
    }
}

fn strip_weekday(input: &str) -> Option<&str> {
    let (day, rest) = input.split_once(',')?;
    day.trim().parse::<Weekday>().ok()?;
    Some(rest.trim_start())
}

/// RFC 822 zone names. Any other short alphabetic abbreviation is read as
/// offset zero, since there is no way to resolve it reliably.
fn named_zone_offset(zone: &str) -> Option<FixedOffset> {
    let hours = match zone.to_ascii_uppercase().as_str() {
        "UT" | "UTC" | "GMT" | "Z" => 0,
        "EST" => -5,
        "EDT" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        other
            if (1..=5).contains(&other.len())
                && other.chars().all(|c| c.is_ascii_alphabetic()) =>
        {
            0
        }
        _ => return None,
    };
    FixedOffset::east_opt(hours * 3600)
}
