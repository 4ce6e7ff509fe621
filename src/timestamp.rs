//! Best-effort normalization of the publication dates found in feeds.
//!
//! Feeds in the wild use a handful of RFC 1123 and RFC 3339 variants. The
//! layouts are tried in a fixed order and the first one that parses wins.

use chrono::{DateTime, FixedOffset, NaiveDateTime, ParseError, TimeZone, Utc};

#[derive(thiserror::Error, Debug)]
#[error("could not parse timestamp `{input}`")]
pub struct TimestampError {
    pub input: String,
    /// Error of the first layout attempted.
    #[source]
    pub source: ParseError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::IntoStaticStr)]
pub enum Layout {
    /// `Mon, 02 Jan 2006 15:04:05 -0700`
    Rfc1123Offset,
    /// `Mon, 02 Jan 2006 15:04:05 MST`
    Rfc1123ZoneName,
    /// `2006-01-02T15:04:05-07:00`
    Rfc3339Offset,
    /// `2006-01-02T15:04:05Z`
    Rfc3339Utc,
    /// `2006-01-02 15:04:05 -0700`
    SpaceSeparated,
    /// `02 Jan 2006 15:04:05 -0700`
    DayFirst,
}

const RFC1123_OFFSET: &str = "%a, %d %b %Y %H:%M:%S%.f %z";
const RFC1123_ZONE_NAME: &str = "%a, %d %b %Y %H:%M:%S%.f %Z";
const DAY_FIRST: &str = "%d %b %Y %H:%M:%S%.f %z";

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

impl Layout {
    /// Fractional seconds are optional in every layout.
    pub fn parse(self, input: &str) -> Result<DateTime<FixedOffset>, ParseError> {
        match self {
            Layout::Rfc1123Offset => parse_rfc1123(input),
            Layout::Rfc1123ZoneName => parse_zone_name(input),
            Layout::Rfc3339Offset => DateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f%:z"),
            Layout::Rfc3339Utc => NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.fZ")
                .map(|naive| Utc.from_utc_datetime(&naive).into()),
            Layout::SpaceSeparated => DateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S%.f %z"),
            Layout::DayFirst => DateTime::parse_from_str(input, DAY_FIRST),
        }
    }
}

/// The weekday must be spelled correctly but need not agree with the date.
fn parse_rfc1123(input: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    match input.split_once(", ") {
        Some((day, rest)) if WEEKDAYS.iter().any(|name| name.eq_ignore_ascii_case(day)) => {
            DateTime::parse_from_str(rest, DAY_FIRST)
        }
        _ => DateTime::parse_from_str(input, RFC1123_OFFSET),
    }
}

/// Order in which layouts are attempted.
pub const LAYOUTS: [Layout; 6] = [
    Layout::Rfc1123Offset,
    Layout::Rfc1123ZoneName,
    Layout::Rfc3339Offset,
    Layout::Rfc3339Utc,
    Layout::SpaceSeparated,
    Layout::DayFirst,
];

/// Parses `raw` with the first matching layout of [`LAYOUTS`].
pub fn parse(raw: &str) -> Result<DateTime<FixedOffset>, TimestampError> {
    let input = raw.trim();
    let [first, rest @ ..] = LAYOUTS;

    let source = match first.parse(input) {
        Ok(moment) => return Ok(moment),
        Err(err) => err,
    };

    for layout in rest {
        if let Ok(moment) = layout.parse(input) {
            tracing::trace!(layout = <&'static str>::from(layout), "parsed timestamp {input}");
            return Ok(moment);
        }
    }

    Err(TimestampError {
        input: raw.to_owned(),
        source,
    })
}

/// Rewrites a trailing zone abbreviation as a numeric offset. Alphabetic
/// zones outside the table are read as UTC.
fn parse_zone_name(input: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    match input.rsplit_once(' ') {
        Some((stamp, zone)) if !zone.is_empty() && zone.chars().all(|c| c.is_ascii_alphabetic()) => {
            let offset = zone_offset(zone).unwrap_or("+0000");
            parse_rfc1123(&format!("{stamp} {offset}"))
        }
        // %Z carries no offset, so this reports why the input is not a named zone
        _ => DateTime::parse_from_str(input, RFC1123_ZONE_NAME),
    }
}

fn zone_offset(zone: &str) -> Option<&'static str> {
    Some(match zone.to_ascii_uppercase().as_str() {
        "GMT" | "UT" | "UTC" | "Z" => "+0000",
        "EST" => "-0500",
        "EDT" => "-0400",
        "CST" => "-0600",
        "CDT" => "-0500",
        "MST" => "-0700",
        "MDT" => "-0600",
        "PST" => "-0800",
        "PDT" => "-0700",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(input: &str) -> DateTime<Utc> {
        parse(input).unwrap().with_timezone(&Utc)
    }

    fn expected(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_rfc1123_with_numeric_offset() {
        let moment = parse("Mon, 02 Jan 2006 15:04:05 -0700").unwrap();
        assert_eq!(moment.offset().local_minus_utc(), -7 * 3600);
        assert_eq!(moment.with_timezone(&Utc), expected("2006-01-02T22:04:05Z"));
    }

    #[test]
    fn test_rfc1123_with_zone_name() {
        assert_eq!(
            utc("Mon, 02 Jan 2006 15:04:05 GMT"),
            expected("2006-01-02T15:04:05Z")
        );
        assert_eq!(
            utc("Mon, 02 Jan 2006 15:04:05 PST"),
            expected("2006-01-02T23:04:05Z")
        );
        // unknown abbreviations fall back to UTC
        assert_eq!(
            utc("Mon, 02 Jan 2006 15:04:05 CEST"),
            expected("2006-01-02T15:04:05Z")
        );
    }

    #[test]
    fn test_rfc3339_variants() {
        assert_eq!(
            utc("2006-01-02T15:04:05-07:00"),
            expected("2006-01-02T22:04:05Z")
        );
        assert_eq!(utc("2006-01-02T15:04:05Z"), expected("2006-01-02T15:04:05Z"));
        assert_eq!(
            utc("2006-01-02T15:04:05.250Z"),
            expected("2006-01-02T15:04:05.250Z")
        );
    }

    #[test]
    fn test_space_separated_and_day_first() {
        assert_eq!(
            utc("2006-01-02 15:04:05 +0100"),
            expected("2006-01-02T14:04:05Z")
        );
        assert_eq!(
            utc("02 Jan 2006 15:04:05 -0700"),
            expected("2006-01-02T22:04:05Z")
        );
    }

    #[test]
    fn test_weekday_is_not_checked_against_date() {
        // 2006-01-02 is a Monday
        assert_eq!(
            utc("Tue, 02 Jan 2006 15:04:05 -0700"),
            expected("2006-01-02T22:04:05Z")
        );
        assert_eq!(
            utc("tue, 02 Jan 2006 15:04:05 GMT"),
            expected("2006-01-02T15:04:05Z")
        );
        assert!(parse("Xyz, 02 Jan 2006 15:04:05 -0700").is_err());
        assert!(parse("Tuesday, 02 Jan 2006 15:04:05 -0700").is_err());
    }

    #[test]
    fn test_fractional_seconds_are_accepted() {
        assert_eq!(
            utc("Mon, 02 Jan 2006 15:04:05.123 -0700"),
            expected("2006-01-02T22:04:05.123Z")
        );
        assert_eq!(
            utc("Mon, 02 Jan 2006 15:04:05.5 EST"),
            expected("2006-01-02T20:04:05.5Z")
        );
        assert_eq!(
            utc("2006-01-02 15:04:05.250 +0100"),
            expected("2006-01-02T14:04:05.250Z")
        );
        assert_eq!(
            utc("02 Jan 2006 15:04:05.75 -0700"),
            expected("2006-01-02T22:04:05.75Z")
        );
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        assert_eq!(
            utc("  Mon, 02 Jan 2006 15:04:05 +0000\n"),
            expected("2006-01-02T15:04:05Z")
        );
    }

    #[test]
    fn test_unparseable_reports_first_layout_error() {
        let err = parse("yesterday at noon").unwrap_err();
        assert_eq!(err.input, "yesterday at noon");

        let first = Layout::Rfc1123Offset.parse("yesterday at noon").unwrap_err();
        assert_eq!(err.source, first);
    }

    #[test]
    fn test_empty_input_fails() {
        assert!(parse("").is_err());
    }
}
