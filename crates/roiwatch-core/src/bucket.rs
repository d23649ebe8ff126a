//! Time-of-day buckets used to partition restricted-area violations.
//!
//! The partition is fixed: `morning` covers hours 6..12, `afternoon` covers
//! 12..18 and everything else (18..24 and 0..6) is `night`. Each boundary hour
//! belongs to the bucket it opens.

use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, TimeZone, Timelike, Utc,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBucket {
    Morning,
    Afternoon,
    Night,
}

impl TimeBucket {
    /// Buckets in snapshot order. Chart legends index into this order.
    pub const ALL: [TimeBucket; 3] = [TimeBucket::Morning, TimeBucket::Afternoon, TimeBucket::Night];

    pub fn for_hour(hour: u32) -> Self {
        match hour {
            6..=11 => TimeBucket::Morning,
            12..=17 => TimeBucket::Afternoon,
            _ => TimeBucket::Night,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeBucket::Morning => "morning",
            TimeBucket::Afternoon => "afternoon",
            TimeBucket::Night => "night",
        }
    }

    /// Human-facing legend label for the violation pie chart.
    pub fn legend(self) -> &'static str {
        match self {
            TimeBucket::Morning => "Morning (6 AM - 12 PM)",
            TimeBucket::Afternoon => "Afternoon (12 PM - 6 PM)",
            TimeBucket::Night => "Night (6 PM - 12 AM)",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            TimeBucket::Morning => 0,
            TimeBucket::Afternoon => 1,
            TimeBucket::Night => 2,
        }
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeBucket {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "morning" => Ok(TimeBucket::Morning),
            "afternoon" => Ok(TimeBucket::Afternoon),
            "night" => Ok(TimeBucket::Night),
            _ => Err(Error::InvalidBucketName {
                name: s.to_string(),
            }),
        }
    }
}

/// Zone whose wall clock defines "hour of day".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockZone {
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl ClockZone {
    pub fn utc() -> Self {
        ClockZone::Fixed(Utc.fix())
    }

    /// Parses `local`, `Z`/`UTC`, or a signed `+HH:MM` / `-HHMM` offset.
    pub fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim();
        if s.eq_ignore_ascii_case("local") {
            return Some(ClockZone::Local);
        }
        if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
            return Some(ClockZone::utc());
        }
        let (sign, rest) = match s.as_bytes().first()? {
            b'+' => (1, &s[1..]),
            b'-' => (-1, &s[1..]),
            _ => return None,
        };
        let digits: String = rest.chars().filter(|c| *c != ':').collect();
        if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let hours: i32 = digits[..2].parse().ok()?;
        let minutes: i32 = digits[2..].parse().ok()?;
        if minutes >= 60 {
            return None;
        }
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).map(ClockZone::Fixed)
    }

    fn hour_of<Tz: TimeZone>(self, instant: &DateTime<Tz>) -> u32 {
        match self {
            ClockZone::Local => instant.with_timezone(&Local).hour(),
            ClockZone::Fixed(offset) => instant.with_timezone(&offset).hour(),
        }
    }
}

/// Resolves the hour of day of `raw` on the wall clock of `zone`.
///
/// Timestamps carrying an offset are converted into `zone`; naive timestamps
/// are already wall-clock time and keep their hour. A bare date is midnight UTC.
pub fn hour_of_day(raw: &str, zone: ClockZone) -> Result<u32> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(zone.hour_of(&dt));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.hour());
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(zone.hour_of(&Utc.from_utc_datetime(&midnight)));
    }
    Err(Error::InvalidTimestamp { raw: raw.to_string() })
}

/// Classifies a timestamp into its time-of-day bucket.
pub fn classify(raw: &str, zone: ClockZone) -> Result<TimeBucket> {
    hour_of_day(raw, zone).map(TimeBucket::for_hour)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(raw: &str) -> TimeBucket {
        classify(raw, ClockZone::utc()).expect("classify")
    }

    #[test]
    fn boundary_hours_open_their_bucket() {
        assert_eq!(utc("2024-05-01T06:00:00"), TimeBucket::Morning);
        assert_eq!(utc("2024-05-01T12:00:00"), TimeBucket::Afternoon);
        assert_eq!(utc("2024-05-01T18:00:00"), TimeBucket::Night);
        assert_eq!(utc("2024-05-01T00:00:00"), TimeBucket::Night);
    }

    #[test]
    fn hours_just_below_boundaries() {
        assert_eq!(utc("2024-05-01 05:59:59"), TimeBucket::Night);
        assert_eq!(utc("2024-05-01 11:59:59"), TimeBucket::Morning);
        assert_eq!(utc("2024-05-01 17:59:59.999"), TimeBucket::Afternoon);
        assert_eq!(utc("2024-05-01 23:59:59"), TimeBucket::Night);
    }

    #[test]
    fn every_hour_maps_to_exactly_one_bucket() {
        let counts = (0..24).fold([0usize; 3], |mut acc, h| {
            acc[TimeBucket::for_hour(h).index()] += 1;
            acc
        });
        assert_eq!(counts, [6, 6, 12]);
    }

    #[test]
    fn offsets_convert_into_the_clock_zone() {
        let plus_two = ClockZone::parse("+02:00").unwrap();
        // 05:30Z is 07:30 at +02:00
        assert_eq!(
            classify("2024-05-01T05:30:00Z", plus_two).unwrap(),
            TimeBucket::Morning
        );
        assert_eq!(utc("2024-05-01T05:30:00Z"), TimeBucket::Night);
        assert_eq!(utc("2024-05-01T13:00:00+01:00"), TimeBucket::Afternoon);
    }

    #[test]
    fn naive_timestamps_keep_their_wall_clock_hour() {
        let minus_five = ClockZone::parse("-0500").unwrap();
        assert_eq!(
            classify("2024-05-01 07:00:00", minus_five).unwrap(),
            TimeBucket::Morning
        );
    }

    #[test]
    fn bare_date_is_midnight_utc() {
        assert_eq!(hour_of_day("2024-05-01", ClockZone::utc()).unwrap(), 0);
        let plus_nine = ClockZone::parse("+09:00").unwrap();
        assert_eq!(hour_of_day("2024-05-01", plus_nine).unwrap(), 9);
    }

    #[test]
    fn garbage_is_rejected() {
        for raw in ["", "yesterday", "2024-13-01T00:00:00", "2024-05-01T25:00:00"] {
            match classify(raw, ClockZone::utc()) {
                Err(Error::InvalidTimestamp { raw: got }) => assert_eq!(got, raw),
                other => panic!("expected InvalidTimestamp for {raw:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn bucket_names_round_trip_through_from_str() {
        for bucket in TimeBucket::ALL {
            assert_eq!(bucket.as_str().parse::<TimeBucket>().unwrap(), bucket);
        }
        assert!(matches!(
            "late_night".parse::<TimeBucket>(),
            Err(Error::InvalidBucketName { .. })
        ));
    }

    #[test]
    fn clock_zone_parse_rejects_malformed_offsets() {
        assert_eq!(ClockZone::parse("local"), Some(ClockZone::Local));
        assert_eq!(ClockZone::parse("UTC"), Some(ClockZone::utc()));
        assert_eq!(ClockZone::parse("02:00"), None);
        assert_eq!(ClockZone::parse("+2:00"), None);
        assert_eq!(ClockZone::parse("+02:75"), None);
    }
}
