// src/extractors/datetime.rs
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::ReportTimestamp;
use crate::utils::error::ExtractError;

// "10. September 2020", "1. Okt. 2020, 14:00 Uhr"
static GERMAN_LONG_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d{1,2})\.\s*([a-zäöü]+)\.?\s+(\d{4})(.*)$")
        .expect("Failed to compile GERMAN_LONG_DATE_RE")
});

static UHR_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*uhr\s*$").expect("Failed to compile UHR_SUFFIX_RE"));

const DATETIME_FORMATS: &[&str] = &[
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%d.%m.%Y", "%Y-%m-%d"];

fn german_month(name: &str) -> Option<u32> {
    let month = match name.to_lowercase().as_str() {
        "januar" | "jan" | "jänner" => 1,
        "februar" | "feb" => 2,
        "märz" | "maerz" | "mär" | "mrz" => 3,
        "april" | "apr" => 4,
        "mai" => 5,
        "juni" | "jun" => 6,
        "juli" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sept" | "sep" => 9,
        "oktober" | "okt" => 10,
        "november" | "nov" => 11,
        "dezember" | "dez" => 12,
        _ => return None,
    };
    Some(month)
}

/// Rewrites German long dates into numeric form and drops filler such as
/// commas and a trailing "Uhr".
fn normalize(text: &str) -> String {
    let mut s = text.trim().to_string();
    if let Some(caps) = GERMAN_LONG_DATE_RE.captures(&s) {
        if let Some(month) = german_month(&caps[2]) {
            s = format!("{}.{}.{}{}", &caps[1], month, &caps[3], &caps[4]);
        }
    }
    let s = s.replace(',', " ");
    let s = UHR_SUFFIX_RE.replace(&s, "");
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn localize(naive: NaiveDateTime, default_tz: Tz, original: &str) -> Result<ReportTimestamp, ExtractError> {
    default_tz
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
        .ok_or_else(|| ExtractError::Parse(format!("Nonexistent local time \"{}\"", original)))
}

/// Parses a feed, archive or dashboard date string. Text without an offset
/// is interpreted in `default_tz`.
pub fn parse_datetime(text: &str, default_tz: Tz) -> Result<ReportTimestamp, ExtractError> {
    let trimmed = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Ok(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt);
    }

    let normalized = normalize(trimmed);
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, format) {
            return localize(naive, default_tz, text);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&normalized, format) {
            return localize(date.and_time(NaiveTime::MIN), default_tz, text);
        }
    }

    Err(ExtractError::Parse(format!("Failed to parse datetime \"{}\"", text)))
}
