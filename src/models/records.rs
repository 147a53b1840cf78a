// src/models/records.rs
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Timelike};
use regex::Regex;

/// Publish timestamp of a report, always carrying an offset.
pub type ReportTimestamp = DateTime<FixedOffset>;

/// Reports published before noon describe the previous day's tally.
pub fn report_date(timestamp: &ReportTimestamp) -> NaiveDate {
    let date = timestamp.date_naive();
    if timestamp.hour() < 12 {
        date - Duration::days(1)
    } else {
        date
    }
}

/// A press release discovered in the feed or in an archive listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PressReleaseRecord {
    pub timestamp: ReportTimestamp,
    pub title: String,
    pub url: String, // Natural key, unique across sources
}

impl PressReleaseRecord {
    pub fn date(&self) -> NaiveDate {
        report_date(&self.timestamp)
    }

    pub fn matches_title(&self, title_regex: &Regex) -> bool {
        title_regex.is_match(&self.title)
    }
}

/// Case statistics extracted from one source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsRecord {
    pub timestamp: ReportTimestamp,
    pub cases: i64,
    pub recovered: Option<i64>,
    pub deaths: Option<i64>,
    pub hospitalized: Option<i64>,
    pub icu: Option<i64>,
}

impl StatisticsRecord {
    pub fn date(&self) -> NaiveDate {
        report_date(&self.timestamp)
    }
}

fn display_opt(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl std::fmt::Display for StatisticsRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{}",
            self.timestamp.to_rfc3339(),
            self.cases,
            display_opt(self.recovered),
            display_opt(self.deaths),
            display_opt(self.hospitalized),
            display_opt(self.icu),
        )
    }
}
