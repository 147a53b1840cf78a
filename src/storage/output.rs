// src/storage/output.rs
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::merge::MergedSeries;
use crate::models::StatisticsRecord;
use crate::utils::error::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Date,
    Cases,
    Recovered,
    Deaths,
    Hospitalized,
    Icu,
}

/// `date,cases,recovered,deaths`
pub const BASE_COLUMNS: &[Column] = &[Column::Date, Column::Cases, Column::Recovered, Column::Deaths];

/// `date,cases,recovered,deaths,hospitalized,icu`
pub const HOSPITAL_COLUMNS: &[Column] = &[
    Column::Date,
    Column::Cases,
    Column::Recovered,
    Column::Deaths,
    Column::Hospitalized,
    Column::Icu,
];

fn optional(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl Column {
    pub fn header(self) -> &'static str {
        match self {
            Column::Date => "date",
            Column::Cases => "cases",
            Column::Recovered => "recovered",
            Column::Deaths => "deaths",
            Column::Hospitalized => "hospitalized",
            Column::Icu => "icu",
        }
    }

    fn render(self, stats: &StatisticsRecord) -> String {
        match self {
            Column::Date => stats.date().format("%Y-%m-%d").to_string(),
            Column::Cases => stats.cases.to_string(),
            Column::Recovered => optional(stats.recovered),
            Column::Deaths => optional(stats.deaths),
            Column::Hospitalized => optional(stats.hospitalized),
            Column::Icu => optional(stats.icu),
        }
    }
}

/// Writes a header row and one row per report date, ascending.
pub fn write_series<W: Write>(out: W, series: &MergedSeries, columns: &[Column]) -> Result<(), StorageError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out);

    writer.write_record(columns.iter().map(|c| c.header()))?;
    for (_, stats) in series.iter() {
        writer.write_record(columns.iter().map(|c| c.render(stats)))?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the series to `path`, creating parent directories as needed.
pub fn save_series<P: AsRef<Path>>(path: P, series: &MergedSeries, columns: &[Column]) -> Result<PathBuf, StorageError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = fs::File::create(path)?;
    write_series(file, series, columns)?;
    tracing::info!("Saved {} rows to {}", series.len(), path.display());
    Ok(path.to_path_buf())
}
