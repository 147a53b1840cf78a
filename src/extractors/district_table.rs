// src/extractors/district_table.rs
use std::collections::HashMap;

use chrono::NaiveDate;

use super::number::NumberFormat;
use crate::models::{DistrictTable, StatisticsRecord};
use crate::utils::error::ExtractError;

#[derive(Debug, Clone)]
pub struct DistrictTableRules {
    pub column_district: String,
    pub column_cases: String,
    pub column_recovered: String,
    /// Value of the district column on the citywide sum row.
    pub row_sum: String,
    pub delimiter: u8,
    /// The table never reports citywide deaths; keyed by the table's calendar date.
    pub deaths: HashMap<NaiveDate, i64>,
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize, ExtractError> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| ExtractError::Parse(format!("Column \"{}\" not found in district table", name)))
}

fn csv_error(e: csv::Error) -> ExtractError {
    ExtractError::Parse(format!("Invalid district table: {}", e))
}

/// Reads cases and recovered from the sum row of a district CSV export.
pub fn parse_district_table(
    table: &DistrictTable,
    rules: &DistrictTableRules,
    numbers: &NumberFormat,
) -> Result<StatisticsRecord, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(rules.delimiter)
        .flexible(true)
        .from_reader(table.content.as_bytes());

    let headers = reader.headers().map_err(csv_error)?.clone();
    let district_idx = column_index(&headers, &rules.column_district)?;
    let cases_idx = column_index(&headers, &rules.column_cases)?;
    let recovered_idx = column_index(&headers, &rules.column_recovered)?;

    for row in reader.records() {
        let row = row.map_err(csv_error)?;
        if row.get(district_idx) != Some(rules.row_sum.as_str()) {
            continue;
        }
        let cell = |idx: usize, column: &str| {
            row.get(idx)
                .ok_or_else(|| ExtractError::Parse(format!("Sum row has no \"{}\" cell", column)))
        };
        let cases = numbers.parse(cell(cases_idx, &rules.column_cases)?)?;
        let recovered = numbers.parse(cell(recovered_idx, &rules.column_recovered)?)?;
        return Ok(StatisticsRecord {
            timestamp: table.timestamp,
            cases,
            recovered: Some(recovered),
            deaths: rules.deaths.get(&table.timestamp.date_naive()).copied(),
            hospitalized: None,
            icu: None,
        });
    }

    Err(ExtractError::Parse("Sum row not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use regex::Regex;

    fn rules() -> DistrictTableRules {
        let mut deaths = HashMap::new();
        deaths.insert(NaiveDate::from_ymd_opt(2020, 10, 5).unwrap(), 229);
        DistrictTableRules {
            column_district: "district".to_string(),
            column_cases: "cases".to_string(),
            column_recovered: "recovered".to_string(),
            row_sum: "Summe".to_string(),
            delimiter: b';',
            deaths,
        }
    }

    fn numbers() -> NumberFormat {
        NumberFormat {
            thousands_separator: ".".to_string(),
            numerals: HashMap::new(),
            none_pattern: Regex::new(r"^-$").unwrap(),
        }
    }

    fn table(content: &str, ts: &str) -> DistrictTable {
        DistrictTable {
            timestamp: DateTime::parse_from_rfc3339(ts).unwrap(),
            content: content.to_string(),
        }
    }

    const CSV: &str = "district;cases;recovered\nMitte;120;90\nPankow;80;60\nSumme;500;300\n";

    #[test]
    fn test_sum_row_with_deaths_override() {
        let stats = parse_district_table(&table(CSV, "2020-10-05T16:00:00+02:00"), &rules(), &numbers()).unwrap();
        assert_eq!(stats.cases, 500);
        assert_eq!(stats.recovered, Some(300));
        assert_eq!(stats.deaths, Some(229));
        assert_eq!(stats.hospitalized, None);
        assert_eq!(stats.icu, None);
    }

    #[test]
    fn test_deaths_missing_from_override() {
        let stats = parse_district_table(&table(CSV, "2020-10-06T16:00:00+02:00"), &rules(), &numbers()).unwrap();
        assert_eq!(stats.deaths, None);
    }

    #[test]
    fn test_sum_row_not_found() {
        let csv = "district;cases;recovered\nMitte;120;90\n";
        let err = parse_district_table(&table(csv, "2020-10-05T16:00:00+02:00"), &rules(), &numbers()).unwrap_err();
        assert!(matches!(err, ExtractError::Parse(ref m) if m == "Sum row not found"));
    }

    #[test]
    fn test_missing_column() {
        let csv = "Bezirk;Fälle\nSumme;500\n";
        let err = parse_district_table(&table(csv, "2020-10-05T16:00:00+02:00"), &rules(), &numbers()).unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }
}
