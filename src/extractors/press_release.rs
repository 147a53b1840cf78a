// src/extractors/press_release.rs
use regex::Regex;
use scraper::Html;

use super::field::{last_table_row, ExtractionContext, FieldChains};
use super::number::NumberFormat;
use crate::models::{PressReleaseRecord, StatisticsRecord};
use crate::utils::error::ExtractError;

/// Extraction rules for archived press release pages.
#[derive(Debug, Clone)]
pub struct PressReleaseRules {
    /// Start of the first cell of the last table row ("Summe", "Gesamt"...).
    pub first_cell: Regex,
    pub fields: FieldChains,
}

/// Extracts statistics from one press release page, anchored to the press
/// release's own timestamp.
pub fn parse_press_release(
    press_release: &PressReleaseRecord,
    html: &str,
    rules: &PressReleaseRules,
    numbers: &NumberFormat,
) -> Result<StatisticsRecord, ExtractError> {
    let document = Html::parse_document(html);
    let table_row = last_table_row(&document, &rules.first_cell)?;

    let ctx = ExtractionContext {
        raw: html,
        document: &document,
        table_row: table_row.as_deref(),
        url: Some(&press_release.url),
        date: press_release.date(),
        numbers,
    };
    rules.fields.extract_record(&ctx, press_release.timestamp)
}
