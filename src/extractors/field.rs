// src/extractors/field.rs
//! Per-field extraction chains.
//!
//! Every statistic is resolved by an ordered list of [`Strategy`] values. Each
//! strategy either finds something (a number, or an explicit "no data"
//! marker) or is absent, in which case the next one is tried.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use super::locator::{element_text, first_match_text};
use super::number::NumberFormat;
use crate::models::{ReportTimestamp, StatisticsRecord};
use crate::utils::error::ExtractError;

static TABLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table").expect("Failed to compile TABLE_SELECTOR"));
static ROW_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tr").expect("Failed to compile ROW_SELECTOR"));
static CELL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td").expect("Failed to compile CELL_SELECTOR"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Cases,
    Recovered,
    Deaths,
    Hospitalized,
    Icu,
}

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Field::Cases => "cases",
            Field::Recovered => "recovered",
            Field::Deaths => "deaths",
            Field::Hospitalized => "hospitalized",
            Field::Icu => "icu",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What an override map is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideKey {
    Url,
    /// ISO `YYYY-MM-DD` report date.
    Date,
}

#[derive(Debug, Clone)]
pub enum Strategy {
    /// CSS selectors tried in order against the parsed document.
    Selectors(Vec<Selector>),
    /// Column of the validated last table row.
    TableColumn(usize),
    /// Named capture group of a regex searched over the raw text.
    Pattern { regex: Regex, group: String },
    /// Manually curated values; `None` entries mean "known to be missing".
    Override {
        key: OverrideKey,
        values: HashMap<String, Option<i64>>,
    },
}

/// A terminal result of a strategy. Absence is expressed as `Option::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extracted {
    Value(i64),
    NoData,
}

impl Extracted {
    pub fn value(self) -> Option<i64> {
        match self {
            Extracted::Value(v) => Some(v),
            Extracted::NoData => None,
        }
    }
}

/// Everything a strategy may look at for one document.
pub struct ExtractionContext<'a> {
    pub raw: &'a str,
    pub document: &'a Html,
    pub table_row: Option<&'a [String]>,
    pub url: Option<&'a str>,
    pub date: NaiveDate,
    pub numbers: &'a NumberFormat,
}

impl<'a> ExtractionContext<'a> {
    fn parse_text(&self, field: Field, source: &str, text: &str) -> Option<Extracted> {
        match self.numbers.parse_or_none(text) {
            Ok(Some(v)) => Some(Extracted::Value(v)),
            Ok(None) => Some(Extracted::NoData),
            Err(e) => {
                tracing::warn!("Ignoring {} from {}: {}", field, source, e);
                None
            }
        }
    }
}

impl Strategy {
    pub fn describe(&self) -> &'static str {
        match self {
            Strategy::Selectors(_) => "selectors",
            Strategy::TableColumn(_) => "table column",
            Strategy::Pattern { .. } => "pattern",
            Strategy::Override { .. } => "override map",
        }
    }

    pub fn apply(&self, field: Field, ctx: &ExtractionContext) -> Option<Extracted> {
        match self {
            Strategy::Selectors(selectors) => {
                let text = first_match_text(ctx.document, selectors)?;
                ctx.parse_text(field, self.describe(), &text)
            }
            Strategy::TableColumn(index) => {
                let cell = ctx.table_row?.get(*index)?;
                ctx.parse_text(field, self.describe(), cell)
            }
            Strategy::Pattern { regex, group } => {
                let caps = regex.captures(ctx.raw)?;
                let text = caps.name(group)?.as_str();
                ctx.parse_text(field, self.describe(), text)
            }
            Strategy::Override { key, values } => {
                let lookup = match key {
                    OverrideKey::Url => values.get(ctx.url?),
                    OverrideKey::Date => values.get(&ctx.date.to_string()),
                }?;
                Some(match lookup {
                    Some(v) => Extracted::Value(*v),
                    None => Extracted::NoData,
                })
            }
        }
    }
}

/// The ordered strategies for one field.
#[derive(Debug, Clone)]
pub struct FieldChain {
    pub field: Field,
    pub strategies: Vec<Strategy>,
}

impl FieldChain {
    pub fn new(field: Field, strategies: Vec<Strategy>) -> Self {
        Self { field, strategies }
    }

    /// First strategy that finds something wins; `None` if all are absent.
    pub fn extract(&self, ctx: &ExtractionContext) -> Option<Extracted> {
        self.strategies.iter().find_map(|strategy| {
            let found = strategy.apply(self.field, ctx)?;
            tracing::debug!("{} resolved by {}: {:?}", self.field, strategy.describe(), found);
            Some(found)
        })
    }

    pub fn extract_optional(&self, ctx: &ExtractionContext) -> Option<i64> {
        self.extract(ctx).and_then(Extracted::value)
    }

    pub fn extract_required(&self, ctx: &ExtractionContext) -> Result<i64, ExtractError> {
        self.extract(ctx)
            .and_then(Extracted::value)
            .ok_or_else(|| ExtractError::Parse(format!("Failed to parse {} number", self.field)))
    }

    /// Regexes used by this chain, for debug annotation.
    pub fn patterns(&self) -> impl Iterator<Item = &Regex> {
        self.strategies.iter().filter_map(|strategy| match strategy {
            Strategy::Pattern { regex, .. } => Some(regex),
            _ => None,
        })
    }
}

/// One chain per statistic.
#[derive(Debug, Clone)]
pub struct FieldChains {
    pub cases: FieldChain,
    pub recovered: FieldChain,
    pub deaths: FieldChain,
    pub hospitalized: FieldChain,
    pub icu: FieldChain,
}

impl FieldChains {
    pub fn iter(&self) -> impl Iterator<Item = &FieldChain> {
        [&self.cases, &self.recovered, &self.deaths, &self.hospitalized, &self.icu].into_iter()
    }

    /// Runs every chain. Only `cases` is mandatory.
    pub fn extract_record(
        &self,
        ctx: &ExtractionContext,
        timestamp: ReportTimestamp,
    ) -> Result<StatisticsRecord, ExtractError> {
        Ok(StatisticsRecord {
            timestamp,
            cases: self.cases.extract_required(ctx)?,
            recovered: self.recovered.extract_optional(ctx),
            deaths: self.deaths.extract_optional(ctx),
            hospitalized: self.hospitalized.extract_optional(ctx),
            icu: self.icu.extract_optional(ctx),
        })
    }
}

/// Cells of the last row of the first table, or `None` if the document has
/// no table. The first cell must match `first_cell` at its start, otherwise
/// the table is not the one we expect and the whole document is rejected.
pub fn last_table_row(document: &Html, first_cell: &Regex) -> Result<Option<Vec<String>>, ExtractError> {
    let Some(table) = document.select(&TABLE_SELECTOR).next() else {
        return Ok(None);
    };
    let last_row = table
        .select(&ROW_SELECTOR)
        .last()
        .ok_or_else(|| ExtractError::TableShape("table has no rows".to_string()))?;
    let cells: Vec<String> = last_row.select(&CELL_SELECTOR).map(element_text).collect();

    let first = cells
        .first()
        .ok_or_else(|| ExtractError::TableShape("last table row has no cells".to_string()))?;
    let anchored = first_cell.find(first).is_some_and(|m| m.start() == 0);
    if !anchored {
        return Err(ExtractError::TableShape(format!(
            "Expected the first cell content \"{}\" to match \"{}\"",
            first, first_cell
        )));
    }
    Ok(Some(cells))
}
