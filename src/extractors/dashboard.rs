// src/extractors/dashboard.rs
use chrono_tz::Tz;
use regex::Regex;
use scraper::{Html, Selector};

use super::datetime::parse_datetime;
use super::field::{ExtractionContext, Field, FieldChain, FieldChains, Strategy};
use super::locator::first_match_text;
use super::number::NumberFormat;
use crate::models::{report_date, DashboardSnapshot, ReportTimestamp, StatisticsRecord};
use crate::utils::error::ExtractError;

/// Selectors of one historical version of the dashboard page.
#[derive(Debug, Clone)]
pub struct DashboardTemplate {
    pub name: String,
    pub cases: Vec<Selector>,
    pub recovered: Vec<Selector>,
    pub deaths: Vec<Selector>,
    pub hospitalized: Vec<Selector>,
    pub icu: Vec<Selector>,
}

#[derive(Debug, Clone)]
pub struct DashboardRules {
    pub fields: FieldChains,
}

fn template_chain(
    templates: &[DashboardTemplate],
    field: Field,
    pick: fn(&DashboardTemplate) -> &Vec<Selector>,
) -> FieldChain {
    let strategies = templates
        .iter()
        .map(pick)
        .filter(|selectors| !selectors.is_empty())
        .map(|selectors| Strategy::Selectors(selectors.clone()))
        .collect();
    FieldChain::new(field, strategies)
}

impl DashboardRules {
    /// Every field tries the templates in the given order, oldest first.
    pub fn from_templates(templates: &[DashboardTemplate]) -> Self {
        for template in templates {
            tracing::debug!("Using dashboard template {}", template.name);
        }
        Self {
            fields: FieldChains {
                cases: template_chain(templates, Field::Cases, |t| &t.cases),
                recovered: template_chain(templates, Field::Recovered, |t| &t.recovered),
                deaths: template_chain(templates, Field::Deaths, |t| &t.deaths),
                hospitalized: template_chain(templates, Field::Hospitalized, |t| &t.hospitalized),
                icu: template_chain(templates, Field::Icu, |t| &t.icu),
            },
        }
    }
}

/// Where the dashboard states its report date.
#[derive(Debug, Clone)]
pub struct DashboardDateRule {
    pub selector: Selector,
    pub regex: Regex,
    pub group: String,
}

/// Reads the report timestamp from the dashboard's date line, e.g.
/// "Lagebericht 10.09.2020".
pub fn parse_dashboard_timestamp(
    html: &str,
    rule: &DashboardDateRule,
    default_tz: Tz,
) -> Result<ReportTimestamp, ExtractError> {
    let document = Html::parse_document(html);
    let line = first_match_text(&document, std::slice::from_ref(&rule.selector))
        .ok_or_else(|| ExtractError::Parse("Dashboard date line not found".to_string()))?;
    let date = rule
        .regex
        .captures(&line)
        .and_then(|caps| caps.name(&rule.group))
        .ok_or_else(|| ExtractError::Parse(format!("Failed to parse date from \"{}\"", line)))?;
    parse_datetime(date.as_str(), default_tz)
}

/// Extracts statistics from one dashboard snapshot. Selector chains only:
/// the page is a controlled template, so there is no table or prose path.
pub fn parse_dashboard(
    snapshot: &DashboardSnapshot,
    rules: &DashboardRules,
    numbers: &NumberFormat,
) -> Result<StatisticsRecord, ExtractError> {
    let html = snapshot.content_utf8();
    let document = Html::parse_document(&html);
    let ctx = ExtractionContext {
        raw: &html,
        document: &document,
        table_row: None,
        url: None,
        date: report_date(&snapshot.timestamp),
        numbers,
    };
    rules.fields.extract_record(&ctx, snapshot.timestamp)
}
