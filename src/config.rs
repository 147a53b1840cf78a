// src/config.rs
//! JSON configuration, compiled once into typed settings before any fetch.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use chrono_tz::Tz;
use regex::Regex;
use scraper::Selector;
use serde::Deserialize;
use url::Url;

use crate::extractors::{
    ArchiveLayout, DashboardDateRule, DashboardRules, DashboardTemplate, DistrictTableRules, Field,
    FieldChain, FieldChains, NumberFormat, OverrideKey, PressReleaseRules, Strategy,
};
use crate::utils::error::ConfigError;

// --- Raw (file) representation ---

#[derive(Debug, Deserialize)]
pub struct RawConfig {
    pub http: HttpConfig,
    pub default_tz: String,
    pub download_feed: FeedConfig,
    #[serde(default)]
    pub download_archives: ArchivesConfig,
    pub download_dashboard: DashboardDownloadConfig,
    #[serde(default)]
    pub download_district_table: Option<DistrictDownloadConfig>,
    pub numbers: NumbersConfig,
    pub parse_press_release: PressReleaseConfig,
    pub parse_dashboard: DashboardParseConfig,
    pub parse_district_table: DistrictParseConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    /// Seconds
    pub timeout: u64,
    pub user_agent: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedConfig {
    pub url: String,
    pub title_regex: String,
}

fn default_container_selector() -> String {
    ".modul-autoteaser".to_string()
}
fn default_row_selector() -> String {
    ".row-fluid".to_string()
}
fn default_link_selector() -> String {
    ".text a".to_string()
}
fn default_date_selector() -> String {
    ".date".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ArchivesConfig {
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default = "default_container_selector")]
    pub container_selector: String,
    #[serde(default = "default_row_selector")]
    pub row_selector: String,
    #[serde(default = "default_link_selector")]
    pub link_selector: String,
    #[serde(default = "default_date_selector")]
    pub date_selector: String,
}

impl Default for ArchivesConfig {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            container_selector: default_container_selector(),
            row_selector: default_row_selector(),
            link_selector: default_link_selector(),
            date_selector: default_date_selector(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DashboardDownloadConfig {
    /// Older configs name a single URL.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    pub date_selector: String,
    pub date_regex: String,
    pub date_regex_group: String,
}

#[derive(Debug, Deserialize)]
pub struct DistrictDownloadConfig {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct NumbersConfig {
    pub thousands_separator: String,
    pub none_regex: String,
    #[serde(default)]
    pub numbers_map: HashMap<String, i64>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideKeyConfig {
    Url,
    Date,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum StrategyConfig {
    Selectors { selectors: Vec<String> },
    TableColumn { index: usize },
    Pattern { regex: String, group: String },
    Override {
        key: OverrideKeyConfig,
        values: HashMap<String, Option<i64>>,
    },
}

#[derive(Debug, Deserialize)]
pub struct FieldsConfig {
    pub cases: Vec<StrategyConfig>,
    #[serde(default)]
    pub recovered: Vec<StrategyConfig>,
    #[serde(default)]
    pub deaths: Vec<StrategyConfig>,
    #[serde(default)]
    pub hospitalized: Vec<StrategyConfig>,
    #[serde(default)]
    pub icu: Vec<StrategyConfig>,
}

#[derive(Debug, Deserialize)]
pub struct PressReleaseConfig {
    pub first_cell_regex: String,
    pub fields: FieldsConfig,
}

#[derive(Debug, Deserialize)]
pub struct TemplateConfig {
    pub name: String,
    #[serde(default)]
    pub cases: Vec<String>,
    #[serde(default)]
    pub recovered: Vec<String>,
    #[serde(default)]
    pub deaths: Vec<String>,
    #[serde(default)]
    pub hospitalized: Vec<String>,
    #[serde(default)]
    pub icu: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DashboardParseConfig {
    pub templates: Vec<TemplateConfig>,
}

#[derive(Debug, Deserialize)]
pub struct DistrictParseConfig {
    pub column_district: String,
    pub column_cases: String,
    pub column_recovered: String,
    pub row_sum: String,
    pub delimiter: String,
    #[serde(default)]
    pub deaths_map: BTreeMap<String, i64>,
}

// --- Compiled settings ---

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub http: HttpSettings,
    pub default_tz: Tz,
    pub feed_url: String,
    pub title_filter: Regex,
    pub archive_urls: Vec<Url>,
    pub archive_layout: ArchiveLayout,
    pub dashboard_urls: Vec<String>,
    pub dashboard_date: DashboardDateRule,
    pub district_table_url: Option<String>,
    pub numbers: NumberFormat,
    pub press_release: PressReleaseRules,
    pub dashboard: DashboardRules,
    pub district_table: DistrictTableRules,
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        message: message.into(),
    }
}

fn compile_regex(field: &str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::Regex {
        field: field.to_string(),
        source,
    })
}

fn compile_group_regex(field: &str, pattern: &str, group: &str) -> Result<Regex, ConfigError> {
    let regex = compile_regex(field, pattern)?;
    if !regex.capture_names().any(|name| name == Some(group)) {
        return Err(invalid(field, format!("regex has no capture group named \"{}\"", group)));
    }
    Ok(regex)
}

fn compile_selector(field: &str, selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::Selector {
        field: field.to_string(),
        message: format!("\"{}\": {:?}", selector, e),
    })
}

fn compile_selectors(field: &str, selectors: &[String]) -> Result<Vec<Selector>, ConfigError> {
    selectors.iter().map(|s| compile_selector(field, s)).collect()
}

fn compile_strategy(field: &str, raw: &StrategyConfig) -> Result<Strategy, ConfigError> {
    Ok(match raw {
        StrategyConfig::Selectors { selectors } => {
            if selectors.is_empty() {
                return Err(invalid(field, "selectors strategy without selectors"));
            }
            Strategy::Selectors(compile_selectors(field, selectors)?)
        }
        StrategyConfig::TableColumn { index } => Strategy::TableColumn(*index),
        StrategyConfig::Pattern { regex, group } => Strategy::Pattern {
            regex: compile_group_regex(field, regex, group)?,
            group: group.clone(),
        },
        StrategyConfig::Override { key, values } => {
            let key = match key {
                OverrideKeyConfig::Url => OverrideKey::Url,
                OverrideKeyConfig::Date => {
                    if let Some(bad) = values.keys().find(|k| k.parse::<NaiveDate>().is_err()) {
                        return Err(invalid(field, format!("override key \"{}\" is not a YYYY-MM-DD date", bad)));
                    }
                    OverrideKey::Date
                }
            };
            Strategy::Override { key, values: values.clone() }
        }
    })
}

fn compile_chain(field: Field, raw: &[StrategyConfig]) -> Result<FieldChain, ConfigError> {
    let name = format!("parse_press_release.fields.{}", field);
    let strategies = raw
        .iter()
        .map(|strategy| compile_strategy(&name, strategy))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(FieldChain::new(field, strategies))
}

fn compile_press_release(raw: &PressReleaseConfig) -> Result<PressReleaseRules, ConfigError> {
    if raw.fields.cases.is_empty() {
        return Err(invalid("parse_press_release.fields.cases", "at least one strategy is required"));
    }
    Ok(PressReleaseRules {
        first_cell: compile_regex("parse_press_release.first_cell_regex", &raw.first_cell_regex)?,
        fields: FieldChains {
            cases: compile_chain(Field::Cases, &raw.fields.cases)?,
            recovered: compile_chain(Field::Recovered, &raw.fields.recovered)?,
            deaths: compile_chain(Field::Deaths, &raw.fields.deaths)?,
            hospitalized: compile_chain(Field::Hospitalized, &raw.fields.hospitalized)?,
            icu: compile_chain(Field::Icu, &raw.fields.icu)?,
        },
    })
}

fn compile_dashboard(raw: &DashboardParseConfig) -> Result<DashboardRules, ConfigError> {
    let field = "parse_dashboard.templates";
    let templates = raw
        .templates
        .iter()
        .map(|t| {
            Ok(DashboardTemplate {
                name: t.name.clone(),
                cases: compile_selectors(field, &t.cases)?,
                recovered: compile_selectors(field, &t.recovered)?,
                deaths: compile_selectors(field, &t.deaths)?,
                hospitalized: compile_selectors(field, &t.hospitalized)?,
                icu: compile_selectors(field, &t.icu)?,
            })
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    if templates.iter().all(|t| t.cases.is_empty()) {
        return Err(invalid(field, "no template has a cases selector"));
    }
    Ok(DashboardRules::from_templates(&templates))
}

fn compile_district_table(raw: &DistrictParseConfig) -> Result<DistrictTableRules, ConfigError> {
    let delimiter = match raw.delimiter.as_bytes() {
        [byte] => *byte,
        _ => return Err(invalid("parse_district_table.delimiter", "must be a single ASCII character")),
    };
    let deaths = raw
        .deaths_map
        .iter()
        .map(|(date, deaths)| {
            date.parse::<NaiveDate>()
                .map(|date| (date, *deaths))
                .map_err(|_| invalid("parse_district_table.deaths_map", format!("\"{}\" is not a YYYY-MM-DD date", date)))
        })
        .collect::<Result<HashMap<_, _>, _>>()?;

    Ok(DistrictTableRules {
        column_district: raw.column_district.clone(),
        column_cases: raw.column_cases.clone(),
        column_recovered: raw.column_recovered.clone(),
        row_sum: raw.row_sum.clone(),
        delimiter,
        deaths,
    })
}

impl Settings {
    /// Reads and compiles the configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(text)?;
        Self::compile(&raw)
    }

    pub fn compile(raw: &RawConfig) -> Result<Self, ConfigError> {
        if raw.http.timeout == 0 {
            return Err(invalid("http.timeout", "must be positive"));
        }
        let default_tz = raw
            .default_tz
            .parse::<Tz>()
            .map_err(|e| invalid("default_tz", format!("{}", e)))?;

        let archive_urls = raw
            .download_archives
            .urls
            .iter()
            .map(|u| Url::parse(u).map_err(|e| invalid("download_archives.urls", format!("\"{}\": {}", u, e))))
            .collect::<Result<Vec<_>, _>>()?;
        let archives = &raw.download_archives;
        let archive_layout = ArchiveLayout {
            container: compile_selector("download_archives.container_selector", &archives.container_selector)?,
            row: compile_selector("download_archives.row_selector", &archives.row_selector)?,
            link: compile_selector("download_archives.link_selector", &archives.link_selector)?,
            date: compile_selector("download_archives.date_selector", &archives.date_selector)?,
        };

        let dashboard = &raw.download_dashboard;
        let dashboard_urls: Vec<String> = dashboard.url.iter().chain(dashboard.urls.iter()).cloned().collect();
        let dashboard_date = DashboardDateRule {
            selector: compile_selector("download_dashboard.date_selector", &dashboard.date_selector)?,
            regex: compile_group_regex("download_dashboard.date_regex", &dashboard.date_regex, &dashboard.date_regex_group)?,
            group: dashboard.date_regex_group.clone(),
        };

        let numbers = NumberFormat {
            thousands_separator: raw.numbers.thousands_separator.clone(),
            numerals: raw
                .numbers
                .numbers_map
                .iter()
                .map(|(k, v)| (k.to_lowercase(), *v))
                .collect(),
            none_pattern: compile_regex("numbers.none_regex", &raw.numbers.none_regex)?,
        };

        Ok(Self {
            http: HttpSettings {
                timeout: Duration::from_secs(raw.http.timeout),
                user_agent: raw.http.user_agent.clone(),
            },
            default_tz,
            feed_url: raw.download_feed.url.clone(),
            title_filter: compile_regex("download_feed.title_regex", &raw.download_feed.title_regex)?,
            archive_urls,
            archive_layout,
            dashboard_urls,
            dashboard_date,
            district_table_url: raw.download_district_table.as_ref().map(|d| d.url.clone()),
            numbers,
            press_release: compile_press_release(&raw.parse_press_release)?,
            dashboard: compile_dashboard(&raw.parse_dashboard)?,
            district_table: compile_district_table(&raw.parse_district_table)?,
        })
    }
}
