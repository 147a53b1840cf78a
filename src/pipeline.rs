// src/pipeline.rs
//! Batch commands. Everything runs sequentially; a document that fails to
//! download or parse is logged and skipped.

use std::path::Path;

use regex::Regex;

use crate::config::Settings;
use crate::extractors::{
    parse_archive, parse_dashboard, parse_dashboard_timestamp, parse_district_table, parse_feed, parse_press_release,
};
use crate::merge::MergedSeries;
use crate::models::{DashboardSnapshot, DistrictTable, PressReleaseRecord, StatisticsRecord};
use crate::storage::{Persist, Store, Upsert};
use crate::utils::error::{AppError, ConfigError, FetchError, StorageError};
use crate::utils::html_debug::save_debug_html;
use crate::web::Fetcher;

fn save<T: Persist>(store: &Store, record: &T, kind: &str, label: &str) -> Result<Upsert, StorageError> {
    let outcome = store.upsert(record)?;
    match outcome {
        Upsert::Inserted => tracing::info!("Adding new {} {}", kind, label),
        Upsert::Updated => tracing::info!("Updating existing {} {}", kind, label),
    }
    Ok(outcome)
}

/// Stores the press releases whose title passes the filter. Returns how many
/// were stored. A row the store rejects (e.g. a URL already stored under
/// another timestamp) is logged and skipped.
fn save_press_releases(store: &Store, press_releases: Vec<PressReleaseRecord>, title_filter: &Regex) -> usize {
    let mut saved = 0;
    for press_release in press_releases {
        if !press_release.matches_title(title_filter) {
            tracing::debug!("Skipping unrelated press release {}", press_release.title);
            continue;
        }
        tracing::info!("Filtered press release {}", press_release.title);
        match save(store, &press_release, "press release", &press_release.title) {
            Ok(_) => saved += 1,
            Err(e) => tracing::error!("Failed to store press release {} ({}): {}", press_release.title, press_release.url, e),
        }
    }
    saved
}

pub async fn download_feed<F: Fetcher>(fetcher: &F, store: &Store, settings: &Settings) -> Result<usize, AppError> {
    let feed = fetcher.fetch(&settings.feed_url).await?;
    let press_releases = parse_feed(&feed.body, settings.default_tz)?;
    tracing::info!("Found {} press releases in {}", press_releases.len(), feed.url);
    Ok(save_press_releases(store, press_releases, &settings.title_filter))
}

pub async fn download_archives<F: Fetcher>(fetcher: &F, store: &Store, settings: &Settings) -> Result<usize, AppError> {
    let mut saved = 0;
    for url in &settings.archive_urls {
        let page = match fetcher.fetch(url.as_str()).await {
            Ok(page) => page,
            Err(e) => {
                tracing::error!("Failed to download archive {}: {}", url, e);
                continue;
            }
        };
        match parse_archive(&page.body, url, &settings.archive_layout, settings.default_tz) {
            Ok(press_releases) => saved += save_press_releases(store, press_releases, &settings.title_filter),
            Err(e) => tracing::error!("Failed to parse archive {}: {}", url, e),
        }
    }
    Ok(saved)
}

pub async fn download_dashboard<F: Fetcher>(fetcher: &F, store: &Store, settings: &Settings) -> Result<usize, AppError> {
    let mut saved = 0;
    for url in &settings.dashboard_urls {
        let page = match fetcher.fetch(url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::error!("Failed to download dashboard {}: {}", url, e);
                continue;
            }
        };
        let timestamp = match parse_dashboard_timestamp(&page.body, &settings.dashboard_date, settings.default_tz) {
            Ok(timestamp) => timestamp,
            Err(e) => {
                tracing::error!("Failed to date dashboard {}: {}", url, e);
                continue;
            }
        };
        let snapshot = DashboardSnapshot { timestamp, content: page.body };
        save(store, &snapshot, "dashboard", &timestamp.to_rfc3339())?;
        saved += 1;
    }
    Ok(saved)
}

/// The district table carries no date of its own; it is stamped with the
/// server's `Last-Modified` time.
pub async fn download_district_table<F: Fetcher>(
    fetcher: &F,
    store: &Store,
    settings: &Settings,
) -> Result<DistrictTable, AppError> {
    let url = settings.district_table_url.as_deref().ok_or_else(|| ConfigError::Invalid {
        field: "download_district_table.url".to_string(),
        message: "not configured".to_string(),
    })?;
    let document = fetcher.fetch(url).await?;
    if document.body.trim().is_empty() {
        return Err(FetchError::Response { url: url.to_string(), reason: "empty district table".to_string() }.into());
    }
    let timestamp = document.last_modified.ok_or_else(|| FetchError::Response {
        url: url.to_string(),
        reason: "missing Last-Modified header".to_string(),
    })?;

    let table = DistrictTable { timestamp, content: document.body };
    save(store, &table, "district table", &timestamp.to_rfc3339())?;
    Ok(table)
}

/// Statistics from every stored press release page.
pub async fn parse_press_releases<F: Fetcher>(
    fetcher: &F,
    store: &Store,
    settings: &Settings,
    debug_dir: Option<&Path>,
) -> Result<Vec<StatisticsRecord>, AppError> {
    let mut parsed = Vec::new();
    for press_release in store.list_all::<PressReleaseRecord>()? {
        if !press_release.matches_title(&settings.title_filter) {
            continue;
        }
        let page = match fetcher.fetch(&press_release.url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::error!("Failed to download {}: {}", press_release.url, e);
                continue;
            }
        };
        match parse_press_release(&press_release, &page.body, &settings.press_release, &settings.numbers) {
            Ok(stats) => {
                tracing::info!("{}", stats);
                parsed.push(stats);
            }
            Err(e) => {
                tracing::error!("Failed to parse {} ({}): {}", press_release.title, press_release.url, e);
                if let Some(dir) = debug_dir {
                    if let Err(e) = save_debug_html(dir, &press_release.url, &page.body, &settings.press_release.fields) {
                        tracing::error!("Failed to save debug HTML for {}: {}", press_release.url, e);
                    }
                }
            }
        }
    }
    Ok(parsed)
}

pub fn parse_dashboards(store: &Store, settings: &Settings) -> Result<Vec<StatisticsRecord>, StorageError> {
    let mut parsed = Vec::new();
    for snapshot in store.list_all::<DashboardSnapshot>()? {
        match parse_dashboard(&snapshot, &settings.dashboard, &settings.numbers) {
            Ok(stats) => {
                tracing::info!("{}", stats);
                parsed.push(stats);
            }
            Err(e) => tracing::error!("Failed to parse dashboard {}: {}", snapshot.timestamp, e),
        }
    }
    Ok(parsed)
}

pub fn parse_district_tables(store: &Store, settings: &Settings) -> Result<Vec<StatisticsRecord>, StorageError> {
    let mut parsed = Vec::new();
    for table in store.list_all::<DistrictTable>()? {
        match parse_district_table(&table, &settings.district_table, &settings.numbers) {
            Ok(stats) => {
                tracing::info!("{}", stats);
                parsed.push(stats);
            }
            Err(e) => tracing::error!("Failed to parse district table {}: {}", table.timestamp, e),
        }
    }
    Ok(parsed)
}

/// Parses every source and merges the candidates into one series.
pub async fn build_series<F: Fetcher>(
    fetcher: &F,
    store: &Store,
    settings: &Settings,
    debug_dir: Option<&Path>,
) -> Result<MergedSeries, AppError> {
    let mut candidates = parse_press_releases(fetcher, store, settings, debug_dir).await?;
    candidates.extend(parse_dashboards(store, settings)?);
    candidates.extend(parse_district_tables(store, settings)?);
    tracing::info!("Merging {} statistics records", candidates.len());
    Ok(MergedSeries::merge(candidates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::SAMPLE;
    use crate::web::client::FetchedDocument;
    use crate::web::safe_filename;
    use chrono::{DateTime, NaiveDate};
    use std::collections::HashMap;

    const FEED_URL: &str = "https://www.berlin.de/sen/gpg/service/presse/2020/index.php/rss";
    const DASHBOARD_URL: &str = "https://www.berlin.de/corona/lagebericht/desktop/corona.html";
    const DISTRICT_URL: &str = "https://www.berlin.de/lageso/gesundheit/infektionsepidemiologie-infektionsschutz/corona/tabelle-bezirke-gesamtuebersicht/index.php/index/all.csv?q=";
    const PM_TABLE: &str = "https://www.berlin.de/sen/gpg/service/presse/2020/pressemitteilung.910000.php";
    const PM_PROSE: &str = "https://www.berlin.de/sen/gpg/service/presse/2020/pressemitteilung.909000.php";
    const PM_BROKEN: &str = "https://www.berlin.de/sen/gpg/service/presse/2020/pressemitteilung.911000.php";

    #[derive(Default)]
    struct StaticFetcher {
        documents: HashMap<String, FetchedDocument>,
    }

    impl StaticFetcher {
        fn with(mut self, url: &str, body: &str) -> Self {
            self.documents.insert(
                url.to_string(),
                FetchedDocument { url: url.to_string(), body: body.to_string(), last_modified: None },
            );
            self
        }

        fn with_last_modified(mut self, url: &str, body: &str, last_modified: &str) -> Self {
            self.documents.insert(
                url.to_string(),
                FetchedDocument {
                    url: url.to_string(),
                    body: body.to_string(),
                    last_modified: Some(DateTime::parse_from_rfc3339(last_modified).unwrap()),
                },
            );
            self
        }
    }

    impl Fetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError> {
            self.documents.get(url).cloned().ok_or_else(|| FetchError::Http {
                url: url.to_string(),
                status: reqwest::StatusCode::NOT_FOUND,
            })
        }
    }

    fn settings() -> Settings {
        Settings::from_json(SAMPLE).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<rss version="2.0"><channel>
  <item>
    <title>Coronavirus: Derzeitiger Stand (21.03.2020)</title>
    <link>https://www.berlin.de/sen/gpg/service/presse/2020/pressemitteilung.910000.php</link>
    <pubDate>Sat, 21 Mar 2020 15:00:00 +0100</pubDate>
  </item>
  <item>
    <title>Masernschutz an Schulen</title>
    <link>https://www.berlin.de/sen/gpg/service/presse/2020/pressemitteilung.908000.php</link>
    <pubDate>Sat, 21 Mar 2020 10:00:00 +0100</pubDate>
  </item>
</channel></rss>"#;

    #[test]
    fn test_download_feed_filters_and_upserts() {
        let fetcher = StaticFetcher::default().with(FEED_URL, FEED);
        let store = Store::open_in_memory().unwrap();
        let settings = settings();

        assert_eq!(tokio_test::block_on(download_feed(&fetcher, &store, &settings)).unwrap(), 1);
        // Same feed again updates in place
        assert_eq!(tokio_test::block_on(download_feed(&fetcher, &store, &settings)).unwrap(), 1);

        let stored: Vec<PressReleaseRecord> = store.list_all().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].url, PM_TABLE);
    }

    #[test]
    fn test_download_feed_failure_is_reported() {
        let store = Store::open_in_memory().unwrap();
        let result = tokio_test::block_on(download_feed(&StaticFetcher::default(), &store, &settings()));
        assert!(matches!(result, Err(AppError::Fetch(FetchError::Http { .. }))));
    }

    #[test]
    fn test_download_archives_skips_failed_pages() {
        let archive = r#"<div class="modul-autoteaser">
          <div class="row-fluid">
            <div class="date">20.03.2020 15:00</div>
            <div class="text"><a href="/sen/gpg/service/presse/2020/pressemitteilung.909000.php">Coronavirus: Derzeitiger Stand</a></div>
          </div></div>"#;
        // Only the second configured page is reachable
        let fetcher = StaticFetcher::default()
            .with("https://www.berlin.de/sen/gpg/service/presse/2020/?page_at_1_0=2", archive);
        let store = Store::open_in_memory().unwrap();

        let saved = tokio_test::block_on(download_archives(&fetcher, &store, &settings())).unwrap();
        assert_eq!(saved, 1);
        let stored: Vec<PressReleaseRecord> = store.list_all().unwrap();
        assert_eq!(stored[0].url, PM_PROSE);
    }

    #[test]
    fn test_archive_duplicate_of_feed_entry_does_not_stop_batch() {
        let feed = r#"<?xml version="1.0" encoding="utf-8"?>
<rss version="2.0"><channel>
  <item>
    <title>Coronavirus: Derzeitiger Stand (20.03.2020)</title>
    <link>https://www.berlin.de/sen/gpg/service/presse/2020/pressemitteilung.909000.php</link>
    <pubDate>Fri, 20 Mar 2020 15:07:00 +0100</pubDate>
  </item>
</channel></rss>"#;
        // Same article with a date-only timestamp, followed by a new one
        let archive = r#"<div class="modul-autoteaser">
          <div class="row-fluid">
            <div class="date">20.03.2020</div>
            <div class="text"><a href="/sen/gpg/service/presse/2020/pressemitteilung.909000.php">Coronavirus: Derzeitiger Stand</a></div>
          </div>
          <div class="row-fluid">
            <div class="date">19.03.2020</div>
            <div class="text"><a href="/sen/gpg/service/presse/2020/pressemitteilung.908000.php">Coronavirus: Neue Fälle</a></div>
          </div></div>"#;
        let fetcher = StaticFetcher::default()
            .with(FEED_URL, feed)
            .with("https://www.berlin.de/sen/gpg/service/presse/2020/?page_at_1_0=1", archive);
        let store = Store::open_in_memory().unwrap();
        let settings = settings();

        assert_eq!(tokio_test::block_on(download_feed(&fetcher, &store, &settings)).unwrap(), 1);
        assert_eq!(tokio_test::block_on(download_archives(&fetcher, &store, &settings)).unwrap(), 1);

        let stored: Vec<PressReleaseRecord> = store.list_all().unwrap();
        let urls: Vec<&str> = stored.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.berlin.de/sen/gpg/service/presse/2020/pressemitteilung.908000.php",
                PM_PROSE,
            ]
        );
        // The feed's precise timestamp is kept
        assert_eq!(stored[1].timestamp.to_rfc3339(), "2020-03-20T15:07:00+01:00");
    }

    const DASHBOARD: &str = r#"<html><body>
      <div class="toptitle h1"><p>Lagebericht 14.09.2020</p></div>
      <div id="box-fallzahl"><div class="value">12.345</div></div>
      <div id="box-genesene"><div class="value">11.100</div></div>
      <div id="box-todesfaelle"><div class="value">226</div></div>
      <div id="box-stationaer"><div class="value">-</div></div>
    </body></html>"#;

    #[test]
    fn test_download_dashboard_stamps_from_date_line() {
        let fetcher = StaticFetcher::default().with(DASHBOARD_URL, DASHBOARD);
        let store = Store::open_in_memory().unwrap();
        assert_eq!(tokio_test::block_on(download_dashboard(&fetcher, &store, &settings())).unwrap(), 1);

        let stored: Vec<DashboardSnapshot> = store.list_all().unwrap();
        assert_eq!(stored[0].timestamp.to_rfc3339(), "2020-09-14T00:00:00+02:00");
    }

    #[test]
    fn test_download_district_table_requires_last_modified() {
        let csv = "Bezirk;Fallzahl;Genesen\nMitte;2000;1800\nSumme;12500;11200\n";
        let store = Store::open_in_memory().unwrap();

        let without = StaticFetcher::default().with(DISTRICT_URL, csv);
        let result = tokio_test::block_on(download_district_table(&without, &store, &settings()));
        assert!(matches!(result, Err(AppError::Fetch(FetchError::Response { .. }))));

        let with = StaticFetcher::default().with_last_modified(DISTRICT_URL, csv, "2020-09-15T14:30:00+02:00");
        let table = tokio_test::block_on(download_district_table(&with, &store, &settings())).unwrap();
        assert_eq!(table.content, csv);
        assert_eq!(store.list_all::<DistrictTable>().unwrap(), vec![table]);
    }

    #[test]
    fn test_download_district_table_rejects_empty_body() {
        let fetcher = StaticFetcher::default().with_last_modified(DISTRICT_URL, "  \n", "2020-09-15T14:30:00+02:00");
        let store = Store::open_in_memory().unwrap();
        let result = tokio_test::block_on(download_district_table(&fetcher, &store, &settings()));
        assert!(matches!(result, Err(AppError::Fetch(FetchError::Response { .. }))));
    }

    const PAGE_TABLE: &str = r#"<html><body>
      <p>Stand: 21.03.2020. Es gibt insgesamt 2 Todesfälle.</p>
      <table>
        <tr><th>Bezirk</th><th>Fälle</th><th>Genesen</th></tr>
        <tr><td>Mitte</td><td>120</td><td>10</td></tr>
        <tr><td>Summe</td><td>1.024</td><td>31</td></tr>
      </table></body></html>"#;

    const PAGE_PROSE: &str = r#"<html><body>
      <p>Berlin meldet 731 bestätigte Fälle. Eine Person ist verstorben.</p>
    </body></html>"#;

    const PAGE_BROKEN: &str = r#"<html><body>
      <p>Es gibt 5 Todesfälle.</p>
      <table><tr><td>Neukölln</td><td>100</td></tr></table>
    </body></html>"#;

    fn press_release(ts: &str, url: &str) -> PressReleaseRecord {
        PressReleaseRecord {
            timestamp: DateTime::parse_from_rfc3339(ts).unwrap(),
            title: "Coronavirus: Derzeitiger Stand".to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_build_series_merges_all_sources() {
        let store = Store::open_in_memory().unwrap();
        store.upsert(&press_release("2020-03-21T15:00:00+01:00", PM_TABLE)).unwrap();
        store.upsert(&press_release("2020-03-20T15:00:00+01:00", PM_PROSE)).unwrap();
        store.upsert(&press_release("2020-03-22T15:00:00+01:00", PM_BROKEN)).unwrap();
        store
            .upsert(&DashboardSnapshot {
                timestamp: DateTime::parse_from_rfc3339("2020-09-14T00:00:00+02:00").unwrap(),
                content: DASHBOARD.to_string(),
            })
            .unwrap();
        store
            .upsert(&DistrictTable {
                timestamp: DateTime::parse_from_rfc3339("2020-09-15T14:30:00+02:00").unwrap(),
                content: "Bezirk;Fallzahl;Genesen\nMitte;2000;1800\nSumme;12500;11200\n".to_string(),
            })
            .unwrap();

        let fetcher = StaticFetcher::default()
            .with(PM_TABLE, PAGE_TABLE)
            .with(PM_PROSE, PAGE_PROSE)
            .with(PM_BROKEN, PAGE_BROKEN);
        let debug_dir = std::env::temp_dir().join(format!("covid_berlin_pipeline_debug_{}", std::process::id()));

        let series =
            tokio_test::block_on(build_series(&fetcher, &store, &settings(), Some(&debug_dir))).unwrap();
        assert_eq!(series.len(), 4);

        let prose = series.get(date(2020, 3, 20)).unwrap();
        assert_eq!((prose.cases, prose.recovered, prose.deaths), (731, None, None));
        // Override map marks the date as explicitly missing
        assert_eq!(prose.hospitalized, None);

        let table = series.get(date(2020, 3, 21)).unwrap();
        assert_eq!((table.cases, table.recovered, table.deaths), (1024, Some(31), Some(2)));

        let dashboard = series.get(date(2020, 9, 13)).unwrap();
        assert_eq!(dashboard.cases, 12345);
        assert_eq!(dashboard.recovered, Some(11100));
        assert_eq!(dashboard.hospitalized, None);

        let district = series.get(date(2020, 9, 15)).unwrap();
        assert_eq!((district.cases, district.recovered, district.deaths), (12500, Some(11200), Some(226)));

        // The page with an unexpected table is excluded and dumped for inspection
        assert!(series.get(date(2020, 3, 22)).is_none());
        let dumped = std::fs::read_to_string(debug_dir.join(format!("{}.html", safe_filename(PM_BROKEN)))).unwrap();
        assert!(dumped.contains("Field: deaths\">5 Todesfälle</span>"));
        let _ = std::fs::remove_dir_all(&debug_dir);
    }

    #[test]
    fn test_missing_pages_are_skipped() {
        let store = Store::open_in_memory().unwrap();
        store.upsert(&press_release("2020-03-21T15:00:00+01:00", PM_TABLE)).unwrap();
        store.upsert(&press_release("2020-03-20T15:00:00+01:00", PM_PROSE)).unwrap();
        let fetcher = StaticFetcher::default().with(PM_PROSE, PAGE_PROSE);

        let parsed = tokio_test::block_on(parse_press_releases(&fetcher, &store, &settings(), None)).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].cases, 731);
    }
}
