// src/main.rs
mod config;
mod extractors;
mod merge;
mod models;
mod pipeline;
mod storage;
mod utils;
mod web;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use config::Settings;
use storage::output::{save_series, BASE_COLUMNS, HOSPITAL_COLUMNS};
use storage::Store;
use utils::AppError;
use web::HttpFetcher;

/// Collects Berlin COVID-19 case statistics into a daily CSV series
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cache directory (database, downloaded pages, debug output)
    #[arg(short = 'a', long)]
    cache: PathBuf,

    /// Configuration JSON file
    #[arg(short, long, default_value = "config.sample.json")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store press releases listed in the feed
    DownloadFeed,
    /// Store press releases listed on the archive pages
    DownloadArchives,
    /// Store a snapshot of every dashboard page
    DownloadDashboard,
    /// Store the current district table
    DownloadDistrictTable,
    /// Parse all stored sources and write the statistics CSV
    ParsePressReleases {
        /// Output CSV (date,cases,recovered,deaths)
        #[arg(short, long)]
        output: PathBuf,

        /// Optional CSV including hospitalized and icu columns
        #[arg(long)]
        output_hosp: Option<PathBuf>,

        /// Save annotated HTML of pages that fail to parse
        #[arg(short, long)]
        debug: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let args = Args::parse();
    utils::logging::setup_logging(args.verbose);
    tracing::debug!("Starting with args: {:?}", args);

    // Invalid configuration aborts before anything is fetched
    let settings = Settings::load(&args.config)?;
    let store = Store::open(args.cache.join("db.sqlite3"))?;
    let fetcher = HttpFetcher::new(&settings.http.user_agent, settings.http.timeout)?;

    match args.command {
        Command::DownloadFeed => {
            let saved = pipeline::download_feed(&fetcher, &store, &settings).await?;
            tracing::info!("Stored {} press releases from the feed", saved);
        }
        Command::DownloadArchives => {
            let saved = pipeline::download_archives(&fetcher, &store, &settings).await?;
            tracing::info!("Stored {} press releases from the archives", saved);
        }
        Command::DownloadDashboard => {
            let saved = pipeline::download_dashboard(&fetcher, &store, &settings).await?;
            tracing::info!("Stored {} dashboard snapshots", saved);
        }
        Command::DownloadDistrictTable => {
            let table = pipeline::download_district_table(&fetcher, &store, &settings).await?;
            tracing::info!("Stored district table of {}", table.timestamp);
        }
        Command::ParsePressReleases { output, output_hosp, debug } => {
            let pages = fetcher.with_cache(args.cache.join("pages"));
            let debug_dir = debug.then(|| args.cache.join("debug"));
            let series = pipeline::build_series(&pages, &store, &settings, debug_dir.as_deref()).await?;
            if series.is_empty() {
                return Err(AppError::Processing("No statistics could be parsed from the stored sources".to_string()));
            }

            save_series(&output, &series, BASE_COLUMNS)?;
            if let Some(path) = output_hosp {
                save_series(&path, &series, HOSPITAL_COLUMNS)?;
            }
        }
    }

    Ok(())
}
