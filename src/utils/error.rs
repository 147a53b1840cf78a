// src/utils/error.rs
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error), // Automatically convert reqwest errors (incl. timeouts)

    #[error("HTTP error {status} for {url}")]
    Http { url: String, status: reqwest::StatusCode },

    #[error("Cache I/O error: {0}")]
    Cache(#[from] std::io::Error),

    #[error("Unusable response from {url}: {reason}")]
    Response { url: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unexpected table shape: {0}")]
    TableShape(String),

    #[error("Failed to parse number \"{0}\"")]
    NumberParse(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid regex for {field}: {source}")]
    Regex {
        field: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid CSS selector for {field}: {message}")]
    Selector { field: String, message: String },

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: String, message: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Corrupt stored value: {0}")]
    Corrupt(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Download failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
