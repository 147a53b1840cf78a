// src/web/client.rs
use std::path::PathBuf;
use std::time::Duration;

use chrono::DateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header;
use sha2::{Digest, Sha256};

use crate::models::ReportTimestamp;
use crate::utils::error::FetchError;

static UNSAFE_FILENAME_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\-\.]").expect("Failed to compile UNSAFE_FILENAME_CHARS_RE"));

const MAX_FILENAME_PREFIX: usize = 64;

/// A downloaded (or cached) document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub url: String,
    pub body: String,
    /// Parsed `Last-Modified` header; never set for cache hits.
    pub last_modified: Option<ReportTimestamp>,
}

/// Source of raw documents.
#[allow(async_fn_in_trait)]
pub trait Fetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError>;
}

/// Readable, collision-resistant file name for a URL.
pub fn safe_filename(s: &str) -> String {
    let digest = Sha256::digest(s.as_bytes());
    let short_hash: String = format!("{:x}", digest).chars().take(7).collect();
    let replaced = UNSAFE_FILENAME_CHARS_RE.replace_all(s, "_");
    let safe: String = replaced.trim_matches('_').chars().take(MAX_FILENAME_PREFIX).collect();
    format!("{}--{}", safe, short_hash)
}

/// reqwest-backed fetcher with an optional on-disk cache.
pub struct HttpFetcher {
    client: reqwest::Client,
    cache_dir: Option<PathBuf>,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, cache_dir: None })
    }

    /// Serves repeated URLs from `dir` instead of the network.
    pub fn with_cache(mut self, dir: PathBuf) -> Self {
        self.cache_dir = Some(dir);
        self
    }

    async fn download(&self, url: &str) -> Result<FetchedDocument, FetchError> {
        tracing::info!("Downloading {}", url);
        let response = self.client.get(url).send().await?; // Propagates reqwest::Error (incl. timeout)

        let status = response.status();
        if !status.is_success() {
            tracing::error!("HTTP error status: {} for URL: {}", status, url);
            return Err(FetchError::Http { url: url.to_string(), status });
        }

        let last_modified = response
            .headers()
            .get(header::LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| match DateTime::parse_from_rfc2822(value) {
                Ok(ts) => Some(ts),
                Err(e) => {
                    tracing::warn!("Ignoring unparsable Last-Modified \"{}\": {}", value, e);
                    None
                }
            });

        let body = response.text().await?;
        tracing::debug!("Successfully downloaded {} bytes from {}", body.len(), url);
        Ok(FetchedDocument { url: url.to_string(), body, last_modified })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError> {
        let Some(cache_dir) = &self.cache_dir else {
            return self.download(url).await;
        };

        let cache_path = cache_dir.join(safe_filename(url));
        if tokio::fs::try_exists(&cache_path).await? {
            tracing::info!("Reading {} from cache", url);
            let body = tokio::fs::read_to_string(&cache_path).await?;
            return Ok(FetchedDocument { url: url.to_string(), body, last_modified: None });
        }

        let document = self.download(url).await?;
        tokio::fs::create_dir_all(cache_dir).await?;
        tokio::fs::write(&cache_path, &document.body).await?;
        Ok(document)
    }
}
