// src/web/mod.rs
pub mod client;

pub use client::{safe_filename, Fetcher, HttpFetcher};
