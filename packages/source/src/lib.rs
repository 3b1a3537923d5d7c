#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Remote photo-search access for the photo scraper.
//!
//! The [`PhotoSearch`] trait is the narrow seam to the remote API: one
//! call returns the total page count plus the records of one page.
//! [`flickr::FlickrClient`] implements it against the Flickr REST API, and
//! [`fetcher::PageFetcher`] layers page-count and per-page helpers on top
//! with the page size already clamped. [`progress`] holds the progress
//! reporting trait shared by the orchestrators and the CLI.

pub mod fetcher;
pub mod flickr;
pub mod progress;
pub mod retry;

use async_trait::async_trait;
use photo_scraper_photo_models::RawPhoto;

pub use fetcher::{MAX_PAGE_SIZE, PageFetcher};

/// Errors that can occur while talking to the photo-search API.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed. The request URL (which carries the API key)
    /// is stripped on conversion.
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with a non-success status.
    #[error("HTTP status error: {message}")]
    Status {
        /// Description including the status code.
        message: String,
    },

    /// The API reported a failure in its response envelope.
    #[error("API error {code}: {message}")]
    Api {
        /// API-specific error code.
        code: i64,
        /// Human-readable message from the API.
        message: String,
    },

    /// The response did not have the expected shape.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of what went wrong.
        message: String,
    },

    /// Required configuration (e.g. an API key) is missing.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what is missing.
        message: String,
    },
}

impl From<reqwest::Error> for SourceError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value.without_url())
    }
}

/// Parameters of a single photo-search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchQuery<'a> {
    /// Free-text search.
    pub text: &'a str,
    /// Records per page (already clamped by the caller).
    pub per_page: u32,
    /// Comma-separated extra fields to include (e.g. `"geo"`).
    pub extras: &'a str,
    /// One-based page number, or `None` for the API's default first page.
    pub page: Option<u32>,
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    /// Total number of pages the API reports for this query.
    pub page_count: u32,
    /// Records on this page.
    pub records: Vec<RawPhoto>,
}

/// A remote photo-search service.
///
/// Implementations must be `Send + Sync` so one instance can be shared by
/// every worker of a run.
#[async_trait]
pub trait PhotoSearch: Send + Sync {
    /// Runs one search request.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the request fails or the response
    /// cannot be parsed.
    async fn search(&self, query: SearchQuery<'_>) -> Result<SearchPage, SourceError>;
}
