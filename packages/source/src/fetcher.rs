//! Page-count and per-page retrieval over a [`PhotoSearch`] service.
//!
//! Errors from the underlying service are returned unchanged; this layer
//! never retries.

use std::sync::Arc;

use photo_scraper_photo_models::RawPhoto;

use crate::{PhotoSearch, SearchQuery, SourceError};

/// Largest page size the photo-search API accepts.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Thin adapter that fixes the page size and extras for every request.
#[derive(Clone)]
pub struct PageFetcher {
    search: Arc<dyn PhotoSearch>,
    page_size: u32,
    extras: String,
}

impl PageFetcher {
    /// Creates a fetcher. `page_size` is clamped to `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn new(search: Arc<dyn PhotoSearch>, page_size: u32, extras: &str) -> Self {
        let clamped = page_size.clamp(1, MAX_PAGE_SIZE);
        if clamped != page_size {
            log::warn!("Page size {page_size} out of range, using {clamped}");
        }
        Self {
            search,
            page_size: clamped,
            extras: extras.to_owned(),
        }
    }

    /// Returns the effective (clamped) page size.
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Returns the comma-separated extras specifier.
    #[must_use]
    pub fn extras(&self) -> &str {
        &self.extras
    }

    /// Returns the number of pages the service reports for `text`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the search request fails.
    pub async fn count_pages(&self, text: &str) -> Result<u32, SourceError> {
        let page = self.search.search(self.query(text, None)).await?;
        Ok(page.page_count)
    }

    /// Fetches the records on one-based page `page` for `text`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the search request fails.
    pub async fn fetch_page(&self, text: &str, page: u32) -> Result<Vec<RawPhoto>, SourceError> {
        let result = self.search.search(self.query(text, Some(page))).await?;
        Ok(result.records)
    }

    fn query<'a>(&'a self, text: &'a str, page: Option<u32>) -> SearchQuery<'a> {
        SearchQuery {
            text,
            per_page: self.page_size,
            extras: &self.extras,
            page,
        }
    }
}
