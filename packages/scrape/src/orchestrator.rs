//! Term-level and page-level fan-out.
//!
//! [`TermOrchestrator`] spreads search terms over a [`WorkerPool`]. Each
//! term worker runs [`PageOrchestrator::run`], which walks the term's
//! pages in order and drains a fresh record pool per page before fetching
//! the next one.
//!
//! Failures stay with the item that caused them. A bad record is logged
//! and counted without touching its siblings. A page that fails to fetch
//! is skipped. A term whose page count cannot be read, or whose worker
//! panics, is reported in [`RunSummary::failed_terms`] while the other
//! terms carry on.

use std::ops::AddAssign;
use std::sync::Arc;

use photo_scraper_photo_models::{RawPhoto, SearchTerm};
use photo_scraper_source::progress::{ProgressCallback, null_progress};
use photo_scraper_source::{PageFetcher, SourceError};

use crate::pool::WorkerPool;
use crate::processor::{ProcessOutcome, RecordProcessor};

/// Counters for one search term (or, summed, for a whole run).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TermSummary {
    /// Pages fetched and processed.
    pub pages_processed: u32,
    /// Pages whose fetch failed.
    pub pages_failed: u32,
    /// Rows written.
    pub inserted: u64,
    /// Rows written with geocoded coordinates.
    pub enriched: u64,
    /// Records skipped because their id was already stored.
    pub skipped: u64,
    /// Records that lost an insert race to another worker.
    pub lost_races: u64,
    /// Records abandoned because of an error.
    pub failed: u64,
    /// Of `failed`, how many were storage failures.
    pub storage_failures: u64,
}

impl TermSummary {
    fn record(&mut self, outcome: ProcessOutcome) {
        match outcome {
            ProcessOutcome::Skipped => self.skipped += 1,
            ProcessOutcome::LostRace => self.lost_races += 1,
            ProcessOutcome::Inserted { enriched } => {
                self.inserted += 1;
                if enriched {
                    self.enriched += 1;
                }
            }
        }
    }
}

impl AddAssign for TermSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.pages_processed += rhs.pages_processed;
        self.pages_failed += rhs.pages_failed;
        self.inserted += rhs.inserted;
        self.enriched += rhs.enriched;
        self.skipped += rhs.skipped;
        self.lost_races += rhs.lost_races;
        self.failed += rhs.failed;
        self.storage_failures += rhs.storage_failures;
    }
}

/// Outcome of a full run across all search terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Counters summed over every completed term.
    pub totals: TermSummary,
    /// Number of terms that ran to completion.
    pub terms_completed: usize,
    /// Terms that did not finish, because their page count query failed
    /// or their worker panicked.
    pub failed_terms: Vec<SearchTerm>,
}

impl RunSummary {
    /// Returns `true` if any storage operation failed during the run.
    #[must_use]
    pub const fn has_storage_failures(&self) -> bool {
        self.totals.storage_failures > 0
    }
}

/// Processes every page of one search term.
pub struct PageOrchestrator {
    fetcher: Arc<PageFetcher>,
    processor: Arc<RecordProcessor>,
    record_pool: WorkerPool,
    progress: Arc<dyn ProgressCallback>,
}

impl PageOrchestrator {
    /// Creates a page orchestrator whose per-page pools have
    /// `record_pool.width()` workers.
    #[must_use]
    pub fn new(
        fetcher: Arc<PageFetcher>,
        processor: Arc<RecordProcessor>,
        record_pool: WorkerPool,
    ) -> Self {
        Self {
            fetcher,
            processor,
            record_pool,
            progress: null_progress(),
        }
    }

    /// Reports one unit of progress per finished record.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Fetches and processes pages `1..page_count` for `term`.
    ///
    /// The final reported page is never requested: a page count of 5
    /// processes pages 1 through 4.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] only if the page count query fails.
    /// Failures after that are logged and counted in the summary.
    pub async fn run(&self, term: &SearchTerm) -> Result<TermSummary, SourceError> {
        log::info!("Fetching photos for '{term}'");
        let page_count = self.fetcher.count_pages(term.as_str()).await?;
        log::info!("'{term}': {page_count} page(s) reported");

        let mut summary = TermSummary::default();

        for page in 1..page_count {
            let photos = match self.fetcher.fetch_page(term.as_str(), page).await {
                Ok(photos) => photos,
                Err(e) => {
                    log::error!("[{term}] page {page}/{page_count}: fetch failed: {e}");
                    summary.pages_failed += 1;
                    continue;
                }
            };

            log::debug!("[{term}] page {page}/{page_count}: {} photo(s)", photos.len());
            self.progress
                .set_message(format!("{term} (page {page}/{page_count})"));
            summary += self.process_page(term, page, photos).await;
            summary.pages_processed += 1;
        }

        log::info!(
            "'{term}' done: {} inserted ({} geocoded), {} skipped, {} failed",
            summary.inserted,
            summary.enriched,
            summary.skipped + summary.lost_races,
            summary.failed
        );

        Ok(summary)
    }

    /// Runs one fresh record pool over `photos` and waits for it to drain.
    async fn process_page(
        &self,
        term: &SearchTerm,
        page: u32,
        photos: Vec<RawPhoto>,
    ) -> TermSummary {
        let ids: Vec<String> = photos.iter().map(|photo| photo.id.clone()).collect();
        let results = self
            .record_pool
            .run(photos, |photo| {
                let processor = Arc::clone(&self.processor);
                let progress = Arc::clone(&self.progress);
                let term = term.clone();
                async move {
                    let id = photo.id.clone();
                    let result = processor.process(photo, term.as_str()).await;
                    progress.inc(1);
                    if let Err(e) = &result {
                        log::error!("[{term}] page {page}: photo {id} failed: {e}");
                    }
                    result
                }
            })
            .await;

        let mut summary = TermSummary::default();
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(Ok(outcome)) => summary.record(outcome),
                Ok(Err(e)) => {
                    summary.failed += 1;
                    if e.is_storage() {
                        summary.storage_failures += 1;
                    }
                }
                Err(e) => {
                    log::error!("[{term}] page {page}: photo {id} worker panicked: {e}");
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}

/// Top-level fan-out of search terms.
pub struct TermOrchestrator {
    terms: Vec<SearchTerm>,
    pages: Arc<PageOrchestrator>,
    term_pool: WorkerPool,
    progress: Arc<dyn ProgressCallback>,
}

impl TermOrchestrator {
    /// Creates an orchestrator over `terms`, running up to
    /// `term_pool.width()` terms at once.
    #[must_use]
    pub fn new(terms: Vec<SearchTerm>, pages: Arc<PageOrchestrator>, term_pool: WorkerPool) -> Self {
        Self {
            terms,
            pages,
            term_pool,
            progress: null_progress(),
        }
    }

    /// Reports one unit of progress per finished term.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Appends a search term. Duplicates are allowed and are fetched
    /// again; storage still holds each photo once.
    pub fn add_search_term(&mut self, term: impl Into<SearchTerm>) {
        self.terms.push(term.into());
    }

    /// Returns the search terms in submission order.
    #[must_use]
    pub fn search_terms(&self) -> &[SearchTerm] {
        &self.terms
    }

    /// Runs every term to completion.
    pub async fn run(&self) -> RunSummary {
        log::info!(
            "Scraping {} term(s) with {} term worker(s)",
            self.terms.len(),
            self.term_pool.width()
        );
        self.progress.set_total(self.terms.len() as u64);

        let results = self
            .term_pool
            .run(self.terms.clone(), |term| {
                let pages = Arc::clone(&self.pages);
                let progress = Arc::clone(&self.progress);
                async move {
                    let result = pages.run(&term).await;
                    progress.inc(1);
                    result
                }
            })
            .await;

        let mut summary = RunSummary::default();
        for (term, result) in self.terms.iter().zip(results) {
            match result {
                Ok(Ok(term_summary)) => {
                    summary.totals += term_summary;
                    summary.terms_completed += 1;
                }
                Ok(Err(e)) => {
                    log::error!("[{term}] could not read page count: {e}");
                    summary.failed_terms.push(term.clone());
                }
                Err(e) => {
                    log::error!("[{term}] term worker panicked: {e}");
                    self.progress.inc(1);
                    summary.failed_terms.push(term.clone());
                }
            }
        }

        self.progress.finish(format!(
            "{} term(s) done, {} photo(s) stored",
            summary.terms_completed, summary.totals.inserted
        ));
        summary
    }
}
