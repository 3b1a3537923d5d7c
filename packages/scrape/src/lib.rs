#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Parallel photo scraping with geo enrichment and deduplicated storage.
//!
//! The run is a two-level nest of [`pool::WorkerPool`]s:
//!
//! ```text
//! TermOrchestrator      one worker per search term
//!   PageOrchestrator    pages in order, one fresh pool per page
//!     RecordProcessor   one worker per record on the page
//!       GeoResolver / RecordStore
//! ```
//!
//! Workers are Tokio tasks, so a term worker can build, own, and fully
//! drain a pool of record workers before it moves on. Deduplication never
//! depends on coordination between workers: the store's insert-if-absent
//! is atomic on its own.

pub mod config;
pub mod orchestrator;
pub mod pool;
pub mod processor;

pub use config::ScrapeConfig;
pub use orchestrator::{PageOrchestrator, RunSummary, TermOrchestrator, TermSummary};
pub use pool::WorkerPool;
pub use processor::{ProcessError, ProcessOutcome, RecordProcessor};

/// Errors that abort a run before orchestration starts.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// Opening or preparing the local store failed.
    #[error("Database error: {0}")]
    Database(#[from] photo_scraper_database::DbError),

    /// Building the photo-search client failed.
    #[error("Photo search error: {0}")]
    Source(#[from] photo_scraper_source::SourceError),

    /// Building the geocoding client failed.
    #[error("Geocoder error: {0}")]
    Geocode(#[from] photo_scraper_geocoder::GeocodeError),

    /// Reading the configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for [`ScrapeConfig`].
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
