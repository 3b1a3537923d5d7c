#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the photo scraper.
//!
//! Uses `indicatif-log-bridge` (via [`photo_scraper_cli_utils::init_logger`])
//! so log lines and progress bars never fight for the terminal.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use photo_scraper_cli_utils::{IndicatifProgress, MultiProgress};
use photo_scraper_database::{DbError, RecordStore, Table};
use photo_scraper_geocoder::GeoResolver;
use photo_scraper_geocoder::google::GoogleGeocoder;
use photo_scraper_photo_models::SearchTerm;
use photo_scraper_scrape::{
    PageOrchestrator, RecordProcessor, ScrapeConfig, TermOrchestrator, WorkerPool,
};
use photo_scraper_source::PageFetcher;
use photo_scraper_source::flickr::FlickrClient;

#[derive(Parser)]
#[command(name = "photo_scraper", about = "Geo-enriched photo metadata scraper")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape photo metadata for a list of search terms
    Run(RunArgs),
    /// Create the `image_metadata` and `geo_info` tables if missing
    InitDb {
        /// Database file (overrides `PHOTO_SCRAPER_DB`)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Print row counts for both tables
    Stats {
        /// Database file (overrides `PHOTO_SCRAPER_DB`)
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[derive(Args, Default)]
struct RunArgs {
    /// Comma-separated search terms (e.g., "paris,rome,new york")
    #[arg(long)]
    terms: Option<String>,
    /// Photos per page (maximum 500)
    #[arg(long)]
    page_size: Option<u32>,
    /// Comma-separated extras to request with each photo
    #[arg(long)]
    extras: Option<String>,
    /// Database file (overrides `PHOTO_SCRAPER_DB`)
    #[arg(long)]
    db: Option<PathBuf>,
    /// Worker pool width (defaults to the number of CPUs)
    #[arg(long)]
    workers: Option<usize>,
    /// TOML config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
}

impl RunArgs {
    fn into_config(self) -> Result<ScrapeConfig, photo_scraper_scrape::ScrapeError> {
        let mut config = match &self.config {
            Some(path) => ScrapeConfig::load(path)?,
            None => ScrapeConfig::default(),
        };

        if let Some(terms) = self.terms {
            config.search_terms = terms.split(',').map(str::to_owned).collect();
        }
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        if let Some(extras) = self.extras {
            config.extras = extras;
        }
        if self.db.is_some() {
            config.db_path = self.db;
        }
        if self.workers.is_some() {
            config.workers = self.workers;
        }

        Ok(config)
    }
}

fn open_store(db: Option<&Path>) -> Result<RecordStore, DbError> {
    db.map_or_else(RecordStore::open_default, RecordStore::open)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = photo_scraper_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command.unwrap_or_else(|| Commands::Run(RunArgs::default())) {
        Commands::Run(args) => run(args.into_config()?, &multi).await?,
        Commands::InitDb { db } => {
            open_store(db.as_deref())?;
            log::info!("Tables ready.");
        }
        Commands::Stats { db } => {
            let store = open_store(db.as_deref())?;
            for table in [Table::ImageMetadata, Table::GeoInfo] {
                println!("{:<16} {}", table, store.count(table)?);
            }
        }
    }

    Ok(())
}

async fn run(config: ScrapeConfig, multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();

    let store = Arc::new(open_store(config.db_path.as_deref())?);
    let search = Arc::new(FlickrClient::from_env()?.with_max_retries(config.http_retries));
    let geocoder = Arc::new(GoogleGeocoder::from_env()?);

    let fetcher = Arc::new(PageFetcher::new(search, config.page_size, &config.extras));
    let resolver = GeoResolver::new(Arc::clone(&store), geocoder);
    let processor = Arc::new(RecordProcessor::new(Arc::clone(&store), resolver));
    let pool = WorkerPool::new(config.worker_count());

    let terms = config.search_terms();
    let terms_bar = IndicatifProgress::steps_bar(multi, "Search terms", terms.len() as u64);
    let photos_bar = IndicatifProgress::records_bar(multi, "Photos");

    let pages = Arc::new(
        PageOrchestrator::new(fetcher, processor, pool).with_progress(Arc::clone(&photos_bar)),
    );
    let orchestrator = TermOrchestrator::new(terms, pages, pool).with_progress(terms_bar);

    let summary = orchestrator.run().await;
    let totals = &summary.totals;
    photos_bar.finish(format!(
        "{} photo(s) processed",
        totals.inserted + totals.skipped + totals.lost_races + totals.failed
    ));

    log::info!(
        "Scrape complete in {:.1}s: {} term(s), {} page(s), {} inserted ({} geocoded), {} already stored, {} failed",
        start.elapsed().as_secs_f64(),
        summary.terms_completed,
        totals.pages_processed,
        totals.inserted,
        totals.enriched,
        totals.skipped + totals.lost_races,
        totals.failed
    );
    if totals.pages_failed > 0 {
        log::warn!("{} page(s) could not be fetched", totals.pages_failed);
    }
    if !summary.failed_terms.is_empty() {
        let failed: Vec<&str> = summary.failed_terms.iter().map(SearchTerm::as_str).collect();
        log::warn!("Failed search terms: {}", failed.join(", "));
    }

    if summary.has_storage_failures() {
        return Err(format!(
            "{} record(s) failed to store; the database may be unavailable",
            totals.storage_failures
        )
        .into());
    }

    Ok(())
}
