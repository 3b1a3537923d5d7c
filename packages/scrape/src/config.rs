//! Run configuration loaded from TOML.
//!
//! Every field is optional in the file; missing fields take the
//! defaults below. A minimal file looks like:
//!
//! ```toml
//! search_terms = ["paris", "rome"]
//! page_size = 250
//! ```

use std::path::{Path, PathBuf};

use photo_scraper_photo_models::SearchTerm;
use serde::Deserialize;

use crate::ScrapeError;
use crate::pool::host_parallelism;

/// Search terms used when neither the CLI nor the config names any.
pub const DEFAULT_SEARCH_TERMS: &[&str] = &["paris", "rome", "new york"];

/// Extras requested from the photo-search service by default.
pub const DEFAULT_EXTRAS: &str = "geo";

/// Settings for one scrape run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScrapeConfig {
    /// Search terms, in submission order.
    pub search_terms: Vec<String>,
    /// Photos requested per page. Clamped to the service maximum.
    pub page_size: u32,
    /// Comma-separated extras passed to the search service.
    pub extras: String,
    /// Width of each worker pool. Defaults to the host's parallelism.
    pub workers: Option<usize>,
    /// Store location. Defaults to the data directory.
    pub db_path: Option<PathBuf>,
    /// Retries for transient HTTP failures against the search service.
    pub http_retries: u32,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            search_terms: DEFAULT_SEARCH_TERMS.iter().map(|&t| t.to_owned()).collect(),
            page_size: photo_scraper_source::MAX_PAGE_SIZE,
            extras: DEFAULT_EXTRAS.to_owned(),
            workers: None,
            db_path: None,
            http_retries: 3,
        }
    }
}

impl ScrapeConfig {
    /// Reads a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Io`] if the file cannot be read, or
    /// [`ScrapeError::Toml`] if it is not a valid config.
    pub fn load(path: &Path) -> Result<Self, ScrapeError> {
        log::debug!("Loading config from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parses a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Toml`] if the text is not a valid config.
    pub fn from_toml_str(text: &str) -> Result<Self, ScrapeError> {
        Ok(toml::from_str(text)?)
    }

    /// Worker pool width, falling back to the host's parallelism.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(host_parallelism).max(1)
    }

    /// Search terms as typed values. Blank entries are dropped.
    #[must_use]
    pub fn search_terms(&self) -> Vec<SearchTerm> {
        self.search_terms
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(SearchTerm::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = ScrapeConfig::from_toml_str("").unwrap();
        assert_eq!(config, ScrapeConfig::default());
        assert_eq!(config.page_size, 500);
        assert_eq!(config.extras, "geo");
        assert_eq!(
            config.search_terms(),
            vec![
                SearchTerm::from("paris"),
                SearchTerm::from("rome"),
                SearchTerm::from("new york"),
            ]
        );
    }

    #[test]
    fn partial_file_overrides_named_fields() {
        let config = ScrapeConfig::from_toml_str(
            r#"
            search_terms = ["oslo", "  ", "lima"]
            page_size = 50
            workers = 3
            db_path = "/tmp/photos.duckdb"
            "#,
        )
        .unwrap();

        assert_eq!(
            config.search_terms(),
            vec![SearchTerm::from("oslo"), SearchTerm::from("lima")]
        );
        assert_eq!(config.page_size, 50);
        assert_eq!(config.worker_count(), 3);
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/photos.duckdb")));
        assert_eq!(config.extras, "geo");
        assert_eq!(config.http_retries, 3);
    }

    #[test]
    fn zero_workers_still_runs_one() {
        let config = ScrapeConfig {
            workers: Some(0),
            ..ScrapeConfig::default()
        };
        assert_eq!(config.worker_count(), 1);
    }

    #[test]
    fn unknown_field_is_rejected() {
        assert!(matches!(
            ScrapeConfig::from_toml_str("page_sise = 10"),
            Err(ScrapeError::Toml(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            ScrapeConfig::load(Path::new("/nonexistent/photo_scraper.toml")),
            Err(ScrapeError::Io(_))
        ));
    }
}
