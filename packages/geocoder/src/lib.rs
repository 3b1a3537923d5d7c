#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geocoding for photos that arrive without a geotag.
//!
//! The [`Geocoder`] trait is the seam to the remote service;
//! [`google::GoogleGeocoder`] implements it against the Google Geocoding
//! API. [`resolver::GeoResolver`] sits in front of any geocoder and
//! caches results per search text in the `geo_info` table, so each text
//! is normally geocoded once across all workers and across runs.

pub mod google;
pub mod resolver;

use async_trait::async_trait;
use thiserror::Error;

pub use resolver::{GeoResolver, ResolveError};

/// A single geocoding match.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeMatch {
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// The canonical address returned by the geocoder.
    pub formatted_address: Option<String>,
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed. The request URL (which carries the API key)
    /// is stripped on conversion.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// The service answered with an error status.
    #[error("Geocoding API error {status}: {message}")]
    Api {
        /// Service status string (e.g. `"REQUEST_DENIED"`).
        status: String,
        /// Error message from the service, if any.
        message: String,
    },

    /// Required configuration (e.g. an API key) is missing.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what is missing.
        message: String,
    },
}

impl From<reqwest::Error> for GeocodeError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value.without_url())
    }
}

/// A remote free-text geocoding service.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Geocodes `text`, returning every match in ranked order. An empty
    /// list means nothing matched.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the request fails or the response
    /// cannot be parsed.
    async fn geocode(&self, text: &str) -> Result<Vec<GeocodeMatch>, GeocodeError>;
}
