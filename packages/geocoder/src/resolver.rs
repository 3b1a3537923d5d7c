//! Cache-first resolution of search text to coordinates.
//!
//! Concurrent callers may miss the cache for the same text at the same
//! time and each call the remote geocoder. That costs a few redundant
//! requests but never a corrupt cache: the write is an insert-if-absent,
//! so the first writer's row is the one kept.

use std::sync::Arc;

use photo_scraper_database::{DbError, RecordStore, Row};
use photo_scraper_photo_models::{Coordinates, GeoEntry};

use crate::{GeocodeError, Geocoder};

/// Errors from [`GeoResolver::resolve`].
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The remote geocoder failed.
    #[error("Geocoding failed: {0}")]
    Geocode(#[from] GeocodeError),

    /// Reading or writing the geo cache failed.
    #[error("Geo cache storage failed: {0}")]
    Storage(#[from] DbError),
}

/// Resolves free text to coordinates through the `geo_info` cache.
#[derive(Clone)]
pub struct GeoResolver {
    store: Arc<RecordStore>,
    geocoder: Arc<dyn Geocoder>,
}

impl GeoResolver {
    /// Creates a resolver over a shared store and geocoder.
    #[must_use]
    pub fn new(store: Arc<RecordStore>, geocoder: Arc<dyn Geocoder>) -> Self {
        Self { store, geocoder }
    }

    /// Returns the coordinates for `search_text`, or `None` if the
    /// geocoder has no match.
    ///
    /// A cache hit makes no remote call. On a miss the first match is
    /// cached under `search_text` and returned. Misses with no match are
    /// not cached.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Storage`] if the cache cannot be read or
    /// written, and [`ResolveError::Geocode`] if the remote call fails.
    pub async fn resolve(&self, search_text: &str) -> Result<Option<Coordinates>, ResolveError> {
        if let Some(entry) = self.store.get_geo(search_text)? {
            log::trace!("Geo cache hit for '{search_text}'");
            return Ok(Some(entry.coordinates()));
        }

        let matches = self.geocoder.geocode(search_text).await?;
        let Some(first) = matches.first() else {
            log::debug!("No geocode match for '{search_text}'");
            return Ok(None);
        };

        let coordinates = Coordinates::from_degrees(first.latitude, first.longitude);
        let inserted = self
            .store
            .insert_if_absent(&Row::Geo(GeoEntry::new(search_text, &coordinates)))?;

        if inserted {
            log::info!(
                "Cached geocode for '{search_text}': ({}, {})",
                coordinates.latitude,
                coordinates.longitude
            );
        } else {
            log::debug!("Geocode for '{search_text}' was cached by another worker");
        }

        Ok(Some(coordinates))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use photo_scraper_database::Table;

    use super::*;
    use crate::GeocodeMatch;

    struct FixedGeocoder {
        result: Option<(f64, f64)>,
        calls: AtomicUsize,
    }

    impl FixedGeocoder {
        fn new(result: Option<(f64, f64)>) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Geocoder for FixedGeocoder {
        async fn geocode(&self, _text: &str) -> Result<Vec<GeocodeMatch>, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .result
                .map(|(latitude, longitude)| GeocodeMatch {
                    latitude,
                    longitude,
                    formatted_address: None,
                })
                .into_iter()
                .collect())
        }
    }

    struct FailingGeocoder;

    #[async_trait]
    impl Geocoder for FailingGeocoder {
        async fn geocode(&self, _text: &str) -> Result<Vec<GeocodeMatch>, GeocodeError> {
            Err(GeocodeError::RateLimited)
        }
    }

    fn store() -> Arc<RecordStore> {
        Arc::new(RecordStore::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn second_resolve_hits_cache() {
        let store = store();
        let geocoder = FixedGeocoder::new(Some((48.8566, 2.3522)));
        let resolver = GeoResolver::new(store.clone(), geocoder.clone());

        let first = resolver.resolve("Paris").await.unwrap().unwrap();
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);

        let second = resolver.resolve("Paris").await.unwrap().unwrap();
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(second.latitude, "48.8566");
        assert_eq!(store.count(Table::GeoInfo).unwrap(), 1);
    }

    #[tokio::test]
    async fn no_match_returns_none_and_caches_nothing() {
        let store = store();
        let geocoder = FixedGeocoder::new(None);
        let resolver = GeoResolver::new(store.clone(), geocoder.clone());

        assert!(resolver.resolve("nowhere").await.unwrap().is_none());
        assert!(resolver.resolve("nowhere").await.unwrap().is_none());
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.count(Table::GeoInfo).unwrap(), 0);
    }

    #[tokio::test]
    async fn cached_row_wins_over_geocoder() {
        let store = store();
        store
            .insert_if_absent(&Row::Geo(GeoEntry {
                search_text: "rome".to_owned(),
                latitude: "1".to_owned(),
                longitude: "2".to_owned(),
            }))
            .unwrap();
        let geocoder = FixedGeocoder::new(Some((41.9, 12.5)));
        let resolver = GeoResolver::new(store, geocoder.clone());

        let coords = resolver.resolve("rome").await.unwrap().unwrap();
        assert_eq!(coords.latitude, "1");
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn geocoder_failure_is_reported() {
        let resolver = GeoResolver::new(store(), Arc::new(FailingGeocoder));
        assert!(matches!(
            resolver.resolve("rome").await,
            Err(ResolveError::Geocode(GeocodeError::RateLimited))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_cache_one_row() {
        let store = store();
        let geocoder = FixedGeocoder::new(Some((41.9, 12.5)));
        let resolver = GeoResolver::new(store.clone(), geocoder.clone());

        let mut set = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let resolver = resolver.clone();
            set.spawn(async move { resolver.resolve("rome").await });
        }
        while let Some(result) = set.join_next().await {
            let coords = result.unwrap().unwrap().unwrap();
            assert_eq!(coords.longitude, "12.5");
        }

        assert!(geocoder.calls.load(Ordering::SeqCst) >= 1);
        assert_eq!(store.count(Table::GeoInfo).unwrap(), 1);
    }
}
