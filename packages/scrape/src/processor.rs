//! Per-record enrichment and idempotent insertion.
//!
//! The existence check and the insert are two separate steps. Two workers
//! holding the same photo id can both pass the check; the store's
//! insert-if-absent then keeps exactly one row and reports the other
//! insert as [`ProcessOutcome::LostRace`].

use std::sync::Arc;

use photo_scraper_database::{DbError, RecordStore, Row, Table};
use photo_scraper_geocoder::{GeoResolver, GeocodeError, ResolveError};
use photo_scraper_photo_models::RawPhoto;

/// What happened to a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The id was already stored; nothing was looked up or written.
    Skipped,
    /// The row was written. `enriched` is `true` when its sentinel
    /// coordinates were replaced by a geocode result.
    Inserted {
        /// Whether coordinates came from the geo resolver.
        enriched: bool,
    },
    /// Another worker stored the same id between the check and the
    /// insert.
    LostRace,
}

/// Why a record could not be processed.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The geocoding service failed; the record was abandoned.
    #[error("Geocoding failed: {0}")]
    Geocode(#[from] GeocodeError),

    /// The local store failed. Fatal for the run.
    #[error("Storage failed: {0}")]
    Storage(#[from] DbError),
}

impl ProcessError {
    /// Returns `true` for storage failures.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<ResolveError> for ProcessError {
    fn from(value: ResolveError) -> Self {
        match value {
            ResolveError::Geocode(e) => Self::Geocode(e),
            ResolveError::Storage(e) => Self::Storage(e),
        }
    }
}

/// Turns raw photos into persisted `image_metadata` rows.
#[derive(Clone)]
pub struct RecordProcessor {
    store: Arc<RecordStore>,
    resolver: GeoResolver,
}

impl RecordProcessor {
    /// Creates a processor over the shared store and resolver.
    #[must_use]
    pub const fn new(store: Arc<RecordStore>, resolver: GeoResolver) -> Self {
        Self { store, resolver }
    }

    /// Processes one photo found by searching for `search_text`.
    ///
    /// 1. Skip if the id is already stored.
    /// 2. If either coordinate is the sentinel, resolve `search_text` and
    ///    use the result; with no match the sentinel values are kept.
    /// 3. Insert the row unless the id is present by then.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Geocode`] if the geocoder fails (the record
    /// is not stored), or [`ProcessError::Storage`] if the store fails.
    pub async fn process(
        &self,
        mut photo: RawPhoto,
        search_text: &str,
    ) -> Result<ProcessOutcome, ProcessError> {
        if self.store.exists(Table::ImageMetadata, &photo.id)? {
            log::trace!("Photo {} already stored, skipping", photo.id);
            return Ok(ProcessOutcome::Skipped);
        }

        let mut enriched = false;
        if photo.needs_geo() {
            if let Some(coordinates) = self.resolver.resolve(search_text).await? {
                photo.apply_coordinates(coordinates);
                enriched = true;
            } else {
                log::debug!(
                    "Photo {} has no geotag and '{search_text}' did not geocode; keeping sentinel",
                    photo.id
                );
            }
        }

        if self.store.insert_if_absent(&Row::Image(photo.to_record()))? {
            Ok(ProcessOutcome::Inserted { enriched })
        } else {
            log::debug!("Photo {} was stored by another worker", photo.id);
            Ok(ProcessOutcome::LostRace)
        }
    }
}
