#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Core record types shared across the photo scraper.
//!
//! A [`RawPhoto`] is what the photo-search API hands back for a single
//! page entry. Once enriched it becomes an [`ImageRecord`], the row that
//! is persisted to the `image_metadata` table. [`GeoEntry`] rows cache
//! geocoding results per search text in the `geo_info` table.
//!
//! Coordinates are carried as decimal strings end to end. The string
//! [`SENTINEL`] (`"0"`) in either axis means the location is unknown.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Placeholder coordinate value meaning "geolocation unknown".
pub const SENTINEL: &str = "0";

/// Returns `true` if a coordinate string is the "geo unknown" sentinel.
#[must_use]
pub fn is_sentinel(value: &str) -> bool {
    value.trim() == SENTINEL
}

/// Free-text search key driving one independent fetch campaign.
///
/// No uniqueness is enforced: the same term may appear more than once in
/// a run and will simply be fetched twice.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchTerm(String);

impl SearchTerm {
    /// Creates a new search term.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Returns the raw search text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SearchTerm {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SearchTerm {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for SearchTerm {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A resolved latitude/longitude pair, stringified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in decimal degrees.
    pub latitude: String,
    /// Longitude in decimal degrees.
    pub longitude: String,
}

impl Coordinates {
    /// Builds coordinates from numeric degrees using the shortest
    /// round-trip representation (`41.9` becomes `"41.9"`).
    #[must_use]
    pub fn from_degrees(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: latitude.to_string(),
            longitude: longitude.to_string(),
        }
    }
}

/// A photo entry as returned by the remote photo-search API.
///
/// Only the four persisted fields are typed; any other field requested
/// via the `extras` parameter is kept verbatim in [`RawPhoto::extras`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawPhoto {
    /// Remote-assigned unique photo id.
    pub id: String,
    /// Photo title (may be empty).
    pub title: String,
    /// Latitude, or [`SENTINEL`] when the photo carries no geotag.
    pub latitude: String,
    /// Longitude, or [`SENTINEL`] when the photo carries no geotag.
    pub longitude: String,
    /// Remaining fields from the API response.
    pub extras: BTreeMap<String, serde_json::Value>,
}

impl RawPhoto {
    /// Builds a raw photo from one JSON object of a search response.
    ///
    /// `id` and `title` may be numbers or strings. Coordinates are run
    /// through [`coordinate_string`]. Returns `None` when the entry has
    /// no `id`.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        let id = scalar_string(object.get("id")?)?;
        let title = object
            .get("title")
            .and_then(scalar_string)
            .unwrap_or_default();
        let latitude = coordinate_string(object.get("latitude"));
        let longitude = coordinate_string(object.get("longitude"));

        let extras = object
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "id" | "title" | "latitude" | "longitude"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Some(Self {
            id,
            title,
            latitude,
            longitude,
            extras,
        })
    }

    /// Returns `true` if either axis holds the [`SENTINEL`] value.
    #[must_use]
    pub fn needs_geo(&self) -> bool {
        is_sentinel(&self.latitude) || is_sentinel(&self.longitude)
    }

    /// Overwrites both axes with resolved coordinates.
    pub fn apply_coordinates(&mut self, coordinates: Coordinates) {
        self.latitude = coordinates.latitude;
        self.longitude = coordinates.longitude;
    }

    /// Projects this photo onto the persisted `image_metadata` row.
    #[must_use]
    pub fn to_record(&self) -> ImageRecord {
        ImageRecord {
            id: self.id.clone(),
            title: self.title.clone(),
            latitude: self.latitude.clone(),
            longitude: self.longitude.clone(),
        }
    }
}

/// A persisted row in the `image_metadata` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Primary key, assigned by the remote source.
    pub id: String,
    /// Photo title.
    pub title: String,
    /// Latitude (may be [`SENTINEL`] if enrichment found nothing).
    pub latitude: String,
    /// Longitude (may be [`SENTINEL`] if enrichment found nothing).
    pub longitude: String,
}

/// A persisted row in the `geo_info` table, caching one geocode result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoEntry {
    /// Primary key: the free text that was geocoded.
    pub search_text: String,
    /// Resolved latitude.
    pub latitude: String,
    /// Resolved longitude.
    pub longitude: String,
}

impl GeoEntry {
    /// Creates a cache entry for `search_text`.
    #[must_use]
    pub fn new(search_text: &str, coordinates: &Coordinates) -> Self {
        Self {
            search_text: search_text.to_owned(),
            latitude: coordinates.latitude.clone(),
            longitude: coordinates.longitude.clone(),
        }
    }

    /// Returns the cached coordinates.
    #[must_use]
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude.clone(),
            longitude: self.longitude.clone(),
        }
    }
}

/// Normalizes a JSON coordinate into its string form.
///
/// Flickr reports missing geotags as the number `0`, and real ones as
/// either numbers or strings depending on the endpoint. Any zero value,
/// `null`, or a missing field maps to [`SENTINEL`].
#[must_use]
pub fn coordinate_string(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) if n.as_f64() == Some(0.0) => SENTINEL.to_owned(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => SENTINEL.to_owned(),
    }
}

fn scalar_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_detection() {
        assert!(is_sentinel("0"));
        assert!(is_sentinel(" 0 "));
        assert!(!is_sentinel("0.0001"));
        assert!(!is_sentinel("41.9"));
    }

    #[test]
    fn numeric_zero_coordinates_become_sentinel() {
        let photo = RawPhoto::from_json(&serde_json::json!({
            "id": "52812345",
            "title": "Colosseum",
            "latitude": 0,
            "longitude": 0.0,
            "owner": "someone@N01",
        }))
        .unwrap();

        assert_eq!(photo.latitude, SENTINEL);
        assert_eq!(photo.longitude, SENTINEL);
        assert!(photo.needs_geo());
        assert_eq!(photo.extras.len(), 1);
        assert!(photo.extras.contains_key("owner"));
    }

    #[test]
    fn string_coordinates_are_kept_verbatim() {
        let photo = RawPhoto::from_json(&serde_json::json!({
            "id": 7,
            "title": "Eiffel",
            "latitude": "48.858370",
            "longitude": 2.294481,
        }))
        .unwrap();

        assert_eq!(photo.id, "7");
        assert_eq!(photo.latitude, "48.858370");
        assert_eq!(photo.longitude, "2.294481");
        assert!(!photo.needs_geo());
    }

    #[test]
    fn single_sentinel_axis_needs_geo() {
        let photo = RawPhoto::from_json(&serde_json::json!({
            "id": "1",
            "latitude": "45.1",
            "longitude": "0",
        }))
        .unwrap();
        assert!(photo.needs_geo());
        assert_eq!(photo.title, "");
    }

    #[test]
    fn entry_without_id_is_rejected() {
        assert!(RawPhoto::from_json(&serde_json::json!({"title": "x"})).is_none());
        assert!(RawPhoto::from_json(&serde_json::json!([1, 2])).is_none());
    }

    #[test]
    fn degrees_use_shortest_representation() {
        let c = Coordinates::from_degrees(41.9, 12.5);
        assert_eq!(c.latitude, "41.9");
        assert_eq!(c.longitude, "12.5");
    }

    #[test]
    fn apply_coordinates_overwrites_both_axes() {
        let mut photo = RawPhoto::from_json(&serde_json::json!({
            "id": "A", "title": "t", "latitude": "0", "longitude": "0",
        }))
        .unwrap();
        photo.apply_coordinates(Coordinates::from_degrees(41.9, 12.5));

        let record = photo.to_record();
        assert_eq!(record.latitude, "41.9");
        assert_eq!(record.longitude, "12.5");
        assert_eq!(record.title, "t");
    }
}
