//! Google Geocoding API client.
//!
//! Free-text queries go to the JSON endpoint with the `address`
//! parameter. The response carries a `status` field alongside the
//! `results` array:
//!
//! - `OK` returns every `results[].geometry.location`
//! - `ZERO_RESULTS` returns an empty list
//! - `OVER_QUERY_LIMIT` returns [`GeocodeError::RateLimited`]
//! - anything else returns [`GeocodeError::Api`]
//!
//! See <https://developers.google.com/maps/documentation/geocoding/requests-geocoding>

use async_trait::async_trait;

use crate::{GeocodeError, GeocodeMatch, Geocoder};

/// Default Google Geocoding JSON endpoint.
pub const GOOGLE_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Environment variable holding the Google Maps API key.
pub const API_KEY_ENV: &str = "GOOGLE_MAPS_API_KEY";

/// [`Geocoder`] implementation backed by the Google Geocoding API.
#[derive(Debug, Clone)]
pub struct GoogleGeocoder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoogleGeocoder {
    /// Creates a geocoder for the public Google endpoint.
    #[must_use]
    pub fn new(api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: GOOGLE_GEOCODE_URL.to_owned(),
            api_key: api_key.to_owned(),
        }
    }

    /// Creates a geocoder using the key in [`API_KEY_ENV`].
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Config`] if the variable is unset or empty.
    pub fn from_env() -> Result<Self, GeocodeError> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key.trim())),
            _ => Err(GeocodeError::Config {
                message: format!("{API_KEY_ENV} is not set"),
            }),
        }
    }

    /// Overrides the endpoint (for proxies or test servers).
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_owned();
        self
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn geocode(&self, text: &str) -> Result<Vec<GeocodeMatch>, GeocodeError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("address", text), ("key", self.api_key.as_str())])
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }

        let body: serde_json::Value = resp.error_for_status()?.json().await?;
        parse_response(&body)
    }
}

/// Parses a Google Geocoding JSON response.
fn parse_response(body: &serde_json::Value) -> Result<Vec<GeocodeMatch>, GeocodeError> {
    let status = body["status"].as_str().ok_or_else(|| GeocodeError::Parse {
        message: "Google response has no status".to_string(),
    })?;

    match status {
        "OK" => {}
        "ZERO_RESULTS" => return Ok(Vec::new()),
        "OVER_QUERY_LIMIT" => return Err(GeocodeError::RateLimited),
        other => {
            return Err(GeocodeError::Api {
                status: other.to_string(),
                message: body["error_message"].as_str().unwrap_or_default().to_string(),
            });
        }
    }

    let results = body["results"]
        .as_array()
        .ok_or_else(|| GeocodeError::Parse {
            message: "Google results is not an array".to_string(),
        })?;

    results
        .iter()
        .map(|result| {
            let location = &result["geometry"]["location"];
            let latitude = location["lat"].as_f64().ok_or_else(|| GeocodeError::Parse {
                message: "Missing lat in Google response".to_string(),
            })?;
            let longitude = location["lng"].as_f64().ok_or_else(|| GeocodeError::Parse {
                message: "Missing lng in Google response".to_string(),
            })?;

            Ok(GeocodeMatch {
                latitude,
                longitude,
                formatted_address: result["formatted_address"].as_str().map(String::from),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_google_result() {
        let body = serde_json::json!({
            "results": [
                {
                    "formatted_address": "Rome, Metropolitan City of Rome Capital, Italy",
                    "geometry": {"location": {"lat": 41.9027835, "lng": 12.4963655}}
                },
                {
                    "formatted_address": "Rome, GA, USA",
                    "geometry": {"location": {"lat": 34.257038, "lng": -85.164673}}
                }
            ],
            "status": "OK"
        });

        let matches = parse_response(&body).unwrap();
        assert_eq!(matches.len(), 2);
        assert!((matches[0].latitude - 41.902_783_5).abs() < 1e-6);
        assert!((matches[0].longitude - 12.496_365_5).abs() < 1e-6);
        assert_eq!(
            matches[1].formatted_address.as_deref(),
            Some("Rome, GA, USA")
        );
    }

    #[test]
    fn zero_results_is_empty() {
        let body = serde_json::json!({"results": [], "status": "ZERO_RESULTS"});
        assert!(parse_response(&body).unwrap().is_empty());
    }

    #[test]
    fn over_query_limit_is_rate_limited() {
        let body = serde_json::json!({"results": [], "status": "OVER_QUERY_LIMIT"});
        assert!(matches!(
            parse_response(&body),
            Err(GeocodeError::RateLimited)
        ));
    }

    #[test]
    fn request_denied_is_api_error() {
        let body = serde_json::json!({
            "results": [],
            "status": "REQUEST_DENIED",
            "error_message": "The provided API key is invalid."
        });
        match parse_response(&body) {
            Err(GeocodeError::Api { status, message }) => {
                assert_eq!(status, "REQUEST_DENIED");
                assert!(message.contains("invalid"));
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[test]
    fn missing_location_is_parse_error() {
        let body = serde_json::json!({"results": [{"geometry": {}}], "status": "OK"});
        assert!(matches!(
            parse_response(&body),
            Err(GeocodeError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn transport_error_does_not_carry_api_key() {
        let geocoder =
            GoogleGeocoder::new("SECRET_KEY_123").with_base_url("http://127.0.0.1:1/geocode");

        let err = geocoder.geocode("rome").await.unwrap_err();

        assert!(matches!(err, GeocodeError::Http(_)));
        assert!(!err.to_string().contains("SECRET_KEY_123"), "{err}");
        assert!(!format!("{err:?}").contains("SECRET_KEY_123"));
    }
}
