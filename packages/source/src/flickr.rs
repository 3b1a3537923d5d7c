//! Flickr REST API client (`flickr.photos.search`).
//!
//! See <https://www.flickr.com/services/api/flickr.photos.search.html>
//!
//! Responses are requested as bare JSON (`format=json&nojsoncallback=1`):
//!
//! ```json
//! {"photos": {"page": 1, "pages": 21, "perpage": 100,
//!             "photo": [{"id": "...", "title": "...", "latitude": 0, ...}]},
//!  "stat": "ok"}
//! ```

use async_trait::async_trait;
use photo_scraper_photo_models::RawPhoto;

use crate::retry::{self, DEFAULT_MAX_RETRIES};
use crate::{PhotoSearch, SearchPage, SearchQuery, SourceError};

/// Default Flickr REST endpoint.
pub const FLICKR_REST_URL: &str = "https://api.flickr.com/services/rest/";

/// Environment variable holding the Flickr API key.
pub const API_KEY_ENV: &str = "FLICKR_API_KEY";

/// [`PhotoSearch`] implementation backed by Flickr.
#[derive(Debug, Clone)]
pub struct FlickrClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

impl FlickrClient {
    /// Creates a client for the public Flickr endpoint.
    #[must_use]
    pub fn new(api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: FLICKR_REST_URL.to_owned(),
            api_key: api_key.to_owned(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Creates a client using the key in [`API_KEY_ENV`].
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the variable is unset or empty.
    pub fn from_env() -> Result<Self, SourceError> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key.trim())),
            _ => Err(SourceError::Config {
                message: format!("{API_KEY_ENV} is not set"),
            }),
        }
    }

    /// Overrides the REST endpoint (for proxies or test servers).
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_owned();
        self
    }

    /// Sets how many times transient HTTP failures are retried.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn query_params(&self, query: SearchQuery<'_>) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("method", "flickr.photos.search".to_owned()),
            ("api_key", self.api_key.clone()),
            ("text", query.text.to_owned()),
            ("per_page", query.per_page.to_string()),
            ("format", "json".to_owned()),
            ("nojsoncallback", "1".to_owned()),
        ];
        if !query.extras.is_empty() {
            params.push(("extras", query.extras.to_owned()));
        }
        if let Some(page) = query.page {
            params.push(("page", page.to_string()));
        }
        params
    }
}

#[async_trait]
impl PhotoSearch for FlickrClient {
    async fn search(&self, query: SearchQuery<'_>) -> Result<SearchPage, SourceError> {
        let params = self.query_params(query);
        log::debug!(
            "Flickr search text={:?} page={:?} per_page={}",
            query.text,
            query.page,
            query.per_page
        );

        let body = retry::send_json(
            || self.client.get(&self.base_url).query(&params),
            self.max_retries,
        )
        .await?;

        parse_search_response(&body)
    }
}

/// Parses a `flickr.photos.search` JSON response.
///
/// Entries without an `id` are skipped with a warning.
///
/// # Errors
///
/// Returns [`SourceError::Api`] for `"stat": "fail"` envelopes and
/// [`SourceError::Parse`] when the `photos` object is malformed.
pub fn parse_search_response(body: &serde_json::Value) -> Result<SearchPage, SourceError> {
    if body["stat"].as_str() == Some("fail") {
        return Err(SourceError::Api {
            code: body["code"].as_i64().unwrap_or_default(),
            message: body["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_owned(),
        });
    }

    let photos = body
        .get("photos")
        .filter(|v| v.is_object())
        .ok_or_else(|| SourceError::Parse {
            message: "Flickr response is missing the photos object".to_owned(),
        })?;

    let page_count = as_u32(&photos["pages"]).ok_or_else(|| SourceError::Parse {
        message: format!("invalid page count: {}", photos["pages"]),
    })?;

    let entries = photos["photo"].as_array().ok_or_else(|| SourceError::Parse {
        message: "photos.photo is not an array".to_owned(),
    })?;

    let records = entries
        .iter()
        .filter_map(|entry| {
            let photo = RawPhoto::from_json(entry);
            if photo.is_none() {
                log::warn!("Skipping Flickr entry without id: {entry}");
            }
            photo
        })
        .collect();

    Ok(SearchPage {
        page_count,
        records,
    })
}

/// Accepts both numeric and string representations.
fn as_u32(value: &serde_json::Value) -> Option<u32> {
    value
        .as_u64()
        .or_else(|| value.as_str()?.parse::<u64>().ok())
        .and_then(|n| u32::try_from(n).ok())
}
