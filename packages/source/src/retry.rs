//! HTTP retry helpers for transient errors.
//!
//! Remote clients should use [`send_json`] instead of calling
//! `reqwest::RequestBuilder::send()` directly so every request gets
//! exponential backoff on timeouts, connection resets, HTTP 429, and
//! HTTP 5xx.
//!
//! These retries live in the client adapter only. A request that still
//! fails after `max_retries` attempts is returned to the caller, which
//! treats it as a single failed attempt.
//!
//! ```ignore
//! let body = retry::send_json(|| client.get(&url).query(&params), 3).await?;
//! ```

use std::time::Duration;

use crate::SourceError;

/// Default number of retry attempts for transient HTTP errors.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Sends an HTTP request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`] (builders are consumed by `.send()`).
///
/// Does **not** retry HTTP 4xx (except 429), and does not retry a body
/// that fails to parse as JSON.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails after all retries, the
/// server returns a non-retryable status, or the body is not JSON.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(build_request: F, max_retries: u32) -> Result<serde_json::Value, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(&build_request, max_retries).await?;
    let url = response.url().clone();
    let status = response.status();
    let text = response.text().await?;

    serde_json::from_str(&text).map_err(|e| {
        let preview: String = text.chars().take(BODY_PREVIEW_LEN).collect();
        log::error!(
            "JSON parse failed.\n  \
             url: {}\n  \
             status: {status}\n  \
             received: {} bytes\n  \
             parse error: {e}\n  \
             body preview: {preview}",
            redact(&url),
            text.len(),
        );
        SourceError::Json(e)
    })
}

/// Core retry loop.
///
/// Returns the successful [`reqwest::Response`] (status 2xx or 3xx).
#[allow(clippy::future_not_send)]
async fn send_inner<F>(build_request: &F, max_retries: u32) -> Result<reqwest::Response, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = backoff(attempt);
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }
        let can_retry = attempt < max_retries;
        attempt += 1;

        let response = match build_request().send().await {
            Ok(response) => response,
            Err(e) if is_transient(&e) && can_retry => {
                log::warn!("  transient error: {}", e.without_url());
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            if can_retry {
                log::warn!("  HTTP {status}");
                continue;
            }
            return Err(SourceError::Status {
                message: format!("HTTP {status} after {max_retries} retries"),
            });
        }

        if status.is_client_error() {
            return Err(SourceError::Status {
                message: format!("HTTP {status}"),
            });
        }

        return Ok(response);
    }
}

/// Exponential backoff: 2s, 4s, 8s, ... capped at 64s.
fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(6))
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}

/// Strips the query string so API keys never reach the logs.
fn redact(url: &reqwest::Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}
