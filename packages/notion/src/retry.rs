//! HTTP retry helpers for Notion API calls.
//!
//! Every request goes through [`send_json`], which re-sends on transient
//! failures (timeouts, connection resets, HTTP 5xx, HTTP 429) with
//! exponential backoff. Client errors other than 429 are permanent and
//! are returned immediately with the message from Notion's error body.
//!
//! ```ignore
//! let body = retry::send_json(&RetryPolicy::default(), || client.get(&url)).await?;
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::NotionError;

/// Maximum length of a response body preview included in logs.
const BODY_PREVIEW_LEN: usize = 300;

/// How often and how patiently to re-send a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, used for writes.
    pub const NO_RETRY: Self = Self {
        max_retries: 0,
        base_delay: Duration::ZERO,
    };

    /// Backoff before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
    }
}

/// Error body returned by the Notion API.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

fn preview(text: &str) -> &str {
    let mut end = text.len().min(BODY_PREVIEW_LEN);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Sends a request and parses the response body as JSON.
///
/// `build_request` is called once per attempt since builders are consumed
/// by `send()`.
///
/// # Errors
///
/// Returns [`NotionError::Status`] for a non-retryable or exhausted error
/// status, [`NotionError::Http`] for transport failures, or
/// [`NotionError::Decode`] if the body is not JSON.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(
    policy: &RetryPolicy,
    build_request: F,
) -> Result<serde_json::Value, NotionError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(policy, &build_request).await?;
    let url = response.url().to_string();
    let text = response.text().await?;

    serde_json::from_str(&text).map_err(|e| {
        log::error!(
            "JSON parse failed for {url}: {e}\n  body preview: {}",
            preview(&text)
        );
        NotionError::Decode {
            message: format!("invalid JSON from {url}: {e}"),
        }
    })
}

async fn status_error(response: reqwest::Response) -> NotionError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiErrorBody>(&text) {
        Ok(body) if !body.message.is_empty() => format!("{} ({})", body.message, body.code),
        _ => preview(&text).to_owned(),
    };
    NotionError::Status {
        status: status.as_u16(),
        message,
    }
}

#[allow(clippy::future_not_send)]
async fn send_inner<F>(
    policy: &RetryPolicy,
    build_request: &F,
) -> Result<reqwest::Response, NotionError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = policy.delay_for(attempt);
            log::warn!("  retry {attempt}/{} in {delay:?}...", policy.max_retries);
            tokio::time::sleep(delay).await;
        }
        let can_retry = attempt < policy.max_retries;
        attempt += 1;

        let response = match build_request().send().await {
            Ok(response) => response,
            Err(e) if is_transient(&e) && can_retry => {
                log::warn!("  transient error: {e}");
                continue;
            }
            Err(e) => return Err(NotionError::Http(e)),
        };

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            if can_retry {
                log::warn!("  HTTP {status}");
                continue;
            }
            return Err(status_error(response).await);
        }

        if status.is_client_error() {
            return Err(status_error(response).await);
        }

        return Ok(response);
    }
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}
