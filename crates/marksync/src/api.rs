//! Rate-limited JSON API client shared by the vendor adapters.
//!
//! Every call sleeps for a fixed pacing delay before each attempt, then
//! retries HTTP 429, 500, 502, 503, 504 and transport failures with
//! exponential backoff. Other non-2xx statuses fail immediately.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::http::{HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::retry::{RetryConfig, retry_after};

/// Statuses that are retried with backoff.
const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Error surfaced by an API call.
///
/// `status` is `None` when the failure happened below HTTP (connection
/// reset, timeout, DNS). Errors returned after the retry budget is spent
/// always carry `retryable: false`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("API error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
pub struct ApiError {
    pub status: Option<u16>,
    pub message: String,
    pub retryable: bool,
}

impl ApiError {
    /// Build an error from a non-success response.
    pub fn from_response(response: &HttpResponse) -> Self {
        let body = String::from_utf8_lossy(&response.body);
        let message = if body.trim().is_empty() {
            format!("HTTP {}", response.status)
        } else {
            truncate(body.trim(), 300)
        };
        Self {
            status: Some(response.status),
            message,
            retryable: Self::is_retryable_status(response.status),
        }
    }

    /// A transport-level failure.
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            retryable: true,
        }
    }

    /// A response that could not be decoded or a request that could not be encoded.
    pub fn invalid(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            retryable: false,
        }
    }

    #[inline]
    pub fn is_retryable_status(status: u16) -> bool {
        RETRYABLE_STATUSES.contains(&status)
    }

    /// Mark the error as final after the retry budget ran out.
    fn exhausted(self, attempts: u32) -> Self {
        Self {
            message: format!("{} (gave up after {} attempts)", self.message, attempts),
            retryable: false,
            ..self
        }
    }
}

/// Truncate on a char boundary.
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{head}...")
    }
}

/// Result type for API calls.
pub type Result<T> = std::result::Result<T, ApiError>;

/// JSON API client with pacing and retry.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    headers: HttpHeaders,
    pacing: Duration,
    retry: RetryConfig,
    name: &'static str,
}

impl ApiClient {
    /// Create a client for `base_url`.
    ///
    /// `name` only labels log records.
    pub fn new(
        name: &'static str,
        transport: Arc<dyn HttpTransport>,
        base_url: &str,
        headers: HttpHeaders,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            headers,
            pacing: Duration::ZERO,
            retry: RetryConfig::default(),
            name,
        }
    }

    /// Set the politeness delay applied before every attempt.
    #[must_use]
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    /// Perform a request, retrying retryable failures.
    pub async fn call(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse> {
        let url = self.url(path);
        let mut schedule = self.retry.schedule();
        let mut attempt: u32 = 0;

        let mut headers = self.headers.clone();
        if body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        let body = body.unwrap_or_default();

        loop {
            attempt += 1;
            if !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }

            tracing::debug!(
                api = self.name,
                method = method.as_str(),
                url = %url,
                attempt,
                "Sending request"
            );

            let request = HttpRequest {
                method,
                url: url.clone(),
                headers: headers.clone(),
                body: body.clone(),
            };

            let (error, hint) = match self.transport.send(request).await {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) => {
                    let error = ApiError::from_response(&response);
                    if !error.retryable {
                        tracing::debug!(
                            api = self.name,
                            status = response.status,
                            attempt,
                            "Request failed with non-retryable status"
                        );
                        return Err(error);
                    }
                    (error, retry_after(&response))
                }
                Err(e) => (ApiError::network(e.to_string()), None),
            };

            match schedule.next() {
                Some(computed) => {
                    let wait = self.retry.next_delay(computed, hint);
                    tracing::warn!(
                        api = self.name,
                        url = %url,
                        attempt,
                        status = ?error.status,
                        wait_ms = wait.as_millis() as u64,
                        "Retrying after error: {}",
                        error.message
                    );
                    tokio::time::sleep(wait).await;
                }
                None => {
                    tracing::warn!(
                        api = self.name,
                        url = %url,
                        attempt,
                        status = ?error.status,
                        "Retry budget exhausted"
                    );
                    return Err(error.exhausted(attempt));
                }
            }
        }
    }

    /// GET and decode a JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.call(HttpMethod::Get, path, None).await?;
        decode(&response)
    }

    /// Send a JSON body and decode the JSON reply.
    pub async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let payload =
            serde_json::to_vec(body).map_err(|e| ApiError::invalid(None, e.to_string()))?;
        let response = self.call(method, path, Some(payload)).await?;
        decode(&response)
    }
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    serde_json::from_slice(&response.body).map_err(|e| {
        ApiError::invalid(
            Some(response.status),
            format!("failed to decode response: {e}"),
        )
    })
}
