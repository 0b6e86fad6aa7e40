//! HTTP client for Tor directory ports
//!
//! Requests are spread round-robin over the configured endpoints. Responses
//! are classified the way the crawler's retry logic expects:
//!
//! | Condition | Result |
//! |-----------|--------|
//! | 2xx | Body bytes |
//! | 404, 410, other 4xx | `FetchError::Permanent` |
//! | 408, 429 | `FetchError::Transient` |
//! | 5xx | `FetchError::Transient` |
//! | Timeout, connection error, body read error | `FetchError::Transient` |

use crate::config::{DirectoryConfig, UserAgentConfig};
use crate::plugin::FetchError;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Builds an HTTP client for directory requests
///
/// The user agent has the form `CrawlerName/Version (+ContactURL; ContactEmail)`.
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    let user_agent = format!(
        "{}/{} (+{}; {})",
        user_agent.crawler_name,
        user_agent.crawler_version,
        user_agent.contact_url,
        user_agent.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Directory port client shared by the built-in plugins
pub struct DirPortClient {
    client: Client,
    endpoints: Vec<String>,
    next: AtomicUsize,
}

impl DirPortClient {
    pub fn new(
        user_agent: &UserAgentConfig,
        directory: &DirectoryConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = build_http_client(user_agent, Duration::from_secs(directory.timeout))?;
        Ok(Self::with_client(client, directory.endpoints.clone()))
    }

    pub fn with_client(client: Client, endpoints: Vec<String>) -> Self {
        Self {
            client,
            endpoints,
            next: AtomicUsize::new(0),
        }
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    fn next_endpoint(&self) -> Option<&str> {
        if self.endpoints.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        Some(&self.endpoints[index])
    }

    /// Downloads `path` from the next endpoint in rotation
    pub async fn get(&self, path: &str) -> Result<Bytes, FetchError> {
        let endpoint = self
            .next_endpoint()
            .ok_or_else(|| FetchError::permanent("no directory endpoints configured"))?;
        self.get_from(endpoint, path).await
    }

    /// Downloads `path` from one particular `host:port` endpoint
    pub async fn get_from(&self, endpoint: &str, path: &str) -> Result<Bytes, FetchError> {
        let url = format!("http://{}{}", endpoint, path);

        tracing::trace!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| classify_error(&url, &e))?;

        if let Some(error) = classify_status(response.status()) {
            return Err(match error {
                FetchError::Transient(msg) => FetchError::Transient(format!("{}: {}", url, msg)),
                FetchError::Permanent(msg) => FetchError::Permanent(format!("{}: {}", url, msg)),
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| FetchError::transient(format!("{}: failed to read body: {}", url, e)))
    }
}

/// Maps a non-success status to a fetch error
pub fn classify_status(status: StatusCode) -> Option<FetchError> {
    if status.is_success() {
        None
    } else if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        Some(FetchError::transient(format!("HTTP {}", status.as_u16())))
    } else {
        Some(FetchError::permanent(format!("HTTP {}", status.as_u16())))
    }
}

fn classify_error(url: &str, error: &reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::transient(format!("{}: timed out", url))
    } else if error.is_connect() {
        FetchError::transient(format!("{}: connection failed: {}", url, error))
    } else if error.is_builder() {
        FetchError::permanent(format!("{}: invalid request: {}", url, error))
    } else {
        FetchError::transient(format!("{}: {}", url, error))
    }
}
