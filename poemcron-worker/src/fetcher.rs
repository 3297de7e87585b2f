/// Poem fetcher
///
/// Issues one authenticated GET against the sentence endpoint and turns the
/// JSON payload into a `NormalizedPoem`. There are no retries: a failed
/// attempt is reported to the caller and the run is abandoned.
///
/// # Request
///
/// ```text
/// GET https://v2.jinrishici.com/sentence
/// X-User-Token: <token>
/// ```
///
/// # Example
///
/// ```no_run
/// use poemcron_shared::config::HttpConfig;
/// use poemcron_worker::fetcher::{PoemFetcher, PoemSource};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = PoemFetcher::new("my-token", &HttpConfig::default())?;
/// let poem = fetcher.fetch().await?;
/// println!("{}: {}", poem.title, poem.content);
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use poemcron_shared::config::HttpConfig;
use poemcron_shared::models::poem::{NormalizedPoem, RawPoemResponse};
use std::time::Duration;
use thiserror::Error;

/// Header carrying the access token
pub const TOKEN_HEADER: &str = "X-User-Token";

/// Fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection refused, timeout, DNS failure or body read failure
    #[error("Poem request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Body is not the expected JSON shape
    #[error("Failed to decode poem body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Source of normalized poems
///
/// Implemented by `PoemFetcher` for the real endpoint; tests substitute
/// their own sources.
#[async_trait]
pub trait PoemSource: Send + Sync {
    /// Fetches and normalizes one poem
    async fn fetch(&self) -> Result<NormalizedPoem, FetchError>;
}

/// HTTP fetcher for the sentence endpoint
pub struct PoemFetcher {
    /// Reusable HTTP client
    client: reqwest::Client,

    /// Endpoint URL
    endpoint: String,

    /// Access token
    token: String,
}

impl PoemFetcher {
    /// Creates a new fetcher
    ///
    /// # Arguments
    ///
    /// * `token` - Access token sent in `X-User-Token`
    /// * `http` - Endpoint and timeout settings
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Transport` if the HTTP client cannot be built.
    pub fn new(token: impl Into<String>, http: &HttpConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(http.timeout_seconds))
            .user_agent(concat!("poemcron/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(PoemFetcher {
            client,
            endpoint: http.endpoint.clone(),
            token: token.into(),
        })
    }

    /// Returns the endpoint this fetcher calls
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PoemSource for PoemFetcher {
    async fn fetch(&self) -> Result<NormalizedPoem, FetchError> {
        let response = self
            .client
            .get(&self.endpoint)
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await?;

        tracing::info!(status = %response.status(), "Get poem status");

        let body = response.bytes().await?;
        decode_body(&body)
    }
}

/// Decodes a raw response body into a normalized poem
///
/// # Errors
///
/// Returns `FetchError::Decode` if the body is truncated, not JSON, or
/// missing any of the required fields.
pub fn decode_body(body: &[u8]) -> Result<NormalizedPoem, FetchError> {
    let raw: RawPoemResponse = serde_json::from_slice(body)?;

    if let Some(status) = raw.status.as_deref() {
        tracing::debug!(status, "Poem service status");
    }

    Ok(NormalizedPoem::from(&raw))
}
