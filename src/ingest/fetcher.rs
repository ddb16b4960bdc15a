use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use super::parser::{self, RawEntry};
use crate::storage::{Source, SourceKind};

/// Fixed per-request deadline. Feeds that cannot answer in this window are
/// treated as failed for this run; the next run tries again.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Client identity sent with every feed request.
pub const USER_AGENT: &str = concat!("veille-feed-reader/", env!("CARGO_PKG_VERSION"));

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching and parsing one feed document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the 10-second timeout
    #[error("Request timed out")]
    Timeout,
    /// Document could not be parsed as a feed
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
}

/// Build the HTTP client used for feed fetches (distinct User-Agent).
pub fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().user_agent(USER_AGENT).build()
}

/// Fetch a source's feed document and parse it into raw entries.
///
/// The parse path branches on the source kind: article feeds go through the
/// generic RSS/Atom parser, video feeds through the extension-preserving
/// adapter. An empty-but-valid document yields `Ok(vec![])`.
///
/// # Errors
///
/// - [`FetchError::Timeout`] — no response within [`FETCH_TIMEOUT`]
/// - [`FetchError::Network`] — connection, DNS, or TLS failure
/// - [`FetchError::HttpStatus`] — non-2xx response
/// - [`FetchError::ResponseTooLarge`] — body over the size cap
/// - [`FetchError::Parse`] — response was not a parseable feed
pub async fn fetch_entries(
    client: &reqwest::Client,
    source: &Source,
) -> Result<Vec<RawEntry>, FetchError> {
    let response = tokio::time::timeout(FETCH_TIMEOUT, client.get(&source.url).send())
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(FetchError::Network)?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;

    let parsed = match source.kind {
        SourceKind::Article => parser::parse_article_feed(&bytes),
        SourceKind::Video => parser::parse_video_feed(&bytes),
    };
    parsed.map_err(|e| FetchError::Parse(e.to_string()))
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
