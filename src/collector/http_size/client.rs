//! HTTP client for the response-size source.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, CONNECTION, HeaderMap, HeaderValue, USER_AGENT};

use crate::collector::{CollectError, FetchError, SourceClient};

/// User agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("collectord-http-size/", env!("CARGO_PKG_VERSION"));

/// Issues one `GET` per tick and reports the body size.
///
/// Compression is not negotiated, so the size is what the server sent.
#[derive(Debug, Clone)]
pub struct HttpSizeClient {
    url: String,
    client: Client,
}

impl HttpSizeClient {
    /// Build a client for `url`.
    ///
    /// `timeout` bounds the whole request; `None` means no deadline.
    ///
    /// # Errors
    /// Returns [`CollectError::Setup`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, CollectError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| CollectError::Setup(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl SourceClient for HttpSizeClient {
    type Response = i64;

    async fn fetch(&self) -> Result<i64, FetchError> {
        let request = self
            .client
            .get(&self.url)
            .build()
            .map_err(|e| FetchError::Permanent(format!("invalid request: {e}")))?;

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| FetchError::Transient(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transient(format!("failed to read body: {e}")))?;

        if status != reqwest::StatusCode::OK {
            return Err(FetchError::Transient(format!(
                "HTTP {} {:?}",
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            )));
        }

        tracing::trace!(url = %self.url, bytes = body.len(), "Response received");
        Ok(i64::try_from(body.len()).unwrap_or(i64::MAX))
    }
}
