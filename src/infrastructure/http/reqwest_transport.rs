//! reqwest-backed HTTP transport.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, header};
use tracing::{debug, warn};

use crate::domain::errors::{MdexError, MdexResult};
use crate::domain::ports::HttpTransport;

/// `User-Agent` sent with every request, built from the package metadata.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP transport over a shared reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a transport with the default timeout.
    ///
    /// # Errors
    /// Returns error if HTTP client creation fails.
    pub fn new() -> MdexResult<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Creates a transport with a custom timeout.
    ///
    /// # Errors
    /// Returns error if HTTP client creation fails.
    pub fn with_timeout(timeout: Duration) -> MdexResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| MdexError::network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    fn map_send_error(e: &reqwest::Error) -> MdexError {
        warn!(error = %e, "Request failed");
        if e.is_timeout() {
            MdexError::network("request timed out")
        } else if e.is_connect() {
            MdexError::network("failed to connect")
        } else {
            MdexError::network(e.to_string())
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, accept: &str) -> MdexResult<Bytes> {
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, accept)
            .send()
            .await
            .map_err(|e| Self::map_send_error(&e))?;

        let status = response.status();
        if status != StatusCode::OK {
            debug!(url = %url, status = %status, "Upstream returned non-200 status");
            return Err(MdexError::upstream(status.to_string()));
        }

        response
            .bytes()
            .await
            .map_err(|e| MdexError::network(format!("failed to read body: {e}")))
    }
}
