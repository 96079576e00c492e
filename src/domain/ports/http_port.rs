//! Port for outbound HTTP requests.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::errors::MdexResult;

/// Issues idempotent GET requests.
///
/// Implementations must return [`MdexError::Upstream`](crate::domain::errors::MdexError::Upstream)
/// for any status other than 200 and the full body otherwise.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Fetches `url` with the given `Accept` header value.
    async fn get(&self, url: &str, accept: &str) -> MdexResult<Bytes>;
}
