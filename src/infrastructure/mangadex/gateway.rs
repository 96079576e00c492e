//! Cache-fronted API gateway.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::errors::{MdexError, MdexResult};
use crate::domain::ports::HttpTransport;
use crate::infrastructure::cache::{CacheKey, QueryParams, ResponseCache, StoreOutcome};
use crate::infrastructure::rate::RateLimiter;

/// Production API host.
pub const API_URL: &str = "https://api.mangadex.org";
/// Development API host, used in place of [`API_URL`] when enabled.
pub const DEV_API_URL: &str = "https://api.mangadex.dev";
/// Uploads host, used in place of the at-home base url when enabled.
pub const UPLOADS_URL: &str = "https://uploads.mangadex.org";

const JSON_ACCEPT: &str = "application/json";
const IMAGE_ACCEPT: &str = "image/png, image/jpeg";

/// Whether a query must pass the rate limiter on a cache miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Goes straight to the network.
    Open,
    /// Takes a limiter token first.
    Limited,
}

/// Gateway behaviour switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct GatewayOptions {
    /// Query [`DEV_API_URL`] instead of [`API_URL`].
    pub dev_api: bool,
    /// Skip image downloads entirely and return empty bodies.
    pub no_download: bool,
}

/// Runs `fut` unless `cancel` fires first.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> MdexResult<T>
where
    F: Future<Output = MdexResult<T>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(MdexError::Cancelled),
        result = fut => result,
    }
}

/// Issues one request per distinct `(path, query)` while its response is
/// cached, and decodes typed responses.
pub struct ApiGateway {
    transport: Arc<dyn HttpTransport>,
    cache: Arc<ResponseCache>,
    limiter: Arc<RateLimiter>,
    base_url: Url,
    no_download: bool,
}

impl std::fmt::Debug for ApiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiGateway")
            .field("base_url", &self.base_url.as_str())
            .field("no_download", &self.no_download)
            .finish_non_exhaustive()
    }
}

impl ApiGateway {
    /// Creates a gateway against the production or development host.
    ///
    /// # Errors
    /// Returns error if the host url cannot be parsed.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        cache: Arc<ResponseCache>,
        limiter: Arc<RateLimiter>,
        options: GatewayOptions,
    ) -> MdexResult<Self> {
        let host = if options.dev_api { DEV_API_URL } else { API_URL };
        let base_url = Url::parse(host).map_err(|e| MdexError::invalid_url(e.to_string()))?;
        Ok(Self {
            transport,
            cache,
            limiter,
            base_url,
            no_download: options.no_download,
        })
    }

    /// Replaces the API host.
    ///
    /// # Errors
    /// Returns error if `base_url` is not an absolute url.
    pub fn with_base_url(mut self, base_url: &str) -> MdexResult<Self> {
        self.base_url = Url::parse(base_url).map_err(|e| MdexError::invalid_url(e.to_string()))?;
        Ok(self)
    }

    /// The shared response cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Full url of an API request.
    #[must_use]
    pub fn request_url(&self, path: &str, params: &QueryParams) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(path.trim_start_matches('/'));
        if !params.is_empty() {
            url.set_query(Some(&params.encode()));
        }
        url
    }

    /// Queries an endpoint that is not rate limited.
    ///
    /// # Errors
    /// See [`ApiGateway::query_with`].
    pub async fn query<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &QueryParams,
        cancel: &CancellationToken,
    ) -> MdexResult<T> {
        self.query_with(path, params, Admission::Open, cancel).await
    }

    /// Queries an endpoint of the rate-limited family.
    ///
    /// # Errors
    /// See [`ApiGateway::query_with`].
    pub async fn query_limited<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &QueryParams,
        cancel: &CancellationToken,
    ) -> MdexResult<T> {
        self.query_with(path, params, Admission::Limited, cancel)
            .await
    }

    /// Resolves a query from the cache or the network and decodes it.
    ///
    /// A response that cannot be cached is still returned.
    ///
    /// # Errors
    /// Returns [`MdexError::Upstream`] for non-200 responses,
    /// [`MdexError::Decode`] for malformed bodies, and
    /// [`MdexError::Cancelled`] if `cancel` fires while waiting.
    pub async fn query_with<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &QueryParams,
        admission: Admission,
        cancel: &CancellationToken,
    ) -> MdexResult<T> {
        let key = CacheKey::new(path, params);

        let body = if let Some(cached) = self.cache.get(&key) {
            info!(key = %key, "Loading cached API response");
            cached
        } else {
            let url = self.request_url(path, params);

            if admission == Admission::Limited {
                self.limiter.acquire(cancel).await?;
            }

            info!(url = %url, "Querying API");
            let body = cancellable(cancel, self.transport.get(url.as_str(), JSON_ACCEPT)).await?;
            self.store(key, body.clone());
            body
        };

        serde_json::from_slice(&body)
            .map_err(|e| MdexError::decode(e.to_string()))
    }

    fn store(&self, key: CacheKey, body: Bytes) {
        match self.cache.set(key, body) {
            Ok(StoreOutcome::Stored) => {}
            Ok(StoreOutcome::Rejected) => debug!("Response too large to cache"),
            Err(e) => {
                let err = MdexError::cache_write(e.to_string());
                warn!(error = %err, "Continuing with uncached response");
            }
        }
    }

    /// Downloads raw bytes, bypassing the cache and decoding.
    ///
    /// With `no_download` set this returns an empty body without any request.
    ///
    /// # Errors
    /// Returns [`MdexError::Upstream`] for non-200 responses and
    /// [`MdexError::Cancelled`] if `cancel` fires first.
    pub async fn fetch_bytes(&self, url: &str, cancel: &CancellationToken) -> MdexResult<Bytes> {
        if self.no_download {
            warn!(url = %url, "no-download option enabled");
            return Ok(Bytes::new());
        }

        info!(url = %url, "Querying image");
        let bytes = cancellable(cancel, self.transport.get(url, IMAGE_ACCEPT)).await?;
        debug!(url = %url, size = bytes.len(), "Finished image download");
        Ok(bytes)
    }
}
