//! Bounded-concurrency page image downloads.
//!
//! Both entry points keep at most `concurrency` downloads in flight, place
//! every result by its list position, and stop the whole batch on the first
//! failure.

use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::entities::{FetchResult, ImageRef};
use crate::domain::errors::{MdexError, MdexResult};
use crate::infrastructure::mangadex::ApiGateway;

/// Default number of concurrent image downloads.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Shared state of one download batch.
struct Batch {
    parent: CancellationToken,
    token: CancellationToken,
    first_error: OnceLock<MdexError>,
}

impl Batch {
    fn new(parent: &CancellationToken) -> Self {
        Self {
            parent: parent.clone(),
            token: parent.child_token(),
            first_error: OnceLock::new(),
        }
    }

    /// Records a failure. Only the first one is kept; it cancels the batch.
    fn fail(&self, err: MdexError) {
        let message = err.to_string();
        if self.first_error.set(err).is_ok() {
            warn!(error = %message, "Image batch failed, cancelling remaining downloads");
            self.token.cancel();
        }
    }

    fn fail_image(&self, index: usize, err: MdexError) {
        self.fail(MdexError::partial_fetch(index, err));
    }

    /// The error the batch reports, given a locally observed one.
    fn outcome(&self, observed: MdexError) -> MdexError {
        if self.parent.is_cancelled() {
            return MdexError::Cancelled;
        }
        self.first_error.get().cloned().unwrap_or(observed)
    }
}

/// Downloads the images of a chapter through the gateway's raw-bytes path.
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    gateway: Arc<ApiGateway>,
    concurrency: usize,
}

impl ImageFetcher {
    /// Creates a fetcher. A zero concurrency is raised to one.
    #[must_use]
    pub fn new(gateway: Arc<ApiGateway>, concurrency: usize) -> Self {
        Self {
            gateway,
            concurrency: concurrency.max(1),
        }
    }

    /// Fetches every image and returns the bytes in list order.
    ///
    /// # Errors
    /// Returns [`MdexError::PartialFetch`] wrapping the first failure, or
    /// [`MdexError::Cancelled`] if `cancel` fires. Successful results of a
    /// failed batch are discarded.
    pub async fn fetch_all(
        &self,
        images: &[ImageRef],
        cancel: &CancellationToken,
    ) -> MdexResult<Vec<Bytes>> {
        let batch = Arc::new(Batch::new(cancel));
        let slots: Arc<[OnceLock<Bytes>]> = images.iter().map(|_| OnceLock::new()).collect();
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (slot, image) in images.iter().enumerate() {
            let permit = tokio::select! {
                biased;
                () = batch.token.cancelled() => break,
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let gateway = Arc::clone(&self.gateway);
            let batch = Arc::clone(&batch);
            let slots = Arc::clone(&slots);
            let image = image.clone();

            tasks.spawn(async move {
                let _permit = permit;
                match gateway.fetch_bytes(&image.url, &batch.token).await {
                    Ok(bytes) => {
                        let _ = slots[slot].set(bytes);
                    }
                    Err(err) => batch.fail_image(image.index, err),
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                batch.fail(MdexError::network(format!("image task failed: {e}")));
            }
        }

        if cancel.is_cancelled() {
            return Err(MdexError::Cancelled);
        }
        if let Some(err) = batch.first_error.get() {
            return Err(err.clone());
        }

        let bytes = slots
            .iter()
            .map(|slot| slot.get().cloned())
            .collect::<Option<Vec<_>>>()
            .ok_or(MdexError::Cancelled)?;
        debug!(
            count = bytes.len(),
            concurrency = self.concurrency,
            "Fetched all images"
        );
        Ok(bytes)
    }

    /// Starts downloading in the background and streams results in list
    /// order over a bounded channel.
    ///
    /// The stream ends after the last image or after the first failed
    /// result, which carries the batch error. Dropping the receiver stops
    /// the batch.
    #[must_use]
    pub fn spawn_ordered(
        &self,
        images: Vec<ImageRef>,
        cancel: &CancellationToken,
    ) -> (mpsc::Receiver<FetchResult>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(self.concurrency);
        let batch = Arc::new(Batch::new(cancel));
        let concurrency = self.concurrency;

        let downloads = {
            let gateway = Arc::clone(&self.gateway);
            let batch = Arc::clone(&batch);
            stream::iter(images).map(move |image| {
                let gateway = Arc::clone(&gateway);
                let batch = Arc::clone(&batch);
                let index = image.index;
                let handle = tokio::spawn(async move {
                    let payload = gateway.fetch_bytes(&image.url, &batch.token).await;
                    if let Err(err) = &payload {
                        batch.fail_image(image.index, err.clone());
                    }
                    FetchResult::new(&image, payload)
                });
                async move { (index, handle.await) }
            })
        };

        let handle = tokio::spawn(async move {
            let mut results = downloads.buffered(concurrency);

            while let Some((index, joined)) = results.next().await {
                let mut result = joined.unwrap_or_else(|e| FetchResult {
                    index,
                    name: String::new(),
                    payload: Err(MdexError::network(format!("image task failed: {e}"))),
                });

                let failed = if let Err(err) = &result.payload {
                    let err = batch.outcome(err.clone());
                    batch.fail(err.clone());
                    result.payload = Err(err);
                    true
                } else {
                    false
                };

                if tx.send(result).await.is_err() || failed {
                    break;
                }
            }

            batch.token.cancel();
        });

        (rx, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::HttpTransport;
    use crate::infrastructure::cache::{CacheConfig, ResponseCache};
    use crate::infrastructure::mangadex::GatewayOptions;
    use crate::infrastructure::rate::RateLimiter;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;
    use tokio_test::{assert_err, assert_ok};

    /// Serves each url after a scripted delay and tracks parallelism.
    #[derive(Default)]
    struct ScriptedTransport {
        delays: HashMap<String, Duration>,
        failing: HashSet<String>,
        calls: AtomicUsize,
        in_flight: Arc<AtomicUsize>,
        peak: AtomicUsize,
    }

    struct InFlight(Arc<AtomicUsize>);

    impl Drop for InFlight {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn get(&self, url: &str, _accept: &str) -> MdexResult<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let _guard = InFlight(Arc::clone(&self.in_flight));

            let delay = self.delays.get(url).copied().unwrap_or_default();
            tokio::time::sleep(delay).await;

            if self.failing.contains(url) {
                Err(MdexError::upstream("500 Internal Server Error"))
            } else {
                Ok(Bytes::copy_from_slice(url.as_bytes()))
            }
        }
    }

    fn url(i: usize) -> String {
        format!("https://node.example/data/h/{i}.png")
    }

    fn refs(n: usize) -> Vec<ImageRef> {
        (0..n).map(|i| ImageRef::new(i, url(i))).collect()
    }

    fn fetcher(transport: Arc<ScriptedTransport>, concurrency: usize) -> ImageFetcher {
        let gateway = ApiGateway::new(
            transport,
            Arc::new(ResponseCache::new(CacheConfig::default()).unwrap()),
            Arc::new(RateLimiter::new(10.0, 10)),
            GatewayOptions::default(),
        )
        .unwrap();
        ImageFetcher::new(Arc::new(gateway), concurrency)
    }

    fn with_delays(ms: &[u64]) -> ScriptedTransport {
        ScriptedTransport {
            delays: ms
                .iter()
                .enumerate()
                .map(|(i, d)| (url(i), Duration::from_millis(*d)))
                .collect(),
            ..ScriptedTransport::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_all_keeps_list_order() {
        let transport = Arc::new(with_delays(&[30, 10, 20]));
        let fetcher = fetcher(Arc::clone(&transport), 3);

        let bytes = assert_ok!(fetcher.fetch_all(&refs(3), &CancellationToken::new()).await);

        let got: Vec<String> = bytes
            .iter()
            .map(|b| String::from_utf8(b.to_vec()).unwrap())
            .collect();
        assert_eq!(got, vec![url(0), url(1), url(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_all_caps_concurrency() {
        let transport = Arc::new(with_delays(&[10; 12]));
        let fetcher = fetcher(Arc::clone(&transport), 3);

        assert_ok!(fetcher.fetch_all(&refs(12), &CancellationToken::new()).await);

        assert_eq!(transport.calls.load(Ordering::SeqCst), 12);
        assert_eq!(transport.peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_all_first_failure_cancels_batch() {
        let mut transport = with_delays(&[100, 5, 100, 100, 100, 100]);
        transport.failing.insert(url(1));
        let transport = Arc::new(transport);
        let fetcher = fetcher(Arc::clone(&transport), 2);
        let start = Instant::now();

        let err = assert_err!(fetcher.fetch_all(&refs(6), &CancellationToken::new()).await);

        assert!(matches!(err, MdexError::PartialFetch { index: 1, .. }));
        assert!(err.is_upstream());
        assert!(start.elapsed() < Duration::from_millis(100));
        assert!(transport.calls.load(Ordering::SeqCst) < 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_all_parent_cancel() {
        let transport = Arc::new(with_delays(&[50, 50, 50]));
        let fetcher = fetcher(transport, 3);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let err = assert_err!(fetcher.fetch_all(&refs(3), &cancel).await);
        assert!(matches!(err, MdexError::Cancelled));
    }

    #[tokio::test]
    async fn test_fetch_all_empty_list() {
        let fetcher = fetcher(Arc::new(ScriptedTransport::default()), 3);
        let bytes = assert_ok!(fetcher.fetch_all(&[], &CancellationToken::new()).await);
        assert!(bytes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_ordered_streams_in_list_order() {
        let transport = Arc::new(with_delays(&[30, 10, 20, 5]));
        let fetcher = fetcher(Arc::clone(&transport), 2);

        let (mut rx, handle) = fetcher.spawn_ordered(refs(4), &CancellationToken::new());
        let mut indices = Vec::new();
        while let Some(result) = rx.recv().await {
            assert_ok!(&result.payload);
            indices.push(result.index);
        }
        assert_ok!(handle.await);

        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert!(transport.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_ordered_reports_first_failure_and_stops() {
        let mut transport = with_delays(&[100, 100, 5, 100]);
        transport.failing.insert(url(2));
        let fetcher = fetcher(Arc::new(transport), 4);

        let (mut rx, handle) = fetcher.spawn_ordered(refs(4), &CancellationToken::new());
        let mut received = Vec::new();
        while let Some(result) = rx.recv().await {
            received.push(result);
        }
        assert_ok!(handle.await);

        let last = received.last().unwrap();
        let err = last.payload.as_ref().unwrap_err();
        assert!(matches!(err, MdexError::PartialFetch { index: 2, .. }));
        assert!(received.iter().all(|r| r.payload.is_err()));
    }
}
