//! One blocklist source: fetch, normalize, remember the outcome.

use rpz_core::{
    AcquireError, AttemptCounter, BlocklistFetcher, EventEmitter, FetchError, Level, Normalizer,
    Phase, ProviderResult, SourceDescriptor,
};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

/// Fetch `descriptor` and normalize the payload.
///
/// Never fails: a fetch or normalize error is captured in the returned
/// [`ProviderResult`] so one broken source cannot abort the run.
pub async fn acquire(
    descriptor: &SourceDescriptor,
    fetcher: &dyn BlocklistFetcher,
    normalizer: &Normalizer,
    attempts: &AttemptCounter,
    events: &EventEmitter,
) -> ProviderResult {
    let payload = match fetcher.fetch(descriptor, attempts, events).await {
        Ok(payload) => payload,
        Err(error) => {
            return ProviderResult::failed(
                descriptor.id.clone(),
                descriptor.trust_tier,
                attempts.get(),
                error,
            );
        }
    };

    let size = payload.len();
    match normalizer.normalize(&payload.bytes) {
        Ok(set) => {
            events
                .event(Phase::Normalizing, Level::Info, "source normalized")
                .source(&descriptor.id)
                .field("format", descriptor.format.as_str())
                .field("bytes", size)
                .field("domains", set.len())
                .field("wildcards", set.wildcard_count())
                .emit();
            ProviderResult::succeeded(
                descriptor.id.clone(),
                descriptor.trust_tier,
                attempts.get(),
                set,
            )
        }
        Err(error) => {
            events
                .event(Phase::Normalizing, Level::Warn, "source not normalizable")
                .source(&descriptor.id)
                .field("format", descriptor.format.as_str())
                .field("bytes", size)
                .field("error", error.to_string())
                .emit();
            ProviderResult::failed(
                descriptor.id.clone(),
                descriptor.trust_tier,
                attempts.get(),
                error,
            )
        }
    }
}

/// A source bound to its fetcher and normalizer.
///
/// The descriptor is fixed at construction. Acquisition is lazy: it starts
/// on the first [`result`](Self::result) call and runs at most once per
/// instance; later calls return the memoised outcome. Clones share that
/// outcome.
#[derive(Clone)]
pub struct BlocklistProvider {
    inner: Arc<ProviderInner>,
}

struct ProviderInner {
    descriptor: SourceDescriptor,
    normalizer: Normalizer,
    fetcher: Arc<dyn BlocklistFetcher>,
    events: EventEmitter,
    attempts: AttemptCounter,
    outcome: OnceCell<ProviderResult>,
}

impl BlocklistProvider {
    /// Bind `descriptor` to `fetcher`, normalizing with the descriptor's format
    #[must_use]
    pub fn new(
        descriptor: SourceDescriptor,
        fetcher: Arc<dyn BlocklistFetcher>,
        events: EventEmitter,
    ) -> Self {
        let normalizer = Normalizer::for_source(&descriptor);
        Self::with_normalizer(descriptor, fetcher, normalizer, events)
    }

    /// Bind `descriptor` to `fetcher` with an explicit normalizer
    #[must_use]
    pub fn with_normalizer(
        descriptor: SourceDescriptor,
        fetcher: Arc<dyn BlocklistFetcher>,
        normalizer: Normalizer,
        events: EventEmitter,
    ) -> Self {
        Self {
            inner: Arc::new(ProviderInner {
                descriptor,
                normalizer,
                fetcher,
                events,
                attempts: AttemptCounter::new(),
                outcome: OnceCell::new(),
            }),
        }
    }

    /// The source this provider acquires
    #[must_use]
    pub fn descriptor(&self) -> &SourceDescriptor {
        &self.inner.descriptor
    }

    /// HTTP attempts made so far
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.inner.attempts.get()
    }

    /// The outcome, if acquisition has finished
    #[must_use]
    pub fn peek(&self) -> Option<&ProviderResult> {
        self.inner.outcome.get()
    }

    /// Acquire on first call, then return the memoised outcome.
    ///
    /// Cancelling the returned future before it completes leaves the provider
    /// unresolved; see [`abandon`](Self::abandon).
    pub async fn result(&self) -> &ProviderResult {
        let inner = &self.inner;
        inner
            .outcome
            .get_or_init(|| {
                acquire(
                    &inner.descriptor,
                    inner.fetcher.as_ref(),
                    &inner.normalizer,
                    &inner.attempts,
                    &inner.events,
                )
            })
            .await
    }

    /// Start acquisition in the background right away
    pub fn prefetch(&self) -> JoinHandle<ProviderResult> {
        let provider = self.clone();
        tokio::spawn(async move { provider.result().await.clone() })
    }

    /// Resolve an unfinished acquisition as failed with `error`.
    ///
    /// Keeps the attempts made so far. Has no effect once an outcome exists.
    pub fn abandon(&self, error: FetchError) -> ProviderResult {
        let inner = &self.inner;
        if inner.outcome.get().is_none() {
            inner
                .events
                .event(Phase::Fetching, Level::Warn, "source abandoned")
                .source(&inner.descriptor.id)
                .field("attempts", inner.attempts.get())
                .field("error", error.to_string())
                .emit();
            let _ = inner.outcome.set(ProviderResult::failed(
                inner.descriptor.id.clone(),
                inner.descriptor.trust_tier,
                inner.attempts.get(),
                AcquireError::Fetch(error),
            ));
        }
        // A concurrent set may have won; either way the cell is filled now.
        inner.outcome.get().cloned().unwrap_or_else(|| {
            ProviderResult::failed(
                inner.descriptor.id.clone(),
                inner.descriptor.trust_tier,
                inner.attempts.get(),
                FetchError::Timeout,
            )
        })
    }
}

impl std::fmt::Debug for BlocklistProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlocklistProvider")
            .field("source", &self.inner.descriptor.id)
            .field("format", &self.inner.descriptor.format)
            .field("attempts", &self.inner.attempts.get())
            .field("resolved", &self.inner.outcome.initialized())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rpz_core::{FormatKind, MemorySink, NormalizeError, RawPayload};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Serves a fixed body and counts how often it was called
    struct StaticFetcher {
        body: Result<&'static str, FetchError>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl StaticFetcher {
        fn ok(body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                body: Ok(body),
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            })
        }

        fn err(error: FetchError) -> Arc<Self> {
            Arc::new(Self {
                body: Err(error),
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            })
        }
    }

    #[async_trait]
    impl BlocklistFetcher for StaticFetcher {
        async fn fetch(
            &self,
            source: &SourceDescriptor,
            attempts: &AttemptCounter,
            _events: &EventEmitter,
        ) -> Result<RawPayload, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            attempts.begin();
            tokio::time::sleep(self.delay).await;
            self.body
                .clone()
                .map(|body| RawPayload::new(source.id.clone(), body.as_bytes().to_vec(), 200))
        }
    }

    fn hosts_source() -> SourceDescriptor {
        SourceDescriptor::new("hosts", "https://lists.test/hosts", FormatKind::HostsFile)
    }

    #[tokio::test]
    async fn test_acquire_success() {
        let fetcher = StaticFetcher::ok("0.0.0.0 ads.example.com\n");
        let provider = BlocklistProvider::new(hosts_source(), fetcher, EventEmitter::null());

        let result = provider.result().await;
        assert!(result.is_success());
        assert_eq!(result.attempt_count(), 1);
        assert!(result.domain_set().unwrap().contains_str("ads.example.com"));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_captured() {
        let fetcher = StaticFetcher::err(FetchError::ClientRejected { status: 410 });
        let provider = BlocklistProvider::new(hosts_source(), fetcher, EventEmitter::null());

        let result = provider.result().await;
        assert!(result.domain_set().is_none());
        assert_eq!(
            result.error(),
            Some(&AcquireError::Fetch(FetchError::ClientRejected { status: 410 }))
        );
    }

    #[tokio::test]
    async fn test_normalize_failure_keeps_attempts() {
        let sink = Arc::new(MemorySink::default());
        let fetcher = StaticFetcher::ok("   \n");
        let provider =
            BlocklistProvider::new(hosts_source(), fetcher, EventEmitter::new(sink.clone()));

        let result = provider.result().await;
        assert_eq!(
            result.error(),
            Some(&AcquireError::Normalize(NormalizeError::EmptyInput))
        );
        assert_eq!(result.attempt_count(), 1);
        assert_eq!(sink.events_in(Phase::Normalizing)[0].level, Level::Warn);
    }

    #[tokio::test]
    async fn test_fetches_once_per_instance() {
        let fetcher = StaticFetcher::ok("ads.example.com\n");
        let source =
            SourceDescriptor::new("list", "https://lists.test/list", FormatKind::DomainList);
        let provider = BlocklistProvider::new(source, fetcher.clone(), EventEmitter::null());

        let clone = provider.clone();
        let (a, b) = tokio::join!(provider.result(), clone.result());
        assert_eq!(a.attempt_count(), b.attempt_count());
        let _ = provider.result().await;

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_prefetch_is_eager() {
        let fetcher = StaticFetcher::ok("0.0.0.0 tracker.example.net\n");
        let provider = BlocklistProvider::new(hosts_source(), fetcher.clone(), EventEmitter::null());

        let handle = provider.prefetch();
        let result = handle.await.unwrap();
        assert!(result.is_success());
        assert!(provider.peek().is_some());

        let _ = provider.result().await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abandon_after_cancelled_fetch() {
        let fetcher = Arc::new(StaticFetcher {
            body: Ok("ads.example.com\n"),
            calls: AtomicUsize::new(0),
            delay: Duration::from_secs(30),
        });
        let provider = BlocklistProvider::new(hosts_source(), fetcher, EventEmitter::null());

        let cancelled = tokio::time::timeout(Duration::from_millis(20), provider.result()).await;
        assert!(cancelled.is_err());

        let result = provider.abandon(FetchError::Timeout);
        assert_eq!(result.error(), Some(&AcquireError::Fetch(FetchError::Timeout)));
        assert_eq!(result.attempt_count(), 1);
        assert!(provider.result().await.error().is_some());
    }
}
