//! Drives one run: acquire, aggregate, render, report.

use chrono::Utc;
use rpz_client::HttpFetcher;
use rpz_core::{
    AggregatedZone, Aggregator, BlocklistFetcher, ConfigError, DomainName, EventEmitter,
    EventSink, FetchError, Level, Phase, ProviderResult, RenderError, SourceDescriptor,
    TracingSink, ZoneArtifact,
};
use rpz_zone::ZoneRenderer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::debug;

use crate::provider::BlocklistProvider;
use crate::report::{RunReport, RunState, SourceReport};
use crate::settings::Settings;

/// Default upper bound on concurrent fetches
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Default whole-run fetch deadline
pub const DEFAULT_RUN_DEADLINE: Duration = Duration::from_secs(120);

/// Batch pipeline from configured sources to a published zone.
///
/// A `Pipeline` is reusable; every [`run`](Self::run) builds fresh
/// providers and a fresh zone.
pub struct Pipeline {
    sources: Vec<SourceDescriptor>,
    fetcher: Arc<dyn BlocklistFetcher>,
    renderer: ZoneRenderer,
    allowlist: Vec<DomainName>,
    max_concurrency: usize,
    run_deadline: Duration,
    sink: Arc<dyn EventSink>,
    clock: Option<i64>,
}

impl Pipeline {
    /// Start building a pipeline that fetches with `fetcher` and publishes
    /// through `renderer`
    #[must_use]
    pub fn builder(renderer: ZoneRenderer, fetcher: Arc<dyn BlocklistFetcher>) -> PipelineBuilder {
        PipelineBuilder::new(renderer, fetcher)
    }

    /// Build a pipeline from validated settings, fetching over HTTP(S)
    pub fn from_settings(settings: &Settings, sink: Arc<dyn EventSink>) -> Result<Self, ConfigError> {
        let fetcher = HttpFetcher::builder()
            .timeout(settings.fetch.timeout())
            .user_agent(settings.fetch.user_agent.clone())
            .retry(settings.fetch.retry_config())
            .build()?;

        Ok(Self::builder(ZoneRenderer::new(settings.zone.clone()), Arc::new(fetcher))
            .sources(settings.sources.clone())
            .allowlist(settings.allowlist_names()?)
            .max_concurrency(settings.pipeline.max_concurrency)
            .run_deadline(settings.pipeline.run_deadline())
            .sink(sink)
            .build())
    }

    /// Configured sources, enabled or not
    #[must_use]
    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    /// Execute one run and report its outcome.
    ///
    /// Never returns an error: every failure ends in a [`RunReport`] with
    /// state [`RunState::Failed`] and the previous zone left in place.
    pub async fn run(&self) -> RunReport {
        let events = EventEmitter::new(self.sink.clone());
        let mut run = Run::new(&events, self);

        // Fetching
        run.advance(RunState::Fetching);
        let results = self.acquire_all(&events).await;
        run.record_sources(&self.sources, &results);

        // Aggregating
        run.advance(RunState::Aggregating);
        let previous = self.renderer.previous_serial(&events);
        run.report.previous_serial = previous;

        let mut aggregator = Aggregator::new()
            .allowlist(self.allowlist.iter().cloned())
            .previous_serial(previous);
        if let Some(clock) = self.clock {
            aggregator = aggregator.clock(clock);
        }
        let zone = match aggregator.aggregate(&results, &events) {
            Ok(zone) => zone,
            Err(e) => return run.fail(&e),
        };
        run.record_zone(&zone);

        // Rendering
        run.advance(RunState::Rendering);
        match self.render(zone).await {
            Ok(artifact) => {
                events
                    .event(Phase::Rendering, Level::Info, "zone published")
                    .field("path", artifact.path.display().to_string())
                    .field("serial", artifact.serial)
                    .field("records", artifact.record_count)
                    .field("bytes", artifact.content.len())
                    .emit();
                run.report.records = Some(artifact.record_count);
                run.advance(RunState::Done);
                run.finish()
            }
            Err(e) => {
                events
                    .event(Phase::Rendering, Level::Error, "zone not published")
                    .field("error", e.to_string())
                    .emit();
                run.fail(&e)
            }
        }
    }

    /// Acquire every enabled source through a bounded pool.
    ///
    /// Sources still pending at the run deadline resolve as timeouts. Results
    /// keep the configuration order.
    async fn acquire_all(&self, events: &EventEmitter) -> Vec<ProviderResult> {
        let providers: Vec<BlocklistProvider> = self
            .sources
            .iter()
            .filter(|s| s.enabled)
            .map(|s| BlocklistProvider::new(s.clone(), self.fetcher.clone(), events.clone()))
            .collect();

        let workers = providers.len().min(self.max_concurrency).max(1);
        let semaphore = Arc::new(Semaphore::new(workers));
        let deadline = Instant::now() + self.run_deadline;
        debug!(sources = providers.len(), workers, "acquiring sources");

        let handles: Vec<_> = providers
            .iter()
            .map(|provider| {
                let provider = provider.clone();
                let semaphore = semaphore.clone();
                tokio::spawn(async move {
                    let work = async {
                        let _permit = semaphore.acquire().await.ok();
                        provider.result().await.clone()
                    };
                    match tokio::time::timeout_at(deadline, work).await {
                        Ok(result) => result,
                        Err(_) => provider.abandon(FetchError::Timeout),
                    }
                })
            })
            .collect();

        let joined = futures_util::future::join_all(handles).await;
        providers
            .iter()
            .zip(joined)
            .map(|(provider, joined)| {
                joined.unwrap_or_else(|e| {
                    provider.abandon(FetchError::Unreachable(format!("acquisition task failed: {e}")))
                })
            })
            .collect()
    }

    /// Render and publish off the async workers
    async fn render(&self, zone: AggregatedZone) -> Result<ZoneArtifact, RenderError> {
        let renderer = self.renderer.clone();
        let path = renderer.config().output_path.clone();
        tokio::task::spawn_blocking(move || renderer.render(&zone))
            .await
            .unwrap_or_else(|e| {
                Err(RenderError::IoFailure {
                    path,
                    source: std::io::Error::other(e.to_string()),
                })
            })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("sources", &self.sources.len())
            .field("renderer", &self.renderer)
            .field("allowlist", &self.allowlist.len())
            .field("max_concurrency", &self.max_concurrency)
            .field("run_deadline", &self.run_deadline)
            .finish_non_exhaustive()
    }
}

/// State of a run in progress
struct Run<'a> {
    events: &'a EventEmitter,
    state: RunState,
    started: std::time::Instant,
    report: RunReport,
}

impl<'a> Run<'a> {
    fn new(events: &'a EventEmitter, pipeline: &Pipeline) -> Self {
        Self {
            events,
            state: RunState::Idle,
            started: std::time::Instant::now(),
            report: RunReport {
                run_id: events.run_id(),
                state: RunState::Idle,
                started_at: Utc::now(),
                elapsed_ms: 0,
                sources: Vec::new(),
                attempted: 0,
                succeeded: 0,
                failed: 0,
                domains: 0,
                wildcards: 0,
                allowlisted: 0,
                passthrough: 0,
                previous_serial: None,
                serial: None,
                output_path: pipeline.renderer.config().output_path.clone(),
                records: None,
                error: None,
            },
        }
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(self.state.can_advance_to(next), "{} -> {next}", self.state);
        debug!(from = %self.state, to = %next, "run state");
        self.state = next;
    }

    /// `results` holds one entry per enabled source, in configuration order
    fn record_sources(&mut self, sources: &[SourceDescriptor], results: &[ProviderResult]) {
        let mut results_iter = results.iter();
        self.report.sources = sources
            .iter()
            .map(|source| {
                let result = if source.enabled { results_iter.next() } else { None };
                result.map_or_else(|| SourceReport::disabled(source), SourceReport::from_result)
            })
            .collect();
        self.report.attempted = results.len();
        self.report.succeeded = results.iter().filter(|r| r.is_success()).count();
        self.report.failed = results.len() - self.report.succeeded;
    }

    fn record_zone(&mut self, zone: &AggregatedZone) {
        self.report.domains = zone.domains().len();
        self.report.wildcards = zone.domains().wildcard_count();
        self.report.allowlisted = zone.allowlisted();
        self.report.passthrough = zone.passthrough().len();
        self.report.serial = Some(zone.serial());
    }

    fn fail(mut self, error: &dyn std::error::Error) -> RunReport {
        self.advance(RunState::Failed);
        self.report.error = Some(error.to_string());
        self.finish()
    }

    fn finish(mut self) -> RunReport {
        self.report.state = self.state;
        self.report.elapsed_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let level = if self.state == RunState::Done {
            Level::Info
        } else {
            Level::Error
        };
        let mut event = self
            .events
            .event(Phase::Finished, level, format!("run {}", self.state))
            .field("state", self.state.to_string())
            .field("attempted", self.report.attempted)
            .field("succeeded", self.report.succeeded)
            .field("failed", self.report.failed)
            .field("domains", self.report.domains)
            .field("elapsed_ms", self.report.elapsed_ms);
        if let Some(serial) = self.report.serial {
            event = event.field("serial", serial);
        }
        if let Some(error) = &self.report.error {
            event = event.field("error", error.as_str());
        }
        event.emit();

        self.report
    }
}

/// Builder for a [`Pipeline`]
pub struct PipelineBuilder {
    sources: Vec<SourceDescriptor>,
    fetcher: Arc<dyn BlocklistFetcher>,
    renderer: ZoneRenderer,
    allowlist: Vec<DomainName>,
    max_concurrency: usize,
    run_deadline: Duration,
    sink: Arc<dyn EventSink>,
    clock: Option<i64>,
}

impl PipelineBuilder {
    /// Builder with no sources, the tracing sink and default limits
    #[must_use]
    pub fn new(renderer: ZoneRenderer, fetcher: Arc<dyn BlocklistFetcher>) -> Self {
        Self {
            sources: Vec::new(),
            fetcher,
            renderer,
            allowlist: Vec::new(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            run_deadline: DEFAULT_RUN_DEADLINE,
            sink: Arc::new(TracingSink),
            clock: None,
        }
    }

    /// Sources in report order
    #[must_use]
    pub fn sources(mut self, sources: Vec<SourceDescriptor>) -> Self {
        self.sources = sources;
        self
    }

    /// Add one source
    #[must_use]
    pub fn source(mut self, source: SourceDescriptor) -> Self {
        self.sources.push(source);
        self
    }

    /// Names that are never blocked
    #[must_use]
    pub fn allowlist(mut self, names: Vec<DomainName>) -> Self {
        self.allowlist = names;
        self
    }

    /// Upper bound on concurrent fetches
    #[must_use]
    pub const fn max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Whole-run fetch deadline
    #[must_use]
    pub const fn run_deadline(mut self, deadline: Duration) -> Self {
        self.run_deadline = deadline;
        self
    }

    /// Event destination
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Fix the clock used for the serial (seconds since the epoch)
    #[must_use]
    pub const fn clock(mut self, epoch_seconds: i64) -> Self {
        self.clock = Some(epoch_seconds);
        self
    }

    /// Build the pipeline
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            sources: self.sources,
            fetcher: self.fetcher,
            renderer: self.renderer,
            allowlist: self.allowlist,
            max_concurrency: self.max_concurrency,
            run_deadline: self.run_deadline,
            sink: self.sink,
            clock: self.clock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::SourceStatus;
    use async_trait::async_trait;
    use rpz_client::RetryConfig;
    use rpz_core::{AttemptCounter, FormatKind, MemorySink, RawPayload};
    use rpz_zone::ZoneConfig;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Answers per source id after a delay, tracking concurrency
    #[derive(Default)]
    struct ScriptedFetcher {
        script: HashMap<String, (Duration, Result<&'static str, FetchError>)>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn answer(mut self, id: &str, delay_ms: u64, body: Result<&'static str, FetchError>) -> Self {
            self.script
                .insert(id.to_string(), (Duration::from_millis(delay_ms), body));
            self
        }
    }

    #[async_trait]
    impl BlocklistFetcher for ScriptedFetcher {
        async fn fetch(
            &self,
            source: &SourceDescriptor,
            attempts: &AttemptCounter,
            _events: &EventEmitter,
        ) -> Result<RawPayload, FetchError> {
            attempts.begin();
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let (delay, body) = self
                .script
                .get(&source.id)
                .cloned()
                .unwrap_or((Duration::ZERO, Err(FetchError::ClientRejected { status: 404 })));
            tokio::time::sleep(delay).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            body.map(|b| RawPayload::new(source.id.clone(), b.as_bytes().to_vec(), 200))
        }
    }

    fn list(id: &str) -> SourceDescriptor {
        SourceDescriptor::new(id, format!("https://lists.test/{id}"), FormatKind::DomainList)
    }

    fn renderer(dir: &Path) -> ZoneRenderer {
        ZoneRenderer::new(ZoneConfig::new(dir.join("adblock.rpz")))
    }

    fn zone_text(dir: &Path) -> String {
        std::fs::read_to_string(dir.join("adblock.rpz")).unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_partial_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hosts"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("# ad servers\n0.0.0.0 ads.example.com\n"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;
        // A list with no entries; a zero-byte body would be EmptyInput instead.
        Mock::given(method("GET"))
            .and(path("/empty"))
            .respond_with(ResponseTemplate::new(200).set_body_string("# no entries today\n"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("adblock.rpz"),
            "@ IN SOA localhost. hostmaster.localhost. ( 4000000000 3600 600 86400 300 )\n",
        )
        .unwrap();

        let fetcher = HttpFetcher::builder()
            .timeout(Duration::from_millis(200))
            .retry(RetryConfig::none())
            .build()
            .unwrap();
        let sink = Arc::new(MemorySink::default());
        let pipeline = Pipeline::builder(renderer(dir.path()), Arc::new(fetcher))
            .source(SourceDescriptor::new(
                "hosts",
                format!("{}/hosts", server.uri()),
                FormatKind::HostsFile,
            ))
            .source(SourceDescriptor::new(
                "slow",
                format!("{}/slow", server.uri()),
                FormatKind::DomainList,
            ))
            .source(SourceDescriptor::new(
                "empty",
                format!("{}/empty", server.uri()),
                FormatKind::DomainList,
            ))
            .sink(sink.clone())
            .build();

        let report = pipeline.run().await;

        assert_eq!(report.state, RunState::Done, "{:?}", report.error);
        assert_eq!(report.attempted, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.domains, 1);
        assert_eq!(report.previous_serial, Some(4_000_000_000));
        assert_eq!(report.serial, Some(4_000_000_001));

        let statuses: Vec<_> = report.sources.iter().map(|s| (s.id.as_str(), s.status)).collect();
        assert_eq!(
            statuses,
            vec![
                ("hosts", SourceStatus::Succeeded),
                ("slow", SourceStatus::Failed),
                ("empty", SourceStatus::Succeeded),
            ]
        );
        assert_eq!(report.sources[1].error.as_deref(), Some("fetch failed: request timed out"));
        assert_eq!(report.sources[2].domains, Some(0));

        let text = zone_text(dir.path());
        let records: Vec<&str> = text.lines().filter(|l| l.contains("CNAME")).collect();
        assert_eq!(records, vec!["ads.example.com CNAME ."]);
        assert!(text.contains("( 4000000001 "));

        let finished = sink.events_in(Phase::Finished);
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].run_id, report.run_id);
        assert_eq!(finished[0].level, Level::Info);
    }

    #[tokio::test]
    async fn test_all_sources_failed_keeps_previous_zone() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("adblock.rpz"), "previous zone\n").unwrap();

        let fetcher = ScriptedFetcher::default()
            .answer("a", 0, Err(FetchError::ServerRejected { status: 502 }))
            .answer("b", 0, Ok("   "));
        let pipeline = Pipeline::builder(renderer(dir.path()), Arc::new(fetcher))
            .sources(vec![list("a"), list("b")])
            .sink(Arc::new(MemorySink::default()))
            .build();

        let report = pipeline.run().await;

        assert_eq!(report.state, RunState::Failed);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.error.as_deref(), Some("all 2 sources failed"));
        assert_eq!(report.failed_sources().count(), 2);
        assert_eq!(report.serial, None);
        assert_eq!(zone_text(dir.path()), "previous zone\n");
    }

    #[tokio::test]
    async fn test_run_deadline_times_out_pending_sources() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ScriptedFetcher::default()
            .answer("fast", 0, Ok("ads.example.com\n"))
            .answer("stuck", 60_000, Ok("never.example.com\n"));
        let pipeline = Pipeline::builder(renderer(dir.path()), Arc::new(fetcher))
            .sources(vec![list("fast"), list("stuck")])
            .run_deadline(Duration::from_millis(100))
            .sink(Arc::new(MemorySink::default()))
            .build();

        let report = pipeline.run().await;

        assert_eq!(report.state, RunState::Done);
        let stuck = &report.sources[1];
        assert_eq!(stuck.status, SourceStatus::Failed);
        assert_eq!(stuck.attempts, 1);
        assert_eq!(stuck.error.as_deref(), Some("fetch failed: request timed out"));
        assert!(!zone_text(dir.path()).contains("never.example.com"));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let mut fetcher = ScriptedFetcher::default();
        let mut sources = Vec::new();
        for id in ["s1", "s2", "s3", "s4", "s5", "s6"] {
            fetcher = fetcher.answer(id, 20, Ok("ads.example.com\n"));
            sources.push(list(id));
        }
        let fetcher = Arc::new(fetcher);
        let pipeline = Pipeline::builder(renderer(dir.path()), fetcher.clone())
            .sources(sources)
            .max_concurrency(2)
            .sink(Arc::new(MemorySink::default()))
            .build();

        let report = pipeline.run().await;

        assert_eq!(report.succeeded, 6);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 6);
        assert!(fetcher.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_disabled_sources_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .answer("on", 0, Ok("ads.example.com\n"))
                .answer("off", 0, Ok("other.example.com\n")),
        );
        let mut off = list("off");
        off.enabled = false;
        let pipeline = Pipeline::builder(renderer(dir.path()), fetcher.clone())
            .sources(vec![off, list("on")])
            .sink(Arc::new(MemorySink::default()))
            .build();

        let report = pipeline.run().await;

        assert_eq!(report.attempted, 1);
        assert_eq!(report.sources[0].status, SourceStatus::Disabled);
        assert_eq!(report.sources[1].status, SourceStatus::Succeeded);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_allowlist_and_fixed_clock() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ScriptedFetcher::default()
            .answer("a", 0, Ok("ads.example.com\n*.tracker.net\nkeep.example.org\n"));
        let pipeline = Pipeline::builder(renderer(dir.path()), Arc::new(fetcher))
            .source(list("a"))
            .allowlist(vec![
                DomainName::parse("keep.example.org").unwrap(),
                DomainName::parse("cdn.tracker.net").unwrap(),
            ])
            .clock(1_750_000_000)
            .sink(Arc::new(MemorySink::default()))
            .build();

        let report = pipeline.run().await;

        assert_eq!(report.serial, Some(1_750_000_000));
        assert_eq!(report.allowlisted, 1);
        assert_eq!(report.passthrough, 1);
        let text = zone_text(dir.path());
        assert!(!text.contains("keep.example.org"));
        assert!(text.contains("cdn.tracker.net CNAME rpz-passthru.\n"));
    }

    #[tokio::test]
    async fn test_render_failure_fails_run() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("gone").join("adblock.rpz");
        let fetcher = ScriptedFetcher::default().answer("a", 0, Ok("ads.example.com\n"));
        let pipeline = Pipeline::builder(ZoneRenderer::new(ZoneConfig::new(&target)), Arc::new(fetcher))
            .source(list("a"))
            .sink(Arc::new(MemorySink::default()))
            .build();

        let report = pipeline.run().await;

        assert_eq!(report.state, RunState::Failed);
        assert!(report.serial.is_some());
        assert_eq!(report.records, None);
        assert!(report.error.unwrap().contains("failed to write zone file"));
        assert!(!target.exists());
    }
}
