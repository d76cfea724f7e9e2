use crate::credentials::rotation_delta;
use crate::error::{CollectError, Result};
use crate::filter::dedupe;
use crate::orchestrator::{SearchOrchestrator, records_of, succeeded_providers, summarize};
use crate::providers::SearchProvider;
use crate::results::{ProviderOutcome, SourceKind};
use crate::session::{Phase, Query, QueryContext, SessionDocument, SessionStatus};
use crate::store::DocumentStore;
use chrono::{Datelike, Utc};
use futures::FutureExt;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::any::Any;
use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Observable progress of a spawned collection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CollectionStatus {
    Queued,
    Running { phase: Phase },
    Completed { status: SessionStatus, success: bool },
    Failed { message: String },
}

impl CollectionStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, CollectionStatus::Completed { .. } | CollectionStatus::Failed { .. })
    }
}

/// What to collect: an explicit query or one built from the market context
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRequest {
    pub query: Option<String>,
    pub context: QueryContext,
    pub session_id: String,
}

impl CollectionRequest {
    /// Request with a generated session id and a query derived from `context`
    pub fn from_context(context: QueryContext) -> Self {
        Self {
            query: None,
            context,
            session_id: new_session_id(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// `segment product <country> <year> <market>` unless a query was given
    pub fn to_query(&self) -> Result<Query> {
        if let Some(text) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            return Ok(Query::new(text, self.context.clone(), &self.session_id));
        }

        let segment = self.context.segment.trim();
        if segment.is_empty() {
            return Err(CollectError::Config(
                "a query or a market segment is required".to_string(),
            ));
        }

        let mut parts = vec![segment.to_string()];
        let product = self.context.product.trim();
        if !product.is_empty() {
            parts.push(product.to_string());
        }
        if let Some(country) = self.context.region().map(|r| country_name(&r)) {
            parts.push(country);
        }
        parts.push(Utc::now().year().to_string());
        parts.push(match self.context.language().as_deref() {
            Some("pt") => "mercado".to_string(),
            Some("es") => "mercado".to_string(),
            _ => "market".to_string(),
        });

        Ok(Query::new(parts.join(" "), self.context.clone(), &self.session_id))
    }
}

fn country_name(region: &str) -> String {
    match region {
        "BR" => "Brasil",
        "PT" => "Portugal",
        "US" => "USA",
        "MX" => "México",
        "AR" => "Argentina",
        other => other,
    }
    .to_string()
}

/// `session_<millis>_<8 hex>`
pub fn new_session_id() -> String {
    let now = Utc::now();
    let seed = format!(
        "{}:{:?}",
        now.timestamp_nanos_opt().unwrap_or_default(),
        std::thread::current().id()
    );
    let digest = Sha256::digest(seed.as_bytes());
    format!("session_{}_{}", now.timestamp_millis(), hex::encode(&digest[..4]))
}

/// Handle to a collection running on the runtime
pub struct CollectionHandle {
    session_id: String,
    status: watch::Receiver<CollectionStatus>,
    task: JoinHandle<SessionDocument>,
}

impl CollectionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Current status without waiting
    pub fn status(&self) -> CollectionStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified on every status change
    pub fn subscribe(&self) -> watch::Receiver<CollectionStatus> {
        self.status.clone()
    }

    /// Wait for the final document
    pub async fn wait(self) -> Result<SessionDocument> {
        self.task
            .await
            .map_err(|e| CollectError::Storage(format!("collection task ended abnormally: {e}")))
    }
}

/// Runs one research session through its phases and persists the result.
///
/// Phase failures are recorded on the document and never stop later phases.
/// Only a storage failure gives the document the `error` status.
pub struct SessionCollector {
    orchestrator: Arc<SearchOrchestrator>,
    store: Arc<dyn DocumentStore>,
}

impl SessionCollector {
    pub fn new(orchestrator: Arc<SearchOrchestrator>, store: Arc<dyn DocumentStore>) -> Self {
        Self { orchestrator, store }
    }

    pub fn orchestrator(&self) -> &SearchOrchestrator {
        &self.orchestrator
    }

    /// Inbound entry point: collect and persist one session
    pub async fn run_collection(
        &self,
        query: &str,
        context: QueryContext,
        session_id: &str,
    ) -> SessionDocument {
        let (status, _) = watch::channel(CollectionStatus::Queued);
        self.collect_guarded(Query::new(query, context, session_id), &status)
            .await
    }

    /// Run the collection as a task and return a handle to observe it
    pub fn spawn(self: &Arc<Self>, request: CollectionRequest) -> Result<CollectionHandle> {
        let query = request.to_query()?;
        let (tx, rx) = watch::channel(CollectionStatus::Queued);
        let collector = Arc::clone(self);
        let session_id = query.session_id.clone();
        ::log::info!("Queued collection {} for '{}'", session_id, query.text);

        let task = tokio::spawn(async move { collector.collect_guarded(query, &tx).await });

        Ok(CollectionHandle {
            session_id,
            status: rx,
            task,
        })
    }

    /// `collect`, turning a panic anywhere into a persisted emergency document
    async fn collect_guarded(
        &self,
        query: Query,
        status: &watch::Sender<CollectionStatus>,
    ) -> SessionDocument {
        let doc = match AssertUnwindSafe(self.collect(&query, status)).catch_unwind().await {
            Ok(doc) => doc,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                ::log::error!("Collection {} panicked: {}", query.session_id, message);
                let mut doc = SessionDocument::emergency(&query, Phase::Consolidation, message);
                self.persist(&mut doc).await;
                doc
            }
        };

        let forgotten = self.orchestrator.capture_gate().forget_session(&query.session_id);
        ::log::debug!("Released {} capture entries of {}", forgotten, query.session_id);

        let final_status = match doc.status {
            SessionStatus::Error => CollectionStatus::Failed {
                message: doc
                    .errors
                    .last()
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| "collection failed".to_string()),
            },
            status => CollectionStatus::Completed {
                status,
                success: doc.success,
            },
        };
        status.send_replace(final_status);
        doc
    }

    /// Run every phase in order and persist the consolidated document once
    pub async fn collect(
        &self,
        query: &Query,
        status: &watch::Sender<CollectionStatus>,
    ) -> SessionDocument {
        let started = Instant::now();
        let orchestrator = &self.orchestrator;
        let providers = orchestrator.providers();
        let rotations_before = orchestrator.credentials().rotation_counts();
        let mut doc = SessionDocument::new(query);
        ::log::info!("Collection {} started for '{}'", query.session_id, query.text);

        if providers.enabled_count() == 0 {
            doc.record_error(
                Phase::WebSearch,
                "no_providers",
                "no providers enabled: configure at least one API credential",
            );
        }

        // Web search: deep navigation first, then the web wave
        let web = run_phase(Phase::WebSearch, status, &mut doc, async {
            let mut outcomes: Vec<ProviderOutcome> = orchestrator.run_deep(query).await.into_iter().collect();
            outcomes.extend(orchestrator.fan_out(&providers.web, query).await);
            outcomes
        })
        .await;
        if let Some(outcomes) = web {
            doc.web_results = records_of(&outcomes, &[SourceKind::DeepNavigation, SourceKind::Web]);
            record_wave(&mut doc, Phase::WebSearch, outcomes);
        }

        let trend = run_phase(
            Phase::TrendAugmentation,
            status,
            &mut doc,
            orchestrator.fan_out(&providers.trend, query),
        )
        .await;
        if let Some(outcomes) = trend {
            doc.trend_results = records_of(&outcomes, &[SourceKind::Trend]);
            record_wave(&mut doc, Phase::TrendAugmentation, outcomes);
        }

        let second_wave: Vec<Arc<dyn SearchProvider>> =
            providers.social.iter().chain(&providers.video).cloned().collect();
        let social = run_phase(
            Phase::SocialAugmentation,
            status,
            &mut doc,
            orchestrator.fan_out(&second_wave, query),
        )
        .await;
        if let Some(outcomes) = social {
            let mut social_results = records_of(&outcomes, &[SourceKind::Social]);
            let mut video_results = records_of(&outcomes, &[SourceKind::Video]);
            let mut viral = orchestrator.classify(&mut social_results);
            viral.extend(orchestrator.classify(&mut video_results));
            doc.social_results = social_results;
            doc.video_results = video_results;
            doc.viral_content = dedupe(viral);
            record_wave(&mut doc, Phase::SocialAugmentation, outcomes);
        }

        doc.corpus = dedupe(
            doc.web_results
                .iter()
                .chain(&doc.trend_results)
                .chain(&doc.social_results)
                .chain(&doc.video_results)
                .cloned(),
        );

        let corpus = doc.corpus.clone();
        if let Some(selected) = run_phase(Phase::UrlSelection, status, &mut doc, async {
            orchestrator.select_for_capture(&corpus)
        })
        .await
        {
            ::log::info!("Selected {} URLs for capture", selected.len());
            doc.selected_urls = selected;
        }

        let selected = doc.selected_urls.clone();
        if let Some(shots) = run_phase(
            Phase::Capture,
            status,
            &mut doc,
            orchestrator.capture(&selected, &query.session_id),
        )
        .await
        {
            let failed = shots.iter().filter(|s| !s.success).count();
            if failed > 0 {
                doc.record_error(
                    Phase::Capture,
                    "capture_failure",
                    format!("{failed} of {} screenshots failed", shots.len()),
                );
            }
            doc.screenshots_captured = shots;
        }

        status.send_replace(CollectionStatus::Running {
            phase: Phase::Consolidation,
        });
        self.consolidate(&mut doc, rotations_before, started);
        self.persist(&mut doc).await;
        doc
    }

    fn consolidate(
        &self,
        doc: &mut SessionDocument,
        rotations_before: BTreeMap<String, u64>,
        started: Instant,
    ) {
        let providers_used = succeeded_providers(ordered(doc));
        let rotations =
            rotation_delta(&rotations_before, &self.orchestrator.credentials().rotation_counts());
        let statistics = summarize(
            doc.provider_results.values().flatten(),
            &doc.corpus,
            doc.viral_content.len(),
            &doc.screenshots_captured,
            rotations,
            started.elapsed(),
        );
        doc.providers_used = providers_used;
        doc.statistics = statistics;
        doc.success = !doc.providers_used.is_empty() && !doc.corpus.is_empty();

        if doc.corpus.is_empty() {
            doc.status = SessionStatus::Emergency;
            doc.record_error(Phase::Consolidation, "emergency", "no results collected");
        }
        doc.finished_at = Some(Utc::now());
        ::log::info!(
            "Collection {} consolidated: {} sources, {} unique URLs, {} viral, {} screenshots",
            doc.session_id,
            doc.statistics.total_sources,
            doc.statistics.unique_urls,
            doc.statistics.viral_count,
            doc.screenshots_captured.len()
        );
    }

    async fn persist(&self, doc: &mut SessionDocument) {
        if let Err(e) = self.store.save(doc).await {
            doc.status = SessionStatus::Error;
            doc.success = false;
            doc.record_error(Phase::Consolidation, e.kind(), e.to_string());
        }
    }
}

/// Provider outcomes in phase order
fn ordered(doc: &SessionDocument) -> impl Iterator<Item = &ProviderOutcome> {
    [Phase::WebSearch, Phase::TrendAugmentation, Phase::SocialAugmentation]
        .into_iter()
        .filter_map(move |phase| doc.provider_results.get(&phase.to_string()))
        .flatten()
}

fn record_wave(doc: &mut SessionDocument, phase: Phase, outcomes: Vec<ProviderOutcome>) {
    let failed: Vec<String> = outcomes
        .iter()
        .filter(|o| !o.success)
        .map(|o| {
            let kind = o.error.as_ref().map(|e| e.kind.as_str()).unwrap_or("unknown");
            format!("{} ({kind})", o.provider)
        })
        .collect();
    if !outcomes.is_empty() && failed.len() == outcomes.len() {
        doc.record_error(
            phase,
            "providers_failed",
            format!("every provider failed: {}", failed.join(", ")),
        );
    } else if !failed.is_empty() {
        ::log::warn!("Phase {}: {} providers failed: {}", phase, failed.len(), failed.join(", "));
    }
    doc.provider_results.insert(phase.to_string(), outcomes);
}

async fn run_phase<T, F>(
    phase: Phase,
    status: &watch::Sender<CollectionStatus>,
    doc: &mut SessionDocument,
    work: F,
) -> Option<T>
where
    F: Future<Output = T>,
{
    status.send_replace(CollectionStatus::Running { phase });
    ::log::info!("Phase {} started", phase);
    let started = Instant::now();
    match AssertUnwindSafe(work).catch_unwind().await {
        Ok(output) => {
            ::log::debug!("Phase {} finished in {:?}", phase, started.elapsed());
            Some(output)
        }
        Err(panic) => {
            doc.record_error(phase, "panic", panic_message(panic.as_ref()));
            None
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "phase panicked".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureGate;
    use crate::credentials::CredentialPool;
    use crate::providers::ProviderSet;
    use crate::results::{EngagementMetrics, ResultRecord};
    use crate::testing::{FailingStore, FakeLauncher, MemoryStore, ScriptedProvider, gate_in, quiet_config};

    struct Fixture {
        collector: Arc<SessionCollector>,
        store: Arc<MemoryStore>,
        launcher: Arc<FakeLauncher>,
        _dir: tempfile::TempDir,
    }

    fn fixture(providers: ProviderSet) -> Fixture {
        fixture_with(providers, FakeLauncher::default())
    }

    fn fixture_with(providers: ProviderSet, launcher: FakeLauncher) -> Fixture {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let config = quiet_config(&dir);
        let launcher = Arc::new(launcher);
        let gate: Arc<CaptureGate> = Arc::new(gate_in(launcher.clone(), &config));
        let orchestrator = Arc::new(SearchOrchestrator::new(
            providers,
            Arc::new(CredentialPool::default()),
            gate,
            &config,
        ));
        let store = Arc::new(MemoryStore::default());
        let collector = Arc::new(SessionCollector::new(orchestrator, store.clone()));
        Fixture {
            collector,
            store,
            launcher,
            _dir: dir,
        }
    }

    fn viral_post() -> ResultRecord {
        ResultRecord::new("Launch", "https://tiktok.com/@brand/video/1", "clip", "SUPADATA")
            .with_platform("tiktok")
            .with_engagement(EngagementMetrics {
                likes: 1500,
                comments: 10,
                shares: 0,
                views: 90_000,
            })
    }

    fn full_set() -> ProviderSet {
        let mut providers = ProviderSet::empty();
        providers.web = vec![
            Arc::new(ScriptedProvider::web("EXA").with_results(3)),
            Arc::new(ScriptedProvider::web("SERPER").fails_with(|| CollectError::Http {
                status: 429,
                message: "quota".into(),
            })),
        ];
        providers.trend = vec![Arc::new(ScriptedProvider::trend("SERPER_NEWS").with_results(2))];
        providers.social = vec![Arc::new(ScriptedProvider::social("SUPADATA").returning(vec![viral_post()]))];
        providers
    }

    fn context() -> QueryContext {
        QueryContext {
            segment: "energy drinks".into(),
            product: "sugar free".into(),
            locale: "pt-BR".into(),
            ..QueryContext::default()
        }
    }

    #[tokio::test]
    async fn test_full_session() {
        let f = fixture(full_set());
        let doc = f
            .collector
            .run_collection("energy drinks Brazil", context(), "session_full")
            .await;

        assert!(doc.success);
        assert_eq!(doc.status, SessionStatus::Completed);
        assert_eq!(doc.providers_used, vec!["EXA", "SERPER_NEWS", "SUPADATA"]);
        assert_eq!(doc.web_results.len(), 3);
        assert_eq!(doc.trend_results.len(), 2);
        assert_eq!(doc.social_results.len(), 1);
        assert_eq!(doc.viral_content.len(), 1);
        assert_eq!(doc.corpus.len(), 6);
        assert_eq!(doc.selected_urls, vec!["https://tiktok.com/@brand/video/1"]);
        assert_eq!(doc.screenshots_captured.len(), 1);
        assert_eq!(f.launcher.launches(), 1);
        assert_eq!(doc.statistics.total_sources, 6);
        assert_eq!(doc.statistics.providers_failed, 1);
        assert_eq!(doc.statistics.viral_count, 1);
        assert_eq!(doc.statistics.screenshots_succeeded, 1);
        assert!(doc.provider_results.contains_key("trend_augmentation"));
        assert!(doc.finished_at.is_some());

        let stored = f.store.documents();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0], doc);
    }

    #[tokio::test]
    async fn test_total_failure_yields_emergency_document() {
        let f = fixture(ProviderSet::empty());
        let doc = f.collector.run_collection("q", context(), "session_empty").await;

        assert!(!doc.success);
        assert_eq!(doc.status, SessionStatus::Emergency);
        assert!(doc.corpus.is_empty());
        assert!(doc.errors.iter().any(|e| e.kind == "no_providers"));
        assert!(doc.errors.iter().any(|e| e.kind == "emergency"));
        assert_eq!(f.store.documents().len(), 1);
    }

    #[tokio::test]
    async fn test_panicking_phase_does_not_stop_later_phases() {
        let mut providers = ProviderSet::empty();
        providers.web = vec![Arc::new(ScriptedProvider::web("EXA").panics())];
        providers.social = vec![Arc::new(ScriptedProvider::social("SUPADATA").returning(vec![viral_post()]))];
        let f = fixture(providers);

        let doc = f.collector.run_collection("q", context(), "session_panic").await;
        // the spawned provider task panicked and became a failed outcome
        assert!(doc.errors.iter().any(|e| e.phase == Phase::WebSearch));
        assert_eq!(doc.social_results.len(), 1);
        assert_eq!(doc.screenshots_captured.len(), 1);
        assert!(doc.success);
    }

    #[tokio::test]
    async fn test_panic_inside_capture_phase_is_recorded() {
        let mut providers = ProviderSet::empty();
        providers.social = vec![Arc::new(ScriptedProvider::social("SUPADATA").returning(vec![viral_post()]))];
        let f = fixture_with(providers, FakeLauncher::panicking());

        let doc = f.collector.run_collection("q", context(), "session_crash").await;
        assert!(
            doc.errors
                .iter()
                .any(|e| e.phase == Phase::Capture && e.kind == "panic")
        );
        assert_eq!(f.launcher.launches(), 1);
        assert!(doc.screenshots_captured.is_empty());
        // consolidation still ran over the partial data
        assert_eq!(doc.selected_urls, vec!["https://tiktok.com/@brand/video/1"]);
        assert_eq!(doc.statistics.total_sources, 1);
        assert!(doc.finished_at.is_some());
        assert_eq!(doc.status, SessionStatus::Completed);
        assert_eq!(f.store.documents().len(), 1);
    }

    #[tokio::test]
    async fn test_high_quality_web_page_is_captured_without_analytics() {
        let mut page = ResultRecord::new("Report", "https://exame.com/report", "x".repeat(2000), "JINA");
        page.quality_score = Some(95.0);
        let mut providers = ProviderSet::empty();
        providers.web = vec![Arc::new(ScriptedProvider::web("JINA").returning(vec![page]))];
        let f = fixture(providers);

        let doc = f.collector.run_collection("q", context(), "session_quality").await;
        assert_eq!(doc.selected_urls, vec!["https://exame.com/report"]);
        assert_eq!(doc.screenshots_captured.len(), 1);
        assert_eq!(f.launcher.launches(), 1);
    }

    #[tokio::test]
    async fn test_capture_entries_released_after_session() {
        let f = fixture(full_set());
        f.collector
            .run_collection("energy drinks Brazil", context(), "session_release")
            .await;

        let gate = f.collector.orchestrator().capture_gate();
        assert!(!gate.is_attempted("https://tiktok.com/@brand/video/1", "session_release"));
        assert_eq!(gate.forget_session("session_release"), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_sets_error_status() {
        let dir = tempfile::tempdir().unwrap();
        let config = quiet_config(&dir);
        let gate = Arc::new(gate_in(Arc::new(FakeLauncher::default()), &config));
        let orchestrator = Arc::new(SearchOrchestrator::new(
            full_set(),
            Arc::new(CredentialPool::default()),
            gate,
            &config,
        ));
        let collector = Arc::new(SessionCollector::new(orchestrator, Arc::new(FailingStore)));

        let handle = collector
            .spawn(CollectionRequest::from_context(context()).with_session_id("session_disk"))
            .unwrap();
        let mut status = handle.subscribe();
        let doc = handle.wait().await.unwrap();

        assert_eq!(doc.status, SessionStatus::Error);
        assert!(doc.errors.iter().any(|e| e.kind == "storage_error"));
        assert!(matches!(&*status.borrow_and_update(), CollectionStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn test_spawned_collection_reports_completion() {
        let f = fixture(full_set());
        let handle = f
            .collector
            .spawn(CollectionRequest::from_context(context()).with_session_id("session_spawn"))
            .unwrap();
        assert_eq!(handle.session_id(), "session_spawn");

        let mut status = handle.subscribe();
        let doc = handle.wait().await.unwrap();
        status.changed().await.ok();
        assert_eq!(
            *status.borrow(),
            CollectionStatus::Completed {
                status: SessionStatus::Completed,
                success: true
            }
        );
        assert!(doc.query.starts_with("energy drinks sugar free Brasil"));
        assert!(doc.query.ends_with("mercado"));
    }

    #[test]
    fn test_request_needs_query_or_segment() {
        let request = CollectionRequest::from_context(QueryContext::default());
        assert_eq!(request.to_query().unwrap_err().kind(), "config_error");

        let explicit = request.with_query("  cold brew  ").to_query().unwrap();
        assert_eq!(explicit.text, "cold brew");
        assert!(new_session_id().starts_with("session_"));
    }
}
