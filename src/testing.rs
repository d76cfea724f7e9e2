// Test doubles for the collector's trait seams.
//
// - ScriptedStrategy (ExtractionStrategy): canned content or a canned error
// - FixedAnalytics (ContentAnalytics): constant score
// - ScriptedProvider (SearchProvider): canned records, failures, delays, panics
// - FakeLauncher (BrowserLauncher): in-memory browser that counts launches and closes
// - MemoryStore / FailingStore (DocumentStore)

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::analytics::ContentAnalytics;
use crate::capture::{BrowserLauncher, BrowserSession, CaptureGate, PageMetadata};
use crate::config::CollectorConfig;
use crate::credentials::CredentialPool;
use crate::error::{CollectError, Result};
use crate::extraction::ExtractionStrategy;
use crate::parsers::ParseResult;
use crate::providers::SearchProvider;
use crate::results::{ResultRecord, Sentiment, SourceKind};
use crate::session::{Query, SessionDocument};
use crate::store::DocumentStore;

type ErrorFactory = Arc<dyn Fn() -> CollectError + Send + Sync>;

// ---------------------------------------------------------------------------
// ScriptedStrategy
// ---------------------------------------------------------------------------

/// Extraction strategy that returns the same content (or error) for every URL.
pub struct ScriptedStrategy {
    name: &'static str,
    min_chars: usize,
    available: bool,
    content: String,
    error: Option<ErrorFactory>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedStrategy {
    pub fn new(name: &'static str, min_chars: usize) -> Self {
        Self {
            name,
            min_chars,
            available: true,
            content: String::new(),
            error: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn returns(mut self, content: &str) -> Self {
        self.content = content.to_string();
        self
    }

    pub fn fails(mut self, error: impl Fn() -> CollectError + Send + Sync + 'static) -> Self {
        self.error = Some(Arc::new(error));
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Counter of `attempt` calls, shared with the strategy
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl ExtractionStrategy for ScriptedStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    fn min_chars(&self) -> usize {
        self.min_chars
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn attempt(&self, _url: &str) -> Result<ParseResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.error {
            Some(error) => Err(error()),
            None => Ok(ParseResult::new(
                self.content.clone(),
                Some("scripted title".to_string()),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// FixedAnalytics
// ---------------------------------------------------------------------------

/// Scores every text the same, sentiment neutral.
pub struct FixedAnalytics {
    score: f64,
}

impl FixedAnalytics {
    pub fn new(score: f64) -> Self {
        Self { score }
    }
}

impl ContentAnalytics for FixedAnalytics {
    fn score(&self, _text: &str) -> f64 {
        self.score
    }

    fn sentiment(&self, _text: &str) -> Sentiment {
        Sentiment::default()
    }
}

// ---------------------------------------------------------------------------
// ScriptedProvider
// ---------------------------------------------------------------------------

enum Script {
    Records(Vec<ResultRecord>),
    Fail(ErrorFactory),
    Panic,
}

/// Search provider with a fixed script. Builder pattern:
/// `.with_results()`, `.returning()`, `.fails_with()`, `.delayed()`, `.panics()`.
pub struct ScriptedProvider {
    name: String,
    kind: SourceKind,
    enabled: bool,
    script: Script,
    delay: Option<Duration>,
    rotation: Option<(Arc<CredentialPool>, usize)>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    fn new(name: &str, kind: SourceKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            enabled: true,
            script: Script::Records(Vec::new()),
            delay: None,
            rotation: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn web(name: &str) -> Self {
        Self::new(name, SourceKind::Web)
    }

    pub fn trend(name: &str) -> Self {
        Self::new(name, SourceKind::Trend)
    }

    pub fn social(name: &str) -> Self {
        Self::new(name, SourceKind::Social)
    }

    pub fn video(name: &str) -> Self {
        Self::new(name, SourceKind::Video)
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// `count` records with URLs unique to this provider
    pub fn with_results(self, count: usize) -> Self {
        let host = self.name.to_lowercase();
        let records = (0..count)
            .map(|i| {
                ResultRecord::new(
                    format!("{} result {i}", self.name),
                    format!("https://{host}.example/result/{i}"),
                    format!("snippet {i} from {}", self.name),
                    self.name.clone(),
                )
            })
            .collect();
        self.returning(records)
    }

    pub fn returning(mut self, records: Vec<ResultRecord>) -> Self {
        self.script = Script::Records(records);
        self
    }

    pub fn fails_with(mut self, error: impl Fn() -> CollectError + Send + Sync + 'static) -> Self {
        self.script = Script::Fail(Arc::new(error));
        self
    }

    pub fn panics(mut self) -> Self {
        self.script = Script::Panic;
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Draw `per_call` credentials from `pool` on every fetch
    pub fn rotating(mut self, pool: Arc<CredentialPool>, per_call: usize) -> Self {
        self.rotation = Some((pool, per_call));
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl SearchProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn fetch(&self, _query: &Query, limit: usize) -> Result<Vec<ResultRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some((pool, per_call)) = &self.rotation {
            for _ in 0..*per_call {
                pool.next_credential(&self.name);
            }
        }
        match &self.script {
            Script::Records(records) => Ok(records.iter().take(limit).cloned().collect()),
            Script::Fail(error) => Err(error()),
            Script::Panic => panic!("scripted provider {} panicked", self.name),
        }
    }
}

// ---------------------------------------------------------------------------
// FakeLauncher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BrowserMode {
    Healthy,
    FailingLoad,
    Unreachable,
    Panics,
}

/// In-memory browser. Counts launches and closes across all sessions it hands out.
pub struct FakeLauncher {
    mode: BrowserMode,
    launches: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl Default for FakeLauncher {
    fn default() -> Self {
        Self::with_mode(BrowserMode::Healthy)
    }
}

impl FakeLauncher {
    /// PNG signature plus a few bytes, enough to look like an image on disk
    pub const PNG: &'static [u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0];

    fn with_mode(mode: BrowserMode) -> Self {
        Self {
            mode,
            launches: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Launches fine, every navigation fails
    pub fn failing_load() -> Self {
        Self::with_mode(BrowserMode::FailingLoad)
    }

    /// Every launch fails
    pub fn unreachable() -> Self {
        Self::with_mode(BrowserMode::Unreachable)
    }

    /// Every launch panics
    pub fn panicking() -> Self {
        Self::with_mode(BrowserMode::Panics)
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            BrowserMode::Unreachable => {
                return Err(CollectError::CaptureFailure("webdriver not reachable".into()));
            }
            BrowserMode::Panics => panic!("browser crashed on launch"),
            BrowserMode::Healthy | BrowserMode::FailingLoad => {}
        }
        Ok(Box::new(FakeBrowser {
            fail_load: self.mode == BrowserMode::FailingLoad,
            url: None,
            closes: self.closes.clone(),
        }))
    }
}

struct FakeBrowser {
    fail_load: bool,
    url: Option<String>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    async fn load(&mut self, url: &str, _page_load: Duration, _body_wait: Duration) -> Result<()> {
        if self.fail_load {
            return Err(CollectError::CaptureFailure(format!("navigation to {url} failed")));
        }
        self.url = Some(url.to_string());
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        Ok(FakeLauncher::PNG.to_vec())
    }

    async fn metadata(&mut self) -> PageMetadata {
        PageMetadata {
            title: Some("Fake page".to_string()),
            final_url: self.url.clone(),
            description: None,
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// Keeps every saved revision in memory, in save order.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<Vec<SessionDocument>>,
}

impl MemoryStore {
    pub fn documents(&self) -> Vec<SessionDocument> {
        self.documents.lock().clone()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn save(&self, doc: &mut SessionDocument) -> Result<String> {
        let mut documents = self.documents.lock();
        let previous = documents
            .iter()
            .filter(|d| d.session_id == doc.session_id)
            .map(|d| d.revision)
            .max()
            .unwrap_or(0);
        doc.revision = previous + 1;
        let location = format!("memory://{}/r{}", doc.session_id, doc.revision);
        doc.stored_at = Some(location.clone());
        documents.push(doc.clone());
        Ok(location)
    }

    async fn load_latest(&self, session_id: &str) -> Result<Option<SessionDocument>> {
        Ok(self
            .documents
            .lock()
            .iter()
            .filter(|d| d.session_id == session_id)
            .max_by_key(|d| d.revision)
            .cloned())
    }
}

/// Rejects every write.
pub struct FailingStore;

#[async_trait]
impl DocumentStore for FailingStore {
    async fn save(&self, _doc: &mut SessionDocument) -> Result<String> {
        Err(CollectError::Storage("disk full".into()))
    }

    async fn load_latest(&self, _session_id: &str) -> Result<Option<SessionDocument>> {
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Config writing under `dir` with every politeness delay switched off
pub fn quiet_config(dir: &tempfile::TempDir) -> CollectorConfig {
    let mut config = CollectorConfig::default();
    config.output_dir = dir.path().to_path_buf();
    config.capture.settle_delay_ms = 0;
    config.capture.request_delay_ms = 0;
    config.deep_navigation.delay_ms = 0;
    config
}

pub fn gate_in(launcher: Arc<FakeLauncher>, config: &CollectorConfig) -> CaptureGate {
    CaptureGate::new(launcher, config)
}
