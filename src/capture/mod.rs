pub mod webdriver;

use crate::config::{CaptureConfig, CollectorConfig};
use crate::error::{CollectError, Result};
use crate::filter::normalize_url;
use crate::results::{ResultRecord, ScreenshotArtifact};
use crate::utils::screenshot_file_name;
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{OnceCell, Semaphore};

pub use webdriver::WebDriverLauncher;

/// Auxiliary page details recorded next to a screenshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub final_url: Option<String>,
    pub description: Option<String>,
}

/// Starts one isolated browser instance
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

/// A live browser owned by exactly one capture
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate and wait for `<body>`, bounded by both durations
    async fn load(&mut self, url: &str, page_load: Duration, body_wait: Duration) -> Result<()>;

    /// PNG bytes of the current viewport
    async fn screenshot(&mut self) -> Result<Vec<u8>>;

    async fn metadata(&mut self) -> PageMetadata;

    async fn close(self: Box<Self>) -> Result<()>;
}

type CaptureKey = (String, String);

/// Threshold-gated screenshot capture.
///
/// Each `(session, normalized url)` pair is attempted at most once; later
/// requests get the first artifact back without launching a browser.
pub struct CaptureGate {
    launcher: Arc<dyn BrowserLauncher>,
    config: CaptureConfig,
    output_dir: PathBuf,
    permits: Arc<Semaphore>,
    attempts: Mutex<HashMap<CaptureKey, Arc<OnceCell<ScreenshotArtifact>>>>,
    launches: AtomicUsize,
}

impl CaptureGate {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, config: &CollectorConfig) -> Self {
        Self {
            launcher,
            config: config.capture.clone(),
            output_dir: config.output_dir.clone(),
            permits: Arc::new(Semaphore::new(config.capture.max_concurrency.max(1))),
            attempts: Mutex::new(HashMap::new()),
            launches: AtomicUsize::new(0),
        }
    }

    /// Gate backed by the configured WebDriver server
    pub fn webdriver(config: &CollectorConfig) -> Self {
        Self::new(Arc::new(WebDriverLauncher::new(&config.capture.webdriver_url)), config)
    }

    /// Viral records, records whose analytics score is high-value and records
    /// whose heuristic quality reaches the capture minimum
    pub fn should_capture(&self, record: &ResultRecord) -> bool {
        record.is_viral()
            || record
                .analytics_score
                .is_some_and(|score| score > self.config.high_value_score)
            || record
                .quality_score
                .is_some_and(|score| score >= self.config.min_quality_score)
    }

    /// Browsers launched so far
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn is_attempted(&self, url: &str, session_id: &str) -> bool {
        let key = (session_id.to_string(), normalize_url(url));
        self.attempts
            .lock()
            .get(&key)
            .is_some_and(|cell| cell.initialized())
    }

    /// Drop every cached attempt of a finished session, returning how many went
    pub fn forget_session(&self, session_id: &str) -> usize {
        let mut attempts = self.attempts.lock();
        let before = attempts.len();
        attempts.retain(|(session, _), _| session != session_id);
        before - attempts.len()
    }

    fn cell(&self, url: &str, session_id: &str) -> Arc<OnceCell<ScreenshotArtifact>> {
        let key = (session_id.to_string(), normalize_url(url));
        self.attempts.lock().entry(key).or_default().clone()
    }

    /// Screenshot `url` for `session_id`, or return the earlier artifact
    pub async fn capture(&self, url: &str, session_id: &str) -> ScreenshotArtifact {
        self.capture_once(url, session_id)
            .await
            .unwrap_or_else(|| {
                self.cell(url, session_id)
                    .get()
                    .cloned()
                    .unwrap_or_else(|| ScreenshotArtifact::failed(url, session_id, "capture pending"))
            })
    }

    /// `Some` only for the request that actually ran the capture
    pub async fn capture_once(&self, url: &str, session_id: &str) -> Option<ScreenshotArtifact> {
        let cell = self.cell(url, session_id);
        if cell.initialized() {
            ::log::debug!("Screenshot already attempted for {} in {}", url, session_id);
            return None;
        }

        let mut ran = false;
        let artifact = cell
            .get_or_init(|| {
                ran = true;
                self.capture_fresh(url, session_id)
            })
            .await;
        ran.then(|| artifact.clone())
    }

    /// Capture every distinct URL with bounded concurrency; repeats are skipped
    pub async fn capture_all(&self, urls: &[String], session_id: &str) -> Vec<ScreenshotArtifact> {
        let mut seen = HashSet::new();
        let distinct: Vec<&String> = urls
            .iter()
            .filter(|u| seen.insert(normalize_url(u)))
            .collect();

        join_all(distinct.into_iter().map(|url| self.capture_once(url, session_id)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    async fn capture_fresh(&self, url: &str, session_id: &str) -> ScreenshotArtifact {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(e) => return ScreenshotArtifact::failed(url, session_id, e.to_string()),
        };
        let delay = self.config.request_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        ::log::info!("Capturing screenshot of {}", url);
        self.launches.fetch_add(1, Ordering::SeqCst);
        let mut browser = match self.launcher.launch().await {
            Ok(browser) => browser,
            Err(e) => {
                ::log::error!("Browser launch failed for {}: {}", url, e);
                return ScreenshotArtifact::failed(url, session_id, e.to_string());
            }
        };

        let budget = self.config.page_load_timeout()
            + self.config.body_wait()
            + self.config.settle_delay()
            + Duration::from_secs(10);
        let result = match tokio::time::timeout(budget, self.drive(browser.as_mut(), url, session_id)).await {
            Ok(result) => result,
            Err(_) => Err(CollectError::CaptureFailure(format!(
                "timed out after {}s",
                budget.as_secs()
            ))),
        };

        if let Err(e) = browser.close().await {
            ::log::warn!("Failed to close browser after {}: {}", url, e);
        }

        match result {
            Ok(artifact) => {
                ::log::info!("Screenshot saved for {} ({} bytes)", url, artifact.file_size);
                artifact
            }
            Err(e) => {
                ::log::error!("Screenshot failed for {}: {}", url, e);
                ScreenshotArtifact::failed(url, session_id, e.to_string())
            }
        }
    }

    async fn drive(
        &self,
        browser: &mut dyn BrowserSession,
        url: &str,
        session_id: &str,
    ) -> Result<ScreenshotArtifact> {
        browser
            .load(url, self.config.page_load_timeout(), self.config.body_wait())
            .await?;
        tokio::time::sleep(self.config.settle_delay()).await;

        let png = browser.screenshot().await?;
        let dir = self.output_dir.join(session_id).join("screenshots");
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(screenshot_file_name(session_id, url));
        tokio::fs::write(&path, &png).await?;

        let metadata = browser.metadata().await;
        Ok(ScreenshotArtifact {
            url: url.to_string(),
            session_id: session_id.to_string(),
            file_path: Some(path.to_string_lossy().into_owned()),
            captured_at: Utc::now(),
            success: true,
            error: None,
            final_url: metadata.final_url,
            title: metadata.title,
            description: metadata.description,
            file_size: png.len() as u64,
        })
    }
}
