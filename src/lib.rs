#![allow(clippy::too_many_arguments)]

pub mod analytics;
pub mod capture;
pub mod collector;
pub mod config;
pub mod credentials;
pub mod error;
pub mod extraction;
pub mod filter;
pub mod http;
pub mod orchestrator;
pub mod parsers;
pub mod providers;
pub mod results;
pub mod session;
pub mod store;
pub mod utils;
pub mod virality;

#[cfg(test)]
mod testing;

// Re-export commonly used types for convenience
pub use analytics::ContentAnalytics;
pub use capture::{BrowserLauncher, BrowserSession, CaptureGate, WebDriverLauncher};
pub use collector::{CollectionHandle, CollectionRequest, CollectionStatus, SessionCollector};
pub use config::CollectorConfig;
pub use credentials::CredentialPool;
pub use error::{CollectError, Result};
pub use extraction::{ExtractionPipeline, ExtractionStrategy};
pub use orchestrator::SearchOrchestrator;
pub use providers::{ProviderSet, SearchProvider};
pub use results::{ProviderOutcome, ResultRecord, ScreenshotArtifact, SourceKind};
pub use session::{Query, QueryContext, SearchSection, SessionDocument, SessionStatus};
pub use store::{DocumentStore, JsonFileStore};
pub use virality::ViralityClassifier;

use std::sync::Arc;

/// Builder wiring a [`SessionCollector`] from configuration.
///
/// Anything not supplied falls back to the production default: credentials
/// from the environment, a WebDriver browser and JSON files under the
/// configured output directory.
pub struct Collection {
    config: CollectorConfig,
    credentials: Option<Arc<CredentialPool>>,
    analytics: Option<Arc<dyn ContentAnalytics>>,
    launcher: Option<Arc<dyn BrowserLauncher>>,
    store: Option<Arc<dyn DocumentStore>>,
}

impl Collection {
    pub fn new(config: CollectorConfig) -> Self {
        Self {
            config,
            credentials: None,
            analytics: None,
            launcher: None,
            store: None,
        }
    }

    /// Load configuration from a JSON file, then apply environment overrides
    pub fn with_config_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let config = CollectorConfig::from_file(path)?.with_env_overrides();
        Ok(Self::new(config))
    }

    pub fn with_credentials(mut self, credentials: Arc<CredentialPool>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Attach an analytics collaborator scoring extracted text
    pub fn with_analytics(mut self, analytics: Arc<dyn ContentAnalytics>) -> Self {
        self.analytics = Some(analytics);
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn BrowserLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Validate the configuration and assemble the collector
    pub fn build(self) -> Result<Arc<SessionCollector>> {
        self.config.validate()?;

        let credentials = self
            .credentials
            .unwrap_or_else(|| Arc::new(CredentialPool::from_env(&credentials::PROVIDER_NAMES)));
        let pipeline = Arc::new(ExtractionPipeline::standard(
            &self.config,
            credentials.clone(),
            self.analytics,
        )?);
        let providers = ProviderSet::standard(&self.config, credentials.clone(), pipeline);

        let gate = match self.launcher {
            Some(launcher) => CaptureGate::new(launcher, &self.config),
            None => CaptureGate::webdriver(&self.config),
        };
        let store: Arc<dyn DocumentStore> = match self.store {
            Some(store) => store,
            None => Arc::new(JsonFileStore::new(self.config.output_dir.clone())),
        };

        ::log::info!(
            "Collector ready: {} of {} providers enabled, output in {}",
            providers.enabled_count(),
            crate::credentials::PROVIDER_NAMES.len(),
            self.config.output_dir.display()
        );

        let orchestrator = SearchOrchestrator::new(providers, credentials, Arc::new(gate), &self.config);
        Ok(Arc::new(SessionCollector::new(Arc::new(orchestrator), store)))
    }
}
