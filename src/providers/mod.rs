pub mod deep;
pub mod exa;
pub mod firecrawl;
pub mod google;
pub mod jina;
pub mod serper;
pub mod supadata;
pub mod youtube;

use crate::config::CollectorConfig;
use crate::credentials::CredentialPool;
use crate::error::{CollectError, Result};
use crate::extraction::ExtractionPipeline;
use crate::http::build_client;
use crate::results::{ProviderOutcome, ResultRecord, SourceKind};
use crate::session::Query;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use std::time::Instant;

pub use deep::DeepNavigator;
pub use exa::Exa;
pub use firecrawl::{Firecrawl, FirecrawlSocial};
pub use google::GoogleSearch;
pub use jina::JinaSearch;
pub use serper::Serper;
pub use supadata::Supadata;
pub use youtube::YouTube;

/// One external search source.
///
/// Adapters implement [`SearchProvider::fetch`]; callers use
/// [`SearchProvider::search`], which never fails and always returns the
/// uniform outcome shape.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Stable provider name used in outcomes and statistics
    fn name(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// `false` when the provider has no credential this session
    fn is_enabled(&self) -> bool;

    /// Run one query and map the native response into records
    async fn fetch(&self, query: &Query, limit: usize) -> Result<Vec<ResultRecord>>;

    async fn search(&self, query: &Query, limit: usize) -> ProviderOutcome {
        let started = Instant::now();
        let mut outcome = if !self.is_enabled() {
            ::log::debug!("{} disabled, no credential", self.name());
            ProviderOutcome::failed(self.name(), self.kind(), &CollectError::no_credential(self.name()))
        } else {
            match self.fetch(query, limit).await {
                Ok(results) => {
                    ::log::info!("{} returned {} results for '{}'", self.name(), results.len(), query.text);
                    ProviderOutcome::succeeded(self.name(), self.kind(), results)
                }
                Err(e) => {
                    ::log::warn!("{} failed for '{}': {}", self.name(), query.text, e);
                    ProviderOutcome::failed(self.name(), self.kind(), &e)
                }
            }
        };
        outcome.elapsed_ms = started.elapsed().as_millis() as u64;
        outcome
    }
}

/// Rotate a credential for `provider`, or report it as unavailable
pub(crate) fn credential(pool: &CredentialPool, provider: &str) -> Result<String> {
    pool.next_credential(provider)
        .ok_or_else(|| CollectError::no_credential(provider))
}

/// Drop records without a URL and cap the list at `limit`
pub(crate) fn finish(records: impl IntoIterator<Item = ResultRecord>, limit: usize) -> Vec<ResultRecord> {
    records
        .into_iter()
        .filter(|r| !r.url.trim().is_empty())
        .take(limit)
        .collect()
}

/// Accepts counts sent as numbers, numeric strings or null
pub(crate) fn lenient_count<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Count>::deserialize(deserializer)? {
        Some(Count::Number(n)) if n.is_finite() && n > 0.0 => n as u64,
        Some(Count::Text(s)) => s.trim().replace(',', "").parse().unwrap_or(0),
        _ => 0,
    })
}

/// Every adapter grouped by wave, each list in priority order
pub struct ProviderSet {
    pub deep: Option<Arc<dyn SearchProvider>>,
    pub web: Vec<Arc<dyn SearchProvider>>,
    pub trend: Vec<Arc<dyn SearchProvider>>,
    pub social: Vec<Arc<dyn SearchProvider>>,
    pub video: Vec<Arc<dyn SearchProvider>>,
}

impl ProviderSet {
    pub fn empty() -> Self {
        Self {
            deep: None,
            web: Vec::new(),
            trend: Vec::new(),
            social: Vec::new(),
            video: Vec::new(),
        }
    }

    /// The full production set backed by `credentials`
    pub fn standard(
        config: &CollectorConfig,
        credentials: Arc<CredentialPool>,
        pipeline: Arc<ExtractionPipeline>,
    ) -> Self {
        let client = build_client(config.provider_timeout());
        let endpoints = &config.endpoints;

        let google: Arc<dyn SearchProvider> = Arc::new(GoogleSearch::new(
            client.clone(),
            credentials.clone(),
            &endpoints.google,
            config.google_cse_id.clone(),
        ));
        let serper: Arc<dyn SearchProvider> =
            Arc::new(Serper::web(client.clone(), credentials.clone(), &endpoints.serper));

        let deep: Arc<dyn SearchProvider> = Arc::new(DeepNavigator::new(
            vec![google.clone(), serper.clone()],
            pipeline,
            config.deep_navigation.clone(),
        ));

        Self {
            deep: Some(deep),
            web: vec![
                Arc::new(Firecrawl::new(client.clone(), credentials.clone(), &endpoints.firecrawl)),
                Arc::new(JinaSearch::new(client.clone(), credentials.clone(), &endpoints.jina_search)),
                google,
                Arc::new(Exa::web(client.clone(), credentials.clone(), &endpoints.exa)),
                serper,
            ],
            trend: vec![
                Arc::new(Serper::news(client.clone(), credentials.clone(), &endpoints.serper)),
                Arc::new(Exa::news(client.clone(), credentials.clone(), &endpoints.exa)),
            ],
            social: vec![
                Arc::new(Supadata::new(
                    client.clone(),
                    credentials.clone(),
                    &endpoints.supadata,
                    config.social_platforms.clone(),
                )),
                Arc::new(FirecrawlSocial::new(
                    client.clone(),
                    credentials.clone(),
                    &endpoints.firecrawl,
                    config.social_platforms.clone(),
                )),
            ],
            video: vec![Arc::new(YouTube::new(client, credentials, &endpoints.youtube))],
        }
    }

    /// Number of adapters that can run this session
    pub fn enabled_count(&self) -> usize {
        self.deep
            .iter()
            .chain(&self.web)
            .chain(&self.trend)
            .chain(&self.social)
            .chain(&self.video)
            .filter(|p| p.is_enabled())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::QueryContext;
    use crate::testing::ScriptedProvider;

    #[derive(Deserialize)]
    struct Stats {
        #[serde(default, deserialize_with = "lenient_count")]
        likes: u64,
    }

    #[test]
    fn test_lenient_count() {
        let parse = |json: &str| serde_json::from_str::<Stats>(json).unwrap().likes;
        assert_eq!(parse(r#"{"likes": 1500}"#), 1500);
        assert_eq!(parse(r#"{"likes": "1,500"}"#), 1500);
        assert_eq!(parse(r#"{"likes": null}"#), 0);
        assert_eq!(parse(r#"{"likes": "n/a"}"#), 0);
        assert_eq!(parse(r#"{}"#), 0);
    }

    #[test]
    fn test_finish_drops_missing_urls() {
        let records = vec![
            ResultRecord::new("a", "https://a.com", "", "X"),
            ResultRecord::new("b", " ", "", "X"),
            ResultRecord::new("c", "https://c.com", "", "X"),
            ResultRecord::new("d", "https://d.com", "", "X"),
        ];
        let kept = finish(records, 2);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].title, "c");
    }

    #[tokio::test]
    async fn test_search_never_fails() {
        let query = Query::new("energy drinks", QueryContext::default(), "s1");

        let disabled = ScriptedProvider::web("EXA").disabled();
        let outcome = disabled.search(&query, 10).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.unwrap().kind, "no_credential");

        let broken = ScriptedProvider::web("SERPER").fails_with(|| CollectError::Parse("bad".into()));
        let outcome = broken.search(&query, 10).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.unwrap().kind, "parse_error");

        let working = ScriptedProvider::web("JINA").with_results(3);
        let outcome = working.search(&query, 10).await;
        assert!(outcome.success);
        assert_eq!(outcome.results.len(), 3);
    }
}
