use crate::capture::CaptureGate;
use crate::config::CollectorConfig;
use crate::credentials::{CredentialPool, rotation_delta};
use crate::error::CollectError;
use crate::filter::{dedupe, unique_url_count};
use crate::providers::{ProviderSet, SearchProvider};
use crate::results::{ProviderOutcome, ResultRecord, ScreenshotArtifact, SourceKind};
use crate::session::{Query, SearchSection, Statistics};
use crate::virality::ViralityClassifier;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Fans queries out to the providers, then classifies, captures and merges.
pub struct SearchOrchestrator {
    providers: ProviderSet,
    credentials: Arc<CredentialPool>,
    capture: Arc<CaptureGate>,
    classifier: ViralityClassifier,
    max_concurrency: usize,
    provider_timeout: Duration,
    results_per_provider: usize,
    capture_top_n: usize,
}

impl SearchOrchestrator {
    pub fn new(
        providers: ProviderSet,
        credentials: Arc<CredentialPool>,
        capture: Arc<CaptureGate>,
        config: &CollectorConfig,
    ) -> Self {
        Self {
            providers,
            credentials,
            capture,
            classifier: ViralityClassifier::new(config.virality),
            max_concurrency: config.max_concurrency.max(1),
            provider_timeout: config.provider_timeout(),
            results_per_provider: config.results_per_provider,
            capture_top_n: config.capture.top_n,
        }
    }

    pub fn providers(&self) -> &ProviderSet {
        &self.providers
    }

    pub fn credentials(&self) -> &CredentialPool {
        &self.credentials
    }

    pub fn capture_gate(&self) -> &CaptureGate {
        &self.capture
    }

    pub fn classifier(&self) -> &ViralityClassifier {
        &self.classifier
    }

    /// Deep navigation, the highest-priority single source
    pub async fn run_deep(&self, query: &Query) -> Option<ProviderOutcome> {
        let deep = self.providers.deep.as_ref().filter(|d| d.is_enabled())?;
        ::log::info!("Running deep navigation for '{}'", query.text);
        Some(deep.search(query, self.results_per_provider).await)
    }

    /// Query every enabled provider concurrently.
    ///
    /// Outcomes come back in `providers` order whatever order the calls finish
    /// in. A call that times out or panics becomes a failed outcome.
    pub async fn fan_out(
        &self,
        providers: &[Arc<dyn SearchProvider>],
        query: &Query,
    ) -> Vec<ProviderOutcome> {
        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut handles = Vec::new();

        for provider in providers {
            if !provider.is_enabled() {
                ::log::debug!("Skipping {}: no credential", provider.name());
                continue;
            }

            let provider = Arc::clone(provider);
            let permits = Arc::clone(&permits);
            let query = query.clone();
            let limit = self.results_per_provider;
            let call_timeout = self.provider_timeout;
            let name = provider.name().to_string();
            let kind = provider.kind();

            let handle = tokio::spawn(async move {
                let _permit = match permits.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return ProviderOutcome::failed(
                            provider.name(),
                            provider.kind(),
                            &CollectError::Transport(e.to_string()),
                        );
                    }
                };
                match tokio::time::timeout(call_timeout, provider.search(&query, limit)).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        ::log::warn!("{} timed out after {}s", provider.name(), call_timeout.as_secs());
                        let mut outcome = ProviderOutcome::failed(
                            provider.name(),
                            provider.kind(),
                            &CollectError::Transport(format!(
                                "timed out after {}s",
                                call_timeout.as_secs()
                            )),
                        );
                        outcome.elapsed_ms = call_timeout.as_millis() as u64;
                        outcome
                    }
                }
            });
            handles.push((name, kind, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (name, kind, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    ::log::error!("{} task failed: {}", name, e);
                    outcomes.push(ProviderOutcome::failed(
                        &name,
                        kind,
                        &CollectError::Transport(format!("provider task aborted: {e}")),
                    ));
                }
            }
        }
        outcomes
    }

    /// Flag every record in place and return the viral ones
    pub fn classify(&self, records: &mut [ResultRecord]) -> Vec<ResultRecord> {
        let viral = self.classifier.flag_all(records);
        ::log::info!("Identified {} viral items", viral.len());
        viral
    }

    /// Capture candidates ranked by analytics score, then quality score, then
    /// input order; only records the gate accepts are considered.
    pub fn select_for_capture<'a>(
        &self,
        records: impl IntoIterator<Item = &'a ResultRecord>,
    ) -> Vec<String> {
        let mut candidates: Vec<(usize, &ResultRecord)> = records
            .into_iter()
            .filter(|r| self.capture.should_capture(r))
            .enumerate()
            .collect();
        candidates.sort_by(|(ia, a), (ib, b)| {
            compare_scores(b.analytics_score, a.analytics_score)
                .then_with(|| compare_scores(b.quality_score, a.quality_score))
                .then_with(|| ia.cmp(ib))
        });

        let mut selected: Vec<ResultRecord> = Vec::new();
        for (_, record) in candidates {
            selected.push(record.clone());
        }
        dedupe(selected)
            .into_iter()
            .take(self.capture_top_n)
            .map(|r| r.url)
            .collect()
    }

    pub async fn capture(&self, urls: &[String], session_id: &str) -> Vec<ScreenshotArtifact> {
        if urls.is_empty() {
            return Vec::new();
        }
        ::log::info!("Capturing {} URLs for session {}", urls.len(), session_id);
        self.capture.capture_all(urls, session_id).await
    }

    /// Full search pass: deep navigation, web wave, social/video wave,
    /// virality, capture, deduplication and statistics. Never fails.
    pub async fn run(&self, query: &Query) -> SearchSection {
        let started = Instant::now();
        let rotations_before = self.credentials.rotation_counts();

        let enabled = self.providers.enabled_count();
        if enabled == 0 {
            let reason = "no providers enabled: configure at least one API credential".to_string();
            ::log::error!("Search for '{}' aborted: {}", query.text, reason);
            return SearchSection {
                success: false,
                reason: Some(reason),
                statistics: Statistics {
                    elapsed_secs: started.elapsed().as_secs_f64(),
                    ..Statistics::default()
                },
                ..SearchSection::default()
            };
        }
        ::log::info!("Search for '{}' across {} providers", query.text, enabled);

        let mut outcomes = Vec::new();
        if let Some(deep) = self.run_deep(query).await {
            outcomes.push(deep);
        }
        outcomes.extend(self.fan_out(&self.providers.web, query).await);

        let second_wave: Vec<Arc<dyn SearchProvider>> = self
            .providers
            .social
            .iter()
            .chain(&self.providers.video)
            .cloned()
            .collect();
        outcomes.extend(self.fan_out(&second_wave, query).await);

        let mut web_results = records_of(&outcomes, &[SourceKind::DeepNavigation, SourceKind::Web, SourceKind::Trend]);
        let mut social_results = records_of(&outcomes, &[SourceKind::Social]);
        let mut video_results = records_of(&outcomes, &[SourceKind::Video]);

        let mut viral = self.classify(&mut social_results);
        viral.extend(self.classify(&mut video_results));
        let viral_content = dedupe(viral);
        // web records carry no engagement, but flag them for a uniform shape
        self.classifier.flag_all(&mut web_results);

        let merged = dedupe(
            web_results
                .iter()
                .chain(&social_results)
                .chain(&video_results)
                .cloned(),
        );
        let to_capture = self.select_for_capture(&merged);
        let screenshots_captured = self.capture(&to_capture, &query.session_id).await;

        let providers_used = succeeded_providers(&outcomes);
        let rotations = rotation_delta(&rotations_before, &self.credentials.rotation_counts());
        let statistics = summarize(
            &outcomes,
            &merged,
            viral_content.len(),
            &screenshots_captured,
            rotations,
            started.elapsed(),
        );

        let success = !providers_used.is_empty();
        let reason = (!success).then(|| format!("all {} enabled providers failed", outcomes.len()));
        ::log::info!(
            "Search finished: {} providers used, {} sources, {} unique URLs in {:.1}s",
            providers_used.len(),
            statistics.total_sources,
            statistics.unique_urls,
            statistics.elapsed_secs
        );

        SearchSection {
            success,
            reason,
            providers_used,
            provider_outcomes: outcomes,
            web_results,
            social_results,
            video_results,
            viral_content,
            screenshots_captured,
            merged,
            statistics,
        }
    }
}

fn compare_scores(a: Option<f64>, b: Option<f64>) -> Ordering {
    a.unwrap_or(f64::MIN)
        .partial_cmp(&b.unwrap_or(f64::MIN))
        .unwrap_or(Ordering::Equal)
}

/// Results of successful outcomes of the given kinds, in outcome order
pub fn records_of(outcomes: &[ProviderOutcome], kinds: &[SourceKind]) -> Vec<ResultRecord> {
    outcomes
        .iter()
        .filter(|o| o.success && kinds.contains(&o.kind))
        .flat_map(|o| o.results.iter().cloned())
        .collect()
}

/// Names of providers that succeeded, first occurrence only
pub fn succeeded_providers<'a>(outcomes: impl IntoIterator<Item = &'a ProviderOutcome>) -> Vec<String> {
    let mut used: Vec<String> = Vec::new();
    for outcome in outcomes.into_iter().filter(|o| o.success) {
        if !used.contains(&outcome.provider) {
            used.push(outcome.provider.clone());
        }
    }
    used
}

/// Aggregate counters over a set of outcomes and the merged corpus
pub fn summarize<'a>(
    outcomes: impl IntoIterator<Item = &'a ProviderOutcome>,
    merged: &[ResultRecord],
    viral_count: usize,
    screenshots: &[ScreenshotArtifact],
    rotations: BTreeMap<String, u64>,
    elapsed: Duration,
) -> Statistics {
    let mut total_sources = 0;
    let mut providers_failed = 0;
    let mut sources_by_type: BTreeMap<String, usize> = BTreeMap::new();
    for outcome in outcomes {
        if outcome.success {
            total_sources += outcome.results.len();
            *sources_by_type.entry(outcome.kind.as_str().to_string()).or_default() +=
                outcome.results.len();
        } else {
            providers_failed += 1;
        }
    }

    Statistics {
        total_sources,
        unique_urls: unique_url_count(merged),
        total_content_length: merged.iter().map(|r| r.content.chars().count()).sum(),
        api_calls_made: rotations.values().sum(),
        elapsed_secs: elapsed.as_secs_f64(),
        providers_failed,
        viral_count,
        screenshots_attempted: screenshots.len(),
        screenshots_succeeded: screenshots.iter().filter(|s| s.success).count(),
        extraction_attempts: merged.iter().map(|r| r.extraction_attempts.len()).sum(),
        per_provider_rotations: rotations,
        sources_by_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::QueryContext;
    use crate::testing::{FakeLauncher, ScriptedProvider, gate_in, quiet_config};
    use std::time::Duration;

    fn query() -> Query {
        Query::new("energy drinks Brazil", QueryContext::default(), "session_test")
    }

    fn orchestrator(providers: ProviderSet, dir: &tempfile::TempDir) -> (SearchOrchestrator, Arc<FakeLauncher>) {
        let config = quiet_config(dir);
        let launcher = Arc::new(FakeLauncher::default());
        let gate = Arc::new(gate_in(launcher.clone(), &config));
        let credentials = Arc::new(CredentialPool::default());
        (SearchOrchestrator::new(providers, credentials, gate, &config), launcher)
    }

    #[tokio::test]
    async fn test_partial_success_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let mut providers = ProviderSet::empty();
        providers.web = vec![
            Arc::new(ScriptedProvider::web("FIRECRAWL").fails_with(|| CollectError::Transport("reset".into()))),
            Arc::new(ScriptedProvider::web("JINA").with_results(4)),
            Arc::new(ScriptedProvider::web("GOOGLE").fails_with(|| CollectError::Transport("reset".into()))),
            Arc::new(ScriptedProvider::web("EXA").with_results(6)),
            Arc::new(ScriptedProvider::web("SERPER").fails_with(|| CollectError::Transport("reset".into()))),
        ];
        let (orchestrator, _) = orchestrator(providers, &dir);

        let section = orchestrator.run(&query()).await;
        assert!(section.success);
        assert_eq!(section.providers_used, vec!["JINA", "EXA"]);
        assert_eq!(section.statistics.total_sources, 10);
        assert!(section.statistics.unique_urls <= 10);
        assert_eq!(section.statistics.providers_failed, 3);
        assert_eq!(section.provider_outcomes.len(), 5);
        assert_eq!(section.statistics.sources_by_type.get("web"), Some(&10));
    }

    #[tokio::test]
    async fn test_no_providers_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut providers = ProviderSet::empty();
        providers.web = vec![Arc::new(ScriptedProvider::web("EXA").disabled())];
        let (orchestrator, launcher) = orchestrator(providers, &dir);

        let section = orchestrator.run(&query()).await;
        assert!(!section.success);
        assert!(section.reason.unwrap().contains("no providers enabled"));
        assert!(section.web_results.is_empty());
        assert!(section.social_results.is_empty());
        assert!(section.merged.is_empty());
        assert_eq!(launcher.launches(), 0);
    }

    #[tokio::test]
    async fn test_viral_post_captured_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut providers = ProviderSet::empty();
        let post = ResultRecord::new("Launch", "https://instagram.com/p/viral", "wow", "SUPADATA")
            .with_platform("instagram")
            .with_engagement(crate::results::EngagementMetrics {
                likes: 1500,
                comments: 10,
                shares: 0,
                views: 0,
            });
        providers.social = vec![
            Arc::new(ScriptedProvider::social("SUPADATA").returning(vec![post.clone()])),
            Arc::new(ScriptedProvider::social("FIRECRAWL_SOCIAL").returning(vec![post])),
        ];
        let (orchestrator, launcher) = orchestrator(providers, &dir);

        let section = orchestrator.run(&query()).await;
        // the same post from two providers counts once
        assert_eq!(section.viral_content.len(), 1);
        assert_eq!(section.statistics.viral_count, 1);
        assert_eq!(section.screenshots_captured.len(), 1);
        assert!(section.screenshots_captured[0].success);
        assert_eq!(launcher.launches(), 1);
        assert_eq!(section.merged.len(), 1);
        assert_eq!(section.merged[0].source_provider, "SUPADATA");

        // a second pass in the same session does not capture again
        let again = orchestrator.run(&query()).await;
        assert!(again.screenshots_captured.is_empty());
        assert_eq!(launcher.launches(), 1);
    }

    #[tokio::test]
    async fn test_video_wave_runs_with_social() {
        let dir = tempfile::tempdir().unwrap();
        let mut providers = ProviderSet::empty();
        let clip = ResultRecord::new("Review", "https://youtube.com/watch?v=abc", "taste test", "YOUTUBE")
            .with_platform("youtube")
            .with_engagement(crate::results::EngagementMetrics {
                likes: 20,
                comments: 150,
                shares: 0,
                views: 40_000,
            });
        providers.social = vec![Arc::new(ScriptedProvider::social("SUPADATA").with_results(2))];
        providers.video = vec![Arc::new(ScriptedProvider::video("YOUTUBE").returning(vec![clip]))];
        let (orchestrator, launcher) = orchestrator(providers, &dir);

        let section = orchestrator.run(&query()).await;
        assert_eq!(section.providers_used, vec!["SUPADATA", "YOUTUBE"]);
        assert_eq!(section.social_results.len(), 2);
        assert_eq!(section.video_results.len(), 1);
        assert_eq!(section.viral_content.len(), 1);
        assert_eq!(section.viral_content[0].source_provider, "YOUTUBE");
        assert_eq!(section.statistics.sources_by_type.get("video"), Some(&1));
        assert_eq!(section.statistics.sources_by_type.get("social"), Some(&2));
        assert_eq!(launcher.launches(), 1);
    }

    #[tokio::test]
    async fn test_priority_beats_arrival_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut providers = ProviderSet::empty();
        providers.web = vec![
            Arc::new(
                ScriptedProvider::web("SLOW_FIRST")
                    .returning(vec![ResultRecord::new("slow", "https://same.com/a", "", "SLOW_FIRST")])
                    .delayed(Duration::from_millis(50)),
            ),
            Arc::new(
                ScriptedProvider::web("FAST_SECOND")
                    .returning(vec![ResultRecord::new("fast", "https://same.com/a/", "", "FAST_SECOND")]),
            ),
        ];
        let (orchestrator, _) = orchestrator(providers, &dir);

        let section = orchestrator.run(&query()).await;
        assert_eq!(section.merged.len(), 1);
        assert_eq!(section.merged[0].source_provider, "SLOW_FIRST");
    }

    #[tokio::test]
    async fn test_timeout_becomes_transport_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = quiet_config(&dir);
        config.provider_timeout_secs = 1;
        let mut providers = ProviderSet::empty();
        providers.web = vec![
            Arc::new(ScriptedProvider::web("HANGS").with_results(1).delayed(Duration::from_secs(5))),
            Arc::new(ScriptedProvider::web("OK").with_results(2)),
        ];
        let gate = Arc::new(gate_in(Arc::new(FakeLauncher::default()), &config));
        let orchestrator =
            SearchOrchestrator::new(providers, Arc::new(CredentialPool::default()), gate, &config);

        let outcomes = orchestrator.fan_out(&orchestrator.providers().web, &query()).await;
        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].success);
        assert_eq!(outcomes[0].error.as_ref().unwrap().kind, "transport_error");
        assert!(outcomes[1].success);
    }

    #[tokio::test]
    async fn test_api_calls_follow_rotation_counters() {
        let dir = tempfile::tempdir().unwrap();
        let config = quiet_config(&dir);
        let credentials = Arc::new(CredentialPool::new([("EXA", vec!["a", "b"])]));
        let mut providers = ProviderSet::empty();
        providers.web = vec![Arc::new(
            ScriptedProvider::web("EXA").with_results(1).rotating(credentials.clone(), 3),
        )];
        let gate = Arc::new(gate_in(Arc::new(FakeLauncher::default()), &config));
        let orchestrator = SearchOrchestrator::new(providers, credentials, gate, &config);

        let section = orchestrator.run(&query()).await;
        assert_eq!(section.statistics.api_calls_made, 3);
        assert_eq!(section.statistics.per_provider_rotations.get("EXA"), Some(&3));
    }

    #[test]
    fn test_select_for_capture_ranking() {
        let dir = tempfile::tempdir().unwrap();
        let (orchestrator, _) = orchestrator(ProviderSet::empty(), &dir);

        let scored = |url: &str, analytics: Option<f64>, quality: Option<f64>| {
            let mut r = ResultRecord::new("t", url, "", "X");
            r.analytics_score = analytics;
            r.quality_score = quality;
            r
        };
        let records = vec![
            scored("https://a.com", Some(85.0), Some(10.0)),
            scored("https://b.com", Some(95.0), Some(10.0)),
            scored("https://c.com", Some(85.0), Some(60.0)),
            scored("https://d.com", Some(50.0), Some(99.0)),
            scored("https://e.com", None, None),
            scored("https://f.com", None, Some(20.0)),
        ];
        let selected = orchestrator.select_for_capture(&records);
        assert_eq!(
            selected,
            vec!["https://b.com", "https://c.com", "https://a.com", "https://d.com"]
        );
    }

    #[test]
    fn test_select_for_capture_without_analytics_ranks_by_quality() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = quiet_config(&dir);
        config.capture.top_n = 2;
        let gate = Arc::new(gate_in(Arc::new(FakeLauncher::default()), &config));
        let orchestrator =
            SearchOrchestrator::new(ProviderSet::empty(), Arc::new(CredentialPool::default()), gate, &config);

        let records: Vec<ResultRecord> = [("https://a.com", 55.0), ("https://b.com", 90.0), ("https://c.com", 70.0)]
            .into_iter()
            .map(|(url, quality)| {
                let mut r = ResultRecord::new("t", url, "", "JINA");
                r.quality_score = Some(quality);
                r
            })
            .collect();
        assert_eq!(
            orchestrator.select_for_capture(&records),
            vec!["https://b.com", "https://c.com"]
        );
    }
}
