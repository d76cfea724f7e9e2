pub mod quality;
pub mod strategies;

use crate::analytics::{self, ContentAnalytics};
use crate::config::{CollectorConfig, QualityPolicy};
use crate::credentials::CredentialPool;
use crate::error::{CollectError, Result};
use crate::filter::UrlFilter;
use crate::http::build_client;
use crate::parsers::ParseResult;
use crate::results::{AttemptOutcome, ExtractionAttempt, ResultRecord};
use crate::session::QueryContext;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

pub use quality::quality_score;
pub use strategies::{ExaContents, JinaReader, RawHtml};

/// One way of turning a URL into readable text
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Method name recorded in the audit trail
    fn name(&self) -> &'static str;

    /// Content must be strictly longer than this to be accepted
    fn min_chars(&self) -> usize;

    /// `false` when the strategy cannot run this session (missing credential)
    fn is_available(&self) -> bool;

    async fn attempt(&self, url: &str) -> Result<ParseResult>;
}

/// Ordered strategy chain with quality scoring.
///
/// Strategies are tried in order and the first one whose content passes its
/// threshold wins. Every attempt is kept on the returned record.
pub struct ExtractionPipeline {
    strategies: Vec<Arc<dyn ExtractionStrategy>>,
    filter: UrlFilter,
    quality: QualityPolicy,
    analytics: Option<Arc<dyn ContentAnalytics>>,
    high_value_score: f64,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl ExtractionPipeline {
    pub fn new(
        strategies: Vec<Arc<dyn ExtractionStrategy>>,
        config: &CollectorConfig,
        analytics: Option<Arc<dyn ContentAnalytics>>,
    ) -> Result<Self> {
        let filter = UrlFilter::new(config.extraction.url_filter.clone())
            .map_err(|e| CollectError::Config(format!("invalid URL filter: {e}")))?;

        Ok(Self {
            strategies,
            filter,
            quality: config.quality.clone(),
            analytics,
            high_value_score: config.capture.high_value_score,
            timeout: Duration::from_secs(config.extraction.timeout_secs),
            permits: Arc::new(Semaphore::new(config.extraction.max_concurrency.max(1))),
        })
    }

    /// Reader service, then Exa contents, then a raw HTML parse
    pub fn standard(
        config: &CollectorConfig,
        credentials: Arc<CredentialPool>,
        analytics: Option<Arc<dyn ContentAnalytics>>,
    ) -> Result<Self> {
        let client = build_client(Duration::from_secs(config.extraction.timeout_secs));
        let endpoints = &config.endpoints;
        let strategies: Vec<Arc<dyn ExtractionStrategy>> = vec![
            Arc::new(JinaReader::new(
                client.clone(),
                credentials.clone(),
                &endpoints.jina_reader,
                config.extraction.primary_min_chars,
            )),
            Arc::new(ExaContents::new(
                client.clone(),
                credentials,
                &endpoints.exa,
                config.extraction.fallback_min_chars,
            )),
            Arc::new(RawHtml::new(client, config.extraction.fallback_min_chars)),
        ];
        Self::new(strategies, config, analytics)
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Extract `url`, or `None` when every strategy failed
    pub async fn extract(
        &self,
        url: &str,
        title: &str,
        context: &QueryContext,
    ) -> Option<ResultRecord> {
        match self.try_extract(url, title, context).await {
            Ok(record) => Some(record),
            Err(e) => {
                ::log::warn!("Dropping {}: {}", url, e);
                None
            }
        }
    }

    /// Same as [`ExtractionPipeline::extract`], keeping the failure
    pub async fn try_extract(
        &self,
        url: &str,
        title: &str,
        context: &QueryContext,
    ) -> Result<ResultRecord> {
        let exhausted = || CollectError::ExtractionExhausted {
            url: url.to_string(),
        };

        if !self.filter.should_extract(url) {
            ::log::debug!("URL rejected by filter: {}", url);
            return Err(exhausted());
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| CollectError::Transport(e.to_string()))?;

        let mut attempts = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            let method = strategy.name();
            if !strategy.is_available() {
                attempts.push(ExtractionAttempt::new(
                    method,
                    AttemptOutcome::Skipped {
                        reason: "no credential configured".to_string(),
                    },
                ));
                continue;
            }

            let outcome = match tokio::time::timeout(self.timeout, strategy.attempt(url)).await {
                Err(_) => Err(CollectError::Transport(format!(
                    "{method} timed out after {}s",
                    self.timeout.as_secs()
                ))),
                Ok(result) => result,
            };

            match outcome {
                Ok(parsed) => {
                    let chars = parsed.content.chars().count();
                    let minimum = strategy.min_chars();
                    if chars > minimum {
                        ::log::debug!("{} accepted {} ({} chars)", method, url, chars);
                        attempts.push(ExtractionAttempt::new(method, AttemptOutcome::Accepted { chars }));
                        return Ok(self.accept(url, title, method, parsed, attempts, context));
                    }
                    ::log::debug!("{} too short for {} ({} <= {})", method, url, chars, minimum);
                    attempts.push(ExtractionAttempt::new(
                        method,
                        AttemptOutcome::TooShort { chars, minimum },
                    ));
                }
                Err(e) => {
                    ::log::warn!("{} failed for {}: {}", method, url, e);
                    attempts.push(ExtractionAttempt::new(
                        method,
                        AttemptOutcome::Failed {
                            kind: e.kind().to_string(),
                            message: e.to_string(),
                        },
                    ));
                }
            }
        }

        ::log::warn!("All {} extraction strategies failed for {}", attempts.len(), url);
        Err(exhausted())
    }

    fn accept(
        &self,
        url: &str,
        title: &str,
        method: &str,
        parsed: ParseResult,
        attempts: Vec<ExtractionAttempt>,
        context: &QueryContext,
    ) -> ResultRecord {
        let title = if title.trim().is_empty() {
            parsed.title.unwrap_or_default()
        } else {
            title.to_string()
        };

        let keywords = context.scoring_keywords();
        let mut record = ResultRecord::new(title, url, parsed.content, method);
        record.quality_score = Some(quality_score(&record.content, url, &keywords, &self.quality));
        record.is_preferred_source = self.quality.preferred_domains.matches(url);
        record.extraction_method = Some(method.to_string());
        record.extraction_attempts = attempts;

        if let Some(analytics) = &self.analytics {
            let (score, sentiment) = analytics::assess(analytics.as_ref(), &record.content);
            record.analytics_score = Some(score);
            record.sentiment = Some(sentiment);
            if score > self.high_value_score {
                ::log::info!("High-value content ({:.1}) at {}", score, url);
            }
        }

        record
    }

    /// `true` when the analytics score crossed the capture threshold
    pub fn is_high_value(&self, record: &ResultRecord) -> bool {
        record
            .analytics_score
            .is_some_and(|score| score > self.high_value_score)
    }
}
