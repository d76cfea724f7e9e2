use super::SearchProvider;
use crate::config::DeepNavigationConfig;
use crate::error::{CollectError, Result};
use crate::extraction::ExtractionPipeline;
use crate::filter::normalize_url;
use crate::results::{ResultRecord, SourceKind};
use crate::session::Query;
use async_trait::async_trait;
use futures::future::{BoxFuture, join_all};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

const PROVIDER: &str = "DEEP_NAVIGATOR";

/// Used when the collected titles do not yield enough new terms
const FALLBACK_SUFFIXES: [&str; 3] = ["trends", "market", "innovation"];

const STOPWORDS: [&str; 24] = [
    "about", "after", "also", "best", "como", "from", "have", "into", "mais", "more", "para",
    "pela", "pelo", "sobre", "that", "their", "there", "these", "this", "what", "when", "where",
    "which", "with",
];

/// Search agent that extracts the pages its engines find and follows
/// related queries down to a fixed depth.
pub struct DeepNavigator {
    engines: Vec<Arc<dyn SearchProvider>>,
    pipeline: Arc<ExtractionPipeline>,
    config: DeepNavigationConfig,
}

impl DeepNavigator {
    pub fn new(
        engines: Vec<Arc<dyn SearchProvider>>,
        pipeline: Arc<ExtractionPipeline>,
        config: DeepNavigationConfig,
    ) -> Self {
        Self {
            engines,
            pipeline,
            config,
        }
    }

    /// Depth 1 searches and extracts without deriving related queries
    pub fn navigate<'a>(
        &'a self,
        query: &'a Query,
        depth: u32,
        per_engine: usize,
        visited: &'a mut HashSet<String>,
    ) -> BoxFuture<'a, Result<Vec<ResultRecord>>> {
        Box::pin(async move {
            ::log::info!("Deep navigation depth {} for '{}'", depth, query.text);

            let outcomes = join_all(
                self.engines
                    .iter()
                    .filter(|e| e.is_enabled())
                    .map(|engine| engine.search(query, per_engine)),
            )
            .await;

            if !outcomes.iter().any(|o| o.success) {
                let reasons: Vec<String> = outcomes
                    .iter()
                    .filter_map(|o| o.error.as_ref().map(|e| format!("{}: {}", o.provider, e.message)))
                    .collect();
                return Err(CollectError::Transport(format!(
                    "no engine answered ({})",
                    reasons.join("; ")
                )));
            }

            let delay = Duration::from_millis(self.config.delay_ms);
            let mut records = Vec::new();
            let mut extracted_any = false;
            for outcome in outcomes.into_iter().filter(|o| o.success) {
                for hit in outcome.results.into_iter().take(per_engine) {
                    if !visited.insert(normalize_url(&hit.url)) {
                        continue;
                    }
                    if extracted_any && !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    extracted_any = true;

                    if let Some(mut record) =
                        self.pipeline.extract(&hit.url, &hit.title, &query.context).await
                    {
                        record.source_provider = PROVIDER.to_string();
                        records.push(record);
                    }
                }
            }
            ::log::info!("Deep navigation extracted {} pages at depth {}", records.len(), depth);

            if depth > 1 {
                let related = related_queries(&query.text, &records, self.config.related_queries);
                for text in related {
                    let derived = query.derive(text.clone());
                    match self.navigate(&derived, depth - 1, per_engine, visited).await {
                        Ok(found) => records.extend(found.into_iter().map(|mut r| {
                            r.related_query.get_or_insert_with(|| text.clone());
                            r
                        })),
                        Err(e) => ::log::warn!("Related query '{}' failed: {}", text, e),
                    }
                }
            }

            Ok(records)
        })
    }
}

#[async_trait]
impl SearchProvider for DeepNavigator {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn kind(&self) -> SourceKind {
        SourceKind::DeepNavigation
    }

    fn is_enabled(&self) -> bool {
        self.engines.iter().any(|e| e.is_enabled())
    }

    async fn fetch(&self, query: &Query, limit: usize) -> Result<Vec<ResultRecord>> {
        let per_engine = self.config.extract_per_engine.min(limit.max(1));
        let mut visited = HashSet::new();
        self.navigate(query, self.config.depth.max(1), per_engine, &mut visited)
            .await
    }
}

/// Up to `count` follow-up queries built from frequent title terms that the
/// query does not already contain.
pub fn related_queries(query: &str, records: &[ResultRecord], count: usize) -> Vec<String> {
    let query_lower = query.to_lowercase();
    let query_terms: HashSet<&str> = query_lower.split_whitespace().collect();

    let mut frequency: HashMap<String, usize> = HashMap::new();
    for record in records {
        for word in record.title.split_whitespace() {
            let term = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if term.chars().count() <= 3
                || term.chars().all(|c| c.is_ascii_digit())
                || STOPWORDS.contains(&term.as_str())
                || query_terms.contains(term.as_str())
            {
                continue;
            }
            *frequency.entry(term).or_default() += 1;
        }
    }

    let mut terms: Vec<(String, usize)> = frequency.into_iter().collect();
    terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut queries: Vec<String> = terms
        .into_iter()
        .take(count)
        .map(|(term, _)| format!("{query} {term}"))
        .collect();

    for suffix in FALLBACK_SUFFIXES {
        if queries.len() >= count {
            break;
        }
        let candidate = format!("{query} {suffix}");
        if !query_terms.contains(suffix) && !queries.contains(&candidate) {
            queries.push(candidate);
        }
    }

    queries
}
