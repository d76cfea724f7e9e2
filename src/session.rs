use crate::results::{ProviderOutcome, ResultRecord, ScreenshotArtifact};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Market context attached to every query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryContext {
    #[serde(default)]
    pub segment: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub audience: String,
    /// BCP-47 style locale such as `pt-BR`
    #[serde(default)]
    pub locale: String,
    /// Explicit scoring keywords; derived from the other fields when empty
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl QueryContext {
    /// Keywords used for quality scoring, lowercased
    pub fn scoring_keywords(&self) -> Vec<String> {
        if !self.keywords.is_empty() {
            return self.keywords.iter().map(|k| k.to_lowercase()).collect();
        }
        let mut keywords: Vec<String> = Vec::new();
        for field in [&self.segment, &self.product, &self.audience] {
            for word in field.split_whitespace() {
                let word = word
                    .trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase();
                if word.chars().count() > 2 && !keywords.contains(&word) {
                    keywords.push(word);
                }
            }
        }
        keywords
    }

    /// Language part of the locale (`pt` for `pt-BR`), if any
    pub fn language(&self) -> Option<String> {
        self.locale
            .split(['-', '_'])
            .next()
            .filter(|l| !l.is_empty())
            .map(|l| l.to_lowercase())
    }

    /// Region part of the locale (`BR` for `pt-BR`), if any
    pub fn region(&self) -> Option<String> {
        self.locale
            .split(['-', '_'])
            .nth(1)
            .filter(|r| !r.is_empty())
            .map(|r| r.to_uppercase())
    }
}

/// A research query; immutable once issued
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub context: QueryContext,
    pub session_id: String,
}

impl Query {
    pub fn new(text: impl Into<String>, context: QueryContext, session_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context,
            session_id: session_id.into(),
        }
    }

    /// Same context and session, different text
    pub fn derive(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context: self.context.clone(),
            session_id: self.session_id.clone(),
        }
    }
}

/// Aggregate counters for a search run or a whole session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_sources: usize,
    pub unique_urls: usize,
    pub total_content_length: usize,
    pub api_calls_made: u64,
    pub elapsed_secs: f64,
    #[serde(default)]
    pub providers_failed: usize,
    #[serde(default)]
    pub viral_count: usize,
    #[serde(default)]
    pub screenshots_attempted: usize,
    #[serde(default)]
    pub screenshots_succeeded: usize,
    #[serde(default)]
    pub extraction_attempts: usize,
    #[serde(default)]
    pub per_provider_rotations: BTreeMap<String, u64>,
    #[serde(default)]
    pub sources_by_type: BTreeMap<String, usize>,
}

/// Output of one orchestrator run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSection {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub providers_used: Vec<String>,
    pub provider_outcomes: Vec<ProviderOutcome>,
    pub web_results: Vec<ResultRecord>,
    pub social_results: Vec<ResultRecord>,
    pub video_results: Vec<ResultRecord>,
    pub viral_content: Vec<ResultRecord>,
    pub screenshots_captured: Vec<ScreenshotArtifact>,
    /// Deduplicated union of every result list, in provider priority order
    pub merged: Vec<ResultRecord>,
    pub statistics: Statistics,
}

/// Phases run by the session collector, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    WebSearch,
    TrendAugmentation,
    SocialAugmentation,
    UrlSelection,
    Capture,
    Consolidation,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::WebSearch => "web_search",
            Phase::TrendAugmentation => "trend_augmentation",
            Phase::SocialAugmentation => "social_augmentation",
            Phase::UrlSelection => "url_selection",
            Phase::Capture => "capture",
            Phase::Consolidation => "consolidation",
        };
        f.write_str(name)
    }
}

/// Structured error recorded when a phase fails
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseError {
    pub phase: Phase,
    pub kind: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Terminal status of a session document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Every phase ran; some may have recorded errors
    Completed,
    /// Produced without usable results
    Emergency,
    /// Top-level sequencing failed (for example the document could not be stored)
    Error,
}

/// Consolidated record of one research session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    pub session_id: String,
    pub query: String,
    pub context: QueryContext,
    /// Incremented for every stored revision of the same session
    pub revision: u32,
    pub status: SessionStatus,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub providers_used: Vec<String>,
    /// Raw outcome of every provider call, keyed by phase
    pub provider_results: BTreeMap<String, Vec<ProviderOutcome>>,
    pub web_results: Vec<ResultRecord>,
    pub trend_results: Vec<ResultRecord>,
    pub social_results: Vec<ResultRecord>,
    pub video_results: Vec<ResultRecord>,
    /// Deduplicated corpus across every phase
    pub corpus: Vec<ResultRecord>,
    pub viral_content: Vec<ResultRecord>,
    pub selected_urls: Vec<String>,
    pub screenshots_captured: Vec<ScreenshotArtifact>,
    pub statistics: Statistics,
    pub errors: Vec<PhaseError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_at: Option<String>,
}

impl SessionDocument {
    /// Fresh document at session start
    pub fn new(query: &Query) -> Self {
        Self {
            session_id: query.session_id.clone(),
            query: query.text.clone(),
            context: query.context.clone(),
            revision: 1,
            status: SessionStatus::Completed,
            success: false,
            started_at: Utc::now(),
            finished_at: None,
            providers_used: Vec::new(),
            provider_results: BTreeMap::new(),
            web_results: Vec::new(),
            trend_results: Vec::new(),
            social_results: Vec::new(),
            video_results: Vec::new(),
            corpus: Vec::new(),
            viral_content: Vec::new(),
            selected_urls: Vec::new(),
            screenshots_captured: Vec::new(),
            statistics: Statistics::default(),
            errors: Vec::new(),
            stored_at: None,
        }
    }

    /// Minimal document flagging zero results
    pub fn emergency(query: &Query, phase: Phase, message: impl Into<String>) -> Self {
        let mut doc = Self::new(query);
        doc.status = SessionStatus::Emergency;
        doc.record_error(phase, "emergency", message);
        doc.finished_at = Some(Utc::now());
        doc
    }

    pub fn record_error(&mut self, phase: Phase, kind: &str, message: impl Into<String>) {
        let message = message.into();
        ::log::error!("Phase {} failed ({}): {}", phase, kind, message);
        self.errors.push(PhaseError {
            phase,
            kind: kind.to_string(),
            message,
            at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoring_keywords_derived_from_context() {
        let context = QueryContext {
            segment: "Energy drinks".to_string(),
            product: "sugar-free energy".to_string(),
            audience: "gamers in BR".to_string(),
            locale: "pt-BR".to_string(),
            keywords: Vec::new(),
        };
        let keywords = context.scoring_keywords();
        assert_eq!(
            keywords,
            vec!["energy", "drinks", "sugar-free", "gamers"]
        );
        assert_eq!(context.language().as_deref(), Some("pt"));
        assert_eq!(context.region().as_deref(), Some("BR"));
    }

    #[test]
    fn test_explicit_keywords_win() {
        let context = QueryContext {
            segment: "ignored".to_string(),
            keywords: vec!["Taurine".to_string()],
            ..QueryContext::default()
        };
        assert_eq!(context.scoring_keywords(), vec!["taurine"]);
        assert_eq!(context.region(), None);
    }

    #[test]
    fn test_emergency_document() {
        let query = Query::new("energy drinks Brazil", QueryContext::default(), "s1");
        let doc = SessionDocument::emergency(&query, Phase::WebSearch, "boom");
        assert_eq!(doc.status, SessionStatus::Emergency);
        assert!(!doc.success);
        assert!(doc.corpus.is_empty());
        assert_eq!(doc.errors.len(), 1);
        assert_eq!(doc.errors[0].kind, "emergency");
    }
}
