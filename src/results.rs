use crate::error::CollectError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Broad category of a provider, used to route results into the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Generic web search
    Web,
    /// News/trend oriented search
    Trend,
    /// Social platforms (posts, pages)
    Social,
    /// Video platforms
    Video,
    /// Deep navigation agent
    DeepNavigation,
}

impl SourceKind {
    /// Key used in `sources_by_type`
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Web => "web",
            SourceKind::Trend => "trend",
            SourceKind::Social => "social",
            SourceKind::Video => "video",
            SourceKind::DeepNavigation => "deep_navigation",
        }
    }
}

/// Engagement counters reported by social and video providers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub shares: u64,
    #[serde(default)]
    pub views: u64,
}

/// Sentiment breakdown returned by the analytics collaborator
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub pos: f64,
    pub neg: f64,
    pub neu: f64,
    pub compound: f64,
}

/// One normalized search/extraction result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Title of the page or post
    pub title: String,

    /// Source URL, the deduplication key after normalization
    pub url: String,

    /// Snippet from the provider, or the extracted page text
    pub content: String,

    /// Provider that produced the record
    pub source_provider: String,

    /// Platform for social/video records (youtube, instagram, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagement: Option<EngagementMetrics>,

    /// Heuristic score in `[0, 100]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,

    /// Independent score from the analytics collaborator, kept next to the heuristic one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics_score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_method: Option<String>,

    #[serde(default)]
    pub is_preferred_source: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extraction_attempts: Vec<ExtractionAttempt>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virality: Option<ViralityFlag>,

    /// Query that surfaced this record when it came from a derived query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_query: Option<String>,
}

impl ResultRecord {
    /// Create a record with the fields every provider supplies
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        content: impl Into<String>,
        source_provider: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            content: content.into(),
            source_provider: source_provider.into(),
            ..Self::default()
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_engagement(mut self, engagement: EngagementMetrics) -> Self {
        self.engagement = Some(engagement);
        self
    }

    pub fn with_published_at(mut self, published_at: Option<String>) -> Self {
        self.published_at = published_at;
        self
    }

    pub fn is_viral(&self) -> bool {
        self.virality.as_ref().is_some_and(|flag| flag.viral)
    }
}

/// Result of a single extraction strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Content passed the acceptance threshold
    Accepted { chars: usize },
    /// Content came back but was below the threshold
    TooShort { chars: usize, minimum: usize },
    /// The strategy raised an error
    Failed { kind: String, message: String },
    /// The strategy was not available (usually a missing credential)
    Skipped { reason: String },
}

/// One `(method, outcome)` entry in an extraction audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionAttempt {
    pub method: String,
    pub outcome: AttemptOutcome,
}

impl ExtractionAttempt {
    pub fn new(method: impl Into<String>, outcome: AttemptOutcome) -> Self {
        Self {
            method: method.into(),
            outcome,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Accepted { .. })
    }
}

/// Engagement metric that tripped a virality threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementMetric {
    Likes,
    Comments,
    Shares,
}

/// Virality classification attached to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViralityFlag {
    pub viral: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<EngagementMetric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<u64>,
}

impl ViralityFlag {
    pub fn not_viral() -> Self {
        Self {
            viral: false,
            metric: None,
            threshold: None,
            value: None,
        }
    }
}

/// Outcome of one screenshot attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotArtifact {
    pub url: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    pub captured_at: DateTime<Utc>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub file_size: u64,
}

impl ScreenshotArtifact {
    /// Artifact for a failed capture
    pub fn failed(url: &str, session_id: &str, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            session_id: session_id.to_string(),
            file_path: None,
            captured_at: Utc::now(),
            success: false,
            error: Some(error.into()),
            final_url: None,
            title: None,
            description: None,
            file_size: 0,
        }
    }
}

/// Serializable form of a provider/strategy/capture failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl From<&CollectError> for FailureInfo {
    fn from(err: &CollectError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            status: err.status(),
        }
    }
}

/// Uniform `{success, provider, results, error?}` shape returned by every adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOutcome {
    pub success: bool,
    pub provider: String,
    pub kind: SourceKind,
    pub results: Vec<ResultRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureInfo>,
    #[serde(default)]
    pub elapsed_ms: u64,
}

impl ProviderOutcome {
    pub fn succeeded(provider: &str, kind: SourceKind, results: Vec<ResultRecord>) -> Self {
        Self {
            success: true,
            provider: provider.to_string(),
            kind,
            results,
            error: None,
            elapsed_ms: 0,
        }
    }

    pub fn failed(provider: &str, kind: SourceKind, error: &CollectError) -> Self {
        Self {
            success: false,
            provider: provider.to_string(),
            kind,
            results: Vec::new(),
            error: Some(FailureInfo::from(error)),
            elapsed_ms: 0,
        }
    }
}
