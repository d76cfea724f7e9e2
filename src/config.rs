use crate::error::{CollectError, Result};
use crate::filter::{DomainList, UrlFilterConfig};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Base URLs for every remote service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEndpoints {
    #[serde(default = "default_firecrawl_url")]
    pub firecrawl: String,
    #[serde(default = "default_jina_search_url")]
    pub jina_search: String,
    #[serde(default = "default_jina_reader_url")]
    pub jina_reader: String,
    #[serde(default = "default_google_url")]
    pub google: String,
    #[serde(default = "default_exa_url")]
    pub exa: String,
    #[serde(default = "default_serper_url")]
    pub serper: String,
    #[serde(default = "default_youtube_url")]
    pub youtube: String,
    #[serde(default = "default_supadata_url")]
    pub supadata: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            firecrawl: default_firecrawl_url(),
            jina_search: default_jina_search_url(),
            jina_reader: default_jina_reader_url(),
            google: default_google_url(),
            exa: default_exa_url(),
            serper: default_serper_url(),
            youtube: default_youtube_url(),
            supadata: default_supadata_url(),
        }
    }
}

/// Content-quality heuristic policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityPolicy {
    /// `(minimum exclusive length, points)` bands; the highest band reached applies
    #[serde(default = "default_length_bands")]
    pub length_bands: Vec<(usize, f64)>,

    /// Points per context keyword found in the content
    #[serde(default = "default_keyword_points")]
    pub keyword_points: f64,

    #[serde(default = "default_preferred_points")]
    pub preferred_points: f64,

    #[serde(default = "default_blocked_penalty")]
    pub blocked_penalty: f64,

    #[serde(default = "default_preferred_domains")]
    pub preferred_domains: DomainList,

    #[serde(default = "default_blocked_domains")]
    pub blocked_domains: DomainList,
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self {
            length_bands: default_length_bands(),
            keyword_points: default_keyword_points(),
            preferred_points: default_preferred_points(),
            blocked_penalty: default_blocked_penalty(),
            preferred_domains: default_preferred_domains(),
            blocked_domains: default_blocked_domains(),
        }
    }
}

/// Engagement thresholds; a record is viral when any one is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViralityThresholds {
    #[serde(default = "default_viral_likes")]
    pub likes: u64,
    #[serde(default = "default_viral_comments")]
    pub comments: u64,
    #[serde(default = "default_viral_shares")]
    pub shares: u64,
}

impl Default for ViralityThresholds {
    fn default() -> Self {
        Self {
            likes: default_viral_likes(),
            comments: default_viral_comments(),
            shares: default_viral_shares(),
        }
    }
}

/// Extraction chain settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Minimum characters for the primary reader strategy
    #[serde(default = "default_primary_min_chars")]
    pub primary_min_chars: usize,

    /// Minimum characters for every fallback strategy
    #[serde(default = "default_fallback_min_chars")]
    pub fallback_min_chars: usize,

    #[serde(default = "default_extraction_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_extraction_concurrency")]
    pub max_concurrency: usize,

    #[serde(default)]
    pub url_filter: UrlFilterConfig,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            primary_min_chars: default_primary_min_chars(),
            fallback_min_chars: default_fallback_min_chars(),
            timeout_secs: default_extraction_timeout_secs(),
            max_concurrency: default_extraction_concurrency(),
            url_filter: UrlFilterConfig::default(),
        }
    }
}

/// Visual capture settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    #[serde(default = "default_page_load_timeout_secs")]
    pub page_load_timeout_secs: u64,

    /// Bounded wait for `<body>` to appear
    #[serde(default = "default_body_wait_secs")]
    pub body_wait_secs: u64,

    /// Fixed delay after readiness so the page can finish rendering
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Delay before each capture request, to go easy on target sites
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_capture_concurrency")]
    pub max_concurrency: usize,

    /// Analytics score above which a record is captured
    #[serde(default = "default_high_value_score")]
    pub high_value_score: f64,

    /// Heuristic quality score at or above which a record is captured
    #[serde(default = "default_min_quality_score")]
    pub min_quality_score: f64,

    /// Number of URLs the collector selects for capture
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            page_load_timeout_secs: default_page_load_timeout_secs(),
            body_wait_secs: default_body_wait_secs(),
            settle_delay_ms: default_settle_delay_ms(),
            request_delay_ms: default_request_delay_ms(),
            max_concurrency: default_capture_concurrency(),
            high_value_score: default_high_value_score(),
            min_quality_score: default_min_quality_score(),
            top_n: default_top_n(),
        }
    }
}

impl CaptureConfig {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    pub fn body_wait(&self) -> Duration {
        Duration::from_secs(self.body_wait_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// Deep-navigation agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepNavigationConfig {
    /// Recursion depth; 1 performs no recursion
    #[serde(default = "default_deep_depth")]
    pub depth: u32,

    /// Results extracted per underlying engine
    #[serde(default = "default_extract_per_engine")]
    pub extract_per_engine: usize,

    /// Related queries followed per level
    #[serde(default = "default_related_queries")]
    pub related_queries: usize,

    /// Pause between extractions
    #[serde(default = "default_deep_delay_ms")]
    pub delay_ms: u64,
}

impl Default for DeepNavigationConfig {
    fn default() -> Self {
        Self {
            depth: default_deep_depth(),
            extract_per_engine: default_extract_per_engine(),
            related_queries: default_related_queries(),
            delay_ms: default_deep_delay_ms(),
        }
    }
}

/// Top-level collector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Concurrent provider calls per fan-out wave
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Per provider call timeout
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    /// Results requested from each provider
    #[serde(default = "default_results_per_provider")]
    pub results_per_provider: usize,

    /// Root directory for session documents and screenshots
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Google Programmable Search engine id
    #[serde(default)]
    pub google_cse_id: Option<String>,

    /// Platforms searched by the social aggregator and the social phase
    #[serde(default = "default_social_platforms")]
    pub social_platforms: Vec<String>,

    #[serde(default)]
    pub endpoints: ProviderEndpoints,

    #[serde(default)]
    pub quality: QualityPolicy,

    #[serde(default)]
    pub virality: ViralityThresholds,

    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub deep_navigation: DeepNavigationConfig,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            provider_timeout_secs: default_provider_timeout_secs(),
            results_per_provider: default_results_per_provider(),
            output_dir: default_output_dir(),
            google_cse_id: None,
            social_platforms: default_social_platforms(),
            endpoints: ProviderEndpoints::default(),
            quality: QualityPolicy::default(),
            virality: ViralityThresholds::default(),
            extraction: ExtractionConfig::default(),
            capture: CaptureConfig::default(),
            deep_navigation: DeepNavigationConfig::default(),
        }
    }
}

impl CollectorConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path.as_ref())
            .map_err(|e| CollectError::Config(format!("{}: {e}", path.as_ref().display())))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| CollectError::Config(e.to_string()))?;
        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CollectError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `WEBDRIVER_URL`, `GOOGLE_CSE_ID`, `SUPADATA_API_URL` and
    /// `COLLECTOR_OUTPUT_DIR` when set and non-empty
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Same as [`CollectorConfig::with_env_overrides`] with a custom lookup
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(url) = get("WEBDRIVER_URL") {
            self.capture.webdriver_url = url;
        }
        if let Some(cse) = get("GOOGLE_CSE_ID") {
            self.google_cse_id = Some(cse);
        }
        if let Some(url) = get("SUPADATA_API_URL") {
            self.endpoints.supadata = url;
        }
        if let Some(dir) = get("COLLECTOR_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        self
    }

    /// Reject settings that would stall the collector
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(CollectError::Config("max_concurrency must be at least 1".into()));
        }
        if self.extraction.max_concurrency == 0 || self.capture.max_concurrency == 0 {
            return Err(CollectError::Config(
                "extraction and capture concurrency must be at least 1".into(),
            ));
        }
        if self.deep_navigation.depth == 0 {
            return Err(CollectError::Config("deep navigation depth must be at least 1".into()));
        }
        Ok(())
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    /// Directory holding one session's artifacts
    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.output_dir.join(session_id)
    }
}

fn default_max_concurrency() -> usize {
    3
}

fn default_provider_timeout_secs() -> u64 {
    30
}

fn default_results_per_provider() -> usize {
    10
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("analyses_data")
}

fn default_social_platforms() -> Vec<String> {
    vec![
        "instagram".to_string(),
        "facebook".to_string(),
        "tiktok".to_string(),
    ]
}

fn default_firecrawl_url() -> String {
    "https://api.firecrawl.dev".to_string()
}

fn default_jina_search_url() -> String {
    "https://s.jina.ai".to_string()
}

fn default_jina_reader_url() -> String {
    "https://r.jina.ai".to_string()
}

fn default_google_url() -> String {
    "https://www.googleapis.com/customsearch/v1".to_string()
}

fn default_exa_url() -> String {
    "https://api.exa.ai".to_string()
}

fn default_serper_url() -> String {
    "https://google.serper.dev".to_string()
}

fn default_youtube_url() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

fn default_supadata_url() -> String {
    "https://api.supadata.ai/v1/social/search".to_string()
}

fn default_length_bands() -> Vec<(usize, f64)> {
    vec![(1000, 40.0), (500, 20.0), (100, 10.0)]
}

fn default_keyword_points() -> f64 {
    5.0
}

fn default_preferred_points() -> f64 {
    20.0
}

fn default_blocked_penalty() -> f64 {
    30.0
}

fn default_preferred_domains() -> DomainList {
    DomainList::new([
        "g1.globo.com",
        "exame.com",
        "valor.globo.com",
        "estadao.com.br",
        "folha.uol.com.br",
        "canaltech.com.br",
        "tecmundo.com.br",
        "olhardigital.com.br",
        "infomoney.com.br",
        "startse.com",
        "revistapegn.globo.com",
        "epocanegocios.globo.com",
        "istoedinheiro.com.br",
        "mobiletime.com.br",
        "scielo.br",
        "ibge.gov.br",
        "fiocruz.br",
    ])
}

fn default_blocked_domains() -> DomainList {
    DomainList::new(["airbnb.com"])
}

fn default_viral_likes() -> u64 {
    1000
}

fn default_viral_comments() -> u64 {
    100
}

fn default_viral_shares() -> u64 {
    50
}

fn default_primary_min_chars() -> usize {
    100
}

fn default_fallback_min_chars() -> usize {
    50
}

fn default_extraction_timeout_secs() -> u64 {
    20
}

fn default_extraction_concurrency() -> usize {
    3
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_page_load_timeout_secs() -> u64 {
    30
}

fn default_body_wait_secs() -> u64 {
    10
}

fn default_settle_delay_ms() -> u64 {
    2000
}

fn default_request_delay_ms() -> u64 {
    500
}

fn default_capture_concurrency() -> usize {
    2
}

fn default_high_value_score() -> f64 {
    80.0
}

fn default_min_quality_score() -> f64 {
    50.0
}

fn default_top_n() -> usize {
    8
}

fn default_deep_depth() -> u32 {
    2
}

fn default_extract_per_engine() -> usize {
    5
}

fn default_related_queries() -> usize {
    3
}

fn default_deep_delay_ms() -> u64 {
    500
}
