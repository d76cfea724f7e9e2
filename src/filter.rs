use crate::results::ResultRecord;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

/// Configuration for deciding which URLs are worth extracting or capturing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlFilterConfig {
    /// Regex patterns for URLs to include (if empty, all URLs are included unless excluded)
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Regex patterns for URLs to exclude (these take precedence over include patterns)
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
}

fn default_exclude_patterns() -> Vec<String> {
    vec![
        // Binary assets never carry readable content
        r"(?i)\.(jpg|jpeg|png|gif|webp|css|js|ico|svg|woff|woff2|ttf|eot|pdf|zip|mp4|mp3)(\?.*)?$"
            .to_string(),
    ]
}

impl Default for UrlFilterConfig {
    fn default() -> Self {
        Self {
            include_patterns: Vec::new(),
            exclude_patterns: default_exclude_patterns(),
        }
    }
}

/// URL filter that uses regex patterns to reject assets and non-http links
#[derive(Debug)]
pub struct UrlFilter {
    include_regexes: Vec<Regex>,
    exclude_regexes: Vec<Regex>,
}

impl Default for UrlFilter {
    fn default() -> Self {
        Self::new(UrlFilterConfig::default()).expect("Default regex patterns should be valid")
    }
}

impl UrlFilter {
    /// Create a new URL filter from configuration
    pub fn new(config: UrlFilterConfig) -> Result<Self, regex::Error> {
        let mut include_regexes = Vec::with_capacity(config.include_patterns.len());
        for pattern in &config.include_patterns {
            include_regexes.push(Regex::new(pattern)?);
        }

        let mut exclude_regexes = Vec::with_capacity(config.exclude_patterns.len());
        for pattern in &config.exclude_patterns {
            exclude_regexes.push(Regex::new(pattern)?);
        }

        Ok(Self {
            include_regexes,
            exclude_regexes,
        })
    }

    /// Whether a URL should be handed to the extraction strategies
    pub fn should_extract(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return false;
        }

        // Exclusions take precedence
        let url_str = parsed.as_str();
        if self.exclude_regexes.iter().any(|re| re.is_match(url_str)) {
            return false;
        }

        // If include patterns are specified, at least one must match
        self.include_regexes.is_empty() || self.include_regexes.iter().any(|re| re.is_match(url_str))
    }
}

/// Deduplication key: lowercase, scheme-less, fragment-less, no trailing slash.
///
/// `https://Example.com/Page/` and `http://example.com/page#top` share a key.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    match Url::parse(trimmed) {
        Ok(parsed) if parsed.host_str().is_some() => {
            let mut key = parsed.host_str().unwrap_or_default().to_lowercase();
            if let Some(port) = parsed.port() {
                key.push_str(&format!(":{port}"));
            }
            key.push_str(parsed.path().trim_end_matches('/'));
            if let Some(query) = parsed.query() {
                if !query.is_empty() {
                    key.push('?');
                    key.push_str(query);
                }
            }
            key.to_lowercase()
        }
        _ => {
            let without_fragment = trimmed.split('#').next().unwrap_or_default();
            let without_scheme = without_fragment
                .strip_prefix("https://")
                .or_else(|| without_fragment.strip_prefix("http://"))
                .unwrap_or(without_fragment);
            without_scheme.trim_end_matches('/').to_lowercase()
        }
    }
}

/// Lowercased host of a URL
pub fn domain_of(url: &str) -> Option<String> {
    Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// Curated list of domains matched against a URL's host and its parent domains
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainList(Vec<String>);

impl DomainList {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            domains
                .into_iter()
                .map(|d| d.into().trim().trim_start_matches("www.").to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        )
    }

    /// `true` when the URL's host equals a listed domain or is a subdomain of one
    pub fn matches(&self, url: &str) -> bool {
        let Some(host) = domain_of(url) else {
            return false;
        };
        self.0
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Keep the first occurrence of each normalized URL, preserving input order.
/// Records without a URL are dropped.
pub fn dedupe(records: impl IntoIterator<Item = ResultRecord>) -> Vec<ResultRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| {
            let key = normalize_url(&record.url);
            !key.is_empty() && seen.insert(key)
        })
        .collect()
}

/// Number of distinct normalized URLs
pub fn unique_url_count<'a>(records: impl IntoIterator<Item = &'a ResultRecord>) -> usize {
    records
        .into_iter()
        .map(|r| normalize_url(&r.url))
        .filter(|k| !k.is_empty())
        .collect::<HashSet<_>>()
        .len()
}
