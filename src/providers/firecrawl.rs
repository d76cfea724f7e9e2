use super::{SearchProvider, credential, finish};
use crate::credentials::CredentialPool;
use crate::error::{CollectError, Result};
use crate::http::read_json;
use crate::results::{ResultRecord, SourceKind};
use crate::session::Query;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

const PROVIDER: &str = "FIRECRAWL";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default = "default_true")]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Vec<SearchItem>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    markdown: Option<String>,
}

fn map_response(response: SearchResponse, source: &str) -> Result<Vec<ResultRecord>> {
    if !response.success {
        return Err(CollectError::Parse(
            response.error.unwrap_or_else(|| "search reported failure".to_string()),
        ));
    }
    Ok(response
        .data
        .into_iter()
        .map(|item| {
            let content = item
                .markdown
                .filter(|m| !m.trim().is_empty())
                .or(item.description)
                .unwrap_or_default();
            ResultRecord::new(item.title.unwrap_or_default(), item.url, content, source)
        })
        .collect())
}

async fn post_search(
    client: &reqwest::Client,
    credentials: &CredentialPool,
    endpoint: &str,
    query: &str,
    limit: usize,
) -> Result<SearchResponse> {
    let key = credential(credentials, PROVIDER)?;
    let body = serde_json::json!({ "query": query, "limit": limit });
    let resp = client
        .post(format!("{endpoint}/v1/search"))
        .header("Authorization", format!("Bearer {key}"))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;
    read_json(resp).await
}

/// Firecrawl web search
pub struct Firecrawl {
    client: reqwest::Client,
    credentials: Arc<CredentialPool>,
    endpoint: String,
}

impl Firecrawl {
    pub fn new(client: reqwest::Client, credentials: Arc<CredentialPool>, endpoint: &str) -> Self {
        Self {
            client,
            credentials,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SearchProvider for Firecrawl {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Web
    }

    fn is_enabled(&self) -> bool {
        self.credentials.is_enabled(PROVIDER)
    }

    async fn fetch(&self, query: &Query, limit: usize) -> Result<Vec<ResultRecord>> {
        let response =
            post_search(&self.client, &self.credentials, &self.endpoint, &query.text, limit).await?;
        Ok(finish(map_response(response, PROVIDER)?, limit))
    }
}

/// Domain searched for a social platform name
pub fn platform_domain(platform: &str) -> Option<&'static str> {
    match platform.to_lowercase().as_str() {
        "instagram" => Some("instagram.com"),
        "facebook" => Some("facebook.com"),
        "tiktok" => Some("tiktok.com"),
        "youtube" => Some("youtube.com"),
        "linkedin" => Some("linkedin.com"),
        "twitter" | "x" => Some("x.com"),
        _ => None,
    }
}

/// Social search through Firecrawl, one `site:` query per platform
pub struct FirecrawlSocial {
    client: reqwest::Client,
    credentials: Arc<CredentialPool>,
    endpoint: String,
    platforms: Vec<String>,
}

impl FirecrawlSocial {
    pub const NAME: &'static str = "FIRECRAWL_SOCIAL";

    pub fn new(
        client: reqwest::Client,
        credentials: Arc<CredentialPool>,
        endpoint: &str,
        platforms: Vec<String>,
    ) -> Self {
        Self {
            client,
            credentials,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            platforms,
        }
    }
}

#[async_trait]
impl SearchProvider for FirecrawlSocial {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Social
    }

    fn is_enabled(&self) -> bool {
        self.credentials.is_enabled(PROVIDER)
            && self.platforms.iter().any(|p| platform_domain(p).is_some())
    }

    async fn fetch(&self, query: &Query, limit: usize) -> Result<Vec<ResultRecord>> {
        let platforms: Vec<(&String, &str)> = self
            .platforms
            .iter()
            .filter_map(|p| platform_domain(p).map(|d| (p, d)))
            .collect();
        let per_platform = limit.div_ceil(platforms.len().max(1)).max(1);

        let mut records = Vec::new();
        let mut last_error = None;
        for (platform, domain) in platforms {
            let site_query = format!("{} site:{}", query.text, domain);
            let mapped = post_search(&self.client, &self.credentials, &self.endpoint, &site_query, per_platform)
                .await
                .and_then(|r| map_response(r, Self::NAME));
            match mapped {
                Ok(found) => records.extend(
                    finish(found, per_platform)
                        .into_iter()
                        .map(|r| r.with_platform(platform.to_lowercase())),
                ),
                Err(e) => {
                    ::log::warn!("{} search for {} failed: {}", Self::NAME, platform, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if records.is_empty() => Err(e),
            _ => Ok(finish(records, limit)),
        }
    }
}
