use super::{SearchProvider, credential, finish, lenient_count};
use crate::credentials::CredentialPool;
use crate::error::Result;
use crate::http::read_json;
use crate::results::{EngagementMetrics, ResultRecord, SourceKind};
use crate::session::Query;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

const PROVIDER: &str = "SUPADATA";

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    platforms: &'a [String],
    num_results: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: BTreeMap<String, Vec<Post>>,
}

#[derive(Debug, Deserialize)]
struct Post {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    text: String,
    #[serde(default, deserialize_with = "lenient_count")]
    likes: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    comments: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    shares: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    views: u64,
    #[serde(default)]
    published_at: Option<String>,
}

/// Social-data aggregator covering several platforms in one call
pub struct Supadata {
    client: reqwest::Client,
    credentials: Arc<CredentialPool>,
    endpoint: String,
    platforms: Vec<String>,
}

impl Supadata {
    pub fn new(
        client: reqwest::Client,
        credentials: Arc<CredentialPool>,
        endpoint: &str,
        platforms: Vec<String>,
    ) -> Self {
        Self {
            client,
            credentials,
            endpoint: endpoint.to_string(),
            platforms,
        }
    }
}

fn map_response(response: SearchResponse) -> Vec<ResultRecord> {
    response
        .results
        .into_iter()
        .flat_map(|(platform, posts)| {
            posts.into_iter().map(move |post| {
                ResultRecord::new(post.title, post.url, post.text, PROVIDER)
                    .with_platform(platform.to_lowercase())
                    .with_engagement(EngagementMetrics {
                        likes: post.likes,
                        comments: post.comments,
                        shares: post.shares,
                        views: post.views,
                    })
                    .with_published_at(post.published_at)
            })
        })
        .collect()
}

#[async_trait]
impl SearchProvider for Supadata {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Social
    }

    fn is_enabled(&self) -> bool {
        self.credentials.is_enabled(PROVIDER) && !self.platforms.is_empty()
    }

    async fn fetch(&self, query: &Query, limit: usize) -> Result<Vec<ResultRecord>> {
        let key = credential(&self.credentials, PROVIDER)?;
        let request = SearchRequest {
            query: &query.text,
            platforms: &self.platforms,
            num_results: limit,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {key}"))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;
        let response: SearchResponse = read_json(resp).await?;

        // Platforms come back keyed, so the cap applies across all of them
        let records = map_response(response);
        Ok(finish(records, limit.saturating_mul(self.platforms.len().max(1))))
    }
}
