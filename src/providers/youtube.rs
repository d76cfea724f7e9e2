use super::{SearchProvider, credential, finish, lenient_count};
use crate::credentials::CredentialPool;
use crate::error::Result;
use crate::http::read_json;
use crate::results::{EngagementMetrics, ResultRecord, SourceKind};
use crate::session::Query;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

const PROVIDER: &str = "YOUTUBE";

/// Data API page size cap
const MAX_RESULTS: usize = 50;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    id: VideoId,
    #[serde(default)]
    snippet: Snippet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoId {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    #[serde(default)]
    statistics: Statistics,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    #[serde(default, deserialize_with = "lenient_count")]
    like_count: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    comment_count: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    view_count: u64,
}

/// YouTube Data API v3 video search with engagement statistics
pub struct YouTube {
    client: reqwest::Client,
    credentials: Arc<CredentialPool>,
    endpoint: String,
}

impl YouTube {
    pub fn new(client: reqwest::Client, credentials: Arc<CredentialPool>, endpoint: &str) -> Self {
        Self {
            client,
            credentials,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// Second request attaching like/comment/view counts to the found videos
    async fn statistics(&self, ids: &[String]) -> Result<HashMap<String, EngagementMetrics>> {
        let key = credential(&self.credentials, PROVIDER)?;
        let joined = ids.join(",");
        let resp = self
            .client
            .get(format!("{}/videos", self.endpoint))
            .query(&[("part", "statistics"), ("id", joined.as_str()), ("key", key.as_str())])
            .send()
            .await?;
        let response: VideosResponse = read_json(resp).await?;
        Ok(response
            .items
            .into_iter()
            .map(|item| {
                let engagement = EngagementMetrics {
                    likes: item.statistics.like_count,
                    comments: item.statistics.comment_count,
                    shares: 0,
                    views: item.statistics.view_count,
                };
                (item.id, engagement)
            })
            .collect())
    }
}

fn map_search(response: SearchResponse) -> Vec<(String, ResultRecord)> {
    response
        .items
        .into_iter()
        .filter_map(|item| {
            let id = item.id.video_id.filter(|id| !id.is_empty())?;
            let record = ResultRecord::new(
                item.snippet.title,
                format!("https://www.youtube.com/watch?v={id}"),
                item.snippet.description,
                PROVIDER,
            )
            .with_platform("youtube")
            .with_published_at(item.snippet.published_at);
            Some((id, record))
        })
        .collect()
}

#[async_trait]
impl SearchProvider for YouTube {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Video
    }

    fn is_enabled(&self) -> bool {
        self.credentials.is_enabled(PROVIDER)
    }

    async fn fetch(&self, query: &Query, limit: usize) -> Result<Vec<ResultRecord>> {
        let key = credential(&self.credentials, PROVIDER)?;
        let max_results = limit.clamp(1, MAX_RESULTS).to_string();
        let mut params = vec![
            ("part", "snippet".to_string()),
            ("q", query.text.clone()),
            ("type", "video".to_string()),
            ("maxResults", max_results),
            ("key", key),
        ];
        if let Some(region) = query.context.region() {
            params.push(("regionCode", region));
        }
        if let Some(language) = query.context.language() {
            params.push(("relevanceLanguage", language));
        }

        let resp = self
            .client
            .get(format!("{}/search", self.endpoint))
            .query(&params)
            .send()
            .await?;
        let found = map_search(read_json(resp).await?);
        if found.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = found.iter().map(|(id, _)| id.clone()).collect();
        let stats = match self.statistics(&ids).await {
            Ok(stats) => stats,
            Err(e) => {
                ::log::warn!("{} statistics unavailable: {}", PROVIDER, e);
                HashMap::new()
            }
        };

        Ok(finish(
            found.into_iter().map(|(id, record)| match stats.get(&id) {
                Some(engagement) => record.with_engagement(*engagement),
                None => record,
            }),
            limit,
        ))
    }
}
