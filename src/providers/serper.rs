use super::{SearchProvider, credential, finish};
use crate::credentials::CredentialPool;
use crate::error::Result;
use crate::http::read_json;
use crate::results::{ResultRecord, SourceKind};
use crate::session::Query;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

const PROVIDER: &str = "SERPER";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<SearchItem>,
    #[serde(default)]
    news: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    date: Option<String>,
}

/// Serper Google SERP API; `/news` backs the trend variant
pub struct Serper {
    client: reqwest::Client,
    credentials: Arc<CredentialPool>,
    endpoint: String,
    name: &'static str,
    kind: SourceKind,
    path: &'static str,
}

impl Serper {
    pub fn web(client: reqwest::Client, credentials: Arc<CredentialPool>, endpoint: &str) -> Self {
        Self {
            client,
            credentials,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            name: PROVIDER,
            kind: SourceKind::Web,
            path: "search",
        }
    }

    pub fn news(client: reqwest::Client, credentials: Arc<CredentialPool>, endpoint: &str) -> Self {
        Self {
            name: "SERPER_NEWS",
            kind: SourceKind::Trend,
            path: "news",
            ..Self::web(client, credentials, endpoint)
        }
    }

    fn map_response(&self, response: SearchResponse) -> Vec<ResultRecord> {
        let items = if self.path == "news" {
            response.news
        } else {
            response.organic
        };
        items
            .into_iter()
            .map(|item| {
                ResultRecord::new(item.title, item.link, item.snippet, self.name)
                    .with_published_at(item.date)
            })
            .collect()
    }
}

#[async_trait]
impl SearchProvider for Serper {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn is_enabled(&self) -> bool {
        self.credentials.is_enabled(PROVIDER)
    }

    async fn fetch(&self, query: &Query, limit: usize) -> Result<Vec<ResultRecord>> {
        let key = credential(&self.credentials, PROVIDER)?;
        let mut body = serde_json::json!({ "q": query.text, "num": limit });
        if let Some(gl) = query.context.region() {
            body["gl"] = serde_json::Value::String(gl.to_lowercase());
        }
        if let Some(hl) = query.context.language() {
            body["hl"] = serde_json::Value::String(hl);
        }

        let resp = self
            .client
            .post(format!("{}/{}", self.endpoint, self.path))
            .header("X-API-KEY", key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;
        let response: SearchResponse = read_json(resp).await?;

        Ok(finish(self.map_response(response), limit))
    }
}
