use super::{SearchProvider, credential, finish};
use crate::credentials::CredentialPool;
use crate::error::Result;
use crate::http::read_json;
use crate::results::{ResultRecord, SourceKind};
use crate::session::Query;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const PROVIDER: &str = "EXA";

/// Characters of page text requested per result
const TEXT_CHARS: usize = 1000;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    num_results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<&'static str>,
    contents: Contents,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Contents {
    text: TextOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextOptions {
    max_characters: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
}

/// Exa neural search; the news variant feeds the trend phase
pub struct Exa {
    client: reqwest::Client,
    credentials: Arc<CredentialPool>,
    endpoint: String,
    name: &'static str,
    kind: SourceKind,
    category: Option<&'static str>,
}

impl Exa {
    pub fn web(client: reqwest::Client, credentials: Arc<CredentialPool>, endpoint: &str) -> Self {
        Self {
            client,
            credentials,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            name: PROVIDER,
            kind: SourceKind::Web,
            category: None,
        }
    }

    pub fn news(client: reqwest::Client, credentials: Arc<CredentialPool>, endpoint: &str) -> Self {
        Self {
            name: "EXA_NEWS",
            kind: SourceKind::Trend,
            category: Some("news"),
            ..Self::web(client, credentials, endpoint)
        }
    }

    fn map_response(&self, response: SearchResponse) -> Vec<ResultRecord> {
        response
            .results
            .into_iter()
            .map(|item| {
                ResultRecord::new(
                    item.title.unwrap_or_default(),
                    item.url,
                    item.text.unwrap_or_default(),
                    self.name,
                )
                .with_published_at(item.published_date)
            })
            .collect()
    }
}

#[async_trait]
impl SearchProvider for Exa {
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
        let request = SearchRequest {
            query: &query.text,
            num_results: limit,
            category: self.category,
            contents: Contents {
                text: TextOptions {
                    max_characters: TEXT_CHARS,
                },
            },
        };

        let resp = self
            .client
            .post(format!("{}/search", self.endpoint))
            .header("x-api-key", key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;
        let response: SearchResponse = read_json(resp).await?;

        Ok(finish(self.map_response(response), limit))
    }
}
