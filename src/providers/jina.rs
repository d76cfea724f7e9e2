use super::{SearchProvider, credential, finish};
use crate::credentials::CredentialPool;
use crate::error::Result;
use crate::http::{decode, ensure_success};
use crate::parsers::text::markdown_links;
use crate::results::{ResultRecord, SourceKind};
use crate::session::Query;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

const PROVIDER: &str = "JINA";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    content: String,
}

/// Jina search (`s.jina.ai`)
pub struct JinaSearch {
    client: reqwest::Client,
    credentials: Arc<CredentialPool>,
    endpoint: String,
}

impl JinaSearch {
    pub fn new(client: reqwest::Client, credentials: Arc<CredentialPool>, endpoint: &str) -> Self {
        Self {
            client,
            credentials,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }
}

/// JSON body when the service honours `Accept`, markdown links otherwise
fn map_body(body: &str) -> Vec<ResultRecord> {
    match decode::<SearchResponse>(body) {
        Ok(response) => response
            .data
            .into_iter()
            .map(|item| {
                let content = if item.content.trim().is_empty() {
                    item.description
                } else {
                    item.content
                };
                ResultRecord::new(item.title, item.url, content, PROVIDER)
            })
            .collect(),
        Err(_) => {
            ::log::debug!("{} answered with text, reading markdown links", PROVIDER);
            markdown_links(body)
                .into_iter()
                .map(|(title, url)| ResultRecord::new(title, url, "", PROVIDER))
                .collect()
        }
    }
}

#[async_trait]
impl SearchProvider for JinaSearch {
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
        let key = credential(&self.credentials, PROVIDER)?;
        let resp = self
            .client
            .get(format!("{}/", self.endpoint))
            .query(&[("q", query.text.as_str())])
            .header("Authorization", format!("Bearer {key}"))
            .header("Accept", "application/json")
            .send()
            .await?;
        let body = ensure_success(resp).await?.text().await?;
        Ok(finish(map_body(&body), limit))
    }
}
