use super::{SearchProvider, credential, finish};
use crate::credentials::CredentialPool;
use crate::error::{CollectError, Result};
use crate::http::read_json;
use crate::results::{ResultRecord, SourceKind};
use crate::session::Query;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

const PROVIDER: &str = "GOOGLE";

/// Custom Search returns at most this many items per request
const MAX_NUM: usize = 10;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Google Custom Search JSON API; needs a search engine id besides the key
pub struct GoogleSearch {
    client: reqwest::Client,
    credentials: Arc<CredentialPool>,
    endpoint: String,
    cse_id: Option<String>,
}

impl GoogleSearch {
    pub fn new(
        client: reqwest::Client,
        credentials: Arc<CredentialPool>,
        endpoint: &str,
        cse_id: Option<String>,
    ) -> Self {
        Self {
            client,
            credentials,
            endpoint: endpoint.to_string(),
            cse_id: cse_id.filter(|id| !id.trim().is_empty()),
        }
    }
}

#[async_trait]
impl SearchProvider for GoogleSearch {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Web
    }

    fn is_enabled(&self) -> bool {
        self.cse_id.is_some() && self.credentials.is_enabled(PROVIDER)
    }

    async fn fetch(&self, query: &Query, limit: usize) -> Result<Vec<ResultRecord>> {
        let cx = self
            .cse_id
            .as_deref()
            .ok_or_else(|| CollectError::no_credential("GOOGLE_CSE_ID"))?;
        let key = credential(&self.credentials, PROVIDER)?;

        let num = limit.clamp(1, MAX_NUM).to_string();
        let mut params = vec![
            ("key", key.as_str()),
            ("cx", cx),
            ("q", query.text.as_str()),
            ("num", num.as_str()),
        ];
        let language = query.context.language();
        let region = query.context.region().map(|r| r.to_lowercase());
        if let Some(hl) = language.as_deref() {
            params.push(("hl", hl));
        }
        if let Some(gl) = region.as_deref() {
            params.push(("gl", gl));
        }

        let resp = self.client.get(&self.endpoint).query(&params).send().await?;
        let response: SearchResponse = read_json(resp).await?;

        Ok(finish(
            response
                .items
                .into_iter()
                .map(|item| ResultRecord::new(item.title, item.link, item.snippet, PROVIDER)),
            limit,
        ))
    }
}
