use super::ExtractionStrategy;
use crate::credentials::CredentialPool;
use crate::error::{CollectError, Result};
use crate::http::{BROWSER_USER_AGENT, ensure_success, read_json};
use crate::parsers::{ContentType, ParseResult, Parser};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use std::sync::Arc;

/// Full-page readability extraction through the Jina reader endpoint
pub struct JinaReader {
    client: reqwest::Client,
    credentials: Arc<CredentialPool>,
    endpoint: String,
    min_chars: usize,
}

impl JinaReader {
    pub const NAME: &'static str = "jina_reader";

    pub fn new(
        client: reqwest::Client,
        credentials: Arc<CredentialPool>,
        endpoint: &str,
        min_chars: usize,
    ) -> Self {
        Self {
            client,
            credentials,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            min_chars,
        }
    }
}

#[async_trait]
impl ExtractionStrategy for JinaReader {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn min_chars(&self) -> usize {
        self.min_chars
    }

    fn is_available(&self) -> bool {
        self.credentials.is_enabled("JINA")
    }

    async fn attempt(&self, url: &str) -> Result<ParseResult> {
        let key = self
            .credentials
            .next_credential("JINA")
            .ok_or_else(|| CollectError::no_credential("JINA"))?;

        let resp = self
            .client
            .get(format!("{}/{}", self.endpoint, url))
            .header(AUTHORIZATION, format!("Bearer {key}"))
            .header(ACCEPT, "text/plain")
            .send()
            .await?;
        let text = ensure_success(resp).await?.text().await?;

        Ok(Parser::parse(&text, ContentType::Text))
    }
}

#[derive(Debug, Deserialize)]
struct ExaContentsResponse {
    #[serde(default)]
    results: Vec<ExaContent>,
}

#[derive(Debug, Deserialize)]
struct ExaContent {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// Page text from Exa's `/contents` endpoint
pub struct ExaContents {
    client: reqwest::Client,
    credentials: Arc<CredentialPool>,
    endpoint: String,
    min_chars: usize,
}

impl ExaContents {
    pub const NAME: &'static str = "exa_contents";

    pub fn new(
        client: reqwest::Client,
        credentials: Arc<CredentialPool>,
        endpoint: &str,
        min_chars: usize,
    ) -> Self {
        Self {
            client,
            credentials,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            min_chars,
        }
    }
}

#[async_trait]
impl ExtractionStrategy for ExaContents {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn min_chars(&self) -> usize {
        self.min_chars
    }

    fn is_available(&self) -> bool {
        self.credentials.is_enabled("EXA")
    }

    async fn attempt(&self, url: &str) -> Result<ParseResult> {
        let key = self
            .credentials
            .next_credential("EXA")
            .ok_or_else(|| CollectError::no_credential("EXA"))?;

        let body = serde_json::json!({ "urls": [url], "text": true });
        let resp = self
            .client
            .post(format!("{}/contents", self.endpoint))
            .header("x-api-key", key)
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;
        let parsed: ExaContentsResponse = read_json(resp).await?;

        let first = parsed
            .results
            .into_iter()
            .next()
            .ok_or_else(|| CollectError::Parse("contents response had no results".into()))?;
        let text = first.text.unwrap_or_default();

        Ok(ParseResult::new(
            crate::parsers::text::clean_reader_text(&text),
            first.title.filter(|t| !t.trim().is_empty()),
        ))
    }
}

/// Direct fetch followed by a structural HTML parse
pub struct RawHtml {
    client: reqwest::Client,
    min_chars: usize,
}

impl RawHtml {
    pub const NAME: &'static str = "raw_html";

    pub fn new(client: reqwest::Client, min_chars: usize) -> Self {
        Self { client, min_chars }
    }
}

#[async_trait]
impl ExtractionStrategy for RawHtml {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn min_chars(&self) -> usize {
        self.min_chars
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn attempt(&self, url: &str) -> Result<ParseResult> {
        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?;
        let resp = ensure_success(resp).await?;

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.text().await?;

        match ContentType::detect(content_type.as_deref(), url) {
            ContentType::Other => Err(CollectError::Parse(format!(
                "unreadable content type {}",
                content_type.unwrap_or_default()
            ))),
            kind => Ok(Parser::parse(&body, kind)),
        }
    }
}
