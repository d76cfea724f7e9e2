use crate::error::{CollectError, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Browser-like agent for direct page fetches
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const ERROR_BODY_CHARS: usize = 300;

/// Shared client with a whole-request timeout
pub fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            ::log::warn!("Falling back to a default HTTP client: {}", e);
            reqwest::Client::new()
        })
}

/// Turn a non-2xx response into `CollectError::Http`, keeping a short body excerpt
pub async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(CollectError::Http {
        status: status.as_u16(),
        message: body.chars().take(ERROR_BODY_CHARS).collect(),
    })
}

/// Read the body and decode it, reporting shape mismatches as `Parse`
pub async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let text = ensure_success(resp).await?.text().await?;
    decode(&text)
}

pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| CollectError::Parse(e.to_string()))
}
