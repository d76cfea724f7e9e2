use super::{BrowserLauncher, BrowserSession, PageMetadata};
use crate::error::{CollectError, Result};
use async_trait::async_trait;
use fantoccini::wd::{Capabilities, TimeoutConfiguration};
use fantoccini::{Client, ClientBuilder, Locator};
use std::time::Duration;

/// Common local WebDriver endpoints tried when the configured one refuses
const FALLBACK_URLS: [&str; 3] = [
    "http://localhost:9515", // ChromeDriver default
    "http://127.0.0.1:4444", // IP instead of localhost
    "http://localhost:4444",
];

const CHROME_ARGS: [&str; 5] = [
    "--headless",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--window-size=1920,1080",
];

fn headless_chrome() -> Capabilities {
    let mut caps = Capabilities::new();
    caps.insert("browserName".to_string(), serde_json::json!("chrome"));
    caps.insert(
        "goog:chromeOptions".to_string(),
        serde_json::json!({ "args": CHROME_ARGS }),
    );
    caps
}

/// Opens a fresh headless Chrome session per launch
pub struct WebDriverLauncher {
    webdriver_url: String,
}

impl WebDriverLauncher {
    pub fn new(webdriver_url: &str) -> Self {
        Self {
            webdriver_url: webdriver_url.to_string(),
        }
    }

    async fn connect(url: &str) -> std::result::Result<Client, String> {
        let mut builder = ClientBuilder::native();
        builder.capabilities(headless_chrome());
        builder.connect(url).await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        match Self::connect(&self.webdriver_url).await {
            Ok(client) => {
                ::log::debug!("Connected to WebDriver at {}", self.webdriver_url);
                return Ok(Box::new(WebDriverSession { client }));
            }
            Err(e) => {
                ::log::error!("Failed to connect to WebDriver at {}: {}", self.webdriver_url, e);
            }
        }

        for url in FALLBACK_URLS {
            if url == self.webdriver_url {
                continue;
            }
            ::log::info!("Trying fallback WebDriver URL: {}", url);
            if let Ok(client) = Self::connect(url).await {
                ::log::debug!("Connected to fallback WebDriver at {}", url);
                return Ok(Box::new(WebDriverSession { client }));
            }
        }

        ::log::error!(
            "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
        );
        Err(CollectError::CaptureFailure(format!(
            "no WebDriver reachable at {} or fallbacks",
            self.webdriver_url
        )))
    }
}

struct WebDriverSession {
    client: Client,
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn load(&mut self, url: &str, page_load: Duration, body_wait: Duration) -> Result<()> {
        self.client
            .update_timeouts(TimeoutConfiguration::new(None, Some(page_load), None))
            .await?;
        self.client.goto(url).await?;
        self.client
            .wait()
            .at_most(body_wait)
            .for_element(Locator::Css("body"))
            .await?;
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        Ok(self.client.screenshot().await?)
    }

    async fn metadata(&mut self) -> PageMetadata {
        let title = self.client.title().await.ok().filter(|t| !t.trim().is_empty());
        let final_url = self.client.current_url().await.ok().map(|u| u.to_string());
        let description = match self
            .client
            .find(Locator::Css(r#"meta[name="description"]"#))
            .await
        {
            Ok(meta) => meta.attr("content").await.ok().flatten(),
            Err(_) => None,
        };
        PageMetadata {
            title,
            final_url,
            description: description.filter(|d| !d.trim().is_empty()),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}
