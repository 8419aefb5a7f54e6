use anyhow::{anyhow, Context, Result};
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub struct PageFetcher {
    client: reqwest::blocking::Client,
}

impl PageFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }

    pub fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("Failed to fetch {url}"))?;

        if !response.status().is_success() {
            return Err(anyhow!("HTTP error {} fetching {}", response.status(), url));
        }

        let body = response.text().context("Failed to read response body")?;
        if body.trim().is_empty() {
            return Err(anyhow!("Empty response from {url}"));
        }
        Ok(body)
    }
}
