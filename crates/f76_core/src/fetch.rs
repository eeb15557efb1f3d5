use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;

pub const USER_AGENT: &str = "f76-scrap/0.2 (personal, low-traffic)";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetch seam used by the extractors. The lazy item-location pass must be
/// able to prove it performed no network access, so tests substitute a
/// counting fake here.
pub trait PageFetcher {
    fn fetch_html(&self, url: &str) -> Result<String>;
}

pub struct PageClient {
    client: Client,
}

impl PageClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build http client")?;
        Ok(Self { client })
    }
}

impl PageFetcher for PageClient {
    // One blocking GET, no retry. A non-success status or timeout is fatal
    // to the calling extractor's run.
    fn fetch_html(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("request to {url} failed"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("GET {url} returned {status}");
        }
        response
            .text()
            .with_context(|| format!("failed to read response body from {url}"))
    }
}
