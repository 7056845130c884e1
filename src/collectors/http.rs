use std::time::Duration;

use rand::Rng;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use url::Url;

use crate::error::FetchError;

const USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
];

#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Upper bound for a single request, connect to last byte.
    pub timeout: Duration,
    /// Politeness pause after every request, successful or not.
    pub delay: Duration,
}

/// Shared page fetcher for all collectors. Sends browser-like headers and
/// sleeps for the configured delay after each request.
#[derive(Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
    delay: Duration,
}

impl PageFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let user_agent = USER_AGENTS[rand::rng().random_range(0..USER_AGENTS.len())];
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()
            .map_err(FetchError::Http)?;

        Ok(PageFetcher {
            client,
            delay: settings.delay,
        })
    }

    /// GET `url` and return the body text.
    pub async fn get(&self, url: &str) -> Result<String, FetchError> {
        let result = self.get_text(url).await;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        result
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        tracing::debug!("GET {url}");
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status()));
        }
        resp.text().await.map_err(FetchError::Body)
    }
}

/// Build `base` + `path` with form-encoded query parameters.
pub fn search_url(base: &str, path: &str, params: &[(&str, &str)]) -> Result<String, FetchError> {
    let endpoint = format!("{}{path}", base.trim_end_matches('/'));
    let url = Url::parse_with_params(&endpoint, params)?;
    Ok(url.to_string())
}

/// Resolve a possibly relative `href` against `base`.
pub fn absolute_url(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(href).ok().map(String::from)
}

/// True if `url` lives on `base`'s host or one of its subdomains
/// (`uk.linkedin.com` counts as `www.linkedin.com`).
pub fn same_site(url: &str, base: &str) -> bool {
    let (Ok(url), Ok(base)) = (Url::parse(url), Url::parse(base)) else {
        return false;
    };
    let (Some(host), Some(base_host)) = (url.host_str(), base.host_str()) else {
        return false;
    };
    let root = base_host.strip_prefix("www.").unwrap_or(base_host);
    host == root || host.ends_with(&format!(".{root}"))
}
