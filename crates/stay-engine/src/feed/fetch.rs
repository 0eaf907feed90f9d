//! Feed transport -- download a third-party calendar feed.
//!
//! The fetch is one blocking request bounded by an explicit timeout. Every
//! transport failure (unreachable host, timeout, non-success status, body
//! decoding) becomes `StayError::UpstreamFetch`, keeping it distinct from a
//! body that arrived but is not a calendar (`StayError::Parse`).

use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{Result, StayError};

/// Source of raw feed text for a URL.
pub trait FeedFetcher {
    fn fetch(&self, url: &str) -> Result<String>;
}

impl<F> FeedFetcher for F
where
    F: Fn(&str) -> Result<String>,
{
    fn fetch(&self, url: &str) -> Result<String> {
        self(url)
    }
}

/// Blocking HTTP(S) fetcher backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFeedFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFeedFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| StayError::UpstreamFetch(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::new(config.fetch_timeout(), &config.user_agent)
    }
}

impl FeedFetcher for HttpFeedFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        let url = normalize_feed_url(url)?;
        debug!(%url, timeout_secs = self.timeout.as_secs(), "fetching calendar feed");

        let response = self.client.get(&url).send().map_err(|e| {
            let reason = describe(&e, self.timeout);
            warn!(%url, %reason, "calendar feed fetch failed");
            StayError::UpstreamFetch(format!("{}: {}", url, reason))
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "calendar feed returned non-success status");
            return Err(StayError::UpstreamFetch(format!(
                "{} returned HTTP {}",
                url, status
            )));
        }

        response.text().map_err(|e| {
            StayError::UpstreamFetch(format!("{}: {}", url, describe(&e, self.timeout)))
        })
    }
}

/// Accept `webcal://` links as HTTPS and reject anything that is not HTTP(S).
pub fn normalize_feed_url(url: &str) -> Result<String> {
    let url = url.trim();
    let lower = url.to_ascii_lowercase();
    if let Some(rest) = lower.strip_prefix("webcal://") {
        // Keep the caller's casing after the scheme.
        return Ok(format!("https://{}", &url[url.len() - rest.len()..]));
    }
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Ok(url.to_string());
    }
    Err(StayError::Validation(format!(
        "feed URL '{}' must use http, https or webcal",
        url
    )))
}

fn describe(err: &reqwest::Error, timeout: Duration) -> String {
    if err.is_timeout() {
        format!("timed out after {}s", timeout.as_secs())
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        err.to_string()
    }
}
