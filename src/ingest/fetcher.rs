// src/ingest/fetcher.rs
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::ingest::parse::parse_feed;
use crate::ingest::types::Candidate;

pub const DEFAULT_USER_AGENT: &str = concat!("feed-curator/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected http status {0}")]
    Status(u16),
    #[error("malformed feed: {0}")]
    Malformed(String),
    #[error("feed unavailable: {0}")]
    Unavailable(String),
}

/// Retrieves one feed and normalizes it into candidates.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<Candidate>, FetchError>;
}

/// reqwest-backed fetcher with a per-request time budget.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<Candidate>, FetchError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = resp.text().await?;
        parse_feed(&body)
    }
}

/// Serves canned documents keyed by URL. Unknown URLs are unavailable.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    feeds: HashMap<String, Result<String, String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(mut self, url: impl Into<String>, document: impl Into<String>) -> Self {
        self.feeds.insert(url.into(), Ok(document.into()));
        self
    }

    pub fn with_failure(mut self, url: impl Into<String>, reason: impl Into<String>) -> Self {
        self.feeds.insert(url.into(), Err(reason.into()));
        self
    }
}

#[async_trait]
impl FeedFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<Candidate>, FetchError> {
        match self.feeds.get(url) {
            Some(Ok(doc)) => parse_feed(doc),
            Some(Err(reason)) => Err(FetchError::Unavailable(reason.clone())),
            None => Err(FetchError::Unavailable(format!("no feed registered for {url}"))),
        }
    }
}
