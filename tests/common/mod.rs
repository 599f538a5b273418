// tests/common/mod.rs
//
// Shared fixtures: feed document builders, a fault-injecting store wrapper
// and a router wired the same way the binary wires it.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use feed_curator::analyze::ContentAnalyzer;
use feed_curator::api::{self, AppState};
use feed_curator::ingest::fetcher::FeedFetcher;
use feed_curator::ingest::{IngestSettings, Ingestor};
use feed_curator::model::{ContentItem, Feedback, FetchJob, JobStatus, Source};
use feed_curator::recommend::Recommender;
use feed_curator::store::{ContentFilter, ContentSearch, MemoryStore, Store, StoreError};

pub const BODY_LIMIT: usize = 1024 * 1024;

pub struct FeedEntry {
    pub title: String,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub body: String,
    pub categories: Vec<String>,
}

impl FeedEntry {
    pub fn new(title: &str, link: &str, age: Duration) -> Self {
        Self {
            title: title.to_string(),
            link: Some(link.to_string()),
            published: Some(Utc::now() - age),
            body: format!("<p>{title} body text</p>"),
            categories: Vec::new(),
        }
    }

    pub fn undated(title: &str, link: &str) -> Self {
        Self {
            published: None,
            ..Self::new(title, link, Duration::zero())
        }
    }

    pub fn with_categories(mut self, tags: &[&str]) -> Self {
        self.categories = tags.iter().map(|t| t.to_string()).collect();
        self
    }
}

pub fn rfc2822(dt: DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S +0000").to_string()
}

/// RSS 2.0 document with `content:encoded` bodies.
pub fn rss_feed(entries: &[FeedEntry]) -> String {
    let mut items = String::new();
    for e in entries {
        items.push_str("<item>");
        items.push_str(&format!("<title>{}</title>", e.title));
        if let Some(link) = &e.link {
            items.push_str(&format!("<link>{link}</link>"));
        }
        items.push_str("<description>summary</description>");
        items.push_str(&format!(
            "<content:encoded><![CDATA[{}]]></content:encoded>",
            e.body
        ));
        if let Some(p) = e.published {
            items.push_str(&format!("<pubDate>{}</pubDate>", rfc2822(p)));
        }
        for c in &e.categories {
            items.push_str(&format!("<category>{c}</category>"));
        }
        items.push_str("</item>");
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
<channel><title>Test feed</title><link>https://feed.test/</link>{items}</channel>
</rss>"#
    )
}

pub fn content(source_id: Uuid, link: &str, published_at: DateTime<Utc>) -> ContentItem {
    ContentItem {
        id: Uuid::new_v4(),
        source_id,
        link: link.to_string(),
        title: format!("item {link}"),
        description: "summary".into(),
        content: None,
        published_at,
        fetched_at: Utc::now(),
        author: None,
        categories: Vec::new(),
    }
}

pub fn ingestor(store: Arc<dyn Store>, fetcher: impl FeedFetcher + 'static) -> Ingestor {
    Ingestor::new(store, Arc::new(fetcher), IngestSettings::default())
}

pub fn app_state(store: Arc<dyn Store>, fetcher: impl FeedFetcher + 'static) -> AppState {
    AppState {
        store: store.clone(),
        ingestor: ingestor(store.clone(), fetcher),
        analyzer: Arc::new(ContentAnalyzer::default()),
        recommender: Arc::new(Recommender::new(store)),
    }
}

pub fn test_router(state: AppState) -> Router {
    api::router(state)
}

/// Delegates to a [`MemoryStore`], failing selected operations.
#[derive(Default)]
pub struct FailingStore {
    pub inner: MemoryStore,
    pub fail_links: HashSet<String>,
    pub fail_list_sources: bool,
}

impl FailingStore {
    pub fn failing_link(link: &str) -> Self {
        Self {
            fail_links: [link.to_string()].into_iter().collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Store for FailingStore {
    async fn list_sources(&self) -> Result<Vec<Source>, StoreError> {
        if self.fail_list_sources {
            return Err(StoreError::Backend("sources table unavailable".into()));
        }
        self.inner.list_sources().await
    }
    async fn get_source(&self, id: Uuid) -> Result<Option<Source>, StoreError> {
        self.inner.get_source(id).await
    }
    async fn create_source(&self, source: Source) -> Result<Source, StoreError> {
        self.inner.create_source(source).await
    }
    async fn mark_source_fetched(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.inner.mark_source_fetched(id, at).await
    }
    async fn content_exists(&self, link: &str) -> Result<bool, StoreError> {
        self.inner.content_exists(link).await
    }
    async fn get_content(&self, id: Uuid) -> Result<Option<ContentItem>, StoreError> {
        self.inner.get_content(id).await
    }
    async fn insert_content(&self, item: ContentItem) -> Result<ContentItem, StoreError> {
        if self.fail_links.contains(&item.link) {
            return Err(StoreError::Backend("disk full".into()));
        }
        self.inner.insert_content(item).await
    }
    async fn list_contents(&self, filter: &ContentFilter) -> Result<Vec<ContentItem>, StoreError> {
        self.inner.list_contents(filter).await
    }
    async fn search_contents(
        &self,
        search: &ContentSearch,
    ) -> Result<Vec<ContentItem>, StoreError> {
        self.inner.search_contents(search).await
    }
    async fn create_job(&self, job: FetchJob) -> Result<(), StoreError> {
        self.inner.create_job(job).await
    }
    async fn get_job(&self, id: Uuid) -> Result<Option<FetchJob>, StoreError> {
        self.inner.get_job(id).await
    }
    async fn transition_job(&self, id: Uuid, to: JobStatus) -> Result<FetchJob, StoreError> {
        self.inner.transition_job(id, to).await
    }
    async fn append_job_error(&self, id: Uuid, message: String) -> Result<(), StoreError> {
        self.inner.append_job_error(id, message).await
    }
    async fn set_job_items(&self, id: Uuid, items_processed: usize) -> Result<(), StoreError> {
        self.inner.set_job_items(id, items_processed).await
    }
    async fn create_feedback(&self, feedback: Feedback) -> Result<Feedback, StoreError> {
        self.inner.create_feedback(feedback).await
    }
    async fn list_feedback_by_user(&self, user_id: &str) -> Result<Vec<Feedback>, StoreError> {
        self.inner.list_feedback_by_user(user_id).await
    }
}
