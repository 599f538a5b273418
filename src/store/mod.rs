//! Persistence capability consumed by ingestion, ranking and the API.
//!
//! The core only depends on the [`Store`] trait. [`MemoryStore`] is the
//! bundled implementation with optional JSON snapshots.

pub mod memory;

pub use memory::{MemoryStore, Tx};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{ContentItem, Feedback, FetchJob, JobStatus, Source};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("content with link {0} already exists")]
    DuplicateLink(String),
    #[error("source with url {0} already exists")]
    DuplicateSourceUrl(String),
    #[error("content {content_id} already has category {category}")]
    DuplicateCategory { content_id: Uuid, category: String },
    #[error("source {0} does not exist")]
    MissingSource(Uuid),
    #[error("content {0} does not exist")]
    MissingContent(Uuid),
    #[error("job {0} not found")]
    JobNotFound(Uuid),
    #[error("job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },
    #[error("store lock poisoned")]
    Poisoned,
    #[error("snapshot io: {0}")]
    SnapshotIo(#[from] std::io::Error),
    #[error("snapshot format: {0}")]
    SnapshotFormat(#[from] serde_json::Error),
    #[error("store backend: {0}")]
    Backend(String),
}

/// Predicate for [`Store::list_contents`]. Empty `source_ids` means every source.
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    pub source_ids: Vec<Uuid>,
    pub published_since: Option<DateTime<Utc>>,
}

impl ContentFilter {
    pub fn matches(&self, item: &ContentItem) -> bool {
        let source_ok = self.source_ids.is_empty() || self.source_ids.contains(&item.source_id);
        let time_ok = self
            .published_since
            .map(|since| item.published_at >= since)
            .unwrap_or(true);
        source_ok && time_ok
    }
}

pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Keyword lookup for [`Store::search_contents`]. An item matches when any
/// keyword occurs in its title, description or body, ignoring case.
#[derive(Debug, Clone)]
pub struct ContentSearch {
    keywords: Vec<String>,
    pub filter: ContentFilter,
    pub limit: usize,
}

impl ContentSearch {
    /// Returns `None` when no non-blank keyword remains.
    pub fn new<I, S>(keywords: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.is_empty() {
            return None;
        }
        Some(Self {
            keywords,
            filter: ContentFilter::default(),
            limit: DEFAULT_SEARCH_LIMIT,
        })
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn matches(&self, item: &ContentItem) -> bool {
        if !self.filter.matches(item) {
            return false;
        }
        let fields = [
            item.title.to_lowercase(),
            item.description.to_lowercase(),
            item.content.as_deref().unwrap_or_default().to_lowercase(),
        ];
        self.keywords
            .iter()
            .any(|k| fields.iter().any(|f| f.contains(k.as_str())))
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn list_sources(&self) -> Result<Vec<Source>, StoreError>;
    async fn get_source(&self, id: Uuid) -> Result<Option<Source>, StoreError>;
    /// Rejects a second source with the same URL.
    async fn create_source(&self, source: Source) -> Result<Source, StoreError>;
    async fn mark_source_fetched(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn content_exists(&self, link: &str) -> Result<bool, StoreError>;
    async fn get_content(&self, id: Uuid) -> Result<Option<ContentItem>, StoreError>;
    /// Persists the item and its categories atomically. Either all of it lands or nothing.
    async fn insert_content(&self, item: ContentItem) -> Result<ContentItem, StoreError>;
    /// Matching items, newest publication first.
    async fn list_contents(&self, filter: &ContentFilter) -> Result<Vec<ContentItem>, StoreError>;
    /// Keyword matches, newest publication first, at most `search.limit`.
    async fn search_contents(&self, search: &ContentSearch)
        -> Result<Vec<ContentItem>, StoreError>;

    async fn create_job(&self, job: FetchJob) -> Result<(), StoreError>;
    async fn get_job(&self, id: Uuid) -> Result<Option<FetchJob>, StoreError>;
    /// Moves the job forward; terminal states also stamp `completed_at`.
    async fn transition_job(&self, id: Uuid, to: JobStatus) -> Result<FetchJob, StoreError>;
    async fn append_job_error(&self, id: Uuid, message: String) -> Result<(), StoreError>;
    async fn set_job_items(&self, id: Uuid, items_processed: usize) -> Result<(), StoreError>;

    async fn create_feedback(&self, feedback: Feedback) -> Result<Feedback, StoreError>;
    /// Newest first.
    async fn list_feedback_by_user(&self, user_id: &str) -> Result<Vec<Feedback>, StoreError>;
}
