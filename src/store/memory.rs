use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ContentFilter, ContentSearch, Store, StoreError};
use crate::model::{ContentItem, Feedback, FetchJob, JobStatus, Source};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Tables {
    sources: BTreeMap<Uuid, Source>,
    /// Items are kept with empty `categories`; tags live in `categories`.
    contents: BTreeMap<Uuid, ContentItem>,
    categories: BTreeMap<Uuid, BTreeSet<String>>,
    jobs: BTreeMap<Uuid, FetchJob>,
    feedback: BTreeMap<Uuid, Feedback>,
    #[serde(skip)]
    links: HashMap<String, Uuid>,
}

impl Tables {
    fn reindex(&mut self) {
        self.links = self
            .contents
            .values()
            .map(|c| (c.link.clone(), c.id))
            .collect();
    }

    fn assemble(&self, row: &ContentItem) -> ContentItem {
        let mut item = row.clone();
        item.categories = self
            .categories
            .get(&row.id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        item
    }

    fn apply(&mut self, ops: Vec<Op>) {
        for op in ops {
            match op {
                Op::InsertContent(item) => {
                    self.links.insert(item.link.clone(), item.id);
                    self.contents.insert(item.id, item);
                }
                Op::AddCategory(id, tag) => {
                    self.categories.entry(id).or_default().insert(tag);
                }
            }
        }
    }
}

enum Op {
    InsertContent(ContentItem),
    AddCategory(Uuid, String),
}

/// A write scope over the store. Writes are staged and only become visible
/// when the closure passed to [`MemoryStore::transaction`] returns `Ok`.
pub struct Tx<'a> {
    tables: &'a Tables,
    staged: Vec<Op>,
}

impl Tx<'_> {
    fn staged_content(&self, id: Uuid) -> bool {
        self.staged
            .iter()
            .any(|op| matches!(op, Op::InsertContent(c) if c.id == id))
    }

    fn staged_link(&self, link: &str) -> bool {
        self.staged
            .iter()
            .any(|op| matches!(op, Op::InsertContent(c) if c.link == link))
    }

    pub fn insert_content(&mut self, mut item: ContentItem) -> Result<(), StoreError> {
        if !self.tables.sources.contains_key(&item.source_id) {
            return Err(StoreError::MissingSource(item.source_id));
        }
        if self.tables.links.contains_key(&item.link) || self.staged_link(&item.link) {
            return Err(StoreError::DuplicateLink(item.link));
        }
        item.categories.clear();
        self.staged.push(Op::InsertContent(item));
        Ok(())
    }

    pub fn add_category(&mut self, content_id: Uuid, category: &str) -> Result<(), StoreError> {
        if !self.tables.contents.contains_key(&content_id) && !self.staged_content(content_id) {
            return Err(StoreError::MissingContent(content_id));
        }
        let existing = self
            .tables
            .categories
            .get(&content_id)
            .is_some_and(|set| set.contains(category));
        let staged = self
            .staged
            .iter()
            .any(|op| matches!(op, Op::AddCategory(id, c) if *id == content_id && c == category));
        if existing || staged {
            return Err(StoreError::DuplicateCategory {
                content_id,
                category: category.to_string(),
            });
        }
        self.staged
            .push(Op::AddCategory(content_id, category.to_string()));
        Ok(())
    }
}

/// In-process store behind a single `RwLock`.
///
/// When opened with a snapshot path, state is loaded from that JSON file and
/// written back by [`MemoryStore::save`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
    snapshot: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the store, loading `snapshot` if the file exists.
    pub fn open(snapshot: Option<PathBuf>) -> Result<Self, StoreError> {
        let mut tables = match snapshot.as_deref() {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path)?;
                let tables: Tables = serde_json::from_str(&raw)?;
                tracing::info!(
                    target: "store",
                    path = %path.display(),
                    sources = tables.sources.len(),
                    contents = tables.contents.len(),
                    "snapshot loaded"
                );
                tables
            }
            _ => Tables::default(),
        };
        tables.reindex();
        Ok(Self {
            inner: RwLock::new(tables),
            snapshot,
        })
    }

    /// Writes the snapshot via a temp file and rename. No-op without a path.
    pub fn save(&self) -> Result<(), StoreError> {
        let Some(path) = self.snapshot.as_deref() else {
            return Ok(());
        };
        let json = {
            let guard = self.read()?;
            serde_json::to_string_pretty(&*guard)?
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        tracing::info!(target: "store", path = %path.display(), "snapshot saved");
        Ok(())
    }

    /// Runs `f` against staged writes. On `Ok` they are applied, on `Err`
    /// they are dropped and nothing changes.
    pub fn transaction<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Tx<'_>) -> Result<T, StoreError>,
    {
        let mut guard = self.write()?;
        let (out, staged) = {
            let mut tx = Tx {
                tables: &*guard,
                staged: Vec::new(),
            };
            let out = f(&mut tx)?;
            (out, tx.staged)
        };
        guard.apply(staged);
        Ok(out)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }

    fn with_job<F>(&self, id: Uuid, f: F) -> Result<FetchJob, StoreError>
    where
        F: FnOnce(&mut FetchJob) -> Result<(), StoreError>,
    {
        let mut guard = self.write()?;
        let job = guard.jobs.get_mut(&id).ok_or(StoreError::JobNotFound(id))?;
        f(job)?;
        Ok(job.clone())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_sources(&self) -> Result<Vec<Source>, StoreError> {
        let guard = self.read()?;
        let mut out: Vec<Source> = guard.sources.values().cloned().collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn get_source(&self, id: Uuid) -> Result<Option<Source>, StoreError> {
        Ok(self.read()?.sources.get(&id).cloned())
    }

    async fn create_source(&self, source: Source) -> Result<Source, StoreError> {
        let mut guard = self.write()?;
        if guard.sources.values().any(|s| s.url == source.url) {
            return Err(StoreError::DuplicateSourceUrl(source.url));
        }
        guard.sources.insert(source.id, source.clone());
        Ok(source)
    }

    async fn mark_source_fetched(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut guard = self.write()?;
        let source = guard
            .sources
            .get_mut(&id)
            .ok_or(StoreError::MissingSource(id))?;
        source.last_fetched_at = Some(at);
        Ok(())
    }

    async fn content_exists(&self, link: &str) -> Result<bool, StoreError> {
        Ok(self.read()?.links.contains_key(link))
    }

    async fn get_content(&self, id: Uuid) -> Result<Option<ContentItem>, StoreError> {
        let guard = self.read()?;
        Ok(guard.contents.get(&id).map(|row| guard.assemble(row)))
    }

    async fn insert_content(&self, mut item: ContentItem) -> Result<ContentItem, StoreError> {
        let id = item.id;
        let categories = std::mem::take(&mut item.categories);
        self.transaction(|tx| {
            tx.insert_content(item)?;
            for tag in &categories {
                tx.add_category(id, tag)?;
            }
            Ok(())
        })?;
        self.get_content(id)
            .await?
            .ok_or(StoreError::MissingContent(id))
    }

    async fn list_contents(&self, filter: &ContentFilter) -> Result<Vec<ContentItem>, StoreError> {
        let guard = self.read()?;
        let mut out: Vec<ContentItem> = guard
            .contents
            .values()
            .filter(|c| filter.matches(c))
            .map(|c| guard.assemble(c))
            .collect();
        out.sort_by(|a, b| b.published_at.cmp(&a.published_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn search_contents(
        &self,
        search: &ContentSearch,
    ) -> Result<Vec<ContentItem>, StoreError> {
        let guard = self.read()?;
        let mut out: Vec<ContentItem> = guard
            .contents
            .values()
            .filter(|c| search.matches(c))
            .map(|c| guard.assemble(c))
            .collect();
        out.sort_by(|a, b| b.published_at.cmp(&a.published_at).then(a.id.cmp(&b.id)));
        out.truncate(search.limit);
        Ok(out)
    }

    async fn create_job(&self, job: FetchJob) -> Result<(), StoreError> {
        self.write()?.jobs.insert(job.id, job);
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<FetchJob>, StoreError> {
        Ok(self.read()?.jobs.get(&id).cloned())
    }

    async fn transition_job(&self, id: Uuid, to: JobStatus) -> Result<FetchJob, StoreError> {
        self.with_job(id, |job| {
            if !job.status.can_transition_to(to) {
                return Err(StoreError::InvalidTransition {
                    id,
                    from: job.status,
                    to,
                });
            }
            job.status = to;
            if to.is_terminal() {
                job.completed_at = Some(Utc::now());
            }
            Ok(())
        })
    }

    async fn append_job_error(&self, id: Uuid, message: String) -> Result<(), StoreError> {
        self.with_job(id, |job| {
            job.errors.push(message);
            Ok(())
        })
        .map(|_| ())
    }

    async fn set_job_items(&self, id: Uuid, items_processed: usize) -> Result<(), StoreError> {
        self.with_job(id, |job| {
            job.items_processed = items_processed;
            Ok(())
        })
        .map(|_| ())
    }

    async fn create_feedback(&self, feedback: Feedback) -> Result<Feedback, StoreError> {
        let mut guard = self.write()?;
        if !guard.contents.contains_key(&feedback.content_id) {
            return Err(StoreError::MissingContent(feedback.content_id));
        }
        guard.feedback.insert(feedback.id, feedback.clone());
        Ok(feedback)
    }

    async fn list_feedback_by_user(&self, user_id: &str) -> Result<Vec<Feedback>, StoreError> {
        let guard = self.read()?;
        let mut out: Vec<Feedback> = guard
            .feedback
            .values()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(a.id.cmp(&b.id)));
        Ok(out)
    }
}
