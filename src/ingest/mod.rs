// src/ingest/mod.rs
pub mod fetcher;
pub mod import;
pub mod parse;
pub mod supervisor;
pub mod types;

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

use crate::ingest::fetcher::{FeedFetcher, FetchError};
use crate::ingest::supervisor::JobSupervisor;
use crate::ingest::types::{Candidate, SkipReason};
use crate::model::{ContentItem, FetchJob, JobStatus, Source, DEFAULT_LOOKBACK_DAYS};
use crate::store::{Store, StoreError};

/// Failures during a job. The `Display` text is what lands in the job's error list.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to fetch feed {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("failed to store item {link}: {source}")]
    Persist {
        link: String,
        #[source]
        source: StoreError,
    },
    #[error("failed to update source {source_id}: {source}")]
    SourceUpdate {
        source_id: Uuid,
        #[source]
        source: StoreError,
    },
    #[error("failed to resolve sources: {0}")]
    SourceResolution(String),
    #[error("job cancelled before source {0}")]
    Cancelled(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What to do with an entry carrying neither a published nor an updated time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndatedPolicy {
    #[default]
    Skip,
    FetchTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSettings {
    pub default_days: i64,
    pub undated: UndatedPolicy,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            default_days: DEFAULT_LOOKBACK_DAYS,
            undated: UndatedPolicy::Skip,
        }
    }
}

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_jobs_total", "Fetch jobs created.");
        describe_counter!("ingest_items_stored_total", "Items persisted by fetch jobs.");
        describe_counter!(
            "ingest_items_skipped_total",
            "Candidates not stored, labelled by reason."
        );
        describe_counter!(
            "ingest_source_errors_total",
            "Sources whose feed could not be fetched or parsed."
        );
        describe_histogram!("ingest_fetch_ms", "Feed fetch+parse time in milliseconds.");
        describe_gauge!("ingest_jobs_running", "Fetch jobs currently executing.");
    });
}

enum ItemOutcome {
    Stored,
    Skipped(SkipReason),
}

#[derive(Default)]
struct Progress {
    processed: usize,
    errors: usize,
}

/// Fetch job orchestrator. Cheap to clone; every clone shares the same
/// store, fetcher and supervisor.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn Store>,
    fetcher: Arc<dyn FeedFetcher>,
    supervisor: Arc<JobSupervisor>,
    settings: IngestSettings,
}

impl Ingestor {
    pub fn new(store: Arc<dyn Store>, fetcher: Arc<dyn FeedFetcher>, settings: IngestSettings) -> Self {
        Self {
            store,
            fetcher,
            supervisor: Arc::new(JobSupervisor::new()),
            settings,
        }
    }

    /// Persists a `pending` job, starts it in the background and returns
    /// the job as created. Non-positive `days` use the configured default.
    pub async fn create_job(
        &self,
        source_id: Option<Uuid>,
        days: Option<i64>,
    ) -> Result<FetchJob, IngestError> {
        ensure_metrics_described();

        let job = FetchJob::pending(source_id, days, self.settings.default_days);
        self.store.create_job(job.clone()).await?;
        counter!("ingest_jobs_total").increment(1);
        tracing::info!(
            target: "ingest",
            job_id = %job.id,
            source_id = ?job.source_id,
            days = job.days,
            "job created"
        );

        let this = self.clone();
        let cancel = self.supervisor.cancel_signal();
        let queued = job.clone();
        self.supervisor
            .spawn(job.id, async move {
                this.run_job(queued, cancel).await;
            })
            .await;

        Ok(job)
    }

    pub async fn get_job(&self, id: Uuid) -> Result<Option<FetchJob>, StoreError> {
        self.store.get_job(id).await
    }

    /// Blocks until the job's task has finished. Also `true` for a job
    /// that already reached a terminal state, so repeated waits agree.
    /// `false` for unknown jobs and untracked jobs that never finished.
    pub async fn wait(&self, job_id: Uuid) -> bool {
        if self.supervisor.wait(job_id).await {
            return true;
        }
        matches!(
            self.store.get_job(job_id).await,
            Ok(Some(job)) if job.status.is_terminal()
        )
    }

    /// Cancels every running job at its next source boundary and drains them.
    pub async fn shutdown(&self) {
        self.supervisor.shutdown().await;
    }

    /// Runs a job to a terminal state and returns the final snapshot.
    ///
    /// A store failure while updating the job record itself is logged and
    /// the job is forced to `failed` where the store still allows it.
    pub async fn run_job(&self, job: FetchJob, cancel: watch::Receiver<bool>) -> FetchJob {
        ensure_metrics_described();
        gauge!("ingest_jobs_running").increment(1.0);
        let result = self.drive(&job, &cancel).await;
        gauge!("ingest_jobs_running").decrement(1.0);

        match result {
            Ok(done) => done,
            Err(e) => {
                tracing::error!(target: "ingest", job_id = %job.id, error = %e, "job record update failed");
                match self.store.transition_job(job.id, JobStatus::Failed).await {
                    Ok(failed) => failed,
                    Err(_) => self.store.get_job(job.id).await.ok().flatten().unwrap_or(job),
                }
            }
        }
    }

    async fn drive(
        &self,
        job: &FetchJob,
        cancel: &watch::Receiver<bool>,
    ) -> Result<FetchJob, StoreError> {
        let sources = match self.resolve_sources(job.source_id).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(target: "ingest", job_id = %job.id, error = %e, "source resolution failed");
                self.store.append_job_error(job.id, e.to_string()).await?;
                let failed = self.store.transition_job(job.id, JobStatus::Failed).await?;
                tracing::info!(target: "ingest", job_id = %job.id, status = %failed.status, "job finished");
                return Ok(failed);
            }
        };

        self.store
            .transition_job(job.id, JobStatus::InProgress)
            .await?;
        tracing::info!(
            target: "ingest",
            job_id = %job.id,
            sources = sources.len(),
            days = job.days,
            "job started"
        );

        let now = Utc::now();
        let cutoff = Duration::try_days(job.days)
            .and_then(|d| now.checked_sub_signed(d))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut progress = Progress::default();
        for source in &sources {
            let cancelled = *cancel.borrow();
            if cancelled {
                self.record(job.id, IngestError::Cancelled(source.id), &mut progress)
                    .await?;
                break;
            }
            self.ingest_source(job.id, source, cutoff, &mut progress)
                .await?;
        }

        let terminal = if progress.errors == 0 {
            JobStatus::Completed
        } else {
            JobStatus::CompletedWithErrors
        };
        let done = self.store.transition_job(job.id, terminal).await?;
        tracing::info!(
            target: "ingest",
            job_id = %job.id,
            status = %done.status,
            items = done.items_processed,
            errors = done.errors.len(),
            "job finished"
        );
        Ok(done)
    }

    async fn resolve_sources(&self, scope: Option<Uuid>) -> Result<Vec<Source>, IngestError> {
        match scope {
            Some(id) => match self.store.get_source(id).await {
                Ok(Some(source)) => Ok(vec![source]),
                Ok(None) => Err(IngestError::SourceResolution(format!("source {id} not found"))),
                Err(e) => Err(IngestError::SourceResolution(e.to_string())),
            },
            None => self
                .store
                .list_sources()
                .await
                .map_err(|e| IngestError::SourceResolution(e.to_string())),
        }
    }

    async fn ingest_source(
        &self,
        job_id: Uuid,
        source: &Source,
        cutoff: DateTime<Utc>,
        progress: &mut Progress,
    ) -> Result<(), StoreError> {
        let t0 = Instant::now();
        let fetched = self.fetcher.fetch(&source.url).await;
        histogram!("ingest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        let candidates = match fetched {
            Ok(c) => c,
            Err(e) => {
                counter!("ingest_source_errors_total").increment(1);
                let err = IngestError::Fetch {
                    url: source.url.clone(),
                    source: e,
                };
                return self.record(job_id, err, progress).await;
            }
        };

        let fetched_at = Utc::now();
        tracing::debug!(
            target: "ingest",
            job_id = %job_id,
            source = %source.url,
            candidates = candidates.len(),
            "feed fetched"
        );

        for candidate in candidates {
            match self.accept(source, candidate, cutoff, fetched_at).await {
                Ok(ItemOutcome::Stored) => {
                    progress.processed += 1;
                    counter!("ingest_items_stored_total").increment(1);
                    self.store
                        .set_job_items(job_id, progress.processed)
                        .await?;
                }
                Ok(ItemOutcome::Skipped(reason)) => {
                    counter!("ingest_items_skipped_total", "reason" => reason.as_str()).increment(1);
                }
                Err(e) => self.record(job_id, e, progress).await?,
            }
        }

        if let Err(e) = self.store.mark_source_fetched(source.id, fetched_at).await {
            let err = IngestError::SourceUpdate {
                source_id: source.id,
                source: e,
            };
            self.record(job_id, err, progress).await?;
        }
        Ok(())
    }

    async fn accept(
        &self,
        source: &Source,
        candidate: Candidate,
        cutoff: DateTime<Utc>,
        fetched_at: DateTime<Utc>,
    ) -> Result<ItemOutcome, IngestError> {
        let published_at = match (candidate.published_at, self.settings.undated) {
            (Some(t), _) => t,
            (None, UndatedPolicy::FetchTime) => fetched_at,
            (None, UndatedPolicy::Skip) => {
                tracing::debug!(target: "ingest", source = %source.url, title = %candidate.title, "skip undated item");
                return Ok(ItemOutcome::Skipped(SkipReason::Undated));
            }
        };
        if published_at < cutoff {
            tracing::debug!(
                target: "ingest",
                source = %source.url,
                published = %published_at,
                cutoff = %cutoff,
                "skip item older than cutoff"
            );
            return Ok(ItemOutcome::Skipped(SkipReason::Cutoff));
        }
        let Some(link) = candidate.link else {
            tracing::debug!(target: "ingest", source = %source.url, title = %candidate.title, "skip item without link");
            return Ok(ItemOutcome::Skipped(SkipReason::NoLink));
        };

        match self.store.content_exists(&link).await {
            Ok(true) => {
                tracing::debug!(target: "ingest", link = %link, "skip duplicate item");
                return Ok(ItemOutcome::Skipped(SkipReason::Duplicate));
            }
            Ok(false) => {}
            Err(e) => return Err(IngestError::Persist { link, source: e }),
        }

        let item = ContentItem {
            id: Uuid::new_v4(),
            source_id: source.id,
            link: link.clone(),
            title: candidate.title,
            description: candidate.summary,
            content: candidate.body.filter(|b| !b.trim().is_empty()),
            published_at,
            fetched_at,
            author: candidate.author,
            categories: candidate.categories,
        };
        match self.store.insert_content(item).await {
            Ok(_) => Ok(ItemOutcome::Stored),
            // Lost a race with a concurrent job; same outcome as the check above.
            Err(StoreError::DuplicateLink(_)) => {
                tracing::debug!(target: "ingest", link = %link, "skip duplicate item (insert)");
                Ok(ItemOutcome::Skipped(SkipReason::Duplicate))
            }
            Err(e) => Err(IngestError::Persist { link, source: e }),
        }
    }

    async fn record(
        &self,
        job_id: Uuid,
        err: IngestError,
        progress: &mut Progress,
    ) -> Result<(), StoreError> {
        tracing::warn!(target: "ingest", job_id = %job_id, error = %err, "ingest error recorded");
        progress.errors += 1;
        self.store.append_job_error(job_id, err.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_text_names_the_source() {
        let err = IngestError::Fetch {
            url: "https://feed.test/rss".into(),
            source: FetchError::Status(503),
        };
        assert_eq!(
            err.to_string(),
            "failed to fetch feed https://feed.test/rss: unexpected http status 503"
        );
    }

    #[test]
    fn undated_policy_reads_snake_case() {
        #[derive(Deserialize)]
        struct W {
            p: UndatedPolicy,
        }
        let w: W = toml::from_str("p = \"fetch_time\"").unwrap();
        assert_eq!(w.p, UndatedPolicy::FetchTime);
    }
}
