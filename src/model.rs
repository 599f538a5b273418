//! Domain records shared by the store, the ingestion pipeline and the API.
//!
//! All timestamps are UTC. JSON field names are camelCase to match the
//! public HTTP contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lookback window used when a job request omits `days` or sends a non-positive value.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 7;

/// A feed the system knows how to retrieve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl Source {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            url: url.into(),
            created_at: Utc::now(),
            last_fetched_at: None,
        }
    }
}

/// One stored feed item. `link` is the canonical deduplication key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: Uuid,
    pub source_id: Uuid,
    pub link: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl ContentItem {
    /// Best available text: full body when present and non-empty, else the summary.
    pub fn body_text(&self) -> &str {
        match self.content.as_deref() {
            Some(c) if !c.trim().is_empty() => c,
            _ => &self.description,
        }
    }
}

/// Lifecycle of a fetch job.
///
/// `pending → in-progress → {completed | completed_with_errors | failed}`,
/// plus `pending → failed` when the source set cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "completed_with_errors")]
    CompletedWithErrors,
    #[serde(rename = "failed")]
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in-progress",
            JobStatus::Completed => "completed",
            JobStatus::CompletedWithErrors => "completed_with_errors",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::CompletedWithErrors | JobStatus::Failed
        )
    }

    /// Transitions only move forward; terminal states accept nothing.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Failed)
                | (InProgress, Completed)
                | (InProgress, CompletedWithErrors)
                | (InProgress, Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of an ingestion job. `errors` is append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchJob {
    #[serde(rename = "jobId")]
    pub id: Uuid,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub items_processed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<Uuid>,
    pub days: i64,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl FetchJob {
    /// New job in `pending`. Non-positive `days` fall back to `default_days`.
    pub fn pending(source_id: Option<Uuid>, days: Option<i64>, default_days: i64) -> Self {
        let days = match days {
            Some(d) if d > 0 => d,
            _ => default_days,
        };
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            items_processed: 0,
            source_id,
            days,
            errors: Vec::new(),
        }
    }
}

/// A user's rating of one content item. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: Uuid,
    pub content_id: Uuid,
    pub user_id: String,
    pub rating: u8,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}
