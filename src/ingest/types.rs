// src/ingest/types.rs
use chrono::{DateTime, Utc};

/// One normalized entry from a feed, before cutoff and dedup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    pub summary: String,
    /// Full body when the feed carried one.
    pub body: Option<String>,
    /// Resolved link, already falling back to the feed's guid/id.
    pub link: Option<String>,
    /// Published time, else updated time.
    pub published_at: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub categories: Vec<String>,
}

/// Why a candidate did not become a stored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Cutoff,
    Duplicate,
    Undated,
    NoLink,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Cutoff => "cutoff",
            SkipReason::Duplicate => "duplicate",
            SkipReason::Undated => "undated",
            SkipReason::NoLink => "no_link",
        }
    }
}
