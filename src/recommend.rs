//! Recommendation ranker and feedback intake.
//!
//! Candidates: items published within the horizon, optionally restricted to
//! a set of sources, minus anything the user already rated.
//!
//! score = 0.7·affinity + 0.3·recency   (user has rated the item's source)
//! score = recency                      (otherwise)

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{DEFAULT_HORIZON_DAYS, DEFAULT_RECOMMEND_LIMIT};
use crate::model::{ContentItem, Feedback};
use crate::store::{ContentFilter, Store, StoreError};

pub const W_AFFINITY: f64 = 0.7;
pub const W_RECENCY: f64 = 0.3;

const MS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("{0}")]
    Validation(String),
    #[error("content with id {0} not found")]
    ContentNotFound(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default)]
pub struct RecommendationQuery {
    pub user_id: Option<String>,
    pub source_ids: Vec<Uuid>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub content: ContentItem,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommend_for: Option<String>,
}

/// Raw feedback body; presence and range are checked by [`Recommender::submit_feedback`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackInput {
    pub content_id: Option<String>,
    pub user_id: Option<String>,
    pub rating: Option<i64>,
    pub comment: Option<String>,
}

#[derive(Debug, Default)]
struct Profile {
    rated: HashSet<Uuid>,
    // source id -> (sum of ratings, count)
    affinity: HashMap<Uuid, (f64, usize)>,
}

impl Profile {
    fn affinity(&self, source_id: Uuid) -> Option<f64> {
        self.affinity
            .get(&source_id)
            .filter(|(_, n)| *n > 0)
            .map(|(sum, n)| sum / *n as f64)
    }
}

/// Linear decay over the horizon; future-dated items count as age 0.
pub fn recency(published_at: DateTime<Utc>, now: DateTime<Utc>, horizon_days: i64) -> f64 {
    let age_days = ((now - published_at).num_milliseconds() as f64 / MS_PER_DAY).max(0.0);
    (1.0 - age_days / horizon_days as f64).clamp(0.0, 1.0)
}

pub struct Recommender {
    store: Arc<dyn Store>,
    horizon_days: i64,
    default_limit: usize,
}

impl Recommender {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_settings(store, DEFAULT_HORIZON_DAYS, DEFAULT_RECOMMEND_LIMIT)
    }

    pub fn with_settings(store: Arc<dyn Store>, horizon_days: i64, default_limit: usize) -> Self {
        Self {
            store,
            horizon_days: if horizon_days > 0 { horizon_days } else { DEFAULT_HORIZON_DAYS },
            default_limit: if default_limit > 0 { default_limit } else { DEFAULT_RECOMMEND_LIMIT },
        }
    }

    pub async fn recommend(
        &self,
        query: &RecommendationQuery,
    ) -> Result<Vec<Recommendation>, StoreError> {
        self.recommend_at(query, Utc::now()).await
    }

    /// Ranks against an explicit clock. Ties go to the newer item, then the lower id.
    pub async fn recommend_at(
        &self,
        query: &RecommendationQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<Recommendation>, StoreError> {
        let limit = query
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(self.default_limit);
        let since = Duration::try_days(self.horizon_days)
            .and_then(|d| now.checked_sub_signed(d))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let filter = ContentFilter {
            source_ids: query.source_ids.clone(),
            published_since: Some(since),
        };
        let candidates = self.store.list_contents(&filter).await?;

        let user = query
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty());
        let profile = match user {
            Some(u) => self.profile(u).await?,
            None => Profile::default(),
        };

        let mut ranked: Vec<Recommendation> = candidates
            .into_iter()
            .filter(|c| !profile.rated.contains(&c.id))
            .map(|content| {
                let r = recency(content.published_at, now, self.horizon_days);
                let score = match profile.affinity(content.source_id) {
                    Some(a) => W_AFFINITY * a + W_RECENCY * r,
                    None => r,
                };
                Recommendation {
                    content,
                    score,
                    recommend_for: user.map(str::to_string),
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.content.published_at.cmp(&a.content.published_at))
                .then_with(|| a.content.id.cmp(&b.content.id))
        });
        ranked.truncate(limit);

        tracing::debug!(
            target: "recommend",
            user = ?user,
            sources = query.source_ids.len(),
            returned = ranked.len(),
            "recommendations ranked"
        );
        Ok(ranked)
    }

    async fn profile(&self, user_id: &str) -> Result<Profile, StoreError> {
        let mut profile = Profile::default();
        let mut source_of: HashMap<Uuid, Option<Uuid>> = HashMap::new();
        for fb in self.store.list_feedback_by_user(user_id).await? {
            profile.rated.insert(fb.content_id);
            let source = match source_of.get(&fb.content_id) {
                Some(s) => *s,
                None => {
                    let s = self
                        .store
                        .get_content(fb.content_id)
                        .await?
                        .map(|c| c.source_id);
                    source_of.insert(fb.content_id, s);
                    s
                }
            };
            if let Some(sid) = source {
                let entry = profile.affinity.entry(sid).or_insert((0.0, 0));
                entry.0 += f64::from(fb.rating);
                entry.1 += 1;
            }
        }
        Ok(profile)
    }

    /// Validates and stores one rating. Nothing is written on failure.
    pub async fn submit_feedback(&self, input: FeedbackInput) -> Result<Feedback, FeedbackError> {
        let content_raw = input
            .content_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FeedbackError::Validation("contentId is required".into()))?;
        let user_id = input
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FeedbackError::Validation("userId is required".into()))?
            .to_string();
        let rating = input
            .rating
            .ok_or_else(|| FeedbackError::Validation("rating is required".into()))?;
        if !(1..=5).contains(&rating) {
            return Err(FeedbackError::Validation(
                "rating must be between 1 and 5".into(),
            ));
        }
        let content_id = Uuid::parse_str(content_raw).map_err(|_| {
            FeedbackError::Validation(format!("contentId {content_raw} is not a valid id"))
        })?;

        if self.store.get_content(content_id).await?.is_none() {
            return Err(FeedbackError::ContentNotFound(content_id));
        }

        let feedback = Feedback {
            id: Uuid::new_v4(),
            content_id,
            user_id,
            rating: rating as u8,
            timestamp: Utc::now(),
            comment: input
                .comment
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
        };
        let stored = match self.store.create_feedback(feedback).await {
            Ok(f) => f,
            Err(StoreError::MissingContent(id)) => return Err(FeedbackError::ContentNotFound(id)),
            Err(e) => return Err(e.into()),
        };
        tracing::info!(
            target: "recommend",
            user = %stored.user_id,
            content_id = %stored.content_id,
            rating = stored.rating,
            "feedback recorded"
        );
        Ok(stored)
    }

    pub async fn user_feedback(&self, user_id: &str) -> Result<Vec<Feedback>, StoreError> {
        self.store.list_feedback_by_user(user_id).await
    }
}
