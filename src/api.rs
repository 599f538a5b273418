use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::{Query, QueryRejection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analyze::{ArticleScore, ContentAnalyzer};
use crate::error::ApiError;
use crate::ingest::Ingestor;
use crate::model::{ContentItem, Feedback, FetchJob, JobStatus, Source};
use crate::recommend::{FeedbackInput, Recommendation, RecommendationQuery, Recommender};
use crate::store::{ContentSearch, Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub ingestor: Ingestor,
    pub analyzer: Arc<ContentAnalyzer>,
    pub recommender: Arc<Recommender>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/sources", get(list_sources))
        .route("/contents/fetch", post(fetch_contents))
        .route("/contents/fetch/{job_id}", get(fetch_status))
        .route("/contents/search", get(search_contents))
        .route("/contents/{id}", get(get_content))
        .route("/contents/{id}/score", get(score_content))
        .route("/recommendations", get(recommendations))
        .route("/recommendations/feedback", post(submit_feedback))
        .route("/recommendations/feedback/{user_id}", get(user_feedback))
        .with_state(state)
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::Validation(format!("{what} {raw} is not a valid id")))
}

/// Ids from repeated keys, each of which may also be comma-separated.
fn parse_ids(values: &[String], what: &str) -> Result<Vec<Uuid>, ApiError> {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_id(s, what))
        .collect()
}

#[derive(Serialize)]
struct SourcesResp {
    sources: Vec<Source>,
    count: usize,
}

async fn list_sources(State(state): State<AppState>) -> Result<Json<SourcesResp>, ApiError> {
    let sources = state.store.list_sources().await?;
    Ok(Json(SourcesResp {
        count: sources.len(),
        sources,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchReq {
    #[serde(default)]
    source_id: Option<String>,
    #[serde(default)]
    days: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FetchAccepted {
    job_id: Uuid,
    status: JobStatus,
}

/// An empty body means "all sources, default window".
async fn fetch_contents(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<FetchAccepted>), ApiError> {
    let req: FetchReq = if body.iter().all(u8::is_ascii_whitespace) {
        FetchReq::default()
    } else {
        serde_json::from_slice(&body)?
    };
    let source_id = match req.source_id.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Some(parse_id(s, "sourceId")?),
        _ => None,
    };

    let job = state.ingestor.create_job(source_id, req.days).await?;
    tracing::info!(target: "api", job_id = %job.id, "fetch job accepted");
    Ok((
        StatusCode::ACCEPTED,
        Json(FetchAccepted {
            job_id: job.id,
            status: job.status,
        }),
    ))
}

async fn fetch_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<FetchJob>, ApiError> {
    let id = parse_id(&job_id, "jobId")?;
    state
        .ingestor
        .get_job(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("job {id} not found")))
}

async fn load_content(state: &AppState, raw: &str) -> Result<ContentItem, ApiError> {
    let id = parse_id(raw, "content id")?;
    state
        .store
        .get_content(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("content with id {id} not found")))
}

async fn get_content(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ContentItem>, ApiError> {
    load_content(&state, &id).await.map(Json)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScoreResp {
    content_id: Uuid,
    score: ArticleScore,
    reasons: Vec<String>,
}

async fn score_content(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ScoreResp>, ApiError> {
    let item = load_content(&state, &id).await?;
    let score = state.analyzer.analyze_item(&item);
    Ok(Json(ScoreResp {
        content_id: item.id,
        reasons: score.reasons(),
        score,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchParams {
    /// Comma-separated, any of which may match.
    keywords: Option<String>,
    source_id: Option<String>,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct SearchResp {
    contents: Vec<ContentItem>,
    count: usize,
}

async fn search_contents(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResp>, ApiError> {
    let Query(params) = params?;
    let mut search = params
        .keywords
        .as_deref()
        .and_then(|k| ContentSearch::new(k.split(',')))
        .ok_or_else(|| ApiError::Validation("keywords parameter is required".into()))?;
    if let Some(raw) = params.source_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        search.filter.source_ids = vec![parse_id(raw, "sourceId")?];
    }
    if let Some(limit) = params.limit.filter(|l| *l > 0) {
        search.limit = limit;
    }

    let contents = state.store.search_contents(&search).await?;
    tracing::debug!(target: "api", keywords = ?search.keywords(), hits = contents.len(), "content search");
    Ok(Json(SearchResp {
        count: contents.len(),
        contents,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecParams {
    user_id: Option<String>,
    /// Repeated `sourceIds=` keys, comma-separated values, or both.
    #[serde(default)]
    source_ids: Vec<String>,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct RecResp {
    recommendations: Vec<Recommendation>,
    count: usize,
}

async fn recommendations(
    State(state): State<AppState>,
    params: Result<Query<RecParams>, QueryRejection>,
) -> Result<Json<RecResp>, ApiError> {
    let Query(params) = params?;
    let source_ids = parse_ids(&params.source_ids, "sourceId")?;

    let query = RecommendationQuery {
        user_id: params.user_id,
        source_ids,
        limit: params.limit,
    };
    let recommendations = state.recommender.recommend(&query).await?;
    Ok(Json(RecResp {
        count: recommendations.len(),
        recommendations,
    }))
}

async fn submit_feedback(
    State(state): State<AppState>,
    payload: Result<Json<FeedbackInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Feedback>), ApiError> {
    let Json(input) = payload?;
    let feedback = state.recommender.submit_feedback(input).await?;
    Ok((StatusCode::CREATED, Json(feedback)))
}

#[derive(Serialize)]
struct FeedbackListResp {
    feedback: Vec<Feedback>,
    count: usize,
}

async fn user_feedback(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<FeedbackListResp>, ApiError> {
    let feedback = state.recommender.user_feedback(user_id.trim()).await?;
    Ok(Json(FeedbackListResp {
        count: feedback.len(),
        feedback,
    }))
}
