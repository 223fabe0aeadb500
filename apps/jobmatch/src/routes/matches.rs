//! Axum route handlers for match reads.
//!
//! The jobs API answers for the session behind `JOBS_API_TOKEN`. The
//! `subject` a caller passes is only a cache-partition label: it picks which
//! cache entries are read and evicted, not whose matches are fetched.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::cache::Subject;
use crate::errors::AppError;
use crate::matching::Resolution;
use crate::models::matches::MatchPreferences;
use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct MatchParams {
    /// Cache-partition label. Blank or absent means anonymous.
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PreferenceMatchRequest {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub preferences: MatchPreferences,
}

#[derive(Debug, Deserialize)]
pub struct ResumeChangedRequest {
    #[serde(default)]
    pub subject: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResumeChangedResponse {
    pub evicted: usize,
}

fn validate_limit(limit: Option<u32>) -> Result<u32, AppError> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 || limit > MAX_LIMIT {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }
    Ok(limit)
}

/// GET /api/v1/matches?subject=&limit=
pub async fn handle_get_matches(
    State(state): State<AppState>,
    Query(params): Query<MatchParams>,
) -> Result<Json<Resolution>, AppError> {
    let limit = validate_limit(params.limit)?;
    let subject = Subject::from_session(params.subject.as_deref());
    Ok(Json(state.board.fetch_matches(&subject, limit).await?))
}

/// POST /api/v1/matches/refresh
pub async fn handle_refresh_matches(
    State(state): State<AppState>,
    Json(params): Json<MatchParams>,
) -> Result<Json<Resolution>, AppError> {
    let limit = validate_limit(params.limit)?;
    let subject = Subject::from_session(params.subject.as_deref());
    Ok(Json(state.board.refresh(&subject, limit).await?))
}

/// POST /api/v1/matches/preferences
pub async fn handle_preference_matches(
    State(state): State<AppState>,
    Json(request): Json<PreferenceMatchRequest>,
) -> Result<Json<Resolution>, AppError> {
    let limit = validate_limit(request.limit)?;
    let subject = Subject::from_session(request.subject.as_deref());
    Ok(Json(
        state
            .board
            .fetch_preference_matches(&subject, &request.preferences, limit)
            .await?,
    ))
}

/// POST /api/v1/resume/changed
///
/// Evicts cached matches for the subject after a resume upload.
pub async fn handle_resume_changed(
    State(state): State<AppState>,
    Json(request): Json<ResumeChangedRequest>,
) -> Json<ResumeChangedResponse> {
    let subject = Subject::from_session(request.subject.as_deref());
    let evicted = state.board.resume_changed(&subject).await;
    Json(ResumeChangedResponse { evicted })
}
