//! Axum route handlers for guarded job mutations and list reads.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::guard::OpKind;
use crate::models::jobs::{Application, JobSummary};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub resume_id: String,
}

#[derive(Debug, Serialize)]
pub struct MutationStatus {
    pub entity_id: String,
    pub pending: bool,
    pub op: Option<OpKind>,
}

/// GET /api/v1/applications
pub async fn handle_list_applications(
    State(state): State<AppState>,
) -> Result<Json<Vec<Application>>, AppError> {
    Ok(Json(state.board.load_applications().await?))
}

/// DELETE /api/v1/applications/:id
pub async fn handle_withdraw(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.board.withdraw(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/jobs/:id/apply
pub async fn handle_apply(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Json(request): Json<ApplyRequest>,
) -> Result<StatusCode, AppError> {
    if request.resume_id.trim().is_empty() {
        return Err(AppError::Validation("resume_id cannot be empty".to_string()));
    }
    state.board.apply_to_job(&job_id, &request.resume_id).await?;
    Ok(StatusCode::CREATED)
}

/// PUT /api/v1/jobs/:id/save
pub async fn handle_save(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.board.save_job(JobSummary::new(job_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/jobs/:id/save
pub async fn handle_remove_saved(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.board.remove_saved(&job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/saved-jobs
pub async fn handle_list_saved(
    State(state): State<AppState>,
) -> Result<Json<Vec<JobSummary>>, AppError> {
    Ok(Json(state.board.load_saved_jobs().await?))
}

/// GET /api/v1/mutations/:id
///
/// Lets the UI disable controls while a mutation on the entity is in flight.
pub async fn handle_mutation_status(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> Json<MutationStatus> {
    let op = state.board.guard().in_flight(&entity_id);
    Json(MutationStatus {
        pending: op.is_some(),
        op,
        entity_id,
    })
}
