pub mod health;
pub mod jobs;
pub mod matches;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Matches
        .route("/api/v1/matches", get(matches::handle_get_matches))
        .route(
            "/api/v1/matches/refresh",
            post(matches::handle_refresh_matches),
        )
        .route(
            "/api/v1/matches/preferences",
            post(matches::handle_preference_matches),
        )
        .route(
            "/api/v1/resume/changed",
            post(matches::handle_resume_changed),
        )
        // Guarded mutations
        .route(
            "/api/v1/applications",
            get(jobs::handle_list_applications),
        )
        .route(
            "/api/v1/applications/:id",
            axum::routing::delete(jobs::handle_withdraw),
        )
        .route("/api/v1/jobs/:id/apply", post(jobs::handle_apply))
        .route(
            "/api/v1/jobs/:id/save",
            put(jobs::handle_save).delete(jobs::handle_remove_saved),
        )
        .route("/api/v1/saved-jobs", get(jobs::handle_list_saved))
        .route(
            "/api/v1/mutations/:id",
            get(jobs::handle_mutation_status),
        )
        .with_state(state)
}
