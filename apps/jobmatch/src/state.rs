use std::sync::Arc;

use crate::board::JobBoard;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub board: Arc<JobBoard>,
    pub config: Config,
}
