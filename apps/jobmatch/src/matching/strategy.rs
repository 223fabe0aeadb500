//! Match strategies: pluggable sources of ranked job matches.
//!
//! Primary: `AiMatchStrategy` (LLM-backed matcher on the jobs API).
//! Secondary: `StandardMatchStrategy` (deterministic matcher, same result shape).
//!
//! The resolver holds both as `Arc<dyn MatchStrategy>` so tests can swap in
//! scripted implementations.

use async_trait::async_trait;

use crate::backend::{BackendClient, Listing};
use crate::cache::Subject;
use crate::errors::ClientError;
use crate::models::matches::{MatchPreferences, MatchResult};

const AI_MATCH_PATH: &str = "jobs/ai-match/";
const STANDARD_MATCH_PATH: &str = "jobs/match/";

/// Parameters of one match request.
#[derive(Debug, Clone, Copy)]
pub struct MatchQuery<'a> {
    pub subject: &'a Subject,
    pub limit: u32,
    /// Ask the matcher to re-parse the resume instead of reusing its own cache.
    pub force_reparse: bool,
    pub preferences: Option<&'a MatchPreferences>,
}

impl<'a> MatchQuery<'a> {
    pub fn new(subject: &'a Subject, limit: u32) -> Self {
        Self {
            subject,
            limit,
            force_reparse: false,
            preferences: None,
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("limit", self.limit.to_string())];
        if let Some(prefs) = self.preferences {
            if let Some(location) = &prefs.location {
                params.push(("location", location.clone()));
            }
            if let Some(job_type) = &prefs.job_type {
                params.push(("job_type", job_type.clone()));
            }
            if let Some(salary_range) = &prefs.salary_range {
                params.push(("salary_range", salary_range.clone()));
            }
            if !prefs.skills.is_empty() {
                params.push(("skills", prefs.skills.join(",")));
            }
        }
        params
    }
}

/// The match strategy trait. Implement this to add a matcher without touching
/// the resolver or its callers.
#[async_trait]
pub trait MatchStrategy: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    async fn fetch(&self, query: &MatchQuery<'_>) -> Result<Vec<MatchResult>, ClientError>;
}

// ────────────────────────────────────────────────────────────────────────────
// AiMatchStrategy: primary
// ────────────────────────────────────────────────────────────────────────────

pub struct AiMatchStrategy {
    client: BackendClient,
}

impl AiMatchStrategy {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MatchStrategy for AiMatchStrategy {
    fn name(&self) -> &'static str {
        "ai"
    }

    async fn fetch(&self, query: &MatchQuery<'_>) -> Result<Vec<MatchResult>, ClientError> {
        let mut params = query.params();
        params.push(("force_reparse", query.force_reparse.to_string()));

        let listing: Listing<MatchResult> = self.client.get_json(AI_MATCH_PATH, &params).await?;
        Ok(truncate_to_limit(listing.into_vec(), query.limit))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// StandardMatchStrategy: secondary
// ────────────────────────────────────────────────────────────────────────────

pub struct StandardMatchStrategy {
    client: BackendClient,
}

impl StandardMatchStrategy {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MatchStrategy for StandardMatchStrategy {
    fn name(&self) -> &'static str {
        "standard"
    }

    async fn fetch(&self, query: &MatchQuery<'_>) -> Result<Vec<MatchResult>, ClientError> {
        let listing: Listing<MatchResult> = self
            .client
            .get_json(STANDARD_MATCH_PATH, &query.params())
            .await?;
        Ok(truncate_to_limit(listing.into_vec(), query.limit))
    }
}

/// `limit` bounds the result count even if the backend over-delivers.
fn truncate_to_limit(mut matches: Vec<MatchResult>, limit: u32) -> Vec<MatchResult> {
    matches.truncate(limit as usize);
    matches
}
