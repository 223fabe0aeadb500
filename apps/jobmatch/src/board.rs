//! Job board: the operations UI callers use.
//!
//! Reads go through the fallback resolver. Every mutation follows the same
//! sequence: claim the entity in the mutation guard, make the external call,
//! update the local lists, release. A failed call skips the list update and the
//! dropped token still releases the entity.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::info;

use crate::backend::JobActions;
use crate::cache::{Namespace, Subject};
use crate::errors::ClientError;
use crate::guard::{MutationGuard, OpKind};
use crate::matching::{FallbackResolver, Resolution};
use crate::models::jobs::{Application, JobSummary};
use crate::models::matches::MatchPreferences;

/// Client-side view of the user's applications and saved jobs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BoardLists {
    pub applications: Vec<Application>,
    pub saved_jobs: Vec<JobSummary>,
    pub applied_job_ids: BTreeSet<String>,
}

impl BoardLists {
    fn mark_saved_jobs(&mut self) {
        for job in &mut self.saved_jobs {
            job.is_applied = self.applied_job_ids.contains(&job.id);
        }
    }
}

pub struct JobBoard {
    resolver: FallbackResolver,
    guard: MutationGuard,
    actions: Arc<dyn JobActions>,
    lists: Mutex<BoardLists>,
}

impl JobBoard {
    pub fn new(resolver: FallbackResolver, actions: Arc<dyn JobActions>) -> Self {
        Self {
            resolver,
            guard: MutationGuard::new(),
            actions,
            lists: Mutex::new(BoardLists::default()),
        }
    }

    fn lists_mut(&self) -> MutexGuard<'_, BoardLists> {
        self.lists.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lists(&self) -> BoardLists {
        self.lists_mut().clone()
    }

    pub fn guard(&self) -> &MutationGuard {
        &self.guard
    }

    /// True while a mutation on `entity_id` is in flight.
    pub fn is_pending(&self, entity_id: &str) -> bool {
        self.guard.is_locked(entity_id)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Matches
    // ────────────────────────────────────────────────────────────────────────

    pub async fn fetch_matches(&self, subject: &Subject, limit: u32) -> Result<Resolution, ClientError> {
        self.resolver.resolve(subject, limit, false).await
    }

    pub async fn refresh(&self, subject: &Subject, limit: u32) -> Result<Resolution, ClientError> {
        self.resolver.resolve(subject, limit, true).await
    }

    pub async fn fetch_preference_matches(
        &self,
        subject: &Subject,
        preferences: &MatchPreferences,
        limit: u32,
    ) -> Result<Resolution, ClientError> {
        self.resolver
            .resolve_with_preferences(subject, preferences, limit, false)
            .await
    }

    /// Drops every cached match for `subject`. Call after a resume upload so
    /// the next read skips the fingerprint round-trip.
    pub async fn resume_changed(&self, subject: &Subject) -> usize {
        let cache = self.resolver.cache();
        let mut evicted = 0;
        for namespace in Namespace::ALL {
            evicted += cache.invalidate_subject(namespace, subject).await;
        }
        info!("Resume changed for {subject}: evicted {evicted} cached match sets");
        evicted
    }

    // ────────────────────────────────────────────────────────────────────────
    // Lists
    // ────────────────────────────────────────────────────────────────────────

    pub async fn load_applications(&self) -> Result<Vec<Application>, ClientError> {
        let applications = self.actions.list_applications().await?;

        let mut lists = self.lists_mut();
        lists.applied_job_ids = applications.iter().map(|a| a.job.id.clone()).collect();
        lists.applications = applications.clone();
        lists.mark_saved_jobs();
        Ok(applications)
    }

    /// Loads saved jobs together with applications so each saved job knows
    /// whether it was already applied to.
    pub async fn load_saved_jobs(&self) -> Result<Vec<JobSummary>, ClientError> {
        let (saved, applications) = tokio::join!(
            self.actions.list_saved_jobs(),
            self.actions.list_applications()
        );
        let (saved, applications) = (saved?, applications?);

        let mut lists = self.lists_mut();
        lists.applied_job_ids = applications.iter().map(|a| a.job.id.clone()).collect();
        lists.applications = applications;
        lists.saved_jobs = saved;
        lists.mark_saved_jobs();
        Ok(lists.saved_jobs.clone())
    }

    // ────────────────────────────────────────────────────────────────────────
    // Guarded mutations
    // ────────────────────────────────────────────────────────────────────────

    pub async fn withdraw(&self, application_id: &str) -> Result<(), ClientError> {
        let token = self.guard.begin(application_id, OpKind::Withdraw)?;

        self.actions.withdraw_application(application_id).await?;

        {
            let mut lists = self.lists_mut();
            let withdrawn_job = lists
                .applications
                .iter()
                .find(|a| a.id == application_id)
                .map(|a| a.job.id.clone());
            lists.applications.retain(|a| a.id != application_id);
            if let Some(job_id) = withdrawn_job {
                lists.applied_job_ids.remove(&job_id);
            }
            lists.mark_saved_jobs();
        }

        token.end();
        info!("Withdrew application {application_id}");
        Ok(())
    }

    pub async fn apply_to_job(&self, job_id: &str, resume_id: &str) -> Result<(), ClientError> {
        let token = self.guard.begin(job_id, OpKind::Apply)?;

        self.actions.apply(job_id, resume_id).await?;

        {
            let mut lists = self.lists_mut();
            lists.applied_job_ids.insert(job_id.to_string());
            lists.mark_saved_jobs();
        }

        token.end();
        info!("Applied to job {job_id} with resume {resume_id}");
        Ok(())
    }

    pub async fn save_job(&self, job: JobSummary) -> Result<(), ClientError> {
        let token = self.guard.begin(&job.id, OpKind::Save)?;

        self.actions.save_job(&job.id).await?;

        {
            let mut lists = self.lists_mut();
            if !lists.saved_jobs.iter().any(|j| j.id == job.id) {
                lists.saved_jobs.push(job);
                lists.mark_saved_jobs();
            }
        }

        token.end();
        Ok(())
    }

    pub async fn remove_saved(&self, job_id: &str) -> Result<(), ClientError> {
        let token = self.guard.begin(job_id, OpKind::RemoveSaved)?;

        self.actions.unsave_job(job_id).await?;

        self.lists_mut().saved_jobs.retain(|j| j.id != job_id);

        token.end();
        info!("Removed saved job {job_id}");
        Ok(())
    }
}
