//! Fakes shared by the unit tests: a counting store, a settable fingerprint
//! source, scripted match strategies, gated job actions and a manual clock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Map;
use tokio::sync::Semaphore;

use crate::backend::JobActions;
use crate::cache::{CachePolicy, Clock, Fingerprint, FingerprintSource, MatchCache, Subject};
use crate::errors::ClientError;
use crate::matching::{FallbackResolver, MatchQuery, MatchStrategy};
use crate::models::jobs::{Application, JobSummary};
use crate::models::matches::{MatchPreferences, MatchResult};
use crate::store::{MemoryStore, PersistedStore, StoreError};

pub fn sample_matches(ids: &[&str]) -> Vec<MatchResult> {
    ids.iter()
        .enumerate()
        .map(|(rank, id)| MatchResult {
            id: id.to_string(),
            title: Some(format!("Job {id}")),
            score: Some(90.0 - rank as f64),
            rationale: vec!["skills overlap".to_string()],
            matching_skills: vec!["rust".to_string()],
            missing_skills: vec![],
            extra: Map::new(),
        })
        .collect()
}

pub fn application(id: &str, job_id: &str) -> Application {
    Application {
        id: id.to_string(),
        job: JobSummary::new(job_id),
        status: Some("pending".to_string()),
        extra: Map::new(),
    }
}

/// Blocks callers until permits are added. Each call consumes one permit.
struct Gate {
    enabled: AtomicBool,
    permits: Semaphore,
}

impl Default for Gate {
    fn default() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            permits: Semaphore::new(0),
        }
    }
}

impl Gate {
    async fn pass(&self) {
        if self.enabled.load(Ordering::SeqCst) {
            if let Ok(permit) = self.permits.acquire().await {
                permit.forget();
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Clock
// ────────────────────────────────────────────────────────────────────────────

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()),
        }
    }
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Store
// ────────────────────────────────────────────────────────────────────────────

/// In-memory store that counts writes.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    writes: AtomicUsize,
}

impl CountingStore {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PersistedStore for CountingStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key).await
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.inner.keys(prefix).await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fingerprints
// ────────────────────────────────────────────────────────────────────────────

pub struct FakeFingerprints {
    current: Mutex<Result<Fingerprint, ClientError>>,
    calls: AtomicUsize,
}

impl FakeFingerprints {
    pub fn new(fingerprint: &str) -> Self {
        Self {
            current: Mutex::new(Ok(Fingerprint::new(fingerprint))),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, fingerprint: &str) {
        *self.current.lock().unwrap() = Ok(Fingerprint::new(fingerprint));
    }

    pub fn fail_with(&self, err: ClientError) {
        *self.current.lock().unwrap() = Err(err);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FingerprintSource for FakeFingerprints {
    async fn current(&self, _subject: &Subject) -> Result<Fingerprint, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.current.lock().unwrap().clone()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Strategies
// ────────────────────────────────────────────────────────────────────────────

pub struct ScriptedStrategy {
    name: &'static str,
    response: Result<Vec<MatchResult>, ClientError>,
    calls: AtomicUsize,
    last_force_reparse: AtomicBool,
    last_preferences: Mutex<Option<MatchPreferences>>,
    gate: Gate,
    resume_change: Mutex<Option<(Arc<FakeFingerprints>, String)>>,
}

impl ScriptedStrategy {
    fn with_response(name: &'static str, response: Result<Vec<MatchResult>, ClientError>) -> Self {
        Self {
            name,
            response,
            calls: AtomicUsize::new(0),
            last_force_reparse: AtomicBool::new(false),
            last_preferences: Mutex::new(None),
            gate: Gate::default(),
            resume_change: Mutex::new(None),
        }
    }

    pub fn returning(name: &'static str, matches: Vec<MatchResult>) -> Self {
        Self::with_response(name, Ok(matches))
    }

    pub fn failing(name: &'static str, err: ClientError) -> Self {
        Self::with_response(name, Err(err))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_force_reparse(&self) -> bool {
        self.last_force_reparse.load(Ordering::SeqCst)
    }

    pub fn last_preferences_seen(&self) -> bool {
        self.last_preferences.lock().unwrap().is_some()
    }

    pub fn last_preferences(&self) -> Option<MatchPreferences> {
        self.last_preferences.lock().unwrap().clone()
    }

    /// Makes every call wait for `open_gate`.
    pub fn gate(&self) {
        self.gate.enabled.store(true, Ordering::SeqCst);
    }

    pub fn open_gate(&self, calls: usize) {
        self.gate.permits.add_permits(calls);
    }

    /// Simulates a resume upload landing while this strategy's request is out.
    pub fn changes_resume_to(&self, fingerprints: Arc<FakeFingerprints>, next: &str) {
        *self.resume_change.lock().unwrap() = Some((fingerprints, next.to_string()));
    }
}

#[async_trait]
impl MatchStrategy for ScriptedStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self, query: &MatchQuery<'_>) -> Result<Vec<MatchResult>, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_force_reparse
            .store(query.force_reparse, Ordering::SeqCst);
        *self.last_preferences.lock().unwrap() = query.preferences.cloned();

        self.gate.pass().await;

        if let Some((fingerprints, next)) = self.resume_change.lock().unwrap().as_ref() {
            fingerprints.set(next);
        }
        self.response.clone()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Job actions
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeJobActions {
    applications: Mutex<Vec<Application>>,
    saved: Mutex<Vec<JobSummary>>,
    failure: Mutex<Option<ClientError>>,
    calls: Mutex<VecDeque<String>>,
    last_apply: Mutex<Option<(String, String)>>,
    gate: Gate,
}

impl FakeJobActions {
    pub fn with_applications(applications: Vec<Application>) -> Self {
        Self {
            applications: Mutex::new(applications),
            ..Default::default()
        }
    }

    pub fn set_saved(&self, saved: Vec<JobSummary>) {
        *self.saved.lock().unwrap() = saved;
    }

    /// Mutations fail with `err` until `succeed` is called.
    pub fn fail_with(&self, err: ClientError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub fn succeed(&self) {
        *self.failure.lock().unwrap() = None;
    }

    /// Makes mutations (not listings) wait for `open_gate`.
    pub fn gate(&self) {
        self.gate.enabled.store(true, Ordering::SeqCst);
    }

    pub fn open_gate(&self, calls: usize) {
        self.gate.permits.add_permits(calls);
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == op).count()
    }

    pub fn last_apply(&self) -> Option<(String, String)> {
        self.last_apply.lock().unwrap().clone()
    }

    async fn mutate(&self, op: &str) -> Result<(), ClientError> {
        self.calls.lock().unwrap().push_back(op.to_string());
        self.gate.pass().await;
        match self.failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl JobActions for FakeJobActions {
    async fn withdraw_application(&self, application_id: &str) -> Result<(), ClientError> {
        self.mutate("withdraw").await?;
        self.applications
            .lock()
            .unwrap()
            .retain(|a| a.id != application_id);
        Ok(())
    }

    async fn apply(&self, job_id: &str, resume_id: &str) -> Result<(), ClientError> {
        self.mutate("apply").await?;
        *self.last_apply.lock().unwrap() = Some((job_id.to_string(), resume_id.to_string()));
        Ok(())
    }

    async fn save_job(&self, _job_id: &str) -> Result<(), ClientError> {
        self.mutate("save").await
    }

    async fn unsave_job(&self, _job_id: &str) -> Result<(), ClientError> {
        self.mutate("unsave").await
    }

    async fn list_applications(&self) -> Result<Vec<Application>, ClientError> {
        Ok(self.applications.lock().unwrap().clone())
    }

    async fn list_saved_jobs(&self) -> Result<Vec<JobSummary>, ClientError> {
        Ok(self.saved.lock().unwrap().clone())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Harness
// ────────────────────────────────────────────────────────────────────────────

/// A cache and resolver wired to fakes, with handles to every fake.
pub struct Harness {
    pub store: Arc<CountingStore>,
    pub fingerprints: Arc<FakeFingerprints>,
    pub clock: Arc<ManualClock>,
    pub cache: MatchCache,
    pub primary: Arc<ScriptedStrategy>,
    pub secondary: Arc<ScriptedStrategy>,
}

impl Harness {
    pub fn new(fingerprint: &str) -> Self {
        Self::with_strategies(
            fingerprint,
            ScriptedStrategy::returning("ai", sample_matches(&["j1", "j2"])),
            ScriptedStrategy::returning("standard", sample_matches(&["s1"])),
        )
    }

    pub fn with_strategies(
        fingerprint: &str,
        primary: ScriptedStrategy,
        secondary: ScriptedStrategy,
    ) -> Self {
        let store = Arc::new(CountingStore::default());
        let fingerprints = Arc::new(FakeFingerprints::new(fingerprint));
        let clock = Arc::new(ManualClock::default());
        let cache = MatchCache::new(
            store.clone(),
            fingerprints.clone(),
            clock.clone(),
            CachePolicy::default(),
        );

        Self {
            store,
            fingerprints,
            clock,
            cache,
            primary: Arc::new(primary),
            secondary: Arc::new(secondary),
        }
    }

    pub fn resolver(&self) -> FallbackResolver {
        FallbackResolver::new(
            self.cache.clone(),
            self.primary.clone(),
            self.secondary.clone(),
        )
    }
}
