//! Fallback Resolver: cache-first match resolution with one fallback.
//!
//! Flow per call:
//! 1. Unless refreshing, serve a valid cache entry (no strategy call).
//! 2. Capture the subject's fingerprint.
//! 3. Primary strategy; on failure, the secondary strategy exactly once.
//! 4. On success, re-check the fingerprint and write the result under the
//!    captured fingerprint only if it is still current.
//! 5. If both strategies fail, return the classified error; the cache is not
//!    touched.
//!
//! Concurrent non-forced calls for the same key wait on a per-key lock, so only
//! the first one reaches the strategies and the rest are served its entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheKey, MatchCache, Namespace, Subject};
use crate::errors::ClientError;
use crate::matching::strategy::{MatchQuery, MatchStrategy};
use crate::models::matches::{MatchPreferences, MatchResult, Provenance};

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub matches: Vec<MatchResult>,
    pub provenance: Provenance,
    /// True when served from the cache without a strategy call.
    pub cached: bool,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct FallbackResolver {
    cache: MatchCache,
    primary: Arc<dyn MatchStrategy>,
    secondary: Arc<dyn MatchStrategy>,
    in_flight: Coalescer,
}

impl FallbackResolver {
    pub fn new(
        cache: MatchCache,
        primary: Arc<dyn MatchStrategy>,
        secondary: Arc<dyn MatchStrategy>,
    ) -> Self {
        Self {
            cache,
            primary,
            secondary,
            in_flight: Coalescer::default(),
        }
    }

    pub fn cache(&self) -> &MatchCache {
        &self.cache
    }

    pub async fn resolve(
        &self,
        subject: &Subject,
        limit: u32,
        force_refresh: bool,
    ) -> Result<Resolution, ClientError> {
        let key = CacheKey::new(Namespace::Matches, subject, limit);
        self.resolve_key(&key, MatchQuery::new(subject, limit), force_refresh)
            .await
    }

    /// Same as `resolve`, scoped to a set of preferences in the
    /// `preference_matches` namespace.
    pub async fn resolve_with_preferences(
        &self,
        subject: &Subject,
        preferences: &MatchPreferences,
        limit: u32,
        force_refresh: bool,
    ) -> Result<Resolution, ClientError> {
        let preferences = preferences.normalized();
        let key = CacheKey::new(Namespace::PreferenceMatches, subject, limit)
            .with_variant(preferences.variant_tag());
        let query = MatchQuery {
            preferences: Some(&preferences),
            ..MatchQuery::new(subject, limit)
        };
        self.resolve_key(&key, query, force_refresh).await
    }

    async fn resolve_key(
        &self,
        key: &CacheKey,
        query: MatchQuery<'_>,
        force_refresh: bool,
    ) -> Result<Resolution, ClientError> {
        if force_refresh {
            info!("Refreshing {key}, bypassing cache");
            let query = MatchQuery {
                force_reparse: true,
                ..query
            };
            return self.fetch_and_store(key, &query).await;
        }

        let slot = self.in_flight.acquire(&key.render());
        let _turn = slot.lock().await;

        if let Some(entry) = self.cache.get(key).await.hit() {
            info!(
                "Serving {} cached matches for {key} ({})",
                entry.payload.len(),
                entry.provenance.as_str()
            );
            return Ok(Resolution {
                matches: entry.payload,
                provenance: entry.provenance,
                cached: true,
                fetched_at: entry.fetched_at,
            });
        }

        self.fetch_and_store(key, &query).await
    }

    async fn fetch_and_store(
        &self,
        key: &CacheKey,
        query: &MatchQuery<'_>,
    ) -> Result<Resolution, ClientError> {
        let fingerprints = self.cache.fingerprints();

        let captured = match fingerprints.current(&key.subject).await {
            Ok(fp) => Some(fp),
            Err(e @ (ClientError::NoActiveResource | ClientError::Auth)) => return Err(e),
            Err(e) => {
                warn!("Fingerprint unavailable before fetching {key}, result will not be cached: {e}");
                None
            }
        };

        let (matches, provenance) = self.run_strategies(query).await?;
        let fetched_at = self.cache.now();

        if let Some(captured) = captured {
            match fingerprints.current(&key.subject).await {
                Ok(current) if current == captured => {
                    self.cache
                        .put(
                            key,
                            matches.clone(),
                            provenance,
                            captured,
                            self.cache.ttl_for(key.namespace),
                        )
                        .await;
                }
                Ok(current) => warn!(
                    "Resume changed during fetch for {key} ({captured} -> {current}), discarding stale result"
                ),
                Err(e) => warn!("Could not re-check fingerprint for {key}, not caching: {e}"),
            }
        }

        Ok(Resolution {
            matches,
            provenance,
            cached: false,
            fetched_at,
        })
    }

    /// At most two strategy calls: the primary, then the secondary once.
    async fn run_strategies(
        &self,
        query: &MatchQuery<'_>,
    ) -> Result<(Vec<MatchResult>, Provenance), ClientError> {
        let primary_err = match self.primary.fetch(query).await {
            Ok(matches) => {
                debug!("Primary matcher '{}' returned {} matches", self.primary.name(), matches.len());
                return Ok((matches, Provenance::Primary));
            }
            Err(e) => e,
        };

        warn!(
            "Primary matcher '{}' failed, falling back to '{}': {primary_err}",
            self.primary.name(),
            self.secondary.name()
        );

        let fallback_query = MatchQuery {
            force_reparse: false,
            ..*query
        };
        match self.secondary.fetch(&fallback_query).await {
            Ok(matches) => Ok((matches, Provenance::Secondary)),
            Err(secondary_err) => {
                error!(
                    "Both matchers failed for {}: primary: {primary_err}; secondary: {secondary_err}",
                    query.subject
                );
                if primary_err.actionability() > secondary_err.actionability() {
                    Err(primary_err)
                } else {
                    Err(secondary_err)
                }
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Per-key coalescing
// ────────────────────────────────────────────────────────────────────────────

type SlotMap = HashMap<String, Arc<AsyncMutex<()>>>;

#[derive(Clone, Default)]
struct Coalescer {
    slots: Arc<Mutex<SlotMap>>,
}

impl Coalescer {
    fn acquire(&self, key: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = slots.entry(key.to_string()).or_default().clone();
        Slot {
            slots: self.slots.clone(),
            key: key.to_string(),
            lock,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// A caller's claim on a key's lock. The map entry goes away with the last claim.
struct Slot {
    slots: Arc<Mutex<SlotMap>>,
    key: String,
    lock: Arc<AsyncMutex<()>>,
}

impl std::ops::Deref for Slot {
    type Target = AsyncMutex<()>;

    fn deref(&self) -> &Self::Target {
        &self.lock
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one held here
        if Arc::strong_count(&self.lock) <= 2 {
            slots.remove(&self.key);
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
