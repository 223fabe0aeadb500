//! Match Cache: TTL and fingerprint-validated cache of match results over a
//! `PersistedStore`.
//!
//! An entry is served only while it is unexpired AND its fingerprint equals the
//! subject's current fingerprint. Anything else (expiry, fingerprint change, a
//! failed fingerprint lookup, corrupt JSON) is a miss and evicts the entry.
//! The cache never returns an error to its caller.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ClientError;
use crate::models::matches::{MatchResult, Provenance};
use crate::store::PersistedStore;

pub mod clock;
pub mod fingerprint;
pub mod key;

pub use self::clock::{Clock, SystemClock};
pub use self::fingerprint::{Fingerprint, FingerprintSource};
pub use self::key::{CacheKey, Namespace, Subject};

// ────────────────────────────────────────────────────────────────────────────
// Entry and lookup types
// ────────────────────────────────────────────────────────────────────────────

/// One persisted cache entry. Replaced wholesale on every successful
/// resolution, never edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub payload: Vec<MatchResult>,
    pub provenance: Provenance,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub fingerprint: Fingerprint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    Absent,
    Expired,
    FingerprintChanged,
    FingerprintUnavailable,
    Corrupt,
    StoreUnavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(CacheEntry),
    Miss(MissReason),
}

impl CacheLookup {
    pub fn hit(self) -> Option<CacheEntry> {
        match self {
            CacheLookup::Hit(entry) => Some(entry),
            CacheLookup::Miss(_) => None,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TTL policy
// ────────────────────────────────────────────────────────────────────────────

/// Per-namespace time-to-live.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub matches_ttl: Duration,
    pub preference_matches_ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            matches_ttl: Duration::minutes(30),
            preference_matches_ttl: Duration::hours(24),
        }
    }
}

impl CachePolicy {
    pub fn ttl_for(&self, namespace: Namespace) -> Duration {
        match namespace {
            Namespace::Matches => self.matches_ttl,
            Namespace::PreferenceMatches => self.preference_matches_ttl,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// MatchCache
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MatchCache {
    store: Arc<dyn PersistedStore>,
    fingerprints: Arc<dyn FingerprintSource>,
    clock: Arc<dyn Clock>,
    policy: CachePolicy,
}

impl MatchCache {
    pub fn new(
        store: Arc<dyn PersistedStore>,
        fingerprints: Arc<dyn FingerprintSource>,
        clock: Arc<dyn Clock>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            store,
            fingerprints,
            clock,
            policy,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn ttl_for(&self, namespace: Namespace) -> Duration {
        self.policy.ttl_for(namespace)
    }

    pub fn fingerprints(&self) -> &Arc<dyn FingerprintSource> {
        &self.fingerprints
    }

    /// Returns the entry for `key` if it is still valid. Invalid entries are
    /// evicted on the way out.
    pub async fn get(&self, key: &CacheKey) -> CacheLookup {
        let raw_key = key.render();

        let raw = match self.store.get(&raw_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("Cache miss for {raw_key}: absent");
                return CacheLookup::Miss(MissReason::Absent);
            }
            Err(e) => {
                warn!("Cache read failed for {raw_key}, treating as miss: {e}");
                return CacheLookup::Miss(MissReason::StoreUnavailable);
            }
        };

        let entry = match decode_entry(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("{e}; evicting {raw_key}");
                self.invalidate(key).await;
                return CacheLookup::Miss(MissReason::Corrupt);
            }
        };

        if self.clock.now() >= entry.expires_at {
            debug!("Cache miss for {raw_key}: expired at {}", entry.expires_at);
            self.invalidate(key).await;
            return CacheLookup::Miss(MissReason::Expired);
        }

        match self.fingerprints.current(&key.subject).await {
            Ok(current) if current == entry.fingerprint => {
                debug!("Cache hit for {raw_key} (fingerprint {current})");
                CacheLookup::Hit(entry)
            }
            Ok(current) => {
                info!(
                    "Resume changed for {raw_key} ({} -> {current}), evicting",
                    entry.fingerprint
                );
                self.invalidate(key).await;
                CacheLookup::Miss(MissReason::FingerprintChanged)
            }
            Err(e) => {
                warn!("Fingerprint lookup failed for {raw_key}, forcing re-fetch: {e}");
                self.invalidate(key).await;
                CacheLookup::Miss(MissReason::FingerprintUnavailable)
            }
        }
    }

    /// Stores `payload` under `key`, expiring `ttl` from now. Overwrites any
    /// existing entry. Store failures are logged and dropped.
    pub async fn put(
        &self,
        key: &CacheKey,
        payload: Vec<MatchResult>,
        provenance: Provenance,
        fingerprint: Fingerprint,
        ttl: Duration,
    ) {
        let raw_key = key.render();
        let now = self.clock.now();
        let Some(expires_at) = now.checked_add_signed(ttl) else {
            warn!("TTL {ttl} overflows the expiry time for {raw_key}, not caching");
            return;
        };
        let entry = CacheEntry {
            payload,
            provenance,
            fetched_at: now,
            expires_at,
            fingerprint,
        };

        let encoded = match serde_json::to_string(&entry) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Could not encode cache entry for {raw_key}: {e}");
                return;
            }
        };

        match self.store.set(&raw_key, encoded).await {
            Ok(()) => debug!(
                "Cached {} matches under {raw_key} until {}",
                entry.payload.len(),
                entry.expires_at
            ),
            Err(e) => warn!("Cache write failed for {raw_key}: {e}"),
        }
    }

    pub async fn invalidate(&self, key: &CacheKey) {
        let raw_key = key.render();
        if let Err(e) = self.store.remove(&raw_key).await {
            warn!("Cache eviction failed for {raw_key}: {e}");
        }
    }

    /// Evicts every key starting with `prefix`. Returns the number evicted.
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        let keys = match self.store.keys(prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Could not list cache keys under '{prefix}': {e}");
                return 0;
            }
        };
        self.remove_all(keys).await
    }

    pub async fn invalidate_namespace(&self, namespace: Namespace) -> usize {
        let evicted = self.invalidate_prefix(&namespace.prefix()).await;
        info!("Cleared {evicted} entries from namespace {}", namespace.as_str());
        evicted
    }

    /// Evicts every limit and variant cached for `subject` in `namespace`.
    pub async fn invalidate_subject(&self, namespace: Namespace, subject: &Subject) -> usize {
        let prefix = format!("{}{}", namespace.prefix(), subject);
        let keys = match self.store.keys(&prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Could not list cache keys under '{prefix}': {e}");
                return 0;
            }
        };

        let owned: Vec<String> = keys
            .into_iter()
            .filter(|k| CacheKey::belongs_to(k, namespace, subject))
            .collect();
        let evicted = self.remove_all(owned).await;
        debug!(
            "Cleared {evicted} {} entries for subject {subject}",
            namespace.as_str()
        );
        evicted
    }

    async fn remove_all(&self, keys: Vec<String>) -> usize {
        let mut evicted = 0;
        for key in keys {
            match self.store.remove(&key).await {
                Ok(()) => evicted += 1,
                Err(e) => warn!("Cache eviction failed for {key}: {e}"),
            }
        }
        evicted
    }
}

fn decode_entry(raw: &str) -> Result<CacheEntry, ClientError> {
    serde_json::from_str(raw).map_err(|e| ClientError::CacheCorrupt(e.to_string()))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
