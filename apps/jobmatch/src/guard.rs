//! Mutation Guard: at most one in-flight mutation per entity.
//!
//! `begin` never waits: a second attempt on a locked entity fails immediately
//! with `OperationInProgress`. The returned token releases the lock when it is
//! ended or dropped, so early returns, errors and cancelled tasks all unlock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ClientError;

/// What a guarded operation is doing to its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Withdraw,
    Apply,
    Save,
    RemoveSaved,
}

#[derive(Debug, Clone, Copy)]
struct MutationLock {
    op: OpKind,
    generation: u64,
}

#[derive(Default)]
struct GuardState {
    locks: Mutex<HashMap<String, MutationLock>>,
    next_generation: AtomicU64,
}

impl GuardState {
    fn locks(&self) -> MutexGuard<'_, HashMap<String, MutationLock>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone, Default)]
pub struct MutationGuard {
    state: Arc<GuardState>,
}

impl MutationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `entity_id` for `op`. Fails fast if any operation already holds it.
    pub fn begin(&self, entity_id: &str, op: OpKind) -> Result<MutationToken, ClientError> {
        let mut locks = self.state.locks();

        if let Some(held) = locks.get(entity_id) {
            info!(
                "Ignoring {op:?} on {entity_id}: {:?} already in flight",
                held.op
            );
            return Err(ClientError::OperationInProgress {
                entity_id: entity_id.to_string(),
            });
        }

        let generation = self.state.next_generation.fetch_add(1, Ordering::Relaxed);
        locks.insert(entity_id.to_string(), MutationLock { op, generation });
        debug!("Locked {entity_id} for {op:?}");

        Ok(MutationToken {
            state: self.state.clone(),
            entity_id: entity_id.to_string(),
            op,
            generation,
            released: false,
        })
    }

    /// Releases whatever lock `entity_id` holds. Safe to call when unlocked.
    pub fn end(&self, entity_id: &str) {
        if let Some(lock) = self.state.locks().remove(entity_id) {
            debug!("Unlocked {entity_id} after {:?}", lock.op);
        }
    }

    pub fn is_locked(&self, entity_id: &str) -> bool {
        self.state.locks().contains_key(entity_id)
    }

    pub fn in_flight(&self, entity_id: &str) -> Option<OpKind> {
        self.state.locks().get(entity_id).map(|l| l.op)
    }

    pub fn in_flight_count(&self) -> usize {
        self.state.locks().len()
    }
}

/// Proof of a held lock. Releases on `end` or drop, but only the lock it
/// created: if the entity was force-released with `MutationGuard::end` and
/// claimed again, dropping a stale token leaves the new claim alone.
#[must_use = "dropping the token releases the lock immediately"]
pub struct MutationToken {
    state: Arc<GuardState>,
    entity_id: String,
    op: OpKind,
    generation: u64,
    released: bool,
}

impl MutationToken {
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn op(&self) -> OpKind {
        self.op
    }

    pub fn end(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let mut locks = self.state.locks();
        if locks
            .get(&self.entity_id)
            .is_some_and(|l| l.generation == self.generation)
        {
            locks.remove(&self.entity_id);
            debug!("Unlocked {} after {:?}", self.entity_id, self.op);
        }
    }
}

impl Drop for MutationToken {
    fn drop(&mut self) {
        self.release();
    }
}
