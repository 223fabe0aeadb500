use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cache::key::Subject;
use crate::errors::ClientError;

/// Version marker of the resource matches are computed from (the id of the
/// subject's active resume). A changed fingerprint invalidates cached matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Looks up the current fingerprint for a subject. Called on every cache read
/// and around every fetch.
#[async_trait]
pub trait FingerprintSource: Send + Sync {
    async fn current(&self, subject: &Subject) -> Result<Fingerprint, ClientError>;
}
