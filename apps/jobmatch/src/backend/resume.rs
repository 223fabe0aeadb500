use async_trait::async_trait;
use serde::Deserialize;

use super::BackendClient;
use crate::cache::{Fingerprint, FingerprintSource, Subject};
use crate::errors::ClientError;

const ACTIVE_RESUME_PATH: &str = "cv/active/";

#[derive(Debug, Deserialize)]
struct ActiveResume {
    #[serde(default)]
    id: Option<serde_json::Value>,
}

/// Fingerprints a subject by the id of their active resume.
///
/// The backend resolves the subject from the session token, so `subject` only
/// appears in logs.
pub struct ActiveResumeSource {
    client: BackendClient,
}

impl ActiveResumeSource {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FingerprintSource for ActiveResumeSource {
    async fn current(&self, subject: &Subject) -> Result<Fingerprint, ClientError> {
        let resume: ActiveResume = self
            .client
            .get_json(ACTIVE_RESUME_PATH, &[])
            .await
            .map_err(|e| match e {
                ClientError::Server { status: 404, .. } => ClientError::NoActiveResource,
                other => other,
            })?;

        match resume.id {
            Some(serde_json::Value::String(id)) if !id.is_empty() => Ok(Fingerprint::new(id)),
            Some(serde_json::Value::Number(id)) => Ok(Fingerprint::new(id.to_string())),
            _ => {
                tracing::debug!("Subject {subject} has no active resume");
                Err(ClientError::NoActiveResource)
            }
        }
    }
}
