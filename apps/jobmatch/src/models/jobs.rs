use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A job as it appears inside application and saved-job listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "isApplied", alias = "is_applied")]
    pub is_applied: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobSummary {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            is_applied: false,
            extra: Map::new(),
        }
    }
}

/// A submitted application owned by the current user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub job: JobSummary,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Wire shape of one saved-job row; the job itself is nested.
#[derive(Debug, Clone, Deserialize)]
pub struct SavedJobRecord {
    pub job: JobSummary,
}
