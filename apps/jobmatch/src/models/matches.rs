use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One candidate job match as returned by either match endpoint.
///
/// The named fields are the ones this crate reads; everything else the backend
/// sends is kept in `extra` and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "matchScore", alias = "ai_match_score")]
    pub score: Option<f64>,
    #[serde(default, alias = "matchReasons")]
    pub rationale: Vec<String>,
    #[serde(default, alias = "highlightedSkills")]
    pub matching_skills: Vec<String>,
    #[serde(default, alias = "missingSkills")]
    pub missing_skills: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Which strategy produced a set of matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Primary,
    Secondary,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::Primary => "primary",
            Provenance::Secondary => "secondary",
        }
    }
}

/// Job-seeker preferences that scope a preference match query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchPreferences {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub salary_range: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

impl MatchPreferences {
    /// Trimmed and lowercased, blank fields dropped, skills sorted and
    /// deduplicated. Both the cache key and the upstream query use this form,
    /// so preferences that share a cache entry also share a query.
    pub fn normalized(&self) -> MatchPreferences {
        fn norm(v: &Option<String>) -> Option<String> {
            v.as_deref()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
        }

        let mut skills: Vec<String> = self
            .skills
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        skills.sort();
        skills.dedup();

        MatchPreferences {
            location: norm(&self.location),
            job_type: norm(&self.job_type),
            salary_range: norm(&self.salary_range),
            skills,
        }
    }

    /// Deterministic tag for the cache key. Field order, skill order and case do
    /// not change the tag.
    pub fn variant_tag(&self) -> String {
        let prefs = self.normalized();
        format!(
            "loc={};type={};salary={};skills={}",
            prefs.location.unwrap_or_default(),
            prefs.job_type.unwrap_or_default(),
            prefs.salary_range.unwrap_or_default(),
            prefs.skills.join(",")
        )
    }
}
