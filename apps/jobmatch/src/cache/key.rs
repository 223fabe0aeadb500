use std::fmt;

use serde::{Deserialize, Serialize};

/// The identity matches are computed for. Part of every cache key.
///
/// `~` separates a subject from its key variant, so it is percent-escaped
/// (with `%` itself) on the way in and never appears in a subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject(String);

impl Subject {
    pub const ANONYMOUS: &'static str = "anonymous";

    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            Self::anonymous()
        } else {
            Self(trimmed.replace('%', "%25").replace('~', "%7E"))
        }
    }

    /// Subject for callers without a session identity.
    pub fn anonymous() -> Self {
        Self(Self::ANONYMOUS.to_string())
    }

    /// Maps an optional session identity to a subject, falling back to anonymous.
    pub fn from_session(id: Option<&str>) -> Self {
        id.map(Self::new).unwrap_or_else(Self::anonymous)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Logical cache partition. Each namespace has its own TTL policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Matches,
    PreferenceMatches,
}

impl Namespace {
    pub const ALL: [Namespace; 2] = [Namespace::Matches, Namespace::PreferenceMatches];

    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Matches => "matches",
            Namespace::PreferenceMatches => "preference_matches",
        }
    }

    /// Prefix shared by every key in this namespace.
    pub fn prefix(self) -> String {
        format!("{}_", self.as_str())
    }
}

/// Deterministic key for one `(namespace, subject, variant, limit)` combination.
///
/// Rendered as `{namespace}_{subject}_{limit}`, or
/// `{namespace}_{subject}~{variant}_{limit}` when a variant is present.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub namespace: Namespace,
    pub subject: Subject,
    pub variant: Option<String>,
    pub limit: u32,
}

impl CacheKey {
    pub fn new(namespace: Namespace, subject: &Subject, limit: u32) -> Self {
        Self {
            namespace,
            subject: subject.clone(),
            variant: None,
            limit,
        }
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn render(&self) -> String {
        match &self.variant {
            Some(variant) => format!(
                "{}{}~{}_{}",
                self.namespace.prefix(),
                self.subject,
                variant,
                self.limit
            ),
            None => format!("{}{}_{}", self.namespace.prefix(), self.subject, self.limit),
        }
    }

    /// True when `raw` is a rendered key of `subject` in `namespace`, for any
    /// variant and limit.
    pub fn belongs_to(raw: &str, namespace: Namespace, subject: &Subject) -> bool {
        let Some(rest) = raw.strip_prefix(&namespace.prefix()) else {
            return false;
        };
        let Some((segment, limit)) = rest.rsplit_once('_') else {
            return false;
        };
        if limit.is_empty() || !limit.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        match segment.strip_prefix(subject.as_str()) {
            Some("") => true,
            Some(tail) => tail.starts_with('~'),
            None => false,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
