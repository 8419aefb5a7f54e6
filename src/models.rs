use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a job posting came from. The lowercase name doubles as the
/// source half of the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobSource {
    Linkedin,
    Indeed,
    Glassdoor,
    Generic,
    Dynamic,
}

impl std::fmt::Display for JobSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobSource::Linkedin => "linkedin",
            JobSource::Indeed => "indeed",
            JobSource::Glassdoor => "glassdoor",
            JobSource::Generic => "generic",
            JobSource::Dynamic => "dynamic",
        };
        f.write_str(name)
    }
}

/// Diagnostics recorded during extraction. `failed_selectors` holds every
/// selector tried before the winning one (or all of them on failure).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_selector: Option<String>,
    #[serde(default)]
    pub is_collection: bool,
    #[serde(default)]
    pub failed_selectors: Vec<String>,
}

/// Placeholder description used when no selector produced valid text.
pub const NO_DESCRIPTION: &str = "No job description available";

/// A job posting as extracted from a page. Created once per extraction and
/// immutable afterwards; persisted only inside a cached [`MatchResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescription {
    pub title: String,
    pub company: String,
    pub description: String,
    pub source: JobSource,
    pub url: String,
    pub extracted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_metadata: Option<ExtractionMetadata>,
}

impl JobDescription {
    pub fn has_description(&self) -> bool {
        self.description != NO_DESCRIPTION
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub category: String,
    pub checked: bool,
    pub description: String,
}

/// Outcome of matching a resume against a job posting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub match_percentage: u8,
    pub analysis: String,
    pub checklist: Vec<ChecklistItem>,
    pub job: JobDescription,
    /// Set on read by callers; never persisted.
    #[serde(skip)]
    pub is_cached: bool,
}

/// Cache record: a match result plus the bookkeeping the migration and
/// expiry passes need.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedMatchResult {
    pub result: MatchResult,
    /// Epoch milliseconds.
    pub cached_at: i64,
    pub version: u32,
}

/// Declarative per-site extraction config, one JSON file per site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    pub name: String,
    pub url_pattern: String,
    pub selectors: SiteSelectors,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSelectors {
    pub title: String,
    pub company: String,
    pub description: String,
}
