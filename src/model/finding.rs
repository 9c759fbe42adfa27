use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::occurrence_set::OccurrenceSet;
use super::secret_value::SecretValue;

/// Last-known live-check status of a secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
    Valid,
    Invalid,
    FailedToCheck,
    NoChecker,
    Unknown,
}

impl Validity {
    pub fn label(&self) -> &'static str {
        match self {
            Validity::Valid => "valid",
            Validity::Invalid => "invalid",
            Validity::FailedToCheck => "failed to check",
            Validity::NoChecker => "no checker",
            Validity::Unknown => "unknown",
        }
    }
}

/// Snippet of source surrounding a detected secret.
///
/// Line numbers are 0-indexed into the original file. When position
/// resolution fails entirely the sentinel triple is used: start/end line
/// `-1`, `exact_match_numbers == [-1]`, and `content` holding the raw
/// matched payload. The UI renders that without further interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceContent {
    pub content: String,
    pub content_filename: String,
    pub content_start_line_num: i64,
    pub content_end_line_num: i64,
    pub exact_match_numbers: Vec<i64>,
}

impl SourceContent {
    /// Sentinel content used when no meaningful source context is available.
    pub fn fallback(payload: String, bundle_url: &str) -> Self {
        SourceContent {
            content: payload,
            content_filename: path_basename(bundle_url),
            content_start_line_num: -1,
            content_end_line_num: -1,
            exact_match_numbers: vec![-1],
        }
    }

    /// True when this snippet came from real (resolved) source.
    pub fn is_resolved(&self) -> bool {
        self.content_start_line_num >= 0 && !self.content_filename.is_empty()
    }
}

/// One concrete sighting of a secret at a specific URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub secret_type: String,
    pub fingerprint: String,
    pub secret_value: SecretValue,
    pub file_path: String,
    pub url: String,
    pub source_content: SourceContent,
}

impl Occurrence {
    /// Builds an occurrence for a bundle URL.
    ///
    /// `file_path` is the last path segment of the bundle URL unless
    /// source-map resolution supplied a better original filename.
    pub fn new(
        secret_type: &str,
        fingerprint: String,
        secret_value: SecretValue,
        url: &str,
        source_content: SourceContent,
    ) -> Self {
        let file_path = if source_content.is_resolved() {
            source_content.content_filename.clone()
        } else {
            path_basename(url)
        };
        Occurrence {
            secret_type: secret_type.to_string(),
            fingerprint,
            secret_value,
            file_path,
            url: url.to_string(),
            source_content,
        }
    }
}

/// The deduplicated, persisted unit: one unique secret and all its sightings.
///
/// Not serialized directly — the storage codec converts to and from the
/// flat `SerializedFinding` shape, where `occurrences` is a plain array.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub fingerprint: String,
    pub secret_type: String,
    pub secret_value: SecretValue,
    pub num_occurrences: usize,
    pub occurrences: OccurrenceSet,
    pub validity: Validity,
    pub validated_at: Option<DateTime<Utc>>,
    pub discovered_at: Option<DateTime<Utc>>,
    pub is_new: bool,
}

impl Finding {
    /// Wraps a freshly detected occurrence into a single-occurrence finding.
    pub fn from_occurrence(occurrence: Occurrence, validity: Validity) -> Self {
        let now = Utc::now();
        let validated_at = match validity {
            Validity::Valid | Validity::Invalid => Some(now),
            _ => None,
        };
        Finding {
            fingerprint: occurrence.fingerprint.clone(),
            secret_type: occurrence.secret_type.clone(),
            secret_value: occurrence.secret_value.clone(),
            num_occurrences: 1,
            occurrences: OccurrenceSet::single(occurrence),
            validity,
            validated_at,
            discovered_at: Some(now),
            is_new: true,
        }
    }
}

/// Last path segment of a URL or path, with any query/fragment stripped.
/// Empty string when there is no usable segment.
pub fn path_basename(path_or_url: &str) -> String {
    if let Ok(parsed) = Url::parse(path_or_url) {
        return parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .unwrap_or("")
            .to_string();
    }
    let trimmed = path_or_url
        .split(['?', '#'])
        .next()
        .unwrap_or("")
        .trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or("").to_string()
}
