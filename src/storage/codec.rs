use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::detect::patterns::PatternSpec;
use crate::model::{Finding, Occurrence, OccurrenceSet, SecretValue, Validity};

/// Flat persisted shape of a finding: identical to `Finding` except that
/// `occurrences` is an ordered array instead of a set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedFinding {
    pub fingerprint: String,
    pub secret_type: String,
    pub secret_value: SecretValue,
    pub num_occurrences: usize,
    #[serde(deserialize_with = "occurrences_from_array_or_map")]
    pub occurrences: Vec<Occurrence>,
    pub validity: Validity,
    pub validated_at: Option<DateTime<Utc>>,
    pub discovered_at: Option<DateTime<Utc>>,
    pub is_new: bool,
}

/// Persisted shape of one findings-map entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedMapEntry {
    pub fingerprint: String,
    #[serde(deserialize_with = "occurrences_from_array_or_map")]
    pub occurrences: Vec<Occurrence>,
}

/// Accepts occurrences stored either as an array (current schema) or as a
/// keyed object (older schema); object values are collected in place of
/// the array. Anything else is a hard decode error.
fn occurrences_from_array_or_map<'de, D>(deserializer: D) -> Result<Vec<Occurrence>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let items: Vec<Value> = match value {
        Value::Array(items) => items,
        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        Value::Null => Vec::new(),
        other => {
            return Err(serde::de::Error::custom(format!(
                "occurrences must be an array or object, got {}",
                other
            )))
        }
    };
    items
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(serde::de::Error::custom))
        .collect()
}

pub fn serialize_findings(findings: &[Finding]) -> Vec<SerializedFinding> {
    findings
        .iter()
        .map(|f| SerializedFinding {
            fingerprint: f.fingerprint.clone(),
            secret_type: f.secret_type.clone(),
            secret_value: f.secret_value.clone(),
            num_occurrences: f.num_occurrences,
            occurrences: f.occurrences.to_vec(),
            validity: f.validity,
            validated_at: f.validated_at,
            discovered_at: f.discovered_at,
            is_new: f.is_new,
        })
        .collect()
}

pub fn deserialize_findings(serialized: Vec<SerializedFinding>) -> Vec<Finding> {
    serialized
        .into_iter()
        .map(|s| Finding {
            fingerprint: s.fingerprint,
            secret_type: s.secret_type,
            secret_value: s.secret_value,
            num_occurrences: s.num_occurrences,
            occurrences: OccurrenceSet::from_vec(s.occurrences),
            validity: s.validity,
            validated_at: s.validated_at,
            discovered_at: s.discovered_at,
            is_new: s.is_new,
        })
        .collect()
}

/// Entries are emitted sorted by fingerprint so repeated serializations of
/// the same map are byte-identical.
pub fn serialize_findings_map(map: &HashMap<String, OccurrenceSet>) -> Vec<SerializedMapEntry> {
    let mut entries: Vec<SerializedMapEntry> = map
        .iter()
        .map(|(fingerprint, set)| SerializedMapEntry {
            fingerprint: fingerprint.clone(),
            occurrences: set.to_vec(),
        })
        .collect();
    entries.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));
    entries
}

pub fn deserialize_findings_map(
    entries: Vec<SerializedMapEntry>,
) -> HashMap<String, OccurrenceSet> {
    entries
        .into_iter()
        .map(|e| (e.fingerprint, OccurrenceSet::from_vec(e.occurrences)))
        .collect()
}

/// Persisted shape of one registry pattern. `flags` is a JS-style flag
/// string; `g` (match all occurrences, not just the first) must survive
/// round-trips because it changes matching semantics downstream, and `i`
/// carries case-insensitivity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedPattern {
    pub name: String,
    pub secret_type: String,
    pub source: String,
    pub flags: String,
}

pub fn serialize_pattern(spec: &PatternSpec) -> SerializedPattern {
    let mut flags = String::new();
    if spec.global {
        flags.push('g');
    }
    if spec.case_insensitive {
        flags.push('i');
    }
    SerializedPattern {
        name: spec.name.clone(),
        secret_type: spec.secret_type.clone(),
        source: spec.regex.as_str().to_string(),
        flags,
    }
}

pub fn deserialize_pattern(
    serialized: &SerializedPattern,
) -> Result<PatternSpec, regex::Error> {
    let case_insensitive = serialized.flags.contains('i');
    let regex = regex::RegexBuilder::new(&serialized.source)
        .case_insensitive(case_insensitive)
        .build()?;
    Ok(PatternSpec {
        name: serialized.name.clone(),
        secret_type: serialized.secret_type.clone(),
        regex,
        global: serialized.flags.contains('g'),
        case_insensitive,
    })
}
