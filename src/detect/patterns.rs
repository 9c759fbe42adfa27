use regex::Regex;

use crate::storage::codec::{deserialize_pattern, serialize_pattern, SerializedPattern};
use crate::storage::{Storage, KEY_PATTERNS};

/// A user-registered detection pattern.
///
/// `global` mirrors the JS `g` flag: when set, every match in a bundle is
/// reported; otherwise only the first. The flag is persisted explicitly
/// because losing it would silently change matching semantics.
#[derive(Debug, Clone)]
pub struct PatternSpec {
    pub name: String,
    pub secret_type: String,
    pub regex: Regex,
    pub global: bool,
    pub case_insensitive: bool,
}

impl PatternSpec {
    pub fn new(name: &str, source: &str, global: bool) -> Result<Self, regex::Error> {
        Ok(PatternSpec {
            name: name.to_string(),
            secret_type: name.to_string(),
            regex: Regex::new(source)?,
            global,
            case_insensitive: false,
        })
    }
}

/// Loads the persisted pattern registry. Entries that no longer compile
/// are skipped with a warning rather than poisoning the whole registry.
pub async fn load_custom_patterns<S: Storage>(backend: &S) -> Vec<PatternSpec> {
    let Some(value) = backend.get(KEY_PATTERNS).await else {
        return Vec::new();
    };
    let entries: Vec<SerializedPattern> = match serde_json::from_value(value) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("⚠️  Stored patterns are unreadable: {}", e);
            return Vec::new();
        }
    };

    let mut specs = Vec::new();
    for entry in &entries {
        match deserialize_pattern(entry) {
            Ok(spec) => specs.push(spec),
            Err(e) => eprintln!("⚠️  Skipping pattern '{}': {}", entry.name, e),
        }
    }
    specs
}

pub async fn save_custom_patterns<S: Storage>(backend: &S, specs: &[PatternSpec]) {
    let entries: Vec<SerializedPattern> = specs.iter().map(serialize_pattern).collect();
    match serde_json::to_value(&entries) {
        Ok(value) => backend.set(KEY_PATTERNS, value).await,
        Err(e) => eprintln!("⚠️  Could not encode patterns: {}", e),
    }
}
