use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The raw credential payload of a finding, one variant per provider family.
///
/// Keeping this a tagged enum (instead of a loose string map) means the
/// recheck dispatch in `validate` is an exhaustive match — adding a provider
/// without wiring its checker is a compile error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SecretValue {
    #[serde(rename_all = "camelCase")]
    AwsKeys {
        access_key_id: String,
        secret_key_id: String,
    },
    #[serde(rename_all = "camelCase")]
    OpenAi { api_key: String },
    #[serde(rename_all = "camelCase")]
    Gemini { api_key: String },
    #[serde(rename_all = "camelCase")]
    HuggingFace { api_key: String },
    #[serde(rename_all = "camelCase")]
    Stripe { api_key: String },
    #[serde(rename_all = "camelCase")]
    GitHub { api_key: String },
    /// Match from a user-supplied custom pattern; no live checker.
    #[serde(rename_all = "camelCase")]
    Generic { token: String },
}

impl SecretValue {
    /// Canonical named parts of the payload, used for fingerprinting.
    ///
    /// A `BTreeMap` keeps enumeration order independent of how the parts
    /// were assembled, so the fingerprint is stable.
    pub fn parts(&self) -> BTreeMap<String, String> {
        let mut parts = BTreeMap::new();
        match self {
            SecretValue::AwsKeys {
                access_key_id,
                secret_key_id,
            } => {
                parts.insert("access_key_id".to_string(), access_key_id.clone());
                parts.insert("secret_key_id".to_string(), secret_key_id.clone());
            }
            SecretValue::OpenAi { api_key }
            | SecretValue::Gemini { api_key }
            | SecretValue::HuggingFace { api_key }
            | SecretValue::Stripe { api_key }
            | SecretValue::GitHub { api_key } => {
                parts.insert("api_key".to_string(), api_key.clone());
            }
            SecretValue::Generic { token } => {
                parts.insert("token".to_string(), token.clone());
            }
        }
        parts
    }

    /// Masked single-line rendition for terminal output.
    pub fn redacted(&self) -> String {
        let parts = self.parts();
        parts
            .values()
            .map(|v| mask(v))
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

fn mask(value: &str) -> String {
    // Custom patterns can match arbitrary text, so count chars, not bytes.
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}
