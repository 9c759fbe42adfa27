use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::collections::HashSet;
use std::error::Error;

use super::build_occurrence;
use crate::model::{Occurrence, SecretValue};
use crate::validate;

pub const SECRET_TYPE: &str = "Hugging Face Token";

pub(crate) static KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(hf_[A-Za-z0-9]{30,40})\b").unwrap());

pub async fn detect(
    client: &Client,
    content: &str,
    url: &str,
) -> Result<Vec<Occurrence>, Box<dyn Error>> {
    let mut seen = HashSet::new();
    let mut occurrences = Vec::new();

    for m in KEY.find_iter(content) {
        let api_key = m.as_str();
        if !seen.insert(api_key.to_string()) {
            continue;
        }
        let outcome = validate::huggingface(client, api_key).await?;
        if !outcome.valid {
            continue;
        }

        let value = SecretValue::HuggingFace {
            api_key: api_key.to_string(),
        };
        occurrences
            .push(build_occurrence(client, content, url, SECRET_TYPE, value, &[], false).await?);
    }

    Ok(occurrences)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_pattern_matches_tokens() {
        assert!(KEY.is_match("hf_abcdefghijklmnopqrstuvwxyz012345"));
        assert!(!KEY.is_match("hf_tooshort"));
    }
}
