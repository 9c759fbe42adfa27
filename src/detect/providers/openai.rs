use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::collections::HashSet;
use std::error::Error;

use super::build_occurrence;
use crate::model::{Occurrence, SecretValue};
use crate::validate;

pub const SECRET_TYPE: &str = "OpenAI API Key";

pub(crate) static KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(sk-(?:proj-)?[A-Za-z0-9_-]{20,})\b").unwrap());

/// Candidates are checked live against the models endpoint before being
/// reported, so a surviving occurrence is already known valid. Position
/// resolution is source-map aware for this provider.
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
        let outcome = validate::openai(client, api_key).await?;
        if !outcome.valid {
            continue;
        }

        let value = SecretValue::OpenAi {
            api_key: api_key.to_string(),
        };
        occurrences.push(
            build_occurrence(client, content, url, SECRET_TYPE, value, &[api_key], true).await?,
        );
    }

    Ok(occurrences)
}
