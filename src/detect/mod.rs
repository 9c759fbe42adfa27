pub mod patterns;
pub mod pipeline;
pub mod providers;

use reqwest::Client;
use std::collections::HashSet;
use std::error::Error;

use crate::model::{Occurrence, SecretValue, Validity};
use patterns::PatternSpec;

/// One registered detector. Uniform contract: `detect` never errors for
/// "no match found" — it returns an empty vector — and may error only
/// for genuine infrastructure failures, which the pipeline isolates
/// per detector.
pub enum Detector {
    Aws,
    OpenAi,
    Gemini,
    HuggingFace,
    Stripe,
    GitHub,
    Custom(PatternSpec),
}

impl Detector {
    pub fn name(&self) -> &str {
        match self {
            Detector::Aws => providers::aws::SECRET_TYPE,
            Detector::OpenAi => providers::openai::SECRET_TYPE,
            Detector::Gemini => providers::gemini::SECRET_TYPE,
            Detector::HuggingFace => providers::huggingface::SECRET_TYPE,
            Detector::Stripe => providers::stripe::SECRET_TYPE,
            Detector::GitHub => providers::github::SECRET_TYPE,
            Detector::Custom(spec) => &spec.secret_type,
        }
    }

    /// Validity assigned to findings this detector emits. Detectors that
    /// check candidates live only emit valid ones; AWS pairs cannot be
    /// checked without request signing; custom patterns have no checker
    /// at all and stay unknown.
    pub fn initial_validity(&self) -> Validity {
        match self {
            Detector::Aws => Validity::NoChecker,
            Detector::Custom(_) => Validity::Unknown,
            _ => Validity::Valid,
        }
    }

    pub async fn detect(
        &self,
        client: &Client,
        content: &str,
        url: &str,
    ) -> Result<Vec<Occurrence>, Box<dyn Error>> {
        match self {
            Detector::Aws => providers::aws::detect(client, content, url).await,
            Detector::OpenAi => providers::openai::detect(client, content, url).await,
            Detector::Gemini => providers::gemini::detect(client, content, url).await,
            Detector::HuggingFace => providers::huggingface::detect(client, content, url).await,
            Detector::Stripe => providers::stripe::detect(client, content, url).await,
            Detector::GitHub => providers::github::detect(client, content, url).await,
            Detector::Custom(spec) => detect_custom(client, spec, content, url).await,
        }
    }

    /// Built-in detectors followed by the user's custom patterns.
    pub fn registry(custom: &[PatternSpec]) -> Vec<Detector> {
        let mut detectors = vec![
            Detector::Aws,
            Detector::OpenAi,
            Detector::Gemini,
            Detector::HuggingFace,
            Detector::Stripe,
            Detector::GitHub,
        ];
        detectors.extend(custom.iter().cloned().map(Detector::Custom));
        detectors
    }
}

/// Runs one user pattern over a bundle. The persisted `global` flag
/// decides whether every match or only the first is reported.
async fn detect_custom(
    client: &Client,
    spec: &PatternSpec,
    content: &str,
    url: &str,
) -> Result<Vec<Occurrence>, Box<dyn Error>> {
    let matches: Vec<&str> = if spec.global {
        spec.regex.find_iter(content).map(|m| m.as_str()).collect()
    } else {
        spec.regex
            .find(content)
            .map(|m| vec![m.as_str()])
            .unwrap_or_default()
    };

    let mut seen = HashSet::new();
    let mut occurrences = Vec::new();
    for token in matches {
        if !seen.insert(token.to_string()) {
            continue;
        }
        let value = SecretValue::Generic {
            token: token.to_string(),
        };
        occurrences.push(
            providers::build_occurrence(
                client,
                content,
                url,
                &spec.secret_type,
                value,
                &[],
                false,
            )
            .await?,
        );
    }
    Ok(occurrences)
}
