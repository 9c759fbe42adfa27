pub mod aws;
pub mod gemini;
pub mod github;
pub mod huggingface;
pub mod openai;
pub mod stripe;

use reqwest::Client;
use std::error::Error;

use crate::fingerprint::fingerprint;
use crate::model::{Occurrence, SecretValue, SourceContent};
use crate::sourcemap::resolver::resolve_source_content;

/// Builds the occurrence for one matched secret.
///
/// `anchors` are the literal substrings to locate in the bundle when
/// source-map resolution is requested; with `use_sourcemap` off the
/// occurrence carries the sentinel fallback content directly.
pub(crate) async fn build_occurrence(
    client: &Client,
    content: &str,
    url: &str,
    secret_type: &str,
    value: SecretValue,
    anchors: &[&str],
    use_sourcemap: bool,
) -> Result<Occurrence, Box<dyn Error>> {
    let parts = value.parts();
    let fp = fingerprint(&parts)?;
    let payload = serde_json::to_string(&parts)?;

    let source_content = if use_sourcemap {
        resolve_source_content(client, content, url, anchors, &payload).await
    } else {
        SourceContent::fallback(payload, url)
    };

    Ok(Occurrence::new(secret_type, fp, value, url, source_content))
}
