use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::collections::HashSet;
use std::error::Error;
use std::time::Duration;
use url::Url;

use super::patterns::PatternSpec;
use super::Detector;
use crate::model::Finding;
use crate::reconcile::{merge, FindingStore};
use crate::storage::Storage;

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = concat!("leakwatch/", env!("CARGO_PKG_VERSION"));

static SCRIPT_SRC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<script[^>]*\bsrc\s*=\s*["']([^"']+)["']"#).unwrap()
});

/// Shared HTTP client. The timeout bounds every fetch this tool makes,
/// including source-map downloads — a hanging map server degrades to the
/// fallback content instead of stalling a scan.
pub fn http_client() -> Client {
    Client::builder()
        .timeout(FETCH_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// What a scan cycle did, for terminal reporting.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub bundles_scanned: usize,
    pub new_findings: usize,
    pub total_findings: usize,
}

/// Runs every registered detector over one fetched bundle body. A failing
/// detector is logged and skipped so it cannot block the others.
pub async fn run_detectors(
    client: &Client,
    content: &str,
    url: &str,
    custom: &[PatternSpec],
) -> Vec<Finding> {
    let mut incoming = Vec::new();
    for detector in Detector::registry(custom) {
        match detector.detect(client, content, url).await {
            Ok(occurrences) => {
                for occurrence in occurrences {
                    incoming.push(Finding::from_occurrence(
                        occurrence,
                        detector.initial_validity(),
                    ));
                }
            }
            Err(e) => eprintln!("⚠️  {} detector failed: {}", detector.name(), e),
        }
    }
    incoming
}

/// Scans one bundle URL and reconciles the results into the store.
pub async fn scan_bundle<S: Storage>(
    client: &Client,
    store: &mut FindingStore<S>,
    bundle_url: &str,
    page_url: &str,
    custom: &[PatternSpec],
) -> Result<ScanOutcome, Box<dyn Error>> {
    let content = fetch_text(client, bundle_url).await?;
    let incoming = run_detectors(client, &content, bundle_url, custom).await;
    Ok(reconcile(store, incoming, page_url, 1).await)
}

/// Scans a page: the page body itself (inline scripts) plus every
/// external `<script src>` bundle it references. All detected batches
/// are reconciled and written back in a single logical write.
pub async fn scan_page<S: Storage>(
    client: &Client,
    store: &mut FindingStore<S>,
    page_url: &str,
    custom: &[PatternSpec],
) -> Result<ScanOutcome, Box<dyn Error>> {
    let page_body = fetch_text(client, page_url).await?;

    let mut incoming = run_detectors(client, &page_body, page_url, custom).await;
    let mut bundles_scanned = 1;

    for bundle_url in extract_script_urls(&page_body, page_url) {
        match fetch_text(client, &bundle_url).await {
            Ok(content) => {
                incoming.extend(run_detectors(client, &content, &bundle_url, custom).await);
                bundles_scanned += 1;
            }
            Err(e) => eprintln!("⚠️  Could not fetch {}: {}", bundle_url, e),
        }
    }

    Ok(reconcile(store, incoming, page_url, bundles_scanned).await)
}

/// Merges a batch into the persisted collection. This is the single
/// atomic write of the scan cycle.
async fn reconcile<S: Storage>(
    store: &mut FindingStore<S>,
    incoming: Vec<Finding>,
    page_url: &str,
    bundles_scanned: usize,
) -> ScanOutcome {
    let known: HashSet<String> = store
        .findings()
        .iter()
        .map(|f| f.fingerprint.clone())
        .collect();

    let merged = merge(store.findings(), &incoming, page_url);
    let new_findings = merged
        .iter()
        .filter(|f| !known.contains(&f.fingerprint))
        .count();
    let total_findings = merged.len();
    store.replace_all(merged).await;

    ScanOutcome {
        bundles_scanned,
        new_findings,
        total_findings,
    }
}

async fn fetch_text(client: &Client, url: &str) -> Result<String, Box<dyn Error>> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(format!("HTTP {} from {}", response.status(), url).into());
    }
    Ok(response.text().await?)
}

/// External script URLs referenced by a page, resolved against the page
/// URL. Unresolvable references are dropped.
pub fn extract_script_urls(page_body: &str, page_url: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for captures in SCRIPT_SRC.captures_iter(page_body) {
        let Some(reference) = captures.get(1) else {
            continue;
        };
        let resolved = match Url::parse(page_url).and_then(|base| base.join(reference.as_str())) {
            Ok(url) => url.to_string(),
            Err(_) => continue,
        };
        if seen.insert(resolved.clone()) {
            urls.push(resolved);
        }
    }
    urls
}
