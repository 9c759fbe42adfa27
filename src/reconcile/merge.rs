use url::Url;

use crate::model::Finding;

/// True iff both URLs parse and their (scheme, host, port) triples match
/// exactly. Any parse failure means "different origins" — the merge must
/// never throw over a malformed URL.
pub fn same_origin(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => {
            a.scheme() == b.scheme()
                && a.host_str() == b.host_str()
                && a.port_or_known_default() == b.port_or_known_default()
        }
        _ => false,
    }
}

/// Merges freshly detected findings into the existing collection.
///
/// Pure over its inputs: `existing` is deep-copied and neither argument
/// is mutated. For each incoming finding:
///
/// - known fingerprint, occurrence at an already-seen origin: that
///   occurrence's `url`/`file_path` are rewritten in place (keeps the
///   stored reference fresh after a cache-busted rebuild) and
///   `num_occurrences` does NOT change;
/// - known fingerprint, new origin: the occurrence is added and the count
///   set to the occurrence-set size;
/// - unknown fingerprint: the finding is appended as-is.
///
/// `current_page_url` is caller context only (candidate input for future
/// prioritization); the merge decision does not consult it. Keep it in
/// the signature — external callers pass it.
pub fn merge(existing: &[Finding], incoming: &[Finding], current_page_url: &str) -> Vec<Finding> {
    let _ = current_page_url;

    let mut result: Vec<Finding> = existing.to_vec();

    for new_finding in incoming {
        let target = result
            .iter_mut()
            .find(|f| f.fingerprint == new_finding.fingerprint);

        let Some(target) = target else {
            result.push(new_finding.clone());
            continue;
        };

        // By convention an incoming finding carries a single occurrence,
        // but the loop keeps the merge correct if a batch carries more.
        for new_occurrence in new_finding.occurrences.iter() {
            let mut updated = false;
            for existing_occurrence in target.occurrences.iter_mut() {
                if same_origin(&existing_occurrence.url, &new_occurrence.url) {
                    existing_occurrence.file_path = new_occurrence.file_path.clone();
                    existing_occurrence.url = new_occurrence.url.clone();
                    updated = true;
                    break;
                }
            }
            if !updated {
                target.occurrences.insert(new_occurrence.clone());
                target.num_occurrences = target.occurrences.len();
            }
        }
    }

    result
}
