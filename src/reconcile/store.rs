use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;

use super::merge::same_origin;
use crate::model::{Finding, Occurrence, OccurrenceSet, Validity};
use crate::storage::codec::{
    deserialize_findings, deserialize_findings_map, serialize_findings, serialize_findings_map,
    SerializedFinding, SerializedMapEntry,
};
use crate::storage::{
    Storage, KEY_ACTIVE_TAB, KEY_FINDINGS, KEY_FINDINGS_MAP, KEY_NOTIFICATIONS,
};

/// Repository over the persisted finding collection.
///
/// Owns the in-memory state exclusively; all sharing with other execution
/// paths goes through the injected storage backend. The finding list and
/// the per-fingerprint occurrence map are kept in lockstep: every
/// mutation touches both or neither.
pub struct FindingStore<S: Storage> {
    backend: S,
    findings: Vec<Finding>,
    findings_map: HashMap<String, OccurrenceSet>,
}

impl<S: Storage> FindingStore<S> {
    /// Loads the persisted collection. Missing or unreadable keys read as
    /// an empty collection, never as an error.
    pub async fn load(backend: S) -> Self {
        let findings = match backend.get(KEY_FINDINGS).await {
            Some(value) => match serde_json::from_value::<Vec<SerializedFinding>>(value) {
                Ok(serialized) => deserialize_findings(serialized),
                Err(e) => {
                    eprintln!("⚠️  Stored findings are unreadable, starting empty: {}", e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let findings_map = match backend.get(KEY_FINDINGS_MAP).await {
            Some(value) => match serde_json::from_value::<Vec<SerializedMapEntry>>(value) {
                Ok(entries) => deserialize_findings_map(entries),
                Err(e) => {
                    eprintln!("⚠️  Stored findings map is unreadable, rebuilding: {}", e);
                    rebuild_map(&findings)
                }
            },
            // Older stores may predate the map key; rebuild from the list.
            None => rebuild_map(&findings),
        };

        FindingStore {
            backend,
            findings,
            findings_map,
        }
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn get_finding(&self, fingerprint: &str) -> Option<&Finding> {
        self.findings.iter().find(|f| f.fingerprint == fingerprint)
    }

    /// Existence check via the map index.
    pub fn has_finding(&self, fingerprint: &str) -> bool {
        self.findings_map.contains_key(fingerprint)
    }

    /// Inserts a finding iff its fingerprint is unseen. Persists on
    /// success.
    pub async fn add_finding(&mut self, finding: Finding) -> bool {
        if self.has_finding(&finding.fingerprint) || self.get_finding(&finding.fingerprint).is_some()
        {
            return false;
        }
        self.findings_map
            .insert(finding.fingerprint.clone(), finding.occurrences.clone());
        self.findings.push(finding);
        self.persist().await;
        true
    }

    /// Removes a finding iff it is present in both the list and the map.
    /// When the two structures disagree this is treated as "not found" —
    /// never a partial removal.
    pub async fn remove_finding(&mut self, fingerprint: &str) -> bool {
        let index = self
            .findings
            .iter()
            .position(|f| f.fingerprint == fingerprint);
        let in_map = self.findings_map.contains_key(fingerprint);

        let Some(index) = index else { return false };
        if !in_map {
            return false;
        }

        self.findings.remove(index);
        self.findings_map.remove(fingerprint);
        self.persist().await;
        true
    }

    /// Records a sighting against an existing finding.
    ///
    /// Returns `true` only for a genuine cross-origin addition. An
    /// identical URL is a no-op; a same-origin sighting rewrites that
    /// occurrence's `url`/`file_path` in place WITHOUT touching
    /// `num_occurrences` (an update is not an addition).
    pub async fn add_occurrence(&mut self, occurrence: Occurrence) -> bool {
        let Some(finding) = self
            .findings
            .iter_mut()
            .find(|f| f.fingerprint == occurrence.fingerprint)
        else {
            return false;
        };

        if finding.occurrences.contains_url(&occurrence.url) {
            return false;
        }

        let mut refreshed = false;
        for existing in finding.occurrences.iter_mut() {
            if same_origin(&existing.url, &occurrence.url) {
                existing.file_path = occurrence.file_path.clone();
                existing.url = occurrence.url.clone();
                refreshed = true;
                break;
            }
        }

        if refreshed {
            let snapshot = finding.occurrences.clone();
            self.findings_map
                .insert(occurrence.fingerprint.clone(), snapshot);
            self.persist().await;
            return false;
        }

        finding.occurrences.insert(occurrence.clone());
        finding.num_occurrences = finding.occurrences.len();
        let snapshot = finding.occurrences.clone();
        self.findings_map
            .insert(occurrence.fingerprint.clone(), snapshot);
        self.persist().await;
        true
    }

    /// Creates a finding for a first-time fingerprint: one occurrence,
    /// `validity = valid` (detection implies a live check), timestamps
    /// set. Returns `None` when the fingerprint is already known.
    pub async fn create_finding_from_occurrence(
        &mut self,
        occurrence: Occurrence,
    ) -> Option<Finding> {
        if self.has_finding(&occurrence.fingerprint)
            || self.get_finding(&occurrence.fingerprint).is_some()
        {
            return None;
        }

        let mut finding = Finding::from_occurrence(occurrence, Validity::Valid);
        finding.validated_at = Some(Utc::now());

        self.findings_map
            .insert(finding.fingerprint.clone(), finding.occurrences.clone());
        self.findings.push(finding.clone());
        self.persist().await;
        Some(finding)
    }

    /// Replaces the whole collection with a merged result — the single
    /// atomic logical write of a scan cycle.
    pub async fn replace_all(&mut self, findings: Vec<Finding>) {
        self.findings_map = rebuild_map(&findings);
        self.findings = findings;
        self.persist().await;
        let unseen = self.findings.iter().filter(|f| f.is_new).count();
        self.backend
            .set(KEY_NOTIFICATIONS, Value::String(unseen.to_string()))
            .await;
    }

    /// Updates a finding's validity and check timestamp. A lookup miss is
    /// a silent no-op — the finding may have been deleted mid-recheck.
    pub async fn set_validity(&mut self, fingerprint: &str, validity: Validity) {
        let Some(finding) = self
            .findings
            .iter_mut()
            .find(|f| f.fingerprint == fingerprint)
        else {
            return;
        };
        finding.validity = validity;
        finding.validated_at = Some(Utc::now());
        self.persist().await;
    }

    /// Clears the new-finding markers and the notification count, after
    /// the user has viewed the list.
    pub async fn mark_all_seen(&mut self) {
        for finding in &mut self.findings {
            finding.is_new = false;
        }
        self.persist().await;
        self.backend
            .set(KEY_NOTIFICATIONS, Value::String("0".to_string()))
            .await;
    }

    pub async fn set_active_tab(&self, tab: &str) {
        self.backend
            .set(KEY_ACTIVE_TAB, Value::String(tab.to_string()))
            .await;
    }

    /// Writes both structures back to storage. Failures are logged inside
    /// the backend and never propagate.
    async fn persist(&self) {
        let findings = serialize_findings(&self.findings);
        match serde_json::to_value(&findings) {
            Ok(value) => self.backend.set(KEY_FINDINGS, value).await,
            Err(e) => eprintln!("⚠️  Could not encode findings: {}", e),
        }

        let entries = serialize_findings_map(&self.findings_map);
        match serde_json::to_value(&entries) {
            Ok(value) => self.backend.set(KEY_FINDINGS_MAP, value).await,
            Err(e) => eprintln!("⚠️  Could not encode findings map: {}", e),
        }
    }

    #[cfg(test)]
    pub(crate) fn desync_map_for_test(&mut self, fingerprint: &str) {
        self.findings_map.remove(fingerprint);
    }
}

fn rebuild_map(findings: &[Finding]) -> HashMap<String, OccurrenceSet> {
    findings
        .iter()
        .map(|f| (f.fingerprint.clone(), f.occurrences.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SecretValue, SourceContent};
    use crate::storage::backend::memory::MemoryStorage;

    fn occurrence(fingerprint: &str, url: &str) -> Occurrence {
        Occurrence::new(
            "OpenAI API Key",
            fingerprint.to_string(),
            SecretValue::OpenAi {
                api_key: format!("sk-{}", fingerprint),
            },
            url,
            SourceContent::fallback("{}".to_string(), url),
        )
    }

    async fn store_with(fingerprints: &[(&str, &str)]) -> FindingStore<MemoryStorage> {
        let mut store = FindingStore::load(MemoryStorage::new()).await;
        for (fp, url) in fingerprints {
            store
                .create_finding_from_occurrence(occurrence(fp, url))
                .await;
        }
        store
    }

    #[tokio::test]
    async fn create_then_lookup() {
        let store = store_with(&[("fp1", "https://a.example/app.js")]).await;
        assert!(store.has_finding("fp1"));
        let finding = store.get_finding("fp1").unwrap();
        assert_eq!(finding.num_occurrences, 1);
        assert_eq!(finding.validity, Validity::Valid);
        assert!(finding.validated_at.is_some());
        assert!(finding.is_new);
    }

    #[tokio::test]
    async fn create_refuses_known_fingerprint() {
        let mut store = store_with(&[("fp1", "https://a.example/app.js")]).await;
        let created = store
            .create_finding_from_occurrence(occurrence("fp1", "https://b.example/app.js"))
            .await;
        assert!(created.is_none());
        assert_eq!(store.findings().len(), 1);
    }

    #[tokio::test]
    async fn add_finding_refuses_duplicates() {
        let mut store = store_with(&[]).await;
        let finding = Finding::from_occurrence(
            occurrence("fp1", "https://a.example/app.js"),
            Validity::Valid,
        );
        assert!(store.add_finding(finding.clone()).await);
        assert!(!store.add_finding(finding).await);
    }

    #[tokio::test]
    async fn add_occurrence_without_finding_is_noop() {
        let mut store = store_with(&[]).await;
        assert!(
            !store
                .add_occurrence(occurrence("fp-ghost", "https://a.example/app.js"))
                .await
        );
        assert!(store.findings().is_empty());
    }

    #[tokio::test]
    async fn identical_url_is_rejected_twice() {
        let mut store = store_with(&[("fp1", "https://a.example/app.js")]).await;
        let occ = occurrence("fp1", "https://a.example/app.js");
        assert!(!store.add_occurrence(occ.clone()).await);
        assert!(!store.add_occurrence(occ).await);
        assert_eq!(store.get_finding("fp1").unwrap().occurrences.len(), 1);
    }

    #[tokio::test]
    async fn same_origin_update_does_not_bump_count() {
        let mut store = store_with(&[("fp1", "https://a.example/app.js")]).await;

        let added = store
            .add_occurrence(occurrence("fp1", "https://a.example/app.v2.js"))
            .await;

        // An in-place refresh is an update, not an addition.
        assert!(!added);
        let finding = store.get_finding("fp1").unwrap();
        assert_eq!(finding.num_occurrences, 1);
        assert_eq!(finding.occurrences.len(), 1);
        let occ = finding.occurrences.iter().next().unwrap();
        assert_eq!(occ.url, "https://a.example/app.v2.js");
        assert_eq!(occ.file_path, "app.v2.js");
    }

    #[tokio::test]
    async fn cross_origin_addition_bumps_count() {
        let mut store = store_with(&[("fp1", "https://a.example/app.js")]).await;

        let added = store
            .add_occurrence(occurrence("fp1", "https://b.example/app.js"))
            .await;

        assert!(added);
        let finding = store.get_finding("fp1").unwrap();
        assert_eq!(finding.num_occurrences, 2);
        assert_eq!(finding.occurrences.len(), 2);
    }

    #[tokio::test]
    async fn remove_requires_both_structures() {
        let mut store = store_with(&[("fp1", "https://a.example/app.js")]).await;
        store.desync_map_for_test("fp1");

        assert!(!store.remove_finding("fp1").await);
        // The list entry survives a refused removal.
        assert!(store.get_finding("fp1").is_some());
    }

    #[tokio::test]
    async fn remove_deletes_from_both_structures() {
        let mut store = store_with(&[("fp1", "https://a.example/app.js")]).await;
        assert!(store.remove_finding("fp1").await);
        assert!(!store.has_finding("fp1"));
        assert!(store.get_finding("fp1").is_none());
        assert!(!store.remove_finding("fp1").await);
    }

    #[tokio::test]
    async fn state_survives_reload() {
        let backend = MemoryStorage::new();
        {
            let mut store = FindingStore::load(&backend).await;
            store
                .create_finding_from_occurrence(occurrence("fp1", "https://a.example/app.js"))
                .await;
            store
                .add_occurrence(occurrence("fp1", "https://b.example/app.js"))
                .await;
        }

        let reloaded = FindingStore::load(&backend).await;
        let finding = reloaded.get_finding("fp1").unwrap();
        assert_eq!(finding.num_occurrences, 2);
        assert!(reloaded.has_finding("fp1"));
    }

    #[tokio::test]
    async fn set_validity_touches_only_validity_fields() {
        let mut store = store_with(&[("fp1", "https://a.example/app.js")]).await;
        let before = store.get_finding("fp1").unwrap().clone();

        store.set_validity("fp1", Validity::Invalid).await;

        let after = store.get_finding("fp1").unwrap();
        assert_eq!(after.validity, Validity::Invalid);
        assert_eq!(after.occurrences, before.occurrences);
        assert_eq!(after.num_occurrences, before.num_occurrences);

        // Unknown fingerprints are a silent no-op.
        store.set_validity("fp-ghost", Validity::Valid).await;
    }

    #[tokio::test]
    async fn mark_all_seen_clears_flags_and_notifications() {
        let backend = MemoryStorage::new();
        let mut store = FindingStore::load(&backend).await;
        store
            .create_finding_from_occurrence(occurrence("fp1", "https://a.example/app.js"))
            .await;

        store.mark_all_seen().await;

        assert!(store.findings().iter().all(|f| !f.is_new));
        assert_eq!(
            backend.snapshot(KEY_NOTIFICATIONS),
            Some(Value::String("0".to_string()))
        );
    }
}
