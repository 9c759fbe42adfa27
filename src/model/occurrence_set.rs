use super::finding::Occurrence;

/// Set of occurrences owned by a finding.
///
/// Backed by a plain vector so the reconciliation engine can rewrite an
/// element it found by origin scan (a hash-set of value types would make
/// that awkward). The set property — at most one occurrence per origin,
/// never two with the same URL — is enforced by the engine and by
/// `insert`, not by element hashing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OccurrenceSet {
    items: Vec<Occurrence>,
}

impl OccurrenceSet {
    pub fn new() -> Self {
        OccurrenceSet { items: Vec::new() }
    }

    pub fn single(occurrence: Occurrence) -> Self {
        OccurrenceSet {
            items: vec![occurrence],
        }
    }

    /// Wraps a flat array back into a set. Duplicate URLs are collapsed so
    /// a storage document written by an older schema cannot inflate counts.
    pub fn from_vec(items: Vec<Occurrence>) -> Self {
        let mut set = OccurrenceSet::new();
        for occ in items {
            set.insert(occ);
        }
        set
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Occurrence> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Occurrence> {
        self.items.iter_mut()
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.items.iter().any(|occ| occ.url == url)
    }

    /// Adds an occurrence unless one with the identical URL is already
    /// present. Returns whether the set grew.
    pub fn insert(&mut self, occurrence: Occurrence) -> bool {
        if self.contains_url(&occurrence.url) {
            return false;
        }
        self.items.push(occurrence);
        true
    }

    pub fn to_vec(&self) -> Vec<Occurrence> {
        self.items.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::finding::SourceContent;
    use crate::model::secret_value::SecretValue;

    fn occ(url: &str) -> Occurrence {
        Occurrence::new(
            "OpenAI API Key",
            "fp1".to_string(),
            SecretValue::OpenAi {
                api_key: "sk-test".to_string(),
            },
            url,
            SourceContent::fallback("{}".to_string(), url),
        )
    }

    #[test]
    fn insert_rejects_identical_url() {
        let mut set = OccurrenceSet::new();
        assert!(set.insert(occ("https://a.example/app.js")));
        assert!(!set.insert(occ("https://a.example/app.js")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn from_vec_collapses_duplicates() {
        let set = OccurrenceSet::from_vec(vec![
            occ("https://a.example/app.js"),
            occ("https://a.example/app.js"),
            occ("https://b.example/app.js"),
        ]);
        assert_eq!(set.len(), 2);
    }
}
