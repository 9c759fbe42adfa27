use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Deterministic identity of a secret payload.
///
/// The parts mapping is serialized to canonical JSON (BTreeMap keys are
/// already sorted) and SHA-256 hashed, so the digest depends only on the
/// key/value content — never on insertion order. Computed once at
/// detection time; never recomputed for a stored finding.
pub fn fingerprint(parts: &BTreeMap<String, String>) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_string(parts)?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn deterministic_across_calls() {
        let payload = parts(&[("api_key", "sk-abc123")]);
        assert_eq!(
            fingerprint(&payload).unwrap(),
            fingerprint(&payload).unwrap()
        );
    }

    #[test]
    fn independent_of_insertion_order() {
        let mut forward = BTreeMap::new();
        forward.insert("access_key_id".to_string(), "AKIA000".to_string());
        forward.insert("secret_key_id".to_string(), "abc".to_string());

        let mut reversed = BTreeMap::new();
        reversed.insert("secret_key_id".to_string(), "abc".to_string());
        reversed.insert("access_key_id".to_string(), "AKIA000".to_string());

        assert_eq!(
            fingerprint(&forward).unwrap(),
            fingerprint(&reversed).unwrap()
        );
    }

    #[test]
    fn different_payloads_differ() {
        let a = parts(&[("api_key", "sk-abc123")]);
        let b = parts(&[("api_key", "sk-abc124")]);
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn key_names_matter() {
        let a = parts(&[("api_key", "x")]);
        let b = parts(&[("token", "x")]);
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }
}
