//! # Generation Utilities
//!
//! Fingerprinting and identifier helpers shared across the workspace.
//!
//! - SHA-256 content hashes, hex encoded
//! - Canonical JSON so equal parameter bags hash equally
//! - Prefixed UUID v4 identifiers for persisted artifacts

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Compute SHA-256 hash of content string
///
/// # Examples
///
/// ```
/// use utils::compute_content_hash;
///
/// let hash = compute_content_hash("hello world");
/// assert_eq!(hash.len(), 64);
/// ```
#[must_use]
pub fn compute_content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Serialize a JSON value with object keys sorted at every depth.
///
/// `serde_json::Map` is a `BTreeMap` unless the `preserve_order` feature is
/// on, and nothing in this workspace enables it.
#[must_use]
pub fn canonical_json(value: &serde_json::Value) -> String {
    value.to_string()
}

/// Hash of the canonical JSON form of `value`.
#[must_use]
pub fn fingerprint_json(value: &serde_json::Value) -> String {
    compute_content_hash(&canonical_json(value))
}

/// Generate a UUID v4 string with a readable prefix, e.g. `art_…`.
#[must_use]
pub fn generate_prefixed_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

/// Shorten text for log lines and error messages without splitting a char.
#[must_use]
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compute_content_hash_consistency() {
        let content = "test content";
        let hash1 = compute_content_hash(content);
        let hash2 = compute_content_hash(content);
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let value = json!({"b": 1, "a": {"z": [1, {"y": 2, "x": 1}], "c": null}});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"c":null,"z":[1,{"x":1,"y":2}]},"b":1}"#
        );
    }

    #[test]
    fn test_fingerprint_is_key_order_independent() {
        let a: serde_json::Value = serde_json::from_str(r#"{"tone":"dark","genre":"noir"}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"genre":"noir","tone":"dark"}"#).unwrap();
        assert_eq!(fingerprint_json(&a), fingerprint_json(&b));
    }

    #[test]
    fn test_generate_prefixed_id_uniqueness() {
        let id1 = generate_prefixed_id("art");
        let id2 = generate_prefixed_id("art");
        assert!(id1.starts_with("art_"));
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("héllo world", 5), "héllo...");
    }
}
