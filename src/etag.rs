//! Fingerprint/ETag engine for conditional reads.
//!
//! A fingerprint is an opaque validator derived from the semantically relevant
//! state of a query result: every row-selecting filter, the maximum
//! `updated_at` across matching rows, and the row count. It is recomputed per
//! request and never persisted.

use sha2::{Digest, Sha256};

use crate::constants::FINGERPRINT_BYTES;

/// Compute a fingerprint over ordered (key, value) input pairs.
///
/// Identical inputs (including order) always yield the identical output; any
/// input change changes the output with overwhelming probability. The result
/// is a quoted opaque string usable directly as an `ETag` header value.
pub fn compute_fingerprint(inputs: &[(&str, String)]) -> String {
    let mut hasher = Sha256::new();
    for (key, value) in inputs {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b"\n");
    }
    let hash = hasher.finalize();
    format!("\"{}\"", hex::encode(&hash[..FINGERPRINT_BYTES]))
}

/// Check a client-supplied conditional header against the server's validator.
///
/// The client may present a comma-separated list of validators, each possibly
/// weak (`W/"..."`) or unquoted; matches if the server's current validator
/// appears anywhere in the list. `*` matches any validator.
pub fn validator_matches(client_header: &str, server_validator: &str) -> bool {
    let server = unquote(server_validator);
    client_header.split(',').any(|candidate| {
        let candidate = candidate.trim();
        if candidate == "*" {
            return true;
        }
        unquote(candidate) == server
    })
}

/// Strip an optional weak prefix and surrounding quotes
fn unquote(validator: &str) -> &str {
    let validator = validator.trim();
    let validator = validator.strip_prefix("W/").unwrap_or(validator);
    validator
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(validator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_inputs() -> Vec<(&'static str, String)> {
        vec![
            ("owners", "aaa,bbb".to_string()),
            ("category", "wedding".to_string()),
            ("max_updated_at", "1733788800".to_string()),
            ("count", "4".to_string()),
        ]
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        assert_eq!(
            compute_fingerprint(&sample_inputs()),
            compute_fingerprint(&sample_inputs())
        );
    }

    #[test]
    fn test_fingerprint_is_quoted_hex() {
        let fp = compute_fingerprint(&sample_inputs());
        assert!(fp.starts_with('"') && fp.ends_with('"'));
        let inner = &fp[1..fp.len() - 1];
        assert_eq!(inner.len(), FINGERPRINT_BYTES * 2);
        assert!(inner.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_changes_with_any_input() {
        let base = compute_fingerprint(&sample_inputs());

        let mut changed = sample_inputs();
        changed[1].1 = "travel".to_string();
        assert_ne!(base, compute_fingerprint(&changed));

        let mut changed = sample_inputs();
        changed[2].1 = "1733788801".to_string();
        assert_ne!(base, compute_fingerprint(&changed));

        let mut changed = sample_inputs();
        changed[3].1 = "5".to_string();
        assert_ne!(base, compute_fingerprint(&changed));
    }

    #[test]
    fn test_fingerprint_distinguishes_key_splits() {
        // "ab"+"c" and "a"+"bc" must not collide; the k=v\n framing separates them
        let one = compute_fingerprint(&[("k", "ab".to_string()), ("l", "c".to_string())]);
        let two = compute_fingerprint(&[("k", "a".to_string()), ("l", "bc".to_string())]);
        assert_ne!(one, two);
    }

    #[test]
    fn test_validator_matches_exact() {
        let server = compute_fingerprint(&sample_inputs());
        assert!(validator_matches(&server, &server));
    }

    #[test]
    fn test_validator_matches_in_list() {
        let server = "\"abc123\"";
        assert!(validator_matches("\"zzz\", \"abc123\" , \"yyy\"", server));
        assert!(!validator_matches("\"zzz\", \"yyy\"", server));
    }

    #[test]
    fn test_validator_matches_weak_and_unquoted() {
        let server = "\"abc123\"";
        assert!(validator_matches("W/\"abc123\"", server));
        assert!(validator_matches("abc123", server));
    }

    #[test]
    fn test_validator_matches_star() {
        assert!(validator_matches("*", "\"anything\""));
    }

    #[test]
    fn test_validator_no_match_on_empty() {
        assert!(!validator_matches("", "\"abc123\""));
    }
}
