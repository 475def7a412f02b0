//! Deterministic cache keys for normalized requests.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// SHA-256 digest (lowercase hex) of a canonical JSON encoding.
///
/// Object keys are sorted recursively before hashing, so two structurally
/// equal values produce the same fingerprint regardless of field order.
/// Fingerprints identify cache entries only; they carry no authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprints any serializable value.
    ///
    /// # Errors
    ///
    /// Fails only if `value` cannot be represented as JSON (e.g. a map with
    /// non-string keys).
    ///
    /// # Examples
    ///
    /// ```
    /// use dataproxy::cache::Fingerprint;
    /// use serde_json::json;
    ///
    /// let a = Fingerprint::of(&json!({"a": 1, "b": 2})).unwrap();
    /// let b = Fingerprint::of(&json!({"b": 2, "a": 1})).unwrap();
    /// assert_eq!(a, b);
    /// assert_eq!(a.as_str().len(), 64);
    /// ```
    pub fn of<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        let canonical = canonicalize(serde_json::to_value(value)?);
        let bytes = serde_json::to_vec(&canonical)?;
        Ok(Self(hex::encode(Sha256::digest(&bytes))))
    }

    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Rebuilds objects with sorted keys; arrays keep their order.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_matter() {
        let a = json!({"where": {"id": 1, "email": "a@b.c"}, "take": 5});
        let b = json!({"take": 5, "where": {"email": "a@b.c", "id": 1}});
        assert_eq!(Fingerprint::of(&a).unwrap(), Fingerprint::of(&b).unwrap());
    }

    #[test]
    fn array_order_matters() {
        let a = json!({"ids": [1, 2]});
        let b = json!({"ids": [2, 1]});
        assert_ne!(Fingerprint::of(&a).unwrap(), Fingerprint::of(&b).unwrap());
    }

    #[test]
    fn stable_known_digest() {
        // sha256("{}")
        let fp = Fingerprint::of(&json!({})).unwrap();
        assert_eq!(
            fp.as_str(),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[test]
    fn hex_lowercase_fixed_length() {
        let fp = Fingerprint::of(&json!({"modelName": "User"})).unwrap();
        assert_eq!(fp.to_string().len(), 64);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
