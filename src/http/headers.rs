//! Case-insensitive header map.

use std::fmt;

/// An order-preserving, multi-value header map with case-insensitive lookup.
///
/// # Examples
///
/// ```
/// use dataproxy::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Cache-Control", "max-age=60");
/// headers.insert("Authorization", "Bearer s3cret");
///
/// assert_eq!(headers.get("cache-control"), Some("max-age=60"));
/// assert_eq!(headers.bearer_token(), Some("s3cret"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty header map with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Appends an entry; earlier values for the same name are kept.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value for `name`, ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `name` in insertion order, ignoring ASCII case.
    pub fn get_all<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a str> + use<'a, 'n> {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` if at least one entry is named `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The credential of an `Authorization: Bearer <token>` header.
    pub fn bearer_token(&self) -> Option<&str> {
        let value = self.get("authorization")?.trim();
        let (scheme, token) = value.split_once(' ')?;
        scheme
            .eq_ignore_ascii_case("bearer")
            .then(|| token.trim())
            .filter(|t| !t.is_empty())
    }

    /// Number of entries, counting repeated names separately.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let mut h = Headers::new();
        h.insert("Cache-Control", "no-cache");
        assert_eq!(h.get("CACHE-CONTROL"), Some("no-cache"));
        assert!(h.contains("cache-control"));
        assert!(!h.contains("pragma"));
    }

    #[test]
    fn keeps_every_value() {
        let mut h = Headers::new();
        h.insert("Via", "1.1 edge");
        h.insert("via", "1.1 origin");
        assert_eq!(h.get_all("VIA").collect::<Vec<_>>(), vec!["1.1 edge", "1.1 origin"]);
        assert_eq!(h.get("via"), Some("1.1 edge"));
        assert_eq!(h.to_string(), "Via: 1.1 edge\r\nvia: 1.1 origin\r\n");
    }

    // The returned value must outlive the borrowed lookup name.
    #[test]
    fn value_outlives_lookup_name() {
        let mut h = Headers::new();
        h.insert("Cache-Control", "max-age=60");
        let value = {
            let name = String::from("cache-control");
            h.get(&name)
        };
        assert_eq!(value, Some("max-age=60"));

        let all: Vec<&str> = {
            let name = String::from("CACHE-CONTROL");
            h.get_all(&name).collect()
        };
        assert_eq!(all, vec!["max-age=60"]);
    }

    #[test]
    fn bearer_token_parsing() {
        let mut h = Headers::new();
        h.insert("Authorization", "bearer   abc ");
        assert_eq!(h.bearer_token(), Some("abc"));

        let mut basic = Headers::new();
        basic.insert("Authorization", "Basic dXNlcjpwYXNz");
        assert_eq!(basic.bearer_token(), None);

        let mut empty = Headers::new();
        empty.insert("Authorization", "Bearer ");
        assert_eq!(empty.bearer_token(), None);
        assert_eq!(Headers::new().bearer_token(), None);
    }
}
