//! `Cache-Control` request header parsing.

use std::collections::HashMap;
use std::time::Duration;

/// Literal header value that disables both reading and writing the cache.
pub const NO_CACHE: &str = "no-cache";

/// Caching policy requested by a client through its `Cache-Control` header.
///
/// Both fields are in seconds. A field is `None` when the directive is absent
/// or its value is not a non-negative integer; the corresponding caching
/// behaviour is then disabled rather than rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheDirectives {
    pub max_age: Option<u64>,
    pub stale_while_revalidate: Option<u64>,
}

impl CacheDirectives {
    /// Parses a `Cache-Control` header value.
    ///
    /// Returns `None` when the header is absent or equals `no-cache`.
    ///
    /// # Examples
    ///
    /// ```
    /// use dataproxy::cache::CacheDirectives;
    ///
    /// let d = CacheDirectives::parse(Some("max-age=60, stale-while-revalidate=30")).unwrap();
    /// assert_eq!(d.max_age, Some(60));
    /// assert_eq!(d.stale_while_revalidate, Some(30));
    ///
    /// assert!(CacheDirectives::parse(Some("no-cache")).is_none());
    /// assert!(CacheDirectives::parse(None).is_none());
    /// ```
    pub fn parse(header: Option<&str>) -> Option<Self> {
        let header = header?;
        if header.trim().eq_ignore_ascii_case(NO_CACHE) {
            return None;
        }

        let tokens = split_directives(header);
        let seconds = |name: &str| tokens.get(name).and_then(|v| v.parse::<u64>().ok());

        Some(Self {
            max_age: seconds("max-age"),
            stale_while_revalidate: seconds("stale-while-revalidate"),
        })
    }

    /// `max-age` as a [`Duration`].
    pub fn max_age_duration(&self) -> Option<Duration> {
        self.max_age.map(Duration::from_secs)
    }

    /// `stale-while-revalidate` as a [`Duration`].
    pub fn stale_while_revalidate_duration(&self) -> Option<Duration> {
        self.stale_while_revalidate.map(Duration::from_secs)
    }
}

// "a=1, b , c=3" -> {a: "1", b: "", c: "3"}
fn split_directives(header: &str) -> HashMap<&str, &str> {
    header
        .split(',')
        .filter_map(|token| {
            let mut parts = token.splitn(2, '=');
            let key = parts.next()?.trim();
            if key.is_empty() {
                return None;
            }
            Some((key, parts.next().unwrap_or("").trim()))
        })
        .collect()
}
