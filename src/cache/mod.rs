//! Response caching: TTL store, `Cache-Control` directives, and request fingerprints.
//!
//! - [`CacheStore`] holds values with per-entry TTL and lazy expiry.
//! - [`CacheDirectives`] turns a `Cache-Control` header into `max-age` /
//!   `stale-while-revalidate` settings.
//! - [`Fingerprint`] derives a stable key from a normalized request.

pub mod directives;
pub mod fingerprint;
pub mod store;

pub use directives::CacheDirectives;
pub use fingerprint::Fingerprint;
pub use store::{CacheStore, CachedValue, MAX_TTL, SweepPolicy, SweepReport};
