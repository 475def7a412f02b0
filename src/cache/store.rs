//! In-memory TTL store with lazy expiry and an explicit sweep.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Longest lifetime an entry can be given; larger TTLs are clamped to it.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// A stored value together with its freshness window.
///
/// Entries are never mutated after insertion; [`CacheStore::set`] always
/// replaces the whole entry.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    // A zero-TTL entry has `expires_at == created_at` and is never fresh.
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at > self.created_at && now <= self.expires_at
    }
}

/// A fresh value returned by [`CacheStore::get_full`], with its timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue<V> {
    pub value: V,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl<V> CachedValue<V> {
    /// Time elapsed since the entry was written.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    /// Time left before the entry expires.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

/// Thresholds for the "sweeping too often" diagnostic.
///
/// When more than `max_calls` sweeps land inside a sliding `window`,
/// [`CacheStore::clear_old`] logs a warning. It never refuses to sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPolicy {
    pub max_calls: usize,
    pub window: Duration,
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self {
            max_calls: 10,
            window: Duration::from_secs(60),
        }
    }
}

/// Outcome of a single [`CacheStore::clear_old`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Number of expired entries removed.
    pub evicted: usize,
    /// `true` when this call pushed the store over its [`SweepPolicy`].
    pub overused: bool,
}

/// Process-local key/value store with per-entry TTL.
///
/// Reads apply lazy expiry: an expired entry found by [`has`](Self::has),
/// [`get`](Self::get) or [`get_full`](Self::get_full) is removed on the spot.
/// [`clear_old`](Self::clear_old) is a separate maintenance pass that evicts
/// every expired entry at once.
///
/// Keys are sharded across a [`DashMap`], so concurrent readers and writers
/// on different keys do not contend and writers on the same key resolve as
/// last-writer-wins.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use dataproxy::cache::CacheStore;
///
/// let store = CacheStore::new();
/// store.set("greeting", "hello".to_string(), Duration::from_secs(30));
/// assert_eq!(store.get("greeting").as_deref(), Some("hello"));
/// ```
#[derive(Debug)]
pub struct CacheStore<V> {
    entries: DashMap<String, CacheEntry<V>>,
    sweep_calls: Mutex<VecDeque<Instant>>,
    sweep_policy: SweepPolicy,
}

impl<V: Clone> Default for CacheStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> CacheStore<V> {
    /// Creates an empty store with the default [`SweepPolicy`].
    pub fn new() -> Self {
        Self::with_sweep_policy(SweepPolicy::default())
    }

    /// Creates an empty store with a custom sweep diagnostic policy.
    pub fn with_sweep_policy(sweep_policy: SweepPolicy) -> Self {
        Self {
            entries: DashMap::new(),
            sweep_calls: Mutex::new(VecDeque::new()),
            sweep_policy,
        }
    }

    /// Stores `value` under `key` for `ttl`, replacing any previous entry.
    ///
    /// `ttl` is clamped to [`MAX_TTL`].
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let now = Instant::now();
        let expires_at = now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now);
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                created_at: now,
                expires_at,
            },
        );
    }

    /// Returns `true` if `key` holds a fresh entry. Expired entries are dropped.
    pub fn has(&self, key: &str) -> bool {
        self.get_full(key).is_some()
    }

    /// Returns a clone of the fresh value stored under `key`.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_full(key).map(|cached| cached.value)
    }

    /// Returns the fresh value under `key` along with its timestamps.
    pub fn get_full(&self, key: &str) -> Option<CachedValue<V>> {
        let now = Instant::now();
        let entry = self.entries.get(key)?;
        if entry.is_fresh(now) {
            return Some(CachedValue {
                value: entry.value.clone(),
                created_at: entry.created_at,
                expires_at: entry.expires_at,
            });
        }
        // Release the shard read lock before taking the write lock.
        drop(entry);
        // A concurrent `set` may have replaced the entry in between.
        if self.entries.remove_if(key, |_, e| !e.is_fresh(now)).is_some() {
            debug!(key, "evicted expired cache entry on read");
        }
        None
    }

    /// Removes the entry for `key`, if any.
    pub fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of entries currently held, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evicts all expired entries and records the call for the overuse diagnostic.
    pub fn clear_old(&self) -> SweepReport {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(now));
        let evicted = before.saturating_sub(self.entries.len());

        let overused = {
            let mut calls = self
                .sweep_calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            calls.push_back(now);
            while calls
                .front()
                .is_some_and(|&t| now.duration_since(t) >= self.sweep_policy.window)
            {
                calls.pop_front();
            }
            calls.len() > self.sweep_policy.max_calls
        };

        if overused {
            warn!(
                max_calls = self.sweep_policy.max_calls,
                window_ms = self.sweep_policy.window.as_millis() as u64,
                "clearing expired cache entries too often"
            );
        }
        debug!(evicted, "swept expired cache entries");

        SweepReport { evicted, overused }
    }
}
