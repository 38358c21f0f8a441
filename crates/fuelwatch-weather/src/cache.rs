//! In-memory TTL cache shared by forecast and observation lookups.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

/// Reference TTL for forecasts
pub const FORECAST_TTL: Duration = Duration::from_secs(3 * 60 * 60);

/// Reference TTL for observations
pub const OBSERVATION_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    stored_at: DateTime<Utc>,
}

/// Diagnostics snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub keys: Vec<String>,
}

/// Key-value store whose entries read as misses once `ttl` has elapsed.
///
/// Stale entries are only replaced on the next `put`, or dropped by an
/// explicit [`TtlCache::purge_expired`].
#[derive(Debug)]
pub struct TtlCache<T> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<T> {
        self.get_at(key, Utc::now())
    }

    pub fn put(&self, key: impl Into<String>, value: T) {
        self.put_at(key, value, Utc::now());
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        CacheStats {
            size: entries.len(),
            keys,
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<T> {
        let entries = self.entries.lock();
        let entry = entries.get(key)?;
        if self.is_fresh(entry, now) {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    fn put_at(&self, key: impl Into<String>, value: T, now: DateTime<Utc>) {
        self.entries.lock().insert(
            key.into(),
            CacheEntry {
                value,
                stored_at: now,
            },
        );
    }

    fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| self.is_fresh(entry, now));
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!("Purged {} expired cache entries", removed);
        }
        removed
    }

    fn is_fresh(&self, entry: &CacheEntry<T>, now: DateTime<Utc>) -> bool {
        match (now - entry.stored_at).to_std() {
            Ok(age) => age < self.ttl,
            // stored_at in the future (clock step back): still fresh
            Err(_) => true,
        }
    }
}
