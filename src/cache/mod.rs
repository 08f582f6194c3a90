//! Expiring key/value cache over persistent client storage.
//!
//! Every entry is written as `{"value": ..., "expiresAt": <epoch ms>}` under a
//! namespaced key. Expiration is checked lazily on access; nothing runs on a timer.

pub mod clock;
pub mod storage;

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use clock::{Clock, ManualClock, SystemClock};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};

pub const DEFAULT_NAMESPACE: &str = "digital-desk:";
pub const DEFAULT_TTL: Duration = Duration::from_secs(4 * 60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntry<T> {
    pub value: T,
    pub expires_at: i64,
}

impl<T> StoredEntry<T> {
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

pub struct ExpiringCache<S, C = SystemClock> {
    storage: S,
    clock: C,
    namespace: String,
    ttl: Duration,
}

impl<S: Storage> ExpiringCache<S, SystemClock> {
    pub fn new(storage: S) -> Self {
        Self::with_options(storage, SystemClock, DEFAULT_NAMESPACE, DEFAULT_TTL)
    }
}

impl<S: Storage, C: Clock> ExpiringCache<S, C> {
    /// Build a cache and sweep whatever expired while it was not running
    pub fn with_options(storage: S, clock: C, namespace: impl Into<String>, ttl: Duration) -> Self {
        let mut cache = Self {
            storage,
            clock,
            namespace: namespace.into(),
            ttl,
        };
        cache.cleanup_expired_items();
        cache
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) {
        let entry = StoredEntry {
            value,
            expires_at: self.clock.now_millis() + self.ttl.as_millis() as i64,
        };

        let encoded = match serde_json::to_string(&entry) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!("Failed to encode cache entry '{}': {}", key, e);
                return;
            }
        };

        let storage_key = self.storage_key(key);
        if let Err(e) = self.storage.set_item(&storage_key, &encoded) {
            tracing::warn!("Dropping cache write for '{}': {}", key, e);
        }
    }

    /// Value for `key` if present and unexpired. Expired or unreadable
    /// entries are deleted and reported as absent.
    pub fn get<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        let storage_key = self.storage_key(key);
        let raw = match self.storage.get_item(&storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Failed to read cache entry '{}': {}", key, e);
                return None;
            }
        };

        let value = Self::decode(&raw)
            .filter(|entry| !entry.is_expired(self.clock.now_millis()))
            .and_then(|entry| serde_json::from_value(entry.value).ok());

        if value.is_none() {
            self.delete(&storage_key);
        }
        value
    }

    pub fn remove(&mut self, key: &str) {
        let storage_key = self.storage_key(key);
        self.delete(&storage_key);
    }

    /// Delete every namespaced entry, expired or not
    pub fn clear_all(&mut self) {
        for storage_key in self.namespaced_keys() {
            self.delete(&storage_key);
        }
    }

    /// Delete expired and corrupt namespaced entries, returning how many went
    pub fn cleanup_expired_items(&mut self) -> usize {
        let now = self.clock.now_millis();
        let mut removed = 0;

        for storage_key in self.namespaced_keys() {
            let expired = match self.storage.get_item(&storage_key) {
                Ok(Some(raw)) => Self::decode(&raw).map_or(true, |entry| entry.is_expired(now)),
                Ok(None) => false,
                Err(_) => true,
            };
            if expired {
                self.delete(&storage_key);
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::debug!("Swept {} expired cache entries", removed);
        }
        removed
    }

    /// Time until `key` expires; zero when absent, expired or unreadable
    pub fn time_remaining(&self, key: &str) -> Duration {
        let now = self.clock.now_millis();
        self.storage
            .get_item(&self.storage_key(key))
            .ok()
            .flatten()
            .and_then(|raw| Self::decode(&raw))
            .map(|entry| Duration::from_millis((entry.expires_at - now).max(0) as u64))
            .unwrap_or(Duration::ZERO)
    }

    fn decode(raw: &str) -> Option<StoredEntry<Value>> {
        serde_json::from_str(raw).ok()
    }

    fn namespaced_keys(&self) -> Vec<String> {
        match self.storage.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|k| k.starts_with(&self.namespace))
                .collect(),
            Err(e) => {
                tracing::warn!("Failed to list cache keys: {}", e);
                Vec::new()
            }
        }
    }

    fn delete(&mut self, storage_key: &str) {
        if let Err(e) = self.storage.remove_item(storage_key) {
            tracing::warn!("Failed to remove cache entry '{}': {}", storage_key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(60 * 60);

    fn cache_at(now: i64) -> (ExpiringCache<MemoryStorage, ManualClock>, ManualClock) {
        let clock = ManualClock::starting_at(now);
        let cache = ExpiringCache::with_options(MemoryStorage::new(), clock.clone(), "test:", 4 * HOUR);
        (cache, clock)
    }

    #[test]
    fn get_returns_value_right_after_set() {
        let (mut cache, _) = cache_at(1_000);
        cache.set("draft", &vec!["one".to_string(), "two".to_string()]);

        let value: Option<Vec<String>> = cache.get("draft");
        assert_eq!(value, Some(vec!["one".to_string(), "two".to_string()]));
        assert!(cache.storage().get_item("test:draft").unwrap().is_some());
    }

    #[test]
    fn entry_is_written_with_absolute_expiry() {
        let (mut cache, _) = cache_at(1_000);
        cache.set("n", &42);

        let raw = cache.storage().get_item("test:n").unwrap().unwrap();
        let parsed: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["value"], 42);
        assert_eq!(parsed["expiresAt"], 1_000 + 4 * 60 * 60 * 1_000);
    }

    #[test]
    fn expired_entry_is_absent_and_evicted() {
        let (mut cache, clock) = cache_at(0);
        cache.set("token", &"abc");

        clock.advance(4 * HOUR - Duration::from_millis(1));
        assert_eq!(cache.get::<String>("token").as_deref(), Some("abc"));

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get::<String>("token"), None);
        assert_eq!(cache.storage().get_item("test:token").unwrap(), None);
    }

    #[test]
    fn rewriting_restarts_the_ttl() {
        let (mut cache, clock) = cache_at(0);
        cache.set("k", &1);
        clock.advance(3 * HOUR);
        cache.set("k", &2);
        clock.advance(3 * HOUR);
        assert_eq!(cache.get::<i32>("k"), Some(2));
    }

    #[test]
    fn clear_all_leaves_foreign_keys_alone() {
        let mut storage = MemoryStorage::new();
        storage.set_item("other-app", "keep me").unwrap();
        let clock = ManualClock::starting_at(0);
        let mut cache = ExpiringCache::with_options(storage, clock.clone(), "test:", HOUR);

        cache.set("a", &1);
        cache.set("b", &2);
        clock.advance(2 * HOUR);
        cache.set("c", &3);

        cache.clear_all();

        assert_eq!(cache.storage().keys().unwrap(), vec!["other-app".to_string()]);
    }

    #[test]
    fn corrupt_entries_are_treated_as_expired() {
        let mut storage = MemoryStorage::new();
        storage.set_item("test:broken", "{not json").unwrap();
        storage.set_item("test:shape", "{\"foo\": 1}").unwrap();
        storage.set_item("unrelated", "{not json").unwrap();

        let cache = ExpiringCache::with_options(storage, ManualClock::starting_at(0), "test:", HOUR);

        assert_eq!(cache.storage().keys().unwrap(), vec!["unrelated".to_string()]);
    }

    #[test]
    fn get_of_corrupt_entry_removes_it() {
        let (mut cache, _) = cache_at(0);
        cache.set("n", &1);
        // shape is fine, type is not
        assert_eq!(cache.get::<Vec<String>>("n"), None);
        assert_eq!(cache.storage().get_item("test:n").unwrap(), None);
    }

    #[test]
    fn sweep_removes_only_expired() {
        let (mut cache, clock) = cache_at(0);
        cache.set("old", &1);
        clock.advance(3 * HOUR);
        cache.set("fresh", &2);
        clock.advance(2 * HOUR);

        assert_eq!(cache.cleanup_expired_items(), 1);
        assert_eq!(cache.storage().keys().unwrap(), vec!["test:fresh".to_string()]);
    }

    #[test]
    fn construction_sweeps_expired_entries() {
        let mut storage = MemoryStorage::new();
        storage
            .set_item("test:stale", r#"{"value":"x","expiresAt":10}"#)
            .unwrap();
        storage
            .set_item("test:live", r#"{"value":"y","expiresAt":99999}"#)
            .unwrap();

        let cache = ExpiringCache::with_options(storage, ManualClock::starting_at(100), "test:", HOUR);
        assert_eq!(cache.storage().keys().unwrap(), vec!["test:live".to_string()]);
    }

    #[test]
    fn quota_failure_drops_the_write() {
        let clock = ManualClock::starting_at(0);
        let mut cache = ExpiringCache::with_options(MemoryStorage::with_quota(64), clock, "test:", HOUR);

        cache.set("big", &"x".repeat(200));
        assert_eq!(cache.get::<String>("big"), None);

        cache.set("small", &"ok");
        assert_eq!(cache.get::<String>("small").as_deref(), Some("ok"));
    }

    #[test]
    fn time_remaining_counts_down_without_mutating() {
        let (mut cache, clock) = cache_at(0);
        assert_eq!(cache.time_remaining("missing"), Duration::ZERO);

        cache.set("k", &true);
        clock.advance(HOUR);
        assert_eq!(cache.time_remaining("k"), 3 * HOUR);

        clock.advance(10 * HOUR);
        assert_eq!(cache.time_remaining("k"), Duration::ZERO);
        // still stored until the next read or sweep
        assert!(cache.storage().get_item("test:k").unwrap().is_some());
    }

    #[test]
    fn remove_deletes_unconditionally() {
        let (mut cache, _) = cache_at(0);
        cache.set("k", &1);
        cache.remove("k");
        assert_eq!(cache.get::<i32>("k"), None);
        cache.remove("never-set");
    }
}
