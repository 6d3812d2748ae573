//! # Session Store
//!
//! An in-memory [`StateStore`] backed by a `moka` cache. Each entry carries
//! its own deadline, set on every write, after which it is no longer
//! returned and is evicted by the cache.
//!
//! [`Sessions::swap`] replaces an entry only while it still holds an expected
//! value, letting concurrent writers to the same session detect each other.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use moka::Expiry;
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::provider::{Result, StateStore};

#[derive(Clone, Debug)]
struct Entry {
    expires_at: DateTime<Utc>,
    value: Arc<[u8]>,
}

impl Entry {
    fn live(&self) -> bool {
        self.expires_at > Utc::now()
    }

    fn remaining(&self) -> Duration {
        (self.expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }
}

// Expire each entry at the deadline it was written with.
struct Deadline;

impl Expiry<String, Entry> for Deadline {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _: Instant) -> Option<Duration> {
        Some(entry.remaining())
    }

    fn expire_after_update(
        &self, _key: &String, entry: &Entry, _: Instant, _: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.remaining())
    }
}

/// Expiring in-memory session store. Clones share the same storage.
#[derive(Clone, Debug)]
pub struct Sessions {
    cache: Cache<String, Entry>,
}

impl Default for Sessions {
    fn default() -> Self {
        Self::new()
    }
}

impl Sessions {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().expire_after(Deadline).build(),
        }
    }

    /// Store `state` under `key` until `expires_at`, replacing any existing
    /// entry.
    ///
    /// # Errors
    ///
    /// Returns an error if `state` cannot be serialized.
    pub async fn put(&self, key: &str, state: impl Serialize, expires_at: DateTime<Utc>) -> Result<()> {
        let value = serde_json::to_vec(&state)?.into();
        self.cache.insert(key.to_string(), Entry { expires_at, value }).await;
        Ok(())
    }

    /// Retrieve the live entry stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be deserialized as `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(entry) = self.cache.get(key).await else {
            return Ok(None);
        };
        if !entry.live() {
            self.cache.invalidate(key).await;
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&entry.value)?))
    }

    /// Store `state` under `key` until `expires_at`, but only if the live
    /// entry still holds `current`. Returns `false`, leaving the store
    /// untouched, when the entry has changed or is gone.
    ///
    /// # Errors
    ///
    /// Returns an error if `current` or `state` cannot be serialized.
    pub async fn swap(
        &self, key: &str, current: impl Serialize, state: impl Serialize,
        expires_at: DateTime<Utc>,
    ) -> Result<bool> {
        let current = serde_json::to_vec(&current)?;
        let value: Arc<[u8]> = serde_json::to_vec(&state)?.into();

        let result = self
            .cache
            .entry(key.to_string())
            .and_compute_with(|existing| {
                let op = match existing {
                    Some(e) if e.value().live() && e.value().value[..] == current[..] => {
                        Op::Put(Entry { expires_at, value })
                    }
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;

        Ok(matches!(result, CompResult::ReplacedWith(_)))
    }
}

impl StateStore for Sessions {
    async fn put(&self, key: &str, state: impl Serialize + Send, expiry: DateTime<Utc>) -> Result<()> {
        Self::put(self, key, state, expiry).await
    }

    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        Self::get(self, key).await
    }

    async fn swap(
        &self, key: &str, current: impl Serialize + Send, state: impl Serialize + Send,
        expiry: DateTime<Utc>,
    ) -> Result<bool> {
        Self::swap(self, key, current, state, expiry).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn in_minutes(minutes: i64) -> DateTime<Utc> {
        Utc::now() + TimeDelta::try_minutes(minutes).unwrap()
    }

    #[tokio::test]
    async fn get_observes_put() {
        let store = Sessions::new();
        store.put("42", "pending", in_minutes(60)).await.unwrap();

        let value: Option<String> = store.get("42").await.unwrap();
        assert_eq!(value.as_deref(), Some("pending"));
    }

    #[tokio::test]
    async fn missing_key() {
        let store = Sessions::new();
        let value: Option<String> = store.get("never-issued").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn put_replaces_and_refreshes() {
        let store = Sessions::new();
        store.put("42", "pending", in_minutes(-1)).await.unwrap();
        store.put("42", "resolved", in_minutes(60)).await.unwrap();

        let value: Option<String> = store.get("42").await.unwrap();
        assert_eq!(value.as_deref(), Some("resolved"));
    }

    #[tokio::test]
    async fn expired_entries_are_hidden() {
        let store = Sessions::new();
        store.put("42", "pending", in_minutes(-1)).await.unwrap();

        let value: Option<String> = store.get("42").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn entries_expire_at_their_deadline() {
        let store = Sessions::new();
        store.put("42", "pending", Utc::now() + TimeDelta::milliseconds(50)).await.unwrap();
        assert!(store.get::<String>("42").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(store.get::<String>("42").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn swap_replaces_expected_value() {
        let store = Sessions::new();
        store.put("42", "pending", in_minutes(60)).await.unwrap();

        assert!(store.swap("42", "pending", "resolved", in_minutes(60)).await.unwrap());
        let value: Option<String> = store.get("42").await.unwrap();
        assert_eq!(value.as_deref(), Some("resolved"));
    }

    #[tokio::test]
    async fn swap_rejects_changed_value() {
        let store = Sessions::new();
        store.put("42", "resolved", in_minutes(60)).await.unwrap();

        assert!(!store.swap("42", "pending", "other", in_minutes(60)).await.unwrap());
        let value: Option<String> = store.get("42").await.unwrap();
        assert_eq!(value.as_deref(), Some("resolved"));
    }

    #[tokio::test]
    async fn swap_does_not_revive_expired() {
        let store = Sessions::new();
        store.put("42", "pending", in_minutes(-1)).await.unwrap();

        assert!(!store.swap("42", "pending", "resolved", in_minutes(60)).await.unwrap());
        assert!(!store.swap("missing", "pending", "resolved", in_minutes(60)).await.unwrap());
        assert!(store.get::<String>("42").await.unwrap().is_none());
        assert!(store.get::<String>("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clones_share_storage() {
        let store = Sessions::new();
        let clone = store.clone();
        clone.put("42", "pending", in_minutes(60)).await.unwrap();

        let value: Option<String> = store.get("42").await.unwrap();
        assert_eq!(value.as_deref(), Some("pending"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_swaps_have_one_winner() {
        let store = Sessions::new();
        store.put("42", "pending", in_minutes(60)).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.swap("42", "pending", format!("subject-{i}"), in_minutes(60)).await
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
