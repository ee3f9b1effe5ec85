//! Keyed per-user state with a time-to-live, for front-ends that drive
//! batch runs interactively.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

/// Storage for short-lived sessions. Expired entries behave as absent.
pub trait SessionStore<V>: Send + Sync {
    /// Insert or replace the session for `key`, starting a fresh TTL.
    fn create(&self, key: &str, value: V);

    /// Current value, unless expired.
    fn get(&self, key: &str) -> Option<V>;

    /// Replace the value of a live session, extending its TTL. Returns
    /// `false` if there is no live session.
    fn update(&self, key: &str, value: V) -> bool;

    /// Extend a live session's TTL. Returns `false` if there is none.
    fn touch(&self, key: &str) -> bool;

    fn remove(&self, key: &str) -> Option<V>;

    /// Drop expired sessions; returns how many were removed.
    fn expire(&self) -> usize;

    /// Number of live sessions.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// Process-local [`SessionStore`].
#[derive(Debug)]
pub struct InMemorySessionStore<V> {
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry<V>>>,
}

impl<V: Clone> InMemorySessionStore<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drop sessions that are expired at `now`.
    pub fn expire_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = entries.len(), "Expired sessions");
        }
        removed
    }

    fn with_entries<R>(&self, f: impl FnOnce(&mut HashMap<String, Entry<V>>) -> R) -> R {
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut entries)
    }

    fn live_entry<'a>(
        entries: &'a mut HashMap<String, Entry<V>>,
        key: &str,
        now: DateTime<Utc>,
    ) -> Option<&'a mut Entry<V>> {
        if entries.get(key).is_some_and(|entry| entry.expires_at <= now) {
            entries.remove(key);
            return None;
        }
        entries.get_mut(key)
    }
}

impl<V: Clone + Send + Sync> SessionStore<V> for InMemorySessionStore<V> {
    fn create(&self, key: &str, value: V) {
        let expires_at = Utc::now() + self.ttl;
        self.with_entries(|entries| {
            entries.insert(key.to_string(), Entry { value, expires_at });
        });
    }

    fn get(&self, key: &str) -> Option<V> {
        let now = Utc::now();
        self.with_entries(|entries| Self::live_entry(entries, key, now).map(|e| e.value.clone()))
    }

    fn update(&self, key: &str, value: V) -> bool {
        let now = Utc::now();
        let ttl = self.ttl;
        self.with_entries(|entries| match Self::live_entry(entries, key, now) {
            Some(entry) => {
                entry.value = value;
                entry.expires_at = now + ttl;
                true
            }
            None => false,
        })
    }

    fn touch(&self, key: &str) -> bool {
        let now = Utc::now();
        let ttl = self.ttl;
        self.with_entries(|entries| match Self::live_entry(entries, key, now) {
            Some(entry) => {
                entry.expires_at = now + ttl;
                true
            }
            None => false,
        })
    }

    fn remove(&self, key: &str) -> Option<V> {
        let now = Utc::now();
        self.with_entries(|entries| {
            entries
                .remove(key)
                .filter(|entry| entry.expires_at > now)
                .map(|entry| entry.value)
        })
    }

    fn expire(&self) -> usize {
        self.expire_at(Utc::now())
    }

    fn len(&self) -> usize {
        let now = Utc::now();
        self.with_entries(|entries| entries.values().filter(|e| e.expires_at > now).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_get_update_remove() {
        let store = InMemorySessionStore::new(Duration::minutes(30));
        assert!(store.is_empty());
        store.create("user-1", 3usize);
        assert_eq!(store.get("user-1"), Some(3));
        assert!(store.update("user-1", 5));
        assert_eq!(store.get("user-1"), Some(5));
        assert!(!store.update("user-2", 1));
        assert_eq!(store.remove("user-1"), Some(5));
        assert_eq!(store.get("user-1"), None);
    }

    #[test]
    fn test_expired_sessions_are_absent() {
        let store = InMemorySessionStore::new(Duration::zero());
        store.create("user-1", "waiting for video".to_string());
        assert_eq!(store.get("user-1"), None);
        assert!(!store.touch("user-1"));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_expire_at_purges_only_stale_entries() {
        let store = InMemorySessionStore::new(Duration::minutes(10));
        store.create("a", 1u8);
        store.create("b", 2u8);
        assert_eq!(store.expire_at(Utc::now()), 0);
        assert_eq!(store.expire_at(Utc::now() + Duration::minutes(11)), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_touch_extends_ttl() {
        let store = InMemorySessionStore::new(Duration::minutes(10));
        store.create("a", 1u8);
        assert!(store.touch("a"));
        assert_eq!(store.expire_at(Utc::now() + Duration::minutes(5)), 0);
        assert_eq!(store.get("a"), Some(1));
    }
}
