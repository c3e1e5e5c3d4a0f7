//! Engine properties
//!
//! A caller-owned property store replaces process-wide mutable settings.
//! Executors receive an immutable [`PropertySnapshot`]; tests that need to
//! tweak a setting take a [`PropertyScope`], which restores the previous
//! values when dropped, on every exit path including panics and early
//! returns.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Immutable view of the properties at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySnapshot {
    values: BTreeMap<String, String>,
}

impl PropertySnapshot {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Shared, mutable property store
#[derive(Debug, Default)]
pub struct PropertyStore {
    values: RwLock<BTreeMap<String, String>>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<K, V>(values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: RwLock::new(
                values
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    // A panic while holding the lock cannot leave the map half-written
    // (every mutation is a single insert/remove), so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, String>> {
        self.values.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, String>> {
        self.values.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.read().get(key).cloned()
    }

    /// Set a value, returning the previous one
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.write().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.write().remove(key)
    }

    pub fn snapshot(&self) -> PropertySnapshot {
        PropertySnapshot {
            values: self.read().clone(),
        }
    }

    /// Apply overrides until the returned scope is dropped
    pub fn scoped<K, V>(&self, overrides: impl IntoIterator<Item = (K, V)>) -> PropertyScope<'_>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut prior = Vec::new();
        {
            let mut values = self.write();
            for (key, value) in overrides {
                let key = key.into();
                let previous = values.insert(key.clone(), value.into());
                prior.push((key, previous));
            }
        }
        PropertyScope { store: self, prior }
    }
}

/// Guard restoring overridden properties on drop
#[must_use = "properties are restored as soon as the scope is dropped"]
pub struct PropertyScope<'a> {
    store: &'a PropertyStore,
    prior: Vec<(String, Option<String>)>,
}

impl Drop for PropertyScope<'_> {
    fn drop(&mut self) {
        let mut values = self.store.write();
        // Reverse order so a key overridden twice ends at its original value
        for (key, previous) in self.prior.drain(..).rev() {
            match previous {
                Some(v) => {
                    values.insert(key, v);
                }
                None => {
                    values.remove(&key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_restores_previous_values() {
        let store = PropertyStore::with_values([("cache.enabled", "true")]);
        {
            let _scope = store.scoped([("cache.enabled", "false"), ("agg.threads", "4")]);
            assert_eq!(store.get("cache.enabled").as_deref(), Some("false"));
            assert_eq!(store.get("agg.threads").as_deref(), Some("4"));
        }
        assert_eq!(store.get("cache.enabled").as_deref(), Some("true"));
        assert_eq!(store.get("agg.threads"), None);
    }

    #[test]
    fn test_scope_restores_on_panic() {
        let store = PropertyStore::with_values([("k", "v0")]);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = store.scoped([("k", "v1")]);
            panic!("test body failed");
        }));
        assert!(result.is_err());
        assert_eq!(store.get("k").as_deref(), Some("v0"));
    }

    #[test]
    fn test_duplicate_key_in_one_scope() {
        let store = PropertyStore::with_values([("k", "orig")]);
        {
            let _scope = store.scoped([("k", "a"), ("k", "b")]);
            assert_eq!(store.get("k").as_deref(), Some("b"));
        }
        assert_eq!(store.get("k").as_deref(), Some("orig"));
    }

    #[test]
    fn test_nested_scopes() {
        let store = PropertyStore::new();
        let outer = store.scoped([("k", "outer")]);
        {
            let _inner = store.scoped([("k", "inner")]);
            assert_eq!(store.snapshot().get("k"), Some("inner"));
        }
        assert_eq!(store.snapshot().get("k"), Some("outer"));
        drop(outer);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let store = PropertyStore::with_values([("k", "1")]);
        let snap = store.snapshot();
        store.set("k", "2");
        assert_eq!(snap.get("k"), Some("1"));
        assert_eq!(store.remove("k").as_deref(), Some("2"));
    }
}
