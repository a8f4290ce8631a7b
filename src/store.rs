//! Durable storage supplied by the host application.

use serde_json::Value;
use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

/// Long-lived options plus time-boxed transients, keyed by strings the
/// caller namespaces per module.
///
/// Hosts back this with whatever they have: a CMS options table, app-data
/// files, a cache daemon. Transients may be evicted before their TTL but
/// must never outlive it.
pub trait Store: Send + Sync {
    fn get_option(&self, key: &str) -> Option<Value>;
    fn set_option(&self, key: &str, value: Value);
    fn delete_option(&self, key: &str);
    fn get_transient(&self, key: &str) -> Option<Value>;
    fn set_transient(&self, key: &str, value: Value, ttl: Duration);
    fn delete_transient(&self, key: &str);
}

/// In-process store for tests and single-process embeddings.
#[derive(Debug, Default)]
pub struct MemoryStore {
    options: Mutex<HashMap<String, Value>>,
    transients: Mutex<HashMap<String, (Value, Instant)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get_option(&self, key: &str) -> Option<Value> {
        lock(&self.options).get(key).cloned()
    }

    fn set_option(&self, key: &str, value: Value) {
        lock(&self.options).insert(key.to_string(), value);
    }

    fn delete_option(&self, key: &str) {
        lock(&self.options).remove(key);
    }

    fn get_transient(&self, key: &str) -> Option<Value> {
        let mut transients = lock(&self.transients);
        match transients.get(key) {
            Some((value, expires)) if Instant::now() < *expires => Some(value.clone()),
            Some(_) => {
                transients.remove(key);
                None
            }
            None => None,
        }
    }

    fn set_transient(&self, key: &str, value: Value, ttl: Duration) {
        lock(&self.transients).insert(key.to_string(), (value, Instant::now() + ttl));
    }

    fn delete_transient(&self, key: &str) {
        lock(&self.transients).remove(key);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn options_persist_until_deleted() {
        let store = MemoryStore::new();
        assert_eq!(store.get_option("k"), None);
        store.set_option("k", json!("v"));
        assert_eq!(store.get_option("k"), Some(json!("v")));
        store.set_option("k", json!(["v2"]));
        assert_eq!(store.get_option("k"), Some(json!(["v2"])));
        store.delete_option("k");
        assert_eq!(store.get_option("k"), None);
    }

    #[test]
    fn transients_expire() {
        let store = MemoryStore::new();
        store.set_transient("t", json!(1), Duration::from_millis(20));
        assert_eq!(store.get_transient("t"), Some(json!(1)));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(store.get_transient("t"), None);
    }

    #[test]
    fn transient_delete_is_immediate() {
        let store = MemoryStore::new();
        store.set_transient("t", json!(1), Duration::from_secs(60));
        store.delete_transient("t");
        assert_eq!(store.get_transient("t"), None);
    }

    #[test]
    fn options_and_transients_are_separate_namespaces() {
        let store = MemoryStore::new();
        store.set_option("k", json!("opt"));
        store.set_transient("k", json!("tmp"), Duration::from_secs(60));
        store.delete_transient("k");
        assert_eq!(store.get_option("k"), Some(json!("opt")));
    }
}
