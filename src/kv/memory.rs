//! In-memory key-value provider using `DashMap`.
//!
//! Data is lost on process restart. Useful for tests and for hosts that keep
//! the registry in memory.

use std::collections::BTreeSet;

use dashmap::DashMap;
use serde_json::Value;

use super::{KeyValueProvider, KvEntry};
use crate::{Error, Result};

/// In-memory hierarchical JSON store.
///
/// Keys are normalized by trimming leading and trailing `/`, so `users/` and
/// `users` address the same prefix.
#[derive(Debug, Default)]
pub struct MemoryKvProvider {
    documents: DashMap<String, Value>,
}

impl MemoryKvProvider {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of leaf documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Check if the provider holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn normalize(key: &str) -> &str {
    key.trim_matches('/')
}

fn prefix_of(key: &str) -> String {
    if key.is_empty() {
        String::new()
    } else {
        format!("{key}/")
    }
}

impl KeyValueProvider for MemoryKvProvider {
    fn get(&self, key: &str, shallow: bool) -> Result<Option<KvEntry>> {
        let key = normalize(key);
        if let Some(doc) = self.documents.get(key) {
            return Ok(Some(KvEntry::Document(doc.value().clone())));
        }

        let prefix = prefix_of(key);
        let children: BTreeSet<String> = self
            .documents
            .iter()
            .filter_map(|entry| {
                let rest = entry.key().strip_prefix(&prefix)?;
                Some(match rest.split_once('/') {
                    Some((dir, _)) => format!("{dir}/"),
                    None => rest.to_string(),
                })
            })
            .collect();

        if children.is_empty() {
            return Ok(None);
        }
        if !shallow {
            return Err(Error::UnsupportedAccess(format!(
                "{key} is a prefix; shallow listing was not requested"
            )));
        }
        Ok(Some(KvEntry::Listing(children.into_iter().collect())))
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        self.documents
            .insert(normalize(key).to_string(), value.clone());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let key = normalize(key);
        let prefix = prefix_of(key);
        self.documents.remove(key);
        self.documents.retain(|k, _| !k.starts_with(&prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_kv_set_get() {
        let kv = MemoryKvProvider::new();
        kv.set("/users/guest/exp/", &json!({"a": 1})).unwrap();
        assert_eq!(
            kv.get("users/guest/exp", false).unwrap(),
            Some(KvEntry::Document(json!({"a": 1})))
        );
        assert_eq!(kv.len(), 1);
    }

    #[test]
    fn test_memory_kv_listing() {
        let kv = MemoryKvProvider::new();
        kv.set("users/a/e1", &json!(1)).unwrap();
        kv.set("users/a/e2", &json!(2)).unwrap();
        kv.set("users/b/e1", &json!(3)).unwrap();

        assert_eq!(
            kv.get("users/", true).unwrap(),
            Some(KvEntry::Listing(vec!["a/".into(), "b/".into()]))
        );
        assert_eq!(
            kv.get("users/a", true).unwrap(),
            Some(KvEntry::Listing(vec!["e1".into(), "e2".into()]))
        );
        assert!(matches!(
            kv.get("users/a", false),
            Err(Error::UnsupportedAccess(_))
        ));
    }

    #[test]
    fn test_memory_kv_delete_subtree() {
        let kv = MemoryKvProvider::new();
        kv.set("users/a/e1", &json!(1)).unwrap();
        kv.set("users/ab/e1", &json!(1)).unwrap();
        kv.delete("users/a").unwrap();

        assert_eq!(kv.get("users/a/e1", false).unwrap(), None);
        assert!(kv.get("users/ab/e1", false).unwrap().is_some());
        kv.delete("nope").unwrap();
    }

    #[test]
    fn test_memory_kv_concurrent_writers() {
        use std::sync::Arc;
        use std::thread;

        let kv = Arc::new(MemoryKvProvider::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let kv = Arc::clone(&kv);
                thread::spawn(move || kv.set(&format!("users/u{i}/exp"), &json!(i)).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let users = kv.get("users", true).unwrap().and_then(KvEntry::into_listing).unwrap();
        assert_eq!(users.len(), 16);
    }
}
