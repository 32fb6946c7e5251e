//! String-keyed blob storage.
//!
//! Every collection in the portal is one JSON value under one key. Reads
//! fail soft: a missing, unreadable or unparsable blob yields the caller's
//! default so a damaged store never takes a screen down. Writes replace the
//! whole blob.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::StorageError;

/// Durable (or in-memory) string-keyed storage area.
pub trait KeyValueStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_raw(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Store handle shared by repositories, controllers and deferred tasks.
pub type SharedStore = Arc<dyn KeyValueStore>;

/// Read and parse the blob under `key`, falling back to `default`.
pub fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str, default: T) -> T {
    let raw = match store.get_raw(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return default,
        Err(e) => {
            tracing::warn!(key, error = %e, "Storage read failed, using default");
            return default;
        }
    };

    if raw.trim().is_empty() {
        return default;
    }

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, error = %e, "Corrupt blob in storage, using default");
            default
        }
    }
}

/// Serialize `value` and replace the blob under `key`.
pub fn write_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value).map_err(|source| StorageError::Serialize {
        key: key.to_string(),
        source,
    })?;
    store.set_raw(key, &raw)
}

/// Process-local store. Used for transient overlays and in tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }
}

impl KeyValueStore for MemoryStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::LockPoisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::LockPoisoned)?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
    struct Row {
        id: u32,
        label: String,
    }

    fn rows(n: u32) -> Vec<Row> {
        (0..n)
            .map(|id| Row {
                id,
                label: format!("row {id}"),
            })
            .collect()
    }

    #[test]
    fn missing_key_returns_default() {
        let store = MemoryStore::new();
        let value: Vec<Row> = read_json(&store, "absent", Vec::new());
        assert!(value.is_empty());
    }

    #[test]
    fn round_trip_empty_single_and_large() {
        let store = MemoryStore::new();
        for n in [0, 1, 1000] {
            let original = rows(n);
            write_json(&store, "rows", &original).unwrap();
            let loaded: Vec<Row> = read_json(&store, "rows", vec![Row { id: 99, label: "x".into() }]);
            assert_eq!(loaded, original, "round trip of {n} rows");
        }
    }

    #[test]
    fn corrupt_blob_returns_default() {
        let store = MemoryStore::new();
        store.set_raw("rows", "{not json at all").unwrap();
        let loaded: Vec<Row> = read_json(&store, "rows", Vec::new());
        assert!(loaded.is_empty());
    }

    #[test]
    fn wrong_shape_returns_default() {
        let store = MemoryStore::new();
        store.set_raw("rows", r#"{"p1": []}"#).unwrap();
        let loaded: Vec<Row> = read_json(&store, "rows", Vec::new());
        assert!(loaded.is_empty());

        let map: BTreeMap<String, Vec<Row>> = read_json(&store, "rows", BTreeMap::new());
        assert!(map.contains_key("p1"));
    }

    #[test]
    fn empty_string_treated_as_missing() {
        let store = MemoryStore::new();
        store.set_raw("rows", "").unwrap();
        let loaded: Vec<Row> = read_json(&store, "rows", rows(2));
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn write_replaces_whole_blob() {
        let store = MemoryStore::new();
        write_json(&store, "rows", &rows(3)).unwrap();
        write_json(&store, "rows", &rows(1)).unwrap();
        let loaded: Vec<Row> = read_json(&store, "rows", Vec::new());
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn remove_clears_key() {
        let store = MemoryStore::new();
        write_json(&store, "rows", &rows(2)).unwrap();
        store.remove("rows").unwrap();
        assert!(store.get_raw("rows").unwrap().is_none());
    }
}
