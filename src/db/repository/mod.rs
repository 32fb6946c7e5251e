//! Repository layer: one collection per storage key.
//!
//! `RecordRepository<B>` mediates between callers and the blob `B` stored
//! under one key. Nothing is cached: every call re-reads storage, and every
//! mutation writes the full blob back before returning. Two blob shapes are
//! supported:
//!
//! - `ListRepository<T>`: a flat ordered sequence of records.
//! - `KeyedRepository<T>`: a map from an owner id to an ordered sequence.

mod patient;

use std::collections::BTreeMap;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::store::{read_json, write_json, SharedStore};
use super::StorageError;

pub use patient::*;

/// Flat ordered sequence under one key.
pub type ListRepository<T> = RecordRepository<Vec<T>>;

/// Owner id → ordered sequence under one key.
pub type KeyedRepository<T> = RecordRepository<BTreeMap<String, Vec<T>>>;

/// Base repository over the blob stored under `key`.
pub struct RecordRepository<B> {
    store: SharedStore,
    key: String,
    _blob: PhantomData<fn() -> B>,
}

impl<B> Clone for RecordRepository<B> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            key: self.key.clone(),
            _blob: PhantomData,
        }
    }
}

impl<B> RecordRepository<B>
where
    B: Serialize + DeserializeOwned + Default,
{
    pub fn new(store: SharedStore, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            _blob: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Current persisted blob, or the empty default when missing or corrupt.
    pub fn load(&self) -> B {
        read_json(self.store.as_ref(), &self.key, B::default())
    }

    /// Replace the persisted blob.
    pub fn save(&self, blob: &B) -> Result<(), StorageError> {
        write_json(self.store.as_ref(), &self.key, blob)
    }

    /// Re-read, apply `f`, persist.
    pub fn update<R>(&self, f: impl FnOnce(&mut B) -> R) -> Result<R, StorageError> {
        let mut blob = self.load();
        let result = f(&mut blob);
        self.save(&blob)?;
        Ok(result)
    }

    /// Re-read and apply `f`; persist only when `f` reports a change.
    pub fn update_if<R>(
        &self,
        f: impl FnOnce(&mut B) -> Option<R>,
    ) -> Result<Option<R>, StorageError> {
        let mut blob = self.load();
        match f(&mut blob) {
            Some(result) => {
                self.save(&blob)?;
                Ok(Some(result))
            }
            None => Ok(None),
        }
    }
}

// ═══════════════════════════════════════════
// Flat sequence
// ═══════════════════════════════════════════

impl<T> RecordRepository<Vec<T>>
where
    T: Serialize + DeserializeOwned,
{
    pub fn list(&self) -> Vec<T> {
        self.load()
    }

    pub fn len(&self) -> usize {
        self.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.load().is_empty()
    }

    pub fn find(&self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        self.load().into_iter().find(|entry| predicate(entry))
    }

    pub fn position(&self, predicate: impl Fn(&T) -> bool) -> Option<usize> {
        self.load().iter().position(predicate)
    }

    /// Append to the end. Returns the index the entry landed at.
    pub fn append(&self, entry: T) -> Result<usize, StorageError> {
        self.update(|list| {
            list.push(entry);
            list.len() - 1
        })
    }

    /// Apply `transform` to every entry matching `predicate`. Returns how many
    /// entries matched; nothing is written when none did.
    pub fn mutate(
        &self,
        predicate: impl Fn(&T) -> bool,
        mut transform: impl FnMut(&mut T),
    ) -> Result<usize, StorageError> {
        let changed = self.update_if(|list| {
            let mut count = 0;
            for entry in list.iter_mut().filter(|e| predicate(&**e)) {
                transform(entry);
                count += 1;
            }
            (count > 0).then_some(count)
        })?;
        Ok(changed.unwrap_or(0))
    }

    /// Remove the entry at `index` of the currently persisted sequence.
    /// Out-of-range indices are a no-op.
    pub fn remove_at(&self, index: usize) -> Result<Option<T>, StorageError> {
        self.update_if(|list| (index < list.len()).then(|| list.remove(index)))
    }

    /// Remove every entry matching `predicate`. Returns how many were removed.
    pub fn remove_where(&self, predicate: impl Fn(&T) -> bool) -> Result<usize, StorageError> {
        let removed = self.update_if(|list| {
            let before = list.len();
            list.retain(|entry| !predicate(entry));
            let removed = before - list.len();
            (removed > 0).then_some(removed)
        })?;
        Ok(removed.unwrap_or(0))
    }
}

// ═══════════════════════════════════════════
// Keyed sequences
// ═══════════════════════════════════════════

impl<T> RecordRepository<BTreeMap<String, Vec<T>>>
where
    T: Serialize + DeserializeOwned,
{
    /// Entries for `owner`, empty when the owner has none.
    pub fn list_for(&self, owner: &str) -> Vec<T> {
        self.load().remove(owner).unwrap_or_default()
    }

    pub fn keys(&self) -> Vec<String> {
        self.load().into_keys().collect()
    }

    pub fn contains(&self, owner: &str) -> bool {
        self.load().contains_key(owner)
    }

    pub fn find_in(&self, owner: &str, predicate: impl Fn(&T) -> bool) -> Option<T> {
        self.list_for(owner).into_iter().find(|entry| predicate(entry))
    }

    pub fn count_where(&self, owner: &str, predicate: impl Fn(&T) -> bool) -> usize {
        self.list_for(owner).iter().filter(|e| predicate(*e)).count()
    }

    /// Append to `owner`'s sequence, creating it if needed. Returns the index.
    pub fn append(&self, owner: &str, entry: T) -> Result<usize, StorageError> {
        self.update(|map| {
            let entries = map.entry(owner.to_string()).or_default();
            entries.push(entry);
            entries.len() - 1
        })
    }

    /// Append several entries in one write.
    pub fn append_all(&self, owner: &str, new_entries: Vec<T>) -> Result<usize, StorageError> {
        if new_entries.is_empty() {
            return Ok(0);
        }
        self.update(|map| {
            let count = new_entries.len();
            map.entry(owner.to_string()).or_default().extend(new_entries);
            count
        })
    }

    /// Apply `transform` to each of `owner`'s entries matching `predicate`.
    /// No write when the owner is unknown or nothing matched.
    pub fn mutate(
        &self,
        owner: &str,
        predicate: impl Fn(&T) -> bool,
        mut transform: impl FnMut(&mut T),
    ) -> Result<usize, StorageError> {
        let changed = self.update_if(|map| {
            let entries = map.get_mut(owner)?;
            let mut count = 0;
            for entry in entries.iter_mut().filter(|e| predicate(&**e)) {
                transform(entry);
                count += 1;
            }
            (count > 0).then_some(count)
        })?;
        Ok(changed.unwrap_or(0))
    }

    /// Remove `owner`'s entry at `index`. No-op when the owner or index is absent.
    pub fn remove_at(&self, owner: &str, index: usize) -> Result<Option<T>, StorageError> {
        self.update_if(|map| {
            let entries = map.get_mut(owner)?;
            (index < entries.len()).then(|| entries.remove(index))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::MemoryStore;
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Entry {
        name: String,
        done: bool,
    }

    fn entry(name: &str) -> Entry {
        Entry {
            name: name.into(),
            done: false,
        }
    }

    fn list_repo() -> ListRepository<Entry> {
        ListRepository::new(MemoryStore::shared(), "entries")
    }

    fn keyed_repo() -> KeyedRepository<Entry> {
        KeyedRepository::new(MemoryStore::shared(), "by_owner")
    }

    #[test]
    fn append_then_list_preserves_order() {
        let repo = list_repo();
        assert_eq!(repo.append(entry("a")).unwrap(), 0);
        assert_eq!(repo.append(entry("b")).unwrap(), 1);
        let names: Vec<_> = repo.list().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn remove_at_shifts_remaining_entries() {
        let repo = list_repo();
        for name in ["first", "second", "third"] {
            repo.append(entry(name)).unwrap();
        }

        let removed = repo.remove_at(1).unwrap();
        assert_eq!(removed.map(|e| e.name).as_deref(), Some("second"));

        let names: Vec<_> = repo.list().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["first", "third"]);
    }

    #[test]
    fn remove_at_out_of_range_is_noop() {
        let repo = list_repo();
        repo.append(entry("only")).unwrap();
        assert!(repo.remove_at(5).unwrap().is_none());
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn mutate_counts_matches_and_persists() {
        let repo = list_repo();
        for name in ["a", "b", "a"] {
            repo.append(entry(name)).unwrap();
        }
        let changed = repo.mutate(|e| e.name == "a", |e| e.done = true).unwrap();
        assert_eq!(changed, 2);
        assert_eq!(repo.list().iter().filter(|e| e.done).count(), 2);
    }

    #[test]
    fn mutate_without_match_does_not_write() {
        let store = MemoryStore::shared();
        let repo: ListRepository<Entry> = ListRepository::new(store.clone(), "entries");
        assert_eq!(repo.mutate(|_| true, |e| e.done = true).unwrap(), 0);
        assert!(store.get_raw("entries").unwrap().is_none());
    }

    #[test]
    fn remove_where_and_find() {
        let repo = list_repo();
        repo.append(entry("keep")).unwrap();
        repo.append(entry("drop")).unwrap();
        assert_eq!(repo.remove_where(|e| e.name == "drop").unwrap(), 1);
        assert!(repo.find(|e| e.name == "drop").is_none());
        assert!(repo.find(|e| e.name == "keep").is_some());
        assert_eq!(repo.position(|e| e.name == "keep"), Some(0));
    }

    #[test]
    fn clones_share_storage() {
        let repo = list_repo();
        let other = repo.clone();
        repo.append(entry("x")).unwrap();
        assert_eq!(other.len(), 1);
    }

    #[test]
    fn separate_handles_on_same_key_never_diverge() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let first: ListRepository<Entry> = ListRepository::new(store.clone(), "entries");
        let second: ListRepository<Entry> = ListRepository::new(store, "entries");

        first.append(entry("one")).unwrap();
        second.append(entry("two")).unwrap();
        assert_eq!(first.len(), 2);
        first.remove_at(0).unwrap();
        assert_eq!(second.list()[0].name, "two");
    }

    #[test]
    fn corrupt_blob_self_heals_on_next_write() {
        let store = MemoryStore::shared();
        store.set_raw("entries", "not json").unwrap();
        let repo: ListRepository<Entry> = ListRepository::new(store, "entries");
        assert!(repo.is_empty());
        repo.append(entry("fresh")).unwrap();
        assert_eq!(repo.list(), vec![entry("fresh")]);
    }

    #[test]
    fn keyed_append_and_list_for() {
        let repo = keyed_repo();
        repo.append("p1", entry("hello")).unwrap();
        repo.append("p1", entry("again")).unwrap();
        repo.append("p2", entry("other")).unwrap();

        assert_eq!(repo.list_for("p1").len(), 2);
        assert_eq!(repo.list_for("p2").len(), 1);
        assert!(repo.list_for("p3").is_empty());
        assert_eq!(repo.keys(), vec!["p1".to_string(), "p2".to_string()]);
    }

    #[test]
    fn keyed_remove_at_missing_owner_is_noop() {
        let store = MemoryStore::shared();
        let repo: KeyedRepository<Entry> = KeyedRepository::new(store.clone(), "by_owner");
        assert!(repo.remove_at("nobody", 0).unwrap().is_none());
        assert!(store.get_raw("by_owner").unwrap().is_none());
    }

    #[test]
    fn keyed_remove_at_reindexes() {
        let repo = keyed_repo();
        for name in ["m0", "m1", "m2"] {
            repo.append("p1", entry(name)).unwrap();
        }
        repo.remove_at("p1", 1).unwrap();
        let names: Vec<_> = repo.list_for("p1").into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["m0", "m2"]);
    }

    #[test]
    fn keyed_mutate_scoped_to_owner() {
        let repo = keyed_repo();
        repo.append("p1", entry("a")).unwrap();
        repo.append("p2", entry("a")).unwrap();
        assert_eq!(repo.mutate("p1", |_| true, |e| e.done = true).unwrap(), 1);
        assert_eq!(repo.count_where("p1", |e| e.done), 1);
        assert_eq!(repo.count_where("p2", |e| e.done), 0);
        assert_eq!(repo.mutate("p3", |_| true, |e| e.done = true).unwrap(), 0);
    }

    #[test]
    fn keyed_append_all_single_write() {
        let repo = keyed_repo();
        assert_eq!(repo.append_all("r1", vec![]).unwrap(), 0);
        assert!(!repo.contains("r1"));
        assert_eq!(repo.append_all("r1", vec![entry("a"), entry("b")]).unwrap(), 2);
        assert_eq!(repo.list_for("r1").len(), 2);
        assert!(repo.find_in("r1", |e| e.name == "b").is_some());
    }
}
