use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, warn};

use crate::broadcast::{Broadcaster, Subscription};
use crate::storage::{SharedStorage, StorageError};

/// A record kept in an [`EntityStore`].
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    type Id: PartialEq + fmt::Debug;
    /// The record's fields minus everything the store assigns.
    type Draft;

    fn id(&self) -> &Self::Id;

    /// Value taken into account when assigning the next id. Records whose id
    /// is not numeric return `None` and are skipped.
    fn numeric_id(&self) -> Option<i64>;

    fn from_draft(draft: Self::Draft, id: i64) -> Self;
}

/// Where [`EntityStore::add`] places a new record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    Append,
    Prepend,
}

/// Next id for a collection: one past the largest numeric id, or 1.
pub fn next_id<T: Record>(items: &[T]) -> i64 {
    items
        .iter()
        .filter_map(|item| item.numeric_id())
        .max()
        .map_or(1, |max| max + 1)
}

/// A persisted, ordered collection of records kept as one JSON array under a
/// single storage key.
///
/// Reads never fail: a missing key is seeded, an unreadable value falls back
/// to the seed without being overwritten, and a store without a backend
/// behaves as if every write were dropped. Write failures are logged and the
/// caller still gets the collection it asked for.
///
/// Clones share the same mutation lock and change broadcaster, so every
/// load-mutate-persist sequence on one store runs to completion before the
/// next starts.
pub struct EntityStore<T: Record> {
    key: &'static str,
    storage: Option<SharedStorage>,
    seed: fn() -> Vec<T>,
    insertion: Insertion,
    write_lock: Arc<Mutex<()>>,
    changes: Broadcaster<Vec<T>>,
}

impl<T: Record> Clone for EntityStore<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            storage: self.storage.clone(),
            seed: self.seed,
            insertion: self.insertion,
            write_lock: Arc::clone(&self.write_lock),
            changes: self.changes.clone(),
        }
    }
}

impl<T: Record> fmt::Debug for EntityStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityStore")
            .field("key", &self.key)
            .field("persistent", &self.storage.is_some())
            .field("insertion", &self.insertion)
            .finish()
    }
}

impl<T: Record> EntityStore<T> {
    pub fn new(storage: SharedStorage, key: &'static str, seed: fn() -> Vec<T>, insertion: Insertion) -> Self {
        Self::build(Some(storage), key, seed, insertion)
    }

    /// A store with no backend: reads return the seed, writes are dropped.
    pub fn detached(key: &'static str, seed: fn() -> Vec<T>, insertion: Insertion) -> Self {
        Self::build(None, key, seed, insertion)
    }

    fn build(storage: Option<SharedStorage>, key: &'static str, seed: fn() -> Vec<T>, insertion: Insertion) -> Self {
        Self {
            key,
            storage,
            seed,
            insertion,
            write_lock: Arc::new(Mutex::new(())),
            changes: Broadcaster::new(),
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn is_persistent(&self) -> bool {
        self.storage.is_some()
    }

    /// The seed collection this store starts from.
    pub fn seed(&self) -> Vec<T> {
        (self.seed)()
    }

    /// Load the persisted collection.
    #[tracing::instrument(skip(self), fields(key = self.key))]
    pub fn load(&self) -> Vec<T> {
        let Some(storage) = &self.storage else {
            return self.seed();
        };

        match storage.get_item(self.key) {
            Ok(Some(json)) => self.parse(&json),
            Ok(None) => {
                // Seeding is a write; a mutation may have stored the key since.
                let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
                self.load_locked()
            }
            Err(e) => {
                error!(error = %e, "failed to read collection");
                self.seed()
            }
        }
    }

    /// Like [`EntityStore::load`], for callers already holding `write_lock`.
    fn load_locked(&self) -> Vec<T> {
        let Some(storage) = &self.storage else {
            return self.seed();
        };

        match storage.get_item(self.key) {
            Ok(Some(json)) => self.parse(&json),
            Ok(None) => {
                let seed = self.seed();
                debug!(key = self.key, count = seed.len(), "seeding collection");
                if let Err(e) = self.write(&seed) {
                    error!(key = self.key, error = %e, "failed to seed collection");
                }
                seed
            }
            Err(e) => {
                error!(key = self.key, error = %e, "failed to read collection");
                self.seed()
            }
        }
    }

    fn parse(&self, json: &str) -> Vec<T> {
        match serde_json::from_str(json) {
            Ok(items) => items,
            Err(e) => {
                warn!(key = self.key, error = %e, "stored collection is not valid JSON, using seed");
                self.seed()
            }
        }
    }

    /// Overwrite the persisted collection with `items`.
    pub fn replace_all(&self, items: &[T]) {
        {
            let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.persist(items);
            self.changes.enqueue(items.to_vec());
        }
        self.changes.deliver_queued();
    }

    /// Store a new record with the next free id and return it.
    pub fn add(&self, draft: T::Draft) -> T {
        let insertion = self.insertion;
        let (_, created) = self.mutate(|items| {
            let item = T::from_draft(draft, next_id(items));
            match insertion {
                Insertion::Append => items.push(item.clone()),
                Insertion::Prepend => items.insert(0, item.clone()),
            }
            item
        });
        debug!(key = self.key, id = ?created.id(), "added record");
        created
    }

    /// Rewrite every record matching `predicate` through `transform`.
    pub fn update<P, F>(&self, predicate: P, transform: F) -> Vec<T>
    where
        P: Fn(&T) -> bool,
        F: Fn(T) -> T,
    {
        let (items, _) = self.mutate(|items| {
            let current = std::mem::take(items);
            *items = current
                .into_iter()
                .map(|item| if predicate(&item) { transform(item) } else { item })
                .collect();
        });
        items
    }

    /// Delete the record with `id` and return what remains.
    pub fn remove(&self, id: &T::Id) -> Vec<T> {
        let (items, _) = self.mutate(|items| items.retain(|item| item.id() != id));
        items
    }

    /// Delete the storage entry entirely; the next load re-seeds.
    pub fn clear(&self) {
        {
            let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(storage) = &self.storage {
                if let Err(e) = storage.remove_item(self.key) {
                    error!(key = self.key, error = %e, "failed to clear collection");
                }
            }
            self.changes.enqueue(self.seed());
        }
        self.changes.deliver_queued();
    }

    /// Be told the full collection after every mutation, in the order the
    /// mutations were persisted. When several threads mutate at once, one of
    /// them may deliver another's collections, so a mutation can return
    /// before its own notification has been delivered.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Vec<T>) + Send + Sync + 'static,
    {
        self.changes.subscribe(listener)
    }

    /// Collections are queued under the lock, so listeners see them in
    /// persist order, and delivered after it is released, so listeners may
    /// mutate the store.
    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<T>) -> R) -> (Vec<T>, R) {
        let (items, result) = {
            let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let mut items = self.load_locked();
            let result = f(&mut items);
            self.persist(&items);
            self.changes.enqueue(items.clone());
            (items, result)
        };
        self.changes.deliver_queued();
        (items, result)
    }

    fn persist(&self, items: &[T]) {
        if let Err(e) = self.write(items) {
            error!(key = self.key, error = %e, "failed to save collection");
        }
    }

    fn write(&self, items: &[T]) -> Result<(), StorageError> {
        let Some(storage) = &self.storage else {
            return Ok(());
        };
        let json = serde_json::to_string(items)?;
        storage.set_item(self.key, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryStorage};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: i64,
        label: String,
    }

    impl Record for Item {
        type Id = i64;
        type Draft = String;

        fn id(&self) -> &i64 {
            &self.id
        }

        fn numeric_id(&self) -> Option<i64> {
            Some(self.id)
        }

        fn from_draft(label: String, id: i64) -> Self {
            Self { id, label }
        }
    }

    fn empty() -> Vec<Item> {
        Vec::new()
    }

    fn store(storage: &Arc<MemoryStorage>, insertion: Insertion) -> EntityStore<Item> {
        EntityStore::new(storage.clone(), "items", empty, insertion)
    }

    #[test]
    fn load_seeds_missing_key() {
        let storage = Arc::new(MemoryStorage::new());
        let items = store(&storage, Insertion::Append);
        assert!(items.load().is_empty());
        assert_eq!(storage.get_item("items").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn ids_increase_from_one() {
        let storage = Arc::new(MemoryStorage::new());
        let items = store(&storage, Insertion::Append);
        let ids: Vec<i64> = (0..5).map(|i| items.add(format!("item {}", i)).id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn id_is_reused_after_deleting_the_max() {
        let storage = Arc::new(MemoryStorage::new());
        let items = store(&storage, Insertion::Append);
        items.add("a".to_string());
        items.add("b".to_string());
        items.remove(&2);
        assert_eq!(items.add("c".to_string()).id, 2);
    }

    #[test]
    fn prepend_places_new_records_first() {
        let storage = Arc::new(MemoryStorage::new());
        let items = store(&storage, Insertion::Prepend);
        items.add("old".to_string());
        items.add("new".to_string());
        let labels: Vec<String> = items.load().into_iter().map(|i| i.label).collect();
        assert_eq!(labels, vec!["new".to_string(), "old".to_string()]);
    }

    #[test]
    fn detached_store_drops_writes() {
        let items: EntityStore<Item> = EntityStore::detached("items", empty, Insertion::Append);
        let created = items.add("ghost".to_string());
        assert_eq!(created.id, 1);
        assert!(items.load().is_empty());
        assert!(!items.is_persistent());
    }

    #[test]
    fn failed_write_still_returns_intended_collection() {
        let storage = Arc::new(MemoryStorage::with_quota(8));
        let items = store(&storage, Insertion::Append);
        let created = items.add("far too long to fit".to_string());
        assert_eq!(created.id, 1);
        assert_eq!(items.update(|_| true, |i| i).len(), 0);
        assert_eq!(storage.get_item("items").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn mutations_are_published() {
        let storage = Arc::new(MemoryStorage::new());
        let items = store(&storage, Insertion::Append);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = items.subscribe(move |all| sink.lock().unwrap().push(all.len()));

        items.add("a".to_string());
        items.add("b".to_string());
        items.remove(&1);
        items.clear();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 1, 0]);
    }

    #[test]
    fn listener_may_mutate_the_store() {
        let storage = Arc::new(MemoryStorage::new());
        let items = store(&storage, Insertion::Append);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let inner = items.clone();
        let _subscription = items.subscribe(move |all: &Vec<Item>| {
            sink.lock().unwrap().push(all.len());
            if all.len() == 1 {
                inner.add("follow-up".to_string());
            }
        });

        items.add("first".to_string());

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(items.load().len(), 2);
    }
}
