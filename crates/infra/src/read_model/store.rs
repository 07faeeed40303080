//! Keyed read-model storage.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock};

/// In-memory keyed store for projection state.
///
/// Lookups return owned copies; projections hold small denormalized rows.
/// A poisoned lock degrades to the inner value rather than panicking, since
/// projection state is rebuildable from the event store.
#[derive(Debug)]
pub struct InMemoryReadModel<K, V> {
    rows: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for InMemoryReadModel<K, V> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> InMemoryReadModel<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn upsert(&self, key: K, value: V) {
        self.rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
    }

    /// Read-modify-write of a single row. The closure sees `None` when the
    /// key is absent and returns the new value to store.
    pub fn update(&self, key: K, f: impl FnOnce(Option<&V>) -> V) {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        let next = f(rows.get(&key));
        rows.insert(key, next);
    }

    pub fn list(&self) -> Vec<(K, V)> {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn clear(&self) {
        self.rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_get_list_clear() {
        let store: InMemoryReadModel<String, u32> = InMemoryReadModel::new();
        assert_eq!(store.get(&"a".to_string()), None);

        store.upsert("a".to_string(), 1);
        store.upsert("a".to_string(), 2);
        store.upsert("b".to_string(), 3);
        assert_eq!(store.get(&"a".to_string()), Some(2));
        assert_eq!(store.list().len(), 2);

        store.update("b".to_string(), |v| v.copied().unwrap_or(0) + 1);
        assert_eq!(store.get(&"b".to_string()), Some(4));

        store.clear();
        assert!(store.list().is_empty());
    }
}
