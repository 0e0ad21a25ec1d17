//! In-process document store.
//!
//! Each [`Collection`] gives per-document atomic read-modify-write and
//! nothing more: there are no multi-document transactions. Workflow steps
//! that must not race are gated on a single conditional write.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock};

/// A keyed set of documents of one kind.
#[derive(Debug)]
pub struct Collection<K, V> {
    docs: RwLock<HashMap<K, V>>,
}

impl<K, V> Collection<K, V>
where
    K: Eq + Hash + Copy,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        docs.get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        docs.contains_key(key)
    }

    pub fn len(&self) -> usize {
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert `value` only if no document exists under `key`.
    /// On conflict the existing document is returned and nothing is written.
    pub fn insert_if_absent(&self, key: K, value: V) -> Result<V, V> {
        let mut docs = self.docs.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = docs.get(&key) {
            return Err(existing.clone());
        }
        docs.insert(key, value.clone());
        Ok(value)
    }

    /// Unconditional write, for documents under freshly allocated keys.
    pub fn insert(&self, key: K, value: V) {
        let mut docs = self.docs.write().unwrap_or_else(PoisonError::into_inner);
        docs.insert(key, value);
    }

    /// Atomically replace the document under `key` with what `f` returns.
    ///
    /// `f` sees the current document; if it returns an error the document is
    /// left untouched. Returns `None` if there is no such document.
    pub fn update<E>(&self, key: &K, f: impl FnOnce(&V) -> Result<V, E>) -> Option<Result<V, E>> {
        let mut docs = self.docs.write().unwrap_or_else(PoisonError::into_inner);
        let current = docs.get_mut(key)?;
        Some(f(current).map(|next| {
            *current = next.clone();
            next
        }))
    }

    /// Delete the document under `key` if `keep` does not object to it.
    ///
    /// `keep` runs under this collection's write lock, so no update of the
    /// document lands between the check and the removal. Returns `None` if
    /// there is no such document.
    pub fn remove_unless<E>(
        &self,
        key: &K,
        keep: impl FnOnce(&V) -> Result<(), E>,
    ) -> Option<Result<V, E>> {
        let mut docs = self.docs.write().unwrap_or_else(PoisonError::into_inner);
        let current = docs.get(key)?;
        if let Err(e) = keep(current) {
            return Some(Err(e));
        }
        docs.remove(key).map(Ok)
    }

    /// All documents matching `predicate`, in no particular order.
    pub fn query(&self, predicate: impl Fn(&V) -> bool) -> Vec<V> {
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        docs.values().filter(|v| predicate(v)).cloned().collect()
    }

    pub fn keys(&self) -> Vec<K> {
        let docs = self.docs.read().unwrap_or_else(PoisonError::into_inner);
        docs.keys().copied().collect()
    }
}

impl<K, V> Default for Collection<K, V>
where
    K: Eq + Hash + Copy,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
