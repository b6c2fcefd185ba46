use std::any::Any;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;

use super::Trie;

/// Handle returned by [`TrieStore::get`]. It owns the root snapshot the
/// lookup ran against, so the referenced value stays alive even if the
/// store moves on to newer roots.
pub struct ValueGuard<T> {
    _root: Trie,
    value: Arc<T>,
}

impl<T> ValueGuard<T> {
    fn new(root: Trie, value: Arc<T>) -> Self {
        Self { _root: root, value }
    }
}

impl<T> Deref for ValueGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// Thread-safe wrapper around a [`Trie`].
///
/// Readers clone the current root under the root lock and traverse it with
/// no lock held; writers serialize on the write lock, compute the new trie
/// outside any lock, and briefly retake the root lock to publish. Readers
/// therefore see consistent snapshots and never block on writers.
#[derive(Default)]
pub struct TrieStore {
    /// Guards the root pointer only; held just long enough to copy or swap it
    root: Mutex<Trie>,
    /// Serializes writers end-to-end
    write_lock: Mutex<()>,
}

impl TrieStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Trie {
        self.root.lock().clone()
    }

    /// Looks up `key` in the current snapshot. The returned guard keeps
    /// that snapshot alive for as long as the value is in use.
    pub fn get<T: Any + Send + Sync>(&self, key: &[u8]) -> Option<ValueGuard<T>> {
        let trie = self.snapshot();
        let value = trie.get_shared::<T>(key)?;
        Some(ValueGuard::new(trie, value))
    }

    /// Binds `key` to `value`.
    pub fn put<T: Any + Send + Sync>(&self, key: &[u8], value: T) {
        let _writer = self.write_lock.lock();
        let new_trie = self.snapshot().put(key, value);
        *self.root.lock() = new_trie;
    }

    /// Unbinds `key`, if present.
    pub fn remove(&self, key: &[u8]) {
        let _writer = self.write_lock.lock();
        let new_trie = self.snapshot().remove(key);
        *self.root.lock() = new_trie;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_put_remove() {
        let store = TrieStore::new();
        assert!(store.get::<u32>(b"a").is_none());

        store.put(b"a", 1u32);
        assert_eq!(*store.get::<u32>(b"a").unwrap(), 1);

        store.put(b"a", 2u32);
        assert_eq!(*store.get::<u32>(b"a").unwrap(), 2);

        store.remove(b"a");
        assert!(store.get::<u32>(b"a").is_none());
    }

    #[test]
    fn test_guard_outlives_removal() {
        let store = TrieStore::new();
        store.put(b"k", String::from("pinned"));

        let guard = store.get::<String>(b"k").unwrap();
        store.remove(b"k");

        // The store no longer has the key, but the guard's snapshot does.
        assert!(store.get::<String>(b"k").is_none());
        assert_eq!(guard.as_str(), "pinned");
    }

    #[test]
    fn test_mixed_value_types() {
        let store = TrieStore::new();
        store.put(b"n", 5u64);
        store.put(b"s", String::from("five"));

        assert_eq!(*store.get::<u64>(b"n").unwrap(), 5);
        assert_eq!(store.get::<String>(b"s").unwrap().as_str(), "five");
        assert!(store.get::<u64>(b"s").is_none());
    }
}
