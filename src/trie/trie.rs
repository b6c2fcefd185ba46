use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Values are type-erased so one trie can hold mixed types; lookups
/// recover the concrete type with a checked downcast.
pub(crate) type TrieValue = Arc<dyn Any + Send + Sync>;

/// A single immutable trie node. Nodes are never mutated after being
/// published into a root; updates clone the nodes along the touched path
/// and share everything else.
#[derive(Clone, Default)]
pub(crate) struct TrieNode {
    pub(crate) children: BTreeMap<u8, Arc<TrieNode>>,
    pub(crate) value: Option<TrieValue>,
}

impl TrieNode {
    fn is_value_node(&self) -> bool {
        self.value.is_some()
    }
}

/// A persistent copy-on-write prefix tree mapping byte-string keys to
/// values of arbitrary type.
///
/// `put` and `remove` leave `self` untouched and return a new trie whose
/// unmodified subtrees are shared with the original, so every root is a
/// consistent snapshot.
#[derive(Clone, Default)]
pub struct Trie {
    root: Option<Arc<TrieNode>>,
}

impl Trie {
    /// Creates an empty trie.
    pub fn new() -> Self {
        Self { root: None }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    fn lookup_node(&self, key: &[u8]) -> Option<&Arc<TrieNode>> {
        let mut node = self.root.as_ref()?;
        for byte in key {
            node = node.children.get(byte)?;
        }
        Some(node)
    }

    /// Looks up `key` and returns its value if present and of type `T`.
    /// Never allocates.
    pub fn get<T: Any + Send + Sync>(&self, key: &[u8]) -> Option<&T> {
        self.lookup_node(key)?.value.as_ref()?.downcast_ref::<T>()
    }

    /// Like [`get`](Self::get), but returns a shared handle to the value so
    /// the caller can outlive this trie reference.
    pub(crate) fn get_shared<T: Any + Send + Sync>(&self, key: &[u8]) -> Option<Arc<T>> {
        let value = self.lookup_node(key)?.value.clone()?;
        value.downcast::<T>().ok()
    }

    /// Returns a new trie with `key` bound to `value`. An existing binding
    /// is replaced; children below the key position are preserved.
    pub fn put<T: Any + Send + Sync>(&self, key: &[u8], value: T) -> Trie {
        let value: TrieValue = Arc::new(value);
        let root = Self::put_node(self.root.as_deref(), key, value);
        Trie {
            root: Some(Arc::new(root)),
        }
    }

    fn put_node(node: Option<&TrieNode>, key: &[u8], value: TrieValue) -> TrieNode {
        match key.split_first() {
            None => TrieNode {
                children: node.map(|n| n.children.clone()).unwrap_or_default(),
                value: Some(value),
            },
            Some((&byte, rest)) => {
                let child = node.and_then(|n| n.children.get(&byte)).map(Arc::as_ref);
                let new_child = Self::put_node(child, rest, value);
                let mut out = node.cloned().unwrap_or_default();
                out.children.insert(byte, Arc::new(new_child));
                out
            }
        }
    }

    /// Returns a new trie without `key`. If the key is absent the original
    /// trie is returned unchanged. Interior nodes left with neither value
    /// nor children are elided along the removal path.
    pub fn remove(&self, key: &[u8]) -> Trie {
        let Some(root) = self.root.as_ref() else {
            return self.clone();
        };
        match Self::remove_node(root, key) {
            None => self.clone(),
            Some(new_root) => Trie { root: new_root },
        }
    }

    /// Returns None when the key is absent (nothing to do); otherwise the
    /// node's replacement, where an inner None elides the node entirely.
    fn remove_node(node: &TrieNode, key: &[u8]) -> Option<Option<Arc<TrieNode>>> {
        match key.split_first() {
            None => {
                if !node.is_value_node() {
                    return None;
                }
                if node.children.is_empty() {
                    return Some(None);
                }
                Some(Some(Arc::new(TrieNode {
                    children: node.children.clone(),
                    value: None,
                })))
            }
            Some((&byte, rest)) => {
                let child = node.children.get(&byte)?;
                let new_child = Self::remove_node(child, rest)?;

                let mut out = node.clone();
                match new_child {
                    Some(replacement) => {
                        out.children.insert(byte, replacement);
                    }
                    None => {
                        out.children.remove(&byte);
                    }
                }
                if out.children.is_empty() && !out.is_value_node() {
                    return Some(None);
                }
                Some(Some(Arc::new(out)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_trie() {
        let trie = Trie::new();
        assert!(trie.is_empty());
        assert_eq!(trie.get::<u32>(b"missing"), None);
    }

    #[test]
    fn test_put_get() {
        let trie = Trie::new().put(b"hello", 7u32);
        assert_eq!(trie.get::<u32>(b"hello"), Some(&7));
        assert_eq!(trie.get::<u32>(b"hell"), None);
        assert_eq!(trie.get::<u32>(b"helloo"), None);
    }

    #[test]
    fn test_type_mismatch_returns_none() {
        let trie = Trie::new().put(b"key", 1u32);
        assert_eq!(trie.get::<String>(b"key"), None);
        assert_eq!(trie.get::<u64>(b"key"), None);
        assert_eq!(trie.get::<u32>(b"key"), Some(&1));
    }

    #[test]
    fn test_empty_key() {
        let trie = Trie::new().put(b"", 42u32).put(b"a", 1u32);
        assert_eq!(trie.get::<u32>(b""), Some(&42));
        assert_eq!(trie.get::<u32>(b"a"), Some(&1));

        let removed = trie.remove(b"");
        assert_eq!(removed.get::<u32>(b""), None);
        assert_eq!(removed.get::<u32>(b"a"), Some(&1));
    }

    #[test]
    fn test_put_preserves_old_roots() {
        let t0 = Trie::new();
        let t1 = t0.put(b"a", 1u32);
        let t2 = t1.put(b"a", 2u32);

        assert!(t0.is_empty());
        assert_eq!(t1.get::<u32>(b"a"), Some(&1));
        assert_eq!(t2.get::<u32>(b"a"), Some(&2));
    }

    #[test]
    fn test_put_keeps_descendants() {
        let trie = Trie::new().put(b"ab", 2u32).put(b"a", 1u32);
        assert_eq!(trie.get::<u32>(b"a"), Some(&1));
        assert_eq!(trie.get::<u32>(b"ab"), Some(&2));
    }

    #[test]
    fn test_remove_missing_key_is_noop() {
        let trie = Trie::new().put(b"a", 1u32);
        let same = trie.remove(b"zzz");
        assert_eq!(same.get::<u32>(b"a"), Some(&1));

        // Removing twice changes nothing further.
        let once = trie.remove(b"a");
        let twice = once.remove(b"a");
        assert_eq!(once.get::<u32>(b"a"), None);
        assert_eq!(twice.get::<u32>(b"a"), None);
    }

    #[test]
    fn test_remove_interior_value_keeps_children() {
        let trie = Trie::new().put(b"a", 1u32).put(b"ab", 2u32);
        let removed = trie.remove(b"a");

        assert_eq!(removed.get::<u32>(b"a"), None);
        assert_eq!(removed.get::<u32>(b"ab"), Some(&2));
        // The original snapshot is untouched.
        assert_eq!(trie.get::<u32>(b"a"), Some(&1));
    }

    #[test]
    fn test_remove_elides_dangling_chain() {
        let trie = Trie::new().put(b"abcde", 5u32);
        let removed = trie.remove(b"abcde");
        assert!(removed.is_empty());
    }

    #[test]
    fn test_remove_stops_at_value_node() {
        let trie = Trie::new().put(b"ab", 2u32).put(b"abcd", 4u32);
        let removed = trie.remove(b"abcd");

        assert_eq!(removed.get::<u32>(b"abcd"), None);
        assert_eq!(removed.get::<u32>(b"ab"), Some(&2));
    }

    #[test]
    fn test_remove_stops_at_branching_node() {
        let trie = Trie::new().put(b"ax", 1u32).put(b"ay", 2u32);
        let removed = trie.remove(b"ax");

        assert_eq!(removed.get::<u32>(b"ax"), None);
        assert_eq!(removed.get::<u32>(b"ay"), Some(&2));
    }

    #[test]
    fn test_snapshot_chain() {
        let t0 = Trie::new();
        let t1 = t0.put(b"a", 1i32);
        let t2 = t1.put(b"ab", 2i32);
        let t3 = t2.remove(b"a");

        assert_eq!(t1.get::<i32>(b"a"), Some(&1));
        assert_eq!(t1.get::<i32>(b"ab"), None);
        assert_eq!(t3.get::<i32>(b"ab"), Some(&2));
        assert_eq!(t3.get::<i32>(b"a"), None);
        assert!(t0.is_empty());
    }

    #[test]
    fn test_non_copy_values() {
        let trie = Trie::new().put(b"s", String::from("owned"));
        assert_eq!(trie.get::<String>(b"s").map(|s| s.as_str()), Some("owned"));
    }
}
