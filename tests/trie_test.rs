//! Integration tests for the copy-on-write trie

use tarn::trie::Trie;

#[test]
fn test_snapshot_isolation_chain() {
    let t0 = Trie::new();
    let t1 = t0.put(b"a", 1i32);
    let t2 = t1.put(b"ab", 2i32);
    let t3 = t2.remove(b"a");

    // Each root is a frozen snapshot of its moment.
    assert!(t0.is_empty());

    assert_eq!(t1.get::<i32>(b"a"), Some(&1));
    assert_eq!(t1.get::<i32>(b"ab"), None);

    assert_eq!(t2.get::<i32>(b"a"), Some(&1));
    assert_eq!(t2.get::<i32>(b"ab"), Some(&2));

    assert_eq!(t3.get::<i32>(b"a"), None);
    assert_eq!(t3.get::<i32>(b"ab"), Some(&2));
}

#[test]
fn test_overwrite_leaves_original_untouched() {
    let t1 = Trie::new().put(b"key", String::from("one"));
    let t2 = t1.put(b"key", String::from("two"));

    assert_eq!(t1.get::<String>(b"key").unwrap(), "one");
    assert_eq!(t2.get::<String>(b"key").unwrap(), "two");
}

#[test]
fn test_unrelated_keys_unaffected() {
    let mut trie = Trie::new();
    for key in [&b"alpha"[..], b"beta", b"al", b"alphabet", b""] {
        trie = trie.put(key, key.len() as u64);
    }

    let removed = trie.remove(b"al");
    assert_eq!(removed.get::<u64>(b"al"), None);
    for key in [&b"alpha"[..], b"beta", b"alphabet", b""] {
        assert_eq!(removed.get::<u64>(key), Some(&(key.len() as u64)));
    }
}

#[test]
fn test_remove_is_idempotent() {
    let trie = Trie::new().put(b"x", 1u32).put(b"xy", 2u32);

    let once = trie.remove(b"xy");
    let twice = once.remove(b"xy");

    assert_eq!(once.get::<u32>(b"x"), Some(&1));
    assert_eq!(twice.get::<u32>(b"x"), Some(&1));
    assert_eq!(once.get::<u32>(b"xy"), None);
    assert_eq!(twice.get::<u32>(b"xy"), None);
}

#[test]
fn test_put_then_remove_restores_lookups() {
    let base = Trie::new().put(b"keep", 1u32);
    let with_extra = base.put(b"temp", 2u32);
    let restored = with_extra.remove(b"temp");

    assert_eq!(restored.get::<u32>(b"keep"), Some(&1));
    assert_eq!(restored.get::<u32>(b"temp"), None);
    assert_eq!(base.get::<u32>(b"temp"), None);
}

#[test]
fn test_dangling_chain_fully_elided() {
    let trie = Trie::new().put(b"deep/nested/key", 9u32);
    assert!(trie.remove(b"deep/nested/key").is_empty());
}

#[test]
fn test_mismatched_type_lookup() {
    let trie = Trie::new().put(b"n", 7u32);
    assert!(trie.get::<String>(b"n").is_none());
    assert!(trie.get::<u64>(b"n").is_none());
    assert_eq!(trie.get::<u32>(b"n"), Some(&7));
}

#[test]
fn test_many_keys() {
    let mut trie = Trie::new();
    let keys: Vec<String> = (0..200).map(|i| format!("key-{:03}", i)).collect();

    for (i, key) in keys.iter().enumerate() {
        trie = trie.put(key.as_bytes(), i as u32);
    }
    for (i, key) in keys.iter().enumerate() {
        assert_eq!(trie.get::<u32>(key.as_bytes()), Some(&(i as u32)));
    }

    // Remove the even half; the odd half must be untouched.
    for key in keys.iter().step_by(2) {
        trie = trie.remove(key.as_bytes());
    }
    for (i, key) in keys.iter().enumerate() {
        let expected = if i % 2 == 0 { None } else { Some(i as u32) };
        assert_eq!(trie.get::<u32>(key.as_bytes()).copied(), expected);
    }
}
