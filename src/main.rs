use std::sync::Arc;

use tarn::buffer::BufferPoolManager;
use tarn::common::{DEFAULT_BUFFER_POOL_SIZE, DEFAULT_LRUK_K};
use tarn::index::BPlusTree;
use tarn::storage::disk::DiskManager;
use tarn::trie::TrieStore;
use tarn::{PageId, RecordId, SlotId};

fn main() {
    tracing_subscriber::fmt::init();

    println!("Tarn - an educational disk-oriented storage engine");
    println!("==================================================\n");

    let db_path = "demo.db";
    let disk_manager = Arc::new(DiskManager::new(db_path).expect("failed to create disk manager"));
    println!("Opened database file: {}", db_path);

    let bpm = Arc::new(BufferPoolManager::with_defaults(disk_manager));
    println!(
        "Created buffer pool with {} frames (LRU-{} replacement)\n",
        DEFAULT_BUFFER_POOL_SIZE, DEFAULT_LRUK_K
    );

    // Build a small index and run a few operations against it.
    let tree = BPlusTree::with_defaults(Arc::clone(&bpm)).expect("failed to create index");

    for key in [30u32, 10, 50, 20, 40, 60, 25, 35] {
        let rid = RecordId::new(PageId::new(key), SlotId::new(0));
        tree.insert(key, rid).expect("insert failed");
    }
    println!("Inserted 8 keys into the B+tree");
    println!("Root page: {}", tree.root_page_id().expect("no root"));

    match tree.get_value(25).expect("lookup failed") {
        Some(rid) => println!("Lookup 25 -> {:?}", rid),
        None => println!("Lookup 25 -> not found"),
    }

    print!("In-order scan:");
    for entry in tree.begin().expect("begin failed") {
        let (key, _rid) = entry.expect("scan failed");
        print!(" {}", key);
    }
    println!();

    tree.remove(30).expect("remove failed");
    println!("Removed key 30; lookup now: {:?}", tree.get_value(30).unwrap());

    bpm.flush_all_pages().expect("flush failed");
    println!("Flushed all pages to disk\n");

    // The trie store: versioned key/value snapshots in memory.
    let store = TrieStore::new();
    store.put(b"greeting", String::from("hello"));
    store.put(b"answer", 42u32);

    let greeting = store.get::<String>(b"greeting").expect("missing key");
    println!("Trie store: greeting = {}", &*greeting);
    println!("Trie store: answer = {}", *store.get::<u32>(b"answer").unwrap());

    store.remove(b"greeting");
    println!(
        "After removal, greeting present: {} (guard still reads: {})",
        store.get::<String>(b"greeting").is_some(),
        &*greeting
    );

    std::fs::remove_file(db_path).ok();
    println!("\nDemo completed successfully!");
}
