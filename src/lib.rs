//! Tarn - the core of an educational disk-oriented storage engine
//!
//! This crate provides the storage heart of a relational database: pages
//! live on disk and are cached in a fixed-size buffer pool, with an index
//! structure layered on top.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): disk I/O
//!   - `DiskManager`: reads and writes fixed-size pages of the database file
//!   - `DiskScheduler`: funnels page I/O through a background worker thread
//!
//! - **Buffer Pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: caches pages in frames and pins them while in use
//!   - `LruKReplacer`: LRU-K replacement policy with history-aware eviction
//!   - `FrameHeader`: per-frame metadata, page bytes, and the page latch
//!   - `BasicPageGuard`/`ReadPageGuard`/`WritePageGuard`: RAII handles
//!     binding pin and latch to scope
//!
//! - **Index** (`index`): a concurrent, latch-crabbing B+tree over the
//!   buffer pool, with an in-order leaf-chain iterator
//!
//! - **Trie** (`trie`): an immutable copy-on-write prefix tree plus a
//!   concurrent store giving readers lock-free snapshots
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tarn::buffer::BufferPoolManager;
//! use tarn::index::BPlusTree;
//! use tarn::storage::disk::DiskManager;
//! use tarn::{RecordId, PageId, SlotId};
//!
//! let disk_manager = Arc::new(DiskManager::new("test.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(64, 2, disk_manager));
//!
//! let tree = BPlusTree::new(Arc::clone(&bpm), 64, 64).unwrap();
//! tree.insert(42, RecordId::new(PageId::new(7), SlotId::new(0))).unwrap();
//! assert!(tree.get_value(42).unwrap().is_some());
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;
pub mod trie;

// Re-export commonly used types at the crate root
pub use common::{PageId, RecordId, Result, SlotId, TarnError};
