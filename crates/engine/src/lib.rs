//! Storage, locking, and the document engine for meshdoc.
//!
//! Layering, bottom up:
//! - [`kv`]: ordered byte-keyed storage over redb
//! - [`locks`]: the per-document fair mutex table
//! - [`engine`]: CAS document operations, transactions, and remote apply

pub mod engine;
pub mod kv;
pub mod locks;

pub use engine::{new_doc_id, DocEngine, DocTransaction};
pub use kv::{KvError, KvStore};
pub use locks::LockTable;
