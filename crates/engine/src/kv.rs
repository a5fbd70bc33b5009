//! Ordered key-value storage over redb.
//!
//! A thin adapter exposing exactly what the document engine consumes:
//! get, put, delete, and a bounded ordered key scan over a single
//! `docs` table. Every write commits durably before returning. A read
//! miss is `Ok(None)`, never an error.

use std::path::Path;

use redb::backends::InMemoryBackend;
use redb::{Database, ReadableTable, TableDefinition};
use snafu::{ResultExt, Snafu};

use meshdoc_types::StoreError;

/// Document storage: `_id` bytes → serialized JSON document.
const DOCS: TableDefinition<'static, &'static [u8], &'static [u8]> = TableDefinition::new("docs");

/// Error context for storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum KvError {
    /// Store failed to open the database.
    #[snafu(display("failed to open database at {path}: {source}"))]
    Open { path: String, source: redb::DatabaseError },

    /// Failed to begin a transaction.
    #[snafu(display("transaction failed: {source}"))]
    Transaction { source: redb::TransactionError },

    /// Failed to open the docs table.
    #[snafu(display("table operation failed: {source}"))]
    Table { source: redb::TableError },

    /// Underlying storage operation failed.
    #[snafu(display("storage operation failed: {source}"))]
    Storage { source: redb::StorageError },

    /// Commit failed.
    #[snafu(display("commit failed: {source}"))]
    Commit { source: redb::CommitError },
}

impl From<KvError> for StoreError {
    #[track_caller]
    fn from(err: KvError) -> Self {
        let loc = std::panic::Location::caller();
        StoreError::Storage {
            message: err.to_string(),
            location: snafu::Location::new(loc.file(), loc.line(), loc.column()),
        }
    }
}

/// Ordered byte-keyed document store backed by redb.
#[derive(Debug)]
pub struct KvStore {
    db: Database,
}

impl KvStore {
    /// Opens or creates a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, KvError> {
        let path = path.as_ref();
        let db = if path.exists() { Database::open(path) } else { Database::create(path) }
            .context(OpenSnafu { path: path.display().to_string() })?;
        Self::init(db)
    }

    /// Creates an in-memory database for testing.
    pub fn open_in_memory() -> Result<Self, KvError> {
        let db = Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .context(OpenSnafu { path: ":memory:".to_string() })?;
        Self::init(db)
    }

    fn init(db: Database) -> Result<Self, KvError> {
        // Materialize the table so the first read transaction can open it.
        let txn = db.begin_write().context(TransactionSnafu)?;
        txn.open_table(DOCS).context(TableSnafu)?;
        txn.commit().context(CommitSnafu)?;
        Ok(Self { db })
    }

    /// Reads the value stored under `key`; a miss is `Ok(None)`.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        let txn = self.db.begin_read().context(TransactionSnafu)?;
        let table = txn.open_table(DOCS).context(TableSnafu)?;
        Ok(table.get(key).context(StorageSnafu)?.map(|guard| guard.value().to_vec()))
    }

    /// Stores `value` under `key`, overwriting any previous value.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        let txn = self.db.begin_write().context(TransactionSnafu)?;
        {
            let mut table = txn.open_table(DOCS).context(TableSnafu)?;
            table.insert(key, value).context(StorageSnafu)?;
        }
        txn.commit().context(CommitSnafu)?;
        Ok(())
    }

    /// Removes `key`. Deleting a missing key succeeds.
    pub fn delete(&self, key: &[u8]) -> Result<(), KvError> {
        let txn = self.db.begin_write().context(TransactionSnafu)?;
        {
            let mut table = txn.open_table(DOCS).context(TableSnafu)?;
            table.remove(key).context(StorageSnafu)?;
        }
        txn.commit().context(CommitSnafu)?;
        Ok(())
    }

    /// Returns the first `limit` keys in byte order.
    pub fn keys(&self, limit: usize) -> Result<Vec<Vec<u8>>, KvError> {
        let txn = self.db.begin_read().context(TransactionSnafu)?;
        let table = txn.open_table(DOCS).context(TableSnafu)?;
        let mut keys = Vec::new();
        for entry in table.iter().context(StorageSnafu)? {
            if keys.len() >= limit {
                break;
            }
            let (key, _) = entry.context(StorageSnafu)?;
            keys.push(key.value().to_vec());
        }
        Ok(keys)
    }
}
