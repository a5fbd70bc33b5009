//! The document engine.
//!
//! All mutations on a document happen under its per-`_id` lock. Plain
//! operations take the lock for one step; [`DocEngine::transaction`]
//! hands out an RAII handle that holds the lock until drop, so a caller
//! can chain a read, a CAS write, and a conditional rollback without any
//! interleaving from other writers or from remote applies.
//!
//! Local CAS writes assign revisions through [`meshdoc_types::rev`];
//! remote applies store the sender's revision verbatim and never
//! allocate.

use snafu::OptionExt;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use meshdoc_types::doc::{ID_FIELD, REV_FIELD};
use meshdoc_types::error::{ConflictSnafu, InvalidPayloadSnafu, SerializationSnafu};
use meshdoc_types::{rev, Document, Result};

use crate::kv::KvStore;
use crate::locks::LockTable;

/// Generates a fresh document identifier (UUIDv4).
pub fn new_doc_id() -> String {
    Uuid::new_v4().to_string()
}

/// CAS document operations over a [`KvStore`], serialized per `_id` by a
/// [`LockTable`].
#[derive(Debug)]
pub struct DocEngine {
    kv: KvStore,
    locks: LockTable,
}

impl DocEngine {
    /// Builds an engine over an opened store.
    pub fn new(kv: KvStore) -> Self {
        Self { kv, locks: LockTable::new() }
    }

    /// Opens the transaction scope for `id`: acquires the per-id lock
    /// and returns a handle that holds it until drop.
    pub async fn transaction(&self, id: &str) -> DocTransaction<'_> {
        let guard = self.locks.acquire(id).await;
        DocTransaction { engine: self, id: id.to_string(), _guard: guard }
    }

    /// Fetches a document. A missing document is `Ok(None)`.
    pub async fn get(&self, id: &str) -> Result<Option<Document>> {
        let tx = self.transaction(id).await;
        tx.get()
    }

    /// CAS put: generates `_id` when absent, merges over any existing
    /// document, and assigns the next revision. See
    /// [`DocTransaction::put`] for the CAS rules.
    pub async fn put(&self, input: Document) -> Result<Document> {
        let id = match validated_input_id(&input)? {
            Some(id) => id.to_string(),
            None => new_doc_id(),
        };
        let tx = self.transaction(&id).await;
        tx.put(input)
    }

    /// Idempotent delete.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let tx = self.transaction(id).await;
        tx.delete(None)
    }

    /// Returns up to `limit` document ids in store key order.
    pub fn list_ids(&self, limit: usize) -> Result<Vec<String>> {
        let keys = self.kv.keys(limit)?;
        keys.into_iter()
            .map(|key| {
                String::from_utf8(key).map_err(|e| {
                    SerializationSnafu { message: format!("stored key is not UTF-8: {e}") }.build()
                })
            })
            .collect()
    }

    /// Applies a put received from a peer.
    ///
    /// The stored revision for `doc._id` must equal `prev_rev` (both
    /// absent permitted); on success the document is stored verbatim,
    /// keeping the sender's revision.
    pub async fn apply_remote_put(&self, doc: Document, prev_rev: Option<&str>) -> Result<()> {
        let id = doc
            .id()
            .filter(|id| !id.is_empty())
            .context(InvalidPayloadSnafu { message: "remote document is missing _id" })?
            .to_string();
        if doc.rev().is_none_or(str::is_empty) {
            return InvalidPayloadSnafu { message: "remote document is missing _rev" }.fail();
        }
        let tx = self.transaction(&id).await;
        tx.replace_exact(doc, prev_rev)
    }

    /// Applies a delete received from a peer.
    ///
    /// The stored revision must equal `prev_rev`; both absent is a
    /// no-op. An existing document is removed, keeping no tombstone.
    pub async fn apply_remote_del(&self, id: &str, prev_rev: Option<&str>) -> Result<()> {
        let tx = self.transaction(id).await;
        let current = tx.get()?;
        if current.as_ref().and_then(Document::rev) != prev_rev {
            return ConflictSnafu.fail();
        }
        if current.is_some() {
            tx.delete(None)?;
        }
        Ok(())
    }
}

/// Transaction handle for one `_id`.
///
/// Holds the per-id lock from construction to drop. Every operation is
/// evaluated against the current stored state at call time, not against
/// a snapshot taken at open.
pub struct DocTransaction<'a> {
    engine: &'a DocEngine,
    id: String,
    _guard: OwnedMutexGuard<()>,
}

impl DocTransaction<'_> {
    /// The id this transaction owns.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Fetches the current state.
    pub fn get(&self) -> Result<Option<Document>> {
        match self.engine.kv.get(self.id.as_bytes())? {
            Some(bytes) => Ok(Some(Document::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// CAS put.
    ///
    /// When a document exists, `input._rev` must equal its current
    /// revision; when none exists, `input._rev` must be absent. On
    /// success the input is merged over the existing fields (input wins
    /// on overlap), `_id` is forced, the next revision is assigned, and
    /// the result is stored and returned.
    pub fn put(&self, input: Document) -> Result<Document> {
        if input.has_field(REV_FIELD) && input.rev().is_none() {
            return InvalidPayloadSnafu { message: "_rev must be a string" }.fail();
        }
        let existing = self.get()?;
        let current_rev = existing.as_ref().and_then(Document::rev);
        if input.rev() != current_rev {
            return ConflictSnafu.fail();
        }

        let next = rev::next_rev(current_rev);
        let mut saved = match &existing {
            Some(existing) => Document::overlay(existing, input),
            None => input,
        };
        saved.set_id(&self.id);
        saved.set_rev(&next);

        self.engine.kv.put(self.id.as_bytes(), &saved.to_bytes()?)?;
        tracing::debug!(id = %self.id, rev = %next, "stored document");
        Ok(saved)
    }

    /// Delete, optionally CAS-guarded.
    ///
    /// With `Some(rev)` the current revision must equal `rev` (a missing
    /// document conflicts). With `None` the delete is unconditional and
    /// idempotent.
    pub fn delete(&self, expected_prev: Option<&str>) -> Result<()> {
        if let Some(expected) = expected_prev {
            let current = self.get()?;
            if current.as_ref().and_then(Document::rev) != Some(expected) {
                return ConflictSnafu.fail();
            }
        }
        self.engine.kv.delete(self.id.as_bytes())?;
        tracing::debug!(id = %self.id, "deleted document");
        Ok(())
    }

    /// Stores `doc` verbatim after verifying the current revision equals
    /// `expected_prev` (both absent for a currently-missing document).
    ///
    /// `_rev` is never regenerated here: restoring a prior revision must
    /// reproduce it byte for byte, so observers of a rolled-back write
    /// never see a spurious new revision.
    pub fn replace_exact(&self, mut doc: Document, expected_prev: Option<&str>) -> Result<()> {
        let current = self.get()?;
        if current.as_ref().and_then(Document::rev) != expected_prev {
            return ConflictSnafu.fail();
        }
        doc.set_id(&self.id);
        self.engine.kv.put(self.id.as_bytes(), &doc.to_bytes()?)?;
        tracing::debug!(id = %self.id, rev = ?doc.rev(), "replaced document");
        Ok(())
    }
}

/// Validates the optional `_id` of caller input: present implies a
/// non-empty string.
fn validated_input_id(input: &Document) -> Result<Option<&str>> {
    if !input.has_field(ID_FIELD) {
        return Ok(None);
    }
    match input.id() {
        Some(id) if !id.is_empty() => Ok(Some(id)),
        Some(_) => InvalidPayloadSnafu { message: "_id must be non-empty" }.fail(),
        None => InvalidPayloadSnafu { message: "_id must be a string" }.fail(),
    }
}
