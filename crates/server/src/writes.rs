//! Write orchestration: local CAS, synchronous fan-out, rollback.
//!
//! The per-`_id` lock is held from before the local apply until after
//! commit or rollback. That window deliberately spans the peer fan-out:
//! it is what keeps a doomed revision from being observed by later
//! local writes while its rollback is still pending.

use meshdoc_engine::{new_doc_id, DocEngine};
use meshdoc_types::doc::ID_FIELD;
use meshdoc_types::error::{ConflictSnafu, InvalidPayloadSnafu};
use meshdoc_types::{ChangeRecord, Document, Result};

use crate::replication::Replicator;

/// The user-facing create/update flow.
///
/// Applies the CAS put locally, pushes the change to every peer, and
/// either commits (no peer conflicts; unreachable peers tolerated) or
/// restores the prior state and surfaces the conflict.
pub async fn create_or_update(
    engine: &DocEngine,
    replicator: &Replicator,
    input: Document,
) -> Result<Document> {
    let desired_id = desired_id(&input)?;
    let tx = engine.transaction(&desired_id).await;

    let prev = tx.get()?;
    let saved = tx.put(input)?;

    let prev_rev = prev.as_ref().and_then(Document::rev).map(str::to_string);
    let change = ChangeRecord::for_put(saved.clone(), prev_rev)?;
    let outcome = replicator.push_to_peers(&change).await;

    if outcome.has_conflicts() {
        tracing::warn!(
            id = %desired_id,
            conflicts = outcome.conflicts.len(),
            "peer conflict, rolling back local write"
        );
        match &prev {
            Some(prev_doc) => tx.replace_exact(prev_doc.clone(), saved.rev())?,
            None => tx.delete(saved.rev())?,
        }
        return ConflictSnafu.fail();
    }
    if !outcome.failures.is_empty() {
        tracing::warn!(
            id = %desired_id,
            failures = ?outcome.failures,
            "peers did not apply the change; divergence accepted"
        );
    }

    Ok(saved)
}

/// The user-facing delete flow. Idempotent locally; peer conflicts
/// restore the prior document.
pub async fn delete(engine: &DocEngine, replicator: &Replicator, id: &str) -> Result<()> {
    let tx = engine.transaction(id).await;

    let prev = tx.get()?;
    tx.delete(None)?;

    let prev_rev = prev.as_ref().and_then(Document::rev).map(str::to_string);
    let change = ChangeRecord::for_del(id.to_string(), prev_rev);
    let outcome = replicator.push_to_peers(&change).await;

    if outcome.has_conflicts() {
        tracing::warn!(
            id,
            conflicts = outcome.conflicts.len(),
            "peer conflict, restoring deleted document"
        );
        if let Some(prev_doc) = &prev {
            tx.replace_exact(prev_doc.clone(), None)?;
        }
        return ConflictSnafu.fail();
    }
    if !outcome.failures.is_empty() {
        tracing::warn!(id, failures = ?outcome.failures, "peers did not apply the delete; divergence accepted");
    }

    Ok(())
}

/// The id a write targets: the caller's `_id` when given (must be a
/// non-empty string), otherwise a fresh UUIDv4.
fn desired_id(input: &Document) -> Result<String> {
    if !input.has_field(ID_FIELD) {
        return Ok(new_doc_id());
    }
    match input.id() {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        Some(_) => InvalidPayloadSnafu { message: "_id must be non-empty" }.fail(),
        None => InvalidPayloadSnafu { message: "_id must be a string" }.fail(),
    }
}
