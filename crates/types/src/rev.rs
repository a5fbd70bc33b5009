//! Revision token handling.
//!
//! A revision token has the form `"<generation>-<nonce>"`. The generation
//! is a positive decimal integer that increases by one per successful
//! local write; the nonce is 8 lowercase hex characters drawn from a
//! UUIDv4, so concurrently-derived revisions with equal generation stay
//! distinguishable and a stale token from a sibling branch never falsely
//! matches.

use uuid::Uuid;

/// Nonce length in hex characters.
pub const NONCE_LEN: usize = 8;

/// Produces the next revision token.
///
/// Returns `"1-<nonce>"` when `prev` is absent. Otherwise the generation
/// parsed from `prev` is incremented and paired with a fresh nonce. A
/// non-numeric or missing generation prefix is treated as generation 0,
/// so the next token starts over at 1.
pub fn next_rev(prev: Option<&str>) -> String {
    let generation = prev.map_or(0, generation);
    format!("{}-{}", generation + 1, nonce())
}

/// Integer prefix of a revision token; unparseable prefixes map to 0.
pub fn generation(rev: &str) -> u64 {
    rev.split('-').next().and_then(|g| g.parse().ok()).unwrap_or(0)
}

/// Checks the `"<positive int>-<8 hex>"` shape.
///
/// Used to reject malformed revisions on replication ingress. Locally
/// supplied revisions are not shape-checked; a malformed one can only
/// produce a CAS conflict.
pub fn is_well_formed(rev: &str) -> bool {
    let Some((generation, nonce)) = rev.split_once('-') else {
        return false;
    };
    if generation.is_empty() || !generation.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if generation.parse::<u64>().map_or(true, |g| g == 0) {
        return false;
    }
    nonce.len() == NONCE_LEN && nonce.bytes().all(|b| b.is_ascii_hexdigit())
}

/// 8 lowercase hex characters from the leading bytes of a UUIDv4.
fn nonce() -> String {
    let uuid = Uuid::new_v4();
    let b = uuid.as_bytes();
    format!("{:02x}{:02x}{:02x}{:02x}", b[0], b[1], b[2], b[3])
}
