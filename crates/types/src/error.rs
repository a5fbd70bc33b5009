//! Error types for meshdoc using snafu.
//!
//! This module provides the unified error type shared by the document
//! engine and the HTTP layer:
//! - Read misses and CAS conflicts (values the HTTP layer maps to 404/409)
//! - Replication payload validation failures
//! - Storage and serialization errors with source locations

use snafu::{Location, Snafu};

/// Unified result type for document store operations.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Top-level error type for document store operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    /// Document does not exist.
    #[snafu(display("document not found: {id}"))]
    NotFound {
        /// Document identifier.
        id: String,
    },

    /// Revision CAS failed, either on a local write or a remote apply.
    #[snafu(display("conflict: revision mismatch"))]
    Conflict,

    /// Inbound payload failed validation.
    #[snafu(display("invalid payload: {message}"))]
    InvalidPayload {
        /// What was wrong with the payload.
        message: String,
    },

    /// Missing or unrecognized bearer token.
    #[snafu(display("unauthorized"))]
    Unauthorized,

    /// Storage layer error.
    #[snafu(display("storage error at {location}: {message}"))]
    Storage {
        /// Error description.
        message: String,
        /// Source location.
        #[snafu(implicit)]
        location: Location,
    },

    /// Document (de)serialization error.
    #[snafu(display("serialization error at {location}: {message}"))]
    Serialization {
        /// Error description.
        message: String,
        /// Source location.
        #[snafu(implicit)]
        location: Location,
    },
}

impl From<serde_json::Error> for StoreError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        let loc = std::panic::Location::caller();
        StoreError::Serialization {
            message: err.to_string(),
            location: snafu::Location::new(loc.file(), loc.line(), loc.column()),
        }
    }
}
