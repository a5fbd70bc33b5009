//! Core types and errors for meshdoc.
//!
//! This crate provides the foundational types shared by the engine and
//! server crates:
//! - The [`Document`] model (arbitrary JSON object with reserved `_id`
//!   and `_rev` attributes)
//! - Revision token handling in [`rev`]
//! - The [`ChangeRecord`] wire format exchanged between peers
//! - Error types using snafu

pub mod change;
pub mod doc;
pub mod error;
pub mod rev;

// Re-export commonly used types at crate root
pub use change::{ChangeOp, ChangeRecord};
pub use doc::Document;
pub use error::{Result, StoreError};
