//! Entity identifiers for catalog records.
//!
//! Every catalog entity (video, and any other kind that carries file attachments) is keyed by
//! an [`EntityId`]. The identifier doubles as the namespace of the entity's objects in the
//! media store, so its textual form must be stable and safe to use as a path segment:
//! **32 lowercase hexadecimal characters** (no hyphens).
//!
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! This is the same value you would get from `Uuid::new_v4().simple().to_string()`.
//! Externally supplied identifiers (CLI arguments, database rows) are validated with
//! [`EntityId::parse`]; non-canonical values (uppercase, hyphenated, wrong length, non-hex)
//! are rejected rather than normalised.

mod service;

pub use service::{EntityId, Uuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
