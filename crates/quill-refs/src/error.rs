//! Error types for reference operations.

use quill_types::TypeError;
use thiserror::Error;

/// Errors that can occur during reference operations.
#[derive(Debug, Error)]
pub enum RefError {
    /// No direct ref exists under this name.
    #[error("ref name unknown: {name}")]
    UnknownRef { name: String },

    /// No symbolic ref exists under this name.
    #[error("symbolic ref name unknown: {name}")]
    UnknownSymbolicRef { name: String },

    /// The ref is symbolic where a direct hash was required.
    #[error("ref {name} is symbolic, not a direct hash")]
    NotDirect { name: String },

    /// Following symbolic refs did not reach a direct ref.
    #[error("symbolic ref {name} did not resolve within {depth} hops")]
    SymbolicLoop { name: String, depth: usize },

    /// The ref name is invalid.
    #[error("invalid ref name: {name}: {reason}")]
    InvalidRefName { name: String, reason: String },

    /// A stored ref's contents could not be parsed.
    #[error("malformed ref {name}: {reason}")]
    MalformedRef { name: String, reason: String },

    /// The stored hash is not a valid `algo:hex` string.
    #[error(transparent)]
    InvalidHash(#[from] TypeError),

    /// A lock guarding in-memory state was poisoned.
    #[error("ref store lock poisoned")]
    LockPoisoned,

    /// I/O error during file-based ref operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for ref operations.
pub type Result<T> = std::result::Result<T, RefError>;
