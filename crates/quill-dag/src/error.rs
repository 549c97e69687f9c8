//! Error types for DAG traversal and replay.

use quill_pack::PackError;
use quill_refs::RefError;
use quill_store::StoreError;
use quill_types::Hash;

/// Errors from the event manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// No decoder is registered under this event name.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// A decoder is already registered under this event name.
    #[error("event type already registered: {0}")]
    DuplicateEventType(String),

    /// The payload did not decode into the registered type.
    #[error("can't decode event {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that can occur while walking or replaying the checkpoint DAG.
///
/// Any failure aborts the whole operation: a partially replayed aggregate
/// is never handed back.
#[derive(Debug, thiserror::Error)]
pub enum DagError {
    /// The starting ref could not be resolved to a checkpoint.
    #[error("unknown ref {name}: {source}")]
    UnresolvedRef {
        name: String,
        #[source]
        source: RefError,
    },

    /// An object reachable from the head could not be read.
    #[error("can't read object {hash}: {source}")]
    Store {
        hash: Hash,
        #[source]
        source: StoreError,
    },

    /// An object was of the wrong kind or failed to decode.
    #[error("can't unpack object {hash}: {source}")]
    Pack {
        hash: Hash,
        #[source]
        source: PackError,
    },

    /// The partition pattern does not compile.
    #[error("invalid partition pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// An event could not be turned into a domain value.
    #[error("event {position} of {total} ({hash}): {source}")]
    Manifest {
        position: usize,
        total: usize,
        hash: Hash,
        #[source]
        source: ManifestError,
    },

    /// The aggregate rejected an event.
    #[error("aggregate rejected event {position} of {total} ({hash}): {source}")]
    Aggregate {
        position: usize,
        total: usize,
        hash: Hash,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Convenience alias for DAG results.
pub type DagResult<T> = Result<T, DagError>;
