//! Error types for the chronological index.

use quill_dag::DagError;
use quill_pack::DateError;
use quill_types::Hash;

/// Errors that can occur while building or reading a chronological index.
///
/// A failed build never yields a partial index: the first error stops every
/// fetch task and is reported in place of the cursor's next entry.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The ref could not be resolved, or a reachable checkpoint could not be
    /// read or unpacked.
    #[error(transparent)]
    Dag(#[from] DagError),

    /// A reachable checkpoint carries a missing or malformed `date` field.
    #[error("checkpoint {hash} has an unusable date: {source}")]
    InvalidDate {
        hash: Hash,
        #[source]
        source: DateError,
    },

    /// Every task finished without ever reaching a parentless checkpoint.
    #[error("traversal finished without reaching a root checkpoint")]
    NoRoot,

    /// A fetch task panicked or was aborted by the runtime.
    #[error("fetch task for {hash} failed: {reason}")]
    Task { hash: Hash, reason: String },

    /// The index was cancelled; its partial state is gone.
    #[error("index cancelled")]
    Cancelled,
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
