//! Checkpoint DAG traversal for Quill.
//!
//! Walks the Merkle history of checkpoints backwards from a ref and
//! reconstructs state from it:
//!
//! - [`Rehydrator`] replays every event of the matching partitions onto an
//!   [`Aggregate`], oldest first, visiting both sides of every merge and each
//!   shared ancestor once
//! - [`partition_exists`] answers whether a partition appears at all,
//!   stopping at the first hit
//! - [`list_partitions`] enumerates matching partitions
//!
//! Partitions are selected with glob patterns ([`PartitionPattern`]); events
//! are decoded through an explicitly constructed [`Manifest`].

pub mod aggregate;
pub mod error;
pub mod exists;
pub mod manifest;
pub mod matcher;
pub mod rehydrate;
pub mod walk;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregate::{Aggregate, Event};
pub use error::{DagError, DagResult, ManifestError};
pub use exists::{list_partitions, partition_exists};
pub use manifest::Manifest;
pub use matcher::{does_match, PartitionPattern};
pub use rehydrate::{resolve_head, Rehydrator, RelevantCheckpoint, ReplayStats};
pub use walk::ObjectLoader;
