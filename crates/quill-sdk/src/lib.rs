//! High-level SDK for Quill.
//!
//! [`Repository`] ties the stores, the rehydrator, the chronological index
//! and per-partition claims together behind one handle configured by a
//! [`RepositoryConfig`]. This is the main entry point for applications
//! embedding Quill.

pub mod append;
pub mod claim;
pub mod config;
pub mod error;
pub mod logging;
pub mod repository;

pub use append::{AppendRequest, AppendResult};
pub use claim::{ClaimError, ClaimGuard, ClaimRegistry};
pub use config::{BackendConfig, RepositoryConfig};
pub use error::{SdkError, SdkResult};
pub use logging::init_tracing;
pub use repository::Repository;

// Re-export key types
pub use quill_dag::{Aggregate, Event, Manifest, ReplayStats};
pub use quill_index::{IndexCursor, IndexError};
pub use quill_types::{Hash, PartitionName};
