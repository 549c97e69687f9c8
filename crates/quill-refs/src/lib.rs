//! Named references for Quill.
//!
//! Refs are the only mutable entities in a repository: named pointers to
//! checkpoint hashes (`refs/heads/main`) or to other refs (`HEAD` →
//! `refs/heads/main`). Every append advances a ref; every rehydration and
//! index build starts by reading one.
//!
//! # Modules
//!
//! - [`error`] -- Error types for ref operations
//! - [`types`] -- [`RefTarget`]: direct hash or symbolic name
//! - [`traits`] -- The [`RefStore`] trait defining the storage interface
//! - [`names`] -- Ref name validation
//! - [`memory`] -- In-memory [`InMemoryRefStore`]
//! - [`fs`] -- File-per-ref [`FsRefStore`]

pub mod error;
pub mod fs;
pub mod memory;
pub mod names;
pub mod traits;
pub mod types;

pub use error::{RefError, Result};
pub use fs::FsRefStore;
pub use memory::InMemoryRefStore;
pub use names::validate_ref_name;
pub use traits::{RefStore, MAX_SYMBOLIC_DEPTH};
pub use types::{branch_ref, RefTarget, HEADS_PREFIX, SYMBOLIC_PREFIX};
