//! Content-addressed object storage for Quill.
//!
//! Every event, affix and checkpoint is stored as an immutable packed
//! payload keyed by its SHA-256 hash, analogous to git's `.git/objects/`.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait and are interchangeable:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsObjectStore`] -- zlib-compressed files in a two-level sharded tree
//!
//! Backends that can enumerate their contents also implement
//! [`ListableObjectStore`].
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written; rewriting identical bytes is a
//!    no-op that reports `0` bytes written.
//! 2. Retrieval is byte-exact and re-verifies the hash.
//! 3. Concurrent reads are always safe.
//! 4. The store never interprets payloads.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use memory::InMemoryObjectStore;
pub use traits::{ListableObjectStore, ObjectStore};
