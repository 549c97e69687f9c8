//! Canonical packing for Quill objects.
//!
//! Every object is stored as a self-describing payload,
//! `"<kind> <extra...> <len>" NUL <body>`, and addressed by the SHA-256 of
//! that payload. Packing is deterministic: identical logical content always
//! produces identical bytes, whatever order maps were filled in.
//!
//! - [`JsonPacker`]: packs and unpacks the three object kinds
//! - [`Affix`]: partition → event hashes, always written in partition order
//! - [`Checkpoint`]: a DAG node with its `date` validation
//! - [`PackedObject`]: hash + payload, the unit the object store persists

pub mod affix;
pub mod checkpoint;
pub mod error;
pub mod object;
pub mod packer;

pub use affix::Affix;
pub use checkpoint::{Checkpoint, DATE_FIELD, SESSION_FIELD};
pub use error::{DateError, PackError, PackResult};
pub use object::{ObjectKind, PackedObject, HEADER_SEPARATOR};
pub use packer::JsonPacker;
