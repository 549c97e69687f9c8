//! Foundation types for Quill.
//!
//! Every other Quill crate depends on `quill-types`.
//!
//! # Key Types
//!
//! - [`Hash`] -- Content-addressed identifier (`algo:hex`, SHA-256 only)
//! - [`HashAlgo`] -- Supported digest algorithms
//! - [`PartitionName`] -- Identity path of an event stream (`<dirname>/<id>`)

pub mod error;
pub mod hash;
pub mod partition;

pub use error::TypeError;
pub use hash::{Hash, HashAlgo};
pub use partition::PartitionName;
