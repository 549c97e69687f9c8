//! Chronological index over the Quill checkpoint DAG.
//!
//! [`ChronologicalIndex`] discovers every checkpoint reachable from a ref
//! with one concurrent fetch task per parent edge. A single coordinator task
//! owns all index state and receives reports over a channel:
//!
//! - an outstanding-fetch counter; traversal is complete when it reaches zero
//! - a [`Toc`] sorted by checkpoint date in which each hash appears once
//! - a one-shot root gate that fires the first time a parentless checkpoint
//!   is fetched
//! - the consumer's [`IndexCursor`] position
//!
//! Any fetch error fails the whole build; a partial index is never served.

pub mod chronological;
mod coordinator;
pub mod error;
mod fetch;
pub mod toc;

pub use chronological::{ChronologicalIndex, IndexCursor, IndexOptions};
pub use error::{IndexError, IndexResult};
pub use toc::{Toc, TocEntry};
