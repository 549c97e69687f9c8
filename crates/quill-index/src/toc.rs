//! The time-ordered table of contents built by the coordinator.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use quill_types::Hash;

/// One checkpoint in the table: its hash and its `date` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocEntry {
    pub hash: Hash,
    pub date: DateTime<Utc>,
}

impl TocEntry {
    fn sort_key(&self) -> (DateTime<Utc>, Hash) {
        (self.date, self.hash)
    }
}

/// Checkpoints sorted by ascending date, each hash at most once.
///
/// Checkpoints sharing a date are ordered by hash so the table does not
/// depend on the order in which concurrent fetches report.
#[derive(Debug, Default)]
pub struct Toc {
    entries: Vec<TocEntry>,
    present: HashSet<Hash>,
}

impl Toc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry at its sorted position.
    ///
    /// Returns the position it landed at, or `None` if the hash was already
    /// in the table (a checkpoint reached along two paths of a diamond).
    pub fn insert(&mut self, entry: TocEntry) -> Option<usize> {
        if !self.present.insert(entry.hash) {
            return None;
        }
        let key = entry.sort_key();
        let at = self.entries.partition_point(|e| e.sort_key() < key);
        self.entries.insert(at, entry);
        Some(at)
    }

    pub fn get(&self, position: usize) -> Option<&TocEntry> {
        self.entries.get(position)
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.present.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TocEntry> {
        self.entries.iter()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.present.clear();
    }
}
