use std::collections::BTreeMap;
use std::fmt::Write as _;

use quill_types::{Hash, PartitionName};

use crate::error::{PackError, PackResult};

/// Event hashes produced together, grouped by partition.
///
/// Partitions are kept in a `BTreeMap` so the packed table is always written
/// in lexicographic partition order, whatever order they were added in.
/// Partitions with no events are never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Affix {
    entries: BTreeMap<PartitionName, Vec<Hash>>,
}

impl Affix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one event hash to a partition.
    pub fn push(&mut self, partition: PartitionName, event: Hash) {
        self.entries.entry(partition).or_default().push(event);
    }

    /// Append several event hashes to a partition, preserving their order.
    pub fn extend(&mut self, partition: PartitionName, events: impl IntoIterator<Item = Hash>) {
        let mut events = events.into_iter().peekable();
        if events.peek().is_none() {
            return;
        }
        self.entries.entry(partition).or_default().extend(events);
    }

    pub fn get(&self, partition: &str) -> Option<&[Hash]> {
        self.entries.get(partition).map(Vec::as_slice)
    }

    pub fn partitions(&self) -> impl Iterator<Item = &PartitionName> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PartitionName, &[Hash])> {
        self.entries.iter().map(|(p, h)| (p, h.as_slice()))
    }

    /// Number of partitions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of event hashes across all partitions.
    pub fn event_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Render the text table: `<index> <partition> <algo>:<hex>\n` per event.
    pub(crate) fn to_table(&self) -> String {
        let mut table = String::new();
        for (i, (partition, events)) in self.entries.iter().enumerate() {
            for hash in events {
                // Writing to a String cannot fail.
                let _ = writeln!(table, "{i} {partition} {hash}");
            }
        }
        table
    }

    /// Parse a text table produced by [`Affix::to_table`].
    pub(crate) fn from_table(table: &str) -> PackResult<Self> {
        let mut affix = Self::new();
        let mut current: Option<(usize, PartitionName)> = None;

        for (n, line) in table.lines().enumerate() {
            let line_no = n + 1;
            let malformed = |reason: String| PackError::MalformedAffix {
                line: line_no,
                reason,
            };
            let mut cols = line.splitn(3, ' ');
            let (Some(index), Some(partition), Some(hash)) = (cols.next(), cols.next(), cols.next())
            else {
                return Err(malformed(format!("expected 3 columns in {line:?}")));
            };
            let index: usize = index
                .parse()
                .map_err(|_| malformed(format!("bad partition index {index:?}")))?;
            let partition = PartitionName::new(partition)?;
            let hash: Hash = hash.parse()?;

            match &current {
                Some((i, p)) if *i == index && *p == partition => {}
                Some((i, p)) if *i + 1 == index && *p < partition => {
                    current = Some((index, partition.clone()));
                }
                None if index == 0 => current = Some((index, partition.clone())),
                _ => {
                    return Err(malformed(format!(
                        "partition {partition} at index {index} is out of order"
                    )));
                }
            }
            affix.push(partition, hash);
        }
        Ok(affix)
    }
}

impl FromIterator<(PartitionName, Hash)> for Affix {
    fn from_iter<T: IntoIterator<Item = (PartitionName, Hash)>>(iter: T) -> Self {
        let mut affix = Self::new();
        for (partition, hash) in iter {
            affix.push(partition, hash);
        }
        affix
    }
}
