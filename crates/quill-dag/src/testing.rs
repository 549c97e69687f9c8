//! Fixtures for building checkpoint histories in tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use quill_pack::{Affix, Checkpoint, JsonPacker};
use quill_refs::{InMemoryRefStore, RefStore};
use quill_store::{InMemoryObjectStore, ObjectStore};
use quill_types::{Hash, PartitionName};
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, Event};
use crate::manifest::Manifest;

pub(crate) const MAIN: &str = "refs/heads/main";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub(crate) struct Incremented {
    pub n: i64,
}

impl Event for Incremented {
    fn name(&self) -> &str {
        "incremented"
    }
}

#[derive(Debug, thiserror::Error)]
#[error("negative increment {0}")]
pub(crate) struct Rejected(pub i64);

/// Records every value it sees, refusing negative ones.
#[derive(Debug, Default)]
pub(crate) struct Tally {
    pub seen: Vec<i64>,
}

impl Aggregate<Incremented> for Tally {
    type Error = Rejected;

    fn react_to(&mut self, event: Incremented) -> Result<(), Rejected> {
        if event.n < 0 {
            return Err(Rejected(event.n));
        }
        self.seen.push(event.n);
        Ok(())
    }
}

pub(crate) fn manifest() -> Manifest<Incremented> {
    let mut m = Manifest::new();
    m.register_json::<Incremented>("incremented").unwrap();
    m
}

/// In-memory stores plus a clock that jumps five seconds per commit.
pub(crate) struct Fixture {
    pub objects: InMemoryObjectStore,
    pub refs: InMemoryRefStore,
    clock: DateTime<Utc>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            objects: InMemoryObjectStore::new(),
            refs: InMemoryRefStore::new(),
            clock: Utc.with_ymd_and_hms(2018, 3, 1, 10, 0, 0).unwrap(),
        }
    }

    pub fn event(&self, n: i64) -> Hash {
        let obj = JsonPacker
            .pack_event("incremented", &Incremented { n })
            .unwrap();
        self.objects.write_packed(&obj).unwrap();
        *obj.hash()
    }

    pub fn commit(&mut self, parents: &[Hash], entries: &[(&str, Vec<Hash>)]) -> Hash {
        let mut affix = Affix::new();
        for (partition, events) in entries {
            affix.extend(PartitionName::new(*partition).unwrap(), events.iter().copied());
        }
        let packed_affix = JsonPacker.pack_affix(&affix).unwrap();
        self.objects.write_packed(&packed_affix).unwrap();

        self.clock += Duration::seconds(5);
        let mut checkpoint = Checkpoint::new(*packed_affix.hash()).with_date(self.clock);
        checkpoint.parent_hashes = parents.to_vec();
        let packed = JsonPacker.pack_checkpoint(&checkpoint).unwrap();
        self.objects.write_packed(&packed).unwrap();
        *packed.hash()
    }

    pub fn point(&self, name: &str, hash: Hash) {
        self.refs.write(name, &hash).unwrap();
    }
}
