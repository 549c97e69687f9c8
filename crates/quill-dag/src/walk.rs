//! Typed object loading over an [`ObjectStore`].

use std::collections::HashSet;
use std::ops::ControlFlow;

use quill_pack::{Affix, Checkpoint, JsonPacker, PackError, PackedObject};
use quill_store::ObjectStore;
use quill_types::Hash;

use crate::error::{DagError, DagResult};

/// Reads and unpacks checkpoints, affixes and events, attaching the
/// offending hash to every failure.
pub struct ObjectLoader<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    packer: JsonPacker,
}

impl<'a, S: ObjectStore + ?Sized> ObjectLoader<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            packer: JsonPacker::new(),
        }
    }

    fn retrieve(&self, hash: &Hash) -> DagResult<PackedObject> {
        self.store
            .retrieve_packed(hash)
            .map_err(|source| DagError::Store {
                hash: *hash,
                source,
            })
    }

    pub fn checkpoint(&self, hash: &Hash) -> DagResult<Checkpoint> {
        let obj = self.retrieve(hash)?;
        self.packer
            .unpack_checkpoint(&obj)
            .map_err(|source| DagError::Pack {
                hash: *hash,
                source,
            })
    }

    pub fn affix(&self, hash: &Hash) -> DagResult<Affix> {
        let obj = self.retrieve(hash)?;
        self.packer
            .unpack_affix(&obj)
            .map_err(|source| DagError::Pack {
                hash: *hash,
                source,
            })
    }

    /// Load a checkpoint together with the affix it references.
    pub fn checkpoint_with_affix(&self, hash: &Hash) -> DagResult<(Checkpoint, Affix)> {
        let checkpoint = self.checkpoint(hash)?;
        let affix_hash = checkpoint.affix_hash.ok_or(DagError::Pack {
            hash: *hash,
            source: PackError::CheckpointWithoutAffix,
        })?;
        let affix = self.affix(&affix_hash)?;
        Ok((checkpoint, affix))
    }

    /// Load an event's type name and JSON payload.
    pub fn event(&self, hash: &Hash) -> DagResult<(String, Vec<u8>)> {
        let obj = self.retrieve(hash)?;
        let (name, payload) = self
            .packer
            .unpack_event(&obj)
            .map_err(|source| DagError::Pack {
                hash: *hash,
                source,
            })?;
        Ok((name.to_string(), payload.to_vec()))
    }
}

/// Visit every checkpoint reachable from `head` once, in depth-first
/// pre-order, following every parent. `visit` may stop the walk early by
/// returning [`ControlFlow::Break`]; the result reports whether it did.
pub(crate) fn visit_reachable<S, F>(loader: &ObjectLoader<'_, S>, head: Hash, mut visit: F) -> DagResult<bool>
where
    S: ObjectStore + ?Sized,
    F: FnMut(&Hash, &Checkpoint, &Affix) -> ControlFlow<()>,
{
    let mut seen = HashSet::new();
    let mut pending = vec![head];
    while let Some(hash) = pending.pop() {
        if !seen.insert(hash) {
            continue;
        }
        let (checkpoint, affix) = loader.checkpoint_with_affix(&hash)?;
        if visit(&hash, &checkpoint, &affix).is_break() {
            return Ok(true);
        }
        pending.extend(checkpoint.parent_hashes.iter().rev().copied());
    }
    Ok(false)
}
