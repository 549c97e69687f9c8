use serde::Serialize;
use tracing::trace;

use crate::affix::Affix;
use crate::checkpoint::Checkpoint;
use crate::error::{PackError, PackResult};
use crate::object::{ObjectKind, PackedObject};

/// Packs events, affixes and checkpoints into hashed payloads, and back.
///
/// Events are encoded as JSON under a registered type name:
///
/// ```text
/// event json <name> <len>\0<json>
/// affix <len>\0<index> <partition> <algo>:<hex>\n...
/// checkpoint <len>\0affix <hash>\n<key> <value>\n...\n<desc>\nparent <hash>\n...
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonPacker;

impl JsonPacker {
    pub fn new() -> Self {
        Self
    }

    /// Pack an event under its registered type name.
    pub fn pack_event<E: Serialize + ?Sized>(&self, name: &str, event: &E) -> PackResult<PackedObject> {
        let json = serde_json::to_vec(event)?;
        self.pack_event_json(name, &json)
    }

    /// Pack already-encoded JSON bytes under a type name.
    pub fn pack_event_json(&self, name: &str, json: &[u8]) -> PackResult<PackedObject> {
        if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == '\0') {
            return Err(PackError::InvalidEventName(name.to_string()));
        }
        let header = format!("{} json {name} {}", ObjectKind::Event, json.len());
        let obj = PackedObject::assemble(&header, json);
        trace!(hash = %obj.hash(), name, "packed event");
        Ok(obj)
    }

    /// Recover an event's type name and JSON payload.
    pub fn unpack_event<'a>(&self, obj: &'a PackedObject) -> PackResult<(&'a str, &'a [u8])> {
        let (tokens, body) = obj.checked_parts(ObjectKind::Event)?;
        match tokens.as_slice() {
            [_, "json", name, _] => Ok((*name, body)),
            [_, encoding, _, _] => Err(PackError::MalformedHeader(format!(
                "unsupported event encoding {encoding:?}"
            ))),
            _ => Err(PackError::MalformedHeader(format!(
                "event header has {} fields, expected 4",
                tokens.len()
            ))),
        }
    }

    /// Pack an affix as a partition-ordered text table.
    pub fn pack_affix(&self, affix: &Affix) -> PackResult<PackedObject> {
        let table = affix.to_table();
        let header = format!("{} {}", ObjectKind::Affix, table.len());
        let obj = PackedObject::assemble(&header, table.as_bytes());
        trace!(hash = %obj.hash(), partitions = affix.len(), "packed affix");
        Ok(obj)
    }

    pub fn unpack_affix(&self, obj: &PackedObject) -> PackResult<Affix> {
        let (_, body) = obj.checked_parts(ObjectKind::Affix)?;
        let table = std::str::from_utf8(body).map_err(|e| PackError::MalformedAffix {
            line: 0,
            reason: format!("table is not UTF-8: {e}"),
        })?;
        Affix::from_table(table)
    }

    /// Pack a checkpoint. Fails if it has no affix hash.
    ///
    /// The `date` field is not checked here; use [`Checkpoint::validate`]
    /// before committing.
    pub fn pack_checkpoint(&self, checkpoint: &Checkpoint) -> PackResult<PackedObject> {
        let body = checkpoint.to_body()?;
        let header = format!("{} {}", ObjectKind::Checkpoint, body.len());
        let obj = PackedObject::assemble(&header, &body);
        trace!(
            hash = %obj.hash(),
            parents = checkpoint.parent_hashes.len(),
            "packed checkpoint"
        );
        Ok(obj)
    }

    pub fn unpack_checkpoint(&self, obj: &PackedObject) -> PackResult<Checkpoint> {
        let (_, body) = obj.checked_parts(ObjectKind::Checkpoint)?;
        Checkpoint::from_body(body)
    }
}
