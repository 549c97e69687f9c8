use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use quill_dag::Event;
use quill_pack::{JsonPacker, PackedObject};
use quill_types::{Hash, PartitionName};

use crate::error::SdkResult;

/// Events and checkpoint metadata for one append.
///
/// Events are packed as they are added, so an event that does not serialize
/// is reported before anything is written.
#[derive(Clone, Debug, Default)]
pub struct AppendRequest {
    pub(crate) events: Vec<(PartitionName, PackedObject)>,
    pub(crate) fields: BTreeMap<String, String>,
    pub(crate) summary: Option<String>,
    pub(crate) command_desc: Vec<u8>,
    pub(crate) date: Option<DateTime<Utc>>,
}

impl AppendRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `event` to `partition`, after any events already added to it.
    pub fn event<E: Event + ?Sized>(mut self, partition: PartitionName, event: &E) -> SdkResult<Self> {
        let packed = JsonPacker.pack_event(event.name(), event)?;
        self.events.push((partition, packed));
        Ok(self)
    }

    /// Add an already packed event. Anything but a well-formed event object
    /// is rejected.
    pub fn packed_event(mut self, partition: PartitionName, packed: PackedObject) -> SdkResult<Self> {
        JsonPacker.unpack_event(&packed)?;
        self.events.push((partition, packed));
        Ok(self)
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_session(self, session: impl Into<String>) -> Self {
        self.with_field(quill_pack::SESSION_FIELD, session)
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_command_desc(mut self, desc: impl Into<Vec<u8>>) -> Self {
        self.command_desc = desc.into();
        self
    }

    /// Stamp the checkpoint with `date` instead of the current time.
    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Outcome of [`Repository::append`](crate::Repository::append).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppendResult {
    pub checkpoint: Hash,
    pub affix: Hash,
    /// The previous head, `None` for the first checkpoint.
    pub parent: Option<Hash>,
    /// Payload bytes newly written; already stored objects count zero.
    pub bytes_written: usize,
    /// Whether the head ref changed.
    pub ref_moved: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SdkError;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Opened {
        owner: String,
    }

    impl Event for Opened {
        fn name(&self) -> &str {
            "opened"
        }
    }

    #[test]
    fn builder_collects_events_in_order() {
        let p = PartitionName::new("account/1").unwrap();
        let request = AppendRequest::new()
            .event(p.clone(), &Opened { owner: "ann".into() })
            .unwrap()
            .event(p, &Opened { owner: "bob".into() })
            .unwrap()
            .with_summary("open accounts")
            .with_session("s-1");
        assert_eq!(request.event_count(), 2);
        assert_eq!(request.fields.get("session").map(String::as_str), Some("s-1"));
        let (name, body) = JsonPacker.unpack_event(&request.events[1].1).unwrap();
        assert_eq!(name, "opened");
        assert_eq!(body, br#"{"owner":"bob"}"#);
    }

    #[test]
    fn packed_event_must_be_an_event() {
        let affix = JsonPacker.pack_affix(&quill_pack::Affix::new()).unwrap();
        let err = AppendRequest::new()
            .packed_event(PartitionName::root(), affix)
            .unwrap_err();
        assert!(matches!(err, SdkError::Pack(_)));
    }
}
