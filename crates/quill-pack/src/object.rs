use std::fmt;
use std::str::FromStr;

use quill_types::Hash;

use crate::error::{PackError, PackResult};

/// Separates a packed object's textual header from its body.
pub const HEADER_SEPARATOR: u8 = 0;

/// The kind of a packed object, named by the first token of its header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Event,
    Affix,
    Checkpoint,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Affix => "affix",
            Self::Checkpoint => "checkpoint",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "event" => Ok(Self::Event),
            "affix" => Ok(Self::Affix),
            "checkpoint" => Ok(Self::Checkpoint),
            other => Err(PackError::UnknownObjectType(other.to_string())),
        }
    }
}

/// A packed object: its content hash plus the exact bytes that were hashed.
///
/// The payload is `"<kind> <extra...> <length>" NUL <body>`. The object store
/// persists payloads verbatim; nothing below the packer interprets them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackedObject {
    hash: Hash,
    payload: Vec<u8>,
}

impl PackedObject {
    /// Hash a complete payload.
    pub fn from_payload(payload: Vec<u8>) -> Self {
        let hash = Hash::digest_of(&payload);
        Self { hash, payload }
    }

    /// Assemble a payload from a header and body, then hash it.
    pub(crate) fn assemble(header: &str, body: &[u8]) -> Self {
        let mut payload = Vec::with_capacity(header.len() + 1 + body.len());
        payload.extend_from_slice(header.as_bytes());
        payload.push(HEADER_SEPARATOR);
        payload.extend_from_slice(body);
        Self::from_payload(payload)
    }

    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Split the payload into its header string and body bytes.
    pub fn split(&self) -> PackResult<(&str, &[u8])> {
        let sep = self
            .payload
            .iter()
            .position(|b| *b == HEADER_SEPARATOR)
            .ok_or_else(|| PackError::MalformedHeader("missing header separator".into()))?;
        let header = std::str::from_utf8(&self.payload[..sep])
            .map_err(|e| PackError::MalformedHeader(format!("header is not UTF-8: {e}")))?;
        Ok((header, &self.payload[sep + 1..]))
    }

    /// The object kind named by the payload's first token.
    pub fn kind(&self) -> PackResult<ObjectKind> {
        let (header, _) = self.split()?;
        let tag = header.split(' ').next().unwrap_or_default();
        tag.parse()
    }

    /// Fail unless this object is of the `expected` kind.
    pub fn expect_kind(&self, expected: ObjectKind) -> PackResult<()> {
        let actual = self.kind()?;
        if actual != expected {
            return Err(PackError::WrongObjectType { expected, actual });
        }
        Ok(())
    }

    /// Split and check the header's trailing length against the body.
    pub(crate) fn checked_parts(&self, expected: ObjectKind) -> PackResult<(Vec<&str>, &[u8])> {
        self.expect_kind(expected)?;
        let (header, body) = self.split()?;
        let tokens: Vec<&str> = header.split(' ').collect();
        let declared = tokens
            .last()
            .and_then(|t| t.parse::<usize>().ok())
            .ok_or_else(|| PackError::MalformedHeader(format!("no length in {header:?}")))?;
        if declared != body.len() {
            return Err(PackError::MalformedHeader(format!(
                "declared length {declared} but body is {} bytes",
                body.len()
            )));
        }
        Ok((tokens, body))
    }
}
