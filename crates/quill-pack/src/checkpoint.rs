use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use quill_types::Hash;

use crate::error::{DateError, PackError, PackResult};
use crate::object::ObjectKind;

/// Field holding the checkpoint's RFC3339 UTC timestamp.
pub const DATE_FIELD: &str = "date";
/// Field conventionally holding the writer's session identifier.
pub const SESSION_FIELD: &str = "session";

const SUMMARY_KEY: &str = "summary";
const PARENT_PREFIX: &str = "parent ";

/// A node in the checkpoint DAG.
///
/// A checkpoint references exactly one affix and zero or more parents:
/// none for a root, more than one for a merge. `fields` must carry a UTC
/// `date` before the checkpoint is committed (see [`Checkpoint::validate`]).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Checkpoint {
    pub affix_hash: Option<Hash>,
    pub parent_hashes: Vec<Hash>,
    pub fields: BTreeMap<String, String>,
    pub summary: String,
    pub command_desc: Vec<u8>,
}

impl Checkpoint {
    pub fn new(affix_hash: Hash) -> Self {
        Self {
            affix_hash: Some(affix_hash),
            ..Self::default()
        }
    }

    pub fn with_parent(mut self, parent: Hash) -> Self {
        self.parent_hashes.push(parent);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Set the `date` field, rendered as RFC3339 with a `Z` suffix.
    pub fn with_date(self, date: DateTime<Utc>) -> Self {
        self.with_field(DATE_FIELD, date.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_command_desc(mut self, desc: impl Into<Vec<u8>>) -> Self {
        self.command_desc = desc.into();
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_hashes.is_empty()
    }

    pub fn is_merge(&self) -> bool {
        self.parent_hashes.len() > 1
    }

    /// Parse the `date` field.
    ///
    /// Exactly one [`DateError`] kind is reported for an unusable value. Only
    /// the `Z` designator counts as UTC; a numeric offset is rejected even
    /// when it is zero.
    pub fn date(&self) -> Result<DateTime<Utc>, DateError> {
        let value = self.fields.get(DATE_FIELD).ok_or(DateError::Missing)?;
        if value.is_empty() {
            return Err(DateError::Empty);
        }
        let parsed =
            DateTime::parse_from_rfc3339(value).map_err(|e| DateError::Unparseable {
                value: value.clone(),
                reason: e.to_string(),
            })?;
        if !value.ends_with('Z') || parsed.offset().local_minus_utc() != 0 {
            return Err(DateError::NotUtc(value.clone()));
        }
        Ok(parsed.with_timezone(&Utc))
    }

    /// Check everything that would preclude committing this checkpoint.
    pub fn validate(&self) -> PackResult<()> {
        if self.affix_hash.is_none() {
            return Err(PackError::CheckpointWithoutAffix);
        }
        self.check_encodable()?;
        self.date()?;
        Ok(())
    }

    /// Check that fields and summary fit the line-oriented body.
    pub(crate) fn check_encodable(&self) -> PackResult<()> {
        for (key, value) in &self.fields {
            let invalid = |reason: &str| PackError::InvalidField {
                key: key.clone(),
                reason: reason.to_string(),
            };
            if key.is_empty() {
                return Err(invalid("empty key"));
            }
            if key.chars().any(char::is_whitespace) {
                return Err(invalid("key contains whitespace"));
            }
            if key == ObjectKind::Affix.as_str() || key == SUMMARY_KEY {
                return Err(invalid("reserved key"));
            }
            if value.contains('\n') {
                return Err(invalid("value contains a newline"));
            }
        }
        if self.summary.contains('\n') {
            return Err(PackError::InvalidField {
                key: SUMMARY_KEY.into(),
                reason: "summary contains a newline".into(),
            });
        }
        Ok(())
    }

    /// Render the checkpoint body.
    ///
    /// Layout: `affix <hash>`, one `<key> <value>` line per field in key
    /// order, an optional `summary` line, a blank line, the raw command
    /// description, a newline, then one `parent <hash>` line per parent.
    pub(crate) fn to_body(&self) -> PackResult<Vec<u8>> {
        let affix = self.affix_hash.ok_or(PackError::CheckpointWithoutAffix)?;
        self.check_encodable()?;

        let mut body = Vec::new();
        body.extend_from_slice(format!("{} {affix}\n", ObjectKind::Affix).as_bytes());
        for (key, value) in &self.fields {
            body.extend_from_slice(format!("{key} {value}\n").as_bytes());
        }
        if !self.summary.is_empty() {
            body.extend_from_slice(format!("{SUMMARY_KEY} {}\n", self.summary).as_bytes());
        }
        body.push(b'\n');
        body.extend_from_slice(&self.command_desc);
        body.push(b'\n');
        for parent in &self.parent_hashes {
            body.extend_from_slice(format!("{PARENT_PREFIX}{parent}\n").as_bytes());
        }
        Ok(body)
    }

    /// Parse a body produced by [`Checkpoint::to_body`].
    ///
    /// Trailing `parent` lines are peeled off the end, so a command
    /// description that itself ends in a `parent <hash>` line is ambiguous.
    pub(crate) fn from_body(body: &[u8]) -> PackResult<Self> {
        let malformed = |m: &str| PackError::MalformedCheckpoint(m.to_string());

        let blank = find(body, b"\n\n").ok_or_else(|| malformed("no blank line after headers"))?;
        let headers = std::str::from_utf8(&body[..blank])
            .map_err(|_| malformed("headers are not UTF-8"))?;
        let mut rest = &body[blank + 2..];

        let mut lines = headers.split('\n');
        let affix_line = lines.next().unwrap_or_default();
        let affix_hash = affix_line
            .strip_prefix("affix ")
            .ok_or_else(|| malformed("first line must be `affix <hash>`"))?
            .parse::<Hash>()?;

        let mut checkpoint = Self::new(affix_hash);
        for line in lines {
            let (key, value) = line.split_once(' ').unwrap_or((line, ""));
            if key == SUMMARY_KEY {
                checkpoint.summary = value.to_string();
            } else if key.is_empty() {
                return Err(malformed("empty field key"));
            } else {
                checkpoint.fields.insert(key.to_string(), value.to_string());
            }
        }

        let mut parents = Vec::new();
        while let Some((before, parent)) = split_trailing_parent(rest) {
            parents.push(parent);
            rest = before;
        }
        parents.reverse();
        checkpoint.parent_hashes = parents;

        checkpoint.command_desc = rest
            .strip_suffix(b"\n")
            .ok_or_else(|| malformed("command description is not newline-terminated"))?
            .to_vec();
        Ok(checkpoint)
    }
}

/// If `buf` ends with a `parent <hash>\n` line, split it off.
fn split_trailing_parent(buf: &[u8]) -> Option<(&[u8], Hash)> {
    let without_nl = buf.strip_suffix(b"\n")?;
    let start = without_nl.iter().rposition(|b| *b == b'\n')? + 1;
    let line = std::str::from_utf8(&without_nl[start..]).ok()?;
    let hash = line.strip_prefix(PARENT_PREFIX)?.parse().ok()?;
    Some((&buf[..start], hash))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
