use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Identity path of an event stream, `<dirname>/<id>`.
///
/// The reserved name `_` addresses facts that belong to no particular
/// entity. Names are written verbatim into space-separated affix lines,
/// so they may not contain whitespace or NUL.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionName(String);

impl PartitionName {
    /// The reserved identity-less partition.
    pub const ROOT: &'static str = "_";

    /// Validate and wrap a partition name.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        validate(&name)?;
        Ok(Self(name))
    }

    /// The identity-less root partition `_`.
    pub fn root() -> Self {
        Self(Self::ROOT.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == Self::ROOT
    }

    /// The aggregate kind, i.e. everything before the first `/`.
    pub fn dirname(&self) -> &str {
        self.0.split_once('/').map_or(self.0.as_str(), |(d, _)| d)
    }

    /// The entity identifier after the first `/`, if any.
    pub fn id(&self) -> Option<&str> {
        self.0.split_once('/').map(|(_, id)| id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate(name: &str) -> Result<(), TypeError> {
    let invalid = |reason: &str| TypeError::InvalidPartitionName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if name.is_empty() {
        return Err(invalid("empty name"));
    }
    if name.chars().any(|c| c.is_whitespace() || c == '\0') {
        return Err(invalid("contains whitespace or NUL"));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(invalid("leading or trailing '/'"));
    }
    Ok(())
}

impl fmt::Debug for PartitionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartitionName({})", self.0)
    }
}

impl fmt::Display for PartitionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PartitionName {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for PartitionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PartitionName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Serialize for PartitionName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PartitionName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}
