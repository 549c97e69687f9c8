//! Core reference types.

use std::fmt;

use quill_types::Hash;

use crate::error::{RefError, Result};

/// Prefix marking a symbolic ref's stored form.
pub const SYMBOLIC_PREFIX: &str = "ref: ";

/// Branch namespace.
pub const HEADS_PREFIX: &str = "refs/heads/";

/// What a named ref points at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefTarget {
    /// A checkpoint hash.
    Direct(Hash),
    /// Another ref, by name.
    Symbolic(String),
}

impl RefTarget {
    pub fn is_symbolic(&self) -> bool {
        matches!(self, Self::Symbolic(_))
    }

    pub fn as_hash(&self) -> Option<&Hash> {
        match self {
            Self::Direct(h) => Some(h),
            Self::Symbolic(_) => None,
        }
    }

    /// Parse the stored form: `algo:hex` or `ref: <name>`.
    pub fn parse(name: &str, contents: &str) -> Result<Self> {
        let contents = contents.trim_end_matches('\n');
        if let Some(target) = contents.strip_prefix(SYMBOLIC_PREFIX) {
            if target.is_empty() {
                return Err(RefError::MalformedRef {
                    name: name.to_string(),
                    reason: "empty symbolic target".into(),
                });
            }
            return Ok(Self::Symbolic(target.to_string()));
        }
        Ok(Self::Direct(contents.parse()?))
    }
}

/// Renders the stored form.
impl fmt::Display for RefTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(h) => write!(f, "{h}"),
            Self::Symbolic(target) => write!(f, "{SYMBOLIC_PREFIX}{target}"),
        }
    }
}

/// Canonical name of a branch, e.g. `main` → `refs/heads/main`.
pub fn branch_ref(branch: &str) -> String {
    format!("{HEADS_PREFIX}{branch}")
}
