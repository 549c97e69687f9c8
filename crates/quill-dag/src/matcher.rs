//! Glob matching of partition names.

use glob::{MatchOptions, Pattern};

use crate::error::{DagError, DagResult};

/// A compiled partition pattern such as `widget/*` or `author/12?`.
///
/// Supports `*`, `?` and `[...]` classes. `*` also matches `/`, so `*`
/// alone selects every partition.
#[derive(Clone, Debug)]
pub struct PartitionPattern {
    source: String,
    pattern: Pattern,
}

impl PartitionPattern {
    /// Compile a pattern; an invalid pattern is an error, never a silent
    /// non-match.
    pub fn new(pattern: &str) -> DagResult<Self> {
        let compiled = Pattern::new(pattern).map_err(|e| DagError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            source: pattern.to_string(),
            pattern: compiled,
        })
    }

    pub fn matches(&self, partition: &str) -> bool {
        self.pattern.matches_with(
            partition,
            MatchOptions {
                case_sensitive: true,
                require_literal_separator: false,
                require_literal_leading_dot: false,
            },
        )
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// One-shot match of `partition` against `pattern`.
pub fn does_match(pattern: &str, partition: &str) -> DagResult<bool> {
    Ok(PartitionPattern::new(pattern)?.matches(partition))
}
