//! Repository configuration, loadable from TOML.
//!
//! ```toml
//! head_ref = "refs/heads/main"
//! claim_timeout_ms = 5000
//! index_channel_capacity = 64
//!
//! [backend]
//! kind = "filesystem"
//! objects = "/var/lib/quill/objects"
//! refs = "/var/lib/quill/refs"
//! ```
//!
//! Every key is optional; omitted keys take the defaults below and the
//! backend defaults to in-memory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use quill_index::IndexOptions;
use quill_refs::validate_ref_name;
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

pub const DEFAULT_HEAD_REF: &str = "refs/heads/main";
pub const DEFAULT_CLAIM_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_INDEX_CHANNEL_CAPACITY: usize = 64;

/// Where objects and refs are kept.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Everything in process memory; lost on drop.
    #[default]
    Memory,
    /// Sharded zlib object files and one file per ref.
    Filesystem { objects: PathBuf, refs: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepositoryConfig {
    /// The ref appends advance and reads start from.
    pub head_ref: String,
    /// Longest a writer waits to claim a partition.
    pub claim_timeout_ms: u64,
    /// Capacity of the chronological indexer's report channel.
    pub index_channel_capacity: usize,
    pub backend: BackendConfig,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            head_ref: DEFAULT_HEAD_REF.to_string(),
            claim_timeout_ms: DEFAULT_CLAIM_TIMEOUT_MS,
            index_channel_capacity: DEFAULT_INDEX_CHANNEL_CAPACITY,
            backend: BackendConfig::Memory,
        }
    }
}

impl RepositoryConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> SdkResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> SdkResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| SdkError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> SdkResult<String> {
        Ok(toml::to_string(self)?)
    }

    pub fn validate(&self) -> SdkResult<()> {
        validate_ref_name(&self.head_ref)
            .map_err(|e| SdkError::InvalidConfig(format!("head_ref: {e}")))?;
        if self.claim_timeout_ms == 0 {
            return Err(SdkError::InvalidConfig(
                "claim_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.index_channel_capacity == 0 {
            return Err(SdkError::InvalidConfig(
                "index_channel_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn claim_timeout(&self) -> Duration {
        Duration::from_millis(self.claim_timeout_ms)
    }

    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            channel_capacity: self.index_channel_capacity,
        }
    }
}
