use std::path::PathBuf;

use thiserror::Error;

use crate::claim::ClaimError;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("can't read configuration {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("configuration encode error: {0}")]
    ConfigEncode(#[from] toml::ser::Error),

    /// The field is set by the repository and may not come from the caller.
    #[error("checkpoint field {0:?} is reserved")]
    ReservedField(String),

    #[error("store error: {0}")]
    Store(#[from] quill_store::StoreError),

    #[error("ref error: {0}")]
    Ref(#[from] quill_refs::RefError),

    #[error("pack error: {0}")]
    Pack(#[from] quill_pack::PackError),

    #[error(transparent)]
    Dag(#[from] quill_dag::DagError),

    #[error(transparent)]
    Index(#[from] quill_index::IndexError),

    #[error(transparent)]
    Claim(#[from] ClaimError),

    #[error("repository append lock poisoned")]
    LockPoisoned,
}

pub type SdkResult<T> = Result<T, SdkError>;
