use quill_types::TypeError;
use thiserror::Error;

use crate::object::ObjectKind;

/// Why a checkpoint's `date` field is unusable.
///
/// Validation reports exactly one kind; a value is never both empty and
/// unparseable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DateError {
    #[error("checkpoint has no `date` field")]
    Missing,

    #[error("checkpoint `date` field is empty")]
    Empty,

    #[error("checkpoint `date` {value:?} is not RFC3339: {reason}")]
    Unparseable { value: String, reason: String },

    #[error("checkpoint `date` {0:?} is not in UTC")]
    NotUtc(String),
}

#[derive(Debug, Error)]
pub enum PackError {
    #[error("unknown object type: {0:?}")]
    UnknownObjectType(String),

    #[error("wrong object type: expected {expected}, got {actual}")]
    WrongObjectType {
        expected: ObjectKind,
        actual: ObjectKind,
    },

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("malformed affix at line {line}: {reason}")]
    MalformedAffix { line: usize, reason: String },

    #[error("malformed checkpoint: {0}")]
    MalformedCheckpoint(String),

    #[error("checkpoint has no affix hash")]
    CheckpointWithoutAffix,

    #[error("invalid event name {0:?}")]
    InvalidEventName(String),

    #[error("invalid checkpoint field {key:?}: {reason}")]
    InvalidField { key: String, reason: String },

    #[error(transparent)]
    InvalidDate(#[from] DateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Type(#[from] TypeError),
}

pub type PackResult<T> = Result<T, PackError>;
