use crate::value::{Tag, Value};
use std::str::Utf8Error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("expected a v08 value, got {0}")]
    NotBytes(Tag),

    #[error("expected a v32 value, got {0}")]
    NotWords(Tag),

    #[error("vector slice {idx}+{len} exceeds arena of {size} elements")]
    ArenaRange { idx: u32, len: u32, size: usize },

    #[error(transparent)]
    Utf8(#[from] Utf8Error),
}

#[derive(Debug, Error)]
pub enum WispError {
    #[error("unknown tag field {field:#04x} in value {value}")]
    UnknownTag { value: Value, field: u8 },

    #[error("expected a {expected} value, got {actual} ({value})")]
    TagMismatch {
        expected: Tag,
        actual: Tag,
        value: Value,
    },

    #[error("row {index} out of range for {tag} table with {count} rows")]
    IndexOutOfRange { tag: Tag, index: u32, count: u32 },

    #[error("{0} values have no heap table")]
    NoTable(Tag),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("runtime context is not attached")]
    NotAttached,

    #[error("runtime context is already attached")]
    AlreadyAttached,

    #[error("memory read of {len} bytes at {offset:#x} exceeds memory size {size:#x}")]
    OutOfBounds { offset: u32, len: u32, size: usize },

    #[error("invalid tag table: {0}")]
    InvalidTagTable(String),

    #[error("source text of {0} bytes does not fit in runtime memory")]
    SourceTooLarge(usize),

    #[error("missing export `{0}`")]
    MissingExport(String),

    #[error("{entry} failed: {cause:#}")]
    Runtime {
        entry: &'static str,
        cause: anyhow::Error,
    },

    #[error("failed to load module: {0:#}")]
    Load(anyhow::Error),
}

impl WispError {
    pub fn code(&self) -> &'static str {
        match self {
            WispError::UnknownTag { .. } => "W0001",
            WispError::TagMismatch { .. } => "W0002",
            WispError::IndexOutOfRange { .. } => "W0003",
            WispError::NoTable(_) => "W0004",
            WispError::Decode(_) => "W0005",
            WispError::NotAttached => "W0006",
            WispError::AlreadyAttached => "W0007",
            WispError::OutOfBounds { .. } => "W0008",
            WispError::InvalidTagTable(_) => "W0009",
            WispError::SourceTooLarge(_) => "W0010",
            WispError::MissingExport(_) => "W0100",
            WispError::Runtime { .. } => "W0101",
            WispError::Load(_) => "W0102",
        }
    }
}

pub(crate) fn runtime_error(entry: &'static str) -> impl FnOnce(anyhow::Error) -> WispError {
    move |cause| WispError::Runtime { entry, cause }
}
