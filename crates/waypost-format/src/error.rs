//! Error types for waypost-format

use thiserror::Error;

/// Container parsing error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Bad signature: not a compiled cartridge")]
    BadSignature,

    #[error("Unsupported compiled format version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("Truncated at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Header length mismatch: declared {declared} bytes, read {actual}")]
    HeaderLength { declared: u32, actual: usize },

    #[error("Compiled cartridge has no objects")]
    EmptyDirectory,

    #[error("Object id {id} out of range for {count} objects")]
    ObjectIdOutOfRange { id: u16, count: u16 },

    #[error("Object id {id} is claimed by more than one directory entry")]
    DuplicateObjectId { id: u16 },

    #[error("Media object {id} is marked present but has no data")]
    EmptyMedia { id: u16 },

    #[error("Invalid string at offset {offset}")]
    InvalidString { offset: usize },

    #[error("Field '{0}' cannot be encoded: it contains a NUL byte")]
    NulInField(&'static str),

    #[error("Too many objects to encode: {0}")]
    TooManyObjects(usize),

    #[error("Archive contains no top-level .lua script")]
    MissingScript,

    #[error("Archive contains more than one script: '{first}' and '{second}'")]
    MultipleScripts { first: String, second: String },

    #[error("Duplicate archive entry (names are case-insensitive): {0}")]
    DuplicateEntry(String),

    #[error("Unrecognized container: neither a compiled cartridge nor an archive")]
    UnrecognizedContainer,

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidConfig { key: String, reason: String },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
