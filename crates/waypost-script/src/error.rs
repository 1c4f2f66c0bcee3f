//! Error types for waypost-script

use thiserror::Error;
use waypost_engine::ScriptFault;

/// Script loading and execution error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("Script payload is not UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Duplicate definition: {0}")]
    DuplicateDefinition(String),

    #[error("Unknown {kind} '{name}'")]
    UnknownReference { kind: &'static str, name: String },

    #[error(transparent)]
    Engine(#[from] waypost_engine::Error),
}

impl From<waypost_core::Error> for Error {
    fn from(err: waypost_core::Error) -> Self {
        Error::Engine(err.into())
    }
}

impl From<Error> for ScriptFault {
    fn from(err: Error) -> Self {
        ScriptFault::with_source(err.to_string(), err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
