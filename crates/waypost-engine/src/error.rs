//! Error types for waypost-engine

use crate::cycle::CycleKind;
use crate::input::InputRequestId;
use crate::script::ScriptFault;
use thiserror::Error;
use waypost_core::{CommandId, ObjectId};

/// Engine error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed container: {0}")]
    MalformedContainer(#[source] waypost_format::Error),

    #[error("Unsupported compiled format version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("Media {0} has no asset data")]
    MissingAsset(ObjectId),

    #[error("{attempted} cycle rejected: a {active} cycle is already running")]
    ReentrancyViolation {
        active: CycleKind,
        attempted: CycleKind,
    },

    #[error("Script host failed during {cycle} cycle: {fault}")]
    ScriptHostFault {
        cycle: CycleKind,
        #[source]
        fault: ScriptFault,
    },

    #[error(transparent)]
    Core(#[from] waypost_core::Error),

    #[error("No pending input request {0}")]
    NoPendingInput(InputRequestId),

    #[error("Input request {0} is still pending")]
    InputAlreadyPending(InputRequestId),

    #[error("Command {0} is disabled")]
    CommandDisabled(CommandId),

    #[error("Command {command} cannot be used with {target:?}")]
    InvalidCommandTarget {
        command: CommandId,
        target: Option<ObjectId>,
    },

    #[error("No cartridge is loaded")]
    NotLoaded,

    #[error("Unknown host command: {0}")]
    UnknownHostCommand(String),
}

impl From<waypost_format::Error> for Error {
    fn from(err: waypost_format::Error) -> Self {
        match err {
            waypost_format::Error::UnsupportedVersion { major, minor } => {
                Error::UnsupportedVersion { major, minor }
            }
            other => Error::MalformedContainer(other),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
