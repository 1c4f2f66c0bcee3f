//! Error types for waypost-core

use crate::{CommandId, ObjectId, TimerHandle};
use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("Command not found: {0}")]
    CommandNotFound(CommandId),

    #[error("Timer not found: {0}")]
    TimerNotFound(TimerHandle),

    #[error("Wrong object kind for {id}: expected {expected}, got {got}")]
    WrongKind {
        id: ObjectId,
        expected: &'static str,
        got: &'static str,
    },

    #[error("Invalid geometry for zone '{zone}': {reason}")]
    InvalidGeometry { zone: String, reason: String },

    #[error("Task {task} cannot have {parent} as parent: the task tree would contain a cycle")]
    TaskCycle { task: ObjectId, parent: ObjectId },

    #[error("Object {object} cannot be placed inside {container}: containment would loop")]
    ContainmentCycle {
        object: ObjectId,
        container: ObjectId,
    },

    #[error("Mutation attempted while no dispatch cycle is open")]
    MutationOutsideCycle,

    #[error("A dispatch cycle is already open")]
    CycleAlreadyOpen,

    #[error("Too many media objects: at most {} can be numbered", u16::MAX)]
    TooManyMedia,

    #[error("Invalid distance unit: {0}")]
    InvalidUnit(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
