//! Waypost Core - Object model of a location-based cartridge
//!
//! This crate provides the in-memory state of a loaded cartridge:
//! - Object and command identifiers, dynamic values
//! - Spherical geometry (`ZonePoint`, `Distance`, `Boundary`)
//! - The object arena rooted in `Cartridge`
//! - Countdown and interval timers with pause-aware accrual
//! - Zone proximity classification
//!
//! Nothing here talks to a host or a script; the engine crate drives these
//! types from inside its dispatch cycles.

pub mod cartridge;
pub mod command;
mod error;
pub mod geo;
mod identity;
pub mod object;
pub mod timer;
mod value;
pub mod zone;

pub use cartridge::{Cartridge, CartridgeMeta};
pub use command::{Command, CommandSpec, CommandTarget};
pub use error::{Error, Result};
pub use geo::{Bearing, Boundary, Distance, DistanceUnit, ZonePoint};
pub use identity::{CommandId, ObjectId};
pub use object::{
    Container, InputKind, MediaResource, MediaType, ObjectKind, ObjectSpec, ShowObjects, TaskState,
    ZObject, ZoneSpec,
};
pub use timer::{
    ScheduleChange, TimerClock, TimerExpiry, TimerHandle, TimerKind, TimerStatus, TimerSubsystem,
    TimerToken,
};
pub use value::{Value, ValueMap};
pub use zone::{TransitionKind, ZoneEvent, ZoneState, ZoneTransition};
