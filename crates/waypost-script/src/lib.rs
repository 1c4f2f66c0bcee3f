//! Waypost Script - Declarative RON script host
//!
//! A reference `ScriptHost` for cartridges whose script payload is a RON
//! document:
//! - Media, zones, characters, items, tasks, timers, inputs and commands,
//!   declared by name
//! - Initial cartridge variables
//! - Handlers pairing a trigger with the actions it runs

mod error;
mod host;
mod loader;
mod schema;

pub use error::{Error, Result};
pub use host::RonScriptHost;
pub use loader::{validate, Loader};
pub use schema::{
    Action, CartridgeDefs, CharacterDef, CommandDef, HandlerDef, InputDef, ItemDef, LocationDef,
    MediaDef, MessageDef, ShapeDef, TargetDef, TaskDef, TimerDef, Trigger, ZoneDef,
};
