//! Schema definitions for RON cartridge scripts

pub mod handler;
pub mod object;

pub use handler::{Action, HandlerDef, MessageDef, Trigger};
pub use object::{
    CharacterDef, CommandDef, InputDef, ItemDef, LocationDef, MediaDef, ShapeDef, TargetDef,
    TaskDef, TimerDef, ZoneDef,
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use waypost_core::Value;

/// A complete cartridge description
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CartridgeDefs {
    #[serde(default)]
    pub media: Vec<MediaDef>,
    #[serde(default)]
    pub zones: Vec<ZoneDef>,
    #[serde(default)]
    pub characters: Vec<CharacterDef>,
    #[serde(default)]
    pub items: Vec<ItemDef>,
    #[serde(default)]
    pub tasks: Vec<TaskDef>,
    #[serde(default)]
    pub timers: Vec<TimerDef>,
    #[serde(default)]
    pub inputs: Vec<InputDef>,
    #[serde(default)]
    pub commands: Vec<CommandDef>,
    /// Initial cartridge variables
    #[serde(default)]
    pub variables: IndexMap<String, Value>,
    #[serde(default)]
    pub handlers: Vec<HandlerDef>,
}
