//! Waypost Engine - Sessions and event dispatch for cartridges
//!
//! A `Session` owns a loaded cartridge, the `ScriptHost` that interprets
//! its script and the `Host` application that shows it to the player.
//!
//! ## Dispatch cycles
//!
//! Every inbound event (`update`, `invoke_command`, `answer_input`,
//! `notify_ui_event`, `request_save`, `request_start`, `pause`, `resume`)
//! opens one cycle, runs the matching script host callback to completion
//! and closes it. A call made while a cycle is open is rejected with
//! `Error::ReentrancyViolation` instead of being queued or nested.
//!
//! ## Timers
//!
//! The engine never sleeps. Running timers are mirrored to the host with
//! `Host::register_timer`; the host calls `update` when one is due.

mod assets;
mod cycle;
mod dispatcher;
mod error;
mod event;
mod host;
mod input;
mod script;
mod session;

#[cfg(test)]
mod testing;

pub use assets::AssetLibrary;
pub use cycle::{Cycle, CycleKind};
pub use dispatcher::{CallbackFault, FaultSource, UpdateReport};
pub use error::{Error, Result};
pub use event::{Message, NavigationTarget, UiEvent};
pub use host::{Host, HostTimerId, LogLevel, MediaRef, Screen};
pub use input::{InputAnswer, InputRequest, InputRequestId, InputState};
pub use script::{ScriptFault, ScriptHost};
pub use session::{Session, WeakSession, START_MARKER_NAME};
