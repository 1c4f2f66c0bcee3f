//! Dispatch cycles
//!
//! Every state change happens inside a cycle. A cycle is opened by one
//! inbound event, runs the script host's callback to completion and closes.
//! Only one cycle is open per session at any time.

use crate::assets::AssetLibrary;
use crate::error::{Error, Result};
use crate::event::{Message, NavigationTarget};
use crate::host::{Host, LogLevel, MediaRef, Screen};
use crate::input::{InputAnswer, InputRequest, InputRequestId, InputSlot};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use waypost_core::{Cartridge, ObjectId, TimerHandle, TimerKind, ValueMap};

/// The inbound event that opened a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CycleKind {
    /// Object registration while loading
    Setup,
    Start,
    /// Position sample or timer wake-up
    Update,
    Command,
    Input,
    UiEvent,
    Save,
    /// Pausing or resuming the session
    RunState,
    Unload,
    /// Read-only access between cycles
    Inspect,
}

impl CycleKind {
    pub fn name(&self) -> &'static str {
        match self {
            CycleKind::Setup => "setup",
            CycleKind::Start => "start",
            CycleKind::Update => "update",
            CycleKind::Command => "command",
            CycleKind::Input => "input",
            CycleKind::UiEvent => "ui-event",
            CycleKind::Save => "save",
            CycleKind::RunState => "run-state",
            CycleKind::Unload => "unload",
            CycleKind::Inspect => "inspect",
        }
    }
}

impl fmt::Display for CycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Marks a session busy for the lifetime of one cycle
pub(crate) struct CycleGuard<'a> {
    slot: &'a Cell<Option<CycleKind>>,
}

impl<'a> CycleGuard<'a> {
    pub(crate) fn enter(slot: &'a Cell<Option<CycleKind>>, kind: CycleKind) -> Result<Self> {
        if let Some(active) = slot.get() {
            tracing::warn!(%active, attempted = %kind, "re-entrant dispatch rejected");
            return Err(Error::ReentrancyViolation {
                active,
                attempted: kind,
            });
        }
        slot.set(Some(kind));
        Ok(Self { slot })
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.slot.set(None);
    }
}

/// Access to the session during one cycle
///
/// Script hosts change the cartridge and talk to the host application only
/// through this handle.
pub struct Cycle<'a> {
    kind: CycleKind,
    now: DateTime<Utc>,
    cartridge: &'a mut Cartridge,
    host: &'a mut dyn Host,
    assets: &'a AssetLibrary,
    env: &'a ValueMap,
    inputs: &'a mut InputSlot,
}

impl<'a> Cycle<'a> {
    pub(crate) fn new(
        kind: CycleKind,
        now: DateTime<Utc>,
        cartridge: &'a mut Cartridge,
        host: &'a mut dyn Host,
        assets: &'a AssetLibrary,
        env: &'a ValueMap,
        inputs: &'a mut InputSlot,
    ) -> Self {
        Self {
            kind,
            now,
            cartridge,
            host,
            assets,
            env,
            inputs,
        }
    }

    pub fn kind(&self) -> CycleKind {
        self.kind
    }

    /// Time the cycle started at
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Environment table given to the script host at setup
    pub fn env(&self) -> &ValueMap {
        self.env
    }

    pub fn cartridge(&self) -> &Cartridge {
        &*self.cartridge
    }

    pub fn cartridge_mut(&mut self) -> &mut Cartridge {
        &mut *self.cartridge
    }

    // Timers

    /// Start a timer object at the cycle's time
    pub fn start_timer(&mut self, timer: ObjectId) -> Result<bool> {
        Ok(self.cartridge.start_timer(timer, self.now)?)
    }

    /// Stop a timer object at the cycle's time
    pub fn stop_timer(&mut self, timer: ObjectId) -> Result<bool> {
        Ok(self.cartridge.stop_timer(timer, self.now)?)
    }

    /// Schedule an anonymous timer delivered as a `Callback` token
    pub fn add_timer(&mut self, kind: TimerKind, duration: TimeDelta) -> Result<TimerHandle> {
        Ok(self.cartridge.add_timer(kind, duration, self.now)?)
    }

    pub fn remove_timer(&mut self, handle: TimerHandle) -> Result<()> {
        Ok(self.cartridge.remove_timer(handle)?)
    }

    // Player interaction

    pub fn show_dialog(&mut self, messages: &[Message]) {
        self.host.show_dialog(messages);
    }

    pub fn show_message(&mut self, message: &Message) {
        self.host.show_message(message);
    }

    /// Ask the question of an input object
    ///
    /// Fails with `InputAlreadyPending` while another question is open.
    pub fn request_input(&mut self, input: ObjectId) -> Result<InputRequestId> {
        let object = self.cartridge.object(input)?;
        let request = self.inputs.open(object)?;
        tracing::debug!(id = %request.id, %input, "input requested");
        self.host.request_input(&request);
        Ok(request.id)
    }

    pub fn pending_input(&self) -> Option<&InputRequest> {
        self.inputs.pending()
    }

    pub(crate) fn resolve_input(
        &mut self,
        id: InputRequestId,
        answer: &InputAnswer,
    ) -> Result<InputRequest> {
        self.inputs.resolve(id, answer)
    }

    /// Hand a media object to the host for playback
    pub fn play_media(&mut self, media: ObjectId) -> Result<()> {
        let object = self.cartridge.object(media)?;
        let data = object.as_media().ok_or(waypost_core::Error::WrongKind {
            id: media,
            expected: "media",
            got: object.kind.tag(),
        })?;
        if !self.assets.contains(media) {
            return Err(Error::MissingAsset(media));
        }
        let resource = data.resources.first();
        let media_ref = MediaRef {
            object: media,
            name: object.name.clone(),
            filename: resource.map(|r| r.filename.clone()),
            kind: resource.map(|r| r.kind),
        };
        self.host.play_media(&media_ref);
        Ok(())
    }

    pub fn stop_audio(&mut self) {
        self.host.stop_audio();
    }

    pub fn set_status_text(&mut self, text: &str) {
        self.host.set_status_text(text);
    }

    pub fn show_screen(&mut self, screen: Screen, item: Option<ObjectId>) {
        self.host.show_screen(screen, item);
    }

    pub fn alert_user(&mut self) {
        self.host.alert_user();
    }

    /// Write a cartridge message to the play log
    pub fn log(&mut self, level: LogLevel, text: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(target: "waypost::cartridge", "{}", text),
            LogLevel::Cartridge | LogLevel::Info => {
                tracing::info!(target: "waypost::cartridge", %level, "{}", text)
            }
            LogLevel::Warning => tracing::warn!(target: "waypost::cartridge", "{}", text),
            LogLevel::Error => tracing::error!(target: "waypost::cartridge", "{}", text),
        }
        self.host.log(level, level.name(), text);
    }

    /// Guide the player to a zone's position
    pub fn navigate_to(&mut self, zone: ObjectId) -> Result<()> {
        let object = self.cartridge.object(zone)?;
        let data = object.as_zone().ok_or(waypost_core::Error::WrongKind {
            id: zone,
            expected: "zone",
            got: object.kind.tag(),
        })?;
        let target = NavigationTarget {
            zone: Some(zone),
            name: object.name.clone(),
            point: data.original_point,
        };
        self.host.navigate_to(&target);
        Ok(())
    }

    pub fn refresh_ui(&mut self) {
        self.host.refresh_ui();
    }

    pub fn refresh_distance_display(&mut self) {
        self.host.refresh_distance_display();
    }

    pub fn refresh_map_display(&mut self) {
        self.host.refresh_map_display();
    }

    pub fn save_game(&mut self) {
        self.host.save_game();
    }

    pub fn quit_game(&mut self) {
        self.host.quit_game();
    }

    /// Run a named host command
    ///
    /// `DriveTo` without a zone guides to the cartridge's starting location.
    pub fn run_host_command(&mut self, command: &str, argument: Option<ObjectId>) -> Result<()> {
        match command {
            "SaveClose" => {
                self.host.save_game();
                self.host.quit_game();
            }
            "DriveTo" => match argument {
                Some(zone) => self.navigate_to(zone)?,
                None => {
                    let meta = self.cartridge.meta();
                    let target = NavigationTarget {
                        zone: None,
                        name: meta.name.clone(),
                        point: meta.starting_location,
                    };
                    self.host.navigate_to(&target);
                }
            },
            "StopSound" => self.host.stop_audio(),
            "Alert" => self.host.alert_user(),
            other => return Err(Error::UnknownHostCommand(other.to_string())),
        }
        Ok(())
    }
}
