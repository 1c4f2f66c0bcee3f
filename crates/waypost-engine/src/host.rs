//! Outward interface: what the engine asks of the host application

use crate::event::{Message, NavigationTarget};
use crate::input::InputRequest;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use waypost_core::{MediaType, ObjectId, TimerHandle};

/// Screens the host can be asked to show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Screen {
    Detail,
    Inventory,
    Item,
    Location,
    Main,
    Tasks,
}

impl Screen {
    const ALL: [Screen; 6] = [
        Screen::Detail,
        Screen::Inventory,
        Screen::Item,
        Screen::Location,
        Screen::Main,
        Screen::Tasks,
    ];

    /// Map a numeric screen constant, rounding to the nearest integer
    pub fn from_number(n: f64) -> Option<Self> {
        let index = (n + 0.5).floor();
        if !(0.0..Self::ALL.len() as f64).contains(&index) {
            return None;
        }
        Some(Self::ALL[index as usize])
    }

    pub fn name(&self) -> &'static str {
        match self {
            Screen::Detail => "Detail",
            Screen::Inventory => "Inventory",
            Screen::Item => "Item",
            Screen::Location => "Location",
            Screen::Main => "Main",
            Screen::Tasks => "Tasks",
        }
    }
}

/// Severity of a cartridge log message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum LogLevel {
    Debug,
    /// The default level for messages written by cartridges
    #[default]
    Cartridge,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    const ALL: [LogLevel; 5] = [
        LogLevel::Debug,
        LogLevel::Cartridge,
        LogLevel::Info,
        LogLevel::Warning,
        LogLevel::Error,
    ];

    /// Map a numeric level, rounding to the nearest integer
    pub fn from_number(n: f64) -> Option<Self> {
        let index = (n + 0.5).floor();
        if !(0.0..Self::ALL.len() as f64).contains(&index) {
            return None;
        }
        Some(Self::ALL[index as usize])
    }

    /// Name shown in play logs
    pub fn name(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Cartridge => "CARTRIDGE",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identifier the host gives to a scheduled wake-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostTimerId(pub u64);

/// Media handed to the host for playback or display
///
/// The bytes are fetched with `Session::media_bytes(object)`.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRef {
    pub object: ObjectId,
    pub name: String,
    pub filename: Option<String>,
    pub kind: Option<MediaType>,
}

/// Services of the host application
///
/// Every method is called from inside a dispatch cycle. Calling back into
/// the session from here is rejected with `ReentrancyViolation`, except for
/// `Session::media_bytes`.
pub trait Host {
    /// Show a sequence of dialog pages
    fn show_dialog(&mut self, messages: &[Message]);

    /// Show a message box; closing it is reported with `notify_ui_event`
    fn show_message(&mut self, message: &Message);

    /// Ask a question; the answer arrives through `answer_input`
    fn request_input(&mut self, request: &InputRequest);

    fn play_media(&mut self, media: &MediaRef);

    fn stop_audio(&mut self) {}

    fn set_status_text(&mut self, _text: &str) {}

    fn save_game(&mut self) {}

    fn quit_game(&mut self) {}

    fn navigate_to(&mut self, _target: &NavigationTarget) {}

    fn alert_user(&mut self) {}

    fn log(&mut self, _level: LogLevel, _level_name: &str, _text: &str) {}

    fn show_screen(&mut self, _screen: Screen, _item: Option<ObjectId>) {}

    fn refresh_ui(&mut self) {}

    fn refresh_distance_display(&mut self) {}

    fn refresh_map_display(&mut self) {}

    /// Wake the engine with `update` once `after` has passed
    fn register_timer(&mut self, after: TimeDelta, timer: TimerHandle) -> HostTimerId;

    fn cancel_timer(&mut self, id: HostTimerId);

    fn current_time(&self) -> DateTime<Utc>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_rounding() {
        assert_eq!(LogLevel::from_number(0.4), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_number(0.5), Some(LogLevel::Cartridge));
        assert_eq!(LogLevel::from_number(3.6), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_number(4.5), None);
        assert_eq!(LogLevel::from_number(-0.7), None);
        assert_eq!(LogLevel::Warning.name(), "WARNING");
    }

    #[test]
    fn test_screen_from_number() {
        assert_eq!(Screen::from_number(0.0), Some(Screen::Detail));
        assert_eq!(Screen::from_number(4.8), Some(Screen::Tasks));
        assert_eq!(Screen::from_number(6.0), None);
        assert_eq!(Screen::Main.name(), "Main");
    }
}
