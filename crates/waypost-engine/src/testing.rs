//! Test doubles for the host application and the script host

use crate::cycle::Cycle;
use crate::event::{Message, NavigationTarget, UiEvent};
use crate::host::{Host, HostTimerId, LogLevel, MediaRef, Screen};
use crate::input::{InputAnswer, InputRequest, InputRequestId};
use crate::script::{ScriptFault, ScriptHost};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::cell::RefCell;
use std::rc::Rc;
use waypost_core::{CommandId, ObjectId, TimerExpiry, TimerHandle, ValueMap, ZoneEvent};
use waypost_format::{CompiledCartridge, CompiledHeader, MediaBlob};

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub(crate) fn at(secs: i64) -> DateTime<Utc> {
    t0() + TimeDelta::seconds(secs)
}

/// A compiled container with the given media blobs as objects 1..
pub(crate) fn compiled_bytes(media: Vec<Option<MediaBlob>>) -> Vec<u8> {
    let header = CompiledHeader {
        name: "Harbour Walk".to_string(),
        user: "Alice".to_string(),
        device: "PocketPC".to_string(),
        ..CompiledHeader::default()
    };
    CompiledCartridge::new(header, b"payload".to_vec(), media)
        .encode()
        .unwrap()
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum HostCall {
    Dialog(Vec<String>),
    Message(String),
    Input(InputRequestId),
    Media(ObjectId),
    StopAudio,
    Status(String),
    Save,
    Quit,
    Navigate(String),
    Alert,
    Log(LogLevel, String),
    Screen(Screen),
    RefreshUi,
    RefreshDistance,
    RefreshMap,
    RegisterTimer(TimerHandle, TimeDelta),
    CancelTimer(HostTimerId),
}

/// Shared record of host calls, readable after the host moved into a session
#[derive(Debug, Clone, Default)]
pub(crate) struct HostLog(Rc<RefCell<Vec<HostCall>>>);

impl HostLog {
    pub(crate) fn calls(&self) -> Vec<HostCall> {
        self.0.borrow().clone()
    }

    pub(crate) fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    fn push(&self, call: HostCall) {
        self.0.borrow_mut().push(call);
    }
}

pub(crate) struct RecordingHost {
    log: HostLog,
    next_timer: u64,
}

impl RecordingHost {
    pub(crate) fn new() -> (Box<dyn Host>, HostLog) {
        let log = HostLog::default();
        let host = RecordingHost {
            log: log.clone(),
            next_timer: 0,
        };
        (Box::new(host), log)
    }
}

impl Host for RecordingHost {
    fn show_dialog(&mut self, messages: &[Message]) {
        self.log.push(HostCall::Dialog(messages.iter().map(|m| m.text.clone()).collect()));
    }

    fn show_message(&mut self, message: &Message) {
        self.log.push(HostCall::Message(message.text.clone()));
    }

    fn request_input(&mut self, request: &InputRequest) {
        self.log.push(HostCall::Input(request.id));
    }

    fn play_media(&mut self, media: &MediaRef) {
        self.log.push(HostCall::Media(media.object));
    }

    fn stop_audio(&mut self) {
        self.log.push(HostCall::StopAudio);
    }

    fn set_status_text(&mut self, text: &str) {
        self.log.push(HostCall::Status(text.to_string()));
    }

    fn save_game(&mut self) {
        self.log.push(HostCall::Save);
    }

    fn quit_game(&mut self) {
        self.log.push(HostCall::Quit);
    }

    fn navigate_to(&mut self, target: &NavigationTarget) {
        self.log.push(HostCall::Navigate(target.name.clone()));
    }

    fn alert_user(&mut self) {
        self.log.push(HostCall::Alert);
    }

    fn log(&mut self, level: LogLevel, _level_name: &str, text: &str) {
        self.log.push(HostCall::Log(level, text.to_string()));
    }

    fn show_screen(&mut self, screen: Screen, _item: Option<ObjectId>) {
        self.log.push(HostCall::Screen(screen));
    }

    fn refresh_ui(&mut self) {
        self.log.push(HostCall::RefreshUi);
    }

    fn refresh_distance_display(&mut self) {
        self.log.push(HostCall::RefreshDistance);
    }

    fn refresh_map_display(&mut self) {
        self.log.push(HostCall::RefreshMap);
    }

    fn register_timer(&mut self, after: TimeDelta, timer: TimerHandle) -> HostTimerId {
        self.next_timer += 1;
        self.log.push(HostCall::RegisterTimer(timer, after));
        HostTimerId(self.next_timer)
    }

    fn cancel_timer(&mut self, id: HostTimerId) {
        self.log.push(HostCall::CancelTimer(id));
    }

    fn current_time(&self) -> DateTime<Utc> {
        t0()
    }
}

/// A callback as seen by `TestScript` hooks
pub(crate) enum Callback<'e> {
    Start,
    Timer(&'e TimerExpiry),
    Zone(&'e ZoneEvent),
    Command(CommandId, Option<ObjectId>),
    Input(&'e InputRequest, &'e InputAnswer),
    Ui(&'e UiEvent),
    Save,
}

impl Callback<'_> {
    fn label(&self) -> String {
        match self {
            Callback::Start => "start".to_string(),
            Callback::Timer(expiry) => format!("timer {}", expiry.handle),
            Callback::Zone(event) => format!("zone {}", event.zone()),
            Callback::Command(command, _) => format!("command {}", command),
            Callback::Input(_, InputAnswer::Value(value)) => format!("input {}", value),
            Callback::Input(_, InputAnswer::Cancelled) => "input cancelled".to_string(),
            Callback::Ui(_) => "ui".to_string(),
            Callback::Save => "save".to_string(),
        }
    }
}

type SetupHook = Box<dyn FnMut(&mut Cycle<'_>) -> Result<(), ScriptFault>>;
type EventHook = Box<dyn FnMut(Callback<'_>, &mut Cycle<'_>) -> Result<(), ScriptFault>>;

/// Script host driven by closures, recording every callback it receives
pub(crate) struct TestScript {
    setup: SetupHook,
    hook: Option<EventHook>,
    seen: Rc<RefCell<Vec<String>>>,
}

impl TestScript {
    pub(crate) fn new(
        setup: impl FnMut(&mut Cycle<'_>) -> Result<(),
        ScriptFault> + 'static,
    ) -> Self {
        Self {
            setup: Box::new(setup),
            hook: None,
            seen: Rc::default(),
        }
    }

    pub(crate) fn on_event(
        mut self,
        hook: impl FnMut(Callback<'_>, &mut Cycle<'_>) -> Result<(), ScriptFault> + 'static,
    ) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Labels of the callbacks received so far
    pub(crate) fn seen(&self) -> Rc<RefCell<Vec<String>>> {
        self.seen.clone()
    }

    fn dispatch(
        &mut self,
        callback: Callback<'_>,
        cycle: &mut Cycle<'_>,
    ) -> Result<(), ScriptFault> {
        self.seen.borrow_mut().push(callback.label());
        match &mut self.hook {
            Some(hook) => hook(callback, cycle),
            None => Ok(()),
        }
    }
}

impl ScriptHost for TestScript {
    fn setup(
        &mut self,
        _payload: &[u8],
        _env: &ValueMap,
        cycle: &mut Cycle<'_>,
    ) -> Result<(), ScriptFault> {
        (self.setup)(cycle)
    }

    fn on_start(&mut self, cycle: &mut Cycle<'_>) -> Result<(), ScriptFault> {
        self.dispatch(Callback::Start, cycle)
    }

    fn on_timer(&mut self, expiry: &TimerExpiry, cycle: &mut Cycle<'_>) -> Result<(), ScriptFault> {
        self.dispatch(Callback::Timer(expiry), cycle)
    }

    fn on_zone(&mut self, event: &ZoneEvent, cycle: &mut Cycle<'_>) -> Result<(), ScriptFault> {
        self.dispatch(Callback::Zone(event), cycle)
    }

    fn on_command(
        &mut self,
        command: CommandId,
        target: Option<ObjectId>,
        cycle: &mut Cycle<'_>,
    ) -> Result<(), ScriptFault> {
        self.dispatch(Callback::Command(command, target), cycle)
    }

    fn on_input(
        &mut self,
        request: &InputRequest,
        answer: &InputAnswer,
        cycle: &mut Cycle<'_>,
    ) -> Result<(), ScriptFault> {
        self.dispatch(Callback::Input(request, answer), cycle)
    }

    fn on_ui_event(&mut self, event: &UiEvent, cycle: &mut Cycle<'_>) -> Result<(), ScriptFault> {
        self.dispatch(Callback::Ui(event), cycle)
    }

    fn on_save(&mut self, cycle: &mut Cycle<'_>) -> Result<(), ScriptFault> {
        self.dispatch(Callback::Save, cycle)
    }
}
