//! Declarative script host driven by RON definitions

use crate::error::{Error, Result};
use crate::loader::Loader;
use crate::schema::{Action, CartridgeDefs, HandlerDef, LocationDef, MessageDef, TargetDef, Trigger};
use chrono::TimeDelta;
use indexmap::IndexMap;
use waypost_core::{
    CommandId, CommandSpec, CommandTarget, Container, Distance, InputKind, MediaResource, ObjectId,
    ObjectSpec, TimerExpiry, TimerToken, Value, ValueMap, ZoneEvent, ZoneSpec,
};
use waypost_engine::{Cycle, InputAnswer, InputRequest, Message, ScriptFault, ScriptHost, UiEvent};

/// Script host for cartridges whose payload is a RON `CartridgeDefs`
///
/// Objects are registered at setup under their declared names. Each engine
/// callback is matched against the handlers' triggers; matching handlers
/// run in declaration order and stop at the first failing action.
#[derive(Debug, Default)]
pub struct RonScriptHost {
    objects: IndexMap<String, ObjectId>,
    commands: IndexMap<String, CommandId>,
    handlers: Vec<HandlerDef>,
}

impl RonScriptHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of a declared object
    pub fn object_id(&self, name: &str) -> Option<ObjectId> {
        self.objects.get(name).copied()
    }

    /// Id of a declared command
    pub fn command_id(&self, name: &str) -> Option<CommandId> {
        self.commands.get(name).copied()
    }

    fn object(&self, name: &str) -> Result<ObjectId> {
        self.object_id(name).ok_or_else(|| Error::UnknownReference {
            kind: "object",
            name: name.to_string(),
        })
    }

    fn command(&self, name: &str) -> Result<CommandId> {
        self.command_id(name).ok_or_else(|| Error::UnknownReference {
            kind: "command",
            name: name.to_string(),
        })
    }

    fn object_name(&self, id: ObjectId) -> Option<&str> {
        self.objects
            .iter()
            .find(|(_, object)| **object == id)
            .map(|(name, _)| name.as_str())
    }

    fn command_name(&self, id: CommandId) -> Option<&str> {
        self.commands
            .iter()
            .find(|(_, command)| **command == id)
            .map(|(name, _)| name.as_str())
    }

    fn spec(&self, name: &str, description: &str, media: Option<&str>) -> Result<ObjectSpec> {
        let mut spec = ObjectSpec::named(name).with_description(description);
        if let Some(media) = media {
            spec = spec.with_media(self.object(media)?);
        }
        Ok(spec)
    }

    fn container(&self, location: &LocationDef) -> Result<Container> {
        Ok(match location {
            LocationDef::Nowhere => Container::Nowhere,
            LocationDef::Player => Container::Player,
            LocationDef::In(name) => Container::Object(self.object(name)?),
        })
    }

    fn message(&self, def: &MessageDef) -> Result<Message> {
        let mut message = Message::new(def.text.as_str()).with_buttons(def.buttons.iter().cloned());
        if let Some(media) = &def.media {
            message = message.with_media(self.object(media)?);
        }
        Ok(message)
    }

    /// Register every declared object, in an order that lets later kinds refer to earlier ones
    fn install(&mut self, defs: CartridgeDefs, cycle: &mut Cycle<'_>) -> Result<()> {
        // Media come first so compiled asset indices follow declaration order
        for media in &defs.media {
            let resources = media.files.iter().map(MediaResource::from_filename).collect();
            let spec = ObjectSpec::named(media.name.as_str()).with_visible(false);
            let id = cycle.cartridge_mut().register_media(spec, resources)?;
            self.objects.insert(media.name.clone(), id);
        }

        for zone in &defs.zones {
            let spec = self
                .spec(&zone.name, &zone.description, zone.media.as_deref())?
                .with_visible(zone.visible)
                .with_active(zone.active);
            let shape = ZoneSpec::new(
                zone.shape.boundary(),
                Distance::meters(zone.proximity),
                zone.distance.map(Distance::meters),
            )
            .showing(zone.show_objects);
            let id = cycle.cartridge_mut().register_zone(spec, shape)?;
            self.objects.insert(zone.name.clone(), id);
        }

        for character in &defs.characters {
            let spec = self
                .spec(&character.name, &character.description, character.media.as_deref())?
                .with_visible(character.visible)
                .with_active(character.active);
            let id = cycle.cartridge_mut().register_character(spec)?;
            self.objects.insert(character.name.clone(), id);
        }

        for item in &defs.items {
            let spec = self
                .spec(&item.name, &item.description, item.media.as_deref())?
                .with_visible(item.visible)
                .with_active(item.active);
            let id = cycle.cartridge_mut().register_item(spec)?;
            if item.locked {
                cycle.cartridge_mut().set_locked(id, true)?;
            }
            self.objects.insert(item.name.clone(), id);
        }

        // Placed once all containers exist
        let placements = defs
            .characters
            .iter()
            .map(|c| (&c.name, &c.location))
            .chain(defs.items.iter().map(|i| (&i.name, &i.location)));
        for (name, location) in placements {
            if *location != LocationDef::Nowhere {
                let container = self.container(location)?;
                cycle.cartridge_mut().move_to(self.object(name)?, container)?;
            }
        }

        for task in &defs.tasks {
            let spec = self
                .spec(&task.name, &task.description, None)?
                .with_visible(task.visible)
                .with_active(task.active);
            let id = cycle.cartridge_mut().register_task(spec, None, task.state)?;
            self.objects.insert(task.name.clone(), id);
        }
        for task in &defs.tasks {
            if let Some(parent) = &task.parent {
                let parent = self.object(parent)?;
                cycle.cartridge_mut().set_task_parent(self.object(&task.name)?, Some(parent))?;
            }
        }

        for timer in &defs.timers {
            let duration = TimeDelta::milliseconds((timer.seconds * 1000.0).round() as i64);
            let id = cycle
                .cartridge_mut()
                .register_timer(ObjectSpec::named(timer.name.as_str()), timer.kind, duration)?;
            self.objects.insert(timer.name.clone(), id);
        }

        for input in &defs.inputs {
            let kind = if input.choices.is_empty() {
                InputKind::Text
            } else {
                InputKind::MultipleChoice(input.choices.clone())
            };
            let spec = self.spec(&input.name, "", input.media.as_deref())?;
            let id = cycle.cartridge_mut().register_input(spec, input.question.as_str(), kind)?;
            self.objects.insert(input.name.clone(), id);
        }

        for command in &defs.commands {
            let owner = command.owner.as_deref().map(|o| self.object(o)).transpose()?;
            let target = match &command.target {
                TargetDef::None => CommandTarget::None,
                TargetDef::Any => CommandTarget::With {
                    any: true,
                    allowed: Vec::new(),
                },
                TargetDef::OneOf(names) => CommandTarget::With {
                    any: false,
                    allowed: names.iter().map(|n| self.object(n)).collect::<Result<_>>()?,
                },
            };
            let spec = CommandSpec::new(command.name.as_str(), command.text.as_str())
                .with_target(target)
                .with_enabled(command.enabled);
            let id = cycle.cartridge_mut().register_command(owner, spec)?;
            self.commands.insert(command.name.clone(), id);
        }

        for (name, value) in &defs.variables {
            cycle.cartridge_mut().set_variable(name.as_str(), value.clone())?;
        }

        for timer in defs.timers.iter().filter(|t| t.autostart) {
            cycle.start_timer(self.object(&timer.name)?)?;
        }

        self.handlers = defs.handlers;
        Ok(())
    }

    /// Run every handler whose trigger matches
    fn fire(&self, cycle: &mut Cycle<'_>, matches: impl Fn(&Trigger) -> bool) -> Result<()> {
        for handler in self.handlers.iter().filter(|h| matches(&h.on)) {
            tracing::debug!(
                trigger = ?handler.on,
                actions = handler.actions.len(),
                "running handler"
            );
            self.run(&handler.actions, cycle)?;
        }
        Ok(())
    }

    fn run(&self, actions: &[Action], cycle: &mut Cycle<'_>) -> Result<()> {
        for action in actions {
            self.apply(action, cycle)?;
        }
        Ok(())
    }

    fn apply(&self, action: &Action, cycle: &mut Cycle<'_>) -> Result<()> {
        match action {
            Action::SetVisible(name, visible) => {
                cycle.cartridge_mut().set_visible(self.object(name)?, *visible)?
            }
            Action::SetActive(name, active) => {
                cycle.cartridge_mut().set_active(self.object(name)?, *active)?
            }
            Action::SetDescription(name, text) => {
                cycle.cartridge_mut().set_description(self.object(name)?, text.as_str())?
            }
            Action::MoveTo(name, location) => {
                let container = self.container(location)?;
                cycle.cartridge_mut().move_to(self.object(name)?, container)?;
            }
            Action::SetLocked(name, locked) => {
                cycle.cartridge_mut().set_locked(self.object(name)?, *locked)?
            }
            Action::SetTaskState(name, state) => {
                cycle.cartridge_mut().set_task_state(self.object(name)?, *state)?
            }
            Action::SetCommandEnabled(name, enabled) => {
                cycle.cartridge_mut().set_command_enabled(self.command(name)?, *enabled)?
            }
            Action::SetVariable(name, value) => {
                cycle.cartridge_mut().set_variable(name.as_str(), value.clone())?
            }
            Action::Increment(name, by) => {
                let current = cycle.cartridge().variable(name).and_then(Value::as_int).unwrap_or(0);
                cycle.cartridge_mut().set_variable(name.as_str(), current + by)?;
            }
            Action::StartTimer(name) => {
                cycle.start_timer(self.object(name)?)?;
            }
            Action::StopTimer(name) => {
                cycle.stop_timer(self.object(name)?)?;
            }
            Action::ResetTimer(name) => cycle.cartridge_mut().reset_timer(self.object(name)?)?,
            Action::ShowMessage(def) => {
                let message = self.message(def)?;
                cycle.show_message(&message);
            }
            Action::ShowDialog(pages) => {
                let messages = pages
                    .iter()
                    .map(|page| self.message(page))
                    .collect::<Result<Vec<_>>>()?;
                cycle.show_dialog(&messages);
            }
            Action::RequestInput(name) => {
                cycle.request_input(self.object(name)?)?;
            }
            Action::PlayMedia(name) => cycle.play_media(self.object(name)?)?,
            Action::StopAudio => cycle.stop_audio(),
            Action::SetStatus(text) => cycle.set_status_text(text),
            Action::ShowScreen { screen, item } => {
                let item = item.as_deref().map(|name| self.object(name)).transpose()?;
                cycle.show_screen(*screen, item);
            }
            Action::Log(level, text) => cycle.log(*level, text),
            Action::Alert => cycle.alert_user(),
            Action::NavigateTo(zone) => cycle.navigate_to(self.object(zone)?)?,
            Action::HostCommand { command, argument } => {
                let argument = argument.as_deref().map(|name| self.object(name)).transpose()?;
                cycle.run_host_command(command, argument)?;
            }
            Action::Complete => cycle.cartridge_mut().set_complete(true)?,
            Action::If {
                variable,
                equals,
                then,
                otherwise,
            } => {
                // Cartridge variables shadow environment entries
                let current = cycle
                    .cartridge()
                    .variable(variable)
                    .or_else(|| cycle.env().get(variable.as_str()));
                let branch = if current == Some(equals) { then } else { otherwise };
                self.run(branch, cycle)?;
            }
        }
        Ok(())
    }
}

impl ScriptHost for RonScriptHost {
    fn setup(
        &mut self,
        payload: &[u8],
        env: &ValueMap,
        cycle: &mut Cycle<'_>,
    ) -> std::result::Result<(), ScriptFault> {
        let defs = Loader::from_bytes(payload)?;
        self.install(defs, cycle)?;
        tracing::info!(
            objects = self.objects.len(),
            commands = self.commands.len(),
            handlers = self.handlers.len(),
            env = env.len(),
            "cartridge script installed"
        );
        Ok(())
    }

    fn on_start(&mut self, cycle: &mut Cycle<'_>) -> std::result::Result<(), ScriptFault> {
        Ok(self.fire(cycle, |t| matches!(t, Trigger::Start))?)
    }

    fn on_timer(
        &mut self,
        expiry: &TimerExpiry,
        cycle: &mut Cycle<'_>,
    ) -> std::result::Result<(), ScriptFault> {
        let TimerToken::Object(id) = expiry.token else {
            tracing::debug!(handle = %expiry.handle, "anonymous timer has no handlers");
            return Ok(());
        };
        let Some(name) = self.object_name(id) else {
            return Ok(());
        };
        Ok(self.fire(cycle, |t| matches!(t, Trigger::Timer(timer) if timer == name))?)
    }

    fn on_zone(
        &mut self,
        event: &ZoneEvent,
        cycle: &mut Cycle<'_>,
    ) -> std::result::Result<(), ScriptFault> {
        let Some(name) = self.object_name(event.zone()) else {
            return Ok(());
        };
        let fired = match event {
            ZoneEvent::Transition(transition) => self.fire(cycle, |t| {
                matches!(t, Trigger::Zone { zone, state }
                    if zone == name && *state == transition.to)
            }),
            ZoneEvent::ActiveChanged { active, .. } => self.fire(cycle, |t| {
                matches!(t, Trigger::ZoneActivated { zone, active: wanted }
                    if zone == name && wanted == active)
            }),
        };
        Ok(fired?)
    }

    fn on_command(
        &mut self,
        command: CommandId,
        target: Option<ObjectId>,
        cycle: &mut Cycle<'_>,
    ) -> std::result::Result<(), ScriptFault> {
        let Some(name) = self.command_name(command) else {
            return Ok(());
        };
        let used_with = target.and_then(|id| self.object_name(id));
        // a handler without a target runs whatever the command was used with
        Ok(self.fire(cycle, |t| match t {
            Trigger::Command { command, target } => {
                command == name && (target.is_none() || target.as_deref() == used_with)
            }
            _ => false,
        })?)
    }

    fn on_input(
        &mut self,
        request: &InputRequest,
        answer: &InputAnswer,
        cycle: &mut Cycle<'_>,
    ) -> std::result::Result<(), ScriptFault> {
        let Some(name) = self.object_name(request.input) else {
            return Ok(());
        };
        match answer {
            InputAnswer::Value(value) => {
                // The answer stays readable under the input's name
                cycle.cartridge_mut().set_variable(name, value.as_str())?;
                let given = value.to_lowercase();
                Ok(self.fire(cycle, |t| match t {
                    Trigger::Input { input, answer } => {
                        input == name && answer.as_ref().map_or(true, |a| a.to_lowercase() == given)
                    }
                    _ => false,
                })?)
            }
            InputAnswer::Cancelled => {
                Ok(self.fire(cycle, |t| matches!(t, Trigger::InputCancelled(i) if i == name))?)
            }
        }
    }

    fn on_ui_event(
        &mut self,
        event: &UiEvent,
        cycle: &mut Cycle<'_>,
    ) -> std::result::Result<(), ScriptFault> {
        let fired = match event {
            UiEvent::DialogClosed => self.fire(cycle, |t| matches!(t, Trigger::DialogClosed)),
            UiEvent::MessageClosed { button } => self.fire(cycle, |t| match t {
                Trigger::MessageClosed { button: wanted } => wanted.is_none() || wanted == button,
                _ => false,
            }),
        };
        Ok(fired?)
    }

    fn on_save(&mut self, cycle: &mut Cycle<'_>) -> std::result::Result<(), ScriptFault> {
        Ok(self.fire(cycle, |t| matches!(t, Trigger::Save))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use std::cell::RefCell;
    use std::rc::Rc;
    use waypost_core::{Cartridge, TaskState, TimerHandle, ZonePoint};
    use waypost_engine::{Error as EngineError, Host, HostTimerId, LogLevel, MediaRef, Session};
    use waypost_format::{CompiledCartridge, CompiledHeader, LoadConfig, MediaBlob};

    const HARBOUR: &str = r#"(
        media: [(name: "Horn", files: ["horn.wav"])],
        zones: [
            (
                name: "Pier",
                shape: Circle(center: (52.0, 4.0), radius: 20.0),
                proximity: 40.0,
                distance: Some(1000.0),
            ),
        ],
        items: [(name: "Lamp", location: In("Pier"))],
        tasks: [(name: "Find the lamp", state: Active)],
        timers: [(name: "Tide", seconds: 60.0)],
        inputs: [(name: "Riddle", question: "What glows?", choices: ["Lamp", "Moon"])],
        commands: [
            (name: "Take", text: "Take", owner: Some("Lamp")),
            (name: "Ask", text: "Ask", enabled: false),
        ],
        variables: {"score": Int(0)},
        handlers: [
            (
                on: Start,
                actions: [
                    ShowMessage((text: "Welcome")),
                    StartTimer("Tide"),
                    If(variable: "Platform", equals: String("Waypost"), then: [SetStatus("ready")]),
                ],
            ),
            (
                on: Zone(zone: "Pier", state: Inside),
                actions: [PlayMedia("Horn"), Increment("score", 1)],
            ),
            (
                on: Command(command: "Take"),
                actions: [
                    MoveTo("Lamp", Player),
                    SetTaskState("Find the lamp", Complete),
                    RequestInput("Riddle"),
                ],
            ),
            (
                on: Input(input: "Riddle", answer: Some("lamp")),
                actions: [Increment("score", 10), Complete],
            ),
            (on: Input(input: "Riddle"), actions: [Log(Info, "answered")]),
            (
                on: Timer("Tide"),
                actions: [ShowDialog([(text: "The tide turns"), (text: "Hurry", buttons: ["OK"])])],
            ),
            (on: Save, actions: [SetVariable("saved", Bool(true))]),
        ],
    )"#;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        calls: Rc<RefCell<Vec<String>>>,
    }

    impl Host for Recorder {
        fn show_dialog(&mut self, messages: &[Message]) {
            let pages: Vec<_> = messages.iter().map(|m| m.text.as_str()).collect();
            self.calls.borrow_mut().push(format!("dialog {}", pages.join("|")));
        }

        fn show_message(&mut self, message: &Message) {
            self.calls.borrow_mut().push(format!("message {}", message.text));
        }

        fn request_input(&mut self, request: &InputRequest) {
            self.calls.borrow_mut().push(format!("input {}", request.question));
        }

        fn play_media(&mut self, media: &MediaRef) {
            self.calls.borrow_mut().push(format!("media {}", media.name));
        }

        fn set_status_text(&mut self, text: &str) {
            self.calls.borrow_mut().push(format!("status {}", text));
        }

        fn save_game(&mut self) {
            self.calls.borrow_mut().push("save".to_string());
        }

        fn log(&mut self, _level: LogLevel, level_name: &str, text: &str) {
            self.calls.borrow_mut().push(format!("log {} {}", level_name, text));
        }

        fn register_timer(&mut self, after: TimeDelta, _timer: TimerHandle) -> HostTimerId {
            self.calls.borrow_mut().push(format!("wake {}", after.num_seconds()));
            HostTimerId(1)
        }

        fn cancel_timer(&mut self, _id: HostTimerId) {}

        fn current_time(&self) -> DateTime<Utc> {
            t0()
        }
    }

    fn load(script: &str) -> waypost_engine::Result<(Session, Rc<RefCell<Vec<String>>>)> {
        let header = CompiledHeader {
            name: "Harbour Walk".to_string(),
            user: "Alice".to_string(),
            ..CompiledHeader::default()
        };
        let horn = MediaBlob {
            kind: waypost_core::MediaType::Wav,
            bytes: b"RIFF".to_vec(),
        };
        let bytes = CompiledCartridge::new(header, script.as_bytes().to_vec(), vec![Some(horn)])
            .encode()
            .unwrap();
        let recorder = Recorder::default();
        let calls = recorder.calls.clone();
        let session = Session::load(
            &bytes,
            "harbour.gwc",
            &LoadConfig::new(),
            Box::new(RonScriptHost::new()),
            Box::new(recorder),
        )?;
        Ok((session, calls))
    }

    fn id(cartridge: &Cartridge, name: &str) -> ObjectId {
        cartridge.find_by_name(name).unwrap()
    }

    fn score(session: &Session) -> Option<Value> {
        session.with_cartridge(|c| c.variable("score").cloned()).unwrap()
    }

    #[test]
    fn test_setup_registers_declarations() {
        let (session, _) = load(HARBOUR).unwrap();
        session
            .with_cartridge(|c| {
                let lamp = c.object(id(c, "Lamp")).unwrap();
                assert_eq!(lamp.container, Container::Object(id(c, "Pier")));
                assert_eq!(c.variable("score"), Some(&Value::Int(0)));

                let ask = c.commands().find(|cmd| cmd.name == "Ask").unwrap();
                assert!(!ask.enabled);
                let take = c.commands().find(|cmd| cmd.name == "Take").unwrap();
                assert_eq!(take.owner, Some(id(c, "Lamp")));

                let riddle = c.object(id(c, "Riddle")).unwrap().as_input().unwrap();
                assert!(matches!(
                    &riddle.kind,
                    InputKind::MultipleChoice(choices) if choices.len() == 2
                ));
            })
            .unwrap();

        // The first media declaration is bound to the first compiled media entry
        let horn = session.with_cartridge(|c| id(c, "Horn")).unwrap();
        assert_eq!(session.media_bytes(horn), Some(&b"RIFF"[..]));
    }

    #[test]
    fn test_play_through() {
        let (session, calls) = load(HARBOUR).unwrap();

        session.request_start().unwrap();
        assert_eq!(
            calls.borrow().as_slice(),
            ["message Welcome", "status ready", "wake 60"]
        );
        calls.borrow_mut().clear();

        let report = session.update(Some(ZonePoint::flat(52.0, 4.0)), t0()).unwrap();
        assert!(report.faults.is_empty());
        assert!(calls.borrow().contains(&"media Horn".to_string()));
        assert_eq!(score(&session), Some(Value::Int(1)));

        let take = session
            .with_cartridge(|c| c.commands().find(|cmd| cmd.name == "Take").map(|cmd| cmd.id))
            .unwrap()
            .unwrap();
        session.invoke_command(take, None).unwrap();
        session
            .with_cartridge(|c| {
                assert_eq!(c.object(id(c, "Lamp")).unwrap().container, Container::Player);
                let task = c.object(id(c, "Find the lamp")).unwrap().as_task().unwrap();
                assert_eq!(task.state, TaskState::Complete);
            })
            .unwrap();

        let request = session.pending_input().unwrap().unwrap();
        session.answer_input(request.id, InputAnswer::Value("LAMP".to_string())).unwrap();
        session
            .with_cartridge(|c| {
                assert_eq!(c.variable("score"), Some(&Value::Int(11)));
                assert_eq!(c.variable("Riddle"), Some(&Value::String("LAMP".to_string())));
                assert!(c.is_complete());
            })
            .unwrap();
        assert!(calls.borrow().contains(&"log INFO answered".to_string()));

        calls.borrow_mut().clear();
        let report = session.update(None, t0() + TimeDelta::seconds(61)).unwrap();
        assert_eq!(report.timer_expiries.len(), 1);
        assert!(calls.borrow().contains(&"dialog The tide turns|Hurry".to_string()));

        session.request_save().unwrap();
        let saved = session.with_cartridge(|c| c.variable("saved").cloned()).unwrap();
        assert_eq!(saved, Some(Value::Bool(true)));
        assert_eq!(calls.borrow().last().map(String::as_str), Some("save"));
    }

    #[test]
    fn test_wrong_answer_runs_only_generic_handler() {
        let (session, calls) = load(HARBOUR).unwrap();
        let take = session
            .with_cartridge(|c| c.commands().find(|cmd| cmd.name == "Take").map(|cmd| cmd.id))
            .unwrap()
            .unwrap();
        session.invoke_command(take, None).unwrap();
        let request = session.pending_input().unwrap().unwrap();
        session.answer_input(request.id, InputAnswer::Value("Moon".to_string())).unwrap();

        assert_eq!(score(&session), Some(Value::Int(0)));
        assert!(!session.with_cartridge(Cartridge::is_complete).unwrap());
        assert!(calls.borrow().contains(&"log INFO answered".to_string()));
    }

    #[test]
    fn test_command_handlers_follow_target() {
        let script = r#"(
            items: [
                (name: "Door", location: Player),
                (name: "Key", location: Player),
                (name: "Rope", location: Player),
            ],
            commands: [
                (
                    name: "Use",
                    text: "Use with",
                    owner: Some("Door"),
                    target: OneOf(["Key", "Rope"]),
                ),
            ],
            variables: {"uses": Int(0)},
            handlers: [
                (
                    on: Command(command: "Use", target: Some("Key")),
                    actions: [SetVariable("door", String("open"))],
                ),
                (
                    on: Command(command: "Use", target: Some("Rope")),
                    actions: [SetVariable("door", String("tied"))],
                ),
                (on: Command(command: "Use"), actions: [Increment("uses", 1)]),
            ],
        )"#;
        let (session, _) = load(script).unwrap();
        let (cmd, key, rope) = session
            .with_cartridge(|c| {
                let cmd = c.commands().find(|cmd| cmd.name == "Use").map(|cmd| cmd.id).unwrap();
                (cmd, id(c, "Key"), id(c, "Rope"))
            })
            .unwrap();
        let door = || session.with_cartridge(|c| c.variable("door").cloned()).unwrap();

        session.invoke_command(cmd, Some(rope)).unwrap();
        assert_eq!(door(), Some(Value::String("tied".to_string())));

        session.invoke_command(cmd, Some(key)).unwrap();
        assert_eq!(door(), Some(Value::String("open".to_string())));

        let uses = session.with_cartridge(|c| c.variable("uses").cloned()).unwrap();
        assert_eq!(uses, Some(Value::Int(2)));
    }

    #[test]
    fn test_command_target_must_be_declared() {
        let script = r#"(
            commands: [(name: "Use", text: "Use", target: Any)],
            handlers: [(on: Command(command: "Use", target: Some("Ghost")), actions: [])],
        )"#;
        assert!(load(script).is_err());
    }

    #[test]
    fn test_invalid_script_fails_load() {
        let script = r#"(handlers: [(on: Start, actions: [PlayMedia("Horn")])])"#;
        match load(script) {
            Err(EngineError::ScriptHostFault { fault, .. }) => {
                assert!(fault.message().contains("Horn"), "{}", fault.message());
            }
            Err(other) => panic!("expected a script host fault, got {}", other),
            Ok(_) => panic!("load should fail"),
        }
    }

    #[test]
    fn test_autostart_timer_runs_after_load() {
        let script = r#"(timers: [(name: "Tide", seconds: 30.0, autostart: true)])"#;
        let (session, calls) = load(script).unwrap();
        assert_eq!(calls.borrow().as_slice(), ["wake 30"]);
        let running = session
            .with_cartridge(|c| {
                let handle = c.object(id(c, "Tide")).unwrap().timer_handle().unwrap();
                c.timers().get(handle).unwrap().is_running()
            })
            .unwrap();
        assert!(running);
    }
}
