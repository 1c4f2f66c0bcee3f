//! Handlers: what happens when the engine reports an event

use super::object::LocationDef;
use serde::{Deserialize, Serialize};
use waypost_core::{TaskState, Value, ZoneState};
use waypost_engine::{LogLevel, Screen};

/// Kind of name a definition refers to
pub(crate) type Reference<'a> = (&'static str, &'a str);

/// Event a handler reacts to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Trigger {
    Start,
    Save,
    /// The player's position entered a state of the zone
    Zone { zone: String, state: ZoneState },
    ZoneActivated { zone: String, active: bool },
    /// A timer object expired
    Timer(String),
    /// A command was used, optionally only with a given target object
    Command {
        command: String,
        #[serde(default)]
        target: Option<String>,
    },
    /// An input was answered, optionally with a specific answer (case-insensitive)
    Input {
        input: String,
        #[serde(default)]
        answer: Option<String>,
    },
    InputCancelled(String),
    /// A message box was closed, optionally by a specific button
    MessageClosed {
        #[serde(default)]
        button: Option<usize>,
    },
    DialogClosed,
}

impl Trigger {
    pub(crate) fn references(&self) -> Vec<Reference<'_>> {
        match self {
            Trigger::Zone { zone, .. } | Trigger::ZoneActivated { zone, .. } => {
                vec![("zone", zone.as_str())]
            }
            Trigger::Timer(timer) => vec![("timer", timer.as_str())],
            Trigger::Command { command, target } => {
                let mut refs = vec![("command", command.as_str())];
                refs.extend(target.as_deref().map(|t| ("object", t)));
                refs
            }
            Trigger::Input { input, .. } | Trigger::InputCancelled(input) => {
                vec![("input", input.as_str())]
            }
            Trigger::Start
            | Trigger::Save
            | Trigger::MessageClosed { .. }
            | Trigger::DialogClosed => Vec::new(),
        }
    }
}

/// One dialog page or message box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDef {
    pub text: String,
    #[serde(default)]
    pub media: Option<String>,
    #[serde(default)]
    pub buttons: Vec<String>,
}

fn message_media(message: &MessageDef) -> Option<Reference<'_>> {
    message.media.as_deref().map(|name| ("media", name))
}

/// A step run by a handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    SetVisible(String, bool),
    SetActive(String, bool),
    SetDescription(String, String),
    MoveTo(String, LocationDef),
    SetLocked(String, bool),
    SetTaskState(String, TaskState),
    SetCommandEnabled(String, bool),
    SetVariable(String, Value),
    /// Add to an integer variable, treating a missing one as zero
    Increment(String, i64),
    StartTimer(String),
    StopTimer(String),
    ResetTimer(String),
    ShowMessage(MessageDef),
    ShowDialog(Vec<MessageDef>),
    RequestInput(String),
    PlayMedia(String),
    StopAudio,
    SetStatus(String),
    ShowScreen {
        screen: Screen,
        #[serde(default)]
        item: Option<String>,
    },
    Log(LogLevel, String),
    Alert,
    NavigateTo(String),
    HostCommand {
        command: String,
        #[serde(default)]
        argument: Option<String>,
    },
    Complete,
    /// Run `then` when the variable equals `value`, `otherwise` when not
    If {
        variable: String,
        equals: Value,
        then: Vec<Action>,
        #[serde(default)]
        otherwise: Vec<Action>,
    },
}

impl Action {
    pub(crate) fn references(&self) -> Vec<Reference<'_>> {
        match self {
            Action::SetVisible(object, _)
            | Action::SetActive(object, _)
            | Action::SetDescription(object, _)
            | Action::SetLocked(object, _) => vec![("object", object.as_str())],
            Action::MoveTo(object, location) => {
                let mut refs = vec![("object", object.as_str())];
                if let LocationDef::In(container) = location {
                    refs.push(("object", container.as_str()));
                }
                refs
            }
            Action::SetTaskState(task, _) => vec![("task", task.as_str())],
            Action::SetCommandEnabled(command, _) => vec![("command", command.as_str())],
            Action::StartTimer(timer) | Action::StopTimer(timer) | Action::ResetTimer(timer) => {
                vec![("timer", timer.as_str())]
            }
            Action::ShowMessage(message) => message_media(message).into_iter().collect(),
            Action::ShowDialog(pages) => pages.iter().filter_map(message_media).collect(),
            Action::RequestInput(input) => vec![("input", input.as_str())],
            Action::PlayMedia(media) => vec![("media", media.as_str())],
            Action::ShowScreen { item, .. } => {
                item.as_deref().map(|i| ("object", i)).into_iter().collect()
            }
            Action::NavigateTo(zone) => vec![("zone", zone.as_str())],
            Action::HostCommand { argument, .. } => {
                argument.as_deref().map(|z| ("zone", z)).into_iter().collect()
            }
            Action::If { then, otherwise, .. } => {
                then.iter().chain(otherwise).flat_map(Action::references).collect()
            }
            Action::SetVariable(..)
            | Action::Increment(..)
            | Action::StopAudio
            | Action::SetStatus(_)
            | Action::Log(..)
            | Action::Alert
            | Action::Complete => Vec::new(),
        }
    }
}

/// A trigger with the actions it runs, in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerDef {
    pub on: Trigger,
    pub actions: Vec<Action>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_handler() {
        let handler: HandlerDef = ron::from_str(
            r#"(
                on: Zone(zone: "Pier", state: Inside),
                actions: [
                    ShowMessage((text: "Welcome", media: Some("Horn"))),
                    SetVariable("visited", Bool(true)),
                    Log(Info, "entered"),
                    If(variable: "visited", equals: Bool(true), then: [StartTimer("Tide")]),
                ],
            )"#,
        )
        .unwrap();

        assert_eq!(
            handler.on,
            Trigger::Zone {
                zone: "Pier".to_string(),
                state: ZoneState::Inside,
            }
        );
        assert_eq!(handler.actions.len(), 4);
        let refs: Vec<_> = handler.actions.iter().flat_map(Action::references).collect();
        assert_eq!(refs, vec![("media", "Horn"), ("timer", "Tide")]);
    }

    #[test]
    fn test_input_trigger_answer_optional() {
        let trigger: Trigger = ron::from_str(r#"Input(input: "Riddle")"#).unwrap();
        assert_eq!(
            trigger,
            Trigger::Input {
                input: "Riddle".to_string(),
                answer: None,
            }
        );
        assert_eq!(trigger.references(), vec![("input", "Riddle")]);
    }
}
