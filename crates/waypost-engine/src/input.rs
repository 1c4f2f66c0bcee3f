//! Questions put to the player
//!
//! At most one input request is pending per session. It is resolved exactly
//! once, by an answer or a cancellation.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use waypost_core::{InputKind, ObjectId, ZObject};

/// Identifier of one input request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InputRequestId(pub u64);

impl fmt::Display for InputRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "input:{}", self.0)
    }
}

/// Lifecycle of an input request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputState {
    Pending,
    Answered,
    Cancelled,
}

/// A question shown to the player
#[derive(Debug, Clone, PartialEq)]
pub struct InputRequest {
    pub id: InputRequestId,
    /// The input object asking the question
    pub input: ObjectId,
    pub question: String,
    pub kind: InputKind,
    pub media: Option<ObjectId>,
}

/// The player's response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputAnswer {
    Value(String),
    Cancelled,
}

impl InputAnswer {
    fn state(&self) -> InputState {
        match self {
            InputAnswer::Value(_) => InputState::Answered,
            InputAnswer::Cancelled => InputState::Cancelled,
        }
    }
}

/// The session's single input slot and the outcome of past requests
#[derive(Debug, Default)]
pub(crate) struct InputSlot {
    pending: Option<InputRequest>,
    resolved: IndexMap<InputRequestId, InputState>,
    next_id: u64,
}

impl InputSlot {
    pub(crate) fn pending(&self) -> Option<&InputRequest> {
        self.pending.as_ref()
    }

    /// Open a request for an input object
    pub(crate) fn open(&mut self, input: &ZObject) -> Result<InputRequest> {
        if let Some(pending) = &self.pending {
            return Err(Error::InputAlreadyPending(pending.id));
        }
        let data = input.as_input().ok_or(waypost_core::Error::WrongKind {
            id: input.id,
            expected: "input",
            got: input.kind.tag(),
        })?;
        self.next_id += 1;
        let request = InputRequest {
            id: InputRequestId(self.next_id),
            input: input.id,
            question: data.question.clone(),
            kind: data.kind.clone(),
            media: input.media,
        };
        self.pending = Some(request.clone());
        Ok(request)
    }

    /// Close the pending request with the given answer
    pub(crate) fn resolve(
        &mut self,
        id: InputRequestId,
        answer: &InputAnswer,
    ) -> Result<InputRequest> {
        match self.pending.take() {
            Some(request) if request.id == id => {
                self.resolved.insert(id, answer.state());
                Ok(request)
            }
            other => {
                self.pending = other;
                Err(Error::NoPendingInput(id))
            }
        }
    }

    pub(crate) fn state(&self, id: InputRequestId) -> Option<InputState> {
        match &self.pending {
            Some(request) if request.id == id => Some(InputState::Pending),
            _ => self.resolved.get(&id).copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypost_core::{Cartridge, CartridgeMeta, ObjectSpec};

    fn question() -> (Cartridge, ObjectId) {
        let mut cartridge = Cartridge::new(CartridgeMeta::default());
        cartridge.begin_cycle().unwrap();
        let id = cartridge
            .register_input(ObjectSpec::named("Riddle"), "What has keys?", InputKind::Text)
            .unwrap();
        cartridge.end_cycle();
        (cartridge, id)
    }

    #[test]
    fn test_single_pending_request() {
        let (cartridge, id) = question();
        let input = cartridge.object(id).unwrap();
        let mut slot = InputSlot::default();

        let request = slot.open(input).unwrap();
        assert_eq!(request.question, "What has keys?");
        assert_eq!(slot.state(request.id), Some(InputState::Pending));
        assert!(matches!(slot.open(input), Err(Error::InputAlreadyPending(p)) if p == request.id));
    }

    #[test]
    fn test_resolved_once() {
        let (cartridge, id) = question();
        let mut slot = InputSlot::default();
        let request = slot.open(cartridge.object(id).unwrap()).unwrap();

        let answer = InputAnswer::Value("piano".to_string());
        assert_eq!(slot.resolve(request.id, &answer).unwrap().input, id);
        assert_eq!(slot.state(request.id), Some(InputState::Answered));
        assert!(slot.pending().is_none());
        assert!(matches!(slot.resolve(request.id, &answer), Err(Error::NoPendingInput(_))));
    }

    #[test]
    fn test_wrong_id_keeps_pending() {
        let (cartridge, id) = question();
        let mut slot = InputSlot::default();
        let request = slot.open(cartridge.object(id).unwrap()).unwrap();

        assert!(slot.resolve(InputRequestId(99), &InputAnswer::Cancelled).is_err());
        assert_eq!(slot.pending().map(|r| r.id), Some(request.id));
        slot.resolve(request.id, &InputAnswer::Cancelled).unwrap();
        assert_eq!(slot.state(request.id), Some(InputState::Cancelled));
    }

    #[test]
    fn test_non_input_object_rejected() {
        let mut cartridge = Cartridge::new(CartridgeMeta::default());
        cartridge.begin_cycle().unwrap();
        let item = cartridge.register_item(ObjectSpec::named("Key")).unwrap();
        cartridge.end_cycle();

        let mut slot = InputSlot::default();
        let err = slot.open(cartridge.object(item).unwrap()).unwrap_err();
        assert!(matches!(err, Error::Core(waypost_core::Error::WrongKind { .. })));
    }
}
