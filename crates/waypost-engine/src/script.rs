//! Inward interface: the pluggable interpreter of a cartridge's script

use crate::cycle::Cycle;
use crate::event::UiEvent;
use crate::input::{InputAnswer, InputRequest};
use thiserror::Error;
use waypost_core::{CommandId, ObjectId, TimerExpiry, ValueMap, ZoneEvent};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure reported by a script host callback
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ScriptFault {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl ScriptFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<crate::Error> for ScriptFault {
    fn from(err: crate::Error) -> Self {
        Self::with_source(err.to_string(), err)
    }
}

impl From<waypost_core::Error> for ScriptFault {
    fn from(err: waypost_core::Error) -> Self {
        Self::with_source(err.to_string(), err)
    }
}

/// An interpreter for cartridge scripts
///
/// `setup` runs once, inside the load cycle, and registers the cartridge's
/// objects from the script payload. Every other callback reacts to one
/// event; all cartridge changes go through the `Cycle` it receives.
pub trait ScriptHost {
    fn setup(
        &mut self,
        payload: &[u8],
        env: &ValueMap,
        cycle: &mut Cycle<'_>,
    ) -> Result<(), ScriptFault>;

    fn on_start(&mut self, _cycle: &mut Cycle<'_>) -> Result<(), ScriptFault> {
        Ok(())
    }

    fn on_timer(
        &mut self,
        _expiry: &TimerExpiry,
        _cycle: &mut Cycle<'_>,
    ) -> Result<(), ScriptFault> {
        Ok(())
    }

    fn on_zone(&mut self, _event: &ZoneEvent, _cycle: &mut Cycle<'_>) -> Result<(), ScriptFault> {
        Ok(())
    }

    fn on_command(
        &mut self,
        _command: CommandId,
        _target: Option<ObjectId>,
        _cycle: &mut Cycle<'_>,
    ) -> Result<(), ScriptFault> {
        Ok(())
    }

    fn on_input(
        &mut self,
        _request: &InputRequest,
        _answer: &InputAnswer,
        _cycle: &mut Cycle<'_>,
    ) -> Result<(), ScriptFault> {
        Ok(())
    }

    fn on_ui_event(&mut self, _event: &UiEvent, _cycle: &mut Cycle<'_>) -> Result<(), ScriptFault> {
        Ok(())
    }

    /// Called before the host is asked to save
    fn on_save(&mut self, _cycle: &mut Cycle<'_>) -> Result<(), ScriptFault> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_fault_keeps_source() {
        let fault = ScriptFault::from(waypost_core::Error::MutationOutsideCycle);
        assert_eq!(fault.message(), "Mutation attempted while no dispatch cycle is open");
        assert!(fault.source().is_some());
        assert!(ScriptFault::new("boom").source().is_none());
    }
}
