//! Player commands attached to objects

use crate::{CommandId, ObjectId};
use serde::{Deserialize, Serialize};

/// What a command is used with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum CommandTarget {
    /// Acts on its owner alone
    #[default]
    None,
    /// Needs a second object, taken from `allowed` or from any object when `any` is set
    With { any: bool, allowed: Vec<ObjectId> },
}

impl CommandTarget {
    /// Check whether `target` is acceptable
    pub fn accepts(&self, target: Option<ObjectId>) -> bool {
        match (self, target) {
            (CommandTarget::None, None) => true,
            (CommandTarget::None, Some(_)) => false,
            (CommandTarget::With { .. }, None) => false,
            (CommandTarget::With { any, allowed }, Some(id)) => *any || allowed.contains(&id),
        }
    }

    /// Check if the command needs a second object
    pub fn needs_target(&self) -> bool {
        matches!(self, CommandTarget::With { .. })
    }
}

/// A command button offered to the player
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub id: CommandId,
    /// The object offering the command; `None` for cartridge-level commands
    pub owner: Option<ObjectId>,
    pub name: String,
    pub text: String,
    pub enabled: bool,
    pub visible: bool,
    pub target: CommandTarget,
    /// Shown when no acceptable target is visible
    pub empty_target_list_text: String,
}

/// Declaration of a command
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub name: String,
    pub text: String,
    pub enabled: bool,
    pub visible: bool,
    pub target: CommandTarget,
    pub empty_target_list_text: String,
}

impl CommandSpec {
    /// An enabled, visible command without a target
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            enabled: true,
            visible: true,
            target: CommandTarget::None,
            empty_target_list_text: "Nothing available".to_string(),
        }
    }

    /// Set the target rule
    pub fn with_target(mut self, target: CommandTarget) -> Self {
        self.target = target;
        self
    }

    /// Set whether the command starts enabled
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_rules() {
        assert!(CommandTarget::None.accepts(None));
        assert!(!CommandTarget::None.accepts(Some(ObjectId::new(1))));

        let with = CommandTarget::With {
            any: false,
            allowed: vec![ObjectId::new(2)],
        };
        assert!(with.needs_target());
        assert!(with.accepts(Some(ObjectId::new(2))));
        assert!(!with.accepts(Some(ObjectId::new(3))));
        assert!(!with.accepts(None));

        let any = CommandTarget::With {
            any: true,
            allowed: Vec::new(),
        };
        assert!(any.accepts(Some(ObjectId::new(9))));
    }
}
