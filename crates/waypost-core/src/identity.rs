//! Identity types for cartridge objects and commands

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an object owned by the cartridge
///
/// Ids are handed out in registration order and never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// Create a new object ID
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object:{}", self.0)
    }
}

/// Identifier of a command attached to an object (or to the cartridge itself)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommandId(pub u32);

impl CommandId {
    /// Create a new command ID
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "command:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id() {
        let id = ObjectId::new(7);
        assert_eq!(id.raw(), 7);
        assert_eq!(format!("{}", id), "object:7");
    }

    #[test]
    fn test_command_id() {
        let id = CommandId::new(3);
        assert_eq!(id.raw(), 3);
        assert_eq!(format!("{}", id), "command:3");
    }

    #[test]
    fn test_ids_order_by_registration() {
        assert!(ObjectId::new(1) < ObjectId::new(2));
    }
}
