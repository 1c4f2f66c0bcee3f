//! Dynamic values for cartridge variables and the script environment

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Content of a cartridge variable or an environment entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Value {
    /// Unset variable
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// Variables by name, in the order they were first set
pub type ValueMap = IndexMap<String, Value>;

impl Value {
    /// The integer held, if any
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
