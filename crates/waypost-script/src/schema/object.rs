//! Object declarations

use serde::{Deserialize, Serialize};
use waypost_core::{Boundary, Distance, ShowObjects, TaskState, TimerKind, ZonePoint};

fn default_true() -> bool {
    true
}

fn point((latitude, longitude): (f64, f64)) -> ZonePoint {
    ZonePoint::flat(latitude, longitude)
}

/// An image or sound, by archive file name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaDef {
    pub name: String,
    /// Candidate files; the first one is bound to the container data
    pub files: Vec<String>,
}

/// Zone outline, as latitude/longitude pairs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ShapeDef {
    Circle { center: (f64, f64), radius: f64 },
    Polygon(Vec<(f64, f64)>),
}

impl ShapeDef {
    pub fn boundary(&self) -> Boundary {
        match self {
            ShapeDef::Circle { center, radius } => Boundary::Circle {
                center: point(*center),
                radius: Distance::meters(*radius),
            },
            ShapeDef::Polygon(points) => {
                Boundary::Polygon(points.iter().copied().map(point).collect())
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub shape: ShapeDef,
    /// Width of the proximity band in meters
    pub proximity: f64,
    /// Outer edge of the distant band in meters; absent means unlimited
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub show_objects: ShowObjects,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub media: Option<String>,
}

/// Where a placeable object starts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum LocationDef {
    #[default]
    Nowhere,
    Player,
    /// Inside the named zone, item or character
    In(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: LocationDef,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub media: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: LocationDef,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub media: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub state: TaskState,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerDef {
    pub name: String,
    #[serde(default)]
    pub kind: TimerKind,
    pub seconds: f64,
    /// Start the timer as soon as the cartridge is set up
    #[serde(default)]
    pub autostart: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputDef {
    pub name: String,
    pub question: String,
    /// Fixed answers; empty means free text
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default)]
    pub media: Option<String>,
}

/// Which objects a command is used with
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum TargetDef {
    #[default]
    None,
    Any,
    OneOf(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDef {
    /// Unique command name, used by `Command` triggers
    pub name: String,
    pub text: String,
    /// Object offering the command; absent for cartridge commands
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub target: TargetDef,
    #[serde(default = "default_true")]
    pub enabled: bool,
}
