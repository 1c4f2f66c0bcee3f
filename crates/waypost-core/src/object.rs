//! Object types owned by a cartridge

use crate::geo::{Bearing, Boundary, Distance, ZonePoint};
use crate::timer::TimerHandle;
use crate::zone::ZoneState;
use crate::{CommandId, ObjectId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an object currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Container {
    /// Not placed anywhere (invisible to the player)
    #[default]
    Nowhere,
    /// In the player's inventory
    Player,
    /// Inside a zone or carried by a character
    Object(ObjectId),
}

impl Container {
    /// Get the container object, if any
    pub fn object(&self) -> Option<ObjectId> {
        match self {
            Container::Object(id) => Some(*id),
            _ => None,
        }
    }
}

/// When the contents of a zone are visible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ShowObjects {
    /// Only while the player is inside
    #[default]
    OnEnter,
    /// While the player is inside or in proximity
    OnProximity,
    /// Regardless of the zone state
    Always,
}

/// Progress of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TaskState {
    #[default]
    NotStarted,
    Active,
    Complete,
}

/// Media container types, with their compiled-format type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    Bmp,
    Png,
    Jpg,
    Gif,
    Wav,
    Mp3,
    Fdl,
    Snd,
    Ogg,
    Swf,
    Txt,
    Unknown(i32),
}

impl MediaType {
    /// Map a compiled-format type code
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => MediaType::Bmp,
            2 => MediaType::Png,
            3 => MediaType::Jpg,
            4 => MediaType::Gif,
            17 => MediaType::Wav,
            18 => MediaType::Mp3,
            19 => MediaType::Fdl,
            20 => MediaType::Snd,
            21 => MediaType::Ogg,
            33 => MediaType::Swf,
            49 => MediaType::Txt,
            other => MediaType::Unknown(other),
        }
    }

    /// The compiled-format type code
    pub fn code(&self) -> i32 {
        match self {
            MediaType::Bmp => 1,
            MediaType::Png => 2,
            MediaType::Jpg => 3,
            MediaType::Gif => 4,
            MediaType::Wav => 17,
            MediaType::Mp3 => 18,
            MediaType::Fdl => 19,
            MediaType::Snd => 20,
            MediaType::Ogg => 21,
            MediaType::Swf => 33,
            MediaType::Txt => 49,
            MediaType::Unknown(code) => *code,
        }
    }

    /// Guess the type from a file name's extension
    pub fn from_filename(name: &str) -> Self {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "bmp" => MediaType::Bmp,
            "png" => MediaType::Png,
            "jpg" | "jpeg" => MediaType::Jpg,
            "gif" => MediaType::Gif,
            "wav" => MediaType::Wav,
            "mp3" => MediaType::Mp3,
            "fdl" => MediaType::Fdl,
            "snd" => MediaType::Snd,
            "ogg" => MediaType::Ogg,
            "swf" => MediaType::Swf,
            "txt" => MediaType::Txt,
            _ => MediaType::Unknown(0),
        }
    }

    /// Check if this is audio
    pub fn is_sound(&self) -> bool {
        matches!(
            self,
            MediaType::Wav | MediaType::Mp3 | MediaType::Fdl | MediaType::Snd | MediaType::Ogg
        )
    }
}

/// One file backing a media object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaResource {
    pub filename: String,
    pub kind: MediaType,
}

impl MediaResource {
    /// Create a resource, deriving its type from the file name
    pub fn from_filename(filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let kind = MediaType::from_filename(&filename);
        Self { filename, kind }
    }
}

/// Question format of an input object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum InputKind {
    /// Free text answer
    #[default]
    Text,
    /// One of a fixed list of choices
    MultipleChoice(Vec<String>),
}

/// An item lying in a zone, carried by a character or in the player's inventory
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Item {
    pub locked: bool,
}

/// A character; the player is one too
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Character {
    pub is_player: bool,
}

/// A geofenced region
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub boundary: Boundary,
    /// The zone's own position, used for objects placed in it
    pub original_point: ZonePoint,
    pub show_objects: ShowObjects,
    /// Outer edge of the `Proximity` band, measured from the boundary
    pub proximity_range: Distance,
    /// Outer edge of the `Distant` band; `None` means unlimited
    pub distance_range: Option<Distance>,
    /// Classification from the latest known position
    pub state: ZoneState,
    /// Reason the zone is excluded from evaluation, if any
    pub invalid_geometry: Option<String>,
    /// Activity seen by the evaluator on its last pass
    pub(crate) observed_active: bool,
}

/// A timer object; its clock lives in the timer subsystem
#[derive(Debug, Clone, PartialEq)]
pub struct TimerObject {
    pub handle: TimerHandle,
}

/// A player-visible objective
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Task {
    pub state: TaskState,
    pub parent: Option<ObjectId>,
}

/// Reference to an external image or sound
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Media {
    pub resources: Vec<MediaResource>,
    /// Index into the container's media table, assigned in registration order
    pub asset_index: Option<u16>,
}

/// A question that can be put to the player
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Input {
    pub question: String,
    pub kind: InputKind,
}

/// Kind-specific data of an object
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    Item(Item),
    Character(Character),
    Zone(Zone),
    Timer(TimerObject),
    Task(Task),
    Media(Media),
    Input(Input),
}

impl ObjectKind {
    /// Short name of the kind
    pub fn tag(&self) -> &'static str {
        match self {
            ObjectKind::Item(_) => "item",
            ObjectKind::Character(_) => "character",
            ObjectKind::Zone(_) => "zone",
            ObjectKind::Timer(_) => "timer",
            ObjectKind::Task(_) => "task",
            ObjectKind::Media(_) => "media",
            ObjectKind::Input(_) => "input",
        }
    }
}

/// An object owned by the cartridge
#[derive(Debug, Clone, PartialEq)]
pub struct ZObject {
    pub id: ObjectId,
    pub name: String,
    pub description: String,
    pub visible: bool,
    pub active: bool,
    pub media: Option<ObjectId>,
    pub icon: Option<ObjectId>,
    pub container: Container,
    /// Explicit position; when absent the container's position is used
    pub location: Option<ZonePoint>,
    pub current_distance: Option<Distance>,
    pub current_bearing: Option<Bearing>,
    pub commands: Vec<CommandId>,
    pub kind: ObjectKind,
}

impl ZObject {
    /// Get zone data if this is a zone
    pub fn as_zone(&self) -> Option<&Zone> {
        match &self.kind {
            ObjectKind::Zone(zone) => Some(zone),
            _ => None,
        }
    }

    /// Get task data if this is a task
    pub fn as_task(&self) -> Option<&Task> {
        match &self.kind {
            ObjectKind::Task(task) => Some(task),
            _ => None,
        }
    }

    /// Get media data if this is a media object
    pub fn as_media(&self) -> Option<&Media> {
        match &self.kind {
            ObjectKind::Media(media) => Some(media),
            _ => None,
        }
    }

    /// Get input data if this is an input object
    pub fn as_input(&self) -> Option<&Input> {
        match &self.kind {
            ObjectKind::Input(input) => Some(input),
            _ => None,
        }
    }

    /// Get the timer handle if this is a timer object
    pub fn timer_handle(&self) -> Option<TimerHandle> {
        match &self.kind {
            ObjectKind::Timer(timer) => Some(timer.handle),
            _ => None,
        }
    }

    /// Check if this is an item or character
    pub fn is_placeable(&self) -> bool {
        matches!(self.kind, ObjectKind::Item(_) | ObjectKind::Character(_))
    }

    /// Check if this is the player
    pub fn is_player(&self) -> bool {
        matches!(self.kind, ObjectKind::Character(Character { is_player: true }))
    }
}

impl fmt::Display for ZObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' ({})", self.kind.tag(), self.name, self.id)
    }
}

/// Fields shared by every object declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSpec {
    pub name: String,
    pub description: String,
    pub visible: bool,
    pub active: bool,
    pub media: Option<ObjectId>,
    pub icon: Option<ObjectId>,
    pub container: Container,
    pub location: Option<ZonePoint>,
}

impl ObjectSpec {
    /// A visible, active object with the given name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the container
    pub fn in_container(mut self, container: Container) -> Self {
        self.container = container;
        self
    }

    /// Set visibility
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Set activity
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Set an explicit location
    pub fn at(mut self, location: ZonePoint) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the media shown with the object
    pub fn with_media(mut self, media: ObjectId) -> Self {
        self.media = Some(media);
        self
    }
}

impl Default for ObjectSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            visible: true,
            active: true,
            media: None,
            icon: None,
            container: Container::Nowhere,
            location: None,
        }
    }
}

/// Zone-specific declaration fields
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneSpec {
    pub boundary: Boundary,
    pub original_point: Option<ZonePoint>,
    pub show_objects: ShowObjects,
    pub proximity_range: Distance,
    pub distance_range: Option<Distance>,
}

impl ZoneSpec {
    /// A zone with the given outline and thresholds
    pub fn new(
        boundary: Boundary,
        proximity_range: Distance,
        distance_range: Option<Distance>,
    ) -> Self {
        Self {
            boundary,
            original_point: None,
            show_objects: ShowObjects::default(),
            proximity_range,
            distance_range,
        }
    }

    /// Set when contents are shown
    pub fn showing(mut self, show_objects: ShowObjects) -> Self {
        self.show_objects = show_objects;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_codes() {
        for code in [1, 2, 3, 4, 17, 18, 19, 20, 21, 33, 49, 99] {
            assert_eq!(MediaType::from_code(code).code(), code);
        }
        assert!(MediaType::Mp3.is_sound());
        assert!(!MediaType::Png.is_sound());
    }

    #[test]
    fn test_media_type_from_filename() {
        assert_eq!(MediaType::from_filename("Splash.JPEG"), MediaType::Jpg);
        assert_eq!(MediaType::from_filename("theme.ogg"), MediaType::Ogg);
        assert_eq!(MediaType::from_filename("README"), MediaType::Unknown(0));
    }

    #[test]
    fn test_object_spec_defaults() {
        let spec = ObjectSpec::named("Lamp");
        assert!(spec.visible);
        assert!(spec.active);
        assert_eq!(spec.container, Container::Nowhere);
    }
}
