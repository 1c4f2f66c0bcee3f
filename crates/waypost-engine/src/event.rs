//! Data passed between the engine and the host's user interface

use serde::{Deserialize, Serialize};
use waypost_core::{ObjectId, ZonePoint};

/// One dialog page or message box
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub media: Option<ObjectId>,
    /// Button captions; empty means the host's default button
    pub buttons: Vec<String>,
}

impl Message {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_media(mut self, media: ObjectId) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_buttons<I, S>(mut self, buttons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.buttons = buttons.into_iter().map(Into::into).collect();
        self
    }
}

/// Something the player did in the host's interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UiEvent {
    /// The last page of a dialog was dismissed
    DialogClosed,
    /// A message box was closed, by the button at this index or without one
    MessageClosed { button: Option<usize> },
}

/// Where the host should guide the player
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationTarget {
    pub zone: Option<ObjectId>,
    pub name: String,
    pub point: ZonePoint,
}
