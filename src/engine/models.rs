//! Core engine data types shared by the rules engine and the session layer.

use serde::{Deserialize, Serialize};

pub type PlayerId = String;
pub type RoomId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub player_id: PlayerId,
    pub display_name: String,
    pub tribe: String,
    /// The first player owns the un-mirrored orientation of the board.
    #[serde(default)]
    pub is_first_player: bool,
}

impl Player {
    pub fn new(player_id: &str, display_name: &str, tribe: &str) -> Self {
        Self {
            player_id: player_id.into(),
            display_name: display_name.into(),
            tribe: tribe.into(),
            is_first_player: false,
        }
    }
}

/// A board coordinate. Signed so relative offsets can be applied without casts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Point reflection across the centre of a `size`×`size` board.
    pub fn mirrored(self, size: i32) -> Self {
        Self {
            x: size - 1 - self.x,
            y: size - 1 - self.y,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Who a system notice is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    Room,
    Player(PlayerId),
}

/// One item pushed to a connected client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Outbound {
    State(serde_json::Value),
    Message(String),
}
