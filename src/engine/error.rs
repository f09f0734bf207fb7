//! Error types for the rules engine.

use thiserror::Error;

use crate::engine::models::{PlayerId, Position};

/// Reasons an inbound request is rejected. Rejections never mutate state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("player {0} is not part of this game")]
    NotParticipant(PlayerId),

    #[error("it is not {0}'s turn")]
    NotActivePlayer(PlayerId),

    #[error("cannot {action} during the {phase} phase")]
    WrongPhase { action: &'static str, phase: String },

    #[error("illegal move from {from} to {to}")]
    IllegalMove { from: Position, to: Position },

    #[error("no card at {0}")]
    NoCardAt(Position),

    #[error("card at {0} belongs to the opponent")]
    NotYourCard(Position),

    #[error("corner index {0} is out of range")]
    InvalidCorner(u32),

    #[error("{0} has already chosen a corner")]
    CornerAlreadyChosen(PlayerId),

    #[error("the game already has two players")]
    GameFull,

    #[error("player {0} has already joined")]
    AlreadyJoined(PlayerId),

    #[error("the game is over")]
    GameOver,

    #[error("unknown tribe: {0}")]
    UnknownTribe(String),

    #[error("unknown card: {0}")]
    UnknownCard(String),

    #[error("invalid disposition for tribe {tribe}: {reason}")]
    InvalidDisposition { tribe: String, reason: String },

    #[error("{0} is not one of the offered choices")]
    InvalidSelection(Position),

    #[error("{0} is not the player being prompted")]
    NotPrompted(PlayerId),
}

pub type Result<T> = std::result::Result<T, GameError>;

/// Failures while loading settings or the tribe catalog.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
