//! Card catalog and move geometry: the read-only oracles the rules consult.
//!
//! Tribes are described in TOML: a display name, a deployment disposition
//! (rows of card slugs, nearest-to-owner row last) and the card definitions.

use std::collections::BTreeMap;
use std::path::Path as FsPath;

use serde::Deserialize;

use crate::engine::error::ConfigError;
use crate::engine::models::Position;

use super::types::{CardDefinition, CardRef, MovePattern, Path, Step};

pub trait Catalog: Send + Sync {
    fn tribe(&self, tribe_id: &str) -> Option<&Tribe>;

    fn card(&self, card: &CardRef) -> Option<&CardDefinition> {
        self.tribe(&card.tribe)?.cards.get(&card.slug)
    }
}

pub trait MoveGeometry: Send + Sync {
    /// Candidate paths for a card at `origin`. `flip` mirrors the pattern for
    /// the second player so both players move "forward" from their side.
    fn resolve_moves(&self, origin: Position, pattern: &MovePattern, flip: bool) -> Vec<Path>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tribe {
    pub name: String,
    pub disposition: Vec<Vec<String>>,
    #[serde(default)]
    pub cards: BTreeMap<String, CardDefinition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TribeCatalog {
    #[serde(default)]
    pub tribes: BTreeMap<String, Tribe>,
}

impl TribeCatalog {
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn load(path: &FsPath) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!(
            path = %path.display(),
            tribes = catalog.tribes.len(),
            "loaded tribe catalog"
        );
        Ok(catalog)
    }

    pub fn tribe_ids(&self) -> Vec<String> {
        self.tribes.keys().cloned().collect()
    }
}

impl Catalog for TribeCatalog {
    fn tribe(&self, tribe_id: &str) -> Option<&Tribe> {
        self.tribes.get(tribe_id)
    }
}

/// Patterns are offsets from the origin; flipping negates them. A path ends
/// at the first step that leaves the board.
#[derive(Debug, Clone, Copy)]
pub struct OffsetGeometry {
    pub board_size: i32,
}

impl OffsetGeometry {
    pub fn new(board_size: i32) -> Self {
        Self { board_size }
    }

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        (0..self.board_size).contains(&x) && (0..self.board_size).contains(&y)
    }
}

impl MoveGeometry for OffsetGeometry {
    fn resolve_moves(&self, origin: Position, pattern: &MovePattern, flip: bool) -> Vec<Path> {
        let sign = if flip { -1 } else { 1 };
        pattern
            .iter()
            .map(|steps| {
                steps
                    .iter()
                    .map(|s| Step {
                        x: origin.x + sign * s.dx,
                        y: origin.y + sign * s.dy,
                        jump: s.jump,
                    })
                    .take_while(|s| self.in_bounds(s.x, s.y))
                    .collect::<Path>()
            })
            .filter(|path| !path.is_empty())
            .collect()
    }
}
