//! Domain types for Zoondo.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::models::{PlayerId, Position};

/// Normal pieces are `fighters`; losing the `emblem` loses the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardKind {
    #[default]
    Fighters,
    Emblem,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardRef {
    pub tribe: String,
    #[serde(rename = "type")]
    pub kind: CardKind,
    pub slug: String,
}

impl fmt::Display for CardRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tribe, self.slug)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Wildcard {
    #[serde(rename = "*")]
    Star,
}

/// A combat strength, or `*` for a power trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CornerValue {
    Strength(u8),
    Power(Wildcard),
}

impl CornerValue {
    pub const POWER: CornerValue = CornerValue::Power(Wildcard::Star);

    pub fn is_power(self) -> bool {
        matches!(self, CornerValue::Power(_))
    }
}

impl fmt::Display for CornerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CornerValue::Strength(v) => write!(f, "{v}"),
            CornerValue::Power(_) => f.write_str("*"),
        }
    }
}

/// One step of a movement pattern, relative to the card's origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveStep {
    pub dx: i32,
    pub dy: i32,
    #[serde(default)]
    pub jump: bool,
}

/// Candidate paths, each walked from the origin outwards.
pub type MovePattern = Vec<Vec<MoveStep>>;

/// One resolved cell of a path. A `jump` cell is flown over, never landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub x: i32,
    pub y: i32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub jump: bool,
}

impl Step {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

pub type Path = Vec<Step>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDefinition {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: CardKind,
    #[serde(default)]
    pub moves: MovePattern,
    pub corners: [CornerValue; 4],
    /// Display name of the card's power, if it has one.
    #[serde(default)]
    pub power: Option<String>,
    /// Built-in resolver bound to this card at startup.
    #[serde(default)]
    pub resolver: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub player: PlayerId,
    pub x: i32,
    pub y: i32,
    pub card: CardRef,
}

impl Cell {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// The board. At most one cell per coordinate.
#[derive(Debug, Clone)]
pub struct Board {
    size: i32,
    cells: Vec<Cell>,
}

impl Board {
    pub fn new(size: i32) -> Self {
        Self {
            size,
            cells: Vec::new(),
        }
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        (0..self.size).contains(&pos.x) && (0..self.size).contains(&pos.y)
    }

    pub fn at(&self, pos: Position) -> Option<&Cell> {
        self.cells.iter().find(|c| c.x == pos.x && c.y == pos.y)
    }

    pub fn is_empty_at(&self, pos: Position) -> bool {
        self.at(pos).is_none()
    }

    /// Add a cell. Refused when the coordinate is taken or off the board.
    pub fn place(&mut self, cell: Cell) -> bool {
        if !self.in_bounds(cell.position()) || self.at(cell.position()).is_some() {
            return false;
        }
        self.cells.push(cell);
        true
    }

    /// Move the card at `from` onto the empty cell `to`.
    pub fn relocate(&mut self, from: Position, to: Position) -> bool {
        if from == to || !self.in_bounds(to) || self.at(to).is_some() {
            return false;
        }
        match self.cells.iter_mut().find(|c| c.x == from.x && c.y == from.y) {
            Some(cell) => {
                cell.x = to.x;
                cell.y = to.y;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, pos: Position) -> Option<Cell> {
        let index = self.cells.iter().position(|c| c.x == pos.x && c.y == pos.y)?;
        Some(self.cells.remove(index))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Waiting,
    Main,
    Combat,
    Action,
    End,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Waiting => "waiting",
            Phase::Main => "main",
            Phase::Combat => "combat",
            Phase::Action => "action",
            Phase::End => "end",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombatStep {
    Choice,
    Wait, // one corner chosen
    Resolve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombatRole {
    Attacker,
    Defender,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombatOutcome {
    Draw,
    Power,
    Attacker,
    Defender,
}

/// One side of a combat: a value copy of the board cell taken when the
/// combat started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatSide {
    #[serde(flatten)]
    pub cell: Cell,
    pub role: CombatRole,
    /// Path walked by the attacker, ending on the defender's cell.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Path,
    pub corner_index: Option<u8>,
    pub value: Option<CornerValue>,
}

impl CombatSide {
    pub fn new(cell: Cell, role: CombatRole, path: Path) -> Self {
        Self {
            cell,
            role,
            path,
            corner_index: None,
            value: None,
        }
    }

    pub fn player(&self) -> &str {
        &self.cell.player
    }

    pub fn position(&self) -> Position {
        self.cell.position()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatState {
    pub step: CombatStep,
    pub attacker: CombatSide,
    pub defender: CombatSide,
    pub winner: Option<CombatOutcome>,
    pub power_owner: Option<CombatRole>,
}

impl CombatState {
    pub fn sides(&self) -> [&CombatSide; 2] {
        [&self.attacker, &self.defender]
    }
}

/// A power to resolve: `source` owns the power, `target` is the other side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerAction {
    pub source: CombatSide,
    pub target: CombatSide,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOptions {
    /// The player who must answer the prompt.
    pub player: PlayerId,
    pub prompt: String,
    pub cells: Vec<Position>,
}

/// Where an answered prompt is routed: the power that asked for it.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionHandler {
    pub power: PowerAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectCard {
    pub options: SelectOptions,
    #[serde(skip)]
    pub next: Option<SelectionHandler>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WinReason {
    #[default]
    Emblem,
    Forfeit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StackEntry {
    SelectCard(SelectCard),
    Power(PowerAction),
    Win {
        winner: PlayerId,
        #[serde(default)]
        reason: WinReason,
    },
    /// An entry kind pushed by a resolver that the engine does not handle.
    Other { kind: String },
}

impl StackEntry {
    pub fn kind(&self) -> &str {
        match self {
            StackEntry::SelectCard(_) => "select_card",
            StackEntry::Power(_) => "power",
            StackEntry::Win { .. } => "win",
            StackEntry::Other { kind } => kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub count: u32,
    pub active_player: Option<PlayerId>,
    pub phase: Phase,
    pub combat: Option<CombatState>,
    pub action: Option<SelectCard>,
    pub timer: u32,
    pub winner: Option<PlayerId>,
}

impl Turn {
    pub fn new(timer: u32) -> Self {
        Self {
            count: 0,
            active_player: None,
            phase: Phase::Waiting,
            combat: None,
            action: None,
            timer,
            winner: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum EliminationContext {
    Combat { turn: u32 },
    Power { turn: u32, card: String },
}

/// A graveyard record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fallen {
    pub cell: Cell,
    pub context: EliminationContext,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(x: i32, y: i32) -> Cell {
        Cell {
            player: "p1".into(),
            x,
            y,
            card: CardRef {
                tribe: "t".into(),
                kind: CardKind::Fighters,
                slug: "s".into(),
            },
        }
    }

    #[test]
    fn test_board_rejects_stacked_cells() {
        let mut board = Board::new(6);
        assert!(board.place(cell(1, 1)));
        assert!(!board.place(cell(1, 1)));
        assert!(!board.place(cell(6, 0)));
        assert_eq!(board.cells().len(), 1);
    }

    #[test]
    fn test_relocate_needs_empty_destination() {
        let mut board = Board::new(6);
        board.place(cell(0, 0));
        board.place(cell(0, 1));

        assert!(!board.relocate(Position::new(0, 0), Position::new(0, 1)));
        assert!(board.relocate(Position::new(0, 0), Position::new(1, 1)));
        assert!(board.at(Position::new(0, 0)).is_none());
        assert!(board.at(Position::new(1, 1)).is_some());
        assert!(!board.relocate(Position::new(5, 5), Position::new(4, 4)));
    }

    #[test]
    fn test_corner_value_serde() {
        let corners: Vec<CornerValue> = serde_json::from_str(r#"[3, "*", 0, 9]"#).unwrap();
        assert_eq!(corners[0], CornerValue::Strength(3));
        assert!(corners[1].is_power());
        assert_eq!(serde_json::to_string(&corners).unwrap(), r#"[3,"*",0,9]"#);
    }

    #[test]
    fn test_stack_entry_tagging() {
        let win = StackEntry::Win {
            winner: "p2".into(),
            reason: WinReason::Emblem,
        };
        let json = serde_json::to_value(&win).unwrap();
        assert_eq!(json["type"], "win");
        assert_eq!(json["winner"], "p2");
    }
}
