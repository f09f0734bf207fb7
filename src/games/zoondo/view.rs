//! Per-player projection of the game state.
//!
//! A viewer sees the full identity of their own cards only. Opponent cards
//! on the board are reduced to their tribe, and so are the opponent's combat
//! side and its corner value until the combat is resolved.

use serde::{Deserialize, Serialize};

use crate::engine::models::{Player, PlayerId, Position};

use super::game::Game;
use super::types::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub turn: TurnView,
    pub player: Player,
    pub opponent: Option<Player>,
    pub board: Vec<CellView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnView {
    pub count: u32,
    pub active_player: Option<Player>,
    pub phase: Phase,
    pub combat: Option<CombatView>,
    pub action: Option<ActionView>,
    pub timer: u32,
    pub winner: Option<Player>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardView {
    pub tribe: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<CardKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

impl CardView {
    fn full(card: &CardRef) -> Self {
        Self {
            tribe: card.tribe.clone(),
            kind: Some(card.kind),
            slug: Some(card.slug.clone()),
        }
    }

    fn tribe_only(card: &CardRef) -> Self {
        Self {
            tribe: card.tribe.clone(),
            kind: None,
            slug: None,
        }
    }

    pub fn is_redacted(&self) -> bool {
        self.kind.is_none() && self.slug.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellView {
    pub player: PlayerId,
    pub x: i32,
    pub y: i32,
    pub card: CardView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideView {
    pub player: PlayerId,
    pub x: i32,
    pub y: i32,
    pub card: CardView,
    pub role: CombatRole,
    pub corner_index: Option<u8>,
    pub value: Option<CornerValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatView {
    pub step: CombatStep,
    pub attacker: SideView,
    pub defender: SideView,
    pub winner: Option<CombatOutcome>,
    pub power_owner: Option<CombatRole>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionsView {
    pub player: Option<Player>,
    pub prompt: String,
    pub cells: Vec<Position>,
}

/// A pending prompt as the client sees it: no handler, the prompted player
/// resolved to their record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionView {
    #[serde(rename = "type")]
    pub kind: String,
    pub options: OptionsView,
}

impl Game {
    /// The state as `viewer` may see it. `None` for non-participants.
    pub fn player_view(&self, viewer: &str) -> Option<PlayerView> {
        let player = self.player(viewer)?.clone();
        let opponent = self.opponent_of(viewer).cloned();

        let board = self
            .board
            .cells()
            .iter()
            .map(|cell| CellView {
                player: cell.player.clone(),
                x: cell.x,
                y: cell.y,
                card: card_for(viewer, &cell.player, &cell.card),
            })
            .collect();

        let combat = self.turn.combat.as_ref().map(|combat| {
            let hidden = matches!(combat.step, CombatStep::Choice | CombatStep::Wait);
            CombatView {
                step: combat.step,
                attacker: side_view(viewer, &combat.attacker, hidden),
                defender: side_view(viewer, &combat.defender, hidden),
                winner: combat.winner,
                power_owner: combat.power_owner,
            }
        });

        let action = self.turn.action.as_ref().map(|select| ActionView {
            kind: "select_card".into(),
            options: OptionsView {
                player: self.player(&select.options.player).cloned(),
                prompt: select.options.prompt.clone(),
                cells: select.options.cells.clone(),
            },
        });

        let resolve = |id: &Option<PlayerId>| id.as_deref().and_then(|id| self.player(id)).cloned();
        Some(PlayerView {
            turn: TurnView {
                count: self.turn.count,
                active_player: resolve(&self.turn.active_player),
                phase: self.turn.phase,
                combat,
                action,
                timer: self.turn.timer,
                winner: resolve(&self.turn.winner),
            },
            player,
            opponent,
            board,
        })
    }

    /// Push each participant their own view. Players without a live channel
    /// are skipped.
    pub(crate) fn send_state(&self) {
        for player in &self.players {
            self.send_state_to(&player.player_id);
        }
    }

    pub fn send_state_to(&self, player_id: &str) {
        let Some(view) = self.player_view(player_id) else {
            return;
        };
        match serde_json::to_value(&view) {
            Ok(payload) => {
                if !self.delivery.send_state(player_id, payload) {
                    tracing::trace!(room = %self.room, player = player_id, "no channel, state skipped");
                }
            }
            Err(e) => {
                tracing::warn!(room = %self.room, player = player_id, error = %e, "failed to serialize state")
            }
        }
    }
}

fn card_for(viewer: &str, owner: &str, card: &CardRef) -> CardView {
    if viewer == owner {
        CardView::full(card)
    } else {
        CardView::tribe_only(card)
    }
}

fn side_view(viewer: &str, side: &CombatSide, hidden: bool) -> SideView {
    let conceal = hidden && side.player() != viewer;
    SideView {
        player: side.cell.player.clone(),
        x: side.cell.x,
        y: side.cell.y,
        card: if conceal {
            CardView::tribe_only(&side.cell.card)
        } else {
            CardView::full(&side.cell.card)
        },
        role: side.role,
        corner_index: side.corner_index,
        value: if conceal { None } else { side.value },
    }
}
