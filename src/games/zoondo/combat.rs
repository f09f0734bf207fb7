//! Combat: corner picks, resolution and eliminations.

use std::time::Duration;

use rand::Rng;

use crate::engine::error::{GameError, Result};
use crate::engine::models::{Audience, Position};

use super::game::Game;
use super::types::*;

/// Corner pairs: a pick selects the pair, the draw selects the member.
const CORNER_PAIRS: [[u8; 2]; 2] = [[0, 2], [1, 3]];

/// What a corner pick led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CornerOutcome {
    /// The other player still has to pick.
    Waiting,
    /// The combat is resolved; drain the stack after `resume_after`.
    Resolved { resume_after: Duration },
}

impl Game {
    pub(crate) fn enter_combat(&mut self, attacker: Cell, defender: Cell, path: Path) {
        tracing::info!(
            room = %self.room,
            attacker = %attacker.position(),
            defender = %defender.position(),
            "combat started"
        );
        self.turn.phase = Phase::Combat;
        self.turn.combat = Some(CombatState {
            step: CombatStep::Choice,
            attacker: CombatSide::new(attacker, CombatRole::Attacker, path),
            defender: CombatSide::new(defender, CombatRole::Defender, Vec::new()),
            winner: None,
            power_owner: None,
        });
        self.notify(&Audience::Room, "**Combat** - a combat begins.");
        self.send_state();
    }

    /// A player's corner pick. It sets the corner of the side that player
    /// does not own, drawn at random from the pair containing `corner_index`.
    pub fn choose_corner(&mut self, player_id: &str, corner_index: u32) -> Result<CornerOutcome> {
        self.check_turn(player_id, Phase::Combat, "choose a corner")
            .or_else(|e| self.reject(player_id, e))?;
        if corner_index > 3 {
            return self.reject(player_id, GameError::InvalidCorner(corner_index));
        }

        let combat = match self.turn.combat.as_ref() {
            Some(combat) if combat.step != CombatStep::Resolve => combat,
            _ => {
                let error = GameError::WrongPhase {
                    action: "choose a corner",
                    phase: "combat resolution".into(),
                };
                return self.reject(player_id, error);
            }
        };
        let picked_for: Vec<&CombatSide> = combat
            .sides()
            .into_iter()
            .filter(|side| side.player() != player_id)
            .collect();
        if picked_for.iter().any(|side| side.value.is_some()) {
            return self.reject(player_id, GameError::CornerAlreadyChosen(player_id.to_string()));
        }

        let pair = CORNER_PAIRS[(corner_index % 2) as usize];
        let mut draws = Vec::with_capacity(picked_for.len());
        for side in picked_for {
            let Some(definition) = self.catalog.card(&side.cell.card) else {
                return self.reject(player_id, GameError::UnknownCard(side.cell.card.to_string()));
            };
            let corner = pair[self.rng.gen_range(0..pair.len())];
            draws.push((side.role, corner, definition.corners[corner as usize]));
        }

        let Some(combat) = self.turn.combat.as_mut() else {
            return Ok(CornerOutcome::Waiting);
        };
        for (role, corner, value) in draws {
            let side = match role {
                CombatRole::Attacker => &mut combat.attacker,
                CombatRole::Defender => &mut combat.defender,
            };
            side.corner_index = Some(corner);
            side.value = Some(value);
        }

        if combat.sides().iter().all(|side| side.value.is_some()) {
            combat.step = CombatStep::Resolve;
            self.resolve_combat();
            Ok(CornerOutcome::Resolved {
                resume_after: self.settings.combat_delay(),
            })
        } else {
            combat.step = CombatStep::Wait;
            self.send_state();
            Ok(CornerOutcome::Waiting)
        }
    }

    fn resolve_combat(&mut self) {
        let Some(combat) = self.turn.combat.clone() else {
            return;
        };
        let (attacker, defender) = (&combat.attacker, &combat.defender);
        let (Some(attacker_value), Some(defender_value)) = (attacker.value, defender.value) else {
            return;
        };

        let attacker_name = self.card_name(&attacker.cell.card);
        let defender_name = self.card_name(&defender.cell.card);
        let attacker_owner = self.display_name(attacker.player());
        let defender_owner = self.display_name(defender.player());
        let turn = self.turn.count;

        let (outcome, power_owner) = if attacker_value == defender_value {
            let mut positions = String::from(" Both Zoons keep their positions.");
            if let Some(fallback) = retreat_cell(&attacker.path) {
                if self.board.is_empty_at(fallback) && self.board.relocate(attacker.position(), fallback) {
                    positions = format!(" The attacking **{attacker_name}** falls back to _{fallback}_.");
                }
            }
            self.notify(
                &Audience::Room,
                &format!("**Combat** - the combat ends in a draw.{positions}"),
            );
            (CombatOutcome::Draw, None)
        } else if attacker_value.is_power() {
            self.announce_power(attacker, &attacker_name, &attacker_owner);
            self.stack.push_back(StackEntry::Power(PowerAction {
                source: attacker.clone(),
                target: defender.clone(),
            }));
            (CombatOutcome::Power, Some(CombatRole::Attacker))
        } else if defender_value.is_power() {
            self.announce_power(defender, &defender_name, &defender_owner);
            self.stack.push_back(StackEntry::Power(PowerAction {
                source: defender.clone(),
                target: attacker.clone(),
            }));
            (CombatOutcome::Power, Some(CombatRole::Defender))
        } else if matches!(
            (attacker_value, defender_value),
            (CornerValue::Strength(a), CornerValue::Strength(d)) if a > d
        ) {
            self.notify(
                &Audience::Room,
                &format!(
                    "**Combat** - **{attacker_owner}**'s _{attacker_name}_ eliminates **{defender_owner}**'s _{defender_name}_ and takes its place at _{}_.",
                    defender.position()
                ),
            );
            self.eliminate_at(defender.position(), EliminationContext::Combat { turn });
            self.board.relocate(attacker.position(), defender.position());
            (CombatOutcome::Attacker, None)
        } else {
            self.notify(
                &Audience::Room,
                &format!(
                    "**Combat** - **{defender_owner}**'s _{defender_name}_ eliminates **{attacker_owner}**'s _{attacker_name}_ and holds its position."
                ),
            );
            self.eliminate_at(attacker.position(), EliminationContext::Combat { turn });
            (CombatOutcome::Defender, None)
        };

        tracing::info!(
            room = %self.room,
            attacker = %attacker_value,
            defender = %defender_value,
            ?outcome,
            "combat resolved"
        );
        if let Some(live) = self.turn.combat.as_mut() {
            live.winner = Some(outcome);
            live.power_owner = power_owner;
        }
        self.send_state();
    }

    fn announce_power(&self, side: &CombatSide, card_name: &str, owner: &str) {
        let power = self
            .definition(&side.cell.card)
            .and_then(|d| d.power.clone())
            .unwrap_or_else(|| "power".into());
        self.notify(
            &Audience::Room,
            &format!("**Combat** - **{owner}**'s _{card_name}_ activates its power (_{power}_)."),
        );
    }

    /// Remove the card at `pos` and bury it. Losing an emblem queues a win
    /// for the other player.
    pub fn eliminate_at(&mut self, pos: Position, context: EliminationContext) -> Option<Cell> {
        let fallen = self.board.remove(pos)?;
        let name = self.card_name(&fallen.card);
        self.notify(&Audience::Room, &format!("Zoon eliminated: **{name}**"));

        let kind = self
            .definition(&fallen.card)
            .map(|d| d.kind)
            .unwrap_or(fallen.card.kind);
        if kind == CardKind::Emblem {
            if let Some(winner) = self.opponent_of(&fallen.player).map(|p| p.player_id.clone()) {
                self.stack.push_back(StackEntry::Win {
                    winner,
                    reason: WinReason::Emblem,
                });
            }
        }

        tracing::debug!(room = %self.room, card = %fallen.card, at = %pos, "card eliminated");
        self.graveyard.push(Fallen {
            cell: fallen.clone(),
            context,
        });
        Some(fallen)
    }
}

/// The cell an attacker falls back to on a draw: the one walked just before
/// the defender's.
fn retreat_cell(path: &Path) -> Option<Position> {
    if path.len() > 1 {
        Some(path[path.len() - 2].position())
    } else {
        None
    }
}
