//! The action stack: pending effects drained one at a time between inputs.
//!
//! The driver is a loop, not a recursion. It stops in three ways: a prompt
//! needs a player's answer (`Phase::Action`), a `Win` ends the game, or the
//! stack runs dry and the turn passes to the other player.

use crate::engine::error::{GameError, Result};
use crate::engine::models::{Audience, Position};
use crate::engine::plugin::Continuation;

use super::game::Game;
use super::types::{CombatStep, Phase, PowerAction, StackEntry};

impl Game {
    pub(crate) fn resolve_stack(&mut self) {
        loop {
            if self.turn.phase == Phase::End {
                return;
            }

            let Some(entry) = self.stack.pop_front() else {
                match self.end_turn() {
                    Some(next) => self.start_turn(&next),
                    None => tracing::warn!(room = %self.room, "no player to hand the turn to"),
                }
                return;
            };

            match entry {
                StackEntry::SelectCard(select) => {
                    tracing::debug!(room = %self.room, player = %select.options.player, "waiting for a selection");
                    self.turn.phase = Phase::Action;
                    self.turn.action = Some(select);
                    self.send_state();
                    return;
                }
                StackEntry::Power(action) => self.resolve_power(&action),
                StackEntry::Win { winner, reason } => {
                    self.end_game(&winner, reason);
                    return;
                }
                StackEntry::Other { kind } => {
                    tracing::warn!(room = %self.room, kind = %kind, "unhandled stack entry, skipping");
                }
            }
        }
    }

    fn resolve_power(&mut self, action: &PowerAction) {
        let card = &action.source.cell.card;
        let (name, power) = match self.catalog.card(card) {
            Some(definition) => (definition.name.clone(), definition.power.clone()),
            None => (card.slug.clone(), None),
        };

        let Some(resolver) = self.powers.get(card) else {
            tracing::warn!(room = %self.room, card = %card, "no power resolver for {}", name);
            self.notify(
                &Audience::Room,
                &format!(
                    "The power of **{name}** is not implemented yet. The combat is treated as a draw."
                ),
            );
            return;
        };

        tracing::debug!(
            room = %self.room,
            card = %card,
            resolver = resolver.name(),
            power = power.as_deref().unwrap_or("-"),
            target = %action.target.position(),
            "resolving power"
        );
        let _resumed = resolver.resolve(self, action, Continuation::new());
        self.send_state();
    }

    /// Answer the pending `SelectCard` prompt and keep draining.
    pub fn resolve_selection(&mut self, player_id: &str, choice: Position) -> Result<()> {
        self.check_turn(player_id, Phase::Action, "answer a prompt")
            .or_else(|e| self.reject(player_id, e))?;

        let Some(pending) = self.turn.action.as_ref() else {
            let error = GameError::WrongPhase {
                action: "answer a prompt",
                phase: "action without a prompt".into(),
            };
            return self.reject(player_id, error);
        };
        if pending.options.player != player_id {
            return self.reject(player_id, GameError::NotPrompted(player_id.to_string()));
        }
        if !pending.options.cells.contains(&choice) {
            return self.reject(player_id, GameError::InvalidSelection(choice));
        }

        if let Some(handler) = self.turn.action.take().and_then(|select| select.next) {
            match self.powers.get(&handler.power.source.cell.card) {
                Some(resolver) => {
                    let _resumed =
                        resolver.on_selection(self, &handler.power, choice, Continuation::new());
                    self.send_state();
                }
                None => tracing::warn!(
                    room = %self.room,
                    card = %handler.power.source.cell.card,
                    "selection handler lost its resolver"
                ),
            }
        }

        self.resolve_stack();
        Ok(())
    }

    /// Continue after the post-combat pause. Does nothing unless a resolved
    /// combat is still waiting, so a late timer is harmless.
    pub fn resume_stack(&mut self) -> bool {
        let waiting = self.turn.phase == Phase::Combat
            && self
                .turn
                .combat
                .as_ref()
                .is_some_and(|c| c.step == CombatStep::Resolve);
        if waiting {
            self.resolve_stack();
        }
        waiting
    }
}
