//! The Game aggregate: one match, its players, board, turn, stack and
//! graveyard, plus the inbound operations that drive it.

use std::collections::VecDeque;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::engine::config::EngineSettings;
use crate::engine::delivery::Delivery;
use crate::engine::error::{GameError, Result};
use crate::engine::models::{Audience, Player, Position, RoomId};
use crate::engine::plugin::PowerRegistry;

use super::catalog::{Catalog, MoveGeometry};
use super::movement::{self, Destination};
use super::types::*;

/// Read-only collaborators shared by every game on a server.
#[derive(Clone)]
pub struct GameContext {
    pub settings: EngineSettings,
    pub catalog: Arc<dyn Catalog>,
    pub geometry: Arc<dyn MoveGeometry>,
    pub powers: Arc<PowerRegistry>,
}

pub struct Game {
    pub(crate) room: RoomId,
    pub(crate) settings: EngineSettings,
    pub(crate) catalog: Arc<dyn Catalog>,
    pub(crate) geometry: Arc<dyn MoveGeometry>,
    pub(crate) powers: Arc<PowerRegistry>,
    pub(crate) delivery: Arc<dyn Delivery>,
    pub(crate) rng: StdRng,
    pub(crate) players: Vec<Player>,
    pub(crate) board: Board,
    pub(crate) turn: Turn,
    pub(crate) stack: VecDeque<StackEntry>,
    pub(crate) graveyard: Vec<Fallen>,
}

impl Game {
    /// Open a game with its first player deployed, waiting for an opponent.
    pub fn create(
        context: &GameContext,
        room: &str,
        first_player: Player,
        delivery: Arc<dyn Delivery>,
    ) -> Result<Self> {
        let rng = match context.settings.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut game = Self {
            room: room.to_string(),
            settings: context.settings.clone(),
            catalog: Arc::clone(&context.catalog),
            geometry: Arc::clone(&context.geometry),
            powers: Arc::clone(&context.powers),
            delivery,
            rng,
            players: Vec::with_capacity(2),
            board: Board::new(context.settings.board_size),
            turn: Turn::new(context.settings.turn_timer_secs),
            stack: VecDeque::new(),
            graveyard: Vec::new(),
        };

        let mut first_player = first_player;
        first_player.is_first_player = true;
        for cell in game.deployment(&first_player)? {
            game.board.place(cell);
        }
        tracing::info!(room, player = %first_player.player_id, tribe = %first_player.tribe, "game created");
        game.players.push(first_player);

        game.notify(&Audience::Room, "Game created. Waiting for a second player…");
        game.send_state();
        Ok(game)
    }

    /// Seat the second player, deploy their tribe mirrored, and start the
    /// first turn with a randomly drawn player.
    pub fn join(&mut self, second_player: Player) -> Result<()> {
        if self.is_participant(&second_player.player_id) {
            return Err(GameError::AlreadyJoined(second_player.player_id));
        }
        if self.players.len() >= 2 {
            return Err(GameError::GameFull);
        }

        let mut second_player = second_player;
        second_player.is_first_player = false;
        for cell in self.deployment(&second_player)? {
            self.board.place(cell);
        }
        let name = second_player.display_name.clone();
        tracing::info!(room = %self.room, player = %second_player.player_id, tribe = %second_player.tribe, "player joined");
        self.players.push(second_player);

        self.notify(&Audience::Room, &format!("**{name}** joined the game."));
        self.send_state();

        let starter = self.players[self.rng.gen_range(0..self.players.len())]
            .player_id
            .clone();
        self.start_turn(&starter);
        Ok(())
    }

    pub fn leave(&mut self, player_id: &str) -> Result<()> {
        let name = self.require_player(player_id)?.display_name.clone();
        tracing::info!(room = %self.room, player = player_id, "player left");
        self.notify(&Audience::Room, &format!("**{name}** left the game."));

        let running = matches!(self.turn.phase, Phase::Main | Phase::Combat | Phase::Action);
        if self.settings.forfeit_on_leave && running {
            if let Some(winner) = self.opponent_of(player_id).map(|p| p.player_id.clone()) {
                self.stack.clear();
                self.stack.push_back(StackEntry::Win {
                    winner,
                    reason: WinReason::Forfeit,
                });
                self.resolve_stack();
            }
        }
        Ok(())
    }

    /// Move the card at `source` to `target`, or open a combat when the
    /// target holds an opposing card.
    pub fn request_move(&mut self, player_id: &str, source: Position, target: Position) -> Result<()> {
        self.check_turn(player_id, Phase::Main, "move")
            .or_else(|e| self.reject(player_id, e))?;

        let cell = match self.board.at(source) {
            Some(cell) => cell.clone(),
            None => return self.reject(player_id, GameError::NoCardAt(source)),
        };
        if cell.player != player_id {
            return self.reject(player_id, GameError::NotYourCard(source));
        }

        let flip = !self.is_first_player(player_id);
        let checked = movement::check_move(
            &self.board,
            self.catalog.as_ref(),
            self.geometry.as_ref(),
            &cell,
            target,
            flip,
        );
        let destination = match checked {
            Ok(Some(destination)) => destination,
            Ok(None) => {
                return self.reject(player_id, GameError::IllegalMove { from: source, to: target })
            }
            Err(e) => return self.reject(player_id, e),
        };

        if destination.combat {
            let defender = match self.board.at(target) {
                Some(defender) => defender.clone(),
                None => return self.reject(player_id, GameError::NoCardAt(target)),
            };
            self.enter_combat(cell, defender, destination.path);
            return Ok(());
        }

        self.board.relocate(source, target);
        self.send_state();

        let name = self.card_name(&cell.card);
        self.notify(
            &Audience::Player(player_id.to_string()),
            &format!("**Move** - _{name}_ from _{source}_ to _{target}_"),
        );
        if let Some(opponent) = self.opponent_of(player_id).map(|p| p.player_id.clone()) {
            self.notify(
                &Audience::Player(opponent),
                &format!("**Move** - a Zoon from _{source}_ to _{target}_"),
            );
        }

        self.resolve_stack();
        Ok(())
    }

    /// Legal destinations for one of the player's cards, for move hints.
    pub fn legal_moves(&self, player_id: &str, source: Position) -> Result<Vec<Destination>> {
        self.require_player(player_id)?;
        let cell = self.board.at(source).ok_or(GameError::NoCardAt(source))?;
        if cell.player != player_id {
            return Err(GameError::NotYourCard(source));
        }
        movement::legal_destinations(
            &self.board,
            self.catalog.as_ref(),
            self.geometry.as_ref(),
            cell,
            !self.is_first_player(player_id),
        )
    }

    // ── Accessors ──

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.player_id == player_id)
    }

    pub fn opponent_of(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.player_id != player_id)
    }

    pub fn is_participant(&self, player_id: &str) -> bool {
        self.player(player_id).is_some()
    }

    pub fn is_first_player(&self, player_id: &str) -> bool {
        self.player(player_id).is_some_and(|p| p.is_first_player)
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn turn(&self) -> &Turn {
        &self.turn
    }

    pub fn stack(&self) -> &VecDeque<StackEntry> {
        &self.stack
    }

    pub fn graveyard(&self) -> &[Fallen] {
        &self.graveyard
    }

    pub fn is_over(&self) -> bool {
        self.turn.phase == Phase::End
    }

    pub fn definition(&self, card: &CardRef) -> Option<&CardDefinition> {
        self.catalog.card(card)
    }

    pub fn card_name(&self, card: &CardRef) -> String {
        self.catalog
            .card(card)
            .map(|d| d.name.clone())
            .unwrap_or_else(|| card.slug.clone())
    }

    // ── Operations available to power resolvers ──

    /// Queue a stack entry behind the ones already pending.
    pub fn push_entry(&mut self, entry: StackEntry) {
        self.stack.push_back(entry);
    }

    /// Move a card onto an empty cell.
    pub fn relocate(&mut self, from: Position, to: Position) -> bool {
        self.board.relocate(from, to)
    }

    pub fn notify(&self, audience: &Audience, message: &str) {
        self.delivery.send_message(audience, message);
    }

    // ── Helpers ──

    pub(crate) fn display_name(&self, player_id: &str) -> String {
        self.player(player_id)
            .map(|p| p.display_name.clone())
            .unwrap_or_else(|| player_id.to_string())
    }

    fn require_player(&self, player_id: &str) -> Result<&Player> {
        self.player(player_id)
            .ok_or_else(|| GameError::NotParticipant(player_id.to_string()))
    }

    /// Participation, terminal phase, expected phase, and, for the main
    /// phase, the active player.
    pub(crate) fn check_turn(&self, player_id: &str, expected: Phase, action: &'static str) -> Result<()> {
        self.require_player(player_id)?;
        if self.turn.phase == Phase::End {
            return Err(GameError::GameOver);
        }
        if self.turn.phase != expected {
            return Err(GameError::WrongPhase {
                action,
                phase: self.turn.phase.to_string(),
            });
        }
        if expected == Phase::Main && self.turn.active_player.as_deref() != Some(player_id) {
            return Err(GameError::NotActivePlayer(player_id.to_string()));
        }
        Ok(())
    }

    /// Tell the requester why their input was refused. Nothing is mutated.
    pub(crate) fn reject<T>(&self, player_id: &str, error: GameError) -> Result<T> {
        tracing::debug!(room = %self.room, player = player_id, %error, "rejected input");
        self.notify(
            &Audience::Player(player_id.to_string()),
            &format!("**Error** - {error}"),
        );
        Err(error)
    }

    /// Cells a player's tribe occupies at setup. The disposition's last row
    /// lands on the owner's back line; the second player is point-mirrored.
    fn deployment(&self, player: &Player) -> Result<Vec<Cell>> {
        let tribe = self
            .catalog
            .tribe(&player.tribe)
            .ok_or_else(|| GameError::UnknownTribe(player.tribe.clone()))?;
        let size = self.board.size();

        let mut cells: Vec<Cell> = Vec::new();
        for (y, row) in tribe.disposition.iter().rev().enumerate() {
            for (x, slug) in row.iter().enumerate() {
                let definition = tribe
                    .cards
                    .get(slug)
                    .ok_or_else(|| GameError::UnknownCard(format!("{}/{}", player.tribe, slug)))?;
                let base = Position::new(x as i32, y as i32);
                let pos = if player.is_first_player {
                    base
                } else {
                    base.mirrored(size)
                };
                let taken = self.board.at(pos).is_some() || cells.iter().any(|c| c.position() == pos);
                if !self.board.in_bounds(pos) || taken {
                    return Err(GameError::InvalidDisposition {
                        tribe: player.tribe.clone(),
                        reason: format!("cell {pos} is off the board or already taken"),
                    });
                }
                cells.push(Cell {
                    player: player.player_id.clone(),
                    x: pos.x,
                    y: pos.y,
                    card: CardRef {
                        tribe: player.tribe.clone(),
                        kind: definition.kind,
                        slug: slug.clone(),
                    },
                });
            }
        }
        Ok(cells)
    }
}
