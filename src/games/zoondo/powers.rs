//! Built-in card powers. Catalog entries bind to these by name through their
//! `resolver` field.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::engine::models::{Audience, Position};
use crate::engine::plugin::{Continuation, PowerResolver, Resumed};

use super::game::Game;
use super::types::*;

pub static BUILTIN_POWERS: Lazy<HashMap<&'static str, Arc<dyn PowerResolver>>> = Lazy::new(|| {
    let mut powers: HashMap<&'static str, Arc<dyn PowerResolver>> = HashMap::new();
    powers.insert("eliminate", Arc::new(Eliminate));
    powers.insert("displace", Arc::new(Displace));
    powers
});

/// True when the side's card is still where the combat found it.
fn still_on_board(game: &Game, side: &CombatSide) -> bool {
    game.board()
        .at(side.position())
        .is_some_and(|cell| *cell == side.cell)
}

/// The power's owner eliminates the other side outright.
pub struct Eliminate;

impl PowerResolver for Eliminate {
    fn name(&self) -> &str {
        "eliminate"
    }

    fn resolve(&self, game: &mut Game, action: &PowerAction, next: Continuation) -> Resumed {
        if !still_on_board(game, &action.target) {
            tracing::debug!(room = %game.room(), target = %action.target.position(), "target already gone");
            return next.resume();
        }
        let card = game.card_name(&action.source.cell.card);
        let turn = game.turn().count;
        game.notify(
            &Audience::Room,
            &format!("**Power** - _{card}_ strikes down the opposing Zoon."),
        );
        game.eliminate_at(
            action.target.position(),
            EliminationContext::Power { turn, card },
        );
        next.resume()
    }
}

/// The power's owner pushes the other side onto an empty orthogonal
/// neighbour of its cell.
pub struct Displace;

impl Displace {
    fn free_neighbours(game: &Game, origin: Position) -> Vec<Position> {
        [(0, 1), (1, 0), (0, -1), (-1, 0)]
            .into_iter()
            .map(|(dx, dy)| Position::new(origin.x + dx, origin.y + dy))
            .filter(|&pos| game.board().in_bounds(pos) && game.board().is_empty_at(pos))
            .collect()
    }
}

impl PowerResolver for Displace {
    fn name(&self) -> &str {
        "displace"
    }

    fn resolve(&self, game: &mut Game, action: &PowerAction, next: Continuation) -> Resumed {
        if !still_on_board(game, &action.target) {
            return next.resume();
        }
        let cells = Self::free_neighbours(game, action.target.position());
        if cells.is_empty() {
            game.notify(
                &Audience::Room,
                "**Power** - the opposing Zoon has nowhere to be pushed.",
            );
            return next.resume();
        }

        game.push_entry(StackEntry::SelectCard(SelectCard {
            options: SelectOptions {
                player: action.source.player().to_string(),
                prompt: "Choose where to push the opposing Zoon.".into(),
                cells,
            },
            next: Some(SelectionHandler {
                power: action.clone(),
            }),
        }));
        next.resume()
    }

    fn on_selection(
        &self,
        game: &mut Game,
        action: &PowerAction,
        choice: Position,
        next: Continuation,
    ) -> Resumed {
        let from = action.target.position();
        if still_on_board(game, &action.target) && game.relocate(from, choice) {
            game.notify(
                &Audience::Room,
                &format!("**Power** - the Zoon on _{from}_ is pushed to _{choice}_."),
            );
        }
        next.resume()
    }
}
