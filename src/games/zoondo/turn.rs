//! Turn lifecycle: start, end, rotation and the terminal phase.

use crate::engine::models::{Audience, PlayerId};

use super::game::Game;
use super::types::{Phase, WinReason};

impl Game {
    /// Reset the turn for `player_id`. Observers only ever see the fully
    /// reset turn: the state is broadcast once, after every field is set.
    pub(crate) fn start_turn(&mut self, player_id: &str) {
        self.turn.count += 1;
        self.turn.active_player = Some(player_id.to_string());
        self.stack.clear();
        self.turn.phase = Phase::Main;
        self.turn.combat = None;
        self.turn.action = None;
        self.send_state();

        let name = self.display_name(player_id);
        self.notify(&Audience::Room, &format!("Turn start: **{name}**."));
        tracing::info!(
            room = %self.room,
            turn = self.turn.count,
            player = player_id,
            first_player = self.is_first_player(player_id),
            "starting turn"
        );
    }

    /// Announce the end of the turn and return who plays next.
    pub(crate) fn end_turn(&mut self) -> Option<PlayerId> {
        self.notify(&Audience::Room, "End of turn.");
        let active = self.turn.active_player.as_deref()?;
        self.opponent_of(active).map(|p| p.player_id.clone())
    }

    pub(crate) fn end_game(&mut self, winner: &str, reason: WinReason) {
        self.turn.phase = Phase::End;
        self.turn.winner = Some(winner.to_string());
        self.stack.clear();
        self.send_state();

        let name = self.display_name(winner);
        let message = match reason {
            WinReason::Emblem => {
                format!("Game over, **{name}** eliminated the opponent's emblem.")
            }
            WinReason::Forfeit => format!("Game over, **{name}** wins by forfeit."),
        };
        self.notify(&Audience::Room, &message);
        tracing::info!(room = %self.room, winner, ?reason, turns = self.turn.count, "game over");
    }
}
