//! Outbound delivery primitives. The engine only knows how to address a
//! player or the whole room; the session layer decides what a channel is.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};

use tokio::sync::mpsc;

use crate::engine::models::{Audience, Outbound, PlayerId};

pub trait Delivery: Send + Sync {
    /// Deliver a state payload to one player. Returns false when the player
    /// has no open channel; callers treat that as a silent skip.
    fn send_state(&self, player_id: &str, state: serde_json::Value) -> bool;

    /// Deliver a human-readable notice.
    fn send_message(&self, audience: &Audience, message: &str);
}

/// Per-room fan-out over unbounded channels, one per connected player.
#[derive(Default)]
pub struct ChannelHub {
    channels: RwLock<HashMap<PlayerId, mpsc::UnboundedSender<Outbound>>>,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or replace) the channel for a player.
    pub fn connect(&self, player_id: &str) -> mpsc::UnboundedReceiver<Outbound> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(player_id.to_string(), tx);
        rx
    }

    pub fn disconnect(&self, player_id: &str) {
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(player_id);
    }

    pub fn is_connected(&self, player_id: &str) -> bool {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(player_id)
            .is_some_and(|tx| !tx.is_closed())
    }

    fn push(&self, player_id: &str, item: Outbound) -> bool {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        match channels.get(player_id) {
            Some(tx) => tx.send(item).is_ok(),
            None => false,
        }
    }
}

impl Delivery for ChannelHub {
    fn send_state(&self, player_id: &str, state: serde_json::Value) -> bool {
        self.push(player_id, Outbound::State(state))
    }

    fn send_message(&self, audience: &Audience, message: &str) {
        match audience {
            Audience::Player(player_id) => {
                self.push(player_id, Outbound::Message(message.to_string()));
            }
            Audience::Room => {
                let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
                for tx in channels.values() {
                    let _ = tx.send(Outbound::Message(message.to_string()));
                }
            }
        }
    }
}

/// A delivered item as seen by [`Recorder`].
#[derive(Debug, Clone)]
pub enum Recorded {
    State {
        player_id: PlayerId,
        state: serde_json::Value,
    },
    Message {
        audience: Audience,
        message: String,
    },
}

/// Keeps every delivery in memory. Players listed as offline are skipped the
/// same way a closed channel is.
#[derive(Default)]
pub struct Recorder {
    log: Mutex<Vec<Recorded>>,
    offline: RwLock<Vec<PlayerId>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, player_id: &str) {
        self.offline
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(player_id.to_string());
    }

    pub fn take(&self) -> Vec<Recorded> {
        std::mem::take(&mut *self.log.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Latest state payload delivered to a player.
    pub fn last_state(&self, player_id: &str) -> Option<serde_json::Value> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find_map(|r| match r {
                Recorded::State { player_id: p, state } if p == player_id => Some(state.clone()),
                _ => None,
            })
    }

    pub fn states_for(&self, player_id: &str) -> Vec<serde_json::Value> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|r| match r {
                Recorded::State { player_id: p, state } if p == player_id => Some(state.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|r| match r {
                Recorded::Message { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Notices a given player would have received (room-wide plus direct).
    pub fn messages_for(&self, player_id: &str) -> Vec<String> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|r| match r {
                Recorded::Message { audience: Audience::Room, message } => Some(message.clone()),
                Recorded::Message {
                    audience: Audience::Player(p),
                    message,
                } if p == player_id => Some(message.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Delivery for Recorder {
    fn send_state(&self, player_id: &str, state: serde_json::Value) -> bool {
        let offline = self.offline.read().unwrap_or_else(PoisonError::into_inner);
        if offline.iter().any(|p| p == player_id) {
            return false;
        }
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Recorded::State {
                player_id: player_id.to_string(),
                state,
            });
        true
    }

    fn send_message(&self, audience: &Audience, message: &str) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Recorded::Message {
                audience: audience.clone(),
                message: message.to_string(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_skips_unconnected_players() {
        let hub = ChannelHub::new();
        let mut rx = hub.connect("p1");

        assert!(hub.send_state("p1", serde_json::json!({"turn": 1})));
        assert!(!hub.send_state("p2", serde_json::json!({"turn": 1})));

        match rx.try_recv().unwrap() {
            Outbound::State(v) => assert_eq!(v["turn"], 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_hub_room_message_reaches_everyone() {
        let hub = ChannelHub::new();
        let mut rx1 = hub.connect("p1");
        let mut rx2 = hub.connect("p2");

        hub.send_message(&Audience::Room, "hello");
        hub.send_message(&Audience::Player("p2".into()), "psst");

        assert!(matches!(rx1.try_recv().unwrap(), Outbound::Message(m) if m == "hello"));
        assert!(rx1.try_recv().is_err());
        assert!(matches!(rx2.try_recv().unwrap(), Outbound::Message(m) if m == "hello"));
        assert!(matches!(rx2.try_recv().unwrap(), Outbound::Message(m) if m == "psst"));
    }

    #[test]
    fn test_hub_dropped_receiver_is_skipped() {
        let hub = ChannelHub::new();
        drop(hub.connect("p1"));
        assert!(!hub.is_connected("p1"));
        assert!(!hub.send_state("p1", serde_json::json!({})));
        hub.disconnect("p1");
        assert!(!hub.send_state("p1", serde_json::json!({})));
    }
}
