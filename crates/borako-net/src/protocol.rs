//! Wire messages exchanged between peers.

use crate::transport::PeerId;
use borako_core::{GameAction, GameState};
use serde::{Deserialize, Serialize};

/// Payload carried over a transport link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Envelope {
    /// Full authoritative snapshot, sent by the host
    StateUpdate(Box<GameState>),

    /// An intent forwarded to the host
    Action(GameAction),
}

impl Envelope {
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// First frame a dialing peer sends on a new WebSocket link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Handshake {
    Hello { peer_id: PeerId },
}
