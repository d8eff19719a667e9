//! Session persistence.
//!
//! A session is everything a peer needs to pick up where it left off after
//! a restart: the last known state plus its own and the host's peer ids.

use crate::transport::PeerId;
use borako_core::GameState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub state: GameState,
    pub peer_id: PeerId,
    pub host_id: Option<PeerId>,
    pub is_connected: bool,
}

impl Session {
    /// Check if this peer was hosting
    pub fn is_host(&self) -> bool {
        self.host_id.as_ref() == Some(&self.peer_id)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
