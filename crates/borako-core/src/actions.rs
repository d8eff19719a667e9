//! Intents that participants submit.
//!
//! Every intent names the acting player; the state machine alone decides
//! whether it is legal.

use crate::card::CardId;
use crate::game::GameState;
use crate::meld::MeldId;
use crate::player::PlayerId;
use serde::{Deserialize, Serialize};

/// All possible intents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameAction {
    // ==================== Lobby ====================
    /// Start a fresh session with the local player as host
    InitGame {
        player_id: PlayerId,
        host_name: String,
        #[serde(default)]
        team_a_name: Option<String>,
        #[serde(default)]
        team_b_name: Option<String>,
    },
    /// Take a seat in the lobby
    JoinGame { player_id: PlayerId, name: String },
    /// Host removes a seated player
    KickPlayer {
        player_id: PlayerId,
        target_id: PlayerId,
    },
    /// Move a player to the other team
    SwitchTeam {
        player_id: PlayerId,
        target_id: PlayerId,
    },
    /// Host deals the first round
    StartGame { player_id: PlayerId },

    // ==================== Turn ====================
    /// Take the top card of the deck
    DrawCard { player_id: PlayerId },
    /// Take the whole discard pile
    SweepPile { player_id: PlayerId },
    /// Lay down a new meld from hand
    MeldCards {
        player_id: PlayerId,
        card_ids: Vec<CardId>,
    },
    /// Extend one of the team's melds
    AddToMeld {
        player_id: PlayerId,
        meld_id: MeldId,
        card_ids: Vec<CardId>,
    },
    /// Discard a card. On the first turn of a round, `draw_again` discards
    /// the card just drawn and draws a replacement instead of ending the turn.
    DiscardCard {
        player_id: PlayerId,
        card_id: CardId,
        #[serde(default)]
        draw_again: bool,
    },
    /// Rearrange one's own hand
    ReorderHand {
        player_id: PlayerId,
        new_order: Vec<CardId>,
    },

    // ==================== Session ====================
    /// A participant is gone for good
    PlayerLeft { player_id: PlayerId },
    /// Host deals the next round
    NextRound { player_id: PlayerId },
    /// Host returns everyone to the lobby
    ResetGame { player_id: PlayerId },
    /// Replace the whole state with a snapshot
    SyncState { state: Box<GameState> },
}

impl GameAction {
    /// The player performing this intent
    pub fn actor(&self) -> Option<&PlayerId> {
        match self {
            GameAction::InitGame { player_id, .. }
            | GameAction::JoinGame { player_id, .. }
            | GameAction::KickPlayer { player_id, .. }
            | GameAction::SwitchTeam { player_id, .. }
            | GameAction::StartGame { player_id }
            | GameAction::DrawCard { player_id }
            | GameAction::SweepPile { player_id }
            | GameAction::MeldCards { player_id, .. }
            | GameAction::AddToMeld { player_id, .. }
            | GameAction::DiscardCard { player_id, .. }
            | GameAction::ReorderHand { player_id, .. }
            | GameAction::PlayerLeft { player_id }
            | GameAction::NextRound { player_id }
            | GameAction::ResetGame { player_id } => Some(player_id),
            GameAction::SyncState { .. } => None,
        }
    }

    /// Intents that only make sense inside the process that issues them and
    /// must never be accepted from a remote peer
    pub fn is_local_only(&self) -> bool {
        matches!(
            self,
            GameAction::InitGame { .. } | GameAction::SyncState { .. }
        )
    }

    /// Short tag for logging
    pub fn name(&self) -> &'static str {
        match self {
            GameAction::InitGame { .. } => "INIT_GAME",
            GameAction::JoinGame { .. } => "JOIN_GAME",
            GameAction::KickPlayer { .. } => "KICK_PLAYER",
            GameAction::SwitchTeam { .. } => "SWITCH_TEAM",
            GameAction::StartGame { .. } => "START_GAME",
            GameAction::DrawCard { .. } => "DRAW_CARD",
            GameAction::SweepPile { .. } => "SWEEP_PILE",
            GameAction::MeldCards { .. } => "MELD_CARDS",
            GameAction::AddToMeld { .. } => "ADD_TO_MELD",
            GameAction::DiscardCard { .. } => "DISCARD_CARD",
            GameAction::ReorderHand { .. } => "REORDER_HAND",
            GameAction::PlayerLeft { .. } => "PLAYER_LEFT",
            GameAction::NextRound { .. } => "NEXT_ROUND",
            GameAction::ResetGame { .. } => "RESET_GAME",
            GameAction::SyncState { .. } => "SYNC_STATE",
        }
    }
}

/// Kinds of move a player can currently make
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MoveKind {
    Draw,
    Sweep,
    Meld,
    AddToMeld,
    Discard,
    DiscardAndDrawAgain,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_wire_format() {
        let action = GameAction::DiscardCard {
            player_id: "p1".into(),
            card_id: "CLUBS-5-0".into(),
            draw_again: false,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "DISCARD_CARD");
        assert_eq!(json["payload"]["card_id"], "CLUBS-5-0");

        let parsed: GameAction = serde_json::from_str(
            r#"{"type":"DISCARD_CARD","payload":{"player_id":"p1","card_id":"CLUBS-5-0"}}"#,
        )
        .unwrap();
        assert_eq!(parsed, action);
    }

    #[test]
    fn test_actor_and_locality() {
        let draw = GameAction::DrawCard {
            player_id: "p2".into(),
        };
        assert_eq!(draw.actor(), Some(&"p2".to_string()));
        assert!(!draw.is_local_only());

        let sync = GameAction::SyncState {
            state: Box::default(),
        };
        assert_eq!(sync.actor(), None);
        assert!(sync.is_local_only());
        assert_eq!(sync.name(), "SYNC_STATE");
    }
}
