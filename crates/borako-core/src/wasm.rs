//! WebAssembly bindings for the Borako engine.
//!
//! This module exposes the reducer, the meld validator and scoring to
//! JavaScript through wasm-bindgen. Everything crosses the boundary as JSON.

use wasm_bindgen::prelude::*;

use crate::actions::GameAction;
use crate::card::Card;
use crate::game::{reduce, GameState};
use crate::meld::{validate_meld, Meld};
use crate::scoring::{displayed_meld_value, team_round_score};

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

fn parse<T: serde::de::DeserializeOwned>(json: &str, what: &str) -> Result<T, JsValue> {
    serde_json::from_str(json).map_err(|e| JsValue::from_str(&format!("Invalid {}: {}", what, e)))
}

/// WASM-exposed game wrapper
#[wasm_bindgen]
pub struct WasmGame {
    state: GameState,
}

impl Default for WasmGame {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl WasmGame {
    /// Start from an empty lobby
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmGame {
        WasmGame {
            state: GameState::new(),
        }
    }

    /// Restore from a state snapshot
    #[wasm_bindgen(js_name = fromState)]
    pub fn from_state(state_json: &str) -> Result<WasmGame, JsValue> {
        Ok(WasmGame {
            state: parse(state_json, "state")?,
        })
    }

    /// Get the current game state as JSON
    #[wasm_bindgen(js_name = getState)]
    pub fn get_state(&self) -> String {
        serde_json::to_string(&self.state).unwrap_or_else(|_| "{}".to_string())
    }

    /// Get the current phase as a string
    #[wasm_bindgen(js_name = getPhase)]
    pub fn get_phase(&self) -> String {
        serde_json::to_string(&self.state.phase).unwrap_or_else(|_| "\"LOBBY\"".to_string())
    }

    /// Apply an intent from JSON. Illegal intents leave the state unchanged;
    /// returns whether the state changed.
    #[wasm_bindgen(js_name = reduce)]
    pub fn reduce(&mut self, action_json: &str) -> Result<bool, JsValue> {
        let action: GameAction = parse(action_json, "action")?;
        let next = reduce(&self.state, action);
        let changed = next != self.state;
        self.state = next;
        Ok(changed)
    }

    /// Apply an intent from JSON, reporting the rejection reason
    #[wasm_bindgen(js_name = applyAction)]
    pub fn apply_action(&mut self, action_json: &str) -> Result<(), JsValue> {
        let action: GameAction = parse(action_json, "action")?;
        self.state
            .apply_action(action, &mut rand::thread_rng())
            .map_err(|e| JsValue::from_str(&format!("Action failed: {}", e)))
    }

    /// Move kinds currently open to a player, as a JSON array
    #[wasm_bindgen(js_name = getAllowedMoves)]
    pub fn get_allowed_moves(&self, player_id: &str) -> String {
        let moves = self.state.allowed_moves(player_id);
        serde_json::to_string(&moves).unwrap_or_else(|_| "[]".to_string())
    }

    /// Check if the match is over
    #[wasm_bindgen(js_name = isFinished)]
    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    /// Id of the player whose turn it is
    #[wasm_bindgen(js_name = getCurrentPlayer)]
    pub fn get_current_player(&self) -> Option<String> {
        self.state.current_player().map(|p| p.id.clone())
    }

    /// Name of the winning team once the match is over
    #[wasm_bindgen(js_name = getWinner)]
    pub fn get_winner(&self) -> Option<String> {
        self.state
            .winner()
            .map(|team| self.state.teams.get(team).name.clone())
    }
}

/// Validate a group of cards (JSON array) as a meld
#[wasm_bindgen(js_name = validateMeld)]
pub fn validate_meld_json(cards_json: &str) -> Result<String, JsValue> {
    let cards: Vec<Card> = parse(cards_json, "cards")?;
    let check = validate_meld(&cards).map_err(|e| JsValue::from_str(&e.to_string()))?;
    serde_json::to_string(&check).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Score breakdown for a team's melds and hands
#[wasm_bindgen(js_name = scoreTeam)]
pub fn score_team_json(
    melds_json: &str,
    hand_json: &str,
    has_taken_mour: bool,
    went_out: bool,
) -> Result<String, JsValue> {
    let melds: Vec<Meld> = parse(melds_json, "melds")?;
    let hand: Vec<Card> = parse(hand_json, "hand")?;
    let score = team_round_score(&melds, &hand, has_taken_mour, went_out);
    serde_json::to_string(&score).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Badge value of one meld among its team's melds
#[wasm_bindgen(js_name = meldValue)]
pub fn meld_value_json(meld_json: &str, team_melds_json: &str) -> Result<i64, JsValue> {
    let meld: Meld = parse(meld_json, "meld")?;
    let team_melds: Vec<Meld> = parse(team_melds_json, "melds")?;
    Ok(displayed_meld_value(&meld, &team_melds))
}
