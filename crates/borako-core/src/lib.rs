//! Borako - a partnership rummy engine
//!
//! This crate provides the core game logic for Borako, including:
//! - The 106-card pool with two devil jokers
//! - Meld validation for runs and sets with wildcards
//! - Round scoring with meld bonuses, penalties and the go-out bonus
//! - Game state machine with full rule enforcement
//!
//! # Architecture
//!
//! The engine is a pure reducer over a single serializable `GameState`. It
//! performs no I/O, so the same code runs inside a networked peer, in tests
//! and, with the `wasm` feature, in the browser.
//!
//! # Modules
//!
//! - [`card`]: Cards, deck construction and hand ordering
//! - [`meld`]: Run and set validation
//! - [`scoring`]: Round score breakdown
//! - [`player`]: Players and teams
//! - [`actions`]: Intents participants submit
//! - [`game`]: Game state machine

pub mod actions;
pub mod card;
pub mod game;
pub mod meld;
pub mod player;
pub mod scoring;
#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use actions::{GameAction, MoveKind};
pub use card::{Card, CardId, Rank, Suit, DECK_SIZE};
pub use game::{
    reduce, reduce_with_rng, FirstTurn, GameError, GamePhase, GameState, RoundSummary, TurnPhase,
};
pub use meld::{validate_extension, validate_meld, Meld, MeldCheck, MeldError, MeldId, MeldType};
pub use player::{Player, PlayerId, Team, TeamId, Teams};
pub use scoring::{displayed_meld_value, team_round_score, ScoreBreakdown};
