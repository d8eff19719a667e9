//! Core game state machine.
//!
//! This module contains the `GameState` aggregate and the reducer that turns
//! `(state, intent)` into the next state. The state is the unit of
//! replication: it is always transmitted and applied whole.

use crate::actions::{GameAction, MoveKind};
use crate::card::{shuffled_deck, sort_hand, Card, CardId};
use crate::meld::{validate_extension, validate_meld, Meld, MeldError, MeldId};
use crate::player::{Player, PlayerId, Team, TeamId, Teams};
use crate::scoring::{team_round_score, ScoreBreakdown};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum seated players
pub const MAX_PLAYERS: usize = 4;

/// Maximum players per team
pub const MAX_TEAM_SIZE: usize = 2;

/// Cards dealt to each player
pub const HAND_SIZE: usize = 11;

/// Cards in each team's Mour pile
pub const MOUR_SIZE: usize = 11;

/// Cumulative score that ends the match
pub const WINNING_SCORE: f64 = 350.0;

/// Times the opening player may discard the drawn card and draw again
pub const FIRST_TURN_REDRAWS: u8 = 1;

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    Lobby,
    Playing,
    RoundEnd,
    GameEnd,
}

/// Phase within a player's turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnPhase {
    /// Must draw or sweep
    WaitingForDraw,
    /// May meld, extend melds, then discard
    Playing,
}

/// Reasons an intent is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("Not your turn")]
    NotYourTurn,

    #[error("Invalid action for current phase")]
    InvalidPhase,

    #[error("Only the host can do that")]
    NotHost,

    #[error("No such player")]
    UnknownPlayer,

    #[error("Player is already seated")]
    AlreadySeated,

    #[error("Table is full")]
    TableFull,

    #[error("Team is full")]
    TeamFull,

    #[error("The host cannot be kicked")]
    CannotKickHost,

    #[error("Each team needs at least one player")]
    NotEnoughPlayers,

    #[error("Deck is empty")]
    DeckEmpty,

    #[error("Discard pile is empty")]
    DiscardPileEmpty,

    #[error("Card is not in hand")]
    CardNotInHand,

    #[error("No cards selected")]
    EmptySelection,

    #[error("Invalid meld: {0}")]
    InvalidMeld(#[from] MeldError),

    #[error("No such meld")]
    MeldNotFound,

    #[error("Must keep a card to discard")]
    MustKeepCard,

    #[error("Drawing again is only allowed on the first turn of a round")]
    RedrawNotAllowed,

    #[error("Must discard the card just drawn to draw again")]
    MustDiscardDrawnCard,

    #[error("New order must contain exactly the cards in hand")]
    InvalidReorder,
}

/// Bookkeeping for the opening turn of a round
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstTurn {
    /// The round's first turn has not ended yet
    pub in_progress: bool,
    /// Draw-again discards used so far
    pub redraws: u8,
    /// Card taken by the latest draw of this turn
    pub last_drawn_card_id: Option<CardId>,
}

impl FirstTurn {
    fn begin() -> Self {
        Self {
            in_progress: true,
            redraws: 0,
            last_drawn_card_id: None,
        }
    }

    fn can_redraw(&self) -> bool {
        self.in_progress && self.redraws < FIRST_TURN_REDRAWS
    }
}

/// Scores of a finished round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub round_number: u32,
    /// Team of the player who went out
    pub went_out: TeamId,
    #[serde(rename = "A")]
    pub team_a: ScoreBreakdown,
    #[serde(rename = "B")]
    pub team_b: ScoreBreakdown,
}

/// The complete game state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub phase: GamePhase,
    pub round_number: u32,
    /// Draw pile; the top card is the last element
    pub deck: Vec<Card>,
    /// Discard pile; the top card is the last element
    pub discard_pile: Vec<Card>,
    /// Players in seating order
    pub players: Vec<Player>,
    pub teams: Teams,
    pub current_turn_player_id: Option<PlayerId>,
    pub turn_phase: TurnPhase,
    /// The current player swept the discard pile this turn
    pub has_swept: bool,
    /// A sweep is pending and must be followed by a meld before discarding
    pub must_meld_after_sweep: bool,
    /// Cards taken by the pending sweep, returned if it is rolled back
    pub swept_cards: Vec<Card>,
    pub first_turn: FirstTurn,
    /// Player who opened the current round
    pub round_starter_id: Option<PlayerId>,
    pub last_round: Option<RoundSummary>,
    /// Append-only event log
    pub logs: Vec<String>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    /// Empty lobby with no players
    pub fn new() -> Self {
        Self {
            phase: GamePhase::Lobby,
            round_number: 0,
            deck: Vec::new(),
            discard_pile: Vec::new(),
            players: Vec::new(),
            teams: Teams::default(),
            current_turn_player_id: None,
            turn_phase: TurnPhase::WaitingForDraw,
            has_swept: false,
            must_meld_after_sweep: false,
            swept_cards: Vec::new(),
            first_turn: FirstTurn::default(),
            round_starter_id: None,
            last_round: None,
            logs: Vec::new(),
        }
    }

    /// Get a player by ID
    pub fn get_player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// The hosting player, if any
    pub fn host(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_host)
    }

    /// Team a player belongs to
    pub fn team_of(&self, id: &str) -> Option<&Team> {
        self.get_player(id).map(|p| self.teams.get(p.team_id))
    }

    /// Player whose turn it is
    pub fn current_player(&self) -> Option<&Player> {
        self.current_turn_player_id
            .as_deref()
            .and_then(|id| self.get_player(id))
    }

    /// Check if the match is over
    pub fn is_finished(&self) -> bool {
        self.phase == GamePhase::GameEnd
    }

    /// Team with the highest total once the match is over
    pub fn winner(&self) -> Option<TeamId> {
        if !self.is_finished() {
            return None;
        }
        if self.teams.a.total_score >= self.teams.b.total_score {
            Some(TeamId::A)
        } else {
            Some(TeamId::B)
        }
    }

    /// Cards across deck, discard pile, hands, Mour piles and melds
    pub fn card_count(&self) -> usize {
        self.deck.len()
            + self.discard_pile.len()
            + self.players.iter().map(|p| p.hand.len()).sum::<usize>()
            + self
                .teams
                .iter()
                .map(|t| t.mour_pile.len() + t.melded_card_count())
                .sum::<usize>()
    }

    /// Moves currently open to a player
    pub fn allowed_moves(&self, player: &str) -> Vec<MoveKind> {
        let mut moves = Vec::new();

        if self.phase != GamePhase::Playing || self.current_turn_player_id.as_deref() != Some(player)
        {
            return moves;
        }
        let Some(p) = self.get_player(player) else {
            return moves;
        };

        match self.turn_phase {
            TurnPhase::WaitingForDraw => {
                if !self.deck.is_empty() {
                    moves.push(MoveKind::Draw);
                }
                if !self.discard_pile.is_empty() {
                    moves.push(MoveKind::Sweep);
                }
            }
            TurnPhase::Playing => {
                if p.hand.len() >= crate::meld::MIN_MELD_SIZE {
                    moves.push(MoveKind::Meld);
                }
                let has_melds = self.team_of(player).is_some_and(|t| !t.melds.is_empty());
                if !p.hand.is_empty() && has_melds {
                    moves.push(MoveKind::AddToMeld);
                }
                if !p.hand.is_empty() {
                    moves.push(MoveKind::Discard);
                }
                if self.first_turn.can_redraw()
                    && self.first_turn.last_drawn_card_id.is_some()
                    && p.hand.len() > 1
                {
                    moves.push(MoveKind::DiscardAndDrawAgain);
                }
            }
        }

        moves
    }

    /// Apply an intent. On error the state is left untouched.
    pub fn apply_action<R: Rng + ?Sized>(
        &mut self,
        action: GameAction,
        rng: &mut R,
    ) -> Result<(), GameError> {
        let mut next = self.clone();
        next.dispatch(action, rng)?;
        *self = next;
        Ok(())
    }

    fn dispatch<R: Rng + ?Sized>(&mut self, action: GameAction, rng: &mut R) -> Result<(), GameError> {
        match action {
            // ==================== Lobby ====================
            GameAction::InitGame {
                player_id,
                host_name,
                team_a_name,
                team_b_name,
            } => {
                *self = Self::new();
                self.teams = Teams::new(
                    team_a_name.unwrap_or_else(|| Team::default_name(TeamId::A)),
                    team_b_name.unwrap_or_else(|| Team::default_name(TeamId::B)),
                );
                self.log(format!("{} opened a table", host_name));
                self.players
                    .push(Player::new(player_id, host_name, TeamId::A, true));
            }

            GameAction::JoinGame { player_id, name } => {
                self.require_phase(GamePhase::Lobby)?;
                if self.players.len() >= MAX_PLAYERS {
                    return Err(GameError::TableFull);
                }
                if self.get_player(&player_id).is_some() {
                    return Err(GameError::AlreadySeated);
                }

                let team_id = if self.team_size(TeamId::B) < self.team_size(TeamId::A) {
                    TeamId::B
                } else {
                    TeamId::A
                };
                self.log(format!("{} joined {}", name, self.teams.get(team_id).name));
                self.players
                    .push(Player::new(player_id, name, team_id, false));
            }

            GameAction::KickPlayer {
                player_id,
                target_id,
            } => {
                self.require_phase(GamePhase::Lobby)?;
                self.require_host(&player_id)?;
                let target = self.index_of(&target_id)?;
                if self.players[target].is_host {
                    return Err(GameError::CannotKickHost);
                }

                let kicked = self.players.remove(target);
                for (seat, player) in self.players.iter_mut().enumerate() {
                    player.team_id = TeamId::for_seat(seat);
                }
                self.log(format!("{} was removed from the table", kicked.name));
            }

            GameAction::SwitchTeam {
                player_id,
                target_id,
            } => {
                self.require_phase(GamePhase::Lobby)?;
                if player_id != target_id {
                    self.require_host(&player_id)?;
                }
                let target = self.index_of(&target_id)?;
                let destination = self.players[target].team_id.other();
                if self.team_size(destination) >= MAX_TEAM_SIZE {
                    return Err(GameError::TeamFull);
                }

                self.players[target].team_id = destination;
                let message = format!(
                    "{} switched to {}",
                    self.players[target].name,
                    self.teams.get(destination).name
                );
                self.log(message);
            }

            GameAction::StartGame { player_id } => {
                self.require_phase(GamePhase::Lobby)?;
                self.require_host(&player_id)?;
                if self.team_size(TeamId::A) == 0 || self.team_size(TeamId::B) == 0 {
                    return Err(GameError::NotEnoughPlayers);
                }

                self.seat_players();
                for team in self.teams.iter_mut() {
                    team.reset_all();
                }
                self.last_round = None;
                self.round_number = 1;
                let starter = rng.gen_range(0..self.players.len());
                self.deal_round(starter, rng);
                self.log("Game started!".to_string());
            }

            // ==================== Turn ====================
            GameAction::DrawCard { player_id } => {
                let idx = self.require_turn(&player_id, TurnPhase::WaitingForDraw)?;
                let card = self.deck.pop().ok_or(GameError::DeckEmpty)?;

                if self.first_turn.in_progress {
                    self.first_turn.last_drawn_card_id = Some(card.id.clone());
                }
                self.players[idx].hand.push(card);
                self.turn_phase = TurnPhase::Playing;
                self.log(format!("{} drew a card", self.players[idx].name));
            }

            GameAction::SweepPile { player_id } => {
                let idx = self.require_turn(&player_id, TurnPhase::WaitingForDraw)?;
                if self.discard_pile.is_empty() {
                    return Err(GameError::DiscardPileEmpty);
                }

                let swept = std::mem::take(&mut self.discard_pile);
                let hand = &mut self.players[idx].hand;
                hand.extend(swept.iter().cloned());
                sort_hand(hand);

                self.log(format!(
                    "{} swept the pile ({} cards)",
                    self.players[idx].name,
                    swept.len()
                ));
                self.swept_cards = swept;
                self.has_swept = true;
                self.must_meld_after_sweep = true;
                self.first_turn.last_drawn_card_id = None;
                self.turn_phase = TurnPhase::Playing;
            }

            GameAction::MeldCards {
                player_id,
                card_ids,
            } => {
                let idx = self.require_turn(&player_id, TurnPhase::Playing)?;
                if card_ids.is_empty() {
                    return Err(GameError::EmptySelection);
                }
                let cards = self.players[idx]
                    .find_cards(&card_ids)
                    .ok_or(GameError::CardNotInHand)?;
                let check = validate_meld(&cards)?;
                let team_id = self.players[idx].team_id;
                self.ensure_card_kept(idx, cards.len())?;

                self.players[idx].remove_cards(&card_ids);
                let team = self.teams.get_mut(team_id);
                let meld_id: MeldId = format!("{:?}{}-{}", team_id, self.round_number, team.melds.len());
                team.melds.push(Meld::from_check(meld_id, check));
                self.must_meld_after_sweep = false;

                self.log(format!(
                    "{} melded {} cards",
                    self.players[idx].name,
                    cards.len()
                ));
                self.claim_mour_if_empty(idx);
            }

            GameAction::AddToMeld {
                player_id,
                meld_id,
                card_ids,
            } => {
                let idx = self.require_turn(&player_id, TurnPhase::Playing)?;
                if card_ids.is_empty() {
                    return Err(GameError::EmptySelection);
                }
                let cards = self.players[idx]
                    .find_cards(&card_ids)
                    .ok_or(GameError::CardNotInHand)?;
                let team_id = self.players[idx].team_id;
                let position = self
                    .teams
                    .get(team_id)
                    .melds
                    .iter()
                    .position(|m| m.id == meld_id)
                    .ok_or(GameError::MeldNotFound)?;
                let check = validate_extension(&self.teams.get(team_id).melds[position], &cards)?;
                self.ensure_card_kept(idx, cards.len())?;

                self.players[idx].remove_cards(&card_ids);
                self.teams.get_mut(team_id).melds[position].absorb(check);
                self.must_meld_after_sweep = false;

                self.log(format!(
                    "{} added {} cards to a meld",
                    self.players[idx].name,
                    cards.len()
                ));
                self.claim_mour_if_empty(idx);
            }

            GameAction::DiscardCard {
                player_id,
                card_id,
                draw_again,
            } => {
                let idx = self.require_turn(&player_id, TurnPhase::Playing)?;
                if !self.players[idx].holds(&card_id) {
                    return Err(GameError::CardNotInHand);
                }

                if self.must_meld_after_sweep {
                    self.roll_back_sweep(idx);
                    return Ok(());
                }

                if draw_again {
                    return self.discard_and_draw_again(idx, card_id);
                }

                let card = self.remove_from_hand(idx, &card_id)?;
                self.discard_pile.push(card);

                let team_id = self.players[idx].team_id;
                if self.players[idx].hand.is_empty() {
                    if self.teams.get(team_id).has_taken_mour {
                        self.finish_round(team_id);
                        return Ok(());
                    }
                    self.claim_mour_if_empty(idx);
                }

                self.advance_turn(idx);
            }

            GameAction::ReorderHand {
                player_id,
                new_order,
            } => {
                let idx = self.index_of(&player_id)?;
                let player = &mut self.players[idx];
                if new_order.len() != player.hand.len() {
                    return Err(GameError::InvalidReorder);
                }
                player.hand = player
                    .find_cards(&new_order)
                    .ok_or(GameError::InvalidReorder)?;
            }

            // ==================== Session ====================
            GameAction::PlayerLeft { player_id } => {
                let idx = self.index_of(&player_id)?;
                let departed = self.players.remove(idx);

                if departed.is_host {
                    *self = Self::new();
                    self.log(format!("{} (host) left. The table was closed.", departed.name));
                } else if self.phase == GamePhase::Lobby {
                    self.log(format!("{} left the table", departed.name));
                } else {
                    self.return_to_lobby();
                    self.log(format!(
                        "{} left the match. Returning to lobby.",
                        departed.name
                    ));
                }
            }

            GameAction::NextRound { player_id } => {
                self.require_phase(GamePhase::RoundEnd)?;
                self.require_host(&player_id)?;

                let count = self.players.len();
                let previous = self
                    .round_starter_id
                    .as_deref()
                    .and_then(|id| self.players.iter().position(|p| p.id == id))
                    .unwrap_or(0);
                let starter = (previous + count - 1) % count;

                self.round_number += 1;
                self.deal_round(starter, rng);
                self.log(format!("Round {} started!", self.round_number));
            }

            GameAction::ResetGame { player_id } => {
                self.require_host(&player_id)?;
                self.return_to_lobby();
                self.log("Game reset".to_string());
            }

            GameAction::SyncState { state } => {
                *self = *state;
            }
        }

        Ok(())
    }

    // ==================== Helper Methods ====================

    fn log(&mut self, message: String) {
        self.logs.push(message);
    }

    fn index_of(&self, id: &str) -> Result<usize, GameError> {
        self.players
            .iter()
            .position(|p| p.id == id)
            .ok_or(GameError::UnknownPlayer)
    }

    fn team_size(&self, team: TeamId) -> usize {
        self.players.iter().filter(|p| p.team_id == team).count()
    }

    fn require_phase(&self, phase: GamePhase) -> Result<(), GameError> {
        if self.phase != phase {
            return Err(GameError::InvalidPhase);
        }
        Ok(())
    }

    fn require_host(&self, id: &str) -> Result<(), GameError> {
        match self.get_player(id) {
            Some(p) if p.is_host => Ok(()),
            Some(_) => Err(GameError::NotHost),
            None => Err(GameError::UnknownPlayer),
        }
    }

    /// Check turn ownership and turn phase, returning the actor's seat
    fn require_turn(&self, id: &str, turn_phase: TurnPhase) -> Result<usize, GameError> {
        self.require_phase(GamePhase::Playing)?;
        if self.current_turn_player_id.as_deref() != Some(id) {
            return Err(GameError::NotYourTurn);
        }
        if self.turn_phase != turn_phase {
            return Err(GameError::InvalidPhase);
        }
        self.index_of(id)
    }

    /// Once the Mour is taken a player must keep a card for the final discard
    fn ensure_card_kept(&self, idx: usize, removing: usize) -> Result<(), GameError> {
        let player = &self.players[idx];
        if player.hand.len() == removing && self.teams.get(player.team_id).has_taken_mour {
            return Err(GameError::MustKeepCard);
        }
        Ok(())
    }

    fn remove_from_hand(&mut self, idx: usize, card_id: &str) -> Result<Card, GameError> {
        let hand = &mut self.players[idx].hand;
        let position = hand
            .iter()
            .position(|c| c.id == card_id)
            .ok_or(GameError::CardNotInHand)?;
        Ok(hand.remove(position))
    }

    /// Interleave teams around the table: A, B, A, B
    fn seat_players(&mut self) {
        let (team_a, team_b): (Vec<Player>, Vec<Player>) = std::mem::take(&mut self.players)
            .into_iter()
            .partition(|p| p.team_id == TeamId::A);

        let mut a = team_a.into_iter();
        let mut b = team_b.into_iter();
        loop {
            let (next_a, next_b) = (a.next(), b.next());
            if next_a.is_none() && next_b.is_none() {
                break;
            }
            self.players.extend(next_a);
            self.players.extend(next_b);
        }
    }

    /// Shuffle, deal Mour piles and hands, flip the first discard
    fn deal_round<R: Rng + ?Sized>(&mut self, starter: usize, rng: &mut R) {
        let mut deck = shuffled_deck(rng);

        for team in self.teams.iter_mut() {
            team.reset_round();
            team.mour_pile = deck.drain(..MOUR_SIZE).collect();
        }
        for player in &mut self.players {
            player.hand = deck.drain(..HAND_SIZE).collect();
            sort_hand(&mut player.hand);
        }

        self.discard_pile = deck.pop().into_iter().collect();
        self.deck = deck;
        self.phase = GamePhase::Playing;
        self.current_turn_player_id = Some(self.players[starter].id.clone());
        self.round_starter_id = self.current_turn_player_id.clone();
        self.turn_phase = TurnPhase::WaitingForDraw;
        self.clear_sweep();
        self.first_turn = FirstTurn::begin();
    }

    fn clear_sweep(&mut self) {
        self.has_swept = false;
        self.must_meld_after_sweep = false;
        self.swept_cards.clear();
    }

    /// A player who empties their hand picks up their team's Mour
    fn claim_mour_if_empty(&mut self, idx: usize) {
        let team_id = self.players[idx].team_id;
        let team = self.teams.get_mut(team_id);
        if !self.players[idx].hand.is_empty() || team.has_taken_mour {
            return;
        }

        let mut mour = std::mem::take(&mut team.mour_pile);
        team.has_taken_mour = true;
        sort_hand(&mut mour);
        self.players[idx].hand = mour;
        self.log(format!("{} took the Mour!", self.players[idx].name));
    }

    /// Undo a sweep that was not followed by a meld
    fn roll_back_sweep(&mut self, idx: usize) {
        let swept = std::mem::take(&mut self.swept_cards);
        let swept_ids: Vec<CardId> = swept.iter().map(|c| c.id.clone()).collect();
        self.players[idx].remove_cards(&swept_ids);

        self.discard_pile.extend(swept);
        self.has_swept = false;
        self.must_meld_after_sweep = false;
        self.turn_phase = TurnPhase::WaitingForDraw;
        self.log(format!(
            "{} must meld after sweeping. The sweep was undone.",
            self.players[idx].name
        ));
    }

    fn discard_and_draw_again(&mut self, idx: usize, card_id: CardId) -> Result<(), GameError> {
        if !self.first_turn.can_redraw() || self.players[idx].hand.len() <= 1 {
            return Err(GameError::RedrawNotAllowed);
        }
        if self.first_turn.last_drawn_card_id.as_ref() != Some(&card_id) {
            return Err(GameError::MustDiscardDrawnCard);
        }

        let card = self.remove_from_hand(idx, &card_id)?;
        self.discard_pile.push(card);

        self.first_turn.redraws += 1;
        self.first_turn.last_drawn_card_id = None;
        self.turn_phase = TurnPhase::WaitingForDraw;
        self.log(format!(
            "{} discarded the drawn card to draw again",
            self.players[idx].name
        ));
        Ok(())
    }

    /// Pass the turn to the previous seat
    fn advance_turn(&mut self, idx: usize) {
        let count = self.players.len();
        let next = (idx + count - 1) % count;

        self.current_turn_player_id = Some(self.players[next].id.clone());
        self.turn_phase = TurnPhase::WaitingForDraw;
        self.clear_sweep();
        self.first_turn.in_progress = false;
        self.first_turn.last_drawn_card_id = None;
    }

    /// Score the round after a team went out
    fn finish_round(&mut self, went_out: TeamId) {
        let breakdown_for = |state: &GameState, team_id: TeamId| -> ScoreBreakdown {
            let team = state.teams.get(team_id);
            let hands: Vec<Card> = state
                .players
                .iter()
                .filter(|p| p.team_id == team_id)
                .flat_map(|p| p.hand.iter().cloned())
                .collect();
            team_round_score(&team.melds, &hands, team.has_taken_mour, team_id == went_out)
        };
        let team_a = breakdown_for(self, TeamId::A);
        let team_b = breakdown_for(self, TeamId::B);

        self.teams.a.round_score = team_a.total;
        self.teams.a.total_score += team_a.total;
        self.teams.b.round_score = team_b.total;
        self.teams.b.total_score += team_b.total;

        let game_over = self.teams.iter().any(|t| t.total_score >= WINNING_SCORE);
        self.phase = if game_over {
            GamePhase::GameEnd
        } else {
            GamePhase::RoundEnd
        };
        self.clear_sweep();
        self.first_turn = FirstTurn::default();

        self.log(format!(
            "Round over! Score: {} {:+}, {} {:+}",
            self.teams.a.name, team_a.total, self.teams.b.name, team_b.total
        ));
        self.last_round = Some(RoundSummary {
            round_number: self.round_number,
            went_out,
            team_a,
            team_b,
        });
    }

    /// Back to the lobby with the current roster, keeping team names
    fn return_to_lobby(&mut self) {
        for player in &mut self.players {
            player.hand.clear();
        }
        for team in self.teams.iter_mut() {
            team.reset_all();
        }
        self.phase = GamePhase::Lobby;
        self.round_number = 0;
        self.deck.clear();
        self.discard_pile.clear();
        self.current_turn_player_id = None;
        self.turn_phase = TurnPhase::WaitingForDraw;
        self.clear_sweep();
        self.first_turn = FirstTurn::default();
        self.round_starter_id = None;
        self.last_round = None;
    }
}

/// Pure reducer: the next state for an intent, or an unchanged copy if the
/// intent is illegal.
pub fn reduce(state: &GameState, action: GameAction) -> GameState {
    reduce_with_rng(state, action, &mut rand::thread_rng())
}

/// [`reduce`] with an explicit random source for shuffles and starter choice
pub fn reduce_with_rng<R: Rng + ?Sized>(
    state: &GameState,
    action: GameAction,
    rng: &mut R,
) -> GameState {
    let mut next = state.clone();
    match next.apply_action(action, rng) {
        Ok(()) => next,
        Err(_) => state.clone(),
    }
}
