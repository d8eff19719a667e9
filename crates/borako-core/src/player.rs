//! Players and teams.
//!
//! This module contains:
//! - Player struct with hand and team assignment
//! - Team struct with melds, Mour pile and scores
//! - The two-team container used by the game state

use crate::card::{Card, CardId};
use crate::meld::Meld;
use serde::{Deserialize, Serialize};

/// Player identifier; the peer id of the participant's process
pub type PlayerId = String;

/// Team identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeamId {
    A,
    B,
}

impl TeamId {
    /// Team for a seat index when balancing A, B, A, B
    pub fn for_seat(index: usize) -> Self {
        if index % 2 == 0 {
            TeamId::A
        } else {
            TeamId::B
        }
    }

    pub fn other(&self) -> Self {
        match self {
            TeamId::A => TeamId::B,
            TeamId::B => TeamId::A,
        }
    }
}

/// A seated participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    /// Display name
    pub name: String,
    /// Cards in hand, in the order the player arranged them
    pub hand: Vec<Card>,
    pub team_id: TeamId,
    pub is_host: bool,
}

impl Player {
    /// Create a player with an empty hand
    pub fn new(id: PlayerId, name: String, team_id: TeamId, is_host: bool) -> Self {
        Self {
            id,
            name,
            hand: Vec::new(),
            team_id,
            is_host,
        }
    }

    /// Check whether the hand holds a card
    pub fn holds(&self, card_id: &str) -> bool {
        self.hand.iter().any(|c| c.id == card_id)
    }

    /// Look up cards in hand by id, preserving the requested order.
    /// Returns `None` if any id is missing or repeated.
    pub fn find_cards(&self, card_ids: &[CardId]) -> Option<Vec<Card>> {
        let mut found: Vec<Card> = Vec::with_capacity(card_ids.len());
        for id in card_ids {
            if found.iter().any(|c| &c.id == id) {
                return None;
            }
            found.push(self.hand.iter().find(|c| &c.id == id)?.clone());
        }
        Some(found)
    }

    /// Remove cards from hand by id, keeping the order of the rest
    pub fn remove_cards(&mut self, card_ids: &[CardId]) {
        self.hand.retain(|c| !card_ids.contains(&c.id));
    }
}

/// One of the two partnerships
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    /// Display name
    pub name: String,
    /// Melds on the table this round
    pub melds: Vec<Meld>,
    /// Face-down reserve claimed by the first player to empty their hand
    pub mour_pile: Vec<Card>,
    pub has_taken_mour: bool,
    /// Cumulative score across rounds
    pub total_score: f64,
    /// Score of the last finished round
    pub round_score: f64,
}

impl Team {
    pub fn new(id: TeamId, name: String) -> Self {
        Self {
            id,
            name,
            melds: Vec::new(),
            mour_pile: Vec::new(),
            has_taken_mour: false,
            total_score: 0.0,
            round_score: 0.0,
        }
    }

    /// Default display name
    pub fn default_name(id: TeamId) -> String {
        match id {
            TeamId::A => "Team A".to_string(),
            TeamId::B => "Team B".to_string(),
        }
    }

    /// Clear per-round state, keeping the name and total score
    pub fn reset_round(&mut self) {
        self.melds.clear();
        self.mour_pile.clear();
        self.has_taken_mour = false;
        self.round_score = 0.0;
    }

    /// Clear everything except the name
    pub fn reset_all(&mut self) {
        self.reset_round();
        self.total_score = 0.0;
    }

    /// Number of cards in this team's melds
    pub fn melded_card_count(&self) -> usize {
        self.melds.iter().map(|m| m.cards.len()).sum()
    }
}

/// Both teams
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teams {
    #[serde(rename = "A")]
    pub a: Team,
    #[serde(rename = "B")]
    pub b: Team,
}

impl Teams {
    pub fn new(name_a: String, name_b: String) -> Self {
        Self {
            a: Team::new(TeamId::A, name_a),
            b: Team::new(TeamId::B, name_b),
        }
    }

    pub fn get(&self, id: TeamId) -> &Team {
        match id {
            TeamId::A => &self.a,
            TeamId::B => &self.b,
        }
    }

    pub fn get_mut(&mut self, id: TeamId) -> &mut Team {
        match id {
            TeamId::A => &mut self.a,
            TeamId::B => &mut self.b,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Team> {
        [&self.a, &self.b].into_iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Team> {
        [&mut self.a, &mut self.b].into_iter()
    }
}

impl Default for Teams {
    fn default() -> Self {
        Self::new(Team::default_name(TeamId::A), Team::default_name(TeamId::B))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Rank, Suit};

    fn player_with(cards: Vec<Card>) -> Player {
        let mut player = Player::new("p1".into(), "Test".into(), TeamId::A, false);
        player.hand = cards;
        player
    }

    #[test]
    fn test_seat_teams_alternate() {
        assert_eq!(TeamId::for_seat(0), TeamId::A);
        assert_eq!(TeamId::for_seat(1), TeamId::B);
        assert_eq!(TeamId::for_seat(2), TeamId::A);
        assert_eq!(TeamId::A.other(), TeamId::B);
    }

    #[test]
    fn test_find_cards_in_requested_order() {
        let five = Card::new(Suit::Clubs, Rank::Five, 0);
        let six = Card::new(Suit::Clubs, Rank::Six, 0);
        let player = player_with(vec![five.clone(), six.clone()]);

        let found = player.find_cards(&[six.id.clone(), five.id.clone()]).unwrap();
        assert_eq!(found, vec![six.clone(), five.clone()]);

        assert!(player.find_cards(&[five.id.clone(), five.id.clone()]).is_none());
        assert!(player.find_cards(&["HEARTS-A-0".to_string()]).is_none());
    }

    #[test]
    fn test_remove_cards_keeps_order() {
        let cards = vec![
            Card::new(Suit::Hearts, Rank::King, 0),
            Card::new(Suit::Clubs, Rank::Five, 0),
            Card::new(Suit::Spades, Rank::Ace, 1),
        ];
        let mut player = player_with(cards.clone());
        player.remove_cards(&[cards[1].id.clone()]);

        assert_eq!(player.hand, vec![cards[0].clone(), cards[2].clone()]);
    }

    #[test]
    fn test_team_reset_round_keeps_total() {
        let mut team = Team::new(TeamId::B, "Night Owls".into());
        team.total_score = 42.5;
        team.round_score = 12.0;
        team.has_taken_mour = true;
        team.mour_pile.push(Card::devil_joker(0));

        team.reset_round();
        assert_eq!(team.total_score, 42.5);
        assert_eq!(team.round_score, 0.0);
        assert!(!team.has_taken_mour);
        assert!(team.mour_pile.is_empty());
        assert_eq!(team.name, "Night Owls");
    }
}
