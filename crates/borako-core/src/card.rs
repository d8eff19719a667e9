//! Cards and the game deck.
//!
//! This module contains:
//! - Suit and rank enums with their run values
//! - The `Card` struct with stable ids and point values
//! - Construction and shuffling of the 106-card pool
//! - Canonical hand ordering

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Number of cards in the full pool: two standard decks plus two Devil Jokers
pub const DECK_SIZE: usize = 106;

/// Number of Devil Jokers in the pool
pub const DEVIL_JOKERS: usize = 2;

/// Stable card identifier, unique across the pool
pub type CardId = String;

/// Card suit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Suit {
    Clubs,
    Diamonds,
    Spades,
    Hearts,
}

impl Suit {
    /// All suits in canonical hand order
    pub const ALL: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Spades, Suit::Hearts];

    /// Position in canonical hand order
    pub fn order(&self) -> u8 {
        match self {
            Suit::Clubs => 0,
            Suit::Diamonds => 1,
            Suit::Spades => 2,
            Suit::Hearts => 3,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Suit::Clubs => "CLUBS",
            Suit::Diamonds => "DIAMONDS",
            Suit::Spades => "SPADES",
            Suit::Hearts => "HEARTS",
        }
    }

    fn symbol(&self) -> char {
        match self {
            Suit::Clubs => '♣',
            Suit::Diamonds => '♦',
            Suit::Spades => '♠',
            Suit::Hearts => '♥',
        }
    }
}

/// Card rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rank {
    #[serde(rename = "A")]
    Ace,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "10")]
    Ten,
    #[serde(rename = "J")]
    Jack,
    #[serde(rename = "Q")]
    Queen,
    #[serde(rename = "K")]
    King,
}

impl Rank {
    /// All ranks, ace low
    pub const ALL: [Rank; 13] = [
        Rank::Ace,
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
    ];

    /// Numeric value in a run. Aces report 1; the run solver also tries 14.
    pub fn run_value(&self) -> u8 {
        match self {
            Rank::Ace => 1,
            Rank::Two => 2,
            Rank::Three => 3,
            Rank::Four => 4,
            Rank::Five => 5,
            Rank::Six => 6,
            Rank::Seven => 7,
            Rank::Eight => 8,
            Rank::Nine => 9,
            Rank::Ten => 10,
            Rank::Jack => 11,
            Rank::Queen => 12,
            Rank::King => 13,
        }
    }

    /// Strength used for hand sorting (ace high)
    pub fn sort_value(&self) -> u8 {
        match self {
            Rank::Ace => 14,
            other => other.run_value(),
        }
    }

    /// Points this rank is worth in melds and as a hand penalty
    pub fn points(&self) -> f64 {
        match self {
            Rank::Ace => 1.5,
            Rank::Two => 1.0,
            Rank::Three | Rank::Four | Rank::Five | Rank::Six | Rank::Seven => 0.5,
            Rank::Eight | Rank::Nine | Rank::Ten | Rank::Jack | Rank::Queen | Rank::King => 1.0,
        }
    }

    /// Ranks that may form a set
    pub fn can_form_set(&self) -> bool {
        matches!(self, Rank::Ace | Rank::Two | Rank::Three)
    }

    fn code(&self) -> &'static str {
        match self {
            Rank::Ace => "A",
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
        }
    }
}

/// A single playing card.
///
/// Devil Jokers carry a nominal suit and rank (hearts/spades two) so that
/// every card has the same shape; `is_devil_joker` is what makes them wild.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub suit: Suit,
    pub rank: Rank,
    #[serde(default)]
    pub is_devil_joker: bool,
}

impl Card {
    /// Create a standard card from deck `deck_index`
    pub fn new(suit: Suit, rank: Rank, deck_index: u8) -> Self {
        Self {
            id: format!("{}-{}-{}", suit.code(), rank.code(), deck_index),
            suit,
            rank,
            is_devil_joker: false,
        }
    }

    /// Create one of the two Devil Jokers
    pub fn devil_joker(index: u8) -> Self {
        Self {
            id: format!("JOKER-{}", index),
            suit: if index % 2 == 0 { Suit::Hearts } else { Suit::Spades },
            rank: Rank::Two,
            is_devil_joker: true,
        }
    }

    /// Jokers and every two may substitute for another card
    pub fn is_wild(&self) -> bool {
        self.is_devil_joker || self.rank == Rank::Two
    }

    /// Point value of this card
    pub fn points(&self) -> f64 {
        if self.is_devil_joker {
            1.0
        } else {
            self.rank.points()
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_devil_joker {
            write!(f, "Joker")
        } else {
            write!(f, "{}{}", self.rank.code(), self.suit.symbol())
        }
    }
}

/// Sum of point values of a group of cards
pub fn points_of(cards: &[Card]) -> f64 {
    cards.iter().map(Card::points).sum()
}

/// Build the unshuffled 106-card pool
pub fn full_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(DECK_SIZE);

    for deck_index in 0..2 {
        for suit in Suit::ALL {
            for rank in Rank::ALL {
                deck.push(Card::new(suit, rank, deck_index));
            }
        }
    }

    for index in 0..DEVIL_JOKERS as u8 {
        deck.push(Card::devil_joker(index));
    }

    deck
}

/// Shuffle cards in place (Fisher-Yates)
pub fn shuffle<R: Rng + ?Sized>(cards: &mut [Card], rng: &mut R) {
    cards.shuffle(rng);
}

/// Build and shuffle a fresh pool for a round
pub fn shuffled_deck<R: Rng + ?Sized>(rng: &mut R) -> Vec<Card> {
    let mut deck = full_deck();
    shuffle(&mut deck, rng);
    deck
}

/// Canonical hand ordering: Devil Jokers first, then by suit
/// (clubs, diamonds, spades, hearts), then by rank descending with ace high.
pub fn compare_for_hand(a: &Card, b: &Card) -> Ordering {
    b.is_devil_joker
        .cmp(&a.is_devil_joker)
        .then_with(|| a.suit.order().cmp(&b.suit.order()))
        .then_with(|| b.rank.sort_value().cmp(&a.rank.sort_value()))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort a hand into canonical order
pub fn sort_hand(cards: &mut [Card]) {
    cards.sort_by(compare_for_hand);
}
