//! Meld validation.
//!
//! A meld is a group of at least three cards forming either a RUN (same suit,
//! consecutive ranks) or a SET (same rank, only aces, twos and threes).
//! Devil Jokers and twos are wild. In a run an ace counts as 1 or 14, and a
//! two of the run's suit sits in its natural slot whenever the sequence can
//! cover rank 2.

use crate::card::{Card, Rank, Suit};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Minimum number of cards in a meld
pub const MIN_MELD_SIZE: usize = 3;

/// Highest run value (ace high)
const RUN_CEILING: u8 = 14;

/// Meld identifier, unique within a round
pub type MeldId = String;

/// Kind of meld
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeldType {
    Run,
    Set,
}

/// Why a group of cards is not a legal meld
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum MeldError {
    #[error("Meld must have at least 3 cards (got {0})")]
    TooFewCards(usize),

    #[error("The same card appears twice")]
    DuplicateCard,

    #[error("Set cards must all share one rank")]
    MixedRanks,

    #[error("Sets are only allowed for A, 2 and 3")]
    SetRankNotAllowed(Rank),

    #[error("Run cards must all share one suit")]
    MixedSuits,

    #[error("Run needs at least one natural card")]
    NoNaturalCards,

    #[error("Run contains the same rank twice")]
    DuplicateRank,

    #[error("Run has gaps needing {needed} wildcards but only {available} available")]
    NotEnoughWilds { needed: usize, available: usize },

    #[error("Run cannot be longer than 14 cards")]
    TooLong,

    #[error("Meld type cannot change from {from:?} to {to:?}")]
    TypeChanged { from: MeldType, to: MeldType },
}

/// Outcome of a successful validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeldCheck {
    pub meld_type: MeldType,
    /// Suit of a run
    pub base_suit: Option<Suit>,
    /// Rank of a set
    pub base_rank: Option<Rank>,
    /// Number of wildcard substitutions
    pub wild_count: u32,
    /// No substitutions used
    pub clean: bool,
    /// Cards in display order
    pub cards: Vec<Card>,
}

/// A meld on the table, owned by a team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meld {
    pub id: MeldId,
    #[serde(rename = "type")]
    pub meld_type: MeldType,
    pub cards: Vec<Card>,
    pub clean: bool,
    pub wild_count: u32,
    pub suit: Option<Suit>,
    pub rank: Option<Rank>,
}

impl Meld {
    /// Create a meld from a validation result
    pub fn from_check(id: MeldId, check: MeldCheck) -> Self {
        Self {
            id,
            meld_type: check.meld_type,
            cards: check.cards,
            clean: check.clean,
            wild_count: check.wild_count,
            suit: check.base_suit,
            rank: check.base_rank,
        }
    }

    /// Replace contents with a re-validated extension
    pub fn absorb(&mut self, check: MeldCheck) {
        self.cards = check.cards;
        self.clean = check.clean;
        self.wild_count = check.wild_count;
        self.suit = check.base_suit;
        self.rank = check.base_rank;
    }
}

/// Decide whether `cards` form a legal run or set
pub fn validate_meld(cards: &[Card]) -> Result<MeldCheck, MeldError> {
    if cards.len() < MIN_MELD_SIZE {
        return Err(MeldError::TooFewCards(cards.len()));
    }

    let mut seen = HashSet::new();
    if !cards.iter().all(|c| seen.insert(c.id.as_str())) {
        return Err(MeldError::DuplicateCard);
    }

    let set_error = match check_set(cards) {
        Ok(check) => return Ok(check),
        Err(e) => e,
    };

    match check_run(cards) {
        Ok(check) => Ok(check),
        Err(run_error) => {
            // A same-rank group of a forbidden rank reads better as a set failure
            if matches!(set_error, MeldError::SetRankNotAllowed(_)) {
                Err(set_error)
            } else {
                Err(run_error)
            }
        }
    }
}

/// Validate `meld` grown by `additions`; the meld type must not change
pub fn validate_extension(meld: &Meld, additions: &[Card]) -> Result<MeldCheck, MeldError> {
    let mut combined = meld.cards.clone();
    combined.extend_from_slice(additions);

    let check = validate_meld(&combined)?;
    if check.meld_type != meld.meld_type {
        return Err(MeldError::TypeChanged {
            from: meld.meld_type,
            to: check.meld_type,
        });
    }

    Ok(check)
}

fn check_set(cards: &[Card]) -> Result<MeldCheck, MeldError> {
    let naturals: Vec<&Card> = cards.iter().filter(|c| !c.is_wild()).collect();

    // Only wildcards: a set of twos
    let rank = naturals.first().map(|c| c.rank).unwrap_or(Rank::Two);

    if naturals.iter().any(|c| c.rank != rank) {
        return Err(MeldError::MixedRanks);
    }
    if !rank.can_form_set() {
        return Err(MeldError::SetRankNotAllowed(rank));
    }

    let substitutes = |c: &&Card| c.is_devil_joker || (c.rank == Rank::Two && rank != Rank::Two);

    let mut ordered: Vec<Card> = cards.iter().filter(|c| !substitutes(c)).cloned().collect();
    ordered.extend(cards.iter().filter(|c| substitutes(c)).cloned());

    let wild_count = cards.iter().filter(|c| substitutes(c)).count() as u32;

    Ok(MeldCheck {
        meld_type: MeldType::Set,
        base_suit: None,
        base_rank: Some(rank),
        wild_count,
        clean: wild_count == 0,
        cards: ordered,
    })
}

fn check_run(cards: &[Card]) -> Result<MeldCheck, MeldError> {
    let naturals: Vec<&Card> = cards.iter().filter(|c| !c.is_wild()).collect();
    let wilds: Vec<&Card> = cards.iter().filter(|c| c.is_wild()).collect();

    let suit = naturals
        .first()
        .map(|c| c.suit)
        .ok_or(MeldError::NoNaturalCards)?;
    if naturals.iter().any(|c| c.suit != suit) {
        return Err(MeldError::MixedSuits);
    }

    // Ace low first, then ace high
    match place_run(&naturals, &wilds, suit, 1) {
        Ok(check) => Ok(check),
        Err(_) => place_run(&naturals, &wilds, suit, RUN_CEILING),
    }
}

fn place_run(
    naturals: &[&Card],
    wilds: &[&Card],
    suit: Suit,
    ace_value: u8,
) -> Result<MeldCheck, MeldError> {
    let mut valued: Vec<(u8, &Card)> = naturals
        .iter()
        .map(|c| {
            let value = if c.rank == Rank::Ace {
                ace_value
            } else {
                c.rank.run_value()
            };
            (value, *c)
        })
        .collect();
    valued.sort_by_key(|(value, _)| *value);

    if valued.windows(2).any(|w| w[0].0 == w[1].0) {
        return Err(MeldError::DuplicateRank);
    }

    let len = naturals.len() + wilds.len();
    if len > RUN_CEILING as usize {
        return Err(MeldError::TooLong);
    }

    let (low, high) = match (valued.first(), valued.last()) {
        (Some(first), Some(last)) => (first.0, last.0),
        _ => return Err(MeldError::NoNaturalCards),
    };

    let span = (high - low + 1) as usize;
    if span > len {
        return Err(MeldError::NotEnoughWilds {
            needed: span - naturals.len(),
            available: wilds.len(),
        });
    }

    // Feasible start values; surplus wildcards extend upwards first
    let len_u8 = len as u8;
    let min_start = if high + 1 > len_u8 { high + 1 - len_u8 } else { 1 };
    let max_start = low.min(RUN_CEILING + 1 - len_u8);
    let mut start = max_start;
    let mut natural_two = None;

    // A two of the run's suit stays natural whenever rank 2 can be covered
    if let Some(index) = wilds
        .iter()
        .position(|c| !c.is_devil_joker && c.rank == Rank::Two && c.suit == suit)
    {
        let candidate = max_start.min(2);
        if candidate >= min_start {
            start = candidate;
            natural_two = Some(index);
        }
    }

    let skip = natural_two;
    let mut substitutes = wilds
        .iter()
        .enumerate()
        .filter(move |(i, _)| Some(*i) != skip)
        .map(|(_, c)| *c);
    let mut naturals_iter = valued.iter().peekable();
    let mut ordered = Vec::with_capacity(len);
    let mut wild_count = 0;

    for value in start..start + len_u8 {
        if let Some((_, card)) = naturals_iter.next_if(|(v, _)| *v == value) {
            ordered.push((*card).clone());
        } else if let Some(index) = natural_two.filter(|_| value == 2) {
            ordered.push(wilds[index].clone());
            natural_two = None;
        } else if let Some(card) = substitutes.next() {
            ordered.push(card.clone());
            wild_count += 1;
        }
    }

    Ok(MeldCheck {
        meld_type: MeldType::Run,
        base_suit: Some(suit),
        base_rank: None,
        wild_count,
        clean: wild_count == 0,
        cards: ordered,
    })
}
