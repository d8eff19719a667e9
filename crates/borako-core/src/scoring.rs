//! Round scoring.
//!
//! Meld bonuses are awarded only to melds of seven or more cards and are
//! divided by ten when they enter a team's round score. Card values are
//! already on the final scale.

use crate::card::{points_of, Card, Rank};
use crate::meld::{Meld, MeldType};
use serde::{Deserialize, Serialize};

/// Cards a meld needs before it earns a bonus
pub const BONUS_MELD_SIZE: usize = 7;

/// Points for going out
pub const GO_OUT_BONUS: f64 = 10.0;

/// Penalty for a team that never took its Mour pile
pub const MOUR_PENALTY: f64 = 10.0;

/// Bonus that only counts alongside a bigger one
const DEPENDENT_BONUS: u32 = 100;

/// Bonus level that unlocks dependent bonuses
const ANCHOR_BONUS: u32 = 200;

/// Raw bonus of a single meld, ignoring the rest of the team's table
pub fn meld_bonus(meld: &Meld) -> u32 {
    if meld.cards.len() < BONUS_MELD_SIZE {
        return 0;
    }

    match (meld.meld_type, meld.rank) {
        (MeldType::Run, _) => match (meld.clean, meld.wild_count) {
            (true, _) => 200,
            (false, 1) => 100,
            _ => 0,
        },
        (MeldType::Set, Some(Rank::Ace | Rank::Three)) => match (meld.clean, meld.wild_count) {
            (true, _) => 300,
            (false, 1) => 150,
            _ => 0,
        },
        (MeldType::Set, Some(Rank::Two)) => match (meld.clean, meld.wild_count) {
            (true, _) => 400,
            (false, 1) => 200,
            _ => 0,
        },
        _ => 0,
    }
}

/// Bonuses of a team's melds after the 100-point rule: a 100 bonus is zeroed
/// unless some meld of the team earns 200 or more.
pub fn effective_bonuses(melds: &[Meld]) -> Vec<u32> {
    let raw: Vec<u32> = melds.iter().map(meld_bonus).collect();
    let anchored = raw.iter().any(|&b| b >= ANCHOR_BONUS);

    raw.into_iter()
        .map(|b| {
            if b == DEPENDENT_BONUS && !anchored {
                0
            } else {
                b
            }
        })
        .collect()
}

/// Value shown on a meld badge: adjusted bonus / 10 plus its card values,
/// rounded to a whole number.
pub fn displayed_meld_value(meld: &Meld, team_melds: &[Meld]) -> i64 {
    let anchored = team_melds.iter().any(|m| meld_bonus(m) >= ANCHOR_BONUS);
    let bonus = match meld_bonus(meld) {
        DEPENDENT_BONUS if !anchored => 0,
        b => b,
    };

    (bonus as f64 / 10.0 + points_of(&meld.cards)).round() as i64
}

/// Itemized round score of one team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Bonus of each meld before the 100-point rule
    pub raw_bonuses: Vec<u32>,
    /// Bonus of each meld after the 100-point rule
    pub effective_bonuses: Vec<u32>,
    /// Sum of effective bonuses
    pub meld_bonus: u32,
    /// `meld_bonus / 10`
    pub meld_bonus_scaled: f64,
    /// Point values of all cards in the team's melds
    pub meld_card_points: f64,
    /// Point values of cards left in the team's hands
    pub hand_penalty: f64,
    pub mour_penalty: f64,
    pub go_out_bonus: f64,
    pub total: f64,
}

/// Score one team's round
pub fn team_round_score(
    melds: &[Meld],
    hand_cards: &[Card],
    has_taken_mour: bool,
    went_out: bool,
) -> ScoreBreakdown {
    let raw_bonuses: Vec<u32> = melds.iter().map(meld_bonus).collect();
    let effective = effective_bonuses(melds);
    let meld_bonus: u32 = effective.iter().sum();
    let meld_bonus_scaled = meld_bonus as f64 / 10.0;

    let meld_card_points: f64 = melds.iter().map(|m| points_of(&m.cards)).sum();
    let hand_penalty = points_of(hand_cards);
    let mour_penalty = if has_taken_mour { 0.0 } else { MOUR_PENALTY };
    let go_out_bonus = if went_out { GO_OUT_BONUS } else { 0.0 };

    let total = meld_bonus_scaled + meld_card_points + go_out_bonus - hand_penalty - mour_penalty;

    ScoreBreakdown {
        raw_bonuses,
        effective_bonuses: effective,
        meld_bonus,
        meld_bonus_scaled,
        meld_card_points,
        hand_penalty,
        mour_penalty,
        go_out_bonus,
        total,
    }
}
