//! Dice rolling system
//!
//! Parses notation like "1d20", "1d8" or "1d6+2" and rolls it against an
//! injectable source of randomness, so combat can be replayed in tests.
//! Only the `<count>d<sides>` part of a notation is rolled; the modifier
//! comes from the roller.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::LazyLock;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{GameError, GameResult};

/// Source of individual die results
pub trait Dice: Send {
    /// Roll one die, returning a value in `1..=sides`
    fn roll_die(&mut self, sides: u32) -> u32;
}

/// Dice backed by any `rand` generator
#[derive(Debug, Clone)]
pub struct RngDice<R> {
    rng: R,
}

impl<R: Rng + Send> RngDice<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngDice<StdRng> {
    /// Reproducible dice for a given seed
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    /// Dice seeded from operating system entropy
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_os_rng())
    }
}

impl<R: Rng + Send> Dice for RngDice<R> {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.rng.random_range(1..=sides.max(1))
    }
}

/// Dice that replay a fixed sequence of results
///
/// Values larger than the die are clamped to its size. Once the script runs
/// out every roll comes up 1.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDice {
    rolls: VecDeque<u32>,
}

impl ScriptedDice {
    pub fn new(rolls: impl IntoIterator<Item = u32>) -> Self {
        Self {
            rolls: rolls.into_iter().collect(),
        }
    }

    /// Append more results to the end of the script
    pub fn push(&mut self, rolls: impl IntoIterator<Item = u32>) {
        self.rolls.extend(rolls);
    }

    pub fn remaining(&self) -> usize {
        self.rolls.len()
    }
}

impl Dice for ScriptedDice {
    fn roll_die(&mut self, sides: u32) -> u32 {
        match self.rolls.pop_front() {
            Some(roll) => roll.clamp(1, sides.max(1)),
            None => {
                warn!(sides, "Scripted dice exhausted, rolling 1");
                1
            }
        }
    }
}

/// Most dice a single notation may roll
pub const MAX_DICE: u32 = 100;

/// Largest die a notation may name
pub const MAX_SIDES: u32 = 1000;

/// A parsed dice roll specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceRoll {
    /// Number of dice to roll
    pub count: u32,
    /// Number of sides per die
    pub sides: u32,
    /// Notation as written, echoed in roll traces
    pub notation: String,
}

impl DiceRoll {
    pub fn new(count: u32, sides: u32) -> Self {
        Self {
            count,
            sides,
            notation: format!("{}d{}", count, sides),
        }
    }

    /// Roll the dice and add `modifier`
    ///
    /// Anything written after `<count>d<sides>` in the notation is not
    /// applied; callers pass the ability modifier that counts.
    pub fn roll(&self, dice: &mut dyn Dice, modifier: i32) -> RollResult {
        let rolls: Vec<u32> = (0..self.count)
            .map(|_| dice.roll_die(self.sides))
            .collect();
        let total: i32 = rolls.iter().map(|&r| r as i32).sum();
        let final_total = total + modifier;

        let joined = rolls
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let text = if modifier != 0 {
            format!(
                "Rolled {}: [{}] {} = {}",
                self.notation,
                joined,
                format_modifier(modifier),
                final_total
            )
        } else {
            format!("Rolled {}: [{}] = {}", self.notation, joined, final_total)
        };

        RollResult {
            total,
            rolls,
            modifier,
            final_total,
            text,
        }
    }

    /// Get the minimum possible result of the dice alone
    pub fn min(&self) -> i64 {
        i64::from(self.count)
    }

    /// Get the maximum possible result of the dice alone
    pub fn max(&self) -> i64 {
        i64::from(self.count) * i64::from(self.sides)
    }
}

impl FromStr for DiceRoll {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_dice(s)
    }
}

impl std::fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.notation)
    }
}

/// Outcome of a roll, with a human-readable trace for the game log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResult {
    /// Sum of the dice alone
    pub total: i32,
    /// Individual die results
    pub rolls: Vec<u32>,
    /// Everything added on top of the dice
    pub modifier: i32,
    /// `total + modifier`
    #[serde(rename = "final")]
    pub final_total: i32,
    pub text: String,
}

static DICE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)d(\d+)").unwrap());

/// Parse a dice notation string like "2d6" or "1d6+2"
///
/// The first `<count>d<sides>` in the string is the roll; surrounding text is
/// kept for the trace but otherwise ignored.
pub fn parse_dice(notation: &str) -> GameResult<DiceRoll> {
    let notation = notation.trim();
    let invalid = || GameError::InvalidNotation(notation.to_string());

    let normalized = notation.to_lowercase();
    let caps = DICE_REGEX.captures(&normalized).ok_or_else(invalid)?;

    let count: u32 = caps[1].parse().map_err(|_| invalid())?;
    let sides: u32 = caps[2].parse().map_err(|_| invalid())?;
    if !(1..=MAX_DICE).contains(&count) || !(1..=MAX_SIDES).contains(&sides) {
        return Err(invalid());
    }

    Ok(DiceRoll {
        count,
        sides,
        notation: notation.to_string(),
    })
}

/// Roll `notation`, adding `modifier` to the result
pub fn roll_dice(dice: &mut dyn Dice, notation: &str, modifier: i32) -> GameResult<RollResult> {
    Ok(parse_dice(notation)?.roll(dice, modifier))
}

/// Roll a d20 attack with the given bonus
pub fn roll_attack(dice: &mut dyn Dice, bonus: i32) -> RollResult {
    let roll = dice.roll_die(20);
    let final_total = roll as i32 + bonus;
    RollResult {
        total: roll as i32,
        rolls: vec![roll],
        modifier: bonus,
        final_total,
        text: format!(
            "Attack Roll: [{}] {} = {}",
            roll,
            format_modifier(bonus),
            final_total
        ),
    }
}

/// Ability modifier for a score: floor((score - 10) / 2)
pub fn ability_modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

/// Render a modifier with an explicit sign
pub fn format_modifier(modifier: i32) -> String {
    if modifier >= 0 {
        format!("+{}", modifier)
    } else {
        modifier.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let roll = parse_dice("2d6").unwrap();
        assert_eq!(roll.count, 2);
        assert_eq!(roll.sides, 6);
        assert_eq!(roll.notation, "2d6");
    }

    #[test]
    fn test_parse_keeps_written_notation() {
        let roll = parse_dice(" 1d6+2 ").unwrap();
        assert_eq!((roll.count, roll.sides), (1, 6));
        assert_eq!(roll.notation, "1d6+2");
        assert_eq!(parse_dice("2D10").unwrap().count, 2);
    }

    #[test]
    fn test_parse_invalid() {
        for bad in [
            "abc",
            "2d",
            "d6",
            "d",
            "0d6",
            "2d0",
            "",
            "99999999999d6",
            "4000000000d6",
            "101d6",
            "1d1001",
            "1d3000000000",
        ] {
            assert!(
                matches!(parse_dice(bad), Err(GameError::InvalidNotation(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(parse_dice("100d1000").is_ok());
    }

    #[test]
    fn test_display() {
        assert_eq!(DiceRoll::new(2, 6).to_string(), "2d6");
        assert_eq!(parse_dice("1d20+5").unwrap().to_string(), "1d20+5");
    }

    #[test]
    fn test_min_max() {
        let roll = DiceRoll::new(2, 6);
        assert_eq!(roll.min(), 2);
        assert_eq!(roll.max(), 12);
        assert_eq!(DiceRoll::new(MAX_DICE, MAX_SIDES).max(), 100_000);
    }

    #[test]
    fn test_roll_counts_and_bounds() {
        let mut dice = RngDice::seeded(7);
        for (count, sides) in [(1, 4), (3, 6), (2, 20), (10, 8)] {
            let notation = format!("{}d{}", count, sides);
            for modifier in [-3, 0, 4] {
                let result = roll_dice(&mut dice, &notation, modifier).unwrap();
                assert_eq!(result.rolls.len(), count as usize);
                assert!(result.rolls.iter().all(|r| (1..=sides).contains(r)));
                let sum: i32 = result.rolls.iter().map(|&r| r as i32).sum();
                assert_eq!(result.total, sum);
                assert_eq!(result.final_total, sum + modifier);
            }
        }
    }

    #[test]
    fn test_seeded_dice_are_reproducible() {
        let mut a = RngDice::seeded(42);
        let mut b = RngDice::seeded(42);
        let left: Vec<u32> = (0..20).map(|_| a.roll_die(20)).collect();
        let right: Vec<u32> = (0..20).map(|_| b.roll_die(20)).collect();
        assert_eq!(left, right);
    }

    #[test]
    fn test_written_modifier_is_not_applied() {
        let mut dice = ScriptedDice::new([3]);
        let result = roll_dice(&mut dice, "1d6+2", -1).unwrap();
        assert_eq!(result.total, 3);
        assert_eq!(result.modifier, -1);
        assert_eq!(result.final_total, 2);
        assert_eq!(result.text, "Rolled 1d6+2: [3] -1 = 2");
    }

    #[test]
    fn test_roll_text() {
        let mut dice = ScriptedDice::new([3, 5, 6]);
        let plain = roll_dice(&mut dice, "1d8", 0).unwrap();
        assert_eq!(plain.text, "Rolled 1d8: [3] = 3");

        let negative = roll_dice(&mut dice, "2d6", -1).unwrap();
        assert_eq!(negative.text, "Rolled 2d6: [5, 6] -1 = 10");
    }

    #[test]
    fn test_roll_attack() {
        let mut dice = ScriptedDice::new([14]);
        let result = roll_attack(&mut dice, 5);
        assert_eq!(result.rolls, vec![14]);
        assert_eq!(result.total, 14);
        assert_eq!(result.final_total, 19);
        assert_eq!(result.text, "Attack Roll: [14] +5 = 19");
    }

    #[test]
    fn test_scripted_dice_clamp_and_exhaust() {
        let mut dice = ScriptedDice::new([25]);
        assert_eq!(dice.roll_die(20), 20);
        assert_eq!(dice.remaining(), 0);
        assert_eq!(dice.roll_die(20), 1);
    }

    #[test]
    fn test_ability_modifier() {
        assert_eq!(ability_modifier(10), 0);
        assert_eq!(ability_modifier(11), 0);
        assert_eq!(ability_modifier(16), 3);
        assert_eq!(ability_modifier(8), -1);
        assert_eq!(ability_modifier(9), -1);
        assert_eq!(ability_modifier(1), -5);
        assert_eq!(ability_modifier(30), 10);
    }

    #[test]
    fn test_format_modifier() {
        assert_eq!(format_modifier(0), "+0");
        assert_eq!(format_modifier(3), "+3");
        assert_eq!(format_modifier(-2), "-2");
    }
}
