//! Combat system module
//!
//! Implements D&D-style combat with:
//! - Dice rolling (e.g., "2d6+3") through an injectable source
//! - Initiative, turn order and rounds
//! - Attack resolution with to-hit and damage
//! - An enemy agent that takes the non-player turns

pub mod dice;
pub mod enemy;
pub mod resolver;
pub mod turn;

pub use dice::{
    ability_modifier, format_modifier, parse_dice, roll_attack, roll_dice, Dice, DiceRoll,
    RngDice, RollResult, ScriptedDice,
};
pub use enemy::{plan_enemy_turn, EnemyPlan};
pub use resolver::{commit, plan_player_action, Outcome, PendingOutcome, Plan, PlayerAction};
pub use turn::{advance_turn, end_combat, enemy_turn_due, start_combat};
