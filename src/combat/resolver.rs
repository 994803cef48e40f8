//! Action resolution
//!
//! Resolving a player action happens in two steps. [`plan_player_action`]
//! checks the action against the current revision, rolls the dice and logs
//! the rolls, but changes nothing. If the outcome needs narrating, the caller
//! sends the prompt to the gateway and, once the text is back and the revision
//! is still current, calls [`commit`] to produce the next revision. Either the
//! whole transition lands or none of it does.

use tracing::debug;

use super::dice::{parse_dice, roll_attack, Dice};
use super::turn::{advance_turn, end_combat, start_combat};
use crate::error::GameResult;
use crate::log::GameLog;
use crate::narrative::prompts;
use crate::state::GameState;

/// Player actions that go through the turn rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerAction {
    Attack { target: Option<String> },
    Search,
}

/// What planning an action produced
#[derive(Debug, Clone)]
pub enum Plan {
    /// Refused with a system message; state unchanged
    Rejected,
    /// Resolved without narration
    Done(GameState),
    /// Resolved once the narration for it arrives
    Narrate(PendingOutcome),
}

#[derive(Debug, Clone)]
pub struct PendingOutcome {
    pub prompt: String,
    pub outcome: Outcome,
}

/// A rolled result waiting to be applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    PlayerHit { target: String, damage: i32 },
    PlayerMiss,
    Search,
    EnemyHit { attacker: String, damage: i32 },
    EnemyMiss,
}

/// Check and roll a player action against `state`
///
/// Rejections are logged as system entries and leave `state` as it was.
/// Starting combat needs no narration and comes back as [`Plan::Done`].
pub fn plan_player_action(
    state: &GameState,
    action: &PlayerAction,
    dice: &mut dyn Dice,
    log: &mut GameLog,
) -> GameResult<Plan> {
    match action {
        PlayerAction::Attack { .. } if !state.in_combat() => {
            Ok(initiate_combat(state, dice, log))
        }
        _ if !state.is_player_turn() => Ok(reject(log, "It is not your turn!")),
        PlayerAction::Attack { target: None } => Ok(reject(log, "Choose a target to attack.")),
        PlayerAction::Attack {
            target: Some(target),
        } => plan_attack(state, target, dice, log),
        PlayerAction::Search => Ok(plan_search(state, log)),
    }
}

fn reject(log: &mut GameLog, message: &str) -> Plan {
    debug!(reason = message, "Action rejected");
    log.system(message);
    Plan::Rejected
}

fn initiate_combat(state: &GameState, dice: &mut dyn Dice, log: &mut GameLog) -> Plan {
    let Some(pc) = state.player() else {
        return reject(log, "There is no one to fight for you.");
    };

    let mut participants = vec![pc.id.clone()];
    participants.extend(state.standing_enemies().map(|e| e.id.clone()));
    if participants.len() == 1 {
        return reject(log, "There is nothing here to fight.");
    }

    log.system("Combat has begun!");
    Plan::Done(start_combat(state, &participants, dice, log))
}

fn plan_attack(
    state: &GameState,
    target_id: &str,
    dice: &mut dyn Dice,
    log: &mut GameLog,
) -> GameResult<Plan> {
    let Some(pc) = state.player() else {
        return Ok(reject(log, "There is no one to act."));
    };
    let Some(target) = state.enemies.get(target_id).filter(|e| !e.defeated) else {
        return Ok(reject(log, "There is no such foe to attack."));
    };
    let Some(weapon) = pc.weapon() else {
        return Ok(reject(log, &format!("{} has no weapon to attack with.", pc.name)));
    };
    let damage_dice = parse_dice(weapon.damage.as_deref().unwrap_or_default())?;

    log.combat(format!(
        "{} attacks {} with {}!",
        pc.name, target.name, weapon.name
    ));
    let attack = roll_attack(dice, pc.attack_bonus());
    log.dice(attack.text.clone());

    if attack.final_total >= target.armor_class {
        let damage_roll = damage_dice.roll(dice, pc.abilities.str_mod());
        log.dice(format!("Damage: {}", damage_roll.text));
        let damage = damage_roll.final_total.max(0);
        let finishing_blow = target.hit_points.current - damage <= 0;

        Ok(Plan::Narrate(PendingOutcome {
            prompt: prompts::player_hit(pc, &weapon.name, target, damage, finishing_blow),
            outcome: Outcome::PlayerHit {
                target: target.id.clone(),
                damage,
            },
        }))
    } else {
        Ok(Plan::Narrate(PendingOutcome {
            prompt: prompts::player_miss(pc, &weapon.name, target),
            outcome: Outcome::PlayerMiss,
        }))
    }
}

fn plan_search(state: &GameState, log: &mut GameLog) -> Plan {
    let Some(pc) = state.player() else {
        return reject(log, "There is no one to act.");
    };
    log.system(format!("{} searches the area.", pc.name));
    Plan::Narrate(PendingOutcome {
        prompt: prompts::search(pc, state),
        outcome: Outcome::Search,
    })
}

/// Apply a narrated outcome to the revision it was planned against
///
/// Player outcomes finish the player's turn here: combat ends when the last
/// enemy falls, otherwise the turn passes on (searching outside combat has no
/// turn to pass). Enemy outcomes leave the turn where it is; the enemy agent
/// passes it on after its pause.
pub fn commit(
    state: &GameState,
    outcome: &Outcome,
    narrative: &str,
    log: &mut GameLog,
) -> GameState {
    log.narrative(narrative);

    match outcome {
        Outcome::PlayerHit { target, damage } => {
            let Some((next, result)) = state.apply_damage(target, *damage) else {
                return advance_turn(state, log);
            };
            debug!(target = %target, damage, hp = result.hit_points.current, "Player hit");
            if next.all_enemies_defeated() {
                end_combat(&next, log)
            } else {
                advance_turn(&next, log)
            }
        }
        Outcome::PlayerMiss => advance_turn(state, log),
        Outcome::Search => {
            if state.in_combat() {
                advance_turn(state, log)
            } else {
                state.clone()
            }
        }
        Outcome::EnemyHit { attacker, damage } => {
            let Some(pc) = state.player() else {
                return state.clone();
            };
            let Some((next, result)) = state.apply_damage(&pc.id, *damage) else {
                return state.clone();
            };
            debug!(attacker = %attacker, damage, hp = result.hit_points.current, "Enemy hit");
            if result.dropped {
                log.system(format!("{} has fallen!", pc.name));
            }
            next
        }
        Outcome::EnemyMiss => state.clone(),
    }
}
