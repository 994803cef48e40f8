//! Enemy agent
//!
//! Plays a non-player combatant's turn: one attack against the player with the
//! enemy's first listed attack. Planning rolls and logs; the outcome is applied
//! through [`commit`](super::resolver::commit) like any player action.

use tracing::{debug, warn};

use super::dice::{parse_dice, roll_attack, Dice};
use super::resolver::{Outcome, PendingOutcome};
use crate::log::GameLog;
use crate::narrative::prompts;
use crate::state::GameState;

/// What an enemy does with its turn
#[derive(Debug, Clone)]
pub enum EnemyPlan {
    /// Nothing to do; pass the turn straight on
    Skip,
    /// Attack, applied once the narration arrives
    Narrate(PendingOutcome),
}

/// Roll `enemy_id`'s attack on the player
///
/// Missing or defeated enemies, enemies without attacks and attacks with
/// unreadable damage notation all skip the turn.
pub fn plan_enemy_turn(
    state: &GameState,
    enemy_id: &str,
    dice: &mut dyn Dice,
    log: &mut GameLog,
) -> EnemyPlan {
    let Some(enemy) = state.enemies.get(enemy_id).filter(|e| !e.defeated) else {
        debug!(enemy = %enemy_id, "Enemy cannot act, skipping turn");
        return EnemyPlan::Skip;
    };
    let Some(pc) = state.player() else {
        return EnemyPlan::Skip;
    };
    let Some(attack) = enemy.attacks.first() else {
        debug!(enemy = %enemy_id, "Enemy has no attacks, skipping turn");
        return EnemyPlan::Skip;
    };
    let damage_dice = match parse_dice(&attack.damage) {
        Ok(dice) => dice,
        Err(e) => {
            warn!(enemy = %enemy_id, error = %e, "Enemy attack unusable");
            log.system(format!("{} fumbles: {}", enemy.name, e));
            return EnemyPlan::Skip;
        }
    };

    log.combat(format!("It's {}'s turn!", enemy.name));
    let roll = roll_attack(dice, attack.attack_bonus);
    log.dice(format!("{}'s {}: {}", enemy.name, attack.name, roll.text));

    if roll.final_total >= pc.armor_class {
        let damage_roll = damage_dice.roll(dice, enemy.abilities.str_mod());
        log.dice(format!("Damage: {}", damage_roll.text));
        let damage = damage_roll.final_total.max(0);

        EnemyPlan::Narrate(PendingOutcome {
            prompt: prompts::enemy_hit(enemy, attack, pc, damage),
            outcome: Outcome::EnemyHit {
                attacker: enemy.id.clone(),
                damage,
            },
        })
    } else {
        EnemyPlan::Narrate(PendingOutcome {
            prompt: prompts::enemy_miss(enemy, attack, pc),
            outcome: Outcome::EnemyMiss,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::dice::ScriptedDice;
    use crate::combat::resolver::commit;
    use crate::log::LogKind;
    use crate::state::initial_state;

    fn goblin_turn() -> GameState {
        let mut state = initial_state();
        state.scene.active_combatants = vec![
            "enemy_goblin_1".to_string(),
            "pc_theron".to_string(),
        ];
        state.scene.current_turn = Some("enemy_goblin_1".to_string());
        state.scene.round_number = 1;
        state
    }

    #[test]
    fn test_enemy_hit_rolls_with_strength() {
        let state = goblin_turn();
        let mut log = GameLog::new();
        // 14 + 4 = 18 meets AC 18; damage 3 - 1, the written +2 is not applied
        let mut dice = ScriptedDice::new([14, 3]);

        let EnemyPlan::Narrate(pending) =
            plan_enemy_turn(&state, "enemy_goblin_1", &mut dice, &mut log)
        else {
            panic!("expected an attack");
        };
        assert_eq!(
            pending.outcome,
            Outcome::EnemyHit {
                attacker: "enemy_goblin_1".to_string(),
                damage: 2
            }
        );
        assert_eq!(
            pending.prompt,
            "Describe Goblin Scout's successful Scimitar hitting Theron for 2 damage."
        );

        let contents: Vec<&str> = log.entries().iter().map(|e| e.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "It's Goblin Scout's turn!",
                "Goblin Scout's Scimitar: Attack Roll: [14] +4 = 18",
                "Damage: Rolled 1d6+2: [3] -1 = 2",
            ]
        );

        let next = commit(&state, &pending.outcome, "The blade nicks you.", &mut log);
        assert_eq!(next.player_characters["pc_theron"].hit_points.current, 10);
        assert_eq!(next.scene.current_turn.as_deref(), Some("enemy_goblin_1"));
    }

    #[test]
    fn test_enemy_miss() {
        let state = goblin_turn();
        let mut log = GameLog::new();
        let mut dice = ScriptedDice::new([13]);

        let EnemyPlan::Narrate(pending) =
            plan_enemy_turn(&state, "enemy_goblin_1", &mut dice, &mut log)
        else {
            panic!("expected an attack");
        };
        assert_eq!(pending.outcome, Outcome::EnemyMiss);
        assert!(pending.prompt.contains("narrowly missing Theron"));
        assert_eq!(log.count(LogKind::DiceRoll), 1);
    }

    #[test]
    fn test_skips() {
        let mut state = goblin_turn();
        let mut log = GameLog::new();
        let mut dice = ScriptedDice::default();

        assert!(matches!(
            plan_enemy_turn(&state, "enemy_ghost", &mut dice, &mut log),
            EnemyPlan::Skip
        ));

        state.enemies.get_mut("enemy_goblin_2").unwrap().attacks.clear();
        assert!(matches!(
            plan_enemy_turn(&state, "enemy_goblin_2", &mut dice, &mut log),
            EnemyPlan::Skip
        ));

        state.enemies.get_mut("enemy_goblin_1").unwrap().defeated = true;
        assert!(matches!(
            plan_enemy_turn(&state, "enemy_goblin_1", &mut dice, &mut log),
            EnemyPlan::Skip
        ));
        assert!(log.is_empty());
    }

    #[test]
    fn test_bad_attack_notation_skips_with_message() {
        let mut state = goblin_turn();
        state.enemies.get_mut("enemy_goblin_1").unwrap().attacks[0].damage = "d6".to_string();
        let mut log = GameLog::new();
        let mut dice = ScriptedDice::new([20]);

        let plan = plan_enemy_turn(&state, "enemy_goblin_1", &mut dice, &mut log);
        assert!(matches!(plan, EnemyPlan::Skip));
        assert_eq!(log.count(LogKind::System), 1);
        assert_eq!(dice.remaining(), 1);
    }
}
