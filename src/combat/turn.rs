//! Turn and combat state machine
//!
//! Idle (round 0, nobody active) -> rolling initiative -> in combat
//! (round >= 1) -> idle again once the fight is over. Every transition takes
//! the current revision by reference and returns the next one.

use tracing::{info, warn};

use super::dice::{Dice, DiceRoll, RollResult};
use crate::log::GameLog;
use crate::state::{Combatant, GameState};

/// One participant's initiative
#[derive(Debug, Clone)]
pub struct InitiativeRoll {
    pub id: String,
    pub roll: RollResult,
}

/// Roll initiative and put combat in motion
///
/// Each participant rolls 1d20 plus their dexterity modifier. The order is a
/// stable descending sort on the result, so ties keep the order in which the
/// participants were given. Unknown ids are skipped.
pub fn start_combat(
    state: &GameState,
    participants: &[String],
    dice: &mut dyn Dice,
    log: &mut GameLog,
) -> GameState {
    let d20 = DiceRoll::new(1, 20);
    let mut initiative: Vec<InitiativeRoll> = Vec::with_capacity(participants.len());

    for id in participants {
        let Some(combatant) = state.combatant(id) else {
            warn!(id = %id, "Skipping unknown combatant in initiative");
            continue;
        };
        let roll = d20.roll(dice, combatant.abilities().dex_mod());
        log.dice(format!("{} initiative: {}", combatant.name(), roll.text));
        initiative.push(InitiativeRoll {
            id: id.clone(),
            roll,
        });
    }

    if initiative.is_empty() {
        return state.clone();
    }

    initiative.sort_by(|a, b| b.roll.final_total.cmp(&a.roll.final_total));
    let order: Vec<String> = initiative.into_iter().map(|i| i.id).collect();

    let mut next = state.clone();
    next.scene.current_turn = Some(order[0].clone());
    next.scene.active_combatants = order;
    next.scene.round_number = 1;

    let first = next.name_of(&next.scene.active_combatants[0]);
    info!(order = ?next.scene.active_combatants, "Combat started");
    log.system(format!("Round 1! It is {}'s turn.", first));
    next
}

/// Pass the turn to the next combatant still in the fight
///
/// Defeated enemies are dropped from the order first. If the current
/// combatant was among them, the turn goes to the head of the order and a new
/// round begins.
pub fn advance_turn(state: &GameState, log: &mut GameLog) -> GameState {
    let active: Vec<String> = state
        .scene
        .active_combatants
        .iter()
        .filter(|id| !state.is_out_of_fight(id))
        .cloned()
        .collect();

    if active.is_empty() {
        return state.clone();
    }

    let position = state
        .scene
        .current_turn
        .as_ref()
        .and_then(|turn| active.iter().position(|id| id == turn));
    let next_index = position.map_or(0, |i| (i + 1) % active.len());

    let mut round = state.scene.round_number;
    if next_index == 0 {
        round += 1;
        log.system(format!("Round {}!", round));
    }

    let next_id = active[next_index].clone();
    log.system(format!("It is now {}'s turn.", state.name_of(&next_id)));

    let mut next = state.clone();
    next.scene.active_combatants = active;
    next.scene.current_turn = Some(next_id);
    next.scene.round_number = round;
    next
}

/// Leave combat
pub fn end_combat(state: &GameState, log: &mut GameLog) -> GameState {
    info!(round = state.scene.round_number, "Combat ended");
    log.system("All enemies defeated. Combat has ended!");

    let mut next = state.clone();
    next.scene.active_combatants.clear();
    next.scene.current_turn = None;
    next.scene.round_number = 0;
    next
}

/// The non-player combatant whose turn it is, if any
pub fn enemy_turn_due(state: &GameState) -> Option<&str> {
    if !state.in_combat() {
        return None;
    }
    state
        .scene
        .current_turn
        .as_deref()
        .filter(|id| !state.player_characters.contains_key(*id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::dice::ScriptedDice;
    use crate::log::LogKind;
    use crate::state::initial_state;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    /// Theron (+2 dex), goblin 1 at +0, goblin 2 at +1
    fn mixed_dex_state() -> GameState {
        let mut state = initial_state();
        state.enemies.get_mut("enemy_goblin_1").unwrap().abilities.dexterity = 10;
        state.enemies.get_mut("enemy_goblin_2").unwrap().abilities.dexterity = 12;
        state
    }

    fn in_combat(order: &[&str]) -> GameState {
        let mut state = initial_state();
        state.scene.active_combatants = ids(order);
        state.scene.current_turn = Some(order[0].to_string());
        state.scene.round_number = 1;
        state
    }

    #[test]
    fn test_start_combat_order_and_tie_break() {
        let state = mixed_dex_state();
        let mut dice = ScriptedDice::new([15, 15, 10]);
        let mut log = GameLog::new();

        let next = start_combat(
            &state,
            &ids(&["pc_theron", "enemy_goblin_1", "enemy_goblin_2"]),
            &mut dice,
            &mut log,
        );

        assert_eq!(
            next.scene.active_combatants,
            ids(&["pc_theron", "enemy_goblin_1", "enemy_goblin_2"])
        );
        assert_eq!(next.scene.current_turn.as_deref(), Some("pc_theron"));
        assert_eq!(next.scene.round_number, 1);
        assert_eq!(log.count(LogKind::DiceRoll), 3);
        assert_eq!(log.count(LogKind::System), 1);
        assert_eq!(
            log.entries()[0].content,
            "Theron initiative: Rolled 1d20: [15] +2 = 17"
        );
        assert_eq!(
            log.entries().last().unwrap().content,
            "Round 1! It is Theron's turn."
        );
        assert!(next.check_invariants().is_ok());
    }

    #[test]
    fn test_equal_totals_keep_participant_order() {
        let state = mixed_dex_state();
        let mut log = GameLog::new();

        // Theron 3+2=5, goblin 2 11+1=12, goblin 1 12+0=12
        let mut dice = ScriptedDice::new([3, 11, 12]);
        let next = start_combat(
            &state,
            &ids(&["pc_theron", "enemy_goblin_2", "enemy_goblin_1"]),
            &mut dice,
            &mut log,
        );
        assert_eq!(
            next.scene.active_combatants,
            ids(&["enemy_goblin_2", "enemy_goblin_1", "pc_theron"])
        );

        // Same totals, participants listed the other way round
        let mut dice = ScriptedDice::new([3, 12, 11]);
        let next = start_combat(
            &state,
            &ids(&["pc_theron", "enemy_goblin_1", "enemy_goblin_2"]),
            &mut dice,
            &mut log,
        );
        assert_eq!(
            next.scene.active_combatants,
            ids(&["enemy_goblin_1", "enemy_goblin_2", "pc_theron"])
        );
    }

    #[test]
    fn test_start_combat_with_nobody() {
        let state = initial_state();
        let mut dice = ScriptedDice::default();
        let mut log = GameLog::new();
        let next = start_combat(&state, &ids(&["ghost"]), &mut dice, &mut log);
        assert_eq!(next, state);
        assert!(log.is_empty());
    }

    #[test]
    fn test_advance_rotates_and_counts_rounds() {
        let mut state = in_combat(&["pc_theron", "enemy_goblin_1", "enemy_goblin_2"]);
        let mut log = GameLog::new();

        state = advance_turn(&state, &mut log);
        assert_eq!(state.scene.current_turn.as_deref(), Some("enemy_goblin_1"));
        assert_eq!(state.scene.round_number, 1);
        assert_eq!(log.entries()[0].content, "It is now Goblin Scout's turn.");

        state = advance_turn(&state, &mut log);
        state = advance_turn(&state, &mut log);
        assert_eq!(state.scene.current_turn.as_deref(), Some("pc_theron"));
        assert_eq!(state.scene.round_number, 2);
        assert!(log.entries().iter().any(|e| e.content == "Round 2!"));
    }

    #[test]
    fn test_full_rotations_add_one_round_each() {
        let order = ["enemy_goblin_2", "pc_theron", "enemy_goblin_1"];
        for rotations in 1..=5u32 {
            let mut state = in_combat(&order);
            let mut log = GameLog::new();
            for _ in 0..rotations as usize * order.len() {
                state = advance_turn(&state, &mut log);
            }
            assert_eq!(state.scene.round_number, 1 + rotations);
            assert_eq!(state.scene.current_turn.as_deref(), Some(order[0]));
        }
    }

    #[test]
    fn test_advance_skips_defeated_enemy() {
        let mut state = in_combat(&["pc_theron", "enemy_goblin_1", "enemy_goblin_2"]);
        state.enemies.get_mut("enemy_goblin_1").unwrap().defeated = true;
        let mut log = GameLog::new();

        let next = advance_turn(&state, &mut log);
        assert_eq!(next.scene.current_turn.as_deref(), Some("enemy_goblin_2"));
        assert_eq!(
            next.scene.active_combatants,
            ids(&["pc_theron", "enemy_goblin_2"])
        );

        for _ in 0..10 {
            let next = advance_turn(&next, &mut log);
            assert_ne!(next.scene.current_turn.as_deref(), Some("enemy_goblin_1"));
        }
    }

    #[test]
    fn test_advance_when_current_was_removed() {
        let mut state = in_combat(&["pc_theron", "enemy_goblin_1", "enemy_goblin_2"]);
        state.scene.current_turn = Some("enemy_goblin_1".to_string());
        state.enemies.get_mut("enemy_goblin_1").unwrap().defeated = true;
        let mut log = GameLog::new();

        let next = advance_turn(&state, &mut log);
        assert_eq!(next.scene.current_turn.as_deref(), Some("pc_theron"));
        assert_eq!(next.scene.round_number, 2);
        assert!(next.check_invariants().is_ok());
    }

    #[test]
    fn test_advance_with_nobody_left_is_noop() {
        let mut state = in_combat(&["enemy_goblin_1"]);
        state.enemies.get_mut("enemy_goblin_1").unwrap().defeated = true;
        let mut log = GameLog::new();

        let next = advance_turn(&state, &mut log);
        assert_eq!(next, state);
        assert!(log.is_empty());
    }

    #[test]
    fn test_end_combat_resets_scene() {
        let state = in_combat(&["pc_theron", "enemy_goblin_1"]);
        let mut log = GameLog::new();

        let next = end_combat(&state, &mut log);
        assert!(next.scene.active_combatants.is_empty());
        assert_eq!(next.scene.current_turn, None);
        assert_eq!(next.scene.round_number, 0);
        assert_eq!(log.count(LogKind::System), 1);
        assert!(next.check_invariants().is_ok());
    }

    #[test]
    fn test_enemy_turn_due() {
        let state = initial_state();
        assert_eq!(enemy_turn_due(&state), None);

        let state = in_combat(&["enemy_goblin_1", "pc_theron"]);
        assert_eq!(enemy_turn_due(&state), Some("enemy_goblin_1"));

        let state = in_combat(&["pc_theron", "enemy_goblin_1"]);
        assert_eq!(enemy_turn_due(&state), None);
    }
}
