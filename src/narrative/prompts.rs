//! Prompt text for each kind of narrated outcome

use crate::state::{Combatant, Enemy, EnemyAttack, GameState, PlayerCharacter};

pub fn player_hit(
    pc: &PlayerCharacter,
    weapon: &str,
    target: &Enemy,
    damage: i32,
    finishing_blow: bool,
) -> String {
    format!(
        "Describe {}'s successful {} attack hitting {} for {} damage.{}",
        pc.name,
        weapon,
        target.name,
        damage,
        if finishing_blow {
            " It is a finishing blow!"
        } else {
            ""
        }
    )
}

pub fn player_miss(pc: &PlayerCharacter, weapon: &str, target: &Enemy) -> String {
    format!(
        "Describe {}'s attack with a {} missing {}.",
        pc.name, weapon, target.name
    )
}

pub fn search(pc: &PlayerCharacter, state: &GameState) -> String {
    format!(
        "Describe what {} finds when searching the {}. The area is described as: \"{}\".",
        pc.name, state.scene.location, state.scene.description
    )
}

pub fn enemy_hit(enemy: &Enemy, attack: &EnemyAttack, pc: &PlayerCharacter, damage: i32) -> String {
    format!(
        "Describe {}'s successful {} hitting {} for {} damage.",
        enemy.name, attack.name, pc.name, damage
    )
}

pub fn enemy_miss(enemy: &Enemy, attack: &EnemyAttack, pc: &PlayerCharacter) -> String {
    format!(
        "Describe {}'s {} attack narrowly missing {}.",
        enemy.name, attack.name, pc.name
    )
}

/// What the scene looks like right now, for the image generator
///
/// Only what the player can see goes in: narrator-only data stays out.
pub fn scene_image(state: &GameState) -> String {
    let mut prompt = format!(
        "Location: {}. {}.",
        state.scene.location, state.scene.description
    );
    if let Some(pc) = state.player() {
        prompt.push_str(&format!(" Player character {} is present.", pc.name));
    }

    let foes: Vec<String> = state
        .scene
        .active_combatants
        .iter()
        .filter_map(|id| state.combatant(id))
        .filter(|c| !c.is_player() && !c.is_defeated())
        .map(|c| c.name().to_string())
        .collect();
    if !foes.is_empty() {
        prompt.push_str(&format!(" In combat with: {}.", foes.join(", ")));
    }
    prompt
}
