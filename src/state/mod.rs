//! Game state data model
//!
//! `GameState` is the root aggregate owned by a session. It is treated as a
//! value: every resolved action produces a new revision rather than editing
//! the current one in place. Field names follow the snapshot format written by
//! earlier clients, so saved games stay loadable.

mod campaign;
mod registry;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::combat::ability_modifier;

pub use campaign::initial_state;
pub use registry::{Combatant, CombatantRef, DamageOutcome};

/// The six ability scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    #[serde(rename = "str")]
    pub strength: i32,
    #[serde(rename = "dex")]
    pub dexterity: i32,
    #[serde(rename = "con")]
    pub constitution: i32,
    #[serde(rename = "int")]
    pub intelligence: i32,
    #[serde(rename = "wis")]
    pub wisdom: i32,
    #[serde(rename = "cha")]
    pub charisma: i32,
}

impl AbilityScores {
    pub fn new(
        strength: i32,
        dexterity: i32,
        constitution: i32,
        intelligence: i32,
        wisdom: i32,
        charisma: i32,
    ) -> Self {
        Self {
            strength,
            dexterity,
            constitution,
            intelligence,
            wisdom,
            charisma,
        }
    }

    pub fn str_mod(&self) -> i32 {
        ability_modifier(self.strength)
    }

    pub fn dex_mod(&self) -> i32 {
        ability_modifier(self.dexterity)
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: i32,
    pub max: i32,
    #[serde(default)]
    pub temporary: i32,
}

impl HitPoints {
    /// Full health
    pub fn full(max: i32) -> Self {
        Self {
            current: max,
            max,
            temporary: 0,
        }
    }

    /// Hit points after taking `amount` damage, clamped to `0..=max`
    pub fn after_damage(&self, amount: i32) -> Self {
        Self {
            current: self
                .current
                .saturating_sub(amount)
                .min(self.max)
                .max(0),
            ..*self
        }
    }

    /// `0 <= current <= max`
    pub fn is_consistent(&self) -> bool {
        self.max >= 0 && (0..=self.max).contains(&self.current)
    }

    pub fn is_down(&self) -> bool {
        self.current <= 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub name: String,
    /// Damage notation when the item is a weapon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage: Option<String>,
    /// Damage type or item category
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ac_bonus: Option<i32>,
}

impl InventoryItem {
    pub fn weapon(name: &str, damage: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            damage: Some(damage.to_string()),
            kind: Some(kind.to_string()),
            ac_bonus: None,
        }
    }

    pub fn armor(name: &str, ac_bonus: i32) -> Self {
        Self {
            name: name.to_string(),
            damage: None,
            kind: None,
            ac_bonus: Some(ac_bonus),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerCharacter {
    pub id: String,
    pub name: String,
    pub level: u32,
    #[serde(rename = "class")]
    pub class_name: String,
    pub race: String,
    pub abilities: AbilityScores,
    pub hit_points: HitPoints,
    pub armor_class: i32,
    pub speed: u32,
    pub proficiency_bonus: i32,
    #[serde(default)]
    pub inventory: Vec<InventoryItem>,
    #[serde(default)]
    pub conditions: Vec<String>,
}

impl PlayerCharacter {
    /// First inventory item that carries a damage die
    pub fn weapon(&self) -> Option<&InventoryItem> {
        self.inventory.iter().find(|item| item.damage.is_some())
    }

    /// Melee attack bonus: strength modifier plus proficiency
    pub fn attack_bonus(&self) -> i32 {
        self.abilities.str_mod() + self.proficiency_bonus
    }
}

/// One of an enemy's attacks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemyAttack {
    pub name: String,
    pub attack_bonus: i32,
    /// Damage notation
    pub damage: String,
    #[serde(rename = "type")]
    pub damage_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enemy {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub category: String,
    pub hit_points: HitPoints,
    pub armor_class: i32,
    pub abilities: AbilityScores,
    #[serde(default)]
    pub attacks: Vec<EnemyAttack>,
    #[serde(rename = "isDefeated", default)]
    pub defeated: bool,
}

/// The current location and the combat bookkeeping for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub location: String,
    pub description: String,
    /// Initiative order; empty outside combat
    #[serde(default)]
    pub active_combatants: Vec<String>,
    #[serde(default)]
    pub current_turn: Option<String>,
    /// 0 when no combat is in progress
    #[serde(default)]
    pub round_number: u32,
}

impl Scene {
    pub fn new(location: &str, description: &str) -> Self {
        Self {
            location: location.to_string(),
            description: description.to_string(),
            active_combatants: Vec::new(),
            current_turn: None,
            round_number: 0,
        }
    }

    pub fn in_combat(&self) -> bool {
        !self.active_combatants.is_empty()
    }
}

/// Narrator-only information, kept out of everything the player sees
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DmOnlyData {
    #[serde(default)]
    pub plot_secrets: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartySharedData {
    #[serde(default)]
    pub party_gold: i64,
}

/// Root aggregate for one play session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub session_id: String,
    pub campaign_name: String,
    #[serde(rename = "current_scene")]
    pub scene: Scene,
    pub player_characters: BTreeMap<String, PlayerCharacter>,
    pub enemies: BTreeMap<String, Enemy>,
    #[serde(default)]
    pub dm_only_data: DmOnlyData,
    #[serde(default)]
    pub party_shared_data: PartySharedData,
}

impl GameState {
    /// The character the player controls
    pub fn player(&self) -> Option<&PlayerCharacter> {
        self.player_characters.values().next()
    }

    pub fn player_id(&self) -> Option<&str> {
        self.player().map(|pc| pc.id.as_str())
    }

    pub fn in_combat(&self) -> bool {
        self.scene.in_combat()
    }

    /// Outside combat the player may always act
    pub fn is_player_turn(&self) -> bool {
        if !self.in_combat() {
            return true;
        }
        match (&self.scene.current_turn, self.player_id()) {
            (Some(turn), Some(pc)) => turn == pc,
            _ => false,
        }
    }

    /// Enemies still able to fight, in id order
    pub fn standing_enemies(&self) -> impl Iterator<Item = &Enemy> {
        self.enemies.values().filter(|e| !e.defeated)
    }

    pub fn all_enemies_defeated(&self) -> bool {
        self.enemies.values().all(|e| e.defeated)
    }

    /// Check the structural invariants between the scene and the registries
    pub fn check_invariants(&self) -> Result<(), String> {
        let hit_points = self
            .player_characters
            .iter()
            .map(|(id, pc)| (id, &pc.hit_points))
            .chain(self.enemies.iter().map(|(id, e)| (id, &e.hit_points)));
        for (id, hp) in hit_points {
            if !hp.is_consistent() {
                return Err(format!(
                    "{} has {} of {} hit points",
                    id, hp.current, hp.max
                ));
            }
        }

        let scene = &self.scene;
        for id in &scene.active_combatants {
            let in_players = self.player_characters.contains_key(id);
            let in_enemies = self.enemies.contains_key(id);
            if in_players == in_enemies {
                return Err(format!("combatant {} must be in exactly one registry", id));
            }
        }
        if let Some(turn) = &scene.current_turn {
            if !scene.active_combatants.contains(turn) {
                return Err(format!("current turn {} is not an active combatant", turn));
            }
        }
        if (scene.round_number == 0) != scene.active_combatants.is_empty() {
            return Err(format!(
                "round {} does not match {} active combatants",
                scene.round_number,
                scene.active_combatants.len()
            ));
        }
        Ok(())
    }
}

impl Default for GameState {
    fn default() -> Self {
        initial_state()
    }
}
