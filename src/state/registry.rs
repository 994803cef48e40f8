//! Combatant registry
//!
//! A combined view over the player and enemy maps. Lookups hand out a
//! `CombatantRef` tagged by kind; damage is applied copy-on-write, returning
//! a new `GameState` and leaving the original untouched.

use super::{AbilityScores, Enemy, GameState, HitPoints, PlayerCharacter};

/// Capabilities shared by everything that can take a turn
pub trait Combatant {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn abilities(&self) -> &AbilityScores;
    fn hit_points(&self) -> &HitPoints;
    fn armor_class(&self) -> i32;

    /// Whether the turn machine should drop this combatant
    fn is_defeated(&self) -> bool {
        false
    }
}

impl Combatant for PlayerCharacter {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn abilities(&self) -> &AbilityScores {
        &self.abilities
    }

    fn hit_points(&self) -> &HitPoints {
        &self.hit_points
    }

    fn armor_class(&self) -> i32 {
        self.armor_class
    }
}

impl Combatant for Enemy {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn abilities(&self) -> &AbilityScores {
        &self.abilities
    }

    fn hit_points(&self) -> &HitPoints {
        &self.hit_points
    }

    fn armor_class(&self) -> i32 {
        self.armor_class
    }

    fn is_defeated(&self) -> bool {
        self.defeated
    }
}

/// A borrowed combatant of either kind
#[derive(Debug, Clone, Copy)]
pub enum CombatantRef<'a> {
    Player(&'a PlayerCharacter),
    Enemy(&'a Enemy),
}

impl<'a> CombatantRef<'a> {
    fn inner(&self) -> &'a dyn Combatant {
        match *self {
            CombatantRef::Player(pc) => pc,
            CombatantRef::Enemy(enemy) => enemy,
        }
    }

    pub fn is_player(&self) -> bool {
        matches!(self, CombatantRef::Player(_))
    }

    pub fn as_enemy(&self) -> Option<&'a Enemy> {
        match *self {
            CombatantRef::Enemy(enemy) => Some(enemy),
            CombatantRef::Player(_) => None,
        }
    }
}

impl Combatant for CombatantRef<'_> {
    fn id(&self) -> &str {
        self.inner().id()
    }

    fn name(&self) -> &str {
        self.inner().name()
    }

    fn abilities(&self) -> &AbilityScores {
        self.inner().abilities()
    }

    fn hit_points(&self) -> &HitPoints {
        self.inner().hit_points()
    }

    fn armor_class(&self) -> i32 {
        self.inner().armor_class()
    }

    fn is_defeated(&self) -> bool {
        self.inner().is_defeated()
    }
}

/// What a damage application did to its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageOutcome {
    pub hit_points: HitPoints,
    /// The target reached 0 HP with this hit
    pub dropped: bool,
    /// The target is an enemy now flagged defeated
    pub defeated: bool,
}

impl GameState {
    /// Find a combatant by id across both registries
    pub fn combatant(&self, id: &str) -> Option<CombatantRef<'_>> {
        if let Some(pc) = self.player_characters.get(id) {
            return Some(CombatantRef::Player(pc));
        }
        self.enemies.get(id).map(CombatantRef::Enemy)
    }

    /// Display name for an id, falling back to the id itself
    pub fn name_of(&self, id: &str) -> String {
        self.combatant(id)
            .map(|c| c.name().to_string())
            .unwrap_or_else(|| id.to_string())
    }

    /// Whether `id` is missing or an enemy already flagged defeated
    pub fn is_out_of_fight(&self, id: &str) -> bool {
        self.combatant(id).map_or(true, |c| c.is_defeated())
    }

    /// Apply damage to a combatant, returning the next revision
    ///
    /// HP is clamped to `0..=max`. An enemy reaching 0 is flagged defeated; a
    /// player character has no such flag and simply stays at 0.
    pub fn apply_damage(&self, id: &str, amount: i32) -> Option<(GameState, DamageOutcome)> {
        let mut next = self.clone();

        let outcome = if let Some(pc) = next.player_characters.get_mut(id) {
            pc.hit_points = pc.hit_points.after_damage(amount);
            DamageOutcome {
                hit_points: pc.hit_points,
                dropped: pc.hit_points.is_down(),
                defeated: false,
            }
        } else if let Some(enemy) = next.enemies.get_mut(id) {
            enemy.hit_points = enemy.hit_points.after_damage(amount);
            if enemy.hit_points.is_down() {
                enemy.defeated = true;
            }
            DamageOutcome {
                hit_points: enemy.hit_points,
                dropped: enemy.hit_points.is_down(),
                defeated: enemy.defeated,
            }
        } else {
            return None;
        };

        Some((next, outcome))
    }
}
