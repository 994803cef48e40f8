//! The starting adventure: a lone fighter outside a goblin warren

use std::collections::BTreeMap;

use super::{
    AbilityScores, DmOnlyData, Enemy, EnemyAttack, GameState, HitPoints, InventoryItem,
    PartySharedData, PlayerCharacter, Scene,
};

/// A fresh game with a new session id
pub fn initial_state() -> GameState {
    let theron = PlayerCharacter {
        id: "pc_theron".to_string(),
        name: "Theron".to_string(),
        level: 1,
        class_name: "Fighter".to_string(),
        race: "Human".to_string(),
        abilities: AbilityScores::new(16, 14, 15, 10, 12, 8),
        hit_points: HitPoints::full(12),
        armor_class: 18,
        speed: 30,
        proficiency_bonus: 2,
        inventory: vec![
            InventoryItem::weapon("Longsword", "1d8", "slashing"),
            InventoryItem::armor("Shield", 2),
        ],
        conditions: Vec::new(),
    };

    let enemies = [
        goblin("enemy_goblin_1", "Goblin Scout", "Scimitar", "slashing"),
        goblin("enemy_goblin_2", "Goblin Archer", "Shortbow", "piercing"),
    ];

    GameState {
        session_id: format!("session_{}", uuid::Uuid::new_v4()),
        campaign_name: "The Goblin Warrens".to_string(),
        scene: Scene::new(
            "Cave Entrance",
            "You stand at the entrance to the Goblin Warren. The cave mouth yawns before you, dark and foreboding.",
        ),
        player_characters: BTreeMap::from([(theron.id.clone(), theron)]),
        enemies: enemies.into_iter().map(|e| (e.id.clone(), e)).collect(),
        dm_only_data: DmOnlyData {
            plot_secrets: serde_json::json!({
                "goblin_leader": "A larger hobgoblin named Grukk leads this warren."
            }),
        },
        party_shared_data: PartySharedData { party_gold: 10 },
    }
}

fn goblin(id: &str, name: &str, weapon: &str, damage_type: &str) -> Enemy {
    Enemy {
        id: id.to_string(),
        name: name.to_string(),
        category: "creature".to_string(),
        hit_points: HitPoints::full(7),
        armor_class: 13,
        abilities: AbilityScores::new(8, 14, 10, 10, 8, 8),
        attacks: vec![EnemyAttack {
            name: weapon.to_string(),
            attack_bonus: 4,
            damage: "1d6+2".to_string(),
            damage_type: damage_type.to_string(),
        }],
        defeated: false,
    }
}
