use std::sync::Arc;

use tracker_game::{AccessibilityLevel, DungeonDefinition, GameData};
use tracker_logic::GlobalState;

use crate::dungeon_graph::EvaluationContext;
use crate::settings::ModeSettings;

/// Loads a single dungeon against a fixed set of requirement, entrance and item names.
pub fn load_dungeon(dungeon_json: &str) -> (GameData, Arc<DungeonDefinition>) {
    let game_data = GameData::from_json_str(&format!(
        r#"{{
            "requirements": ["Lamp", "Hookshot", "Bow", "Hammer"],
            "entrances": ["Front", "Back"],
            "items": ["SmallKey", "BigKey"],
            "dungeons": [{dungeon_json}]
        }}"#
    ))
    .unwrap();
    let dungeon = game_data.dungeons[0].clone();
    (game_data, dungeon)
}

/// A context in which every requirement and entrance is `Normal`.
pub fn context(game_data: &GameData, mode: ModeSettings) -> EvaluationContext {
    EvaluationContext {
        mode,
        global: GlobalState {
            requirements: vec![AccessibilityLevel::Normal; game_data.requirement_isv.len()],
            entrances: vec![AccessibilityLevel::Normal; game_data.entrance_isv.len()],
            item_counts: vec![0; game_data.item_isv.len()],
        },
    }
}

pub fn set_requirement(
    cx: &mut EvaluationContext,
    game_data: &GameData,
    name: &str,
    level: AccessibilityLevel,
) {
    let id = game_data.requirement_isv.lookup(name, "requirement").unwrap();
    cx.global.requirements[id] = level;
}

pub fn set_entrance(
    cx: &mut EvaluationContext,
    game_data: &GameData,
    name: &str,
    level: AccessibilityLevel,
) {
    let id = game_data.entrance_isv.lookup(name, "entrance").unwrap();
    cx.global.entrances[id] = level;
}

pub fn set_item_count(cx: &mut EvaluationContext, game_data: &GameData, name: &str, count: i32) {
    let id = game_data.item_isv.lookup(name, "item").unwrap();
    cx.global.item_counts[id] = count;
}
