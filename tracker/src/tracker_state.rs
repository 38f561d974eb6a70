use anyhow::{Context, Result};
use hashbrown::HashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracker_game::{AccessibilityLevel, Capacity, GameData};
use tracker_logic::GlobalState;
use tracker_logic::observer::{Notifier, notify_all};

use crate::dungeon_graph::EvaluationContext;
use crate::settings::ModeSettings;

/// A table of externally computed accessibility levels (requirements or
/// entrances), each entry with its own change notification.
#[derive(Debug)]
pub struct LevelTable {
    levels: RwLock<Vec<AccessibilityLevel>>,
    notifiers: Vec<Notifier>,
}

impl LevelTable {
    pub fn new(len: usize, initial: AccessibilityLevel) -> Self {
        LevelTable {
            levels: RwLock::new(vec![initial; len]),
            notifiers: (0..len).map(|_| Notifier::new()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    pub fn get(&self, id: usize) -> AccessibilityLevel {
        self.levels.read()[id]
    }

    pub fn set(&self, id: usize, level: AccessibilityLevel) {
        if self.replace(id, level) {
            self.notifiers[id].notify();
        }
    }

    /// Stores a level without notifying; returns whether it changed.
    pub fn replace(&self, id: usize, level: AccessibilityLevel) -> bool {
        let mut levels = self.levels.write();
        let changed = levels[id] != level;
        levels[id] = level;
        changed
    }

    pub fn notifier(&self, id: usize) -> &Notifier {
        &self.notifiers[id]
    }

    pub fn snapshot(&self) -> Vec<AccessibilityLevel> {
        self.levels.read().clone()
    }
}

#[derive(Debug)]
pub struct ItemTable {
    counts: RwLock<Vec<Capacity>>,
    notifiers: Vec<Notifier>,
}

impl ItemTable {
    pub fn new(len: usize) -> Self {
        ItemTable {
            counts: RwLock::new(vec![0; len]),
            notifiers: (0..len).map(|_| Notifier::new()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    pub fn get(&self, id: usize) -> Capacity {
        self.counts.read()[id]
    }

    pub fn set(&self, id: usize, count: Capacity) {
        if self.replace(id, count) {
            self.notifiers[id].notify();
        }
    }

    pub fn replace(&self, id: usize, count: Capacity) -> bool {
        let mut counts = self.counts.write();
        let changed = counts[id] != count;
        counts[id] = count;
        changed
    }

    pub fn notifier(&self, id: usize) -> &Notifier {
        &self.notifiers[id]
    }

    pub fn snapshot(&self) -> Vec<Capacity> {
        self.counts.read().clone()
    }
}

#[derive(Debug, Default)]
pub struct ModeHandle {
    settings: RwLock<ModeSettings>,
    notifier: Notifier,
}

impl ModeHandle {
    pub fn get(&self) -> ModeSettings {
        self.settings.read().clone()
    }

    pub fn set(&self, settings: ModeSettings) {
        if self.replace(settings) {
            self.notifier.notify();
        }
    }

    pub fn replace(&self, settings: ModeSettings) -> bool {
        let mut current = self.settings.write();
        let changed = *current != settings;
        *current = settings;
        changed
    }

    pub fn update(&self, f: impl FnOnce(&mut ModeSettings)) {
        let mut settings = self.get();
        f(&mut settings);
        self.set(settings);
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }
}

/// The live inputs of the dungeon engine, owned by the surrounding tracker:
/// mode flags, requirement levels, entrance levels and item counts.
#[derive(Debug)]
pub struct TrackerState {
    pub mode: ModeHandle,
    pub requirements: LevelTable,
    pub entrances: LevelTable,
    pub items: ItemTable,
}

/// Serialized tracker inputs, keyed by name.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct StateFile {
    #[serde(default)]
    pub mode: ModeSettings,
    #[serde(default)]
    pub items: HashMap<String, Capacity>,
    #[serde(default)]
    pub requirements: HashMap<String, AccessibilityLevel>,
    #[serde(default)]
    pub entrances: HashMap<String, AccessibilityLevel>,
}

impl StateFile {
    pub fn load(path: &Path) -> Result<StateFile> {
        let state_str = std::fs::read_to_string(path)
            .with_context(|| format!("unable to read {}", path.display()))?;
        serde_json::from_str(&state_str).with_context(|| format!("unable to parse {}", path.display()))
    }
}

impl TrackerState {
    pub fn new(game_data: &GameData) -> Self {
        TrackerState {
            mode: ModeHandle::default(),
            requirements: LevelTable::new(game_data.requirement_isv.len(), AccessibilityLevel::None),
            entrances: LevelTable::new(game_data.entrance_isv.len(), AccessibilityLevel::None),
            items: ItemTable::new(game_data.item_isv.len()),
        }
    }

    /// Applies every value named in `state`. Unknown names are rejected before
    /// anything is changed. All values are written first; each listener is then
    /// notified once, however many of its inputs changed.
    pub fn apply(&self, game_data: &GameData, state: &StateFile) -> Result<()> {
        let mut requirements = vec![];
        for (name, &level) in &state.requirements {
            requirements.push((game_data.requirement_isv.lookup(name, "requirement")?, level));
        }
        let mut entrances = vec![];
        for (name, &level) in &state.entrances {
            entrances.push((game_data.entrance_isv.lookup(name, "entrance")?, level));
        }
        let mut items = vec![];
        for (name, &count) in &state.items {
            items.push((game_data.item_isv.lookup(name, "item")?, count));
        }

        let mut changed: Vec<&Notifier> = vec![];
        if self.mode.replace(state.mode.clone()) {
            changed.push(self.mode.notifier());
        }
        for (id, level) in requirements {
            if self.requirements.replace(id, level) {
                changed.push(self.requirements.notifier(id));
            }
        }
        for (id, level) in entrances {
            if self.entrances.replace(id, level) {
                changed.push(self.entrances.notifier(id));
            }
        }
        for (id, count) in items {
            if self.items.replace(id, count) {
                changed.push(self.items.notifier(id));
            }
        }
        notify_all(&changed);
        Ok(())
    }

    pub fn global_state(&self) -> GlobalState {
        GlobalState {
            requirements: self.requirements.snapshot(),
            entrances: self.entrances.snapshot(),
            item_counts: self.items.snapshot(),
        }
    }

    pub fn evaluation_context(&self) -> EvaluationContext {
        EvaluationContext {
            mode: self.mode.get(),
            global: self.global_state(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracker_logic::observer::ChangeNotifier;

    fn game_data() -> GameData {
        GameData::from_json_str(
            r#"{
                "requirements": ["Lamp"],
                "entrances": ["Front"],
                "items": ["SmallKey"],
                "dungeons": []
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_set_notifies_only_on_change() {
        let game_data = game_data();
        let tracker = TrackerState::new(&game_data);
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        tracker.requirements.notifier(0).subscribe(Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        tracker.requirements.set(0, AccessibilityLevel::None);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        tracker.requirements.set(0, AccessibilityLevel::Normal);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.requirements.get(0), AccessibilityLevel::Normal);
    }

    #[test]
    fn test_apply_state_file() {
        let game_data = game_data();
        let tracker = TrackerState::new(&game_data);
        let state: StateFile = serde_json::from_str(
            r#"{
                "mode": { "small_key_shuffle": true },
                "items": { "SmallKey": 2 },
                "requirements": { "Lamp": "SequenceBreak" },
                "entrances": { "Front": "Normal" }
            }"#,
        )
        .unwrap();
        tracker.apply(&game_data, &state).unwrap();
        let cx = tracker.evaluation_context();
        assert!(cx.mode.small_key_shuffle);
        assert_eq!(cx.global.item_counts, vec![2]);
        assert_eq!(cx.global.requirements, vec![AccessibilityLevel::SequenceBreak]);
        assert_eq!(cx.global.entrances, vec![AccessibilityLevel::Normal]);

        let bad: StateFile = serde_json::from_str(r#"{ "items": { "Boots": 1 } }"#).unwrap();
        assert!(tracker.apply(&game_data, &bad).is_err());
        assert_eq!(tracker.items.get(0), 2);
    }

    #[test]
    fn test_apply_notifies_each_listener_once() {
        let game_data = game_data();
        let tracker = TrackerState::new(&game_data);
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let listener: tracker_logic::observer::Listener = Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        tracker.mode.notifier().subscribe(listener.clone());
        tracker.requirements.notifier(0).subscribe(listener.clone());
        tracker.entrances.notifier(0).subscribe(listener.clone());
        tracker.items.notifier(0).subscribe(listener);

        let state: StateFile = serde_json::from_str(
            r#"{
                "mode": { "small_key_shuffle": true },
                "items": { "SmallKey": 1 },
                "requirements": { "Lamp": "Normal" },
                "entrances": { "Front": "Normal" }
            }"#,
        )
        .unwrap();
        tracker.apply(&game_data, &state).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // Nothing changed the second time round.
        tracker.apply(&game_data, &state).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
