use std::cmp::min;
use std::sync::Arc;

use hashbrown::HashSet;
use tracker_game::{
    AccessibilityLevel, Capacity, DungeonDefinition, ItemSlotIdx, ItemSlotKind,
    KeyDoorIdx, KeyDoorKind, NodeIdx,
};
use tracker_logic::{
    DungeonResult, DungeonState, GlobalState,
    helpers::{count_meeting, meets},
};

use crate::key_layout;
use crate::settings::ModeSettings;

/// Everything a recomputation reads from the outside world, captured once at the
/// start of the run and shared read-only by every worker.
#[derive(Clone, Debug, Default)]
pub struct EvaluationContext {
    pub mode: ModeSettings,
    pub global: GlobalState,
}

impl EvaluationContext {
    /// Whether an item slot of this kind holds an item of its own, rather than
    /// only carrying a key.
    pub fn counts_slot(&self, kind: ItemSlotKind) -> bool {
        kind == ItemSlotKind::Standard || self.mode.key_drop_shuffle
    }

    /// Number of small keys placed in this dungeon's item slots; zero when small keys
    /// are shuffled out of the dungeon.
    pub fn small_keys_in_slots(&self, dungeon: &DungeonDefinition) -> Capacity {
        if self.mode.small_key_shuffle {
            0
        } else {
            self.total_small_keys(dungeon)
        }
    }

    pub fn total_small_keys(&self, dungeon: &DungeonDefinition) -> Capacity {
        let drops = if self.mode.key_drop_shuffle {
            dungeon.small_key_drops().count() as Capacity
        } else {
            0
        };
        dungeon.small_key_count + drops
    }

    /// Whether the big key occupies one of this dungeon's item slots. It does not when
    /// it is shuffled elsewhere, or when an unshuffled drop carries it.
    pub fn big_key_in_slots(&self, dungeon: &DungeonDefinition) -> bool {
        dungeon.has_big_key()
            && !self.mode.big_key_shuffle
            && (self.mode.key_drop_shuffle || !dungeon.has_big_key_drop())
    }

    /// Number of items the dungeon holds that are not its own dungeon items.
    pub fn total_items(&self, dungeon: &DungeonDefinition) -> Capacity {
        let slots = dungeon
            .items
            .iter()
            .filter(|slot| self.counts_slot(slot.kind))
            .count() as Capacity;
        let mut dungeon_items = self.small_keys_in_slots(dungeon);
        if self.big_key_in_slots(dungeon) {
            dungeon_items += 1;
        }
        if !self.mode.map_compass_shuffle {
            dungeon_items += dungeon.map as Capacity + dungeon.compass as Capacity;
        }
        (slots - dungeon_items).max(0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DoorStatus {
    pub unlocked: bool,
    pub accessibility: AccessibilityLevel,
}

/// Reusable evaluation buffers for one dungeon. A graph evaluates exactly one
/// [`DungeonState`] at a time; [`MutableDungeonGraph::reset`] wipes everything
/// the previous user left behind.
#[derive(Clone, Debug)]
pub struct MutableDungeonGraph {
    dungeon: Arc<DungeonDefinition>,
    cx: Arc<EvaluationContext>,
    nodes: Vec<AccessibilityLevel>,
    doors: Vec<DoorStatus>,
    items: Vec<AccessibilityLevel>,
    bosses: Vec<AccessibilityLevel>,
}

impl MutableDungeonGraph {
    pub fn new(dungeon: Arc<DungeonDefinition>) -> Self {
        MutableDungeonGraph {
            nodes: vec![AccessibilityLevel::None; dungeon.node_isv.len()],
            doors: vec![DoorStatus::default(); dungeon.key_doors.len()],
            items: vec![AccessibilityLevel::None; dungeon.items.len()],
            bosses: vec![AccessibilityLevel::None; dungeon.bosses.len()],
            cx: Arc::new(EvaluationContext::default()),
            dungeon,
        }
    }

    pub fn dungeon(&self) -> &Arc<DungeonDefinition> {
        &self.dungeon
    }

    pub fn context(&self) -> &EvaluationContext {
        &self.cx
    }

    /// Rebuilds the graph from the dungeon definition against a new context, with
    /// every key door locked.
    pub fn reset(&mut self, cx: Arc<EvaluationContext>) {
        self.cx = cx;
        self.doors.fill(DoorStatus::default());
        self.propagate();
    }

    pub fn apply_state(&mut self, state: &DungeonState) {
        let dungeon = self.dungeon.clone();
        for (i, door) in dungeon.key_doors.iter().enumerate() {
            self.doors[i].unlocked = state.is_unlocked(i)
                || (door.kind == KeyDoorKind::BigKey && state.big_key_collected());
        }
        self.propagate();
        if !self.cx.mode.key_drop_shuffle {
            // A big-key drop can only open doors once it is reachable, and opening a
            // door can make further drops reachable:
            while self.unlock_doors_from_drops(state.sequence_break()) {
                self.propagate();
            }
        }
    }

    fn unlock_doors_from_drops(&mut self, sequence_break: bool) -> bool {
        let dungeon = self.dungeon.clone();
        let mut changed = false;
        for &door_idx in &dungeon.big_key_doors {
            let Some(drop) = dungeon.key_doors[door_idx].drop else {
                continue;
            };
            if !self.doors[door_idx].unlocked && meets(self.items[drop], sequence_break) {
                self.doors[door_idx].unlocked = true;
                changed = true;
            }
        }
        changed
    }

    // Recomputes every node from the entries outward, then the doors, item slots and
    // bosses that hang off the nodes. Requirement levels are looked up, never evaluated.
    fn propagate(&mut self) {
        let dungeon = self.dungeon.clone();
        let cx = self.cx.clone();
        self.nodes.fill(AccessibilityLevel::None);

        let mut modified_nodes: HashSet<NodeIdx> = HashSet::new();
        for entry in &dungeon.entries {
            let level = cx.global.entrance(entry.entrance);
            if level > self.nodes[entry.node] {
                self.nodes[entry.node] = level;
                modified_nodes.insert(entry.node);
            }
        }

        while !modified_nodes.is_empty() {
            let mut new_modified_nodes: HashSet<NodeIdx> = HashSet::new();
            let modified_nodes_vec = {
                // Process the nodes in sorted order, to make the propagation deterministic.
                let mut m: Vec<NodeIdx> = modified_nodes.into_iter().collect();
                m.sort();
                m
            };
            for &src in &modified_nodes_vec {
                for &conn_idx in &dungeon.connections_by_src[src] {
                    let conn = &dungeon.connections[conn_idx];
                    if let Some(door) = conn.door {
                        if !self.doors[door].unlocked {
                            continue;
                        }
                    }
                    let level = min(self.nodes[src], cx.global.requirement(conn.requirement));
                    if level > self.nodes[conn.to] {
                        self.nodes[conn.to] = level;
                        new_modified_nodes.insert(conn.to);
                    }
                }
            }
            modified_nodes = new_modified_nodes;
        }

        for (i, door) in dungeon.key_doors.iter().enumerate() {
            self.doors[i].accessibility =
                min(self.nodes[door.node], cx.global.requirement(door.requirement));
        }
        for (i, slot) in dungeon.items.iter().enumerate() {
            self.items[i] = min(self.nodes[slot.node], cx.global.requirement(slot.requirement));
        }
        for (i, boss) in dungeon.bosses.iter().enumerate() {
            self.bosses[i] = min(self.nodes[boss.node], cx.global.requirement(boss.requirement));
        }
    }

    pub fn node_levels(&self) -> &[AccessibilityLevel] {
        &self.nodes
    }

    pub fn door_status(&self) -> &[DoorStatus] {
        &self.doors
    }

    pub fn item_levels(&self) -> &[AccessibilityLevel] {
        &self.items
    }

    pub fn boss_levels(&self) -> &[AccessibilityLevel] {
        &self.bosses
    }

    pub fn item_accessibility(&self, slot: ItemSlotIdx) -> AccessibilityLevel {
        self.items[slot]
    }

    /// Small keys obtainable from reachable drops. Drops only hand out keys directly
    /// when drops are not shuffled; otherwise their keys are part of the item pool.
    pub fn get_available_small_keys(&self, sequence_break: bool) -> Capacity {
        if self.cx.mode.key_drop_shuffle {
            return 0;
        }
        count_meeting(
            self.dungeon.small_key_drops().map(|slot| self.items[slot]),
            sequence_break,
        ) as Capacity
    }

    /// Locked small-key doors that could be the next one opened.
    pub fn get_accessible_key_doors(&self, sequence_break: bool) -> Vec<KeyDoorIdx> {
        self.dungeon
            .small_key_doors
            .iter()
            .copied()
            .filter(|&door| {
                let status = self.doors[door];
                !status.unlocked && meets(status.accessibility, sequence_break)
            })
            .collect()
    }

    /// Returns (reachable, unreachable) counts over the given item slots.
    pub fn count_locations(
        &self,
        locations: &[ItemSlotIdx],
        sequence_break: bool,
    ) -> (Capacity, Capacity) {
        let accessible =
            count_meeting(locations.iter().map(|&slot| self.items[slot]), sequence_break)
                as Capacity;
        (accessible, locations.len() as Capacity - accessible)
    }

    fn count_counted_slots(&self, sequence_break: bool) -> (Capacity, Capacity, bool) {
        let mut accessible = 0;
        let mut inaccessible = 0;
        let mut visible = false;
        for (i, slot) in self.dungeon.items.iter().enumerate() {
            if !self.cx.counts_slot(slot.kind) {
                continue;
            }
            if meets(self.items[i], sequence_break) {
                accessible += 1;
            } else {
                inaccessible += 1;
                if self.items[i] >= AccessibilityLevel::Inspect {
                    visible = true;
                }
            }
        }
        (accessible, inaccessible, visible)
    }

    /// Whether the state's key distribution is self-consistent: the dungeon items it
    /// assumes were found fit in reachable slots, the ones it assumes were not found
    /// fit in unreachable slots, and at least one key layout accepts it.
    pub fn validate_key_layout(&self, state: &DungeonState) -> bool {
        let (accessible, inaccessible, _) = self.count_counted_slots(state.sequence_break());
        let mut needed_accessible = 0;
        let mut needed_inaccessible = 0;
        if !self.cx.mode.small_key_shuffle {
            needed_accessible += state.keys_collected();
            needed_inaccessible += self.cx.small_keys_in_slots(&self.dungeon) - state.keys_collected();
        }
        if self.cx.big_key_in_slots(&self.dungeon) {
            if state.big_key_collected() {
                needed_accessible += 1;
            } else {
                needed_inaccessible += 1;
            }
        }
        if needed_accessible > accessible || needed_inaccessible > inaccessible {
            return false;
        }
        self.dungeon
            .key_layouts
            .iter()
            .any(|layout| key_layout::can_be_true(layout, self, state))
    }

    pub fn get_dungeon_result(&self, state: &DungeonState) -> DungeonResult {
        let sequence_break = state.sequence_break();
        let (mut accessible, mut inaccessible, visible) = self.count_counted_slots(sequence_break);

        // Dungeon items that stay in the dungeon occupy slots without being loot:
        if !self.cx.mode.small_key_shuffle {
            accessible -= state.keys_collected();
            inaccessible -= self.cx.small_keys_in_slots(&self.dungeon) - state.keys_collected();
        }
        if self.cx.big_key_in_slots(&self.dungeon) {
            if state.big_key_collected() {
                accessible -= 1;
            } else {
                inaccessible -= 1;
            }
        }
        if !self.cx.mode.map_compass_shuffle {
            // Map and compass go into unreachable slots first.
            let map_compass = self.dungeon.map as Capacity + self.dungeon.compass as Capacity;
            let parked = map_compass.min(inaccessible.max(0));
            accessible -= map_compass - parked;
        }

        let minimum_inaccessible = if self.cx.mode.guaranteed_boss_items {
            (self.bosses.len() - count_meeting(self.bosses.iter().copied(), sequence_break))
                as Capacity
        } else {
            0
        };

        DungeonResult {
            bosses: self.bosses.clone(),
            visible,
            sequence_break,
            accessible: accessible.max(0),
            minimum_inaccessible,
        }
    }
}
