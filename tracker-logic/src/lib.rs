pub mod helpers;
pub mod observer;

use serde::{Deserialize, Serialize};
use tracker_game::{AccessibilityLevel, Capacity, EntranceId, ItemId, KeyDoorIdx, RequirementId};

/// Snapshot of every external input the dungeon engine reads: requirement levels,
/// entrance levels and item counts. Taken once per recomputation so that worker
/// threads never touch live collaborator objects.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalState {
    pub requirements: Vec<AccessibilityLevel>,
    pub entrances: Vec<AccessibilityLevel>,
    pub item_counts: Vec<Capacity>,
}

impl GlobalState {
    pub fn requirement(&self, req: Option<RequirementId>) -> AccessibilityLevel {
        match req {
            Some(id) => self.requirements[id],
            None => AccessibilityLevel::Normal,
        }
    }

    pub fn entrance(&self, entrance: EntranceId) -> AccessibilityLevel {
        self.entrances[entrance]
    }

    pub fn item_count(&self, item: Option<ItemId>) -> Capacity {
        item.map_or(0, |id| self.item_counts[id])
    }
}

/// One hypothesis about which key doors are open and which keys are in hand.
/// States are values: deriving a new state never changes the old one.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DungeonState {
    unlocked_doors: Vec<KeyDoorIdx>, // Kept sorted so that equal door sets compare equal
    keys_collected: Capacity,
    big_key_collected: bool,
    sequence_break: bool,
}

impl DungeonState {
    pub fn new(keys_collected: Capacity, big_key_collected: bool, sequence_break: bool) -> Self {
        DungeonState {
            unlocked_doors: vec![],
            keys_collected,
            big_key_collected,
            sequence_break,
        }
    }

    pub fn with_unlocked_door(&self, door: KeyDoorIdx) -> Self {
        let mut state = self.clone();
        if let Err(pos) = state.unlocked_doors.binary_search(&door) {
            state.unlocked_doors.insert(pos, door);
        }
        state
    }

    pub fn unlocked_doors(&self) -> &[KeyDoorIdx] {
        &self.unlocked_doors
    }

    pub fn is_unlocked(&self, door: KeyDoorIdx) -> bool {
        self.unlocked_doors.binary_search(&door).is_ok()
    }

    pub fn keys_collected(&self) -> Capacity {
        self.keys_collected
    }

    pub fn big_key_collected(&self) -> bool {
        self.big_key_collected
    }

    pub fn sequence_break(&self) -> bool {
        self.sequence_break
    }
}

/// Outcome of evaluating one fully resolved [`DungeonState`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DungeonResult {
    pub bosses: Vec<AccessibilityLevel>,
    pub visible: bool,
    pub sequence_break: bool,
    pub accessible: Capacity,
    pub minimum_inaccessible: Capacity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlocked_doors_are_a_set() {
        let state = DungeonState::new(2, false, true);
        let a = state.with_unlocked_door(3).with_unlocked_door(1);
        let b = state.with_unlocked_door(1).with_unlocked_door(3);
        assert_eq!(a, b);
        assert_eq!(a.unlocked_doors(), &[1, 3]);
        assert_eq!(a.with_unlocked_door(3), a);
        assert!(a.is_unlocked(1));
        assert!(!a.is_unlocked(2));

        // Deriving leaves the parent untouched:
        assert!(state.unlocked_doors().is_empty());
        assert_eq!(a.keys_collected(), 2);
        assert!(a.sequence_break());
        assert!(!a.big_key_collected());
    }

    #[test]
    fn test_global_state_lookups() {
        let global = GlobalState {
            requirements: vec![AccessibilityLevel::Inspect],
            entrances: vec![AccessibilityLevel::SequenceBreak],
            item_counts: vec![3],
        };
        assert_eq!(global.requirement(None), AccessibilityLevel::Normal);
        assert_eq!(global.requirement(Some(0)), AccessibilityLevel::Inspect);
        assert_eq!(global.entrance(0), AccessibilityLevel::SequenceBreak);
        assert_eq!(global.item_count(Some(0)), 3);
        assert_eq!(global.item_count(None), 0);
    }
}
