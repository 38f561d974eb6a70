use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Randomizer mode flags that change how a dungeon's contents are counted.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ModeSettings {
    // Dungeon items that may be found outside their own dungeon:
    pub small_key_shuffle: bool,
    pub big_key_shuffle: bool,
    pub map_compass_shuffle: bool,
    // Enemy and pot drops become independent item slots:
    pub key_drop_shuffle: bool,
    pub guaranteed_boss_items: bool,
    // Read by the overworld; dungeons see its effect through their entrance levels.
    pub entrance_shuffle: bool,
    pub sequence_break_tie_break: SequenceBreakTieBreak,
}

/// Which sequence-break flag to publish when permutations reach the same best
/// `Accessible` count with and without a sequence break.
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum SequenceBreakTieBreak {
    #[default]
    PreferInLogic,
    PreferSequenceBreak,
}

impl Display for SequenceBreakTieBreak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
