pub mod aggregate;
pub mod dungeon_graph;
pub mod graph_pool;
pub mod key_layout;
pub mod permute;
pub mod provider;
pub mod section;
pub mod settings;
pub mod tracker_state;
pub mod workers;

#[cfg(test)]
mod test_fixtures;

pub use aggregate::DungeonSummary;
pub use provider::DungeonAccessibilityProvider;
pub use settings::{ModeSettings, SequenceBreakTieBreak};
pub use tracker_state::{StateFile, TrackerState};
pub use workers::WorkerPool;
