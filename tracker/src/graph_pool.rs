use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use log::debug;
use parking_lot::{Condvar, Mutex};
use tracker_game::DungeonDefinition;

use crate::dungeon_graph::{EvaluationContext, MutableDungeonGraph};

/// Number of graph instances to keep per dungeon when the caller has no preference.
pub fn default_parallelism() -> usize {
    let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
    cores.saturating_sub(1).max(1)
}

/// A bounded set of reusable graphs for one dungeon. Checking out blocks while
/// every graph is in use; a graph goes back to the pool when its guard is dropped.
#[derive(Debug)]
pub struct DungeonGraphPool {
    dungeon: Arc<DungeonDefinition>,
    capacity: usize,
    idle: Mutex<Vec<MutableDungeonGraph>>,
    returned: Condvar,
}

impl DungeonGraphPool {
    pub fn new(dungeon: Arc<DungeonDefinition>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        debug!("Creating {capacity} graphs for dungeon {}", dungeon.name);
        let idle = (0..capacity)
            .map(|_| MutableDungeonGraph::new(dungeon.clone()))
            .collect();
        DungeonGraphPool {
            dungeon,
            capacity,
            idle: Mutex::new(idle),
            returned: Condvar::new(),
        }
    }

    pub fn dungeon(&self) -> &Arc<DungeonDefinition> {
        &self.dungeon
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Waits for an idle graph and resets it against `cx`.
    pub fn checkout(&self, cx: &Arc<EvaluationContext>) -> PooledGraph<'_> {
        let mut graph = {
            let mut idle = self.idle.lock();
            loop {
                if let Some(graph) = idle.pop() {
                    break graph;
                }
                self.returned.wait(&mut idle);
            }
        };
        graph.reset(cx.clone());
        PooledGraph {
            pool: self,
            graph: Some(graph),
        }
    }

    fn give_back(&self, graph: MutableDungeonGraph) {
        self.idle.lock().push(graph);
        self.returned.notify_one();
    }
}

pub struct PooledGraph<'a> {
    pool: &'a DungeonGraphPool,
    graph: Option<MutableDungeonGraph>,
}

impl Deref for PooledGraph<'_> {
    type Target = MutableDungeonGraph;

    fn deref(&self) -> &MutableDungeonGraph {
        // Only taken in drop.
        self.graph.as_ref().unwrap()
    }
}

impl DerefMut for PooledGraph<'_> {
    fn deref_mut(&mut self) -> &mut MutableDungeonGraph {
        self.graph.as_mut().unwrap()
    }
}

impl Drop for PooledGraph<'_> {
    fn drop(&mut self) {
        if let Some(graph) = self.graph.take() {
            self.pool.give_back(graph);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ModeSettings;
    use crate::test_fixtures::{context, load_dungeon};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tracker_game::AccessibilityLevel;
    use tracker_logic::DungeonState;

    const DUNGEON: &str = r#"{
        "name": "Cellar",
        "nodes": ["Entry", "Back"],
        "entries": [{ "node": "Entry", "entrance": "Front" }],
        "connections": [{ "from": "Entry", "to": "Back", "door": "Gate" }],
        "smallKeyDoors": [{ "name": "Gate", "node": "Entry" }],
        "items": [{ "name": "Chest", "node": "Back" }],
        "smallKeyItem": "SmallKey",
        "smallKeyCount": 1
    }"#;

    #[test]
    fn test_capacity_is_at_least_one() {
        let (_, dungeon) = load_dungeon(DUNGEON);
        let pool = DungeonGraphPool::new(dungeon, 0);
        assert_eq!(pool.capacity(), 1);
        assert_eq!(pool.idle_count(), 1);
        assert!(default_parallelism() >= 1);
    }

    #[test]
    fn test_graph_returns_to_pool_reset() {
        let (game_data, dungeon) = load_dungeon(DUNGEON);
        let cx = Arc::new(context(&game_data, ModeSettings::default()));
        let pool = DungeonGraphPool::new(dungeon, 2);
        {
            let mut graph = pool.checkout(&cx);
            assert_eq!(pool.idle_count(), 1);
            graph.apply_state(&DungeonState::new(1, false, false).with_unlocked_door(0));
            assert_eq!(graph.item_accessibility(0), AccessibilityLevel::Normal);
        }
        assert_eq!(pool.idle_count(), 2);
        for _ in 0..2 {
            let graph = pool.checkout(&cx);
            assert!(!graph.door_status()[0].unlocked);
            assert_eq!(graph.item_accessibility(0), AccessibilityLevel::None);
        }
    }

    #[test]
    fn test_checkout_blocks_until_returned() {
        let (game_data, dungeon) = load_dungeon(DUNGEON);
        let cx = Arc::new(context(&game_data, ModeSettings::default()));
        let pool = DungeonGraphPool::new(dungeon, 1);
        let acquired = AtomicBool::new(false);
        std::thread::scope(|s| {
            let held = pool.checkout(&cx);
            s.spawn(|| {
                let _graph = pool.checkout(&cx);
                acquired.store(true, Ordering::SeqCst);
            });
            std::thread::sleep(Duration::from_millis(50));
            assert!(!acquired.load(Ordering::SeqCst));
            drop(held);
        });
        assert!(acquired.load(Ordering::SeqCst));
        assert_eq!(pool.idle_count(), 1);
    }
}
