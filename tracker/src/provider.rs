use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use anyhow::{Context, Result, ensure};
use log::{debug, error, info};
use parking_lot::{Mutex, RwLock};
use tracker_game::{AccessibilityLevel, Capacity, DungeonDefinition};
use tracker_logic::observer::{ChangeNotifier, Listener, Notifier, Observable, SubscriptionId};

use crate::aggregate::{DungeonSummary, evaluate_terminal_states};
use crate::dungeon_graph::EvaluationContext;
use crate::graph_pool::{DungeonGraphPool, default_parallelism};
use crate::permute::enumerate_terminal_states;
use crate::tracker_state::TrackerState;
use crate::workers::WorkerPool;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Source {
    Mode,
    Item(usize),
    Entrance(usize),
    Requirement(usize),
}

/// Keeps one dungeon's published accessibility up to date. Any change to an
/// input the dungeon reads triggers a full recomputation; the values below are
/// replaced when it completes.
pub struct DungeonAccessibilityProvider {
    dungeon: Arc<DungeonDefinition>,
    tracker: Arc<TrackerState>,
    workers: Arc<WorkerPool>,
    pool: DungeonGraphPool,
    next_generation: AtomicU64,
    published_generation: Mutex<u64>,
    summary: RwLock<DungeonSummary>,
    subscriptions: Mutex<Vec<(Source, SubscriptionId)>>,

    pub visible: Observable<bool>,
    pub sequence_break: Observable<bool>,
    pub accessible: Observable<Capacity>,
    pub minimum_inaccessible: Observable<Capacity>,
    pub bosses: Vec<Observable<AccessibilityLevel>>,
}

impl DungeonAccessibilityProvider {
    pub fn new(
        dungeon: Arc<DungeonDefinition>,
        tracker: Arc<TrackerState>,
        workers: Arc<WorkerPool>,
    ) -> Result<Arc<Self>> {
        Self::with_pool_capacity(dungeon, tracker, workers, default_parallelism())
    }

    pub fn with_pool_capacity(
        dungeon: Arc<DungeonDefinition>,
        tracker: Arc<TrackerState>,
        workers: Arc<WorkerPool>,
        capacity: usize,
    ) -> Result<Arc<Self>> {
        let sources = Self::sources(&dungeon);
        for &source in &sources {
            let (id, len, what) = match source {
                Source::Mode => continue,
                Source::Item(id) => (id, tracker.items.len(), "item"),
                Source::Entrance(id) => (id, tracker.entrances.len(), "entrance"),
                Source::Requirement(id) => (id, tracker.requirements.len(), "requirement"),
            };
            ensure!(
                id < len,
                "dungeon {} refers to {what} {id}, but the tracker only has {len}",
                dungeon.name
            );
        }

        let boss_count = dungeon.bosses.len();
        let provider = Arc::new(DungeonAccessibilityProvider {
            pool: DungeonGraphPool::new(dungeon.clone(), capacity),
            summary: RwLock::new(DungeonSummary {
                bosses: vec![AccessibilityLevel::None; boss_count],
                ..DungeonSummary::default()
            }),
            dungeon,
            tracker,
            workers,
            next_generation: AtomicU64::new(0),
            published_generation: Mutex::new(0),
            subscriptions: Mutex::new(vec![]),
            visible: Observable::new(false),
            sequence_break: Observable::new(false),
            accessible: Observable::new(0),
            minimum_inaccessible: Observable::new(0),
            bosses: (0..boss_count)
                .map(|_| Observable::new(AccessibilityLevel::None))
                .collect(),
        });

        // One listener for every input, so a batch of changes recomputes once.
        let weak: Weak<Self> = Arc::downgrade(&provider);
        let listener: Listener = Arc::new(move || {
            if let Some(provider) = weak.upgrade() {
                provider.on_input_changed();
            }
        });
        for source in sources {
            let id = provider.notifier(source).subscribe(listener.clone());
            provider.subscriptions.lock().push((source, id));
        }
        info!(
            "Watching {} inputs of dungeon {}",
            provider.subscriptions.lock().len(),
            provider.dungeon.name
        );

        provider.refresh()?;
        Ok(provider)
    }

    // Every input the dungeon reads, each listed once.
    fn sources(dungeon: &DungeonDefinition) -> Vec<Source> {
        let mut sources = vec![Source::Mode];
        sources.extend(dungeon.small_key_item.map(Source::Item));
        sources.extend(dungeon.big_key_item.map(Source::Item));
        sources.extend(dungeon.entrances().into_iter().map(Source::Entrance));
        sources.extend(dungeon.requirements().into_iter().map(Source::Requirement));
        sources.dedup();
        sources
    }

    fn notifier(&self, source: Source) -> &Notifier {
        match source {
            Source::Mode => self.tracker.mode.notifier(),
            Source::Item(id) => self.tracker.items.notifier(id),
            Source::Entrance(id) => self.tracker.entrances.notifier(id),
            Source::Requirement(id) => self.tracker.requirements.notifier(id),
        }
    }

    fn on_input_changed(&self) {
        if let Err(e) = self.refresh() {
            error!("Keeping previous values for dungeon {}: {e:?}", self.dungeon.name);
        }
    }

    pub fn dungeon(&self) -> &Arc<DungeonDefinition> {
        &self.dungeon
    }

    pub fn summary(&self) -> DungeonSummary {
        self.summary.read().clone()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Recomputes the dungeon from a fresh snapshot of the tracker and publishes
    /// the result, unless a run that started later has already published.
    pub fn refresh(&self) -> Result<()> {
        self.recompute(Arc::new(self.tracker.evaluation_context()))
    }

    // A failed run publishes nothing.
    fn recompute(&self, cx: Arc<EvaluationContext>) -> Result<()> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let start = Instant::now();
        let states = enumerate_terminal_states(&self.pool, &cx)?;
        let summary = evaluate_terminal_states(&self.pool, &self.workers, &cx, &states)
            .with_context(|| format!("recomputing dungeon {}", self.dungeon.name))?;
        debug!(
            "{}: recomputed (run {generation}, {} terminal states) in {:?}",
            self.dungeon.name,
            states.len(),
            start.elapsed()
        );
        self.publish(generation, summary);
        Ok(())
    }

    fn publish(&self, generation: u64, summary: DungeonSummary) {
        let visible;
        let sequence_break;
        let accessible;
        let minimum_inaccessible;
        let mut bosses = vec![];
        {
            let mut published = self.published_generation.lock();
            if generation < *published {
                debug!(
                    "{}: dropping run {generation}, run {} already published",
                    self.dungeon.name, *published
                );
                return;
            }
            *published = generation;

            visible = self.visible.replace(summary.visible);
            sequence_break = self.sequence_break.replace(summary.sequence_break);
            accessible = self.accessible.replace(summary.accessible);
            minimum_inaccessible = self.minimum_inaccessible.replace(summary.minimum_inaccessible);
            for (i, (boss, &level)) in self.bosses.iter().zip(&summary.bosses).enumerate() {
                if boss.replace(level) {
                    bosses.push(i);
                }
            }
            *self.summary.write() = summary;
        }

        // Listeners may read the provider back, so they run outside the lock.
        if visible {
            self.visible.notify();
        }
        if sequence_break {
            self.sequence_break.notify();
        }
        if accessible {
            self.accessible.notify();
        }
        if minimum_inaccessible {
            self.minimum_inaccessible.notify();
        }
        for i in bosses {
            self.bosses[i].notify();
        }
    }
}

impl Drop for DungeonAccessibilityProvider {
    fn drop(&mut self) {
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        for (source, id) in subscriptions {
            self.notifier(source).unsubscribe(id);
        }
    }
}
