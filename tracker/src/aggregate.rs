use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Result, bail};
use log::debug;
use rayon::prelude::*;
use serde::Serialize;
use tracker_game::{AccessibilityLevel, Capacity};
use tracker_logic::{DungeonResult, DungeonState};

use crate::dungeon_graph::EvaluationContext;
use crate::graph_pool::DungeonGraphPool;
use crate::settings::SequenceBreakTieBreak;
use crate::workers::WorkerPool;

/// Best case over every terminal state of a dungeon.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DungeonSummary {
    pub bosses: Vec<AccessibilityLevel>,
    pub visible: bool,
    pub sequence_break: bool,
    pub accessible: Capacity,
    pub minimum_inaccessible: Capacity,
}

/// Commutative reduction of [`DungeonResult`]s: feeding the same results in any
/// order, or merging partial aggregators in any grouping, gives the same summary.
#[derive(Clone, Debug)]
pub struct ResultAggregator {
    boss_count: usize,
    tie_break: SequenceBreakTieBreak,
    best: Option<DungeonSummary>,
    count: usize,
}

impl ResultAggregator {
    pub fn new(boss_count: usize, tie_break: SequenceBreakTieBreak) -> Self {
        ResultAggregator {
            boss_count,
            tie_break,
            best: None,
            count: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn add(&mut self, result: &DungeonResult) {
        let summary = DungeonSummary {
            bosses: result.bosses.clone(),
            visible: result.visible,
            sequence_break: result.sequence_break,
            accessible: result.accessible,
            minimum_inaccessible: result.minimum_inaccessible,
        };
        self.combine(summary, 1);
    }

    pub fn merge(mut self, other: ResultAggregator) -> ResultAggregator {
        if let Some(summary) = other.best {
            self.combine(summary, other.count);
        }
        self
    }

    fn combine(&mut self, other: DungeonSummary, count: usize) {
        self.count += count;
        let Some(best) = &mut self.best else {
            self.best = Some(other);
            return;
        };
        for (level, &other_level) in best.bosses.iter_mut().zip(&other.bosses) {
            *level = (*level).max(other_level);
        }
        best.visible |= other.visible;
        best.minimum_inaccessible = best.minimum_inaccessible.min(other.minimum_inaccessible);
        if other.accessible > best.accessible {
            best.accessible = other.accessible;
            best.sequence_break = other.sequence_break;
        } else if other.accessible == best.accessible {
            best.sequence_break = match self.tie_break {
                SequenceBreakTieBreak::PreferInLogic => {
                    best.sequence_break && other.sequence_break
                }
                SequenceBreakTieBreak::PreferSequenceBreak => {
                    best.sequence_break || other.sequence_break
                }
            };
        }
    }

    /// The aggregate, or an all-`None` summary when no result was added.
    pub fn finish(self) -> DungeonSummary {
        self.best.unwrap_or_else(|| DungeonSummary {
            bosses: vec![AccessibilityLevel::None; self.boss_count],
            ..DungeonSummary::default()
        })
    }
}

/// Evaluates every terminal state on the worker pool and reduces the results.
/// States whose key distribution no layout admits are skipped. A panic in any
/// evaluation fails the whole run.
pub fn evaluate_terminal_states(
    pool: &DungeonGraphPool,
    workers: &WorkerPool,
    cx: &Arc<EvaluationContext>,
    states: &[DungeonState],
) -> Result<DungeonSummary> {
    let start = Instant::now();
    let boss_count = pool.dungeon().bosses.len();
    let tie_break = cx.mode.sequence_break_tie_break;
    let new_aggregator = || ResultAggregator::new(boss_count, tie_break);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        workers.install(|| {
            states
                .par_iter()
                .fold(new_aggregator, |mut aggregator, state| {
                    let mut graph = pool.checkout(cx);
                    graph.apply_state(state);
                    if graph.validate_key_layout(state) {
                        aggregator.add(&graph.get_dungeon_result(state));
                    }
                    aggregator
                })
                .reduce(new_aggregator, ResultAggregator::merge)
        })
    }));
    let aggregator = match outcome {
        Ok(aggregator) => aggregator,
        Err(_) => bail!(
            "evaluating terminal states of {} panicked",
            pool.dungeon().name
        ),
    };

    debug!(
        "{}: {} of {} terminal states admitted in {:?}",
        pool.dungeon().name,
        aggregator.count(),
        states.len(),
        start.elapsed()
    );
    Ok(aggregator.finish())
}
