use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use hashbrown::HashSet;
use log::debug;
use tracker_game::{Capacity, DungeonDefinition};
use tracker_logic::DungeonState;

use crate::dungeon_graph::EvaluationContext;
use crate::graph_pool::{DungeonGraphPool, PooledGraph};

/// Every combination of small-key count, big-key possession and sequence-break
/// assumption a run starts from, each with no doors unlocked.
pub fn initial_states(dungeon: &DungeonDefinition, cx: &EvaluationContext) -> Vec<DungeonState> {
    let small_keys: Vec<Capacity> = if cx.mode.small_key_shuffle {
        vec![cx.global.item_count(dungeon.small_key_item)]
    } else {
        (0..=cx.total_small_keys(dungeon)).collect()
    };
    let big_keys: Vec<bool> = if !dungeon.has_big_key() {
        vec![false]
    } else if cx.big_key_in_slots(dungeon) {
        vec![false, true]
    } else {
        vec![cx.global.item_count(dungeon.big_key_item) > 0]
    };

    let mut states = vec![];
    for &keys in &small_keys {
        for &big_key in &big_keys {
            for sequence_break in [false, true] {
                states.push(DungeonState::new(keys, big_key, sequence_break));
            }
        }
    }
    states
}

/// Enumerates the states in which no further small-key door can be opened.
///
/// Stage `i` holds the states with `i` small-key doors unlocked. Each stage runs
/// on its own thread, reads its input channel until the previous stage hangs up,
/// and either forwards a state as terminal or expands it into one child per door
/// it could open next. A stage checks out its graph on its first input and keeps
/// it until it is done, so the pipeline cannot starve even with a single graph.
pub fn enumerate_terminal_states(
    pool: &DungeonGraphPool,
    cx: &Arc<EvaluationContext>,
) -> Result<Vec<DungeonState>> {
    let dungeon = pool.dungeon().clone();
    let stage_count = dungeon.small_key_doors.len() + 1;
    let start = Instant::now();

    let (senders, receivers): (Vec<Sender<DungeonState>>, Vec<Receiver<DungeonState>>) =
        (0..stage_count).map(|_| mpsc::channel()).unzip();
    let mut senders = senders.into_iter();
    let seed_tx = senders.next().context("pipeline has no stages")?;
    let next_senders = senders.map(Some).chain(std::iter::once(None));

    let (final_tx, final_rx) = mpsc::channel();
    let seeds = initial_states(&dungeon, cx);
    let seed_count = seeds.len();
    for state in seeds {
        seed_tx.send(state).context("first stage closed before seeding")?;
    }
    drop(seed_tx);

    thread::scope(|s| -> Result<()> {
        let mut handles = vec![];
        for (stage, (input, next)) in receivers.into_iter().zip(next_senders).enumerate() {
            let output = final_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("{}-stage-{stage}", dungeon.name))
                .spawn_scoped(s, move || run_stage(stage, pool, cx, input, next, output))
                .with_context(|| format!("unable to start stage {stage}"))?;
            handles.push(handle);
        }
        drop(final_tx);

        let mut first_error = None;
        for (stage, handle) in handles.into_iter().enumerate() {
            let outcome = match handle.join() {
                Ok(outcome) => outcome,
                Err(_) => Err(anyhow!("stage {stage} panicked")),
            };
            if let Err(e) = outcome {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    })
    .with_context(|| format!("enumerating key door states of {}", dungeon.name))?;

    let terminal: Vec<DungeonState> = final_rx.into_iter().collect();
    debug!(
        "{}: {} seed states -> {} terminal states in {:?}",
        dungeon.name,
        seed_count,
        terminal.len(),
        start.elapsed()
    );
    Ok(terminal)
}

fn run_stage(
    stage: usize,
    pool: &DungeonGraphPool,
    cx: &Arc<EvaluationContext>,
    input: Receiver<DungeonState>,
    next: Option<Sender<DungeonState>>,
    output: Sender<DungeonState>,
) -> Result<()> {
    let mut graph: Option<PooledGraph<'_>> = None;
    let mut emitted: HashSet<DungeonState> = HashSet::new();
    let mut processed = 0;

    for state in input.iter() {
        processed += 1;
        let graph = graph.get_or_insert_with(|| pool.checkout(cx));
        graph.apply_state(&state);

        let sequence_break = state.sequence_break();
        let keys_left = state.keys_collected() + graph.get_available_small_keys(sequence_break)
            - state.unlocked_doors().len() as Capacity;
        let doors = if keys_left > 0 {
            graph.get_accessible_key_doors(sequence_break)
        } else {
            vec![]
        };

        match &next {
            Some(next) if !doors.is_empty() => {
                for door in doors {
                    let child = state.with_unlocked_door(door);
                    if emitted.insert(child.clone()) {
                        next.send(child)
                            .with_context(|| format!("stage {} stopped early", stage + 1))?;
                    }
                }
            }
            _ => {
                output.send(state).context("terminal state receiver closed")?;
            }
        }
    }

    if processed > 0 {
        debug!("stage {stage}: {processed} states in, {} expanded", emitted.len());
    }
    Ok(())
}
