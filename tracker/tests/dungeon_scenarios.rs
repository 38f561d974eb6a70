use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracker::section::{available_items, item_section_accessibility};
use tracker::{DungeonAccessibilityProvider, StateFile, TrackerState, WorkerPool};
use tracker_game::{AccessibilityLevel, Capacity, GameData};

#[derive(Debug, Deserialize)]
struct ScenariosList {
    scenarios: Vec<Scenario>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Scenario {
    name: String,
    dungeon: String,
    #[serde(default)]
    state: StateFile,
    expected: Expected,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Expected {
    accessible: Capacity,
    #[serde(default)]
    sequence_break: bool,
    #[serde(default)]
    visible: bool,
    #[serde(default)]
    minimum_inaccessible: Capacity,
    bosses: Option<Vec<AccessibilityLevel>>,
    total_items: Option<Capacity>,
    section: Option<AccessibilityLevel>,
}

fn data_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(name)
}

fn test_scenario(
    game_data: &GameData,
    workers: &Arc<WorkerPool>,
    scenario: &Scenario,
    pool_capacity: usize,
) -> Result<()> {
    let tracker = TrackerState::new(game_data);
    tracker.apply(game_data, &scenario.state)?;
    let tracker = Arc::new(tracker);
    let dungeon = game_data.dungeon(&scenario.dungeon)?;
    let provider = DungeonAccessibilityProvider::with_pool_capacity(
        dungeon.clone(),
        tracker.clone(),
        workers.clone(),
        pool_capacity,
    )?;
    let summary = provider.summary();
    let expected = &scenario.expected;

    if summary.accessible != expected.accessible {
        bail!(
            "accessible: expected {}, got {}",
            expected.accessible,
            summary.accessible
        );
    }
    if summary.sequence_break != expected.sequence_break {
        bail!(
            "sequence break: expected {}, got {}",
            expected.sequence_break,
            summary.sequence_break
        );
    }
    if summary.visible != expected.visible {
        bail!("visible: expected {}, got {}", expected.visible, summary.visible);
    }
    if summary.minimum_inaccessible != expected.minimum_inaccessible {
        bail!(
            "minimum inaccessible: expected {}, got {}",
            expected.minimum_inaccessible,
            summary.minimum_inaccessible
        );
    }
    if let Some(bosses) = &expected.bosses {
        if &summary.bosses != bosses {
            bail!("bosses: expected {:?}, got {:?}", bosses, summary.bosses);
        }
    }

    // Published observables must agree with the summary.
    if provider.accessible.get() != summary.accessible
        || provider.sequence_break.get() != summary.sequence_break
        || provider.visible.get() != summary.visible
        || provider.minimum_inaccessible.get() != summary.minimum_inaccessible
    {
        bail!("published values disagree with summary {:?}", summary);
    }

    let total = tracker.evaluation_context().total_items(&dungeon);
    if let Some(total_items) = expected.total_items {
        if total != total_items {
            bail!("total items: expected {total_items}, got {total}");
        }
    }
    if let Some(section) = expected.section {
        let level = item_section_accessibility(&summary, available_items(total, 0));
        if level != section {
            bail!("section: expected {section}, got {level}");
        }
    }
    Ok(())
}

#[test]
fn test_dungeon_scenarios() -> Result<()> {
    let game_data = GameData::load(&data_path("game_data.json"))?;
    let scenarios_path = data_path("scenarios.json");
    let scenarios_str = std::fs::read_to_string(&scenarios_path)
        .context(format!("loading {}", scenarios_path.display()))?;
    let scenarios_list: ScenariosList = serde_json::from_str(&scenarios_str)
        .context(format!("parsing {}", scenarios_path.display()))?;
    let workers = Arc::new(WorkerPool::with_threads(3)?);

    for scenario in &scenarios_list.scenarios {
        println!("{}", scenario.name);
        for pool_capacity in [1, 3] {
            test_scenario(&game_data, &workers, scenario, pool_capacity).with_context(|| {
                format!("scenario '{}' (pool capacity {pool_capacity})", scenario.name)
            })?;
        }
    }
    Ok(())
}
