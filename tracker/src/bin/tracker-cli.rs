use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use tracker::section::{available_items, item_section_accessibility};
use tracker::{DungeonAccessibilityProvider, StateFile, TrackerState, WorkerPool};
use tracker_game::GameData;

#[derive(Parser)]
struct Args {
    #[arg(long)]
    game_data: PathBuf,

    #[arg(long)]
    state: PathBuf,

    #[arg(long)]
    dungeon: Option<String>,

    #[arg(long)]
    threads: Option<usize>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    let game_data = GameData::load(&args.game_data)?;
    let state = StateFile::load(&args.state)?;
    let tracker = TrackerState::new(&game_data);
    tracker
        .apply(&game_data, &state)
        .with_context(|| format!("applying {}", args.state.display()))?;
    let tracker = Arc::new(tracker);
    let workers = Arc::new(match args.threads {
        Some(threads) => WorkerPool::with_threads(threads)?,
        None => WorkerPool::new()?,
    });

    let dungeons = match &args.dungeon {
        Some(name) => vec![game_data.dungeon(name)?],
        None => game_data.dungeons.clone(),
    };
    info!("Evaluating {} dungeons", dungeons.len());

    let cx = tracker.evaluation_context();
    for dungeon in dungeons {
        let provider =
            DungeonAccessibilityProvider::new(dungeon.clone(), tracker.clone(), workers.clone())?;
        let summary = provider.summary();
        let total = cx.total_items(&dungeon);
        let section = item_section_accessibility(&summary, available_items(total, 0));
        let bosses: Vec<String> = dungeon
            .bosses
            .iter()
            .zip(&summary.bosses)
            .map(|(boss, level)| format!("{}={}", boss.name, level))
            .collect();
        println!(
            "{}: {}/{} accessible, sequence break: {}, visible: {}, minimum inaccessible: {}, bosses: [{}], section: {}",
            dungeon.name,
            summary.accessible,
            total,
            summary.sequence_break,
            summary.visible,
            summary.minimum_inaccessible,
            bosses.join(", "),
            section
        );
    }
    Ok(())
}
