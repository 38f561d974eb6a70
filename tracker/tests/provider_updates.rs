use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use tracker::{DungeonAccessibilityProvider, TrackerState, WorkerPool};
use tracker_game::{AccessibilityLevel, GameData};
use tracker_logic::observer::ChangeNotifier;

fn setup() -> Result<(GameData, Arc<TrackerState>, Arc<WorkerPool>)> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/game_data.json");
    let game_data = GameData::load(&path)?;
    let tracker = Arc::new(TrackerState::new(&game_data));
    let workers = Arc::new(WorkerPool::with_threads(2)?);
    Ok((game_data, tracker, workers))
}

#[test]
fn test_input_changes_republish() -> Result<()> {
    let (game_data, tracker, workers) = setup()?;
    let dungeon = game_data.dungeon("Swamp Palace")?;
    let provider = DungeonAccessibilityProvider::new(dungeon, tracker.clone(), workers)?;
    assert_eq!(provider.accessible.get(), 0);
    assert_eq!(provider.summary().bosses, vec![AccessibilityLevel::None]);

    let notified = Arc::new(AtomicUsize::new(0));
    let counter = notified.clone();
    provider.accessible.subscribe(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    let entrance = game_data.entrance_isv.lookup("SwampPalace", "entrance")?;
    tracker.entrances.set(entrance, AccessibilityLevel::Normal);
    assert_eq!(provider.accessible.get(), 1);
    assert_eq!(notified.load(Ordering::SeqCst), 1);

    // Shuffled keys come from the item count instead of the dungeon's chests.
    tracker.mode.update(|mode| mode.small_key_shuffle = true);
    assert_eq!(provider.accessible.get(), 1);
    let key = game_data.item_isv.lookup("SPSmallKey", "item")?;
    tracker.items.set(key, 2);
    assert_eq!(provider.accessible.get(), 3);
    assert_eq!(provider.bosses[0].get(), AccessibilityLevel::Normal);
    assert_eq!(notified.load(Ordering::SeqCst), 2);

    // Inputs the dungeon does not read leave it alone.
    let other = game_data.entrance_isv.lookup("EasternPalace", "entrance")?;
    tracker.entrances.set(other, AccessibilityLevel::Normal);
    assert_eq!(notified.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn test_requirement_changes_republish() -> Result<()> {
    let (game_data, tracker, workers) = setup()?;
    let entrance = game_data.entrance_isv.lookup("EasternPalace", "entrance")?;
    tracker.entrances.set(entrance, AccessibilityLevel::Normal);
    let dungeon = game_data.dungeon("Eastern Palace")?;
    let provider = DungeonAccessibilityProvider::new(dungeon, tracker.clone(), workers)?;
    assert_eq!(provider.bosses[0].get(), AccessibilityLevel::None);

    let bow = game_data.requirement_isv.lookup("Bow", "requirement")?;
    tracker.requirements.set(bow, AccessibilityLevel::SequenceBreak);
    assert_eq!(provider.bosses[0].get(), AccessibilityLevel::SequenceBreak);
    Ok(())
}

#[test]
fn test_drop_unsubscribes() -> Result<()> {
    let (game_data, tracker, workers) = setup()?;
    let dungeon = game_data.dungeon("Desert Palace")?;
    let hookshot = game_data.requirement_isv.lookup("Hookshot", "requirement")?;
    let entrance = game_data.entrance_isv.lookup("DesertPalace", "entrance")?;
    let key = game_data.item_isv.lookup("DPSmallKey", "item")?;

    let provider = DungeonAccessibilityProvider::new(dungeon, tracker.clone(), workers)?;
    // Mode, the small key item, one entrance and one requirement.
    assert_eq!(provider.subscription_count(), 4);
    assert_eq!(tracker.mode.notifier().listener_count(), 1);
    assert_eq!(tracker.requirements.notifier(hookshot).listener_count(), 1);
    assert_eq!(tracker.entrances.notifier(entrance).listener_count(), 1);
    assert_eq!(tracker.items.notifier(key).listener_count(), 1);

    drop(provider);
    assert_eq!(tracker.mode.notifier().listener_count(), 0);
    assert_eq!(tracker.requirements.notifier(hookshot).listener_count(), 0);
    assert_eq!(tracker.entrances.notifier(entrance).listener_count(), 0);
    assert_eq!(tracker.items.notifier(key).listener_count(), 0);

    // Changing inputs after the drop is harmless.
    tracker.requirements.set(hookshot, AccessibilityLevel::Normal);
    Ok(())
}

#[test]
fn test_providers_share_workers() -> Result<()> {
    let (game_data, tracker, workers) = setup()?;
    let providers = game_data
        .dungeons
        .iter()
        .map(|dungeon| {
            DungeonAccessibilityProvider::with_pool_capacity(
                dungeon.clone(),
                tracker.clone(),
                workers.clone(),
                1,
            )
        })
        .collect::<Result<Vec<_>>>()?;
    for name in ["EasternPalace", "DesertPalace", "SwampPalace"] {
        let id = game_data.entrance_isv.lookup(name, "entrance")?;
        tracker.entrances.set(id, AccessibilityLevel::Normal);
    }
    let accessible: Vec<_> = providers.iter().map(|p| p.accessible.get()).collect();
    // Eastern: three front chests, minus whichever of map and compass does not
    // fit behind the lamp. Desert: the lobby. Swamp: one chest either way.
    assert_eq!(accessible, vec![2, 1, 1]);
    Ok(())
}
