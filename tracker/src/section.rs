use tracker_game::{AccessibilityLevel, Capacity};

use crate::aggregate::DungeonSummary;

/// Items the user has not checked off yet.
pub fn available_items(total: Capacity, checked: Capacity) -> Capacity {
    (total - checked).max(0)
}

/// Collapses a dungeon summary into the level shown on the dungeon's item section.
pub fn item_section_accessibility(
    summary: &DungeonSummary,
    available: Capacity,
) -> AccessibilityLevel {
    if available <= 0 {
        AccessibilityLevel::None
    } else if summary.accessible >= available {
        if summary.sequence_break {
            AccessibilityLevel::SequenceBreak
        } else {
            AccessibilityLevel::Normal
        }
    } else if summary.accessible > 0 {
        AccessibilityLevel::Partial
    } else if summary.visible {
        AccessibilityLevel::Inspect
    } else {
        AccessibilityLevel::None
    }
}
