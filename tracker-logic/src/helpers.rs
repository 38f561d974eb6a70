use tracker_game::AccessibilityLevel;

/// The single rule for turning an accessibility level into a yes/no decision:
/// `Normal` always counts, `SequenceBreak` counts only for a state that already
/// assumes out-of-logic moves.
pub fn meets(accessibility: AccessibilityLevel, sequence_break: bool) -> bool {
    match accessibility {
        AccessibilityLevel::Normal => true,
        AccessibilityLevel::SequenceBreak => sequence_break,
        AccessibilityLevel::None | AccessibilityLevel::Inspect | AccessibilityLevel::Partial => {
            false
        }
    }
}

pub fn count_meeting<I>(levels: I, sequence_break: bool) -> usize
where
    I: IntoIterator<Item = AccessibilityLevel>,
{
    levels
        .into_iter()
        .filter(|&level| meets(level, sequence_break))
        .count()
}
