use tracker_game::{Capacity, KeyLayout};
use tracker_logic::{DungeonState, helpers::meets};

use crate::dungeon_graph::MutableDungeonGraph;

/// Whether `layout` admits the state currently applied to `graph`. A layout is a
/// tree of placement hypotheses; a branch holds when its own placement is
/// consistent with what is reachable and at least one of its children holds.
pub fn can_be_true(
    layout: &KeyLayout,
    graph: &MutableDungeonGraph,
    state: &DungeonState,
) -> bool {
    let cx = graph.context();
    let sequence_break = state.sequence_break();
    if !meets(cx.global.requirement(layout.requirement()), sequence_break) {
        return false;
    }

    let placement_ok = match layout {
        KeyLayout::End { .. } => true,
        KeyLayout::SmallKey {
            count,
            locations,
            big_key_in_locations,
            ..
        } => {
            if cx.mode.small_key_shuffle {
                true
            } else {
                let (mut accessible, mut inaccessible) =
                    graph.count_locations(locations, sequence_break);
                if *big_key_in_locations && cx.big_key_in_slots(graph.dungeon()) {
                    // The big key takes one of these slots away from small keys.
                    if state.big_key_collected() {
                        accessible -= 1;
                    } else {
                        inaccessible -= 1;
                    }
                    // No slot on the matching side is left for the big key.
                    if accessible < 0 || inaccessible < 0 {
                        return false;
                    }
                }
                let total = cx.small_keys_in_slots(graph.dungeon());
                let minimum: Capacity = (count - inaccessible).max(0);
                let maximum: Capacity = (*count).min(accessible) + (total - count);
                (minimum..=maximum).contains(&state.keys_collected())
            }
        }
        KeyLayout::BigKey { locations, .. } => {
            if !cx.big_key_in_slots(graph.dungeon()) {
                true
            } else {
                let (accessible, inaccessible) = graph.count_locations(locations, sequence_break);
                if state.big_key_collected() {
                    accessible > 0
                } else {
                    inaccessible > 0
                }
            }
        }
    };
    if !placement_ok {
        return false;
    }

    let children = layout.children();
    children.is_empty()
        || children
            .iter()
            .any(|child| can_be_true(child, graph, state))
}
