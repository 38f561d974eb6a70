use anyhow::{Context, Result, bail, ensure};
use hashbrown::HashSet;
use log::warn;
use serde::Deserialize;

use crate::{
    Capacity, ConnectionIdx, EntranceId, GameData, IndexedVec, ItemId, ItemSlotIdx, KeyDoorIdx,
    NodeIdx, RequirementId,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DungeonJson {
    pub(crate) name: String,
    nodes: Vec<String>,
    entries: Vec<EntryJson>,
    #[serde(default)]
    connections: Vec<ConnectionJson>,
    #[serde(default)]
    small_key_doors: Vec<KeyDoorJson>,
    #[serde(default)]
    big_key_doors: Vec<KeyDoorJson>,
    items: Vec<ItemSlotJson>,
    #[serde(default)]
    bosses: Vec<BossSlotJson>,
    small_key_item: Option<String>,
    big_key_item: Option<String>,
    #[serde(default)]
    small_key_count: Capacity,
    #[serde(default)]
    map: bool,
    #[serde(default)]
    compass: bool,
    #[serde(default = "default_key_layouts")]
    key_layouts: Vec<KeyLayoutJson>,
}

#[derive(Debug, Deserialize)]
struct EntryJson {
    node: String,
    entrance: String,
}

#[derive(Debug, Deserialize)]
struct ConnectionJson {
    from: String,
    to: String,
    requirement: Option<String>,
    door: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeyDoorJson {
    name: String,
    node: String,
    requirement: Option<String>,
    // Big-key doors only: the drop that carries the big key when drops are not shuffled.
    drop: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemSlotJson {
    name: String,
    node: String,
    requirement: Option<String>,
    #[serde(default)]
    kind: ItemSlotKind,
}

#[derive(Debug, Deserialize)]
struct BossSlotJson {
    name: String,
    node: String,
    requirement: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum KeyLayoutJson {
    End {
        requirement: Option<String>,
    },
    SmallKey {
        count: Capacity,
        locations: Vec<String>,
        #[serde(default, rename = "bigKeyInLocations")]
        big_key_in_locations: bool,
        #[serde(default)]
        children: Vec<KeyLayoutJson>,
        requirement: Option<String>,
    },
    BigKey {
        locations: Vec<String>,
        #[serde(default)]
        children: Vec<KeyLayoutJson>,
        requirement: Option<String>,
    },
}

fn default_key_layouts() -> Vec<KeyLayoutJson> {
    vec![KeyLayoutJson::End { requirement: None }]
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DungeonEntry {
    pub node: NodeIdx,
    pub entrance: EntranceId,
}

/// A directed edge between two nodes of a dungeon. It can only be crossed when
/// its requirement is met and, if it passes through a key door, the door is unlocked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Connection {
    pub from: NodeIdx,
    pub to: NodeIdx,
    pub requirement: Option<RequirementId>,
    pub door: Option<KeyDoorIdx>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyDoorKind {
    SmallKey,
    BigKey,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyDoor {
    pub name: String,
    pub kind: KeyDoorKind,
    pub node: NodeIdx, // Node from which the door is approached
    pub requirement: Option<RequirementId>,
    pub drop: Option<ItemSlotIdx>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum ItemSlotKind {
    #[default]
    Standard,
    SmallKeyDrop,
    BigKeyDrop,
}

impl ItemSlotKind {
    pub fn is_drop(self) -> bool {
        self != ItemSlotKind::Standard
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemSlot {
    pub name: String,
    pub kind: ItemSlotKind,
    pub node: NodeIdx,
    pub requirement: Option<RequirementId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BossSlot {
    pub name: String,
    pub node: NodeIdx,
    pub requirement: Option<RequirementId>,
}

/// A hypothesis about where a dungeon's keys are placed, used to reject key
/// distributions that could not actually occur.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyLayout {
    End {
        requirement: Option<RequirementId>,
    },
    SmallKey {
        count: Capacity,
        locations: Vec<ItemSlotIdx>,
        big_key_in_locations: bool,
        children: Vec<KeyLayout>,
        requirement: Option<RequirementId>,
    },
    BigKey {
        locations: Vec<ItemSlotIdx>,
        children: Vec<KeyLayout>,
        requirement: Option<RequirementId>,
    },
}

impl KeyLayout {
    pub fn requirement(&self) -> Option<RequirementId> {
        match self {
            KeyLayout::End { requirement }
            | KeyLayout::SmallKey { requirement, .. }
            | KeyLayout::BigKey { requirement, .. } => *requirement,
        }
    }

    pub fn children(&self) -> &[KeyLayout] {
        match self {
            KeyLayout::End { .. } => &[],
            KeyLayout::SmallKey { children, .. } | KeyLayout::BigKey { children, .. } => children,
        }
    }
}

/// Immutable description of one dungeon. Every identifier is resolved to an index
/// at load time, so nothing downstream has to handle an unknown name.
#[derive(Clone, Debug)]
pub struct DungeonDefinition {
    pub name: String,
    pub node_isv: IndexedVec<String>,
    pub entries: Vec<DungeonEntry>,
    pub connections: Vec<Connection>,
    pub connections_by_src: Vec<Vec<ConnectionIdx>>,
    pub key_door_isv: IndexedVec<String>,
    pub key_doors: Vec<KeyDoor>,
    pub small_key_doors: Vec<KeyDoorIdx>,
    pub big_key_doors: Vec<KeyDoorIdx>,
    pub item_isv: IndexedVec<String>,
    pub items: Vec<ItemSlot>,
    pub bosses: Vec<BossSlot>,
    pub small_key_item: Option<ItemId>,
    pub big_key_item: Option<ItemId>,
    pub small_key_count: Capacity,
    pub map: bool,
    pub compass: bool,
    pub key_layouts: Vec<KeyLayout>,
}

impl DungeonDefinition {
    pub fn has_big_key(&self) -> bool {
        self.big_key_item.is_some()
    }

    pub fn small_key_drops(&self) -> impl Iterator<Item = ItemSlotIdx> + '_ {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.kind == ItemSlotKind::SmallKeyDrop)
            .map(|(i, _)| i)
    }

    pub fn has_big_key_drop(&self) -> bool {
        self.items
            .iter()
            .any(|slot| slot.kind == ItemSlotKind::BigKeyDrop)
    }

    /// Every distinct requirement referenced anywhere in the dungeon, in ascending order.
    pub fn requirements(&self) -> Vec<RequirementId> {
        let mut reqs: HashSet<RequirementId> = HashSet::new();
        reqs.extend(self.connections.iter().filter_map(|c| c.requirement));
        reqs.extend(self.key_doors.iter().filter_map(|d| d.requirement));
        reqs.extend(self.items.iter().filter_map(|s| s.requirement));
        reqs.extend(self.bosses.iter().filter_map(|b| b.requirement));
        let mut stack: Vec<&KeyLayout> = self.key_layouts.iter().collect();
        while let Some(layout) = stack.pop() {
            reqs.extend(layout.requirement());
            stack.extend(layout.children());
        }
        let mut reqs: Vec<RequirementId> = reqs.into_iter().collect();
        reqs.sort();
        reqs
    }

    /// Distinct entrances used as entry conditions, in ascending order.
    pub fn entrances(&self) -> Vec<EntranceId> {
        let mut entrances: Vec<EntranceId> = self.entries.iter().map(|e| e.entrance).collect();
        entrances.sort();
        entrances.dedup();
        entrances
    }
}

fn lookup_opt(isv: &IndexedVec<String>, name: &Option<String>, what: &str) -> Result<Option<usize>> {
    name.as_ref().map(|n| isv.lookup(n, what)).transpose()
}

impl GameData {
    pub(crate) fn resolve_dungeon(&self, json: &DungeonJson) -> Result<DungeonDefinition> {
        let node_isv = IndexedVec::from_names(&json.nodes, "node")?;
        if json.entries.is_empty() {
            warn!("Dungeon {} has no entries; nothing in it can be reached", json.name);
        }

        let mut entries = vec![];
        for entry in &json.entries {
            entries.push(DungeonEntry {
                node: node_isv.lookup(&entry.node, "node")?,
                entrance: self.entrance_isv.lookup(&entry.entrance, "entrance")?,
            });
        }

        let mut item_isv: IndexedVec<String> = IndexedVec::default();
        let mut items = vec![];
        for slot in &json.items {
            ensure!(
                !item_isv.index_by_key.contains_key(&slot.name),
                "duplicate item slot name '{}'",
                slot.name
            );
            item_isv.add(&slot.name);
            items.push(ItemSlot {
                name: slot.name.clone(),
                kind: slot.kind,
                node: node_isv
                    .lookup(&slot.node, "node")
                    .with_context(|| format!("item slot {}", slot.name))?,
                requirement: lookup_opt(&self.requirement_isv, &slot.requirement, "requirement")
                    .with_context(|| format!("item slot {}", slot.name))?,
            });
        }

        let mut key_door_isv: IndexedVec<String> = IndexedVec::default();
        let mut key_doors = vec![];
        let mut small_key_doors = vec![];
        let mut big_key_doors = vec![];
        let door_groups = [
            (KeyDoorKind::SmallKey, &json.small_key_doors),
            (KeyDoorKind::BigKey, &json.big_key_doors),
        ];
        for (kind, doors) in door_groups {
            for door in doors.iter() {
                ensure!(
                    !key_door_isv.index_by_key.contains_key(&door.name),
                    "duplicate key door name '{}'",
                    door.name
                );
                let drop = lookup_opt(&item_isv, &door.drop, "item slot")
                    .with_context(|| format!("key door {}", door.name))?;
                if let Some(drop_idx) = drop {
                    ensure!(
                        kind == KeyDoorKind::BigKey,
                        "small key door {} cannot name a drop",
                        door.name
                    );
                    ensure!(
                        items[drop_idx].kind == ItemSlotKind::BigKeyDrop,
                        "key door {} names {} as its drop, which is not a big key drop",
                        door.name,
                        items[drop_idx].name
                    );
                }
                let idx = key_door_isv.add(&door.name);
                match kind {
                    KeyDoorKind::SmallKey => small_key_doors.push(idx),
                    KeyDoorKind::BigKey => big_key_doors.push(idx),
                }
                key_doors.push(KeyDoor {
                    name: door.name.clone(),
                    kind,
                    node: node_isv
                        .lookup(&door.node, "node")
                        .with_context(|| format!("key door {}", door.name))?,
                    requirement: lookup_opt(&self.requirement_isv, &door.requirement, "requirement")
                        .with_context(|| format!("key door {}", door.name))?,
                    drop,
                });
            }
        }

        let mut connections = vec![];
        let mut connections_by_src: Vec<Vec<ConnectionIdx>> = vec![vec![]; node_isv.len()];
        for conn in &json.connections {
            let resolved = Connection {
                from: node_isv.lookup(&conn.from, "node")?,
                to: node_isv.lookup(&conn.to, "node")?,
                requirement: lookup_opt(&self.requirement_isv, &conn.requirement, "requirement")?,
                door: lookup_opt(&key_door_isv, &conn.door, "key door")?,
            };
            connections_by_src[resolved.from].push(connections.len());
            connections.push(resolved);
        }

        let mut bosses = vec![];
        for boss in &json.bosses {
            bosses.push(BossSlot {
                name: boss.name.clone(),
                node: node_isv
                    .lookup(&boss.node, "node")
                    .with_context(|| format!("boss {}", boss.name))?,
                requirement: lookup_opt(&self.requirement_isv, &boss.requirement, "requirement")
                    .with_context(|| format!("boss {}", boss.name))?,
            });
        }

        let small_key_item = lookup_opt(&self.item_isv, &json.small_key_item, "item")?;
        let big_key_item = lookup_opt(&self.item_isv, &json.big_key_item, "item")?;
        ensure!(json.small_key_count >= 0, "negative small key count");
        let has_small_key_drop = items.iter().any(|s| s.kind == ItemSlotKind::SmallKeyDrop);
        if small_key_item.is_none()
            && (json.small_key_count > 0 || has_small_key_drop || !small_key_doors.is_empty())
        {
            bail!("dungeon has small keys but no small key item");
        }
        if big_key_item.is_none() && !big_key_doors.is_empty() {
            bail!("dungeon has big key doors but no big key item");
        }

        let mut key_layouts = vec![];
        for layout in &json.key_layouts {
            key_layouts.push(self.resolve_key_layout(layout, &item_isv)?);
        }

        Ok(DungeonDefinition {
            name: json.name.clone(),
            node_isv,
            entries,
            connections,
            connections_by_src,
            key_door_isv,
            key_doors,
            small_key_doors,
            big_key_doors,
            item_isv,
            items,
            bosses,
            small_key_item,
            big_key_item,
            small_key_count: json.small_key_count,
            map: json.map,
            compass: json.compass,
            key_layouts,
        })
    }

    fn resolve_key_layout(
        &self,
        layout: &KeyLayoutJson,
        item_isv: &IndexedVec<String>,
    ) -> Result<KeyLayout> {
        let resolve_locations = |locations: &[String]| -> Result<Vec<ItemSlotIdx>> {
            locations
                .iter()
                .map(|name| item_isv.lookup(name, "item slot"))
                .collect::<Result<Vec<_>>>()
                .context("key layout locations")
        };
        let resolve_children = |children: &[KeyLayoutJson]| -> Result<Vec<KeyLayout>> {
            children
                .iter()
                .map(|child| self.resolve_key_layout(child, item_isv))
                .collect()
        };
        Ok(match layout {
            KeyLayoutJson::End { requirement } => KeyLayout::End {
                requirement: lookup_opt(&self.requirement_isv, requirement, "requirement")?,
            },
            KeyLayoutJson::SmallKey {
                count,
                locations,
                big_key_in_locations,
                children,
                requirement,
            } => {
                ensure!(*count >= 0, "negative key layout count");
                KeyLayout::SmallKey {
                    count: *count,
                    locations: resolve_locations(locations)?,
                    big_key_in_locations: *big_key_in_locations,
                    children: resolve_children(children)?,
                    requirement: lookup_opt(&self.requirement_isv, requirement, "requirement")?,
                }
            }
            KeyLayoutJson::BigKey {
                locations,
                children,
                requirement,
            } => KeyLayout::BigKey {
                locations: resolve_locations(locations)?,
                children: resolve_children(children)?,
                requirement: lookup_opt(&self.requirement_isv, requirement, "requirement")?,
            },
        })
    }
}
