// The changes suggested by this lint usually make the code more cluttered and less clear:
#![allow(clippy::needless_range_loop)]

pub mod dungeon;

use anyhow::{Context, Result, bail, ensure};
use hashbrown::HashMap;
use log::info;
use serde::{Deserialize, Serialize};
use std::borrow::ToOwned;
use std::fs::File;
use std::hash::Hash;
use std::path::Path;
use std::sync::Arc;
use strum_macros::{Display, EnumString, VariantNames};

pub use crate::dungeon::{
    BossSlot, Connection, DungeonDefinition, DungeonEntry, ItemSlot, ItemSlotKind, KeyDoor,
    KeyDoorKind, KeyLayout,
};

pub type NodeIdx = usize; // Index into DungeonDefinition.node_isv.keys: graph nodes inside one dungeon
pub type KeyDoorIdx = usize; // Index into DungeonDefinition.key_doors (small-key and big-key doors)
pub type ItemSlotIdx = usize; // Index into DungeonDefinition.items (including key drops)
pub type ConnectionIdx = usize; // Index into DungeonDefinition.connections
pub type RequirementId = usize; // Index into GameData.requirement_isv.keys: externally evaluated requirements
pub type EntranceId = usize; // Index into GameData.entrance_isv.keys: graph nodes outside the dungeons
pub type ItemId = usize; // Index into GameData.item_isv.keys: tracked items with a count
pub type Capacity = i32; // Data type used to represent item and key counts

#[derive(Default, Clone, Debug)]
pub struct IndexedVec<T: Hash + Eq> {
    pub keys: Vec<T>,
    pub index_by_key: HashMap<T, usize>,
}

impl<T: Hash + Eq> IndexedVec<T> {
    pub fn add<U: ToOwned<Owned = T> + ?Sized>(&mut self, name: &U) -> usize {
        if !self.index_by_key.contains_key(&name.to_owned()) {
            let idx = self.keys.len();
            self.index_by_key.insert(name.to_owned(), self.keys.len());
            self.keys.push(name.to_owned());
            idx
        } else {
            self.index_by_key[&name.to_owned()]
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl IndexedVec<String> {
    pub fn from_names(names: &[String], what: &str) -> Result<Self> {
        let mut isv = IndexedVec::default();
        for name in names {
            ensure!(
                !isv.index_by_key.contains_key(name),
                "duplicate {what} name '{name}'"
            );
            isv.add(name);
        }
        Ok(isv)
    }

    pub fn lookup(&self, name: &str, what: &str) -> Result<usize> {
        self.index_by_key
            .get(name)
            .copied()
            .with_context(|| format!("unknown {what} '{name}'"))
    }
}

/// How reachable something is. The ordering is significant: aggregation takes
/// maxima and minima over it, so it must stay `None < Inspect < Partial < SequenceBreak < Normal`.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    VariantNames,
    Serialize,
    Deserialize,
)]
pub enum AccessibilityLevel {
    #[default]
    None,
    Inspect,
    Partial,
    SequenceBreak,
    Normal,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameDataJson {
    #[serde(default)]
    requirements: Vec<String>,
    #[serde(default)]
    entrances: Vec<String>,
    #[serde(default)]
    items: Vec<String>,
    dungeons: Vec<dungeon::DungeonJson>,
}

/// Static data shared by every dungeon: name tables for the external collaborators
/// (requirements, entrances, items) and the resolved dungeon definitions.
#[derive(Clone, Debug, Default)]
pub struct GameData {
    pub requirement_isv: IndexedVec<String>,
    pub entrance_isv: IndexedVec<String>,
    pub item_isv: IndexedVec<String>,
    pub dungeon_isv: IndexedVec<String>,
    pub dungeons: Vec<Arc<DungeonDefinition>>,
}

fn read_json_str(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("unable to open {}", path.display()))?;
    std::io::read_to_string(file).with_context(|| format!("unable to read {}", path.display()))
}

impl GameData {
    pub fn load(path: &Path) -> Result<GameData> {
        info!("Loading game data from {}", path.display());
        let json_str = read_json_str(path)?;
        GameData::from_json_str(&json_str).with_context(|| format!("unable to load {}", path.display()))
    }

    pub fn from_json_str(json_str: &str) -> Result<GameData> {
        let json: GameDataJson = serde_json::from_str(json_str).context("parsing game data")?;
        GameData::from_json(json)
    }

    fn from_json(json: GameDataJson) -> Result<GameData> {
        let mut game_data = GameData {
            requirement_isv: IndexedVec::from_names(&json.requirements, "requirement")?,
            entrance_isv: IndexedVec::from_names(&json.entrances, "entrance")?,
            item_isv: IndexedVec::from_names(&json.items, "item")?,
            dungeon_isv: IndexedVec::default(),
            dungeons: vec![],
        };
        for dungeon_json in &json.dungeons {
            if game_data.dungeon_isv.index_by_key.contains_key(&dungeon_json.name) {
                bail!("duplicate dungeon name '{}'", dungeon_json.name);
            }
            let dungeon = game_data
                .resolve_dungeon(dungeon_json)
                .with_context(|| format!("Processing dungeon {}", dungeon_json.name))?;
            game_data.dungeon_isv.add(&dungeon_json.name);
            game_data.dungeons.push(Arc::new(dungeon));
        }
        info!(
            "Loaded {} dungeons, {} requirements, {} entrances, {} items",
            game_data.dungeons.len(),
            game_data.requirement_isv.len(),
            game_data.entrance_isv.len(),
            game_data.item_isv.len()
        );
        Ok(game_data)
    }

    pub fn dungeon(&self, name: &str) -> Result<Arc<DungeonDefinition>> {
        let idx = self.dungeon_isv.lookup(name, "dungeon")?;
        Ok(self.dungeons[idx].clone())
    }
}
