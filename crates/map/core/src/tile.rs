//! Tiles and the sparse map graph.
//!
//! A tile's item vector *is* its z-order: ground, then borders and other
//! always-on-bottom items by their top order band, then everything else.
//! Serialization preserves that order exactly in both directions, so the
//! loader appends with [`Tile::push_item`] while editor insertions go through
//! the order-aware [`Tile::insert_item`].

use std::collections::BTreeMap;

use bitflags::bitflags;

use crate::item::Item;
use crate::position::Position;
use crate::types::ItemDatabase;

bitflags! {
    /// Zone flags stored per tile.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct TileFlags: u32 {
        const PROTECTION_ZONE = 1 << 0;
        const NO_PVP = 1 << 2;
        const NO_LOGOUT = 1 << 3;
        const PVP_ZONE = 1 << 4;
    }
}

/// One tile of the map: an addressed, ordered stack of items.
#[derive(Debug)]
pub struct Tile {
    position: Position,
    items: Vec<Item>,
    pub flags: TileFlags,
}

impl Tile {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            items: Vec::new(),
            flags: TileFlags::empty(),
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Appends to the stack exactly as given, preserving the caller's order.
    ///
    /// This is the deserialization path: the stored order in the map file is
    /// authoritative and must not be re-sorted on load.
    pub fn push_item(&mut self, item: Item) {
        self.items.push(item);
    }

    /// Inserts respecting stacking bands, the editor's placement path.
    ///
    /// The item lands after all items of its own band and before the first
    /// item of a higher band. A second ground item replaces the existing one,
    /// which is returned to the caller.
    pub fn insert_item(&mut self, db: &ItemDatabase, item: Item) -> Option<Item> {
        if item.is_ground(db) {
            if let Some(first) = self.items.first_mut() {
                if first.is_ground(db) {
                    return Some(std::mem::replace(first, item));
                }
            }
            self.items.insert(0, item);
            return None;
        }
        let priority = item.stack_priority(db);
        let index = self
            .items
            .iter()
            .position(|existing| existing.stack_priority(db) > priority)
            .unwrap_or(self.items.len());
        self.items.insert(index, item);
        None
    }

    /// The ground item, if this tile has one. Ground is always at the bottom
    /// of the stack.
    pub fn ground(&self, db: &ItemDatabase) -> Option<&Item> {
        self.items.first().filter(|item| item.is_ground(db))
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut Vec<Item> {
        &mut self.items
    }

    pub fn remove_item(&mut self, index: usize) -> Option<Item> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.flags.is_empty()
    }

    pub fn select_all(&mut self) {
        for item in &mut self.items {
            item.select();
        }
    }

    pub fn deselect_all(&mut self) {
        for item in &mut self.items {
            item.deselect();
        }
    }
}

/// On-disk preamble of a map file.
///
/// The version number is interpreted by the serialization layer; the core
/// carries it verbatim so a loaded map saves back under the schema it was
/// read with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MapHeader {
    pub version: u32,
    pub width: u16,
    pub height: u16,
    pub base_floor: u8,
}

/// The sparse tile graph.
///
/// Tiles are keyed by position in a `BTreeMap` so iteration - and therefore
/// the saved file - is deterministic.
#[derive(Debug)]
pub struct Map {
    pub header: MapHeader,
    pub description: String,
    tiles: BTreeMap<Position, Tile>,
}

impl Map {
    pub fn new(header: MapHeader) -> Self {
        Self {
            header,
            description: String::new(),
            tiles: BTreeMap::new(),
        }
    }

    pub fn tile(&self, position: Position) -> Option<&Tile> {
        self.tiles.get(&position)
    }

    pub fn tile_mut(&mut self, position: Position) -> Option<&mut Tile> {
        self.tiles.get_mut(&position)
    }

    /// Inserts a tile at its own position, returning any tile it displaced.
    pub fn set_tile(&mut self, tile: Tile) -> Option<Tile> {
        self.tiles.insert(tile.position(), tile)
    }

    pub fn remove_tile(&mut self, position: Position) -> Option<Tile> {
        self.tiles.remove(&position)
    }

    /// Tiles in deterministic (floor, row, column) order.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    pub fn tiles_mut(&mut self) -> impl Iterator<Item = &mut Tile> {
        self.tiles.values_mut()
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }
}
