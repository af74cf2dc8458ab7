//! Data model for the tile map editor.
//!
//! `map-core` defines the item/tile/position types, the item type registry,
//! and the sparse per-item attribute store. It knows nothing about file
//! formats: the OTBM serialization layer (`map-otbm`) and the catalog loader
//! (`map-content`) build on the types re-exported here.
//!
//! The registry is always passed by explicit reference - there is no global
//! item database, and every type-level query an [`Item`] answers goes through
//! the [`ItemDatabase`] handed to it.

pub mod attributes;
pub mod error;
pub mod item;
pub mod position;
pub mod tile;
pub mod types;

pub use attributes::{AttributeValue, ItemAttributes, keys};
pub use error::{EditorError, ErrorSeverity};
pub use item::{Item, ItemError};
pub use position::Position;
pub use tile::{Map, MapHeader, Tile, TileFlags};
pub use types::{
    BorderAlignment, FluidKind, ItemDatabase, ItemGroup, ItemType, SlotFlags, WallAlignment,
    WeaponType,
};
