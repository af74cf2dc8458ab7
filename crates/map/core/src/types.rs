//! Item type catalog: immutable per-type properties and the registry.
//!
//! An [`ItemType`] describes one item class (ground, wall, door, weapon, ...)
//! as declared by the external catalog file. Item instances never copy type
//! data; they hold a numeric id and query the [`ItemDatabase`] on demand, so
//! the registry is the single source of truth for every type-level property.

use std::collections::HashMap;
use std::sync::LazyLock;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, FromRepr};

use crate::item::ItemError;

bitflags! {
    /// Equipment slots an item may occupy when worn.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    #[derive(serde::Serialize, serde::Deserialize)]
    pub struct SlotFlags: u16 {
        const HEAD = 1 << 0;
        const NECKLACE = 1 << 1;
        const BACKPACK = 1 << 2;
        const ARMOR = 1 << 3;
        const RIGHT_HAND = 1 << 4;
        const LEFT_HAND = 1 << 5;
        const LEGS = 1 << 6;
        const FEET = 1 << 7;
        const RING = 1 << 8;
        const AMMO = 1 << 9;
        const TWO_HAND = 1 << 11;
    }
}

/// Broad item category, mirroring the catalog's group column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemGroup {
    #[default]
    None,
    Ground,
    Container,
    Splash,
    Fluid,
    Door,
    MagicField,
    Deprecated,
}

/// Weapon class for equippable items.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum WeaponType {
    #[default]
    None,
    Sword,
    Club,
    Axe,
    Shield,
    Distance,
    Wand,
    Ammunition,
}

/// Cardinal/diagonal alignment of an auto-border piece.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BorderAlignment {
    #[default]
    None,
    North,
    East,
    South,
    West,
    NorthWest,
    NorthEast,
    SouthWest,
    SouthEast,
}

/// Orientation of a wall piece.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WallAlignment {
    #[default]
    None,
    Horizontal,
    Vertical,
    Pole,
    Corner,
}

/// Liquid carried by splashes and fluid containers.
///
/// Discriminants are the client's liquid ids; the gaps are deliberate.
/// `Display`/`FromStr` round-trip the editor-facing names ("Coconut Milk").
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display, EnumString, FromRepr,
    Serialize, Deserialize,
)]
#[strum(serialize_all = "title_case", ascii_case_insensitive)]
#[repr(u16)]
pub enum FluidKind {
    #[default]
    None = 0,
    Water = 1,
    Blood = 2,
    Beer = 3,
    Slime = 4,
    Lemonade = 5,
    Milk = 6,
    Manafluid = 7,
    Ink = 8,
    Lifefluid = 10,
    Oil = 11,
    Urine = 13,
    CoconutMilk = 14,
    Wine = 15,
    Mud = 19,
    FruitJuice = 21,
    Lava = 26,
    Rum = 27,
    Swamp = 28,
    Tea = 35,
    Mead = 43,
}

/// Immutable catalog entry for one item class.
///
/// Loaded once from the external catalog and never mutated afterwards, so the
/// registry can be shared read-only across threads. Every field has a serde
/// default: catalog entries only spell out what differs from a featureless
/// item.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemType {
    pub id: u16,
    pub client_id: u16,
    pub name: String,
    /// Disambiguation suffix shown in the palette ("(shovel)", "(sword)").
    pub editor_suffix: String,
    pub group: ItemGroup,

    // Category flags
    pub stackable: bool,
    pub pickupable: bool,
    pub moveable: bool,
    pub unpassable: bool,
    pub block_projectile: bool,
    pub block_pathfind: bool,
    pub hangable: bool,
    pub hook_south: bool,
    pub hook_east: bool,
    pub has_height: bool,
    pub rotatable: bool,
    /// Type id this item becomes when rotated. Rotation is a one-way
    /// transform; only a cycle in the catalog makes it reversible.
    pub rotate_to: Option<u16>,

    // Border/wall classification
    pub is_border: bool,
    pub is_optional_border: bool,
    pub is_wall: bool,
    pub is_table: bool,
    pub is_carpet: bool,
    pub is_open: bool,
    pub is_brush_door: bool,
    pub border_alignment: BorderAlignment,
    pub wall_alignment: WallAlignment,
    pub border_group: u32,
    /// Ground type this border decorates, if any.
    pub ground_equivalent: u16,

    // Z-ordering
    pub always_on_bottom: bool,
    /// Stacking band for always-on-bottom items: 1 borders, 2 ladders and
    /// archways, 3 walls and doors.
    pub top_order: u8,

    // Floor transitions
    pub floor_change_down: bool,
    pub floor_change_up: bool,
    pub floor_change_north: bool,
    pub floor_change_south: bool,
    pub floor_change_east: bool,
    pub floor_change_west: bool,

    // Combat stats
    pub attack: i32,
    pub armor: i32,
    pub defense: i32,
    pub weapon_type: WeaponType,
    pub slot_position: SlotFlags,

    // Charges
    pub charges: u32,
    pub client_charged: bool,

    // Text
    pub readable: bool,
    pub writeable: bool,
    pub max_text_len: u32,

    // Presentation
    pub weight: f32,
    pub light_level: u8,
    pub light_color: u8,
    pub minimap_color: u16,
    pub draw_offset_x: i16,
    pub draw_offset_y: i16,

    // Brush references (opaque names; brush machinery lives outside the core)
    pub brush: Option<String>,
    pub doodad_brush: Option<String>,
    pub raw_brush: Option<String>,
}

impl ItemType {
    pub fn is_ground(&self) -> bool {
        self.group == ItemGroup::Ground
    }

    pub fn is_container(&self) -> bool {
        self.group == ItemGroup::Container
    }

    pub fn is_splash(&self) -> bool {
        self.group == ItemGroup::Splash
    }

    pub fn is_fluid_container(&self) -> bool {
        self.group == ItemGroup::Fluid
    }

    pub fn is_door(&self) -> bool {
        self.group == ItemGroup::Door
    }

    pub fn is_magic_field(&self) -> bool {
        self.group == ItemGroup::MagicField
    }

    /// Charge count maintained by the client rather than the map data.
    pub fn is_client_charged(&self) -> bool {
        self.client_charged
    }

    /// Charge count carried in the item's subtype.
    pub fn is_extra_charged(&self) -> bool {
        !self.client_charged && self.charges > 0
    }

    pub fn is_charged(&self) -> bool {
        self.is_client_charged() || self.is_extra_charged()
    }

    /// Whether the subtype field carries meaning for this type.
    pub fn has_subtype(&self) -> bool {
        self.stackable || self.is_splash() || self.is_fluid_container() || self.is_charged()
    }

    pub fn has_light(&self) -> bool {
        self.light_level > 0
    }
}

/// Stub entry returned by [`ItemDatabase::lookup`] for unknown ids.
static UNKNOWN_TYPE: LazyLock<ItemType> = LazyLock::new(ItemType::default);

/// Registry of all item types, keyed by numeric id.
///
/// Built once by the catalog loader, then treated as read-only; every item
/// property query goes through an explicit `&ItemDatabase` reference rather
/// than a process-wide global.
#[derive(Debug, Default)]
pub struct ItemDatabase {
    types: HashMap<u16, ItemType>,
}

impl ItemDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn type_exists(&self, id: u16) -> bool {
        self.types.contains_key(&id)
    }

    /// Checked lookup. Callers that must distinguish unknown ids use this.
    pub fn get(&self, id: u16) -> Option<&ItemType> {
        self.types.get(&id)
    }

    /// Permissive lookup: unknown ids resolve to a featureless stub entry, so
    /// property chains never fail mid-expression. Matches the legacy editor's
    /// tolerance for ids missing from the catalog.
    pub fn lookup(&self, id: u16) -> &ItemType {
        self.types.get(&id).unwrap_or(&UNKNOWN_TYPE)
    }

    /// Registers a type. Duplicate ids are a catalog defect.
    pub fn insert(&mut self, item_type: ItemType) -> Result<(), ItemError> {
        let id = item_type.id;
        if self.types.insert(id, item_type).is_some() {
            return Err(ItemError::DuplicateType { id });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemType> {
        self.types.values()
    }
}
