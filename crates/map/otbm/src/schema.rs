//! The versioned OTBM schema: node kinds and attribute tag vocabulary.
//!
//! Every tagged attribute is framed as `tag: u8, len: u16, payload[len]`, so
//! a reader that does not know a tag can still skip it by length - that is
//! the whole forward-compatibility story of the format.

use strum::FromRepr;

/// File identifier preceding the root node. All-zero identifiers are also
/// accepted; old tools wrote them as a wildcard.
pub const OTBM_MAGIC: [u8; 4] = *b"OTBM";

/// Supported map schema versions.
///
/// The version is read from the header and gates which attribute tags are
/// valid; anything the layer cannot interpret is rejected before the tree
/// walk begins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, FromRepr)]
#[repr(u32)]
pub enum MapVersion {
    V1 = 1,
    V2 = 2,
}

impl MapVersion {
    /// Schema written for newly created maps.
    pub const CURRENT: MapVersion = MapVersion::V2;

    /// Item tiers only exist in the second schema revision.
    pub fn supports_tier(self) -> bool {
        matches!(self, MapVersion::V2)
    }
}

/// Node kinds appearing in a map stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum NodeKind {
    Root = 0x00,
    MapData = 0x02,
    Tile = 0x05,
    Item = 0x06,
}

/// Tagged attributes of the map data node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum MapAttr {
    Description = 0x01,
}

/// Tagged attributes of a tile node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum TileAttr {
    Flags = 0x03,
}

/// Tagged attributes of an item node.
///
/// Tag values are wire constants and never change meaning across versions;
/// versions may only add tags (and [`ItemAttr::Tier`] is V2-only).
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum ItemAttr {
    ActionId = 0x04,
    UniqueId = 0x05,
    Text = 0x06,
    Description = 0x07,
    TeleportDest = 0x08,
    HouseDoorId = 0x0E,
    Count = 0x0F,
    DepotId = 0x10,
    RuneCharges = 0x11,
    Charges = 0x16,
    Tier = 0x18,
}

/// Attribute keys used for typed values that have no dedicated accessor on
/// the item entity.
pub mod attr_keys {
    pub const DEPOT_ID: &str = "depotid";
    pub const DOOR_ID: &str = "doorid";
    pub const DEST_X: &str = "destx";
    pub const DEST_Y: &str = "desty";
    pub const DEST_Z: &str = "destz";
}
