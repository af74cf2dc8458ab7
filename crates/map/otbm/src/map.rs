//! Whole-map (de)serialization: header, tile graph, anomaly accumulation.
//!
//! Loading is tolerant where tolerance is safe: unknown type ids, unknown
//! attribute tags and stray node kinds are recorded as [`Anomaly`] values and
//! the walk continues. Framing violations are not tolerable - they abort the
//! load with a [`FormatError`] and no partial graph is surfaced, so a caller
//! never sees corrupted in-memory state.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use map_core::{ItemDatabase, Map, MapHeader, Position, Tile, TileFlags};

use crate::error::FormatError;
use crate::item::{serialize_item, unserialize_item, write_tagged};
use crate::node::BinaryNode;
use crate::schema::{MapAttr, MapVersion, NodeKind, OTBM_MAGIC, TileAttr};
use crate::stream::{NodeReader, NodeWriter};

/// A tolerated irregularity encountered while loading.
///
/// Anomalies never abort a load; they come back alongside the parsed graph so
/// the editor can show the user what was skipped or substituted.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Anomaly {
    /// An item referenced a type id absent from the registry; the item was
    /// kept as a raw placeholder.
    #[error("unknown item type {id}")]
    UnknownType { id: u16 },

    /// An attribute tag this layer does not know; skipped by length.
    #[error("unknown attribute tag {tag:#04x}")]
    UnknownAttribute { tag: u8 },

    /// An attribute payload with a length its tag cannot carry.
    #[error("attribute tag {tag:#04x} has malformed length {len}")]
    BadAttributeLength { tag: u8, len: u16 },

    /// A tag that is not valid under the declared map version.
    #[error("attribute tag {tag:#04x} is not valid in map version {version}")]
    UnexpectedAttribute { tag: u8, version: u32 },

    /// A node kind that does not belong where it appeared; skipped whole.
    #[error("unexpected node kind {kind:#04x}")]
    UnknownNode { kind: u8 },
}

/// Reads a full map from a byte channel.
///
/// Returns the tile graph together with every anomaly tolerated on the way.
pub fn read_map<R: Read>(
    db: &ItemDatabase,
    mut channel: R,
) -> Result<(Map, Vec<Anomaly>), FormatError> {
    let mut magic = [0u8; 4];
    channel
        .read_exact(&mut magic)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => FormatError::BadHeader,
            _ => FormatError::Io(e),
        })?;
    if magic != OTBM_MAGIC && magic != [0u8; 4] {
        return Err(FormatError::BadHeader);
    }

    let mut nodes = NodeReader::new(channel);
    let root = nodes.read_root()?;
    if root.kind() != NodeKind::Root as u8 {
        return Err(FormatError::UnexpectedNode(root.kind()));
    }

    let mut props = root.prop_reader();
    let header = MapHeader {
        version: props.read_u32()?,
        width: props.read_u16()?,
        height: props.read_u16()?,
        base_floor: props.read_u8()?,
    };
    // Reject unsupported schemas before walking any tile data.
    let version = MapVersion::from_repr(header.version)
        .ok_or(FormatError::UnsupportedVersion(header.version))?;

    let map_data = root
        .children()
        .iter()
        .find(|node| node.kind() == NodeKind::MapData as u8)
        .ok_or(FormatError::BadHeader)?;

    let mut map = Map::new(header);
    let mut anomalies = Vec::new();
    read_map_attributes(map_data, &mut map, &mut anomalies)?;

    for child in map_data.children() {
        match NodeKind::from_repr(child.kind()) {
            Some(NodeKind::Tile) => {
                let tile = read_tile(db, child, version, &mut anomalies)?;
                map.set_tile(tile);
            }
            _ => {
                tracing::warn!(kind = child.kind(), "unexpected node under map data, skipping");
                anomalies.push(Anomaly::UnknownNode { kind: child.kind() });
            }
        }
    }

    tracing::info!(
        tiles = map.tile_count(),
        bytes = nodes.bytes_read(),
        anomalies = anomalies.len(),
        "map stream read"
    );
    Ok((map, anomalies))
}

fn read_map_attributes(
    map_data: &BinaryNode,
    map: &mut Map,
    anomalies: &mut Vec<Anomaly>,
) -> Result<(), FormatError> {
    let mut props = map_data.prop_reader();
    while !props.is_done() {
        let tag = props.read_u8()?;
        let len = props.read_u16()?;
        let payload = match props.read_bytes(len as usize) {
            Ok(payload) => payload,
            Err(_) => {
                anomalies.push(Anomaly::BadAttributeLength { tag, len });
                break;
            }
        };
        match MapAttr::from_repr(tag) {
            Some(MapAttr::Description) => {
                map.description = String::from_utf8_lossy(payload).into_owned();
            }
            None => {
                tracing::warn!(tag, "unknown map attribute tag, skipping by length");
                anomalies.push(Anomaly::UnknownAttribute { tag });
            }
        }
    }
    Ok(())
}

fn read_tile(
    db: &ItemDatabase,
    node: &BinaryNode,
    version: MapVersion,
    anomalies: &mut Vec<Anomaly>,
) -> Result<Tile, FormatError> {
    let mut props = node.prop_reader();
    let x = props.read_u16()?;
    let y = props.read_u16()?;
    let z = props.read_u8()?;
    let mut tile = Tile::new(Position::new(x, y, z));

    while !props.is_done() {
        let tag = props.read_u8()?;
        let len = props.read_u16()?;
        let payload = match props.read_bytes(len as usize) {
            Ok(payload) => payload,
            Err(_) => {
                anomalies.push(Anomaly::BadAttributeLength { tag, len });
                break;
            }
        };
        match TileAttr::from_repr(tag) {
            Some(TileAttr::Flags) if payload.len() == 4 => {
                let bits = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
                // Unknown flag bits are retained verbatim for round-trip
                // fidelity.
                tile.flags = TileFlags::from_bits_retain(bits);
            }
            Some(TileAttr::Flags) => {
                anomalies.push(Anomaly::BadAttributeLength { tag, len });
            }
            None => {
                tracing::warn!(tag, "unknown tile attribute tag, skipping by length");
                anomalies.push(Anomaly::UnknownAttribute { tag });
            }
        }
    }

    // Stacking order on disk is authoritative: append, never re-sort.
    for child in node.children() {
        match NodeKind::from_repr(child.kind()) {
            Some(NodeKind::Item) => {
                let item = unserialize_item(db, child, version, anomalies)?;
                tile.push_item(item);
            }
            _ => {
                tracing::warn!(kind = child.kind(), "unexpected node under a tile, skipping");
                anomalies.push(Anomaly::UnknownNode { kind: child.kind() });
            }
        }
    }
    Ok(tile)
}

/// Writes a full map to a byte channel. Returns the total bytes emitted.
pub fn write_map<W: Write>(
    db: &ItemDatabase,
    channel: W,
    map: &Map,
) -> Result<u64, FormatError> {
    // Maps save back under the schema they were read with.
    let version = MapVersion::from_repr(map.header.version)
        .ok_or(FormatError::UnsupportedVersion(map.header.version))?;

    let mut channel = channel;
    channel.write_all(&OTBM_MAGIC)?;
    let mut writer = NodeWriter::new(channel);

    writer.begin_node(NodeKind::Root as u8)?;
    writer.write_u32(map.header.version)?;
    writer.write_u16(map.header.width)?;
    writer.write_u16(map.header.height)?;
    writer.write_u8(map.header.base_floor)?;

    writer.begin_node(NodeKind::MapData as u8)?;
    if !map.description.is_empty() {
        write_tagged(&mut writer, MapAttr::Description as u8, map.description.as_bytes())?;
    }
    for tile in map.tiles() {
        write_tile(db, tile, version, &mut writer)?;
    }
    writer.end_node()?;
    writer.end_node()?;

    let total = writer.bytes_written() + OTBM_MAGIC.len() as u64;
    writer.finish()?;
    tracing::info!(tiles = map.tile_count(), bytes = total, "map stream written");
    Ok(total)
}

fn write_tile<W: Write>(
    db: &ItemDatabase,
    tile: &Tile,
    version: MapVersion,
    writer: &mut NodeWriter<W>,
) -> Result<(), FormatError> {
    let position = tile.position();
    writer.begin_node(NodeKind::Tile as u8)?;
    writer.write_u16(position.x)?;
    writer.write_u16(position.y)?;
    writer.write_u8(position.z)?;
    if !tile.flags.is_empty() {
        write_tagged(writer, TileAttr::Flags as u8, &tile.flags.bits().to_le_bytes())?;
    }
    // Emit items in the tile's current stacking order.
    for item in tile.items() {
        serialize_item(db, item, version, writer)?;
    }
    writer.end_node()
}

/// Loads a map file from disk.
pub fn load_map(db: &ItemDatabase, path: &Path) -> Result<(Map, Vec<Anomaly>), FormatError> {
    let file = File::open(path)?;
    let (map, anomalies) = read_map(db, BufReader::new(file))?;
    tracing::info!(path = %path.display(), tiles = map.tile_count(), "map loaded");
    Ok((map, anomalies))
}

/// Saves a map file to disk.
pub fn save_map(db: &ItemDatabase, path: &Path, map: &Map) -> Result<(), FormatError> {
    let file = File::create(path)?;
    write_map(db, BufWriter::new(file), map)?;
    tracing::info!(path = %path.display(), tiles = map.tile_count(), "map saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ItemAttr, attr_keys};
    use map_core::{Item, ItemGroup, ItemType};

    fn test_db() -> ItemDatabase {
        let mut db = ItemDatabase::new();
        db.insert(ItemType {
            id: 1,
            name: "void".into(),
            ..Default::default()
        })
        .unwrap();
        db.insert(ItemType {
            id: 100,
            name: "grass".into(),
            group: ItemGroup::Ground,
            ..Default::default()
        })
        .unwrap();
        db.insert(ItemType {
            id: 200,
            name: "grass border".into(),
            is_border: true,
            always_on_bottom: true,
            top_order: 1,
            ..Default::default()
        })
        .unwrap();
        db.insert(ItemType {
            id: 2400,
            name: "gold coin".into(),
            stackable: true,
            ..Default::default()
        })
        .unwrap();
        db.insert(ItemType {
            id: 2268,
            name: "sudden death rune".into(),
            charges: 3,
            ..Default::default()
        })
        .unwrap();
        db.insert(ItemType {
            id: 1987,
            name: "backpack".into(),
            group: ItemGroup::Container,
            ..Default::default()
        })
        .unwrap();
        db
    }

    fn header() -> MapHeader {
        MapHeader {
            version: MapVersion::CURRENT as u32,
            width: 2048,
            height: 2048,
            base_floor: 7,
        }
    }

    fn parse_node(bytes: &[u8]) -> BinaryNode {
        NodeReader::new(bytes).read_root().unwrap()
    }

    fn unserialize(
        db: &ItemDatabase,
        bytes: &[u8],
        version: MapVersion,
    ) -> (Item, Vec<Anomaly>) {
        let node = parse_node(bytes);
        let mut anomalies = Vec::new();
        let item = unserialize_item(db, &node, version, &mut anomalies).unwrap();
        (item, anomalies)
    }

    #[test]
    fn compact_item_scenario_is_byte_identical() {
        let db = test_db();
        let bytes = hex::decode("fe060100ff").unwrap();
        let (item, anomalies) = unserialize(&db, &bytes, MapVersion::V2);
        assert!(anomalies.is_empty());
        assert_eq!(item.id(), 1);
        assert_eq!(item.subtype(), 1);
        assert!(!item.is_complex());

        let mut writer = NodeWriter::new(Vec::new());
        serialize_item(&db, &item, MapVersion::V2, &mut writer).unwrap();
        assert_eq!(writer.finish().unwrap(), bytes);
    }

    #[test]
    fn complex_item_round_trips() {
        let db = test_db();
        let mut item = Item::new(&db, 1, None).unwrap();
        item.set_unique_id(1111);
        item.set_action_id(2222);
        item.set_tier(3);
        item.set_text("here lies a test");
        item.set_description("scribbled in haste");

        let mut writer = NodeWriter::new(Vec::new());
        serialize_item(&db, &item, MapVersion::V2, &mut writer).unwrap();
        let bytes = writer.finish().unwrap();

        let (back, anomalies) = unserialize(&db, &bytes, MapVersion::V2);
        assert!(anomalies.is_empty());
        assert!(back.is_complex());
        assert_eq!(back.unique_id(), 1111);
        assert_eq!(back.action_id(), 2222);
        assert_eq!(back.tier(), 3);
        assert_eq!(back.text(), "here lies a test");
        assert_eq!(back.description(), "scribbled in haste");
    }

    #[test]
    fn stackable_count_round_trips() {
        let db = test_db();
        let coins = Item::new(&db, 2400, Some(57)).unwrap();
        let mut writer = NodeWriter::new(Vec::new());
        serialize_item(&db, &coins, MapVersion::V2, &mut writer).unwrap();
        let bytes = writer.finish().unwrap();

        let (back, _) = unserialize(&db, &bytes, MapVersion::V2);
        assert_eq!(back.get_count(&db), 57);
        assert!(!back.is_complex(), "a count alone is still the compact form");
    }

    #[test]
    fn charges_round_trip_as_u16() {
        let db = test_db();
        let rune = Item::new(&db, 2268, Some(500)).unwrap();
        let mut writer = NodeWriter::new(Vec::new());
        serialize_item(&db, &rune, MapVersion::V2, &mut writer).unwrap();
        let (back, _) = unserialize(&db, &writer.finish().unwrap(), MapVersion::V2);
        assert_eq!(back.subtype(), 500);
    }

    #[test]
    fn container_contents_keep_order() {
        let db = test_db();
        let mut backpack = Item::new(&db, 1987, None).unwrap();
        for id in [2400u16, 2268, 1] {
            backpack
                .contents_mut()
                .push(Item::new(&db, id, None).unwrap());
        }

        let mut writer = NodeWriter::new(Vec::new());
        serialize_item(&db, &backpack, MapVersion::V2, &mut writer).unwrap();
        let (back, anomalies) = unserialize(&db, &writer.finish().unwrap(), MapVersion::V2);
        assert!(anomalies.is_empty());
        let ids: Vec<u16> = back.contents().iter().map(Item::id).collect();
        assert_eq!(ids, vec![2400, 2268, 1]);
    }

    #[test]
    fn unknown_type_becomes_placeholder_with_anomaly() {
        let db = test_db();
        let mut writer = NodeWriter::new(Vec::new());
        writer.begin_node(NodeKind::Item as u8).unwrap();
        writer.write_u16(9999).unwrap();
        writer.end_node().unwrap();
        let (item, anomalies) = unserialize(&db, &writer.finish().unwrap(), MapVersion::V2);
        assert_eq!(item.id(), 9999);
        assert_eq!(anomalies, vec![Anomaly::UnknownType { id: 9999 }]);
    }

    #[test]
    fn unknown_attribute_is_skipped_and_dropped() {
        let db = test_db();
        let mut writer = NodeWriter::new(Vec::new());
        writer.begin_node(NodeKind::Item as u8).unwrap();
        writer.write_u16(1).unwrap();
        write_tagged(&mut writer, 0x63, &[0xAB, 0xCD]).unwrap();
        writer.end_node().unwrap();

        let (item, anomalies) = unserialize(&db, &writer.finish().unwrap(), MapVersion::V2);
        assert_eq!(anomalies, vec![Anomaly::UnknownAttribute { tag: 0x63 }]);
        assert!(!item.is_complex(), "unknown payloads are not preserved");

        // The re-emitted stream contains only what the layer understands.
        let mut rewriter = NodeWriter::new(Vec::new());
        serialize_item(&db, &item, MapVersion::V2, &mut rewriter).unwrap();
        assert_eq!(rewriter.finish().unwrap(), hex::decode("fe060100ff").unwrap());
    }

    #[test]
    fn tier_is_rejected_under_v1() {
        let db = test_db();
        let mut writer = NodeWriter::new(Vec::new());
        writer.begin_node(NodeKind::Item as u8).unwrap();
        writer.write_u16(1).unwrap();
        write_tagged(&mut writer, ItemAttr::Tier as u8, &5u16.to_le_bytes()).unwrap();
        writer.end_node().unwrap();

        let (item, anomalies) = unserialize(&db, &writer.finish().unwrap(), MapVersion::V1);
        assert_eq!(item.tier(), 0);
        assert_eq!(
            anomalies,
            vec![Anomaly::UnexpectedAttribute {
                tag: ItemAttr::Tier as u8,
                version: 1
            }]
        );
    }

    #[test]
    fn malformed_attribute_length_is_an_anomaly() {
        let db = test_db();
        let mut writer = NodeWriter::new(Vec::new());
        writer.begin_node(NodeKind::Item as u8).unwrap();
        writer.write_u16(1).unwrap();
        // UniqueId expects two bytes, give it one.
        write_tagged(&mut writer, ItemAttr::UniqueId as u8, &[0x07]).unwrap();
        writer.end_node().unwrap();

        let (item, anomalies) = unserialize(&db, &writer.finish().unwrap(), MapVersion::V2);
        assert_eq!(item.unique_id(), 0);
        assert_eq!(
            anomalies,
            vec![Anomaly::BadAttributeLength {
                tag: ItemAttr::UniqueId as u8,
                len: 1
            }]
        );
    }

    fn build_map(db: &ItemDatabase) -> Map {
        let mut map = Map::new(header());
        map.description = "round-trip fixture".into();

        let mut tile = Tile::new(Position::new(100, 100, 7));
        tile.flags = TileFlags::PROTECTION_ZONE;
        tile.push_item(Item::new(db, 100, None).unwrap());
        tile.push_item(Item::new(db, 200, None).unwrap());
        let mut sign = Item::new(db, 1, None).unwrap();
        sign.set_text("keep out");
        sign.set_unique_id(4001);
        tile.push_item(sign);
        tile.push_item(Item::new(db, 2400, Some(30)).unwrap());
        map.set_tile(tile);

        let mut other = Tile::new(Position::new(101, 100, 7));
        other.push_item(Item::new(db, 100, None).unwrap());
        map.set_tile(other);
        map
    }

    #[test]
    fn map_round_trip_preserves_stacking_order() {
        let db = test_db();
        let map = build_map(&db);

        let mut bytes = Vec::new();
        write_map(&db, &mut bytes, &map).unwrap();
        let (back, anomalies) = read_map(&db, bytes.as_slice()).unwrap();

        assert!(anomalies.is_empty());
        assert_eq!(back.header, map.header);
        assert_eq!(back.description, "round-trip fixture");
        assert_eq!(back.tile_count(), 2);

        let tile = back.tile(Position::new(100, 100, 7)).unwrap();
        assert_eq!(tile.flags, TileFlags::PROTECTION_ZONE);
        let ids: Vec<u16> = tile.items().iter().map(Item::id).collect();
        assert_eq!(ids, vec![100, 200, 1, 2400], "order exactly as written");

        let sign = &tile.items()[2];
        assert_eq!(sign.text(), "keep out");
        assert_eq!(sign.unique_id(), 4001);
        assert_eq!(tile.items()[3].get_count(&db), 30);
    }

    #[test]
    fn unsupported_version_fails_before_the_walk() {
        let db = test_db();
        let mut map = build_map(&db);
        map.header.version = 99;

        let mut bytes = Vec::new();
        assert!(matches!(
            write_map(&db, &mut bytes, &map),
            Err(FormatError::UnsupportedVersion(99))
        ));

        // Same on the read side: forge a header declaring version 99.
        map.header.version = MapVersion::CURRENT as u32;
        let mut bytes = Vec::new();
        write_map(&db, &mut bytes, &map).unwrap();
        // Version lives right after the magic, the start marker and the root
        // kind byte.
        bytes[6] = 99;
        assert!(matches!(
            read_map(&db, bytes.as_slice()),
            Err(FormatError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn truncated_stream_is_fatal() {
        let db = test_db();
        let map = build_map(&db);
        let mut bytes = Vec::new();
        write_map(&db, &mut bytes, &map).unwrap();
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(
            read_map(&db, bytes.as_slice()),
            Err(FormatError::TruncatedStream)
        ));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let db = test_db();
        assert!(matches!(
            read_map(&db, b"XTBM\xfe\x00\xff".as_slice()),
            Err(FormatError::BadHeader)
        ));
    }

    #[test]
    fn file_round_trip() {
        let db = test_db();
        let map = build_map(&db);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.otbm");

        save_map(&db, &path, &map).unwrap();
        let (back, anomalies) = load_map(&db, &path).unwrap();
        assert!(anomalies.is_empty());
        assert_eq!(back.tile_count(), map.tile_count());
        assert_eq!(back.description, map.description);
    }

    #[test]
    fn depot_and_door_attributes_round_trip() {
        let db = test_db();
        let mut depot = Item::new(&db, 1987, None).unwrap();
        depot.attributes_mut().set(attr_keys::DEPOT_ID, 12);
        let mut writer = NodeWriter::new(Vec::new());
        serialize_item(&db, &depot, MapVersion::V2, &mut writer).unwrap();
        let (back, anomalies) = unserialize(&db, &writer.finish().unwrap(), MapVersion::V2);
        assert!(anomalies.is_empty());
        assert_eq!(back.attributes().unwrap().get_int(attr_keys::DEPOT_ID), 12);
    }
}
