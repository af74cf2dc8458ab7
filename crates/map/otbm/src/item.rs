//! Item (de)serialization against the OTBM schema.
//!
//! Two shapes exist on the wire. Simple items use the compact form: type id,
//! plus a count tag when the subtype carries meaning. Complex items (those
//! with a non-empty attribute store) get the full form with one tagged
//! attribute per non-default property. Both deserialize to equivalent item
//! state; the compact form is purely a size optimization.
//!
//! Unknown attribute tags are skipped by their length prefix and recorded as
//! anomalies - they are dropped, not preserved, so a subsequent save emits
//! only attributes this layer understands.

use std::io::Write;

use map_core::{Item, ItemDatabase};

use crate::error::FormatError;
use crate::map::Anomaly;
use crate::node::BinaryNode;
use crate::schema::{ItemAttr, MapVersion, NodeKind, attr_keys};
use crate::stream::NodeWriter;

/// Builds an item from a parsed item node.
///
/// Type ids missing from the registry become raw placeholders and the load
/// continues; the anomaly list tells the caller what was tolerated. Child
/// nodes are contained items (containers recurse, containment order kept).
pub fn unserialize_item(
    db: &ItemDatabase,
    node: &BinaryNode,
    version: MapVersion,
    anomalies: &mut Vec<Anomaly>,
) -> Result<Item, FormatError> {
    let mut props = node.prop_reader();
    let id = props.read_u16()?;
    let mut item = match Item::new(db, id, None) {
        Ok(item) => item,
        Err(_) => {
            tracing::warn!(id, "item type missing from registry, keeping a raw placeholder");
            anomalies.push(Anomaly::UnknownType { id });
            Item::new_raw(id, 1)
        }
    };

    while !props.is_done() {
        let tag = props.read_u8()?;
        let len = props.read_u16()?;
        let payload = match props.read_bytes(len as usize) {
            Ok(payload) => payload,
            Err(_) => {
                tracing::warn!(tag, len, "attribute length overruns the node, dropping the tail");
                anomalies.push(Anomaly::BadAttributeLength { tag, len });
                break;
            }
        };
        read_item_attribute(&mut item, tag, payload, version, anomalies);
    }

    for child in node.children() {
        match NodeKind::from_repr(child.kind()) {
            Some(NodeKind::Item) => {
                let contained = unserialize_item(db, child, version, anomalies)?;
                item.contents_mut().push(contained);
            }
            _ => {
                tracing::warn!(kind = child.kind(), "unexpected child node under an item");
                anomalies.push(Anomaly::UnknownNode { kind: child.kind() });
            }
        }
    }
    Ok(item)
}

/// Applies one tagged attribute to the item.
///
/// This is the single place enforcing the forward-compatibility policy:
/// unknown tags and malformed payload lengths are recorded and skipped, never
/// fatal.
fn read_item_attribute(
    item: &mut Item,
    tag: u8,
    payload: &[u8],
    version: MapVersion,
    anomalies: &mut Vec<Anomaly>,
) {
    let Some(attr) = ItemAttr::from_repr(tag) else {
        tracing::warn!(tag, "unknown item attribute tag, skipping by length");
        anomalies.push(Anomaly::UnknownAttribute { tag });
        return;
    };

    if attr == ItemAttr::Tier && !version.supports_tier() {
        tracing::warn!(?version, "tier attribute is not valid before V2, skipping");
        anomalies.push(Anomaly::UnexpectedAttribute {
            tag,
            version: version as u32,
        });
        return;
    }

    let applied = match attr {
        ItemAttr::Count | ItemAttr::RuneCharges => payload_u8(payload)
            .map(|count| item.set_subtype_unchecked(count.into())),
        ItemAttr::Charges => {
            payload_u16(payload).map(|charges| item.set_subtype_unchecked(charges))
        }
        ItemAttr::ActionId => payload_u16(payload).map(|aid| item.set_action_id(aid)),
        ItemAttr::UniqueId => payload_u16(payload).map(|uid| item.set_unique_id(uid)),
        ItemAttr::Tier => payload_u16(payload).map(|tier| item.set_tier(tier)),
        ItemAttr::Text => {
            item.set_text(String::from_utf8_lossy(payload).into_owned());
            Ok(())
        }
        ItemAttr::Description => {
            item.set_description(String::from_utf8_lossy(payload).into_owned());
            Ok(())
        }
        ItemAttr::DepotId => payload_u16(payload).map(|depot| {
            item.attributes_mut()
                .set(attr_keys::DEPOT_ID, i32::from(depot));
        }),
        ItemAttr::HouseDoorId => payload_u8(payload).map(|door| {
            item.attributes_mut()
                .set(attr_keys::DOOR_ID, i32::from(door));
        }),
        ItemAttr::TeleportDest => {
            if payload.len() != 5 {
                Err(FormatError::TruncatedStream)
            } else {
                let x = u16::from_le_bytes([payload[0], payload[1]]);
                let y = u16::from_le_bytes([payload[2], payload[3]]);
                let attrs = item.attributes_mut();
                attrs.set(attr_keys::DEST_X, i32::from(x));
                attrs.set(attr_keys::DEST_Y, i32::from(y));
                attrs.set(attr_keys::DEST_Z, i32::from(payload[4]));
                Ok(())
            }
        }
    };

    if applied.is_err() {
        tracing::warn!(tag, len = payload.len(), "malformed attribute payload, skipping");
        anomalies.push(Anomaly::BadAttributeLength {
            tag,
            len: payload.len() as u16,
        });
    }
}

/// Writes one item node, recursing into container contents.
pub fn serialize_item<W: Write>(
    db: &ItemDatabase,
    item: &Item,
    version: MapVersion,
    writer: &mut NodeWriter<W>,
) -> Result<(), FormatError> {
    writer.begin_node(NodeKind::Item as u8)?;
    writer.write_u16(item.id())?;
    write_subtype(db, item, writer)?;
    if item.is_complex() {
        write_item_attributes(item, version, writer)?;
    }
    for contained in item.contents() {
        serialize_item(db, contained, version, writer)?;
    }
    writer.end_node()
}

fn write_subtype<W: Write>(
    db: &ItemDatabase,
    item: &Item,
    writer: &mut NodeWriter<W>,
) -> Result<(), FormatError> {
    let item_type = item.type_of(db);
    if item_type.stackable || item_type.is_splash() || item_type.is_fluid_container() {
        // Bounded to u8 by the subtype validation on the entity.
        write_tagged(writer, ItemAttr::Count as u8, &[item.subtype() as u8])
    } else if item_type.is_charged() {
        write_tagged(writer, ItemAttr::Charges as u8, &item.subtype().to_le_bytes())
    } else {
        Ok(())
    }
}

fn write_item_attributes<W: Write>(
    item: &Item,
    version: MapVersion,
    writer: &mut NodeWriter<W>,
) -> Result<(), FormatError> {
    let uid = item.unique_id();
    if uid != 0 {
        write_tagged(writer, ItemAttr::UniqueId as u8, &uid.to_le_bytes())?;
    }
    let aid = item.action_id();
    if aid != 0 {
        write_tagged(writer, ItemAttr::ActionId as u8, &aid.to_le_bytes())?;
    }
    if !item.text().is_empty() {
        write_tagged(writer, ItemAttr::Text as u8, item.text().as_bytes())?;
    }
    if !item.description().is_empty() {
        write_tagged(writer, ItemAttr::Description as u8, item.description().as_bytes())?;
    }
    let tier = item.tier();
    if tier != 0 && version.supports_tier() {
        write_tagged(writer, ItemAttr::Tier as u8, &tier.to_le_bytes())?;
    }
    if let Some(attrs) = item.attributes() {
        let depot = attrs.get_int(attr_keys::DEPOT_ID);
        if depot != 0 {
            write_tagged(writer, ItemAttr::DepotId as u8, &(depot as u16).to_le_bytes())?;
        }
        let door = attrs.get_int(attr_keys::DOOR_ID);
        if door != 0 {
            write_tagged(writer, ItemAttr::HouseDoorId as u8, &[door as u8])?;
        }
        if attrs.get(attr_keys::DEST_X).is_some() {
            let mut dest = [0u8; 5];
            dest[0..2].copy_from_slice(&(attrs.get_int(attr_keys::DEST_X) as u16).to_le_bytes());
            dest[2..4].copy_from_slice(&(attrs.get_int(attr_keys::DEST_Y) as u16).to_le_bytes());
            dest[4] = attrs.get_int(attr_keys::DEST_Z) as u8;
            write_tagged(writer, ItemAttr::TeleportDest as u8, &dest)?;
        }
    }
    Ok(())
}

/// Emits one `tag, len, payload` attribute frame.
pub(crate) fn write_tagged<W: Write>(
    writer: &mut NodeWriter<W>,
    tag: u8,
    payload: &[u8],
) -> Result<(), FormatError> {
    let len =
        u16::try_from(payload.len()).map_err(|_| FormatError::StringTooLong(payload.len()))?;
    writer.write_u8(tag)?;
    writer.write_u16(len)?;
    writer.write_bytes(payload)
}

fn payload_u8(payload: &[u8]) -> Result<u8, FormatError> {
    if payload.len() != 1 {
        return Err(FormatError::TruncatedStream);
    }
    Ok(payload[0])
}

fn payload_u16(payload: &[u8]) -> Result<u16, FormatError> {
    if payload.len() != 2 {
        return Err(FormatError::TruncatedStream);
    }
    Ok(u16::from_le_bytes([payload[0], payload[1]]))
}
