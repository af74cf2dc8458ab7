//! OTBM map format I/O.
//!
//! `map-otbm` layers two things on top of the `map-core` data model:
//!
//! - a generic escaped node stream codec ([`stream`], [`node`]) that knows
//!   nothing about maps, only about framing, escaping and typed fields
//! - the versioned OTBM schema ([`schema`], [`item`], [`map`]) that walks
//!   node trees into tile/item graphs and back
//!
//! The top-level entry points are [`load_map`] / [`save_map`] (and their
//! channel-based forms [`read_map`] / [`write_map`]). Loads return the parsed
//! graph together with a list of tolerated [`Anomaly`] values; framing errors
//! surface as [`FormatError`] and abort the operation.

pub mod error;
pub mod item;
pub mod map;
pub mod node;
pub mod schema;
pub mod stream;

pub use error::FormatError;
pub use item::{serialize_item, unserialize_item};
pub use map::{Anomaly, load_map, read_map, save_map, write_map};
pub use node::{BinaryNode, PropReader};
pub use schema::{ItemAttr, MapAttr, MapVersion, NodeKind, OTBM_MAGIC, TileAttr, attr_keys};
pub use stream::{ESCAPE, NODE_END, NODE_START, NodeReader, NodeWriter, escape, unescape};
