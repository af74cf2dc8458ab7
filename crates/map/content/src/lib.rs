//! Catalog loading for the map editor.
//!
//! This crate houses the loaders that convert on-disk catalog files into the
//! registries consumed by `map-core` and `map-otbm`. The item catalog is a
//! one-time bulk load at startup; the resulting [`map_core::ItemDatabase`] is
//! read-only for the rest of the process.

pub mod loaders;

pub use loaders::{ItemLoader, LoadResult};
