//! Item catalog loader.

use std::path::Path;

use map_core::{EditorError, ItemDatabase, ItemType};
use serde::{Deserialize, Serialize};

use crate::loaders::{LoadResult, read_file};

/// Item catalog structure for RON files.
///
/// Every [`ItemType`] field has a serde default, so catalog entries only
/// spell out the properties that differ from a featureless item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemCatalog {
    pub items: Vec<ItemType>,
}

/// Loader for the item type catalog from RON files.
pub struct ItemLoader;

impl ItemLoader {
    /// Load the item catalog from a RON file into a fresh registry.
    ///
    /// Duplicate type ids are a catalog defect and fail the whole load.
    pub fn load(path: &Path) -> LoadResult<ItemDatabase> {
        let content = read_file(path)?;
        let db = Self::parse(&content)
            .map_err(|e| anyhow::anyhow!("Failed to load item catalog {}: {}", path.display(), e))?;
        tracing::info!(path = %path.display(), types = db.len(), "item catalog loaded");
        Ok(db)
    }

    /// Parse catalog content already read into memory.
    pub fn parse(content: &str) -> LoadResult<ItemDatabase> {
        let catalog: ItemCatalog = ron::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse item catalog RON: {}", e))?;

        let mut db = ItemDatabase::new();
        for item_type in catalog.items {
            let id = item_type.id;
            db.insert(item_type)
                .map_err(|e| anyhow::anyhow!("Rejecting catalog entry {}: {} ({})", id, e, e.error_code()))?;
        }
        Ok(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use map_core::{ItemGroup, WeaponType};
    use std::io::Write;

    const CATALOG: &str = r#"(
        items: [
            (
                id: 4526,
                client_id: 4526,
                name: "grass",
                group: Ground,
                brush: Some("grass"),
            ),
            (
                id: 2376,
                client_id: 2376,
                name: "sword",
                editor_suffix: " (weapon)",
                pickupable: true,
                moveable: true,
                weight: 35.0,
                attack: 14,
                defense: 12,
                weapon_type: Sword,
            ),
            (
                id: 2666,
                name: "meat",
                stackable: true,
                pickupable: true,
                moveable: true,
                weight: 13.0,
            ),
        ],
    )"#;

    #[test]
    fn parses_sparse_entries() {
        let db = ItemLoader::parse(CATALOG).unwrap();
        assert_eq!(db.len(), 3);

        let grass = db.get(4526).unwrap();
        assert_eq!(grass.group, ItemGroup::Ground);
        assert_eq!(grass.brush.as_deref(), Some("grass"));
        assert!(!grass.stackable, "unlisted fields default");

        let sword = db.get(2376).unwrap();
        assert_eq!(sword.weapon_type, WeaponType::Sword);
        assert_eq!(sword.attack, 14);

        assert!(db.get(2666).unwrap().stackable);
    }

    #[test]
    fn duplicate_ids_fail_the_load() {
        let dup = r#"(items: [(id: 1, name: "a"), (id: 1, name: "b")])"#;
        let err = ItemLoader::parse(dup).unwrap_err();
        assert!(err.to_string().contains("declared more than once"));
    }

    #[test]
    fn malformed_ron_is_an_error() {
        assert!(ItemLoader::parse("(items: [").is_err());
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.ron");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();

        let db = ItemLoader::load(&path).unwrap();
        assert!(db.type_exists(2376));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = ItemLoader::load(Path::new("/nonexistent/items.ron")).unwrap_err();
        assert!(err.to_string().contains("Failed to read file"));
    }
}
