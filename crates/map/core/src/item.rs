//! The mutable item entity.
//!
//! An [`Item`] is one object placed on a tile (or nested in a container). It
//! stores only instance state - type id, subtype, selection, the optional
//! attribute store - and answers every type-level question by consulting the
//! [`ItemDatabase`] passed in by the caller.
//!
//! `Item` deliberately implements neither `Clone` nor `PartialEq`: each
//! instance has a unique identity tied to its tile slot, and the only
//! sanctioned duplication path is [`Item::deep_copy`], which also clones the
//! attribute store and container contents independently.

use crate::attributes::{ItemAttributes, keys};
use crate::error::{EditorError, ErrorSeverity};
use crate::types::{ItemDatabase, ItemType, SlotFlags, WeaponType};

/// Errors for item construction and mutation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ItemError {
    /// Type id not present in the registry.
    #[error("item type {id} does not exist")]
    UnknownType { id: u16 },

    /// Subtype outside the range representable for the type's wire encoding.
    #[error("subtype {subtype} is out of range for item type {id}")]
    InvalidSubtype { id: u16, subtype: u16 },

    /// Catalog declared the same type id twice.
    #[error("item type {id} is declared more than once")]
    DuplicateType { id: u16 },
}

impl EditorError for ItemError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            // Callers may substitute a raw placeholder for unknown ids.
            ItemError::UnknownType { .. } => ErrorSeverity::Recoverable,
            ItemError::InvalidSubtype { .. } => ErrorSeverity::Validation,
            ItemError::DuplicateType { .. } => ErrorSeverity::Validation,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ItemError::UnknownType { .. } => "ITEM_UNKNOWN_TYPE",
            ItemError::InvalidSubtype { .. } => "ITEM_INVALID_SUBTYPE",
            ItemError::DuplicateType { .. } => "ITEM_DUPLICATE_TYPE",
        }
    }
}

/// Known floor-transition tiles that predate the floor-change flags.
const STAIR_IDS: [u16; 5] = [459, 924, 1364, 1369, 1386];
const LADDER_IDS: [u16; 3] = [1386, 3687, 5543];

/// A single item instance on the map.
#[derive(Debug)]
pub struct Item {
    id: u16,
    /// Stack count, fluid kind or charge count; which one is decided by the
    /// referenced type's flags. Defaults to 1.
    subtype: u16,
    selected: bool,
    frame: i32,
    locked: bool,
    /// Allocated only once the item carries a non-default attribute.
    attributes: Option<ItemAttributes>,
    /// Nested items, for container types. Order is containment order.
    contents: Vec<Item>,
}

impl Item {
    /// Creates an item of a registered type.
    ///
    /// Fails with [`ItemError::UnknownType`] if the registry has no such id
    /// and with [`ItemError::InvalidSubtype`] if the given subtype does not
    /// fit the type's wire encoding.
    pub fn new(db: &ItemDatabase, type_id: u16, subtype: Option<u16>) -> Result<Self, ItemError> {
        let item_type = db
            .get(type_id)
            .ok_or(ItemError::UnknownType { id: type_id })?;
        let subtype = match subtype {
            Some(n) => {
                check_subtype(item_type, n)?;
                n
            }
            None => 1,
        };
        Ok(Self::bare(type_id, subtype))
    }

    /// Creates a placeholder for a type id missing from the registry.
    ///
    /// Used by the map loader to keep unknown ids representable instead of
    /// aborting a whole-map load; the caller records the anomaly.
    pub fn new_raw(type_id: u16, subtype: u16) -> Self {
        Self::bare(type_id, subtype)
    }

    fn bare(id: u16, subtype: u16) -> Self {
        Self {
            id,
            subtype,
            selected: false,
            frame: 0,
            locked: false,
            attributes: None,
            contents: Vec::new(),
        }
    }

    /// Duplicates this item, including an independently-owned attribute store
    /// and deep copies of any contained items.
    pub fn deep_copy(&self) -> Item {
        Item {
            id: self.id,
            subtype: self.subtype,
            selected: self.selected,
            frame: self.frame,
            locked: self.locked,
            attributes: self.attributes.clone(),
            contents: self.contents.iter().map(Item::deep_copy).collect(),
        }
    }

    /// Rebrands this item as `new_id`, keeping attributes and contents.
    ///
    /// This is the sanctioned way to change an item's type in place.
    pub fn transform(mut self, new_id: u16) -> Item {
        self.id = new_id;
        self
    }

    // --- Identity ---------------------------------------------------------

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn type_of<'a>(&self, db: &'a ItemDatabase) -> &'a ItemType {
        db.lookup(self.id)
    }

    pub fn type_exists(&self, db: &ItemDatabase) -> bool {
        db.type_exists(self.id)
    }

    pub fn client_id(&self, db: &ItemDatabase) -> u16 {
        db.lookup(self.id).client_id
    }

    pub fn name<'a>(&self, db: &'a ItemDatabase) -> &'a str {
        &db.lookup(self.id).name
    }

    /// Display name plus the editor suffix ("sword (weapon)").
    pub fn full_name(&self, db: &ItemDatabase) -> String {
        let t = db.lookup(self.id);
        format!("{}{}", t.name, t.editor_suffix)
    }

    // --- Subtype and count ------------------------------------------------

    pub fn subtype(&self) -> u16 {
        self.subtype
    }

    /// Stack size of this item.
    ///
    /// For stackable and charge-bearing types this is the subtype; everything
    /// else counts as a single item regardless of the stored value.
    pub fn get_count(&self, db: &ItemDatabase) -> u16 {
        let t = db.lookup(self.id);
        if t.stackable || t.is_charged() {
            self.subtype
        } else {
            1
        }
    }

    pub fn set_subtype(&mut self, db: &ItemDatabase, subtype: u16) -> Result<(), ItemError> {
        check_subtype(db.lookup(self.id), subtype)?;
        self.subtype = subtype;
        Ok(())
    }

    /// Assigns the subtype without range validation.
    ///
    /// For deserialization paths, where the wire encoding already bounds the
    /// value. Editor mutations go through [`Item::set_subtype`].
    pub fn set_subtype_unchecked(&mut self, subtype: u16) {
        self.subtype = subtype;
    }

    pub fn has_subtype(&self, db: &ItemDatabase) -> bool {
        db.lookup(self.id).has_subtype()
    }

    // --- Attributes -------------------------------------------------------

    pub fn attributes(&self) -> Option<&ItemAttributes> {
        self.attributes.as_ref()
    }

    /// Lazily allocates the attribute store.
    pub fn attributes_mut(&mut self) -> &mut ItemAttributes {
        self.attributes.get_or_insert_with(ItemAttributes::new)
    }

    pub fn clear_attribute(&mut self, key: &str) {
        if let Some(attrs) = self.attributes.as_mut() {
            attrs.remove(key);
        }
    }

    /// True iff this item carries non-default attributes and therefore needs
    /// the full (non-compact) serialized form.
    pub fn is_complex(&self) -> bool {
        self.attributes.as_ref().is_some_and(|a| !a.is_empty())
    }

    pub fn unique_id(&self) -> u16 {
        self.attributes.as_ref().map_or(0, |a| a.get_int(keys::UID)) as u16
    }

    pub fn set_unique_id(&mut self, n: u16) {
        self.attributes_mut().set(keys::UID, n as i32);
    }

    pub fn action_id(&self) -> u16 {
        self.attributes.as_ref().map_or(0, |a| a.get_int(keys::AID)) as u16
    }

    pub fn set_action_id(&mut self, n: u16) {
        self.attributes_mut().set(keys::AID, n as i32);
    }

    pub fn tier(&self) -> u16 {
        self.attributes
            .as_ref()
            .map_or(0, |a| a.get_int(keys::TIER)) as u16
    }

    pub fn set_tier(&mut self, n: u16) {
        self.attributes_mut().set(keys::TIER, n as i32);
    }

    pub fn text(&self) -> &str {
        self.attributes.as_ref().map_or("", |a| a.get_str(keys::TEXT))
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.attributes_mut().set(keys::TEXT, text.into());
    }

    pub fn description(&self) -> &str {
        self.attributes.as_ref().map_or("", |a| a.get_str(keys::DESC))
    }

    pub fn set_description(&mut self, desc: impl Into<String>) {
        self.attributes_mut().set(keys::DESC, desc.into());
    }

    // --- Container contents -----------------------------------------------

    pub fn contents(&self) -> &[Item] {
        &self.contents
    }

    pub fn contents_mut(&mut self) -> &mut Vec<Item> {
        &mut self.contents
    }

    // --- Rotation ---------------------------------------------------------

    pub fn is_rotatable(&self, db: &ItemDatabase) -> bool {
        let t = db.lookup(self.id);
        t.rotatable && t.rotate_to.is_some()
    }

    /// Rotates in place: the id becomes the type's rotate target.
    ///
    /// One-way: rotating again rotates from the new id. Returns false when the
    /// type has no rotate target configured.
    pub fn do_rotate(&mut self, db: &ItemDatabase) -> bool {
        let t = db.lookup(self.id);
        if !t.rotatable {
            return false;
        }
        match t.rotate_to {
            Some(target) => {
                self.id = target;
                true
            }
            None => false,
        }
    }

    // --- Type classifiers -------------------------------------------------

    pub fn is_stackable(&self, db: &ItemDatabase) -> bool {
        db.lookup(self.id).stackable
    }

    pub fn is_charged(&self, db: &ItemDatabase) -> bool {
        db.lookup(self.id).is_charged()
    }

    pub fn is_fluid_container(&self, db: &ItemDatabase) -> bool {
        db.lookup(self.id).is_fluid_container()
    }

    pub fn is_splash(&self, db: &ItemDatabase) -> bool {
        db.lookup(self.id).is_splash()
    }

    pub fn is_ground(&self, db: &ItemDatabase) -> bool {
        db.lookup(self.id).is_ground()
    }

    pub fn is_container(&self, db: &ItemDatabase) -> bool {
        db.lookup(self.id).is_container()
    }

    pub fn is_magic_field(&self, db: &ItemDatabase) -> bool {
        db.lookup(self.id).is_magic_field()
    }

    pub fn is_border(&self, db: &ItemDatabase) -> bool {
        db.lookup(self.id).is_border
    }

    pub fn is_optional_border(&self, db: &ItemDatabase) -> bool {
        db.lookup(self.id).is_optional_border
    }

    pub fn is_wall(&self, db: &ItemDatabase) -> bool {
        db.lookup(self.id).is_wall
    }

    pub fn is_door(&self, db: &ItemDatabase) -> bool {
        db.lookup(self.id).is_door()
    }

    pub fn is_open(&self, db: &ItemDatabase) -> bool {
        db.lookup(self.id).is_open
    }

    pub fn is_table(&self, db: &ItemDatabase) -> bool {
        db.lookup(self.id).is_table
    }

    pub fn is_carpet(&self, db: &ItemDatabase) -> bool {
        db.lookup(self.id).is_carpet
    }

    pub fn is_hangable(&self, db: &ItemDatabase) -> bool {
        db.lookup(self.id).hangable
    }

    pub fn is_moveable(&self, db: &ItemDatabase) -> bool {
        db.lookup(self.id).moveable
    }

    pub fn is_pickupable(&self, db: &ItemDatabase) -> bool {
        db.lookup(self.id).pickupable
    }

    pub fn is_blocking(&self, db: &ItemDatabase) -> bool {
        db.lookup(self.id).unpassable
    }

    pub fn is_always_on_bottom(&self, db: &ItemDatabase) -> bool {
        db.lookup(self.id).always_on_bottom
    }

    pub fn top_order(&self, db: &ItemDatabase) -> u8 {
        db.lookup(self.id).top_order
    }

    /// Band this item occupies in a tile's stacking order: ground first,
    /// then always-on-bottom items by their top order, then everything else.
    pub fn stack_priority(&self, db: &ItemDatabase) -> u8 {
        let t = db.lookup(self.id);
        if t.is_ground() {
            0
        } else if t.always_on_bottom {
            t.top_order
        } else {
            5
        }
    }

    pub fn is_weapon(&self, db: &ItemDatabase) -> bool {
        let weapon_type = db.lookup(self.id).weapon_type;
        weapon_type != WeaponType::None && weapon_type != WeaponType::Ammunition
    }

    pub fn is_ammunition(&self, db: &ItemDatabase) -> bool {
        db.lookup(self.id).weapon_type == WeaponType::Ammunition
    }

    /// Wearable piece of armor. The ammo slot only counts when the item is
    /// not itself ammunition (light sources that give stats sit there).
    pub fn is_wearable_equipment(&self, db: &ItemDatabase) -> bool {
        let slots = db.lookup(self.id).slot_position;
        if slots.intersects(
            SlotFlags::HEAD
                | SlotFlags::NECKLACE
                | SlotFlags::ARMOR
                | SlotFlags::LEGS
                | SlotFlags::FEET
                | SlotFlags::RING,
        ) {
            return true;
        }
        slots.contains(SlotFlags::AMMO) && !self.is_ammunition(db)
    }

    /// Floor-transition check: known ids first, then the floor-change flags,
    /// then a name fallback kept for catalogs that predate the flags.
    pub fn is_stairs(&self, db: &ItemDatabase) -> bool {
        if STAIR_IDS.contains(&self.id) {
            return true;
        }
        let t = db.lookup(self.id);
        if t.floor_change_down
            || t.floor_change_north
            || t.floor_change_south
            || t.floor_change_east
            || t.floor_change_west
        {
            return true;
        }
        let name = t.name.to_lowercase();
        ["stair", "spiral", "ramp", "floor change", "level change"]
            .iter()
            .any(|word| name.contains(word))
    }

    /// Same layered check as [`Item::is_stairs`], for ladders.
    pub fn is_ladder(&self, db: &ItemDatabase) -> bool {
        if LADDER_IDS.contains(&self.id) {
            return true;
        }
        let t = db.lookup(self.id);
        if t.floor_change_down || t.floor_change_up {
            return true;
        }
        t.name.to_lowercase().contains("ladder")
    }

    // --- Type stats -------------------------------------------------------

    /// Total weight: per-unit weight times the stack count for stackables.
    pub fn weight(&self, db: &ItemDatabase) -> f32 {
        let t = db.lookup(self.id);
        if t.stackable {
            t.weight * f32::from(self.get_count(db))
        } else {
            t.weight
        }
    }

    pub fn attack(&self, db: &ItemDatabase) -> i32 {
        db.lookup(self.id).attack
    }

    pub fn armor(&self, db: &ItemDatabase) -> i32 {
        db.lookup(self.id).armor
    }

    pub fn defense(&self, db: &ItemDatabase) -> i32 {
        db.lookup(self.id).defense
    }

    pub fn is_readable(&self, db: &ItemDatabase) -> bool {
        db.lookup(self.id).readable
    }

    pub fn can_write_text(&self, db: &ItemDatabase) -> bool {
        db.lookup(self.id).writeable
    }

    pub fn max_text_len(&self, db: &ItemDatabase) -> u32 {
        db.lookup(self.id).max_text_len
    }

    pub fn has_light(&self, db: &ItemDatabase) -> bool {
        db.lookup(self.id).has_light()
    }

    // --- Editor state -----------------------------------------------------

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn select(&mut self) {
        self.selected = true;
    }

    pub fn deselect(&mut self) {
        self.selected = false;
    }

    pub fn toggle_selection(&mut self) {
        self.selected = !self.selected;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub fn frame(&self) -> i32 {
        self.frame
    }

    /// Advances the animation frame counter.
    pub fn animate(&mut self) {
        self.frame = self.frame.wrapping_add(1);
    }
}

fn check_subtype(item_type: &ItemType, subtype: u16) -> Result<(), ItemError> {
    // Counts and fluid kinds ride a single byte on the wire; charge counts
    // get the full sixteen bits.
    let wire_is_u8 =
        item_type.stackable || item_type.is_splash() || item_type.is_fluid_container();
    if wire_is_u8 && subtype > u16::from(u8::MAX) {
        return Err(ItemError::InvalidSubtype {
            id: item_type.id,
            subtype,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemGroup;

    fn test_db() -> ItemDatabase {
        let mut db = ItemDatabase::new();
        db.insert(ItemType {
            id: 100,
            name: "grass".into(),
            group: ItemGroup::Ground,
            ..Default::default()
        })
        .unwrap();
        db.insert(ItemType {
            id: 2400,
            name: "gold coin".into(),
            stackable: true,
            pickupable: true,
            moveable: true,
            weight: 0.1,
            ..Default::default()
        })
        .unwrap();
        db.insert(ItemType {
            id: 1000,
            name: "chair".into(),
            rotatable: true,
            rotate_to: Some(1001),
            ..Default::default()
        })
        .unwrap();
        db.insert(ItemType {
            id: 1001,
            name: "chair".into(),
            rotatable: true,
            rotate_to: Some(1002),
            ..Default::default()
        })
        .unwrap();
        db.insert(ItemType {
            id: 1002,
            name: "broken chair".into(),
            rotatable: true,
            rotate_to: None,
            ..Default::default()
        })
        .unwrap();
        db.insert(ItemType {
            id: 3687,
            name: "wooden ladder".into(),
            ..Default::default()
        })
        .unwrap();
        db.insert(ItemType {
            id: 7000,
            name: "marble ramp".into(),
            ..Default::default()
        })
        .unwrap();
        db.insert(ItemType {
            id: 2500,
            name: "plate armor".into(),
            pickupable: true,
            slot_position: SlotFlags::ARMOR,
            ..Default::default()
        })
        .unwrap();
        db.insert(ItemType {
            id: 2544,
            name: "arrow".into(),
            pickupable: true,
            stackable: true,
            weapon_type: WeaponType::Ammunition,
            slot_position: SlotFlags::AMMO,
            ..Default::default()
        })
        .unwrap();
        db
    }

    #[test]
    fn unknown_type_is_rejected() {
        let db = test_db();
        assert_eq!(
            Item::new(&db, 9999, None).unwrap_err(),
            ItemError::UnknownType { id: 9999 }
        );
    }

    #[test]
    fn count_semantics_depend_on_type() {
        let db = test_db();
        let mut coins = Item::new(&db, 2400, None).unwrap();
        coins.set_subtype(&db, 5).unwrap();
        assert_eq!(coins.get_count(&db), 5);

        let mut grass = Item::new(&db, 100, None).unwrap();
        grass.set_subtype(&db, 77).unwrap();
        assert_eq!(grass.get_count(&db), 1, "non-stackable always counts as 1");
    }

    #[test]
    fn subtype_overflow_is_rejected() {
        let db = test_db();
        let mut coins = Item::new(&db, 2400, None).unwrap();
        assert_eq!(
            coins.set_subtype(&db, 300).unwrap_err(),
            ItemError::InvalidSubtype {
                id: 2400,
                subtype: 300
            }
        );
        assert_eq!(coins.subtype(), 1, "failed mutation leaves state untouched");

        // Non-stackable, non-fluid types keep the full u16 range.
        let mut grass = Item::new(&db, 100, None).unwrap();
        grass.set_subtype(&db, 300).unwrap();
    }

    #[test]
    fn rotation_is_one_way() {
        let db = test_db();
        let mut chair = Item::new(&db, 1000, None).unwrap();
        assert!(chair.do_rotate(&db));
        assert_eq!(chair.id(), 1001);
        assert!(chair.do_rotate(&db), "rotates from the new id");
        assert_eq!(chair.id(), 1002);
        assert!(!chair.do_rotate(&db), "no rotate target configured");
        assert_eq!(chair.id(), 1002);
    }

    #[test]
    fn attribute_defaults_and_complexity() {
        let db = test_db();
        let mut item = Item::new(&db, 100, None).unwrap();
        assert_eq!(item.unique_id(), 0);
        assert_eq!(item.action_id(), 0);
        assert_eq!(item.tier(), 0);
        assert_eq!(item.text(), "");
        assert!(!item.is_complex());

        item.set_unique_id(1111);
        item.set_text("dig here");
        assert_eq!(item.unique_id(), 1111);
        assert_eq!(item.text(), "dig here");
        assert!(item.is_complex());

        item.clear_attribute(keys::UID);
        item.clear_attribute(keys::TEXT);
        assert!(!item.is_complex(), "emptied store reads as simple again");
    }

    #[test]
    fn deep_copy_is_independent() {
        let db = test_db();
        let mut original = Item::new(&db, 100, None).unwrap();
        original.set_action_id(42);
        original.set_description("the original");

        let mut copy = original.deep_copy();
        copy.set_action_id(7);
        copy.set_description("the copy");

        assert_eq!(original.action_id(), 42);
        assert_eq!(original.description(), "the original");
        assert_eq!(copy.action_id(), 7);
    }

    #[test]
    fn stairs_and_ladders_fall_back_to_names() {
        let db = test_db();
        let ladder = Item::new(&db, 3687, None).unwrap();
        assert!(ladder.is_ladder(&db), "known id");

        let ramp = Item::new(&db, 7000, None).unwrap();
        assert!(ramp.is_stairs(&db), "name substring fallback");
        assert!(!ramp.is_ladder(&db));

        let grass = Item::new(&db, 100, None).unwrap();
        assert!(!grass.is_stairs(&db));
    }

    #[test]
    fn equipment_classifiers() {
        let db = test_db();
        let armor = Item::new(&db, 2500, None).unwrap();
        assert!(armor.is_wearable_equipment(&db));
        assert!(!armor.is_weapon(&db));

        let arrows = Item::new(&db, 2544, None).unwrap();
        assert!(arrows.is_ammunition(&db));
        assert!(!arrows.is_weapon(&db), "ammo is not a weapon");
        assert!(
            !arrows.is_wearable_equipment(&db),
            "ammo slot does not count for ammunition itself"
        );
    }

    #[test]
    fn stackable_weight_scales_with_count() {
        let db = test_db();
        let mut coins = Item::new(&db, 2400, Some(100)).unwrap();
        assert!((coins.weight(&db) - 10.0).abs() < 1e-5);
        coins.set_subtype(&db, 1).unwrap();
        assert!((coins.weight(&db) - 0.1).abs() < 1e-5);
    }
}
