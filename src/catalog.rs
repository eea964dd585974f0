//! Item catalog: the read-only roster cards are drawn from.
//!
//! Loaded once per session from a [`CatalogSource`] and shared with cards as
//! `Rc<Item>` handles. The bundled roster (`data/fighters.json`) is compiled
//! in; the browser can also hand over the JSON it fetched itself.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::error::BingoError;

const BUNDLED_ROSTER: &str = include_str!("../data/fighters.json");

/// A single selectable catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub id: String,
    pub display_name: String,
    /// Roster number. Base entries and their variants share one.
    pub ordinal: u32,
    /// Id of the base entry this one is an alternate of.
    pub variant_of: Option<String>,
    /// Paid/DLC entry, filtered when premium items are excluded.
    pub premium: bool,
    /// Another catalog entry shares this ordinal.
    pub has_variant: bool,
    pub icon: Option<String>,
}

impl Item {
    pub fn new(id: &str, display_name: &str, ordinal: u32) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            ordinal,
            variant_of: None,
            premium: false,
            has_variant: false,
            icon: None,
        }
    }

    pub fn variant_of(mut self, base_id: &str) -> Self {
        self.variant_of = Some(base_id.to_string());
        self
    }

    pub fn premium(mut self) -> Self {
        self.premium = true;
        self
    }
}

/// Where catalog JSON comes from. A single read, no retry.
pub trait CatalogSource {
    fn read(&self) -> Result<String, String>;
}

/// The roster compiled into the crate.
pub struct BundledRoster;

impl CatalogSource for BundledRoster {
    fn read(&self) -> Result<String, String> {
        Ok(BUNDLED_ROSTER.to_string())
    }
}

/// Catalog JSON supplied by the caller (e.g. fetched by the page).
pub struct JsonSource<'a>(pub &'a str);

impl CatalogSource for JsonSource<'_> {
    fn read(&self) -> Result<String, String> {
        if self.0.trim().is_empty() {
            return Err("empty catalog document".to_string());
        }
        Ok(self.0.to_string())
    }
}

/// On-disk record. Also accepts the field names of the legacy
/// `fighters.json` export (`fighterId`, `number`, `parent`, `isDlc`).
#[derive(Debug, Deserialize)]
struct ItemRecord {
    #[serde(default, alias = "fighterId")]
    id: Option<String>,
    name: String,
    #[serde(alias = "number")]
    ordinal: u32,
    #[serde(default, alias = "parent")]
    variant_of: Option<String>,
    #[serde(default, alias = "isDlc")]
    premium: bool,
    #[serde(default)]
    icon: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    items: Vec<Rc<Item>>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn load(source: &dyn CatalogSource) -> Result<Self, BingoError> {
        let json = source.read().map_err(|e| {
            tracing::warn!(error = %e, "catalog source read failed");
            BingoError::CatalogUnavailable(e)
        })?;
        Self::from_json(&json)
    }

    pub fn bundled() -> Result<Self, BingoError> {
        Self::load(&BundledRoster)
    }

    /// Parse an id → record JSON object.
    pub fn from_json(json: &str) -> Result<Self, BingoError> {
        let records: BTreeMap<String, ItemRecord> = serde_json::from_str(json)
            .map_err(|e| BingoError::CatalogUnavailable(format!("invalid catalog JSON: {e}")))?;

        let mut items = Vec::with_capacity(records.len());
        for (key, record) in records {
            if let Some(id) = &record.id {
                if *id != key {
                    return Err(BingoError::CatalogUnavailable(format!(
                        "record keyed {key:?} carries id {id:?}"
                    )));
                }
            }
            items.push(Item {
                id: key,
                display_name: record.name,
                ordinal: record.ordinal,
                // The legacy export writes an empty string for "no parent".
                variant_of: record.variant_of.filter(|p| !p.is_empty()),
                premium: record.premium,
                has_variant: false,
                icon: record.icon,
            });
        }
        Self::from_items(items)
    }

    /// Build a catalog from items, computing `has_variant` and checking
    /// that ids are unique and variant links are consistent.
    pub fn from_items(mut items: Vec<Item>) -> Result<Self, BingoError> {
        if items.is_empty() {
            return Err(BingoError::CatalogUnavailable("catalog is empty".to_string()));
        }

        let mut per_ordinal: HashMap<u32, usize> = HashMap::new();
        for item in &items {
            *per_ordinal.entry(item.ordinal).or_default() += 1;
        }
        for item in &mut items {
            item.has_variant = per_ordinal[&item.ordinal] > 1;
        }

        items.sort_by(|a, b| {
            (a.ordinal, a.variant_of.is_some(), &a.id).cmp(&(b.ordinal, b.variant_of.is_some(), &b.id))
        });

        let mut index = HashMap::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            if index.insert(item.id.clone(), i).is_some() {
                return Err(BingoError::CatalogUnavailable(format!(
                    "duplicate item id {:?}",
                    item.id
                )));
            }
        }

        for item in &items {
            let Some(base_id) = &item.variant_of else {
                continue;
            };
            let base = index.get(base_id).map(|&i| &items[i]).ok_or_else(|| {
                BingoError::CatalogUnavailable(format!(
                    "{:?} is a variant of unknown item {base_id:?}",
                    item.id
                ))
            })?;
            if base.ordinal != item.ordinal {
                return Err(BingoError::CatalogUnavailable(format!(
                    "{:?} and its base {base_id:?} have different ordinals",
                    item.id
                )));
            }
        }

        Ok(Self {
            items: items.into_iter().map(Rc::new).collect(),
            index,
        })
    }

    pub fn get(&self, id: &str) -> Option<&Rc<Item>> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    /// Look up an item by id, failing with `UnknownItem`.
    pub fn resolve(&self, id: &str) -> Result<Rc<Item>, BingoError> {
        self.get(id)
            .cloned()
            .ok_or_else(|| BingoError::UnknownItem(id.to_string()))
    }

    /// Items in roster order (ordinal, base before variant, id).
    pub fn iter(&self) -> impl Iterator<Item = &Rc<Item>> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_roster_loads() {
        let catalog = Catalog::bundled().unwrap();
        assert_eq!(catalog.len(), 86);
        let daisy = catalog.get("daisy").unwrap();
        assert_eq!(daisy.ordinal, 13);
        assert_eq!(daisy.variant_of.as_deref(), Some("peach"));
        assert!(daisy.has_variant);
        assert!(catalog.get("peach").unwrap().has_variant);
        assert!(!catalog.get("mario").unwrap().has_variant);
        assert!(catalog.get("sora").unwrap().premium);
    }

    #[test]
    fn iteration_follows_roster_order() {
        let catalog = Catalog::bundled().unwrap();
        let ids: Vec<&str> = catalog.iter().take(5).map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["mario", "donkey_kong", "link", "samus", "dark_samus"]);
    }

    #[test]
    fn accepts_legacy_field_names() {
        let json = r#"{
            "peach": {"fighterId": "peach", "name": "Peach", "number": 13, "parent": null, "isDlc": false, "hasDashFighter": true},
            "daisy": {"fighterId": "daisy", "name": "Daisy", "number": 13, "parent": "peach", "isDlc": false},
            "joker": {"fighterId": "joker", "name": "Joker", "number": 71, "parent": "", "isDlc": true}
        }"#;
        let catalog = Catalog::from_json(json).unwrap();
        assert_eq!(catalog.len(), 3);
        assert!(catalog.get("joker").unwrap().premium);
        assert_eq!(catalog.get("joker").unwrap().variant_of, None);
        assert_eq!(catalog.get("daisy").unwrap().variant_of.as_deref(), Some("peach"));
    }

    #[test]
    fn rejects_mismatched_key() {
        let err = Catalog::from_json(r#"{"a": {"id": "b", "name": "B", "ordinal": 1}}"#).unwrap_err();
        assert_eq!(err.kind(), "catalog_unavailable");
    }

    #[test]
    fn rejects_dangling_variant() {
        let items = vec![Item::new("a", "A", 1).variant_of("ghost")];
        assert!(Catalog::from_items(items).is_err());
    }

    #[test]
    fn rejects_variant_with_other_ordinal() {
        let items = vec![Item::new("a", "A", 1), Item::new("b", "B", 2).variant_of("a")];
        assert!(Catalog::from_items(items).is_err());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let items = vec![Item::new("a", "A", 1), Item::new("a", "A again", 2)];
        assert!(Catalog::from_items(items).is_err());
    }

    #[test]
    fn empty_source_is_unavailable() {
        let err = Catalog::load(&JsonSource("  ")).unwrap_err();
        assert_eq!(err, BingoError::CatalogUnavailable("empty catalog document".to_string()));
    }

    #[test]
    fn resolve_unknown_id() {
        let catalog = Catalog::from_items(vec![Item::new("a", "A", 1)]).unwrap();
        assert_eq!(catalog.resolve("zz").unwrap_err(), BingoError::UnknownItem("zz".to_string()));
    }
}
