//! Catalog loading.
//!
//! This module reads the JSON catalog files from a data directory
//! (`items.json`, `recipes.json`, `buildings.json`, and an optional
//! `constants.json`) and assembles a validated [`Catalog`]. Every
//! cross-reference problem (unknown item, unknown building, empty outputs)
//! is reported here; the resolver and optimizer never see a malformed
//! catalog.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::CatalogError;
use crate::models::{Building, Catalog, Item, PowerConstants, Recipe, RecipeRate};

/// JSON shape of one entry in `items.json`.
#[derive(Debug, Deserialize)]
pub struct ItemRow {
    /// Display name
    pub name: String,
    /// Whether the item is a raw, extractable resource
    #[serde(default)]
    pub extractable: bool,
}

/// JSON shape of a recipe input or output.
#[derive(Debug, Deserialize)]
pub struct RateRow {
    /// Item identifier
    pub item: String,
    /// Amount per cycle
    pub amount: f64,
}

/// JSON shape of one entry in `recipes.json`.
#[derive(Debug, Deserialize)]
pub struct RecipeRow {
    /// Display name
    pub name: String,
    /// Alternate recipes are opt-in
    #[serde(default)]
    pub alternate: bool,
    /// Cycle duration in seconds
    pub duration: f64,
    /// Items consumed per cycle
    #[serde(default)]
    pub inputs: Vec<RateRow>,
    /// Items produced per cycle
    pub outputs: Vec<RateRow>,
    /// Building the recipe runs in
    pub building: String,
}

/// JSON shape of one entry in `buildings.json`.
#[derive(Debug, Deserialize)]
pub struct BuildingRow {
    /// Display name
    pub name: String,
    /// Power draw in MW at 100% clock, no modules
    #[serde(default)]
    pub base_power: f64,
    /// Boost-module slot count
    #[serde(default)]
    pub module_slots: u32,
}

/// Combined catalog document, used by callers that hand over one JSON blob
/// instead of a directory (the wasm boundary does this).
#[derive(Debug, Deserialize)]
pub struct CatalogDocument {
    /// Items keyed by identifier
    pub items: HashMap<String, ItemRow>,
    /// Recipes keyed by identifier
    pub recipes: HashMap<String, RecipeRow>,
    /// Buildings keyed by identifier
    pub buildings: HashMap<String, BuildingRow>,
    /// Power/output model constants; game defaults when absent
    #[serde(default)]
    pub constants: Option<PowerConstants>,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CatalogError> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|source| CatalogError::Json {
        file: path.to_path_buf(),
        source,
    })
}

/// Assembles a validated catalog from parsed rows.
pub fn build_catalog(document: CatalogDocument) -> Result<Catalog, CatalogError> {
    let items = document
        .items
        .into_iter()
        .map(|(id, row)| Item {
            id,
            name: row.name,
            extractable: row.extractable,
        })
        .collect();

    let recipes = document
        .recipes
        .into_iter()
        .map(|(id, row)| Recipe {
            id,
            name: row.name,
            alternate: row.alternate,
            duration_secs: row.duration,
            inputs: row
                .inputs
                .into_iter()
                .map(|r| RecipeRate {
                    item: r.item,
                    amount: r.amount,
                })
                .collect(),
            outputs: row
                .outputs
                .into_iter()
                .map(|r| RecipeRate {
                    item: r.item,
                    amount: r.amount,
                })
                .collect(),
            building: row.building,
        })
        .collect();

    let buildings = document
        .buildings
        .into_iter()
        .map(|(id, row)| Building {
            id,
            name: row.name,
            base_power_mw: row.base_power,
            module_slots: row.module_slots,
        })
        .collect();

    Catalog::new(
        items,
        recipes,
        buildings,
        document.constants.unwrap_or_default(),
    )
}

/// Parses a combined catalog JSON document and validates it.
pub fn parse_catalog(json: &str) -> Result<Catalog, CatalogError> {
    let document: CatalogDocument =
        serde_json::from_str(json).map_err(|source| CatalogError::Json {
            file: "<inline>".into(),
            source,
        })?;
    build_catalog(document)
}

/// Loads the catalog from a data directory.
///
/// Expects `items.json`, `recipes.json`, and `buildings.json`; reads
/// `constants.json` when present, falling back to the game defaults.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use fluxplan::data::load_catalog;
///
/// let catalog = load_catalog(Path::new("data")).unwrap();
/// println!("{} recipes loaded", catalog.recipes().count());
/// ```
pub fn load_catalog(data_dir: &Path) -> Result<Catalog, CatalogError> {
    let items: HashMap<String, ItemRow> = read_json(&data_dir.join("items.json"))?;
    let recipes: HashMap<String, RecipeRow> = read_json(&data_dir.join("recipes.json"))?;
    let buildings: HashMap<String, BuildingRow> = read_json(&data_dir.join("buildings.json"))?;

    let constants_path = data_dir.join("constants.json");
    let constants: Option<PowerConstants> = if constants_path.exists() {
        Some(read_json(&constants_path)?)
    } else {
        None
    };

    build_catalog(CatalogDocument {
        items,
        recipes,
        buildings,
        constants,
    })
}
