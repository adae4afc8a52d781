//! Data models for fluxplan.
//!
//! This module contains the catalog types (items, recipes, buildings), the
//! optimization request, and the plan the optimizer returns. The catalog is
//! loaded once and never mutated; requests and plans are per-call values, so
//! independent optimization runs can proceed in parallel without locking.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// A game item: a raw resource or a crafted product.
///
/// # Example
///
/// ```
/// use fluxplan::models::Item;
///
/// let ore = Item {
///     id: "iron-ore".to_string(),
///     name: "Iron Ore".to_string(),
///     extractable: true,
/// };
/// assert!(ore.extractable);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Catalog identifier (e.g., "iron-ore")
    pub id: String,
    /// Display name (e.g., "Iron Ore")
    pub name: String,
    /// Whether the item can be extracted from the world without a recipe
    pub extractable: bool,
}

/// One side of a recipe: an item and its per-cycle amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeRate {
    /// Item identifier
    pub item: String,
    /// Amount consumed or produced per cycle
    pub amount: f64,
}

/// A production recipe bound to one building type.
///
/// Amounts are per cycle; [`Recipe::output_per_minute`] and
/// [`Recipe::input_per_minute`] normalize them to per-minute throughput for
/// a single building at 100% clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    /// Catalog identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Alternate recipes are disabled unless the request enables them
    pub alternate: bool,
    /// Cycle duration in seconds
    pub duration_secs: f64,
    /// Items consumed per cycle
    pub inputs: Vec<RecipeRate>,
    /// Items produced per cycle (at least one)
    pub outputs: Vec<RecipeRate>,
    /// Building the recipe runs in
    pub building: String,
}

impl Recipe {
    /// Per-minute output of `item` for one building at 100% clock, or
    /// `None` if the recipe does not produce it.
    pub fn output_per_minute(&self, item: &str) -> Option<f64> {
        self.outputs
            .iter()
            .find(|r| r.item == item)
            .map(|r| r.amount * 60.0 / self.duration_secs)
    }

    /// Per-minute input of `item` for one building at 100% clock, or
    /// `None` if the recipe does not consume it.
    pub fn input_per_minute(&self, item: &str) -> Option<f64> {
        self.inputs
            .iter()
            .find(|r| r.item == item)
            .map(|r| r.amount * 60.0 / self.duration_secs)
    }

    /// Whether the recipe produces `item`.
    pub fn produces(&self, item: &str) -> bool {
        self.outputs.iter().any(|r| r.item == item)
    }
}

/// A production building type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Building {
    /// Catalog identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Power draw in MW at 100% clock with no modules (0 for extractors
    /// and generators)
    pub base_power_mw: f64,
    /// Number of boost-module slots
    pub module_slots: u32,
}

/// Game-defined constants for the power/output model.
///
/// The exact module boost curves are game data, not part of this crate's
/// contract, so they are carried on the catalog rather than hard-coded.
/// The defaults follow the commonly measured values: power scales with
/// `clock^log2(2.5)` and a fully slotted building squares its output and
/// power.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerConstants {
    /// Exponent applied to the clock fraction in the power formula
    pub overclock_exponent: f64,
    /// Exponent of the `(1 + filled/total)` module output curve
    pub module_output_exponent: f64,
    /// Exponent of the `(1 + filled/total)` module power curve
    pub module_power_exponent: f64,
    /// Most shards a single building can hold (3 shards reach the 250% cap)
    pub max_shards_per_building: u32,
}

impl Default for PowerConstants {
    fn default() -> Self {
        PowerConstants {
            // log2(2.5): doubling the clock multiplies power by 2.5
            overclock_exponent: 1.321_928_094_887_362,
            module_output_exponent: 2.0,
            module_power_exponent: 2.0,
            max_shards_per_building: 3,
        }
    }
}

/// Immutable catalog of items, recipes, and buildings.
///
/// Constructed once per run via [`Catalog::new`], which performs every
/// cross-reference check so later stages never see a dangling identifier.
#[derive(Debug, Clone)]
pub struct Catalog {
    items: HashMap<String, Item>,
    recipes: HashMap<String, Recipe>,
    buildings: HashMap<String, Building>,
    constants: PowerConstants,
}

impl Catalog {
    /// Builds a validated catalog.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] when a recipe references an unknown item
    /// or building, has no outputs, has a non-positive duration or amount,
    /// or a building has negative base power.
    pub fn new(
        items: Vec<Item>,
        recipes: Vec<Recipe>,
        buildings: Vec<Building>,
        constants: PowerConstants,
    ) -> Result<Self, CatalogError> {
        let items: HashMap<String, Item> =
            items.into_iter().map(|i| (i.id.clone(), i)).collect();
        let buildings: HashMap<String, Building> =
            buildings.into_iter().map(|b| (b.id.clone(), b)).collect();

        for building in buildings.values() {
            if building.base_power_mw < 0.0 {
                return Err(CatalogError::NegativeBasePower {
                    building: building.id.clone(),
                });
            }
        }

        for recipe in &recipes {
            if recipe.outputs.is_empty() {
                return Err(CatalogError::NoOutputs {
                    recipe: recipe.id.clone(),
                });
            }
            if recipe.duration_secs <= 0.0 {
                return Err(CatalogError::NonPositiveDuration {
                    recipe: recipe.id.clone(),
                });
            }
            if !buildings.contains_key(&recipe.building) {
                return Err(CatalogError::UnknownBuilding {
                    recipe: recipe.id.clone(),
                    building: recipe.building.clone(),
                });
            }
            for rate in recipe.inputs.iter().chain(recipe.outputs.iter()) {
                if !items.contains_key(&rate.item) {
                    return Err(CatalogError::UnknownItem {
                        recipe: recipe.id.clone(),
                        item: rate.item.clone(),
                    });
                }
                if rate.amount <= 0.0 {
                    return Err(CatalogError::NonPositiveAmount {
                        recipe: recipe.id.clone(),
                        item: rate.item.clone(),
                    });
                }
            }
        }

        let recipes: HashMap<String, Recipe> =
            recipes.into_iter().map(|r| (r.id.clone(), r)).collect();

        Ok(Catalog {
            items,
            recipes,
            buildings,
            constants,
        })
    }

    /// Looks up an item by identifier.
    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    /// Looks up a recipe by identifier.
    pub fn recipe(&self, id: &str) -> Option<&Recipe> {
        self.recipes.get(id)
    }

    /// Looks up a building by identifier.
    pub fn building(&self, id: &str) -> Option<&Building> {
        self.buildings.get(id)
    }

    /// All recipes, in unspecified order.
    pub fn recipes(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.values()
    }

    /// All items, in unspecified order.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    /// Power/output model constants.
    pub fn constants(&self) -> &PowerConstants {
        &self.constants
    }

    /// Identifiers of every non-alternate recipe: the enabled set a request
    /// starts from before toggling alternates on.
    pub fn default_enabled_recipes(&self) -> HashSet<String> {
        self.recipes
            .values()
            .filter(|r| !r.alternate)
            .map(|r| r.id.clone())
            .collect()
    }
}

/// Module slots on a single building instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleAllocation {
    /// Slots filled with boost modules
    pub filled: u32,
    /// Slots the building has
    pub total: u32,
}

/// One concrete building in a plan: its clock setting, shard count, and
/// module fill, plus the throughput it contributes as a multiple of the
/// recipe's base (100%, unmodified) rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingInstance {
    /// Clock fraction in `[0, 2.5]`, quantized to 1/10000
    pub clock: f64,
    /// Power shards installed (the clock is capped at `1 + 0.5 * shards`)
    pub shards: u32,
    /// Module slot fill
    pub modules: ModuleAllocation,
    /// Throughput multiple of the base recipe rate
    pub production: f64,
    /// Power draw in MW, with any base power override applied
    pub power_mw: f64,
}

/// All building instances running one recipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeAssignment {
    /// Recipe identifier
    pub recipe: String,
    /// Building identifier the recipe runs in
    pub building: String,
    /// Instances, full-clock first, any underclocked remainder last
    pub instances: Vec<BuildingInstance>,
}

impl RecipeAssignment {
    /// Number of buildings in this assignment.
    pub fn count(&self) -> usize {
        self.instances.len()
    }

    /// Summed throughput multiple across all instances.
    pub fn throughput(&self) -> f64 {
        self.instances.iter().map(|b| b.production).sum()
    }
}

/// The optimizer's output: a complete, feasible production plan.
///
/// A plan is a value object. Nothing in this crate mutates it after the
/// optimizer returns; renderers and persistence layers must treat it as
/// read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Target item identifier
    pub target_item: String,
    /// Rate the request asked for, units/minute
    pub requested_rate: f64,
    /// Net rate the plan produces for the target (>= requested)
    pub achieved_rate: f64,
    /// Per-recipe building assignments, sorted by recipe identifier
    pub assignments: Vec<RecipeAssignment>,
    /// Total power draw across all instances, MW
    pub total_power_mw: f64,
    /// Power shards consumed
    pub shards_used: u32,
    /// Boost modules consumed
    pub modules_used: u32,
    /// Raw/extracted item inputs the plan draws from outside, units/minute
    pub raw_inputs: BTreeMap<String, f64>,
    /// Surplus outputs beyond internal consumption, units/minute
    pub byproducts: BTreeMap<String, f64>,
}

impl Plan {
    /// Total building count across the whole plan (the primary objective).
    pub fn building_count(&self) -> usize {
        self.assignments.iter().map(|a| a.count()).sum()
    }
}

/// A single optimization request.
///
/// Immutable input to one run; concurrent runs may share a catalog but
/// never a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Item to produce
    pub target_item: String,
    /// Required rate, units/minute (must be positive)
    pub target_rate: f64,
    /// Global power shard budget
    pub shard_budget: u32,
    /// Global boost module budget
    pub module_budget: u32,
    /// Recipes the planner may use (alternates are opt-in)
    pub enabled_recipes: HashSet<String>,
    /// Per-building base power overrides, MW
    pub base_power_overrides: HashMap<String, f64>,
    /// Optional supply caps for raw leaves, units/minute; absent = uncapped
    pub raw_caps: HashMap<String, f64>,
}

impl Request {
    /// A request with the given target and every default (non-alternate)
    /// recipe enabled, zero budgets, and no overrides or caps.
    pub fn new(catalog: &Catalog, target_item: &str, target_rate: f64) -> Self {
        Request {
            target_item: target_item.to_string(),
            target_rate,
            shard_budget: 0,
            module_budget: 0,
            enabled_recipes: catalog.default_enabled_recipes(),
            base_power_overrides: HashMap::new(),
            raw_caps: HashMap::new(),
        }
    }
}
