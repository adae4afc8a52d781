//! Recipe graph resolution.
//!
//! Given a target item and the set of enabled recipes, builds the
//! dependency structure linking the target to everything it transitively
//! needs. Each item is annotated with *all* enabled recipes that produce
//! it; the production-mix decision belongs to the optimizer, which may
//! trade candidates against each other when a supply constraint bites.
//!
//! Resolution is a closure over the set of reachable items, not an
//! unrolled tree, so recipe cycles (by-products feeding back into their
//! own chain) converge instead of recursing forever.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::ResolveError;
use crate::models::Catalog;

/// The resolved dependency structure for one target item.
#[derive(Debug, Clone)]
pub struct ProductionGraph {
    /// The item the graph was resolved for
    pub target: String,
    /// Enabled producing recipes per reachable item, sorted
    /// default-before-alternate then by identifier. Items that map to an
    /// empty list are leaves.
    pub candidates: HashMap<String, Vec<String>>,
    /// Every recipe reachable from the target
    pub recipes: HashSet<String>,
    /// Items with no enabled producer: raw/extracted inputs supplied from
    /// outside the plan
    pub leaves: HashSet<String>,
}

impl ProductionGraph {
    /// Whether `item` is supplied from outside the plan.
    pub fn is_leaf(&self, item: &str) -> bool {
        self.leaves.contains(item)
    }
}

/// Resolves the production graph for `target` over the enabled recipes.
///
/// Items with no enabled producing recipe become leaves with assumed
/// unlimited supply (the request may cap them later). The target itself is
/// special: if nothing produces it and it is not an extractable resource,
/// resolution fails with [`ResolveError::UnreachableItem`].
pub fn resolve(
    catalog: &Catalog,
    target: &str,
    enabled: &HashSet<String>,
) -> Result<ProductionGraph, ResolveError> {
    let mut by_output: HashMap<&str, Vec<&str>> = HashMap::new();
    for recipe in catalog.recipes() {
        if !enabled.contains(&recipe.id) {
            continue;
        }
        for out in &recipe.outputs {
            by_output.entry(&out.item).or_default().push(&recipe.id);
        }
    }
    for producers in by_output.values_mut() {
        producers.sort_by_key(|id| {
            let alternate = catalog.recipe(id).map(|r| r.alternate).unwrap_or(false);
            (alternate, id.to_string())
        });
    }

    let target_producers = by_output.get(target).map(|v| v.len()).unwrap_or(0);
    let target_extractable = catalog.item(target).map(|i| i.extractable).unwrap_or(false);
    if target_producers == 0 && !target_extractable {
        return Err(ResolveError::UnreachableItem {
            item: target.to_string(),
        });
    }

    let mut candidates: HashMap<String, Vec<String>> = HashMap::new();
    let mut recipes: HashSet<String> = HashSet::new();
    let mut leaves: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    queue.push_back(target.to_string());

    while let Some(item) = queue.pop_front() {
        if candidates.contains_key(&item) {
            continue;
        }
        let producers: Vec<String> = by_output
            .get(item.as_str())
            .map(|v| v.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default();

        if producers.is_empty() {
            leaves.insert(item.clone());
        } else {
            for rid in &producers {
                if recipes.insert(rid.clone()) {
                    if let Some(recipe) = catalog.recipe(rid) {
                        for input in &recipe.inputs {
                            queue.push_back(input.item.clone());
                        }
                    }
                }
            }
        }
        candidates.insert(item, producers);
    }

    Ok(ProductionGraph {
        target: target.to_string(),
        candidates,
        recipes,
        leaves,
    })
}
