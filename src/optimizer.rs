//! Allocation optimizer.
//!
//! Turns a resolved production graph and a request into a concrete plan:
//! how many buildings run each recipe, at what clock speed, and with which
//! shard and module upgrades. The objective is lexicographic: fewest
//! buildings first, lowest total power among equal counts.
//!
//! The search is a deterministic greedy marginal-improvement loop, not a
//! general-purpose solver: per recipe it enumerates uniform
//! (shards-per-building, filled-slots-per-building) settings, then
//! repeatedly applies the setting change with the largest building-count
//! reduction per upgrade unit spent that still fits the global budgets.
//! Every accepted move lowers the total building count by at least one, so
//! the loop terminates after at most the initial count of iterations; an
//! interactive host wanting cancellation can check between iterations.
//! The result is feasible and locally optimal with respect to that
//! marginal-benefit ordering; global optimality is best-effort, not
//! guaranteed.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::PlanError;
use crate::models::{
    Building, BuildingInstance, Catalog, ModuleAllocation, Plan, Recipe, RecipeAssignment,
    Request,
};
use crate::power::{
    max_clock_for_shards, output_multiplier, power_usage, quantize_clock, quantize_clock_up,
    shards_for_clock,
};
use crate::resolver::ProductionGraph;

/// Flow amounts below this are treated as zero.
const FLOW_EPSILON: f64 = 1e-9;

/// Loop-carried demand smaller than this is considered converged.
const LOOP_CUTOFF: f64 = 1e-7;

/// Bound on demand-propagation passes over cyclic graphs.
const MAX_DEMAND_PASSES: usize = 64;

/// Bound on recipe-switch attempts when a raw cap is violated.
const MAX_SWITCHES: usize = 100;

/// Bound on producer top-up passes while reconciling quantized clocks.
const RECONCILE_PASSES: usize = 32;

/// Demand solution: how much of each recipe and each raw leaf the plan
/// needs, before any overclocking or modules are applied.
struct Demand {
    /// Recipe id -> building-equivalents at 100% clock, no modules
    beq: BTreeMap<String, f64>,
    /// Leaf item id -> units/minute drawn from outside the plan
    raw: BTreeMap<String, f64>,
}

/// Uniform upgrade setting for every building running one recipe.
#[derive(Debug, Clone, Copy)]
struct Setting {
    shards: u32,
    filled: u32,
    count: u64,
}

/// Computes a production plan for `request` over the resolved graph.
///
/// # Errors
///
/// - [`PlanError::InvalidRequest`] for a non-positive target rate, a target
///   unknown to the catalog, or a graph resolved for a different target.
/// - [`PlanError::InfeasibleBudget`] when a raw-leaf supply cap cannot be
///   met by any enabled recipe choice, or cyclic demand fails to converge.
///
/// # Determinism
///
/// Identical catalog and request always produce a plan with the same
/// building count and total power; recipe iteration orders are sorted, so
/// the returned settings are byte-for-byte identical too.
pub fn optimize(
    catalog: &Catalog,
    graph: &ProductionGraph,
    request: &Request,
) -> Result<Plan, PlanError> {
    validate(catalog, graph, request)?;

    let mut choices = choose_recipes(catalog, graph);
    let mut demand = solve_demand(catalog, &choices, &request.target_item, request.target_rate)?;

    // Re-pick producing recipes while a raw supply cap is exceeded. Each
    // accepted switch strictly reduces the total overage.
    let mut switches = 0;
    while total_overage(&demand.raw, &request.raw_caps) > LOOP_CUTOFF {
        if switches >= MAX_SWITCHES {
            return Err(infeasible_raw(&demand.raw, &request.raw_caps));
        }
        match best_switch(catalog, graph, request, &choices, &demand)? {
            Some((item, recipe)) => {
                choices.insert(item, recipe);
                demand =
                    solve_demand(catalog, &choices, &request.target_item, request.target_rate)?;
                switches += 1;
            }
            None => return Err(infeasible_raw(&demand.raw, &request.raw_caps)),
        }
    }

    let settings = allocate(catalog, request, &demand.beq);
    Ok(finalize(catalog, request, &demand.beq, &settings, &choices))
}

fn validate(
    catalog: &Catalog,
    graph: &ProductionGraph,
    request: &Request,
) -> Result<(), PlanError> {
    if !(request.target_rate > 0.0) || !request.target_rate.is_finite() {
        return Err(PlanError::InvalidRequest {
            reason: format!("target rate must be positive, got {}", request.target_rate),
        });
    }
    if catalog.item(&request.target_item).is_none() {
        return Err(PlanError::InvalidRequest {
            reason: format!("unknown target item '{}'", request.target_item),
        });
    }
    if graph.target != request.target_item {
        return Err(PlanError::InvalidRequest {
            reason: format!(
                "graph was resolved for '{}', request targets '{}'",
                graph.target, request.target_item
            ),
        });
    }
    Ok(())
}

/// Picks one producing recipe per item: the candidate with the highest
/// per-building output rate at 100% clock, default recipes winning ties
/// over alternates (candidates arrive pre-sorted that way).
fn choose_recipes(catalog: &Catalog, graph: &ProductionGraph) -> HashMap<String, String> {
    let mut choices = HashMap::new();
    for (item, candidates) in &graph.candidates {
        let mut best: Option<(&str, f64)> = None;
        for rid in candidates {
            let Some(recipe) = catalog.recipe(rid) else {
                continue;
            };
            let Some(rate) = recipe.output_per_minute(item) else {
                continue;
            };
            match best {
                Some((_, best_rate)) if rate <= best_rate + FLOW_EPSILON => {}
                _ => best = Some((rid.as_str(), rate)),
            }
        }
        if let Some((rid, _)) = best {
            choices.insert(item.clone(), rid.to_string());
        }
    }
    choices
}

/// Propagates demand from the target down the chosen recipes.
///
/// Demand that loops back onto an item already being expanded is deferred
/// and replayed in a later pass; amounts shrink geometrically whenever a
/// cycle consumes less than it produces, so the pass bound only triggers
/// for self-amplifying cycles that no finite plan satisfies.
fn solve_demand(
    catalog: &Catalog,
    choices: &HashMap<String, String>,
    target: &str,
    rate: f64,
) -> Result<Demand, PlanError> {
    let mut beq: BTreeMap<String, f64> = BTreeMap::new();
    let mut raw: BTreeMap<String, f64> = BTreeMap::new();
    let mut pending: Vec<(String, f64)> = vec![(target.to_string(), rate)];

    let mut passes = 0;
    while !pending.is_empty() {
        passes += 1;
        if passes > MAX_DEMAND_PASSES {
            return Err(PlanError::InfeasibleBudget {
                reason: "cyclic demand did not converge".to_string(),
            });
        }
        let batch = std::mem::take(&mut pending);
        let mut deferred: Vec<(String, f64)> = Vec::new();
        for (item, amount) in batch {
            let mut stack = HashSet::new();
            propagate(
                catalog,
                choices,
                &item,
                amount,
                &mut stack,
                &mut beq,
                &mut raw,
                &mut deferred,
            );
        }
        pending = deferred
            .into_iter()
            .filter(|(_, amount)| *amount > LOOP_CUTOFF)
            .collect();
    }

    Ok(Demand { beq, raw })
}

#[allow(clippy::too_many_arguments)]
fn propagate(
    catalog: &Catalog,
    choices: &HashMap<String, String>,
    item: &str,
    rate: f64,
    stack: &mut HashSet<String>,
    beq: &mut BTreeMap<String, f64>,
    raw: &mut BTreeMap<String, f64>,
    deferred: &mut Vec<(String, f64)>,
) {
    if rate <= FLOW_EPSILON {
        return;
    }
    let Some(rid) = choices.get(item) else {
        *raw.entry(item.to_string()).or_insert(0.0) += rate;
        return;
    };
    if stack.contains(item) {
        deferred.push((item.to_string(), rate));
        return;
    }
    let Some(recipe) = catalog.recipe(rid) else {
        return;
    };
    let Some(out_rate) = recipe.output_per_minute(item) else {
        return;
    };

    let buildings = rate / out_rate;
    *beq.entry(rid.clone()).or_insert(0.0) += buildings;

    stack.insert(item.to_string());
    for input in &recipe.inputs {
        let need = buildings * input.amount * 60.0 / recipe.duration_secs;
        propagate(catalog, choices, &input.item, need, stack, beq, raw, deferred);
    }
    stack.remove(item);
}

fn total_overage(raw: &BTreeMap<String, f64>, caps: &HashMap<String, f64>) -> f64 {
    caps.iter()
        .map(|(item, cap)| (raw.get(item).copied().unwrap_or(0.0) - cap).max(0.0))
        .sum()
}

fn infeasible_raw(raw: &BTreeMap<String, f64>, caps: &HashMap<String, f64>) -> PlanError {
    let worst = caps
        .iter()
        .map(|(item, cap)| (item, raw.get(item).copied().unwrap_or(0.0) - cap))
        .filter(|(_, over)| *over > LOOP_CUTOFF)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    match worst {
        Some((item, over)) => PlanError::InfeasibleBudget {
            reason: format!(
                "raw supply of '{}' is short by {:.4}/min at its cap",
                item, over
            ),
        },
        None => PlanError::InfeasibleBudget {
            reason: "raw supply caps cannot be met".to_string(),
        },
    }
}

/// Finds the single recipe switch that best reduces the capped-raw
/// overage, or `None` if no switch helps.
fn best_switch(
    catalog: &Catalog,
    graph: &ProductionGraph,
    request: &Request,
    choices: &HashMap<String, String>,
    demand: &Demand,
) -> Result<Option<(String, String)>, PlanError> {
    let current = total_overage(&demand.raw, &request.raw_caps);
    let mut best: Option<(String, String, f64)> = None;

    let mut items: Vec<&String> = graph
        .candidates
        .iter()
        .filter(|(_, cands)| cands.len() > 1)
        .map(|(item, _)| item)
        .collect();
    items.sort();

    for item in items {
        let Some(chosen) = choices.get(item) else {
            continue;
        };
        for candidate in &graph.candidates[item] {
            if candidate == chosen {
                continue;
            }
            let mut trial = choices.clone();
            trial.insert(item.clone(), candidate.clone());
            let Ok(trial_demand) =
                solve_demand(catalog, &trial, &request.target_item, request.target_rate)
            else {
                continue;
            };
            let overage = total_overage(&trial_demand.raw, &request.raw_caps);
            if overage < current - FLOW_EPSILON
                && best.as_ref().map_or(true, |(_, _, b)| overage < *b - FLOW_EPSILON)
            {
                best = Some((item.clone(), candidate.clone(), overage));
            }
        }
    }

    Ok(best.map(|(item, recipe, _)| (item, recipe)))
}

/// Buildings needed to supply `required` building-equivalents when each
/// building contributes `factor`.
fn ceil_count(required: f64, factor: f64) -> u64 {
    ((required / factor) - FLOW_EPSILON).ceil().max(1.0) as u64
}

fn base_power(request: &Request, building: &Building) -> f64 {
    request
        .base_power_overrides
        .get(&building.id)
        .copied()
        .unwrap_or(building.base_power_mw)
}

/// Power of one recipe's finalized assignment under a given setting:
/// `count - 1` buildings at the setting's clock cap plus one underclocked
/// to land exactly on the required throughput.
fn setting_power(
    catalog: &Catalog,
    request: &Request,
    recipe: &Recipe,
    required: f64,
    shards: u32,
    filled: u32,
    count: u64,
) -> f64 {
    let constants = catalog.constants();
    let Some(building) = catalog.building(&recipe.building) else {
        return 0.0;
    };
    let base = base_power(request, building);
    let slots = building.module_slots;

    let cap = quantize_clock(max_clock_for_shards(shards));
    let multiplier = output_multiplier(filled, slots, constants);
    let per_building = cap * multiplier;

    let full = count.saturating_sub(1);
    let remainder = (required - full as f64 * per_building).max(0.0);
    let last_clock = quantize_clock_up((remainder / multiplier).min(cap));

    full as f64 * power_usage(base, cap, filled, slots, constants)
        + power_usage(base, last_clock, filled, slots, constants)
}

/// Greedy marginal allocation of shards and modules across recipes.
///
/// Starts everything at 100% clock with empty slots, then repeatedly takes
/// the move (one recipe changing to one uniform setting) with the largest
/// count reduction per upgrade unit newly spent. Stops when no affordable
/// move reduces the count; a final sweep then looks for an equal-count
/// setting with lower power.
fn allocate(
    catalog: &Catalog,
    request: &Request,
    beq: &BTreeMap<String, f64>,
) -> BTreeMap<String, Setting> {
    let constants = catalog.constants();
    let mut settings: BTreeMap<String, Setting> = BTreeMap::new();
    for (rid, required) in beq {
        if *required > FLOW_EPSILON {
            settings.insert(
                rid.clone(),
                Setting {
                    shards: 0,
                    filled: 0,
                    count: ceil_count(*required, 1.0),
                },
            );
        }
    }

    let shard_budget = request.shard_budget as u64;
    let module_budget = request.module_budget as u64;

    loop {
        let shards_used: u64 = settings.values().map(|s| s.shards as u64 * s.count).sum();
        let modules_used: u64 = settings.values().map(|s| s.filled as u64 * s.count).sum();

        // (rid, shards, filled, count, score, power)
        let mut best: Option<(String, u32, u32, u64, f64, f64)> = None;

        for (rid, state) in &settings {
            let Some(recipe) = catalog.recipe(rid) else {
                continue;
            };
            let Some(building) = catalog.building(&recipe.building) else {
                continue;
            };
            let required = beq[rid];
            let committed_shards = state.shards as u64 * state.count;
            let committed_modules = state.filled as u64 * state.count;

            for shards in 0..=constants.max_shards_per_building {
                for filled in 0..=building.module_slots {
                    let factor = max_clock_for_shards(shards)
                        * output_multiplier(filled, building.module_slots, constants);
                    let count = ceil_count(required, factor);
                    if count >= state.count {
                        continue;
                    }
                    let new_shards = shards_used - committed_shards + shards as u64 * count;
                    let new_modules = modules_used - committed_modules + filled as u64 * count;
                    if new_shards > shard_budget || new_modules > module_budget {
                        continue;
                    }
                    let spent = (shards as u64 * count).saturating_sub(committed_shards)
                        + (filled as u64 * count).saturating_sub(committed_modules);
                    let reduction = (state.count - count) as f64;
                    let score = reduction / spent.max(1) as f64;
                    let power =
                        setting_power(catalog, request, recipe, required, shards, filled, count);

                    let take = match &best {
                        None => true,
                        Some((_, _, _, _, best_score, best_power)) => {
                            score > best_score + FLOW_EPSILON
                                || ((score - best_score).abs() <= FLOW_EPSILON
                                    && *best_power - power > FLOW_EPSILON)
                        }
                    };
                    if take {
                        best = Some((rid.clone(), shards, filled, count, score, power));
                    }
                }
            }
        }

        match best {
            Some((rid, shards, filled, count, _, _)) => {
                settings.insert(
                    rid,
                    Setting {
                        shards,
                        filled,
                        count,
                    },
                );
            }
            None => break,
        }
    }

    // Power sweep at fixed counts: a cheaper equal-count setting may exist
    // (e.g. shards freed by the last accepted move).
    let rids: Vec<String> = settings.keys().cloned().collect();
    for rid in rids {
        let shards_used: u64 = settings.values().map(|s| s.shards as u64 * s.count).sum();
        let modules_used: u64 = settings.values().map(|s| s.filled as u64 * s.count).sum();
        let state = settings[&rid];
        let Some(recipe) = catalog.recipe(&rid) else {
            continue;
        };
        let Some(building) = catalog.building(&recipe.building) else {
            continue;
        };
        let required = beq[&rid];
        let committed_shards = state.shards as u64 * state.count;
        let committed_modules = state.filled as u64 * state.count;
        let mut best = state;
        let mut best_power = setting_power(
            catalog, request, recipe, required, state.shards, state.filled, state.count,
        );

        for shards in 0..=constants.max_shards_per_building {
            for filled in 0..=building.module_slots {
                let factor = max_clock_for_shards(shards)
                    * output_multiplier(filled, building.module_slots, constants);
                if ceil_count(required, factor) != state.count {
                    continue;
                }
                let new_shards = shards_used - committed_shards + shards as u64 * state.count;
                let new_modules = modules_used - committed_modules + filled as u64 * state.count;
                if new_shards > shard_budget || new_modules > module_budget {
                    continue;
                }
                let power = setting_power(
                    catalog, request, recipe, required, shards, filled, state.count,
                );
                if best_power - power > FLOW_EPSILON {
                    best = Setting {
                        shards,
                        filled,
                        count: state.count,
                    };
                    best_power = power;
                }
            }
        }
        settings.insert(rid, best);
    }

    settings
}

/// Instances and flow totals assembled for one requirement table.
struct Assembled {
    assignments: Vec<RecipeAssignment>,
    produced: BTreeMap<String, f64>,
    consumed: BTreeMap<String, f64>,
    total_power_mw: f64,
    shards_used: u64,
    modules_used: u64,
}

fn assemble(
    catalog: &Catalog,
    request: &Request,
    settings: &BTreeMap<String, Setting>,
    required: &BTreeMap<String, f64>,
) -> Assembled {
    let constants = catalog.constants();
    let mut assignments: Vec<RecipeAssignment> = Vec::new();
    let mut total_power = 0.0;
    let mut shards_used: u64 = 0;
    let mut modules_used: u64 = 0;
    let mut produced: BTreeMap<String, f64> = BTreeMap::new();
    let mut consumed: BTreeMap<String, f64> = BTreeMap::new();

    for (rid, setting) in settings {
        let Some(recipe) = catalog.recipe(rid) else {
            continue;
        };
        let Some(building) = catalog.building(&recipe.building) else {
            continue;
        };
        let need = required[rid];
        let base = base_power(request, building);
        let slots = building.module_slots;
        let modules = ModuleAllocation {
            filled: setting.filled,
            total: slots,
        };

        let cap = quantize_clock(max_clock_for_shards(setting.shards));
        let multiplier = output_multiplier(setting.filled, slots, constants);
        let per_building = cap * multiplier;

        // A topped-up requirement may need one building beyond the
        // allocation, at the same per-building setting.
        let count = setting.count.max(ceil_count(need, per_building));
        let mut instances = Vec::with_capacity(count as usize);
        let full = count.saturating_sub(1);
        for _ in 0..full {
            instances.push(BuildingInstance {
                clock: cap,
                shards: setting.shards,
                modules,
                production: per_building,
                power_mw: power_usage(base, cap, setting.filled, slots, constants),
            });
        }

        // Underclock the last building so the recipe lands exactly on its
        // required throughput (quantized upward, never undershooting).
        let remainder = (need - full as f64 * per_building).max(0.0);
        let last_clock = quantize_clock_up((remainder / multiplier).min(cap));
        instances.push(BuildingInstance {
            clock: last_clock,
            shards: shards_for_clock(last_clock),
            modules,
            production: last_clock * multiplier,
            power_mw: power_usage(base, last_clock, setting.filled, slots, constants),
        });

        for instance in &instances {
            total_power += instance.power_mw;
            shards_used += instance.shards as u64;
            modules_used += instance.modules.filled as u64;
        }

        let throughput: f64 = instances.iter().map(|b| b.production).sum();
        for out in &recipe.outputs {
            *produced.entry(out.item.clone()).or_insert(0.0) +=
                throughput * out.amount * 60.0 / recipe.duration_secs;
        }
        for input in &recipe.inputs {
            *consumed.entry(input.item.clone()).or_insert(0.0) +=
                throughput * input.amount * 60.0 / recipe.duration_secs;
        }

        assignments.push(RecipeAssignment {
            recipe: rid.clone(),
            building: building.id.clone(),
            instances,
        });
    }

    Assembled {
        assignments,
        produced,
        consumed,
        total_power_mw: total_power,
        shards_used,
        modules_used,
    }
}

/// Builds the final plan: concrete instances per recipe, flow balance, and
/// resource totals.
///
/// Demand sized every producer from un-quantized rates, but a consumer's
/// trim clock is quantized upward, so its actual draw can exceed what its
/// producer was sized for by a sub-quantization sliver. Those deficits are
/// fed back into the producers' requirements and the instances reassembled
/// until every item with a chosen producer is fully covered; only resolver
/// leaves may remain externally supplied.
fn finalize(
    catalog: &Catalog,
    request: &Request,
    beq: &BTreeMap<String, f64>,
    settings: &BTreeMap<String, Setting>,
    choices: &HashMap<String, String>,
) -> Plan {
    let mut required: BTreeMap<String, f64> = settings
        .keys()
        .map(|rid| (rid.clone(), beq[rid]))
        .collect();

    let producers: Vec<(&String, &String)> = choices
        .iter()
        .filter(|(item, rid)| {
            **item != request.target_item && settings.contains_key(*rid)
        })
        .collect();

    let mut assembled = assemble(catalog, request, settings, &required);
    for _ in 0..RECONCILE_PASSES {
        let mut topped_up = false;
        for (item, rid) in &producers {
            let net = assembled.produced.get(*item).copied().unwrap_or(0.0)
                - assembled.consumed.get(*item).copied().unwrap_or(0.0);
            if net >= -FLOW_EPSILON {
                continue;
            }
            let Some(out_rate) = catalog
                .recipe(rid.as_str())
                .and_then(|r| r.output_per_minute(item.as_str()))
            else {
                continue;
            };
            if let Some(need) = required.get_mut(rid.as_str()) {
                *need += -net / out_rate;
                topped_up = true;
            }
        }
        if !topped_up {
            break;
        }
        assembled = assemble(catalog, request, settings, &required);
    }

    let mut raw_inputs: BTreeMap<String, f64> = BTreeMap::new();
    let mut byproducts: BTreeMap<String, f64> = BTreeMap::new();
    let mut achieved_rate = 0.0;

    let mut flow_items: HashSet<&String> = assembled.produced.keys().collect();
    flow_items.extend(assembled.consumed.keys());
    for item in flow_items {
        let net = assembled.produced.get(item).copied().unwrap_or(0.0)
            - assembled.consumed.get(item).copied().unwrap_or(0.0);
        if *item == request.target_item {
            achieved_rate = net;
        } else if net < -FLOW_EPSILON {
            raw_inputs.insert(item.clone(), -net);
        } else if net > FLOW_EPSILON {
            byproducts.insert(item.clone(), net);
        }
    }

    // An extractable target with no producing recipe is supplied entirely
    // from outside the plan.
    if settings.is_empty() {
        achieved_rate = request.target_rate;
        raw_inputs.insert(request.target_item.clone(), request.target_rate);
    }

    Plan {
        target_item: request.target_item.clone(),
        requested_rate: request.target_rate,
        achieved_rate,
        assignments: assembled.assignments,
        total_power_mw: assembled.total_power_mw,
        shards_used: assembled.shards_used as u32,
        modules_used: assembled.modules_used as u32,
        raw_inputs,
        byproducts,
    }
}
