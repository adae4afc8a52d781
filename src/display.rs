//! Plan summarization and console rendering.
//!
//! [`summarize`] is a pure transformation from a [`Plan`] to a stable,
//! renderer-friendly shape; [`display_plan`] prints it. No planning logic
//! lives here: external front-ends (GUI, node-graph renderers) are
//! expected to consume [`PlanSummary`] the same way the console does.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{Catalog, Plan};

/// One recipe's row in a plan summary.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeSummary {
    /// Recipe identifier
    pub recipe: String,
    /// Recipe display name (identifier if the catalog lacks it)
    pub recipe_name: String,
    /// Building display name
    pub building_name: String,
    /// Number of building instances
    pub count: usize,
    /// Clock fraction of the full-speed instances
    pub clock: f64,
    /// Clock fraction of the final, underclocked instance
    pub trim_clock: f64,
    /// Shards installed across the row's instances
    pub shards: u32,
    /// Modules installed across the row's instances
    pub modules: u32,
    /// Power draw of the row, MW
    pub power_mw: f64,
}

/// Read-only summary of a plan, ready for any renderer.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    /// Target item identifier
    pub target_item: String,
    /// Requested rate, units/minute
    pub requested_rate: f64,
    /// Achieved net rate, units/minute
    pub achieved_rate: f64,
    /// Total buildings in the plan
    pub building_count: usize,
    /// Per-recipe rows, sorted by recipe identifier
    pub recipes: Vec<RecipeSummary>,
    /// Raw items drawn from outside, units/minute
    pub sources: BTreeMap<String, f64>,
    /// Surplus outputs, units/minute
    pub byproducts: BTreeMap<String, f64>,
    /// Total power draw, MW
    pub total_power_mw: f64,
    /// Shards consumed
    pub shards_used: u32,
    /// Modules consumed
    pub modules_used: u32,
}

/// Formats a clock fraction as a percentage string.
///
/// # Example
///
/// ```
/// use fluxplan::display::format_clock;
///
/// assert_eq!(format_clock(1.0), "100%");
/// assert_eq!(format_clock(1.5), "150%");
/// assert_eq!(format_clock(0.1667), "16.67%");
/// ```
pub fn format_clock(clock: f64) -> String {
    let percent = clock * 100.0;
    if (percent - percent.round()).abs() < 1e-9 {
        format!("{:.0}%", percent)
    } else {
        format!("{:.2}%", percent)
    }
}

/// Formats a power figure, switching to GW above 1000 MW.
pub fn format_power(mw: f64) -> String {
    if mw >= 1000.0 {
        format!("{:.2} GW", mw / 1000.0)
    } else {
        format!("{:.2} MW", mw)
    }
}

/// Builds the displayable summary for a plan.
///
/// Display names are looked up in the catalog; identifiers are used as a
/// fallback so a summary can always be produced.
pub fn summarize(catalog: &Catalog, plan: &Plan) -> PlanSummary {
    let mut recipes = Vec::with_capacity(plan.assignments.len());

    for assignment in &plan.assignments {
        let recipe_name = catalog
            .recipe(&assignment.recipe)
            .map(|r| r.name.clone())
            .unwrap_or_else(|| assignment.recipe.clone());
        let building_name = catalog
            .building(&assignment.building)
            .map(|b| b.name.clone())
            .unwrap_or_else(|| assignment.building.clone());

        let clock = assignment
            .instances
            .first()
            .map(|b| b.clock)
            .unwrap_or(0.0);
        let trim_clock = assignment
            .instances
            .last()
            .map(|b| b.clock)
            .unwrap_or(0.0);
        // The plan carries each instance's power (overrides included), so
        // rows always add up to the plan total.
        let power_mw: f64 = assignment.instances.iter().map(|b| b.power_mw).sum();

        recipes.push(RecipeSummary {
            recipe: assignment.recipe.clone(),
            recipe_name,
            building_name,
            count: assignment.count(),
            clock,
            trim_clock,
            shards: assignment.instances.iter().map(|b| b.shards).sum(),
            modules: assignment.instances.iter().map(|b| b.modules.filled).sum(),
            power_mw,
        });
    }

    PlanSummary {
        target_item: plan.target_item.clone(),
        requested_rate: plan.requested_rate,
        achieved_rate: plan.achieved_rate,
        building_count: plan.building_count(),
        recipes,
        sources: plan.raw_inputs.clone(),
        byproducts: plan.byproducts.clone(),
        total_power_mw: plan.total_power_mw,
        shards_used: plan.shards_used,
        modules_used: plan.modules_used,
    }
}

/// Prints the plan summary to stdout.
pub fn display_plan(summary: &PlanSummary) {
    println!();
    println!("+================================================================+");
    println!("|                     PRODUCTION PLAN                            |");
    println!("+================================================================+");
    println!();
    println!(
        "Target: {:.2}/min {} (achieved {:.2}/min)",
        summary.requested_rate, summary.target_item, summary.achieved_rate
    );
    println!();
    println!("[BUILDINGS]");
    println!("----------------------------------------------------------------");
    println!(
        "{:<24} {:>6} {:>9} {:>9} {:>11}",
        "Recipe", "Count", "Clock", "Trim", "Power"
    );
    println!("----------------------------------------------------------------");
    for row in &summary.recipes {
        println!(
            "{:<24} {:>6} {:>9} {:>9} {:>11}",
            row.recipe_name,
            row.count,
            format_clock(row.clock),
            format_clock(row.trim_clock),
            format_power(row.power_mw)
        );
        println!(
            "  in {} | {} shards, {} modules",
            row.building_name, row.shards, row.modules
        );
    }

    if !summary.sources.is_empty() {
        println!();
        println!("[RAW INPUTS]");
        println!("----------------------------------------------------------------");
        for (item, rate) in &summary.sources {
            println!("  {:<30} {:>10.2}/min", item, rate);
        }
    }

    if !summary.byproducts.is_empty() {
        println!();
        println!("[BYPRODUCTS]");
        println!("----------------------------------------------------------------");
        for (item, rate) in &summary.byproducts {
            println!("  {:<30} {:>10.2}/min", item, rate);
        }
    }

    println!();
    println!("[SUMMARY]");
    println!("----------------------------------------------------------------");
    println!("  Buildings:     {}", summary.building_count);
    println!("  Total Power:   {}", format_power(summary.total_power_mw));
    println!("  Shards Used:   {}", summary.shards_used);
    println!("  Modules Used:  {}", summary.modules_used);
    println!();
}
