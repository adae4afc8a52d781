//! fluxplan - Command Line Interface
//!
//! This is the main entry point for the production planner.
//! Run with `--help` to see all available options.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use fluxplan::{
    data::load_catalog,
    display::{display_plan, summarize},
    models::Request,
    optimizer::optimize,
    resolver::resolve,
};

/// Command-line arguments for fluxplan.
#[derive(Parser, Debug)]
#[command(name = "fluxplan")]
#[command(author, version, about = "Plan production lines: building counts, clock speeds, and upgrade allocation", long_about = None)]
struct Args {
    /// Target item identifier (e.g. "iron-plate")
    #[arg(short, long)]
    target: String,

    /// Target rate in units per minute
    #[arg(short, long)]
    rate: f64,

    /// Total power shards available
    #[arg(short, long, default_value = "0")]
    shards: u32,

    /// Total boost modules available
    #[arg(short, long, default_value = "0")]
    modules: u32,

    /// Directory containing items.json, recipes.json, buildings.json
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Enable an alternate recipe by identifier (repeatable)
    #[arg(long = "enable-alt")]
    enable_alt: Vec<String>,

    /// Disable a recipe by identifier (repeatable)
    #[arg(long = "disable")]
    disable: Vec<String>,

    /// Override a building's base power, as "building-id=MW" (repeatable)
    #[arg(long = "base-power", value_parser = parse_key_value)]
    base_power: Vec<(String, f64)>,

    /// Cap a raw item's supply, as "item-id=rate" (repeatable)
    #[arg(long = "cap", value_parser = parse_key_value)]
    cap: Vec<(String, f64)>,

    /// Emit the plan as JSON instead of the console tables
    #[arg(long, default_value = "false")]
    json: bool,
}

/// Parses a `key=value` argument into an identifier and a number.
fn parse_key_value(s: &str) -> Result<(String, f64), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected 'id=value', got '{}'", s))?;
    let value: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    Ok((key.trim().to_string(), value))
}

fn main() -> Result<()> {
    let args = Args::parse();

    if !args.data_dir.exists() {
        bail!(
            "data directory '{}' not found; run from the project root or pass --data-dir",
            args.data_dir.display()
        );
    }

    let catalog = load_catalog(&args.data_dir)
        .with_context(|| format!("loading catalog from '{}'", args.data_dir.display()))?;

    let mut request = Request::new(&catalog, &args.target, args.rate);
    request.shard_budget = args.shards;
    request.module_budget = args.modules;
    for recipe in &args.enable_alt {
        if catalog.recipe(recipe).is_none() {
            bail!("unknown recipe '{}'", recipe);
        }
        request.enabled_recipes.insert(recipe.clone());
    }
    for recipe in &args.disable {
        request.enabled_recipes.remove(recipe);
    }
    request.base_power_overrides = args.base_power.iter().cloned().collect::<HashMap<_, _>>();
    request.raw_caps = args.cap.iter().cloned().collect::<HashMap<_, _>>();

    if !args.json {
        println!("fluxplan - Production Planner");
        println!("================================================================");
        println!();
        println!("Configuration:");
        println!("  Target:   {:.2}/min {}", args.rate, args.target);
        println!("  Shards:   {}", args.shards);
        println!("  Modules:  {}", args.modules);
        println!("  Recipes:  {} enabled", request.enabled_recipes.len());
    }

    let graph = resolve(&catalog, &request.target_item, &request.enabled_recipes)
        .with_context(|| format!("resolving production graph for '{}'", args.target))?;
    let plan = optimize(&catalog, &graph, &request).context("planning failed")?;

    let summary = summarize(&catalog, &plan);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        display_plan(&summary);
    }

    Ok(())
}
