//! # fluxplan
//!
//! A command-line tool and library for planning production lines in
//! factory-building games.
//!
//! Given a target item and rate, a catalog of recipes and buildings, and
//! budgets of scarce upgrades (power shards that unlock overclocking,
//! boost modules that multiply output), fluxplan computes how many
//! buildings to place, which recipe each runs, and each building's clock
//! speed and module fill, minimizing first the building count and then
//! the total power draw.
//!
//! ## Modules
//!
//! - [`models`] - Catalog, request, and plan data structures
//! - [`data`] - JSON catalog loading and validation
//! - [`power`] - Clock, shard, and module power/output math
//! - [`resolver`] - Target-to-raw-leaves recipe graph resolution
//! - [`optimizer`] - Building, clock, and upgrade allocation search
//! - [`display`] - Plan summarization and console rendering
//! - [`error`] - Error taxonomy
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use fluxplan::{
//!     data::load_catalog,
//!     display::{display_plan, summarize},
//!     models::Request,
//!     optimizer::optimize,
//!     resolver::resolve,
//! };
//!
//! let catalog = load_catalog(Path::new("data")).unwrap();
//!
//! // 430 plates per minute, 6 shards and 4 modules to spend.
//! let mut request = Request::new(&catalog, "iron-plate", 430.0);
//! request.shard_budget = 6;
//! request.module_budget = 4;
//!
//! let graph = resolve(&catalog, &request.target_item, &request.enabled_recipes).unwrap();
//! let plan = optimize(&catalog, &graph, &request).unwrap();
//! display_plan(&summarize(&catalog, &plan));
//! ```
//!
//! ## Guarantees and limits
//!
//! Plans are always feasible: flow balance holds for every item, budgets
//! are never exceeded, and every clock respects its shard cap. The
//! allocation search is a bounded greedy loop that is deterministic and
//! locally optimal with respect to its marginal-benefit ordering, but not
//! guaranteed to find the global optimum; see [`optimizer::optimize`].

pub mod data;
pub mod display;
pub mod error;
pub mod models;
pub mod optimizer;
pub mod power;
pub mod resolver;
pub mod wasm;
