//! WebAssembly bindings for fluxplan.
//!
//! This module provides JavaScript-accessible functions for the production
//! planner. The catalog and request cross the boundary as JSON strings and
//! the result comes back the same way, so the JavaScript side never touches
//! Rust types directly.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

use crate::data::parse_catalog;
use crate::display::{summarize, PlanSummary};
use crate::models::{Catalog, Request};
use crate::optimizer::optimize;
use crate::resolver::resolve;

/// JavaScript-friendly planning request.
#[derive(Debug, Clone, Deserialize)]
pub struct JsPlanRequest {
    pub target_item: String,
    pub target_rate: f64,
    #[serde(default)]
    pub shard_budget: u32,
    #[serde(default)]
    pub module_budget: u32,
    /// Alternate recipes to enable on top of the defaults
    #[serde(default)]
    pub enable_recipes: Vec<String>,
    /// Recipes to disable
    #[serde(default)]
    pub disable_recipes: Vec<String>,
    #[serde(default)]
    pub base_power_overrides: HashMap<String, f64>,
    #[serde(default)]
    pub raw_caps: HashMap<String, f64>,
}

/// JavaScript-friendly planning result.
#[derive(Debug, Clone, Serialize)]
pub struct JsPlanResult {
    pub success: bool,
    pub error: Option<String>,
    pub plan: Option<PlanSummary>,
}

fn failure(message: String) -> String {
    serde_json::to_string(&JsPlanResult {
        success: false,
        error: Some(message),
        plan: None,
    })
    .unwrap_or_default()
}

fn build_request(catalog: &Catalog, input: &JsPlanRequest) -> Request {
    let mut enabled: HashSet<String> = catalog.default_enabled_recipes();
    for recipe in &input.enable_recipes {
        enabled.insert(recipe.clone());
    }
    for recipe in &input.disable_recipes {
        enabled.remove(recipe);
    }

    let mut request = Request::new(catalog, &input.target_item, input.target_rate);
    request.shard_budget = input.shard_budget;
    request.module_budget = input.module_budget;
    request.enabled_recipes = enabled;
    request.base_power_overrides = input.base_power_overrides.clone();
    request.raw_caps = input.raw_caps.clone();
    request
}

/// Run the planner against a catalog and request, both given as JSON.
///
/// Returns a JSON-encoded [`JsPlanResult`].
#[wasm_bindgen]
pub fn plan(catalog_json: &str, request_json: &str) -> String {
    let catalog = match parse_catalog(catalog_json) {
        Ok(c) => c,
        Err(e) => return failure(format!("Invalid catalog: {}", e)),
    };

    let input: JsPlanRequest = match serde_json::from_str(request_json) {
        Ok(i) => i,
        Err(e) => return failure(format!("Invalid request: {}", e)),
    };

    let request = build_request(&catalog, &input);

    let graph = match resolve(&catalog, &request.target_item, &request.enabled_recipes) {
        Ok(g) => g,
        Err(e) => return failure(e.to_string()),
    };

    match optimize(&catalog, &graph, &request) {
        Ok(plan) => serde_json::to_string(&JsPlanResult {
            success: true,
            error: None,
            plan: Some(summarize(&catalog, &plan)),
        })
        .unwrap_or_default(),
        Err(e) => failure(e.to_string()),
    }
}

/// Get the version of the planner.
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
