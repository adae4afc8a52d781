//! Tests for the allocation optimizer.

use std::collections::BTreeMap;

use fluxplan::error::PlanError;
use fluxplan::models::{
    Building, Catalog, Item, Plan, PowerConstants, Recipe, RecipeRate, Request,
};
use fluxplan::optimizer::optimize;
use fluxplan::power::max_clock_for_shards;
use fluxplan::resolver::resolve;

fn item(id: &str, extractable: bool) -> Item {
    Item {
        id: id.to_string(),
        name: id.to_string(),
        extractable,
    }
}

fn rate(item: &str, amount: f64) -> RecipeRate {
    RecipeRate {
        item: item.to_string(),
        amount,
    }
}

fn recipe(
    id: &str,
    alternate: bool,
    duration: f64,
    inputs: Vec<RecipeRate>,
    outputs: Vec<RecipeRate>,
) -> Recipe {
    Recipe {
        id: id.to_string(),
        name: id.to_string(),
        alternate,
        duration_secs: duration,
        inputs,
        outputs,
        building: "fab".to_string(),
    }
}

fn fab(slots: u32) -> Building {
    Building {
        id: "fab".to_string(),
        name: "Fabricator".to_string(),
        base_power_mw: 4.0,
        module_slots: slots,
    }
}

/// One recipe producing 60 widgets/min per building from 120 ore/min.
fn widget_catalog(slots: u32) -> Catalog {
    Catalog::new(
        vec![item("ore", true), item("widget", false)],
        vec![recipe(
            "make-widget",
            false,
            1.0,
            vec![rate("ore", 2.0)],
            vec![rate("widget", 1.0)],
        )],
        vec![fab(slots)],
        PowerConstants::default(),
    )
    .expect("catalog should validate")
}

/// Ore -> ingot -> rod -> screw, plus an alternate screw recipe straight
/// from ingots. Both screw recipes produce 40/min per building, but the
/// alternate needs only 7.5 ore/min where the default chain needs 10.
fn screw_catalog() -> Catalog {
    Catalog::new(
        vec![
            item("ore", true),
            item("ingot", false),
            item("rod", false),
            item("screw", false),
        ],
        vec![
            recipe("smelt", false, 2.0, vec![rate("ore", 1.0)], vec![rate("ingot", 1.0)]),
            recipe("make-rod", false, 4.0, vec![rate("ingot", 1.0)], vec![rate("rod", 1.0)]),
            recipe("make-screw", false, 6.0, vec![rate("rod", 1.0)], vec![rate("screw", 4.0)]),
            recipe(
                "alt-cast-screw",
                true,
                24.0,
                vec![rate("ingot", 3.0)],
                vec![rate("screw", 16.0)],
            ),
        ],
        vec![fab(0)],
        PowerConstants::default(),
    )
    .expect("catalog should validate")
}

fn plan_for(catalog: &Catalog, request: &Request) -> Result<Plan, PlanError> {
    let graph = resolve(catalog, &request.target_item, &request.enabled_recipes)
        .expect("target should resolve");
    optimize(catalog, &graph, request)
}

/// Recomputes produced-minus-consumed per item from the plan's instances
/// and checks it against the plan's own totals.
fn assert_flow_balance(catalog: &Catalog, plan: &Plan) {
    let mut net: BTreeMap<String, f64> = BTreeMap::new();
    for assignment in &plan.assignments {
        let recipe = catalog.recipe(&assignment.recipe).expect("recipe exists");
        let throughput = assignment.throughput();
        for out in &recipe.outputs {
            *net.entry(out.item.clone()).or_insert(0.0) +=
                throughput * out.amount * 60.0 / recipe.duration_secs;
        }
        for input in &recipe.inputs {
            *net.entry(input.item.clone()).or_insert(0.0) -=
                throughput * input.amount * 60.0 / recipe.duration_secs;
        }
    }

    for (item, balance) in &net {
        if *item == plan.target_item {
            assert!(
                (balance - plan.achieved_rate).abs() < 1e-6,
                "target flow {} should equal the achieved rate {}",
                balance,
                plan.achieved_rate
            );
        } else if *balance < -1e-9 {
            let drawn = plan.raw_inputs.get(item).copied().unwrap_or(0.0);
            assert!(
                (drawn + balance).abs() < 1e-6,
                "item '{}' deficit {} must be covered by raw inputs",
                item,
                -balance
            );
        } else if *balance > 1e-9 {
            let surplus = plan.byproducts.get(item).copied().unwrap_or(0.0);
            assert!(
                (surplus - balance).abs() < 1e-6,
                "item '{}' surplus {} must be reported as a byproduct",
                item,
                balance
            );
        }
    }
}

#[test]
fn test_zero_budgets_round_up_building_count() {
    let catalog = widget_catalog(0);
    let request = Request::new(&catalog, "widget", 430.0);

    let plan = plan_for(&catalog, &request).expect("plan should exist");

    // 430/min over 60/min buildings: 7 full plus one trimmed to the rest.
    assert_eq!(plan.building_count(), 8);
    assert_eq!(plan.shards_used, 0);
    assert_eq!(plan.modules_used, 0);
    assert!(plan.achieved_rate >= 430.0 - 1e-6);
    assert!(plan.achieved_rate < 430.1);

    let instances = &plan.assignments[0].instances;
    for instance in instances {
        assert!(instance.clock <= 1.0 + 1e-9, "no shards means no overclock");
    }
    // The trim building runs at roughly 1/6 clock.
    let trim = instances.last().expect("at least one instance");
    assert!((trim.clock - 0.1667).abs() < 1e-9);

    assert_flow_balance(&catalog, &plan);
}

#[test]
fn test_shards_reduce_building_count() {
    let catalog = widget_catalog(0);
    let mut request = Request::new(&catalog, "widget", 430.0);
    request.shard_budget = 7;

    let plan = plan_for(&catalog, &request).expect("plan should exist");

    assert_eq!(plan.building_count(), 5);
    assert!(plan.shards_used <= 7);
    assert!(plan.achieved_rate >= 430.0 - 1e-6);

    for instance in &plan.assignments[0].instances {
        assert!(instance.clock <= 1.5 + 1e-9, "one shard caps the clock at 150%");
    }

    assert_flow_balance(&catalog, &plan);
}

#[test]
fn test_modules_multiply_output() {
    let catalog = widget_catalog(4);
    let mut request = Request::new(&catalog, "widget", 240.0);
    request.module_budget = 4;

    let plan = plan_for(&catalog, &request).expect("plan should exist");

    // Four modules in four slots quadruple one building's output.
    assert_eq!(plan.building_count(), 1);
    assert_eq!(plan.modules_used, 4);
    assert_eq!(plan.shards_used, 0);
    assert!((plan.achieved_rate - 240.0).abs() < 1e-6);

    let only = &plan.assignments[0].instances[0];
    assert!((only.clock - 1.0).abs() < 1e-9);
    assert_eq!(only.modules.filled, 4);

    assert_flow_balance(&catalog, &plan);
}

#[test]
fn test_budgets_are_never_exceeded() {
    let catalog = widget_catalog(2);
    for (shards, modules) in [(0u32, 0u32), (7, 0), (0, 4), (7, 4), (100, 100)] {
        let mut request = Request::new(&catalog, "widget", 430.0);
        request.shard_budget = shards;
        request.module_budget = modules;

        let plan = plan_for(&catalog, &request).expect("plan should exist");
        assert!(plan.shards_used <= shards, "shard budget exceeded");
        assert!(plan.modules_used <= modules, "module budget exceeded");
        assert!(plan.achieved_rate >= 430.0 - 1e-6);
        assert_flow_balance(&catalog, &plan);
    }
}

#[test]
fn test_instance_invariants_hold() {
    let catalog = widget_catalog(2);
    let mut request = Request::new(&catalog, "widget", 430.0);
    request.shard_budget = 7;
    request.module_budget = 4;

    let plan = plan_for(&catalog, &request).expect("plan should exist");

    for assignment in &plan.assignments {
        for instance in &assignment.instances {
            assert!(instance.clock > 0.0);
            assert!(
                instance.clock <= max_clock_for_shards(instance.shards) + 1e-9,
                "clock {} breaks the cap for {} shards",
                instance.clock,
                instance.shards
            );
            assert!(instance.shards <= 3);
            assert!(instance.modules.filled <= instance.modules.total);
            assert!(instance.modules.total <= 2);
        }
    }
}

#[test]
fn test_more_budget_never_needs_more_buildings() {
    let catalog = widget_catalog(0);

    let lean = Request::new(&catalog, "widget", 430.0);
    let lean_count = plan_for(&catalog, &lean)
        .expect("plan should exist")
        .building_count();

    for shards in [1u32, 3, 7, 21] {
        let mut rich = Request::new(&catalog, "widget", 430.0);
        rich.shard_budget = shards;
        let rich_count = plan_for(&catalog, &rich)
            .expect("plan should exist")
            .building_count();
        assert!(
            rich_count <= lean_count,
            "{} shards produced {} buildings, more than {} with none",
            shards,
            rich_count,
            lean_count
        );
    }
}

#[test]
fn test_chain_intermediates_are_fully_supplied() {
    // 430/min of widgets needs 1290/min of ingots before quantization, but
    // the widget trim building's clock rounds up, so it draws a sliver
    // more. The smelter row must cover that sliver: only true raw leaves
    // may appear as external inputs.
    let catalog = Catalog::new(
        vec![item("ore", true), item("ingot", false), item("widget", false)],
        vec![
            recipe("smelt", false, 2.0, vec![rate("ore", 1.0)], vec![rate("ingot", 1.0)]),
            recipe(
                "make-widget",
                false,
                1.0,
                vec![rate("ingot", 3.0)],
                vec![rate("widget", 1.0)],
            ),
        ],
        vec![fab(0)],
        PowerConstants::default(),
    )
    .expect("catalog should validate");

    let request = Request::new(&catalog, "widget", 430.0);
    let graph = resolve(&catalog, "widget", &request.enabled_recipes)
        .expect("widget should resolve");
    let plan = optimize(&catalog, &graph, &request).expect("plan should exist");

    for item in plan.raw_inputs.keys() {
        assert!(
            graph.is_leaf(item),
            "'{}' has a producing recipe but was drawn externally",
            item
        );
    }
    assert!(plan.raw_inputs.contains_key("ore"));
    assert!(!plan.raw_inputs.contains_key("ingot"));
    assert!(plan.achieved_rate >= 430.0 - 1e-6);
    assert_flow_balance(&catalog, &plan);
}

#[test]
fn test_more_modules_never_cost_more() {
    let catalog = widget_catalog(4);

    let mut last: Option<(usize, f64)> = None;
    for modules in [0u32, 1, 2, 4, 8, 16] {
        let mut request = Request::new(&catalog, "widget", 430.0);
        request.module_budget = modules;
        let plan = plan_for(&catalog, &request).expect("plan should exist");

        if let Some((count, power)) = last {
            assert!(
                plan.building_count() <= count,
                "{} modules produced {} buildings, more than {} with less budget",
                modules,
                plan.building_count(),
                count
            );
            if plan.building_count() == count {
                assert!(
                    plan.total_power_mw <= power + 1e-9,
                    "{} modules cost {} MW at the same count, more than {} MW",
                    modules,
                    plan.total_power_mw,
                    power
                );
            }
        }
        last = Some((plan.building_count(), plan.total_power_mw));
    }
}

#[test]
fn test_plans_are_deterministic() {
    let catalog = screw_catalog();
    let mut request = Request::new(&catalog, "screw", 170.0);
    request.shard_budget = 4;

    let first = plan_for(&catalog, &request).expect("plan should exist");
    let second = plan_for(&catalog, &request).expect("plan should exist");

    let first_json = serde_json::to_string(&first).expect("plan serializes");
    let second_json = serde_json::to_string(&second).expect("plan serializes");
    assert_eq!(first_json, second_json);
}

#[test]
fn test_default_recipe_wins_rate_ties() {
    let catalog = screw_catalog();
    let mut request = Request::new(&catalog, "screw", 40.0);
    request.enabled_recipes.insert("alt-cast-screw".to_string());

    let plan = plan_for(&catalog, &request).expect("plan should exist");

    let used: Vec<&str> = plan.assignments.iter().map(|a| a.recipe.as_str()).collect();
    assert!(used.contains(&"make-screw"), "the tied default should be chosen");
    assert!(!used.contains(&"alt-cast-screw"));
}

#[test]
fn test_raw_cap_forces_recipe_switch() {
    let catalog = screw_catalog();
    let mut request = Request::new(&catalog, "screw", 40.0);
    request.enabled_recipes.insert("alt-cast-screw".to_string());
    request.raw_caps.insert("ore".to_string(), 8.0);

    let plan = plan_for(&catalog, &request).expect("the alternate chain fits the cap");

    let used: Vec<&str> = plan.assignments.iter().map(|a| a.recipe.as_str()).collect();
    assert!(used.contains(&"alt-cast-screw"));
    assert!(!used.contains(&"make-screw"));

    let ore = plan.raw_inputs.get("ore").copied().unwrap_or(0.0);
    assert!(ore <= 8.0 + 1e-6, "ore draw {} breaks the cap", ore);
    assert_flow_balance(&catalog, &plan);
}

#[test]
fn test_raw_cap_below_any_chain_is_infeasible() {
    let catalog = screw_catalog();
    let mut request = Request::new(&catalog, "screw", 40.0);
    request.enabled_recipes.insert("alt-cast-screw".to_string());
    request.raw_caps.insert("ore".to_string(), 7.0);

    let result = plan_for(&catalog, &request);
    assert!(matches!(result, Err(PlanError::InfeasibleBudget { .. })));
}

#[test]
fn test_invalid_requests_are_rejected() {
    let catalog = widget_catalog(0);

    let zero_rate = Request::new(&catalog, "widget", 0.0);
    assert!(matches!(
        plan_for(&catalog, &zero_rate),
        Err(PlanError::InvalidRequest { .. })
    ));

    let negative = Request::new(&catalog, "widget", -5.0);
    assert!(matches!(
        plan_for(&catalog, &negative),
        Err(PlanError::InvalidRequest { .. })
    ));
}

#[test]
fn test_extractable_target_needs_no_buildings() {
    let catalog = widget_catalog(0);
    let request = Request::new(&catalog, "ore", 500.0);

    let plan = plan_for(&catalog, &request).expect("a raw target is trivially planned");

    assert_eq!(plan.building_count(), 0);
    assert_eq!(plan.achieved_rate, 500.0);
    assert_eq!(plan.raw_inputs.get("ore"), Some(&500.0));
}

#[test]
fn test_cyclic_recipes_converge() {
    // r-a turns 4 b/min into 8 a/min; r-b turns 2 a/min into 10 b/min.
    // The loop feeds back a tenth of the demand each round.
    let catalog = Catalog::new(
        vec![item("a", false), item("b", false)],
        vec![
            recipe("r-a", false, 60.0, vec![rate("b", 4.0)], vec![rate("a", 8.0)]),
            recipe("r-b", false, 60.0, vec![rate("a", 2.0)], vec![rate("b", 10.0)]),
        ],
        vec![fab(0)],
        PowerConstants::default(),
    )
    .expect("catalog should validate");

    let request = Request::new(&catalog, "a", 8.0);
    let plan = plan_for(&catalog, &request).expect("the cycle should converge");

    assert!(plan.achieved_rate >= 8.0 - 1e-6);
    assert!(plan.raw_inputs.is_empty(), "a closed loop draws nothing raw");
    assert_flow_balance(&catalog, &plan);
}

#[test]
fn test_base_power_override_changes_total() {
    let catalog = widget_catalog(0);
    let request = Request::new(&catalog, "widget", 120.0);
    let baseline = plan_for(&catalog, &request).expect("plan should exist");

    let mut boosted = Request::new(&catalog, "widget", 120.0);
    boosted.base_power_overrides.insert("fab".to_string(), 8.0);
    let doubled = plan_for(&catalog, &boosted).expect("plan should exist");

    assert_eq!(baseline.building_count(), doubled.building_count());
    assert!(
        (doubled.total_power_mw - 2.0 * baseline.total_power_mw).abs() < 1e-6,
        "doubling base power should double the total"
    );
}
