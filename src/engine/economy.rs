//! Resource production, upkeep and spending. Everything here is pure: it
//! takes a resource snapshot and returns a new one.

use crate::catalog::UnitCatalog;
use crate::config::GameConfig;
use crate::types::{Resources, UnitType};

/// Per-second income for a player holding `captured_nodes` non-base nodes.
pub fn production_rates(config: &GameConfig, captured_nodes: usize) -> Resources {
    let multiplier = 1.0 + captured_nodes as f32 * config.capture_bonus_multiplier;
    config.base_production.map(|rate| rate * multiplier)
}

pub fn apply_production(
    config: &GameConfig,
    current: Resources,
    captured_nodes: usize,
    dt_sec: f32,
) -> Resources {
    let rates = production_rates(config, captured_nodes);
    current
        .zip_with(rates, |value, rate| value + rate * dt_sec)
        .clamp(config.resource_cap)
}

pub fn total_upkeep(catalog: &UnitCatalog, unit_types: impl IntoIterator<Item = UnitType>) -> f32 {
    unit_types
        .into_iter()
        .map(|kind| catalog.get(kind).upkeep)
        .sum()
}

/// Upkeep drains the three resources evenly and never below zero.
pub fn apply_upkeep(current: Resources, total_upkeep: f32, dt_sec: f32) -> Resources {
    let per_resource = total_upkeep * dt_sec / 3.0;
    current.map(|value| (value - per_resource).max(0.0))
}

pub fn can_afford(resources: &Resources, cost: &Resources) -> bool {
    resources.covers(cost)
}

/// Deducts `cost`, or returns `None` when any resource falls short.
pub fn spend(resources: Resources, cost: &Resources) -> Option<Resources> {
    if !can_afford(&resources, cost) {
        return None;
    }
    Some(resources.zip_with(*cost, |value, price| (value - price).max(0.0)))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::constants::STARTING_RESOURCES;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() <= 1e-3
    }

    #[test]
    fn ten_seconds_of_base_income() {
        let config = GameConfig::default();
        let after = apply_production(&config, STARTING_RESOURCES, 0, 10.0);
        assert!(approx_eq(after.html, 120.0));
        assert!(approx_eq(after.css, 95.0));
        assert!(approx_eq(after.js, 70.0));
        assert!(after.iter().all(|value| value < config.resource_cap));
    }

    #[test]
    fn captured_nodes_scale_income() {
        let config = GameConfig::default();
        let rates = production_rates(&config, 2);
        assert!(approx_eq(rates.html, 4.0));
        assert!(approx_eq(rates.css, 3.0));
        assert!(approx_eq(rates.js, 2.0));
    }

    #[test]
    fn production_is_capped() {
        let config = GameConfig::default();
        let after = apply_production(&config, Resources::new(499.0, 499.0, 499.0), 7, 60.0);
        assert_eq!(after, Resources::new(500.0, 500.0, 500.0));
    }

    #[test]
    fn upkeep_floors_at_zero() {
        let after = apply_upkeep(Resources::new(1.0, 10.0, 0.0), 6.0, 1.0);
        assert_eq!(after, Resources::new(0.0, 8.0, 0.0));
    }

    #[test]
    fn upkeep_sums_catalog_values() {
        let catalog = UnitCatalog::default();
        let total = total_upkeep(&catalog, [UnitType::HtmlSoldier, UnitType::JsStriker]);
        assert!(approx_eq(total, 0.8));
    }

    #[test]
    fn spending_at_the_exact_threshold_leaves_zero() {
        let cost = Resources::new(30.0, 0.0, 0.0);
        let after = spend(Resources::new(30.0, 5.0, 5.0), &cost).expect("affordable");
        assert_eq!(after, Resources::new(0.0, 5.0, 5.0));
        assert!(spend(Resources::new(29.9, 100.0, 100.0), &cost).is_none());
    }

    proptest! {
        #[test]
        fn production_stays_within_bounds(
            html in 0.0f32..=500.0,
            css in 0.0f32..=500.0,
            js in 0.0f32..=500.0,
            captured in 0usize..8,
            steps in proptest::collection::vec(0.0f32..5.0, 1..50),
        ) {
            let config = GameConfig::default();
            let mut resources = Resources::new(html, css, js);
            for dt in steps {
                resources = apply_production(&config, resources, captured, dt);
                for value in resources.iter() {
                    prop_assert!((0.0..=config.resource_cap).contains(&value));
                }
            }
        }

        #[test]
        fn upkeep_never_goes_negative(
            html in 0.0f32..=500.0,
            upkeep in 0.0f32..50.0,
            dt in 0.0f32..10.0,
        ) {
            let after = apply_upkeep(Resources::new(html, html, html), upkeep, dt);
            prop_assert!(after.iter().all(|value| value >= 0.0));
        }
    }
}
