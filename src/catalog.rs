//! Static balance data: unit stats keyed by [`UnitType`] and node grade stats.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{
    Ability, CounterClass, GradeStats, NodeGrade, Resources, UnitRole, UnitStats, UnitType,
};

/// Immutable stat table with exactly one entry per unit type.
///
/// Deserializes from a partial `unit_type -> stats` map; missing entries keep
/// their default balance values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<UnitType, UnitStats>",
    into = "BTreeMap<UnitType, UnitStats>"
)]
pub struct UnitCatalog {
    table: Vec<UnitStats>,
}

impl UnitCatalog {
    pub fn get(&self, kind: UnitType) -> &UnitStats {
        &self.table[kind as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = (UnitType, &UnitStats)> {
        UnitType::ALL.into_iter().zip(self.table.iter())
    }
}

impl Default for UnitCatalog {
    fn default() -> Self {
        Self {
            table: UnitType::ALL.into_iter().map(default_stats).collect(),
        }
    }
}

impl From<BTreeMap<UnitType, UnitStats>> for UnitCatalog {
    fn from(mut overrides: BTreeMap<UnitType, UnitStats>) -> Self {
        Self {
            table: UnitType::ALL
                .into_iter()
                .map(|kind| overrides.remove(&kind).unwrap_or_else(|| default_stats(kind)))
                .collect(),
        }
    }
}

impl From<UnitCatalog> for BTreeMap<UnitType, UnitStats> {
    fn from(catalog: UnitCatalog) -> Self {
        UnitType::ALL.into_iter().zip(catalog.table).collect()
    }
}

pub fn default_stats(kind: UnitType) -> UnitStats {
    use CounterClass as C;
    use UnitRole as R;

    match kind {
        UnitType::HtmlSoldier => UnitStats {
            tier: 1,
            role: R::Tank,
            counter_class: C::Html,
            hp: 120,
            atk: 8.0,
            speed: 1.0,
            cost: Resources::new(30.0, 0.0, 0.0),
            upkeep: 0.3,
            ability: None,
        },
        UnitType::CssGuardian => UnitStats {
            tier: 1,
            role: R::Support,
            counter_class: C::Css,
            hp: 80,
            atk: 5.0,
            speed: 0.8,
            cost: Resources::new(0.0, 40.0, 0.0),
            upkeep: 0.4,
            ability: None,
        },
        UnitType::JsStriker => UnitStats {
            tier: 1,
            role: R::Dps,
            counter_class: C::Js,
            hp: 60,
            atk: 15.0,
            speed: 1.5,
            cost: Resources::new(0.0, 0.0, 50.0),
            upkeep: 0.5,
            ability: None,
        },
        UnitType::HtmlKnight => UnitStats {
            tier: 2,
            role: R::Tank,
            counter_class: C::Html,
            hp: 200,
            atk: 12.0,
            speed: 0.9,
            cost: Resources::new(60.0, 20.0, 0.0),
            upkeep: 0.6,
            ability: None,
        },
        UnitType::CssMage => UnitStats {
            tier: 2,
            role: R::Support,
            counter_class: C::Css,
            hp: 130,
            atk: 8.0,
            speed: 0.7,
            cost: Resources::new(20.0, 80.0, 0.0),
            upkeep: 0.8,
            ability: Some(Ability::GuardAura),
        },
        UnitType::JsAssassin => UnitStats {
            tier: 2,
            role: R::Dps,
            counter_class: C::Js,
            hp: 90,
            atk: 22.0,
            speed: 1.8,
            cost: Resources::new(20.0, 0.0, 90.0),
            upkeep: 0.9,
            ability: Some(Ability::FirstStrike),
        },
        UnitType::HtmlTitan => UnitStats {
            tier: 3,
            role: R::Tank,
            counter_class: C::Html,
            hp: 350,
            atk: 18.0,
            speed: 0.7,
            cost: Resources::new(100.0, 40.0, 20.0),
            upkeep: 1.2,
            ability: None,
        },
        UnitType::CssArchmage => UnitStats {
            tier: 3,
            role: R::Support,
            counter_class: C::Css,
            hp: 180,
            atk: 12.0,
            speed: 0.6,
            cost: Resources::new(40.0, 120.0, 20.0),
            upkeep: 1.4,
            ability: Some(Ability::RallyAura),
        },
        UnitType::JsOverlord => UnitStats {
            tier: 3,
            role: R::Dps,
            counter_class: C::Js,
            hp: 120,
            atk: 35.0,
            speed: 1.2,
            cost: Resources::new(40.0, 20.0, 140.0),
            upkeep: 1.6,
            ability: Some(Ability::Splash),
        },
        UnitType::ApiConnector => UnitStats {
            tier: 2,
            role: R::Support,
            counter_class: C::Special,
            hp: 100,
            atk: 3.0,
            speed: 1.0,
            cost: Resources::new(40.0, 40.0, 40.0),
            upkeep: 1.0,
            ability: Some(Ability::Synergy),
        },
        UnitType::DebugDrone => UnitStats {
            tier: 2,
            role: R::Dps,
            counter_class: C::Special,
            hp: 40,
            atk: 0.0,
            speed: 2.0,
            cost: Resources::new(0.0, 0.0, 80.0),
            upkeep: 0.8,
            ability: Some(Ability::Execute),
        },
        UnitType::Firewall => UnitStats {
            tier: 2,
            role: R::Tank,
            counter_class: C::Special,
            hp: 300,
            atk: 0.0,
            speed: 0.0,
            cost: Resources::new(50.0, 100.0, 0.0),
            upkeep: 1.2,
            ability: Some(Ability::SlowField),
        },
    }
}

pub fn grade_stats(grade: NodeGrade) -> GradeStats {
    match grade {
        NodeGrade::Html => GradeStats {
            resource_bonus: 0.3,
            defense: 10,
            capture_time_sec: 10.0,
        },
        NodeGrade::Css => GradeStats {
            resource_bonus: 0.2,
            defense: 20,
            capture_time_sec: 15.0,
        },
        NodeGrade::Js => GradeStats {
            resource_bonus: 0.4,
            defense: 30,
            capture_time_sec: 20.0,
        },
        NodeGrade::Fullstack => GradeStats {
            resource_bonus: 0.6,
            defense: 50,
            capture_time_sec: 30.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_every_unit_type() {
        let catalog = UnitCatalog::default();
        assert_eq!(catalog.iter().count(), UnitType::ALL.len());
        assert_eq!(catalog.get(UnitType::JsOverlord).atk, 35.0);
        assert_eq!(catalog.get(UnitType::Firewall).speed, 0.0);
    }

    #[test]
    fn only_the_assassin_strikes_first() {
        let catalog = UnitCatalog::default();
        let first_strikers: Vec<UnitType> = catalog
            .iter()
            .filter(|(_, stats)| stats.ability == Some(Ability::FirstStrike))
            .map(|(kind, _)| kind)
            .collect();
        assert_eq!(first_strikers, vec![UnitType::JsAssassin]);
    }

    #[test]
    fn special_types_share_the_special_class() {
        let catalog = UnitCatalog::default();
        let specials = catalog
            .iter()
            .filter(|(_, stats)| stats.counter_class == CounterClass::Special)
            .count();
        assert_eq!(specials, 3);
    }

    #[test]
    fn partial_overrides_keep_defaults() {
        let mut overrides = BTreeMap::new();
        let mut soldier = default_stats(UnitType::HtmlSoldier);
        soldier.hp = 999;
        overrides.insert(UnitType::HtmlSoldier, soldier);

        let catalog = UnitCatalog::from(overrides);
        assert_eq!(catalog.get(UnitType::HtmlSoldier).hp, 999);
        assert_eq!(
            catalog.get(UnitType::HtmlKnight),
            &default_stats(UnitType::HtmlKnight)
        );
    }

    #[test]
    fn fullstack_node_is_the_slowest_to_capture() {
        let slowest = [NodeGrade::Html, NodeGrade::Css, NodeGrade::Js]
            .into_iter()
            .map(|grade| grade_stats(grade).capture_time_sec)
            .fold(0.0f32, f32::max);
        assert!(grade_stats(NodeGrade::Fullstack).capture_time_sec > slowest);
    }
}
