//! Damage formula and per-tick engagement resolution.
//!
//! A hit deals `max(1, floor(atk × firstStrike × counter × (1 + flank) / (1 + reduction)))`.
//! Each unit strikes at most once per `attack_cooldown_sec`, so its sustained
//! output is `atk × counter` per second. Targets are chosen from the state at
//! the start of combat and all hits land together, which keeps the result
//! independent of unit order.

use std::collections::HashMap;

use crate::catalog::UnitCatalog;
use crate::config::{CounterMultipliers, GameConfig};
use crate::constants::{
    ATTACK_COOLDOWN_SEC, ATTACK_RANGE_MELEE, AURA_RANGE, EXECUTE_COOLDOWN_SEC,
    FIRST_STRIKE_MULTIPLIER, FLANK_BONUS,
};
use crate::types::{Ability, CounterClass, CounterRelation};

use super::units::Unit;

const SYNERGY_ATTACK_BONUS: f32 = 0.2;
const GUARD_AURA_REDUCTION: f32 = 0.2;
const RALLY_AURA_REDUCTION: f32 = 0.3;
const SPLASH_MAX_TARGETS: usize = 3;
const COOLDOWN_EPSILON: f32 = 1e-4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CombatRules {
    pub multipliers: CounterMultipliers,
    pub flank_bonus: f32,
    pub melee_range: f32,
    pub attack_cooldown_sec: f32,
}

impl CombatRules {
    pub fn from_config(config: &GameConfig) -> Self {
        Self {
            multipliers: config.counter_multipliers,
            flank_bonus: config.flank_bonus,
            melee_range: config.melee_range,
            attack_cooldown_sec: config.attack_cooldown_sec,
        }
    }
}

impl Default for CombatRules {
    fn default() -> Self {
        Self {
            multipliers: CounterMultipliers::default(),
            flank_bonus: FLANK_BONUS,
            melee_range: ATTACK_RANGE_MELEE,
            attack_cooldown_sec: ATTACK_COOLDOWN_SEC,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HitModifiers {
    pub flanking: bool,
    pub first_strike: bool,
    /// Fractional damage reduction granted by defensive auras.
    pub damage_reduction: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DamageResult {
    pub raw_damage: f32,
    pub counter_multiplier: f32,
    pub flank_bonus: f32,
    pub final_damage: i32,
}

pub fn counter_relation(attacker: CounterClass, defender: CounterClass) -> CounterRelation {
    if attacker.beats() == Some(defender) {
        CounterRelation::Advantage
    } else if defender.beats() == Some(attacker) {
        CounterRelation::Disadvantage
    } else {
        CounterRelation::Neutral
    }
}

pub fn calculate_damage(
    rules: &CombatRules,
    attacker: CounterClass,
    defender: CounterClass,
    attacker_atk: f32,
    modifiers: HitModifiers,
) -> DamageResult {
    let first_strike = if modifiers.first_strike {
        FIRST_STRIKE_MULTIPLIER
    } else {
        1.0
    };
    let raw_damage = attacker_atk * first_strike;
    let counter_multiplier = rules.multipliers.get(counter_relation(attacker, defender));
    let flank_bonus = if modifiers.flanking {
        rules.flank_bonus
    } else {
        0.0
    };
    let scaled = raw_damage * counter_multiplier * (1.0 + flank_bonus)
        / (1.0 + modifiers.damage_reduction.max(0.0));
    DamageResult {
        raw_damage,
        counter_multiplier,
        flank_bonus,
        final_damage: (scaled.floor() as i32).max(1),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Hit {
    pub attacker_id: String,
    pub defender_id: String,
    pub damage: i32,
    pub executed: bool,
}

fn can_engage(catalog: &UnitCatalog, unit: &Unit) -> bool {
    let stats = catalog.get(unit.unit_type);
    stats.atk > 0.0 || stats.ability == Some(Ability::Execute)
}

/// Living enemies within range, nearest first, ties going to the earlier unit.
fn enemies_in_range(units: &[Unit], attacker_idx: usize, range: f32) -> Vec<usize> {
    let attacker = &units[attacker_idx];
    let mut in_range: Vec<(usize, f32)> = units
        .iter()
        .enumerate()
        .filter(|(_, other)| other.owner != attacker.owner && other.is_alive())
        .map(|(idx, other)| (idx, attacker.position.distance(other.position)))
        .filter(|(_, dist)| *dist <= range)
        .collect();
    in_range.sort_by(|a, b| a.1.total_cmp(&b.1));
    in_range.into_iter().map(|(idx, _)| idx).collect()
}

fn has_ally_with(
    units: &[Unit],
    catalog: &UnitCatalog,
    subject_idx: usize,
    ability: Ability,
    range: Option<f32>,
) -> bool {
    let subject = &units[subject_idx];
    units.iter().enumerate().any(|(idx, other)| {
        idx != subject_idx
            && other.owner == subject.owner
            && other.is_alive()
            && catalog.get(other.unit_type).ability == Some(ability)
            && range
                .map(|range| other.position.distance(subject.position) <= range)
                .unwrap_or(true)
    })
}

fn damage_reduction(units: &[Unit], catalog: &UnitCatalog, defender_idx: usize) -> f32 {
    if has_ally_with(units, catalog, defender_idx, Ability::RallyAura, None) {
        RALLY_AURA_REDUCTION
    } else if has_ally_with(units, catalog, defender_idx, Ability::GuardAura, Some(AURA_RANGE)) {
        GUARD_AURA_REDUCTION
    } else {
        0.0
    }
}

/// Runs one tick of combat: cooldowns tick down, every unit that can fight
/// picks a target, ready units strike, and damage lands simultaneously.
pub fn resolve_combat(
    units: &mut [Unit],
    catalog: &UnitCatalog,
    rules: &CombatRules,
    dt_sec: f32,
) -> Vec<Hit> {
    for unit in units.iter_mut() {
        unit.attack_cooldown = (unit.attack_cooldown - dt_sec).max(0.0);
        unit.ability_cooldown = (unit.ability_cooldown - dt_sec).max(0.0);
    }

    let targets: Vec<Option<usize>> = (0..units.len())
        .map(|idx| {
            if units[idx].is_alive() && can_engage(catalog, &units[idx]) {
                enemies_in_range(units, idx, rules.melee_range).first().copied()
            } else {
                None
            }
        })
        .collect();

    let mut hits = Vec::new();
    let mut pending: HashMap<usize, i32> = HashMap::new();
    let mut cooldown_updates: Vec<(usize, bool)> = Vec::new();

    for (attacker_idx, target) in targets.iter().enumerate() {
        let Some(defender_idx) = *target else {
            continue;
        };
        let attacker = &units[attacker_idx];
        let defender = &units[defender_idx];
        let attacker_stats = catalog.get(attacker.unit_type);

        if attacker_stats.ability == Some(Ability::Execute) {
            if attacker.ability_cooldown > COOLDOWN_EPSILON {
                continue;
            }
            *pending.entry(defender_idx).or_insert(0) += defender.hp;
            hits.push(Hit {
                attacker_id: attacker.id.clone(),
                defender_id: defender.id.clone(),
                damage: defender.hp,
                executed: true,
            });
            cooldown_updates.push((attacker_idx, true));
            continue;
        }

        if attacker.attack_cooldown > COOLDOWN_EPSILON {
            continue;
        }

        let mut atk = attacker_stats.atk;
        if has_ally_with(units, catalog, attacker_idx, Ability::Synergy, Some(AURA_RANGE)) {
            atk *= 1.0 + SYNERGY_ATTACK_BONUS;
        }
        let victims = if attacker_stats.ability == Some(Ability::Splash) {
            let mut victims = enemies_in_range(units, attacker_idx, rules.melee_range);
            victims.truncate(SPLASH_MAX_TARGETS);
            victims
        } else {
            vec![defender_idx]
        };
        for victim_idx in victims {
            let victim = &units[victim_idx];
            let modifiers = HitModifiers {
                flanking: targets[victim_idx] != Some(attacker_idx),
                first_strike: attacker.first_strike,
                damage_reduction: damage_reduction(units, catalog, victim_idx),
            };
            let result = calculate_damage(
                rules,
                attacker_stats.counter_class,
                catalog.get(victim.unit_type).counter_class,
                atk,
                modifiers,
            );
            *pending.entry(victim_idx).or_insert(0) += result.final_damage;
            hits.push(Hit {
                attacker_id: attacker.id.clone(),
                defender_id: victim.id.clone(),
                damage: result.final_damage,
                executed: false,
            });
        }
        cooldown_updates.push((attacker_idx, false));
    }

    for (idx, ability) in cooldown_updates {
        let unit = &mut units[idx];
        if ability {
            unit.ability_cooldown = EXECUTE_COOLDOWN_SEC;
        } else {
            unit.attack_cooldown += rules.attack_cooldown_sec;
            unit.first_strike = false;
        }
    }
    for hit in &hits {
        if let Some(defender) = units.iter_mut().find(|unit| unit.id == hit.defender_id) {
            defender.last_hit_by = Some(hit.attacker_id.clone());
        }
    }
    for (idx, damage) in pending {
        units[idx].hp = (units[idx].hp - damage).max(0);
    }

    hits
}
