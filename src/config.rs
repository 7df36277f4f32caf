//! Balance configuration, fixed for the lifetime of a session.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::UnitCatalog;
use crate::constants::{
    ADVANTAGE_MULTIPLIER, ATTACK_COOLDOWN_SEC, ATTACK_RANGE_MELEE, BASE_PRODUCTION_RATES,
    CAPTURE_BONUS_MULTIPLIER, CAPTURE_RADIUS, DISADVANTAGE_MULTIPLIER, FLANK_BONUS,
    MAX_UNITS_PER_PLAYER, NEUTRAL_MULTIPLIER, RESOURCE_CAP, ROUND_DURATION_SEC,
    STARTING_RESOURCES, TICK_RATE,
};
use crate::error::ConfigError;
use crate::types::{CounterRelation, Resources, TieBreak};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterMultipliers {
    pub advantage: f32,
    pub neutral: f32,
    pub disadvantage: f32,
}

impl CounterMultipliers {
    pub fn get(&self, relation: CounterRelation) -> f32 {
        match relation {
            CounterRelation::Advantage => self.advantage,
            CounterRelation::Neutral => self.neutral,
            CounterRelation::Disadvantage => self.disadvantage,
        }
    }
}

impl Default for CounterMultipliers {
    fn default() -> Self {
        Self {
            advantage: ADVANTAGE_MULTIPLIER,
            neutral: NEUTRAL_MULTIPLIER,
            disadvantage: DISADVANTAGE_MULTIPLIER,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub tick_rate: u32,
    pub round_duration_sec: f32,
    pub resource_cap: f32,
    pub starting_resources: Resources,
    pub base_production: Resources,
    pub capture_bonus_multiplier: f32,
    pub max_units_per_player: usize,
    pub upkeep_enabled: bool,
    pub counter_multipliers: CounterMultipliers,
    pub flank_bonus: f32,
    pub melee_range: f32,
    pub attack_cooldown_sec: f32,
    pub capture_radius: f32,
    pub tie_break: TieBreak,
    /// Grid cells units cannot route through, as `[x, y]` pairs.
    pub blocked_cells: Vec<[i32; 2]>,
    pub units: UnitCatalog,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_rate: TICK_RATE,
            round_duration_sec: ROUND_DURATION_SEC,
            resource_cap: RESOURCE_CAP,
            starting_resources: STARTING_RESOURCES,
            base_production: BASE_PRODUCTION_RATES,
            capture_bonus_multiplier: CAPTURE_BONUS_MULTIPLIER,
            max_units_per_player: MAX_UNITS_PER_PLAYER,
            upkeep_enabled: true,
            counter_multipliers: CounterMultipliers::default(),
            flank_bonus: FLANK_BONUS,
            melee_range: ATTACK_RANGE_MELEE,
            attack_cooldown_sec: ATTACK_COOLDOWN_SEC,
            capture_radius: CAPTURE_RADIUS,
            tie_break: TieBreak::default(),
            blocked_cells: Vec::new(),
            units: UnitCatalog::default(),
        }
    }
}

impl GameConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: GameConfig = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise the default balance.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn tick_ms(&self) -> u64 {
        1000 / u64::from(self.tick_rate)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 || self.tick_rate > 1000 {
            return Err(invalid("tick_rate", "must be within 1..=1000"));
        }
        if !(self.round_duration_sec.is_finite() && self.round_duration_sec > 0.0) {
            return Err(invalid("round_duration_sec", "must be a positive number"));
        }
        if !(self.resource_cap.is_finite() && self.resource_cap > 0.0) {
            return Err(invalid("resource_cap", "must be a positive number"));
        }
        if !self
            .starting_resources
            .iter()
            .all(|value| value.is_finite() && (0.0..=self.resource_cap).contains(&value))
        {
            return Err(invalid("starting_resources", "must lie within [0, resource_cap]"));
        }
        if !self
            .base_production
            .iter()
            .all(|value| value.is_finite() && value >= 0.0)
        {
            return Err(invalid("base_production", "must be non-negative"));
        }
        ensure_non_negative("capture_bonus_multiplier", self.capture_bonus_multiplier)?;
        ensure_non_negative("flank_bonus", self.flank_bonus)?;
        ensure_positive("melee_range", self.melee_range)?;
        ensure_positive("attack_cooldown_sec", self.attack_cooldown_sec)?;
        ensure_positive("capture_radius", self.capture_radius)?;
        let multipliers = self.counter_multipliers;
        ensure_positive("counter_multipliers.advantage", multipliers.advantage)?;
        ensure_positive("counter_multipliers.neutral", multipliers.neutral)?;
        ensure_positive("counter_multipliers.disadvantage", multipliers.disadvantage)?;
        if self.max_units_per_player == 0 {
            return Err(invalid("max_units_per_player", "must be at least 1"));
        }
        for (kind, stats) in self.units.iter() {
            let valid = stats.hp > 0
                && stats.atk.is_finite()
                && stats.atk >= 0.0
                && stats.speed.is_finite()
                && stats.speed >= 0.0
                && stats.upkeep.is_finite()
                && stats.upkeep >= 0.0
                && stats.cost.iter().all(|value| value.is_finite() && value >= 0.0);
            if !valid {
                return Err(ConfigError::Invalid {
                    field: "units",
                    reason: format!("{} has out-of-range stats", kind.as_str()),
                });
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

fn ensure_positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, "must be a positive number"))
    }
}

fn ensure_non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, "must be non-negative"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UnitType;

    #[test]
    fn default_config_is_valid() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_ms(), 50);
        assert_eq!(config.round_duration_sec, 900.0);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: GameConfig = toml::from_str(
            r#"
            round_duration_sec = 120.0
            tie_break = "draw"

            [units.html_soldier]
            tier = 1
            role = "tank"
            counterClass = "html"
            hp = 150
            atk = 9.0
            speed = 1.0
            upkeep = 0.3
            cost = { html = 25.0 }
            "#,
        )
        .expect("partial config should parse");

        assert_eq!(config.round_duration_sec, 120.0);
        assert_eq!(config.tie_break, TieBreak::Draw);
        assert_eq!(config.resource_cap, RESOURCE_CAP);
        let soldier = config.units.get(UnitType::HtmlSoldier);
        assert_eq!(soldier.hp, 150);
        assert_eq!(soldier.cost, Resources::new(25.0, 0.0, 0.0));
        assert_eq!(config.units.get(UnitType::JsStriker).hp, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_tick_rate_is_rejected() {
        let config = GameConfig {
            tick_rate: 0,
            ..GameConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "tick_rate",
                ..
            })
        ));
    }

    #[test]
    fn starting_resources_above_cap_are_rejected() {
        let config = GameConfig {
            starting_resources: Resources::new(600.0, 0.0, 0.0),
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let result = GameConfig::load(Path::new("/nonexistent/craft-war.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
