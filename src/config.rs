// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Flowgame Engine - Game Configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

// ---------------------------------------------------------------------------
// GameConfig
// ---------------------------------------------------------------------------

/// Tunables of one game. Every field is optional in the JSON form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Balance each player is reset to at every budget cycle.
    pub money_per_budget_cycle: f64,
    /// Max outflow given to newly created players.
    pub standard_max_player_outflow: f64,
    /// Zero-rate placeholder pledges handed to a new player.
    pub policies_per_player: usize,
    /// Seed for goal/policy assignment and id/token generation.
    pub seed: u64,
    /// Wall-clock spacing between ticks for an external scheduler.
    pub tick_interval_secs: u64,
    /// Replenish budgets every N ticks, 0 = never.
    pub budget_cycle_ticks: u64,
    /// Cumulative conservation error that halts ticking.
    pub conservation_threshold: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            money_per_budget_cycle: 150_000.0,
            standard_max_player_outflow: 100.0,
            policies_per_player: 5,
            seed: 0,
            tick_interval_secs: 3,
            budget_cycle_ticks: 0,
            conservation_threshold: 0.01,
        }
    }
}

impl GameConfig {
    pub fn from_json_str(json: &str) -> EngineResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    fn validate(&self) -> EngineResult<()> {
        if !self.money_per_budget_cycle.is_finite() || self.money_per_budget_cycle < 0.0 {
            return Err(EngineError::Config(format!(
                "money_per_budget_cycle must be >= 0, got {}",
                self.money_per_budget_cycle
            )));
        }
        if !self.standard_max_player_outflow.is_finite() || self.standard_max_player_outflow < 0.0 {
            return Err(EngineError::Config(format!(
                "standard_max_player_outflow must be >= 0, got {}",
                self.standard_max_player_outflow
            )));
        }
        if self.conservation_threshold.is_nan() || self.conservation_threshold <= 0.0 {
            return Err(EngineError::Config(format!(
                "conservation_threshold must be > 0, got {}",
                self.conservation_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config = GameConfig::from_json_str(r#"{"seed": 42, "policies_per_player": 2}"#)
            .expect("test: parse");
        assert_eq!(config.seed, 42);
        assert_eq!(config.policies_per_player, 2);
        assert_eq!(config.money_per_budget_cycle, 150_000.0);
        assert_eq!(config.standard_max_player_outflow, 100.0);
        assert_eq!(config.tick_interval_secs, 3);
    }

    #[test]
    fn empty_object_is_default() {
        let config = GameConfig::from_json_str("{}").expect("test: parse");
        assert_eq!(config, GameConfig::default());
    }

    #[test]
    fn rejects_bad_values() {
        let err = GameConfig::from_json_str(r#"{"money_per_budget_cycle": -1}"#);
        assert!(matches!(err, Err(EngineError::Config(_))), "expected Config, got {err:?}");
        assert!(GameConfig::from_json_str(r#"{"conservation_threshold": 0}"#).is_err());
        assert!(GameConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = GameConfig::from_path("/nonexistent/flowgame.json");
        assert!(matches!(err, Err(EngineError::Config(_))));
    }
}
