//! Engine configuration loaded from TOML.
//!
//! Every field carries a default, so an empty file (or no file at all) yields
//! the standard engine: takeout 0.30, 0.10 per line, no rollover, own stake
//! included in the pool, multiplier 1, automatic pool share, `top_n` 10.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::core::allocation::AllocationParams;
use crate::core::permutations::{PermutationEnumerator, DEFAULT_TOP_N};
use crate::core::screen::ScreenConfig;
use crate::core::strength::{StrengthAdjustments, StrengthEstimator, StrengthPolicy};
use crate::core::viability::{PoolEconomics, ViabilityCalculator};
use crate::error::{validate_fraction, validate_non_negative, validate_top_n, EngineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumerationConfig {
    pub top_n: usize,
    pub policy: StrengthPolicy,
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            policy: StrengthPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestDefaults {
    pub coverage_fraction: f64,
    /// Flat stake on the top-ranked line
    pub unit_stake: f64,
    pub grid_steps: usize,
}

impl Default for BacktestDefaults {
    fn default() -> Self {
        Self {
            coverage_fraction: 0.10,
            unit_stake: 1.0,
            grid_steps: 20,
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub enumeration: EnumerationConfig,
    pub economics: PoolEconomics,
    pub allocation: AllocationParams,
    pub adjustments: StrengthAdjustments,
    pub screen: ScreenConfig,
    pub backtest: BacktestDefaults,
    /// Applied on load, overriding `allocation` and the adjustment counts
    pub preset: Option<RiskPreset>,
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let mut config: EngineConfig = toml::from_str(contents)?;
        if let Some(preset) = config.preset {
            preset.apply(&mut config);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_top_n(self.enumeration.top_n)?;
        self.economics.validate()?;
        self.allocation.validate()?;
        validate_fraction("backtest.coverage_fraction", self.backtest.coverage_fraction)?;
        validate_non_negative("backtest.unit_stake", self.backtest.unit_stake)?;
        if self.backtest.grid_steps == 0 {
            return Err(EngineError::InvalidParameter(
                "backtest.grid_steps must be at least 1".to_string(),
            ));
        }
        if self.screen.min_competitors > self.screen.max_competitors {
            return Err(EngineError::InvalidParameter(format!(
                "screen.min_competitors ({}) exceeds screen.max_competitors ({})",
                self.screen.min_competitors, self.screen.max_competitors
            )));
        }
        Ok(())
    }

    pub fn with_preset(mut self, preset: RiskPreset) -> Self {
        preset.apply(&mut self);
        self
    }

    pub fn estimator(&self) -> StrengthEstimator {
        StrengthEstimator::new(self.enumeration.policy).with_adjustments(self.adjustments.clone())
    }

    pub fn enumerator(&self) -> Result<PermutationEnumerator> {
        PermutationEnumerator::new(self.enumeration.top_n)
    }

    /// Calculator for `economics` (typically built from a market snapshot)
    pub fn calculator(&self, economics: PoolEconomics) -> Result<ViabilityCalculator> {
        ViabilityCalculator::new(economics)?.with_allocation(self.allocation.clone())
    }
}

/// Named starting points for the advanced-mode knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskPreset {
    Conservative,
    Balanced,
    Aggressive,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetProfile {
    pub concentration: f64,
    pub market_inefficiency: f64,
    pub key_count: usize,
    pub poor_count: usize,
    /// Target profit as a percentage of total stake
    pub desired_profit_pct: f64,
    /// Share of the bank committed to one market
    pub bankroll_pct: f64,
    pub min_stake_per_line: f64,
}

/// Budget and per-line stake for one market, derived from a bank
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StakePlan {
    pub bank: f64,
    pub budget: f64,
    pub total_lines: usize,
    pub stake_per_line: f64,
    pub target_profit: f64,
}

impl PresetProfile {
    /// Spread `bank × bankroll_pct` over every enumerated line.
    ///
    /// The per-line stake never drops below `min_stake_per_line`, so a small
    /// bank can commit more than its budget.
    pub fn plan(&self, bank: f64, total_lines: usize) -> Result<StakePlan> {
        validate_non_negative("bank", bank)?;
        let budget = bank * self.bankroll_pct;
        if budget <= 0.0 {
            return Err(EngineError::InvalidParameter(format!(
                "bankroll allocation must be positive, got {}",
                budget
            )));
        }
        if total_lines == 0 {
            return Err(EngineError::InvalidParameter(
                "stake plan needs at least one line".to_string(),
            ));
        }

        let stake_per_line = (budget / total_lines as f64).max(self.min_stake_per_line);
        Ok(StakePlan {
            bank,
            budget,
            total_lines,
            stake_per_line,
            target_profit: budget * self.desired_profit_pct / 100.0,
        })
    }
}

impl RiskPreset {
    pub fn profile(self) -> PresetProfile {
        match self {
            RiskPreset::Conservative => PresetProfile {
                concentration: 0.15,
                market_inefficiency: 0.05,
                key_count: 1,
                poor_count: 1,
                desired_profit_pct: 12.0,
                bankroll_pct: 0.02,
                min_stake_per_line: 0.10,
            },
            RiskPreset::Balanced => PresetProfile {
                concentration: 0.25,
                market_inefficiency: 0.08,
                key_count: 2,
                poor_count: 1,
                desired_profit_pct: 25.0,
                bankroll_pct: 0.03,
                min_stake_per_line: 0.10,
            },
            RiskPreset::Aggressive => PresetProfile {
                concentration: 0.40,
                market_inefficiency: 0.12,
                key_count: 3,
                poor_count: 0,
                desired_profit_pct: 40.0,
                bankroll_pct: 0.05,
                min_stake_per_line: 0.0,
            },
        }
    }

    pub fn allocation(self) -> AllocationParams {
        let p = self.profile();
        AllocationParams::from_concentration(p.concentration, p.market_inefficiency)
    }

    pub fn apply(self, config: &mut EngineConfig) {
        let p = self.profile();
        config.allocation = self.allocation();
        config.adjustments.key_count = p.key_count;
        config.adjustments.poor_count = p.poor_count;
        config.preset = Some(self);
    }
}

impl FromStr for RiskPreset {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conservative" => Ok(RiskPreset::Conservative),
            "balanced" => Ok(RiskPreset::Balanced),
            "aggressive" => Ok(RiskPreset::Aggressive),
            other => Err(EngineError::InvalidParameter(format!(
                "unknown risk preset: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for RiskPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskPreset::Conservative => "conservative",
            RiskPreset::Balanced => "balanced",
            RiskPreset::Aggressive => "aggressive",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::allocation::ImpactBasis;
    use std::io::Write;

    #[test]
    fn test_empty_config_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.enumeration.top_n, 10);
        assert_eq!(config.economics.takeout, 0.30);
        assert_eq!(config.economics.stake_per_line, 0.10);
        assert_eq!(config.economics.rollover, 0.0);
        assert!(config.economics.include_self);
        assert_eq!(config.economics.dividend_multiplier, 1.0);
        assert!(config.economics.pool_share_override.is_none());
        assert_eq!(config.adjustments.key_multiplier, 1.2);
        assert_eq!(config.screen.max_competitors, 20);
        assert!(config.preset.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config = EngineConfig::from_toml_str(
            r#"
            [enumeration]
            top_n = 8
            policy = "odds_only"

            [economics]
            takeout = 0.25
            pool_share_override = 0.4

            [allocation]
            gamma = 2.0
            impact_basis = "line_probability"
            "#,
        )
        .unwrap();

        assert_eq!(config.enumeration.top_n, 8);
        assert_eq!(config.enumeration.policy, StrengthPolicy::OddsOnly);
        assert_eq!(config.economics.takeout, 0.25);
        assert_eq!(config.economics.stake_per_line, 0.10);
        assert_eq!(config.economics.pool_share_override, Some(0.4));
        assert_eq!(config.allocation.gamma, 2.0);
        assert_eq!(config.allocation.beta, 1.0);
        assert_eq!(config.allocation.impact_basis, ImpactBasis::LineProbability);
    }

    #[test]
    fn test_preset_in_file() {
        let config = EngineConfig::from_toml_str("preset = \"aggressive\"").unwrap();
        assert!((config.allocation.gamma - 1.8).abs() < 1e-12);
        assert!((config.allocation.beta - 0.928).abs() < 1e-12);
        assert_eq!(config.adjustments.key_count, 3);
        assert_eq!(config.adjustments.poor_count, 0);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(EngineConfig::from_toml_str("[economics]\ntakeout = 1.5").is_err());
        assert!(EngineConfig::from_toml_str("[enumeration]\ntop_n = 3").is_err());
        assert!(EngineConfig::from_toml_str("[backtest]\ncoverage_fraction = 2.0").is_err());
        assert!(EngineConfig::from_toml_str("[economics]\ntakeout = \"high\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[backtest]\ncoverage_fraction = 0.25\nunit_stake = 2.0").unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.backtest.coverage_fraction, 0.25);
        assert_eq!(config.backtest.unit_stake, 2.0);

        assert!(EngineConfig::load("/nonexistent/engine.toml").is_err());
    }

    #[test]
    fn test_preset_parse_and_profiles() {
        assert_eq!("Balanced".parse::<RiskPreset>().unwrap(), RiskPreset::Balanced);
        assert!("reckless".parse::<RiskPreset>().is_err());

        let balanced = RiskPreset::Balanced.allocation();
        assert!((balanced.gamma - 1.5).abs() < 1e-12);
        assert_eq!(balanced.impact_basis, ImpactBasis::CompetitorOdds);

        let config = EngineConfig::default().with_preset(RiskPreset::Conservative);
        assert_eq!(config.adjustments.key_count, 1);
        assert_eq!(config.adjustments.poor_count, 1);
        assert!(config.validate().is_ok());
        assert_eq!(RiskPreset::Conservative.to_string(), "conservative");
    }

    #[test]
    fn test_stake_plan_spreads_budget() {
        // 1000 × 3% = 30 over 120 lines
        let plan = RiskPreset::Balanced.profile().plan(1_000.0, 120).unwrap();
        assert!((plan.budget - 30.0).abs() < 1e-9);
        assert!((plan.stake_per_line - 0.25).abs() < 1e-12);
        assert!((plan.target_profit - 7.5).abs() < 1e-9);
        assert_eq!(plan.total_lines, 120);
    }

    #[test]
    fn test_stake_plan_min_stake_per_line() {
        // 100 × 2% = 2 over 120 lines is below the 0.10 floor
        let plan = RiskPreset::Conservative.profile().plan(100.0, 120).unwrap();
        assert_eq!(plan.stake_per_line, 0.10);
        assert!((plan.budget - 2.0).abs() < 1e-12);

        // aggressive has no floor
        let plan = RiskPreset::Aggressive.profile().plan(100.0, 120).unwrap();
        assert!((plan.stake_per_line - 5.0 / 120.0).abs() < 1e-12);
    }

    #[test]
    fn test_stake_plan_rejects_empty_budget() {
        let profile = RiskPreset::Balanced.profile();
        assert!(profile.plan(0.0, 120).is_err());
        assert!(profile.plan(-50.0, 120).is_err());
        assert!(profile.plan(1_000.0, 0).is_err());
    }
}
