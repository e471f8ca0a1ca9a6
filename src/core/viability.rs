//! Pari-mutuel Viability
//!
//! Expected value of buying the `M` most probable of `C` lines in a
//! superfecta pool, with break-even thresholds.
//!
//! ```text
//!     stake          = M * l
//!     pool_after_bet = mult * ((1 - t) * (O + stake_if_included) + R)
//!     f_auto         = C*l / (C*l + O)
//!     expected_return = (M / C) * f * pool_after_bet
//! ```
//!
//! Where:
//!     l = stake per line, t = takeout, O = other bettors' gross pool,
//!     R = rollover, f = pool share (override or f_auto)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::allocation::{evaluate_advanced, AdvancedScenario, AllocationParams};
use super::permutations::{lines_for_coverage, RankedLines};
use crate::error::{validate_fraction, validate_non_negative, validate_takeout, EngineError, Result};
use crate::models::{Market, PoolSnapshot, ViabilityScenario};

/// Pool economics for one evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolEconomics {
    pub stake_per_line: f64,
    pub takeout: f64,
    pub rollover: f64,
    /// Whether our own stake joins the pool before takeout
    pub include_self: bool,
    pub dividend_multiplier: f64,
    /// Fixed pool share instead of `f_auto`
    pub pool_share_override: Option<f64>,
    /// Other bettors' gross pool
    pub others_pool: f64,
}

impl Default for PoolEconomics {
    fn default() -> Self {
        Self {
            stake_per_line: 0.10,
            takeout: 0.30,
            rollover: 0.0,
            include_self: true,
            dividend_multiplier: 1.0,
            pool_share_override: None,
            others_pool: 0.0,
        }
    }
}

impl PoolEconomics {
    pub fn validate(&self) -> Result<()> {
        validate_non_negative("stake_per_line", self.stake_per_line)?;
        validate_takeout(self.takeout)?;
        validate_non_negative("rollover", self.rollover)?;
        validate_non_negative("others_pool", self.others_pool)?;
        if !self.dividend_multiplier.is_finite() || self.dividend_multiplier <= 0.0 {
            return Err(EngineError::InvalidParameter(format!(
                "dividend_multiplier must be positive, got {}",
                self.dividend_multiplier
            )));
        }
        if let Some(f) = self.pool_share_override {
            validate_fraction("pool_share_override", f)?;
        }
        Ok(())
    }

    pub fn with_others_pool(mut self, others_pool: f64) -> Self {
        self.others_pool = others_pool;
        self
    }

    pub fn with_pool_share(mut self, share: Option<f64>) -> Self {
        self.pool_share_override = share;
        self
    }

    /// Take pool size, rollover and takeout from a snapshot, the rest from `defaults`
    pub fn from_snapshot(snapshot: &PoolSnapshot, defaults: &PoolEconomics) -> Self {
        let takeout = if (0.0..=1.0).contains(&snapshot.takeout) {
            snapshot.takeout
        } else {
            defaults.takeout
        };
        Self {
            takeout,
            rollover: snapshot.rollover.max(0.0),
            others_pool: snapshot.gross.max(0.0),
            ..defaults.clone()
        }
    }

    /// Economics from the market's latest snapshot, or the latest at/before `as_of`
    pub fn for_market(
        market: &Market,
        as_of: Option<DateTime<Utc>>,
        defaults: &PoolEconomics,
    ) -> Result<Self> {
        let snapshot = match as_of {
            Some(ts) => market.pool_as_of(ts),
            None => market.latest_pool(),
        };
        snapshot
            .map(|s| Self::from_snapshot(s, defaults))
            .ok_or_else(|| {
                EngineError::Malformed(format!("market {} has no pool snapshot", market.id))
            })
    }

    /// Our stake as it enters the pool (0 unless `include_self`)
    fn included_stake(&self, stake: f64) -> f64 {
        if self.include_self {
            stake
        } else {
            0.0
        }
    }

    pub fn pool_after_bet(&self, stake: f64) -> f64 {
        self.dividend_multiplier
            * ((1.0 - self.takeout) * (self.others_pool + self.included_stake(stake))
                + self.rollover)
    }

    /// Share of a winning line's payout held when every line is bought at `l`
    pub fn auto_pool_share(&self, total_lines: usize) -> f64 {
        let ours = total_lines as f64 * self.stake_per_line;
        let denominator = ours + self.others_pool;
        if total_lines == 0 || denominator <= 0.0 {
            0.0
        } else {
            ours / denominator
        }
    }

    /// Override when set, `f_auto` otherwise
    pub fn pool_share(&self, total_lines: usize) -> f64 {
        self.pool_share_override
            .unwrap_or_else(|| self.auto_pool_share(total_lines))
    }
}

/// Solution of a break-even inversion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Crossing {
    /// Profit changes sign at this value. Which side profits depends on the
    /// solver; see [`ViabilityCalculator::break_even_pool`].
    At(f64),
    AlwaysPositive,
    NeverPositive,
    /// Profit is identically zero, or there is nothing to stake
    Undefined,
}

impl Crossing {
    pub fn value(&self) -> Option<f64> {
        match self {
            Crossing::At(x) => Some(*x),
            _ => None,
        }
    }

    fn from_sign(k: f64) -> Self {
        if k > 0.0 {
            Crossing::AlwaysPositive
        } else if k < 0.0 {
            Crossing::NeverPositive
        } else {
            Crossing::Undefined
        }
    }
}

/// How a coverage level is priced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Uniform stake per line, one pool share
    #[default]
    Basic,
    /// Concentrated stakes with per-line market impact
    Advanced,
}

/// Basic-mode scenario from counts alone
pub fn basic_scenario(
    economics: &PoolEconomics,
    lines_covered: usize,
    total_lines: usize,
    hit_probability: f64,
) -> ViabilityScenario {
    let coverage_fraction = if total_lines == 0 {
        0.0
    } else {
        lines_covered as f64 / total_lines as f64
    };
    let total_stake = lines_covered as f64 * economics.stake_per_line;
    let pool_after_bet = economics.pool_after_bet(total_stake);
    let pool_share = economics.pool_share(total_lines);
    let expected_return = coverage_fraction * pool_share * pool_after_bet;
    let expected_profit = expected_return - total_stake;

    ViabilityScenario {
        coverage_fraction,
        lines_covered,
        total_lines,
        total_stake,
        pool_after_bet,
        pool_share,
        expected_return,
        expected_profit,
        viable: expected_profit > 0.0,
        hit_probability,
    }
}

/// Viability calculator for one market's economics
#[derive(Debug, Clone)]
pub struct ViabilityCalculator {
    pub economics: PoolEconomics,
    pub allocation: AllocationParams,
}

impl ViabilityCalculator {
    pub fn new(economics: PoolEconomics) -> Result<Self> {
        economics.validate()?;
        Ok(Self {
            economics,
            allocation: AllocationParams::default(),
        })
    }

    pub fn with_allocation(mut self, allocation: AllocationParams) -> Result<Self> {
        allocation.validate()?;
        self.allocation = allocation;
        Ok(self)
    }

    /// Basic mode for the top `lines_covered` lines
    pub fn evaluate_basic(&self, lines: &RankedLines, lines_covered: usize) -> Result<ViabilityScenario> {
        check_lines_covered(lines, lines_covered)?;
        Ok(basic_scenario(
            &self.economics,
            lines_covered,
            lines.len(),
            lines.cumulative_at(lines_covered),
        ))
    }

    /// Basic mode at coverage fraction `alpha` (quantized to M/C)
    pub fn evaluate_basic_fraction(&self, lines: &RankedLines, alpha: f64) -> Result<ViabilityScenario> {
        validate_fraction("coverage_fraction", alpha)?;
        self.evaluate_basic(lines, lines.lines_for_coverage(alpha))
    }

    pub fn evaluate_advanced(&self, lines: &RankedLines, lines_covered: usize) -> Result<AdvancedScenario> {
        check_lines_covered(lines, lines_covered)?;
        Ok(evaluate_advanced(
            &self.economics,
            &self.allocation,
            lines,
            lines_covered,
        ))
    }

    pub fn evaluate_advanced_fraction(&self, lines: &RankedLines, alpha: f64) -> Result<AdvancedScenario> {
        validate_fraction("coverage_fraction", alpha)?;
        self.evaluate_advanced(lines, lines.lines_for_coverage(alpha))
    }

    /// Scenario in either mode (staking plan dropped for advanced)
    pub fn evaluate(&self, lines: &RankedLines, lines_covered: usize, mode: EvaluationMode) -> Result<ViabilityScenario> {
        match mode {
            EvaluationMode::Basic => self.evaluate_basic(lines, lines_covered),
            EvaluationMode::Advanced => Ok(self.evaluate_advanced(lines, lines_covered)?.scenario),
        }
    }

    /// Scenarios at coverage `i/steps` for `i = 1..=steps`
    pub fn grid(&self, lines: &RankedLines, steps: usize, mode: EvaluationMode) -> Result<Vec<ViabilityScenario>> {
        grid_line_counts(lines.len(), steps)?
            .into_iter()
            .map(|m| self.evaluate(lines, m, mode))
            .collect()
    }

    pub fn basic_grid(&self, lines: &RankedLines, steps: usize) -> Result<Vec<ViabilityScenario>> {
        self.grid(lines, steps, EvaluationMode::Basic)
    }

    pub fn advanced_grid(&self, lines: &RankedLines, steps: usize) -> Result<Vec<ViabilityScenario>> {
        self.grid(lines, steps, EvaluationMode::Advanced)
    }

    /// Grid scenario with the highest expected profit (first on ties)
    pub fn optimal_coverage(
        &self,
        lines: &RankedLines,
        steps: usize,
        mode: EvaluationMode,
    ) -> Result<Option<ViabilityScenario>> {
        let grid = self.grid(lines, steps, mode)?;
        let best = grid.into_iter().fold(None, |best: Option<ViabilityScenario>, s| match best {
            Some(b) if b.expected_profit >= s.expected_profit => Some(b),
            _ => Some(s),
        });
        if let Some(b) = &best {
            debug!(
                market_id = %lines.market_id,
                lines_covered = b.lines_covered,
                expected_profit = b.expected_profit,
                "optimal coverage"
            );
        }
        Ok(best)
    }

    /// Smallest grid coverage whose expected profit reaches `target`
    pub fn first_reaching_profit(
        &self,
        lines: &RankedLines,
        steps: usize,
        mode: EvaluationMode,
        target: f64,
    ) -> Result<Option<ViabilityScenario>> {
        Ok(self
            .grid(lines, steps, mode)?
            .into_iter()
            .find(|s| s.expected_profit >= target))
    }

    /// Other-bettor pool `O` at which full coverage breaks even.
    ///
    /// With a fixed share, or an automatic share with `m(1-t) > 1`, the
    /// crossing is the smallest profitable pool. With an automatic share and
    /// `m(1-t) < 1` more outside money dilutes our share faster than it grows
    /// the payout, so the crossing is the largest profitable pool.
    pub fn break_even_pool(&self, total_lines: usize) -> Crossing {
        let e = &self.economics;
        let full_stake = total_lines as f64 * e.stake_per_line;
        if full_stake <= 0.0 {
            return Crossing::Undefined;
        }
        let m = e.dividend_multiplier;
        let net = 1.0 - e.takeout;
        let included = e.included_stake(full_stake);

        match e.pool_share_override {
            Some(f) => {
                // profit(O) = f*m*(1-t)*O + f*m*((1-t)*S_inc + R) - C*l
                let slope = f * m * net;
                let constant = f * m * (net * included + e.rollover) - full_stake;
                if slope > 0.0 {
                    let x = -constant / slope;
                    if x < 0.0 {
                        Crossing::AlwaysPositive
                    } else {
                        Crossing::At(x)
                    }
                } else {
                    Crossing::from_sign(constant)
                }
            }
            None => {
                // sign(profit) = sign(a*O + b); m*((1-t)(O+S_inc)+R) = C*l + O at the root
                let a = m * net - 1.0;
                let b = m * (net * included + e.rollover) - full_stake;
                if a == 0.0 {
                    return Crossing::from_sign(b);
                }
                let x = -b / a;
                if a > 0.0 {
                    if x <= 0.0 {
                        Crossing::AlwaysPositive
                    } else {
                        Crossing::At(x)
                    }
                } else if x <= 0.0 {
                    Crossing::NeverPositive
                } else {
                    Crossing::At(x)
                }
            }
        }
    }

    /// Smallest coverage fraction in (0, 1] with positive profit for the current pool
    pub fn min_coverage_fraction(&self, total_lines: usize) -> Crossing {
        let e = &self.economics;
        let full_stake = total_lines as f64 * e.stake_per_line;
        if full_stake <= 0.0 {
            return Crossing::Undefined;
        }
        let f = e.pool_share(total_lines);
        let m = e.dividend_multiplier;
        let net = 1.0 - e.takeout;

        // profit(alpha) = alpha * (k1 + k2 * alpha)
        let k2 = if e.include_self {
            f * m * net * full_stake
        } else {
            0.0
        };
        let k1 = f * m * (net * e.others_pool + e.rollover) - full_stake;

        if k2 > 0.0 {
            let alpha = -k1 / k2;
            if alpha <= 0.0 {
                Crossing::AlwaysPositive
            } else if alpha >= 1.0 {
                Crossing::NeverPositive
            } else {
                Crossing::At(alpha)
            }
        } else {
            Crossing::from_sign(k1)
        }
    }
}

fn check_lines_covered(lines: &RankedLines, lines_covered: usize) -> Result<()> {
    if lines_covered > lines.len() {
        return Err(EngineError::InvalidParameter(format!(
            "cannot cover {} of {} lines",
            lines_covered,
            lines.len()
        )));
    }
    Ok(())
}

/// Line counts for the coverage grid `i/steps`, `i = 1..=steps`
pub fn grid_line_counts(total_lines: usize, steps: usize) -> Result<Vec<usize>> {
    if steps == 0 {
        return Err(EngineError::InvalidParameter(
            "grid needs at least one step".to_string(),
        ));
    }
    Ok((1..=steps)
        .map(|i| lines_for_coverage(total_lines, i as f64 / steps as f64))
        .collect())
}
