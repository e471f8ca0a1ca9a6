//! Advanced Stake Allocation
//!
//! Non-uniform staking across covered lines together with an estimate of how
//! the rest of the market spreads its money over all lines.
//!
//! ```text
//!     stake_i  = M*l * p_i^gamma / sum(p_j^gamma)         (covered lines)
//!     others_i = O*(1-mi) * q_i / sum(q_j)                (all C lines)
//!     f_i      = stake_i / (stake_i + others_i)
//!     expected_return = sum(p_i * f_i) * pool_after_bet
//! ```
//!
//! Where:
//!     q_i = p_i^beta                        (LineProbability)
//!     q_i = prod_k implied_k^beta           (CompetitorOdds)

use serde::{Deserialize, Serialize};

use super::permutations::RankedLines;
use super::viability::PoolEconomics;
use crate::error::{validate_non_negative, EngineError, Result};
use crate::models::{CompetitorId, ViabilityScenario, LINE_DEPTH};

/// What drives the other bettors' money per line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactBasis {
    LineProbability,
    #[default]
    CompetitorOdds,
}

/// Advanced-mode tuning knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationParams {
    /// Stake concentration exponent (0 = uniform)
    pub gamma: f64,
    /// Market impact exponent (0 = others spread uniformly)
    pub beta: f64,
    pub impact_basis: ImpactBasis,
    /// Share of other money assumed not to compete on modelled lines
    pub market_inefficiency: f64,
}

impl Default for AllocationParams {
    fn default() -> Self {
        Self {
            gamma: 1.0,
            beta: 1.0,
            impact_basis: ImpactBasis::CompetitorOdds,
            market_inefficiency: 0.0,
        }
    }
}

impl AllocationParams {
    /// Exponents that reproduce basic mode
    pub fn uniform() -> Self {
        Self {
            gamma: 0.0,
            beta: 0.0,
            impact_basis: ImpactBasis::LineProbability,
            market_inefficiency: 0.0,
        }
    }

    /// gamma = 1 + 2c, beta = max(0.1, 1 - 0.6 mi)
    pub fn from_concentration(concentration: f64, market_inefficiency: f64) -> Self {
        Self {
            gamma: 1.0 + 2.0 * concentration,
            beta: (1.0 - 0.6 * market_inefficiency).max(0.1),
            impact_basis: ImpactBasis::CompetitorOdds,
            market_inefficiency,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_non_negative("gamma", self.gamma)?;
        validate_non_negative("beta", self.beta)?;
        if !(0.0..1.0).contains(&self.market_inefficiency) {
            return Err(EngineError::InvalidParameter(format!(
                "market_inefficiency must be in [0, 1), got {}",
                self.market_inefficiency
            )));
        }
        Ok(())
    }
}

/// One row of the staking plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineStake {
    pub rank: usize,
    pub competitors: [CompetitorId; LINE_DEPTH],
    pub probability: f64,
    pub stake: f64,
    pub others_money: f64,
    pub pool_share: f64,
}

/// Advanced scenario plus the plan behind it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedScenario {
    pub scenario: ViabilityScenario,
    pub plan: Vec<LineStake>,
}

/// Weights normalized to sum to `budget`; uniform when they sum to zero
fn spread(budget: f64, weights: &[f64]) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    if total > 0.0 && total.is_finite() {
        weights.iter().map(|w| budget * w / total).collect()
    } else if weights.is_empty() {
        Vec::new()
    } else {
        vec![budget / weights.len() as f64; weights.len()]
    }
}

fn impact_weights(lines: &RankedLines, params: &AllocationParams) -> Vec<f64> {
    match params.impact_basis {
        ImpactBasis::LineProbability => lines
            .lines
            .iter()
            .map(|l| l.probability.max(0.0).powf(params.beta))
            .collect(),
        ImpactBasis::CompetitorOdds => (0..lines.len())
            .map(|i| match lines.line_candidates(i) {
                Some(candidates) => candidates
                    .iter()
                    .map(|c| lines.implied_probability(c).powf(params.beta))
                    .product(),
                None => 0.0,
            })
            .collect(),
    }
}

/// Price the top `lines_covered` lines under `params`
///
/// Callers are expected to have validated `lines_covered <= lines.len()`.
pub fn evaluate_advanced(
    economics: &PoolEconomics,
    params: &AllocationParams,
    lines: &RankedLines,
    lines_covered: usize,
) -> AdvancedScenario {
    let total_lines = lines.len();
    let covered = lines.covered(lines_covered);
    let budget = covered.len() as f64 * economics.stake_per_line;

    let stake_weights: Vec<f64> = covered
        .iter()
        .map(|l| l.probability.max(0.0).powf(params.gamma))
        .collect();
    let stakes = spread(budget, &stake_weights);

    let effective_others = economics.others_pool * (1.0 - params.market_inefficiency);
    let others = spread(effective_others, &impact_weights(lines, params));

    let pool_after_bet = economics.pool_after_bet(budget);

    let mut plan = Vec::with_capacity(covered.len());
    let mut hit_probability = 0.0;
    let mut weighted_share = 0.0;
    for (i, line) in covered.iter().enumerate() {
        let stake = stakes[i];
        let others_money = others[i];
        let pool_share = match economics.pool_share_override {
            Some(f) => f,
            None if stake + others_money > 0.0 => stake / (stake + others_money),
            None => 0.0,
        };
        hit_probability += line.probability;
        weighted_share += line.probability * pool_share;
        plan.push(LineStake {
            rank: line.rank,
            competitors: line.competitors.clone(),
            probability: line.probability,
            stake,
            others_money,
            pool_share,
        });
    }

    let expected_return = weighted_share * pool_after_bet;
    let expected_profit = expected_return - budget;
    let pool_share = if hit_probability > 0.0 {
        weighted_share / hit_probability
    } else {
        0.0
    };

    AdvancedScenario {
        scenario: ViabilityScenario {
            coverage_fraction: if total_lines == 0 {
                0.0
            } else {
                covered.len() as f64 / total_lines as f64
            },
            lines_covered: covered.len(),
            total_lines,
            total_stake: budget,
            pool_after_bet,
            pool_share,
            expected_return,
            expected_profit,
            viable: expected_profit > 0.0,
            hit_probability,
        },
        plan,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::permutations::PermutationEnumerator;
    use crate::core::strength::StrengthEstimator;
    use crate::core::viability::{basic_scenario, EvaluationMode, ViabilityCalculator};
    use crate::models::CompetitorSignal;

    fn lines_for(strengths: &[f64], odds: Option<&[f64]>) -> RankedLines {
        let signals: Vec<CompetitorSignal> = strengths
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let signal = CompetitorSignal::new(format!("c{}", i + 1)).with_probability(*s);
                match odds {
                    Some(o) => signal.with_odds(o[i]),
                    None => signal,
                }
            })
            .collect();
        let map = StrengthEstimator::default().estimate("M1", &signals).unwrap();
        PermutationEnumerator::new(strengths.len().min(8))
            .unwrap()
            .enumerate(&map)
            .unwrap()
    }

    fn economics() -> PoolEconomics {
        PoolEconomics {
            stake_per_line: 1.0,
            takeout: 0.3,
            rollover: 250.0,
            include_self: true,
            dividend_multiplier: 1.0,
            pool_share_override: None,
            others_pool: 1_000.0,
        }
    }

    #[test]
    fn test_uniform_matches_basic_on_equiprobable_market() {
        let lines = lines_for(&[1.0; 6], None);
        let e = economics();

        for m in [1, 36, 180, 360] {
            let advanced = evaluate_advanced(&e, &AllocationParams::uniform(), &lines, m);
            let basic = basic_scenario(&e, m, lines.len(), lines.cumulative_at(m));

            assert!((advanced.scenario.expected_return - basic.expected_return).abs() < 1e-9);
            assert!((advanced.scenario.expected_profit - basic.expected_profit).abs() < 1e-9);
            assert!((advanced.scenario.pool_share - basic.pool_share).abs() < 1e-12);
            assert_eq!(advanced.scenario.viable, basic.viable);
        }
    }

    #[test]
    fn test_uniform_stakes_and_shares_on_any_market() {
        let lines = lines_for(&[0.35, 0.25, 0.15, 0.1, 0.1, 0.05], None);
        let e = economics();
        let f_auto = e.auto_pool_share(lines.len());

        let advanced = evaluate_advanced(&e, &AllocationParams::uniform(), &lines, 50);
        assert_eq!(advanced.plan.len(), 50);
        for row in &advanced.plan {
            assert!((row.stake - 1.0).abs() < 1e-12);
            assert!((row.pool_share - f_auto).abs() < 1e-12);
        }
        assert!((advanced.scenario.total_stake - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_concentration_favours_likely_lines() {
        let lines = lines_for(&[0.35, 0.25, 0.15, 0.1, 0.1, 0.05], None);
        let params = AllocationParams {
            gamma: 2.0,
            ..AllocationParams::uniform()
        };
        let advanced = evaluate_advanced(&economics(), &params, &lines, 20);

        let total: f64 = advanced.plan.iter().map(|r| r.stake).sum();
        assert!((total - 20.0).abs() < 1e-9);
        for w in advanced.plan.windows(2) {
            assert!(w[0].stake >= w[1].stake);
        }
        assert!(advanced.plan[0].stake > 1.0);
    }

    #[test]
    fn test_others_money_spread_over_all_lines() {
        let lines = lines_for(&[0.35, 0.25, 0.15, 0.1, 0.1, 0.05], Some(&[2.5, 4.0, 6.0, 9.0, 9.0, 15.0]));
        let params = AllocationParams {
            market_inefficiency: 0.2,
            ..AllocationParams::default()
        };
        let advanced = evaluate_advanced(&economics(), &params, &lines, lines.len());

        let others: f64 = advanced.plan.iter().map(|r| r.others_money).sum();
        assert!((others - 800.0).abs() < 1e-6);
        // favourites attract the crowd
        assert!(advanced.plan[0].others_money > advanced.plan.last().unwrap().others_money);
    }

    #[test]
    fn test_share_override_applies_per_line() {
        let lines = lines_for(&[0.35, 0.25, 0.15, 0.1, 0.1, 0.05], None);
        let e = economics().with_pool_share(Some(0.25));
        let advanced = evaluate_advanced(&e, &AllocationParams::default(), &lines, 30);

        assert!(advanced.plan.iter().all(|r| r.pool_share == 0.25));
        assert!((advanced.scenario.pool_share - 0.25).abs() < 1e-12);
        let expected = advanced.scenario.hit_probability * 0.25 * advanced.scenario.pool_after_bet;
        assert!((advanced.scenario.expected_return - expected).abs() < 1e-9);
    }

    #[test]
    fn test_no_other_money() {
        let lines = lines_for(&[0.4, 0.3, 0.2, 0.1], None);
        let e = economics().with_others_pool(0.0);
        let advanced = evaluate_advanced(&e, &AllocationParams::default(), &lines, 24);
        assert!(advanced.plan.iter().all(|r| (r.pool_share - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_calculator_advanced_grid() {
        let lines = lines_for(&[0.35, 0.25, 0.15, 0.1, 0.1, 0.05], None);
        let calc = ViabilityCalculator::new(economics())
            .unwrap()
            .with_allocation(AllocationParams::from_concentration(0.25, 0.08))
            .unwrap();

        let grid = calc.advanced_grid(&lines, 10).unwrap();
        assert_eq!(grid.len(), 10);
        assert_eq!(grid.last().unwrap().lines_covered, 360);

        let best = calc
            .optimal_coverage(&lines, 10, EvaluationMode::Advanced)
            .unwrap()
            .unwrap();
        assert!(grid.iter().all(|s| best.expected_profit >= s.expected_profit));
    }

    #[test]
    fn test_params_validation_and_presets() {
        let params = AllocationParams::from_concentration(0.25, 0.08);
        assert!((params.gamma - 1.5).abs() < 1e-12);
        assert!((params.beta - 0.952).abs() < 1e-12);
        assert!(params.validate().is_ok());

        let floor = AllocationParams::from_concentration(0.0, 0.99);
        assert!((floor.beta - 0.406).abs() < 1e-12);

        assert!(AllocationParams {
            market_inefficiency: 1.0,
            ..Default::default()
        }
        .validate()
        .is_err());
        assert!(AllocationParams {
            gamma: -1.0,
            ..Default::default()
        }
        .validate()
        .is_err());
    }
}
