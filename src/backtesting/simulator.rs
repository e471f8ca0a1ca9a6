//! Backtest Simulator
//!
//! Replays strength estimation and line ranking over settled markets and
//! checks where the actual finishing order landed. Realized returns use each
//! market's declared dividend, never a modelled one.

use super::metrics::{compute_summary, BacktestSummary};
use crate::config::EngineConfig;
use crate::core::permutations::PermutationEnumerator;
use crate::core::strength::{StrengthEstimator, StrengthMap};
use crate::data::MarketSource;
use crate::error::{validate_fraction, validate_non_negative, Result};
use crate::models::{CompetitorId, Market, MarketId, LINE_DEPTH};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Backtest simulator configuration
#[derive(Debug, Clone)]
pub struct BacktestConfig {
    /// Inclusive date range
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub top_n: usize,
    pub coverage_fraction: f64,
    /// Flat stake on the top-ranked line in every market
    pub unit_stake: f64,
    pub estimator: StrengthEstimator,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            from: NaiveDate::MIN,
            to: NaiveDate::MAX,
            top_n: 10,
            coverage_fraction: 0.10,
            unit_stake: 1.0,
            estimator: StrengthEstimator::default(),
        }
    }
}

impl BacktestConfig {
    pub fn from_engine(config: &EngineConfig, from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from,
            to,
            top_n: config.enumeration.top_n,
            coverage_fraction: config.backtest.coverage_fraction,
            unit_stake: config.backtest.unit_stake,
            estimator: config.estimator(),
        }
    }
}

/// Where the actual finishing order ranked
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RankOutcome {
    Ranked { rank: usize, probability: f64 },
    /// A finisher fell outside the candidate set
    Unrankable,
}

impl RankOutcome {
    pub fn rank(&self) -> Option<usize> {
        match self {
            RankOutcome::Ranked { rank, .. } => Some(*rank),
            RankOutcome::Unrankable => None,
        }
    }
}

/// Why a market in range was not evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotSettled,
    NoResult,
    InsufficientData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedMarket {
    pub market_id: MarketId,
    pub date: NaiveDate,
    pub reason: SkipReason,
}

/// Per-market backtest record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketEvaluation {
    pub market_id: MarketId,
    pub date: NaiveDate,
    pub competitor_count: usize,
    pub candidates: usize,
    pub total_lines: usize,
    pub lines_covered: usize,
    pub top_line: [CompetitorId; LINE_DEPTH],
    pub top_probability: f64,
    pub actual: [CompetitorId; LINE_DEPTH],
    pub outcome: RankOutcome,
    pub hit_at_1: bool,
    pub hit_at_coverage: bool,
    pub dividend: Option<f64>,
    pub stake: f64,
    pub payout: f64,
}

impl MarketEvaluation {
    pub fn profit(&self) -> f64 {
        self.payout - self.stake
    }
}

enum MarketOutcome {
    Evaluated(Box<MarketEvaluation>),
    Skipped(SkippedMarket),
}

/// Backtest result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub top_n: usize,
    pub coverage_fraction: f64,
    pub evaluations: Vec<MarketEvaluation>,
    pub skipped: Vec<SkippedMarket>,
    pub summary: BacktestSummary,
}

/// Backtest simulator
pub struct Backtester {
    pub config: BacktestConfig,
    enumerator: PermutationEnumerator,
}

impl Backtester {
    pub fn new(config: BacktestConfig) -> Result<Self> {
        validate_fraction("coverage_fraction", config.coverage_fraction)?;
        validate_non_negative("unit_stake", config.unit_stake)?;
        let enumerator = PermutationEnumerator::new(config.top_n)?;
        Ok(Self { config, enumerator })
    }

    /// Evaluate every market in range, in parallel, keeping (date, id) order
    pub fn run<S: MarketSource>(&self, source: &S) -> Result<BacktestReport> {
        let markets = source.markets_between(self.config.from, self.config.to);
        info!(
            from = %self.config.from,
            to = %self.config.to,
            markets = markets.len(),
            top_n = self.enumerator.top_n(),
            coverage = self.config.coverage_fraction,
            "starting backtest"
        );

        let outcomes: Vec<MarketOutcome> = markets
            .par_iter()
            .map(|market| self.evaluate_market(market, source))
            .collect::<Result<Vec<_>>>()?;

        let mut evaluations = Vec::new();
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome {
                MarketOutcome::Evaluated(e) => evaluations.push(*e),
                MarketOutcome::Skipped(s) => skipped.push(s),
            }
        }

        let summary = compute_summary(&evaluations, &skipped, self.config.coverage_fraction);
        info!(
            evaluated = summary.markets_evaluated,
            skipped = summary.markets_skipped,
            hit_rate_at_1 = summary.hit_rate_at_1,
            hit_rate_at_coverage = summary.hit_rate_at_coverage,
            roi_at_1 = summary.roi_at_1,
            "backtest finished"
        );

        Ok(BacktestReport {
            from: self.config.from,
            to: self.config.to,
            top_n: self.enumerator.top_n(),
            coverage_fraction: self.config.coverage_fraction,
            evaluations,
            skipped,
            summary,
        })
    }

    fn evaluate_market<S: MarketSource>(&self, market: &Market, source: &S) -> Result<MarketOutcome> {
        let skip = |reason| {
            Ok(MarketOutcome::Skipped(SkippedMarket {
                market_id: market.id.clone(),
                date: market.date,
                reason,
            }))
        };

        if !market.is_settled() {
            return skip(SkipReason::NotSettled);
        }
        let Some(result) = source.result(&market.id) else {
            return skip(SkipReason::NoResult);
        };
        let strengths = match self
            .config
            .estimator
            .estimate(&market.id, source.signals(&market.id))
        {
            Ok(map) => map,
            Err(e) if e.is_insufficient_data() => return skip(SkipReason::InsufficientData),
            Err(e) => return Err(e),
        };

        self.score(market, &strengths, &result.finish, result.dividend)
            .map(|e| MarketOutcome::Evaluated(Box::new(e)))
    }

    /// Rank one market's lines and score the actual finish against them
    pub fn score(
        &self,
        market: &Market,
        strengths: &StrengthMap,
        actual: &[CompetitorId; LINE_DEPTH],
        dividend: Option<f64>,
    ) -> Result<MarketEvaluation> {
        let ranked = self.enumerator.enumerate(strengths)?;
        let lines_covered = ranked.lines_for_coverage(self.config.coverage_fraction);

        let outcome = match ranked.find(actual) {
            Some(line) => RankOutcome::Ranked {
                rank: line.rank,
                probability: line.probability,
            },
            None => RankOutcome::Unrankable,
        };
        let rank = outcome.rank();
        let hit_at_1 = rank == Some(1);
        let hit_at_coverage = rank.is_some_and(|r| r <= lines_covered);

        let stake = self.config.unit_stake;
        let payout = match (hit_at_1, dividend) {
            (true, Some(d)) => stake * d,
            (true, None) => {
                warn!(market_id = %market.id, "top line won but no dividend declared, counting zero return");
                0.0
            }
            (false, _) => 0.0,
        };

        let (top_line, top_probability) = match ranked.top() {
            Some(line) => (line.competitors.clone(), line.probability),
            None => (Default::default(), 0.0),
        };

        Ok(MarketEvaluation {
            market_id: market.id.clone(),
            date: market.date,
            competitor_count: market.competitor_count.max(strengths.len()),
            candidates: ranked.candidates.len(),
            total_lines: ranked.len(),
            lines_covered,
            top_line,
            top_probability,
            actual: actual.clone(),
            outcome,
            hit_at_1,
            hit_at_coverage,
            dividend,
            stake,
            payout,
        })
    }
}
