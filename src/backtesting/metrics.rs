//! Backtest Metrics
//!
//! Hit rates, realized top-line ROI, drawdown and breakdowns by field size.

use super::simulator::{MarketEvaluation, RankOutcome, SkipReason, SkippedMarket};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate backtest metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub markets_evaluated: usize,
    pub markets_skipped: usize,
    pub skipped_not_settled: usize,
    pub skipped_no_result: usize,
    pub skipped_insufficient_data: usize,

    // Ranking quality
    pub coverage_fraction: f64,
    pub hits_at_1: usize,
    pub hit_rate_at_1: f64,
    pub hits_at_coverage: usize,
    pub hit_rate_at_coverage: f64,
    pub unrankable: usize,
    /// Over markets where the actual finish was ranked
    pub mean_actual_rank: Option<f64>,
    pub mean_actual_probability: Option<f64>,

    // Flat top-line staking
    pub total_staked: f64,
    pub total_returned: f64,
    pub net_profit: f64,
    pub roi_at_1: f64,
    pub max_drawdown: f64,
}

/// Aggregate per-market evaluations
pub fn compute_summary(
    evaluations: &[MarketEvaluation],
    skipped: &[SkippedMarket],
    coverage_fraction: f64,
) -> BacktestSummary {
    let count_skipped = |reason: SkipReason| skipped.iter().filter(|s| s.reason == reason).count();

    let mut summary = BacktestSummary {
        markets_evaluated: evaluations.len(),
        markets_skipped: skipped.len(),
        skipped_not_settled: count_skipped(SkipReason::NotSettled),
        skipped_no_result: count_skipped(SkipReason::NoResult),
        skipped_insufficient_data: count_skipped(SkipReason::InsufficientData),
        coverage_fraction,
        ..Default::default()
    };

    if evaluations.is_empty() {
        return summary;
    }

    let total = evaluations.len() as f64;
    summary.hits_at_1 = evaluations.iter().filter(|e| e.hit_at_1).count();
    summary.hits_at_coverage = evaluations.iter().filter(|e| e.hit_at_coverage).count();
    summary.hit_rate_at_1 = summary.hits_at_1 as f64 / total;
    summary.hit_rate_at_coverage = summary.hits_at_coverage as f64 / total;

    let ranked: Vec<(usize, f64)> = evaluations
        .iter()
        .filter_map(|e| match e.outcome {
            RankOutcome::Ranked { rank, probability } => Some((rank, probability)),
            RankOutcome::Unrankable => None,
        })
        .collect();
    summary.unrankable = evaluations.len() - ranked.len();
    if !ranked.is_empty() {
        let n = ranked.len() as f64;
        summary.mean_actual_rank = Some(ranked.iter().map(|(r, _)| *r as f64).sum::<f64>() / n);
        summary.mean_actual_probability = Some(ranked.iter().map(|(_, p)| p).sum::<f64>() / n);
    }

    summary.total_staked = evaluations.iter().map(|e| e.stake).sum();
    summary.total_returned = evaluations.iter().map(|e| e.payout).sum();
    summary.net_profit = summary.total_returned - summary.total_staked;
    summary.roi_at_1 = if summary.total_staked > 0.0 {
        summary.net_profit / summary.total_staked
    } else {
        0.0
    };
    summary.max_drawdown = max_drawdown(evaluations.iter().map(|e| e.profit()));

    summary
}

/// Largest peak-to-trough fall of the cumulative P&L (starting from zero)
pub fn max_drawdown(profits: impl IntoIterator<Item = f64>) -> f64 {
    let mut cumulative = 0.0;
    let mut peak = 0.0_f64;
    let mut max_drawdown = 0.0_f64;
    for p in profits {
        cumulative += p;
        peak = peak.max(cumulative);
        max_drawdown = max_drawdown.max(peak - cumulative);
    }
    max_drawdown
}

/// Analysis results by dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionAnalysis {
    pub key: String,
    pub markets: usize,
    pub hits_at_1: usize,
    pub hits_at_coverage: usize,
    pub hit_rate_at_1: f64,
    pub hit_rate_at_coverage: f64,
    pub stake: f64,
    pub profit: f64,
    pub roi: f64,
}

/// Analyze results by number of competitors in the field
pub fn analyze_by_field_size(evaluations: &[MarketEvaluation]) -> Vec<DimensionAnalysis> {
    let mut grouped: BTreeMap<usize, Vec<&MarketEvaluation>> = BTreeMap::new();
    for e in evaluations {
        grouped.entry(e.competitor_count).or_default().push(e);
    }

    grouped
        .into_iter()
        .map(|(field_size, group)| {
            let markets = group.len();
            let hits_at_1 = group.iter().filter(|e| e.hit_at_1).count();
            let hits_at_coverage = group.iter().filter(|e| e.hit_at_coverage).count();
            let stake: f64 = group.iter().map(|e| e.stake).sum();
            let profit: f64 = group.iter().map(|e| e.profit()).sum();

            DimensionAnalysis {
                key: field_size.to_string(),
                markets,
                hits_at_1,
                hits_at_coverage,
                hit_rate_at_1: hits_at_1 as f64 / markets as f64,
                hit_rate_at_coverage: hits_at_coverage as f64 / markets as f64,
                stake,
                profit,
                roi: if stake > 0.0 { profit / stake } else { 0.0 },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn evaluation(id: &str, field: usize, outcome: RankOutcome, payout: f64) -> MarketEvaluation {
        let rank = outcome.rank();
        MarketEvaluation {
            market_id: id.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            competitor_count: field,
            candidates: field.min(10),
            total_lines: 360,
            lines_covered: 36,
            top_line: ["1", "2", "3", "4"].map(String::from),
            top_probability: 0.05,
            actual: ["1", "2", "3", "4"].map(String::from),
            outcome,
            hit_at_1: rank == Some(1),
            hit_at_coverage: rank.is_some_and(|r| r <= 36),
            dividend: Some(payout),
            stake: 1.0,
            payout,
        }
    }

    fn ranked(rank: usize, probability: f64) -> RankOutcome {
        RankOutcome::Ranked { rank, probability }
    }

    #[test]
    fn test_summary() {
        let evaluations = vec![
            evaluation("a", 6, ranked(1, 0.05), 30.0),
            evaluation("b", 6, ranked(20, 0.01), 0.0),
            evaluation("c", 8, ranked(100, 0.002), 0.0),
            evaluation("d", 8, RankOutcome::Unrankable, 0.0),
        ];
        let skipped = vec![SkippedMarket {
            market_id: "e".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            reason: SkipReason::NoResult,
        }];

        let summary = compute_summary(&evaluations, &skipped, 0.1);
        assert_eq!(summary.markets_evaluated, 4);
        assert_eq!(summary.markets_skipped, 1);
        assert_eq!(summary.skipped_no_result, 1);
        assert_eq!(summary.hits_at_1, 1);
        assert!((summary.hit_rate_at_1 - 0.25).abs() < 1e-12);
        assert!((summary.hit_rate_at_coverage - 0.5).abs() < 1e-12);
        assert_eq!(summary.unrankable, 1);
        assert!((summary.mean_actual_rank.unwrap() - 121.0 / 3.0).abs() < 1e-12);
        assert!((summary.mean_actual_probability.unwrap() - 0.062 / 3.0).abs() < 1e-12);
        assert_eq!(summary.total_staked, 4.0);
        assert_eq!(summary.total_returned, 30.0);
        assert!((summary.roi_at_1 - 6.5).abs() < 1e-12);
        // +29 then three straight losses
        assert!((summary.max_drawdown - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_summary() {
        let summary = compute_summary(&[], &[], 0.2);
        assert_eq!(summary.markets_evaluated, 0);
        assert_eq!(summary.roi_at_1, 0.0);
        assert!(summary.mean_actual_rank.is_none());
        assert_eq!(summary.coverage_fraction, 0.2);
    }

    #[test]
    fn test_max_drawdown() {
        assert_eq!(max_drawdown(vec![]), 0.0);
        assert_eq!(max_drawdown(vec![-1.0, -1.0]), 2.0);
        assert_eq!(max_drawdown(vec![5.0, -2.0, -4.0, 10.0, -1.0]), 6.0);
    }

    #[test]
    fn test_analyze_by_field_size() {
        let evaluations = vec![
            evaluation("a", 6, ranked(1, 0.05), 30.0),
            evaluation("b", 6, ranked(20, 0.01), 0.0),
            evaluation("c", 8, ranked(100, 0.002), 0.0),
        ];
        let analysis = analyze_by_field_size(&evaluations);

        assert_eq!(analysis.len(), 2);
        assert_eq!(analysis[0].key, "6");
        assert_eq!(analysis[0].markets, 2);
        assert!((analysis[0].roi - 14.0).abs() < 1e-12);
        assert_eq!(analysis[1].key, "8");
        assert_eq!(analysis[1].hits_at_1, 0);
        assert!((analysis[1].roi + 1.0).abs() < 1e-12);
    }
}
