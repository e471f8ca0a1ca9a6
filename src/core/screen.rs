//! Market screening ahead of detailed evaluation

use serde::{Deserialize, Serialize};
use std::fmt;

use super::permutations::RankedLines;
use super::viability::{basic_scenario, PoolEconomics};
use crate::models::{Market, MarketId, MarketStatus};

/// Screening thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub min_competitors: usize,
    pub max_competitors: usize,
    pub require_open: bool,
    pub require_rollover: bool,
    /// Minimum full-coverage ROI
    pub min_roi: Option<f64>,
    /// Hold markets whose full-coverage expected profit is not positive
    pub require_positive_ev: bool,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            min_competitors: 4,
            max_competitors: 20,
            require_open: true,
            require_rollover: false,
            min_roi: None,
            require_positive_ev: true,
        }
    }
}

/// Why a market was filtered out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ScreenReason {
    TooFewCompetitors { count: usize, min: usize },
    TooManyCompetitors { count: usize, max: usize },
    NotOpen { status: MarketStatus },
    NoRollover,
    RoiBelow { roi: f64, min: f64 },
    NonPositiveExpectedValue { expected_profit: f64 },
    NoLines,
}

impl fmt::Display for ScreenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScreenReason::TooFewCompetitors { min, .. } => write!(f, "competitors<{}", min),
            ScreenReason::TooManyCompetitors { max, .. } => write!(f, "competitors>{}", max),
            ScreenReason::NotOpen { status } => write!(f, "status:{}", status),
            ScreenReason::NoRollover => f.write_str("no-rollover"),
            ScreenReason::RoiBelow { min, .. } => write!(f, "roi<{:.2}", min),
            ScreenReason::NonPositiveExpectedValue { .. } => f.write_str("non-positive-ev"),
            ScreenReason::NoLines => f.write_str("no-lines"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenDecision {
    pub market_id: MarketId,
    pub accepted: bool,
    pub reasons: Vec<ScreenReason>,
    /// ROI of buying every enumerated line, when lines were available
    pub full_coverage_roi: Option<f64>,
    pub full_coverage_profit: Option<f64>,
}

impl ScreenDecision {
    /// Reasons joined as `a;b;c`
    pub fn reason_summary(&self) -> String {
        self.reasons
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Apply every screen and collect all failing reasons
pub fn screen_market(
    market: &Market,
    economics: &PoolEconomics,
    lines: Option<&RankedLines>,
    config: &ScreenConfig,
) -> ScreenDecision {
    let mut reasons = Vec::new();
    let count = market.competitor_count;

    if count < config.min_competitors {
        reasons.push(ScreenReason::TooFewCompetitors {
            count,
            min: config.min_competitors,
        });
    }
    if count > config.max_competitors {
        reasons.push(ScreenReason::TooManyCompetitors {
            count,
            max: config.max_competitors,
        });
    }
    if config.require_open && market.status != MarketStatus::Open {
        reasons.push(ScreenReason::NotOpen {
            status: market.status,
        });
    }
    if config.require_rollover && economics.rollover <= 0.0 {
        reasons.push(ScreenReason::NoRollover);
    }

    let full_coverage = match lines.filter(|l| !l.is_empty()) {
        Some(lines) => {
            let c = lines.len();
            Some(basic_scenario(economics, c, c, lines.total_probability()))
        }
        None => {
            reasons.push(ScreenReason::NoLines);
            None
        }
    };
    let full_coverage_roi = full_coverage.as_ref().map(|s| s.roi());
    let full_coverage_profit = full_coverage.as_ref().map(|s| s.expected_profit);

    if let (Some(min), Some(roi)) = (config.min_roi, full_coverage_roi) {
        if roi < min {
            reasons.push(ScreenReason::RoiBelow { roi, min });
        }
    }
    if let (true, Some(expected_profit)) = (config.require_positive_ev, full_coverage_profit) {
        if expected_profit <= 0.0 {
            reasons.push(ScreenReason::NonPositiveExpectedValue { expected_profit });
        }
    }

    ScreenDecision {
        market_id: market.id.clone(),
        accepted: reasons.is_empty(),
        reasons,
        full_coverage_roi,
        full_coverage_profit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::permutations::PermutationEnumerator;
    use crate::core::strength::StrengthEstimator;
    use crate::models::CompetitorSignal;
    use chrono::NaiveDate;

    fn market(count: usize, status: MarketStatus) -> Market {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        Market::new("M1", date, count, status, "GBP")
    }

    fn lines() -> RankedLines {
        let signals: Vec<CompetitorSignal> = [0.3, 0.25, 0.2, 0.15, 0.1]
            .iter()
            .enumerate()
            .map(|(i, p)| CompetitorSignal::new(format!("c{}", i + 1)).with_probability(*p))
            .collect();
        let map = StrengthEstimator::default().estimate("M1", &signals).unwrap();
        PermutationEnumerator::new(5).unwrap().enumerate(&map).unwrap()
    }

    /// Rollover large enough that full coverage profits
    fn carried_pool() -> PoolEconomics {
        PoolEconomics {
            rollover: 500.0,
            ..PoolEconomics::default().with_others_pool(500.0)
        }
    }

    #[test]
    fn test_accepts_ordinary_market() {
        let lines = lines();
        let e = carried_pool();
        let decision = screen_market(&market(5, MarketStatus::Open), &e, Some(&lines), &ScreenConfig::default());
        assert!(decision.accepted);
        assert!(decision.reasons.is_empty());
        assert!(decision.full_coverage_roi.is_some());
        assert!(decision.full_coverage_profit.unwrap() > 0.0);
    }

    #[test]
    fn test_collects_all_reasons() {
        let config = ScreenConfig {
            require_rollover: true,
            ..Default::default()
        };
        let decision = screen_market(
            &market(24, MarketStatus::Closed),
            &PoolEconomics::default(),
            None,
            &config,
        );

        assert!(!decision.accepted);
        assert_eq!(decision.reason_summary(), "competitors>20;status:CLOSED;no-rollover;no-lines");
    }

    #[test]
    fn test_small_field_rejected() {
        let decision = screen_market(
            &market(3, MarketStatus::Open),
            &carried_pool(),
            Some(&lines()),
            &ScreenConfig::default(),
        );
        assert_eq!(
            decision.reasons,
            vec![ScreenReason::TooFewCompetitors { count: 3, min: 4 }]
        );
    }

    #[test]
    fn test_min_roi() {
        let lines = lines();
        // no rollover, 30% takeout: full coverage loses
        let e = PoolEconomics::default().with_others_pool(500.0);
        let config = ScreenConfig {
            min_roi: Some(0.0),
            ..Default::default()
        };
        let decision = screen_market(&market(5, MarketStatus::Open), &e, Some(&lines), &config);
        assert!(!decision.accepted);
        assert!(matches!(decision.reasons[0], ScreenReason::RoiBelow { .. }));

        let rich = PoolEconomics {
            rollover: 5_000.0,
            ..e
        };
        let decision = screen_market(&market(5, MarketStatus::Open), &rich, Some(&lines), &config);
        assert!(decision.accepted);
    }

    #[test]
    fn test_non_positive_ev_held() {
        let lines = lines();
        // no rollover, 30% takeout: full coverage returns 70% of the stake
        let e = PoolEconomics::default().with_others_pool(500.0);
        let decision = screen_market(&market(5, MarketStatus::Open), &e, Some(&lines), &ScreenConfig::default());

        assert!(!decision.accepted);
        assert_eq!(decision.reasons.len(), 1);
        match decision.reasons[0] {
            ScreenReason::NonPositiveExpectedValue { expected_profit } => {
                assert!(expected_profit < 0.0);
                assert_eq!(Some(expected_profit), decision.full_coverage_profit);
            }
            ref other => panic!("unexpected reason {:?}", other),
        }
        assert_eq!(decision.reason_summary(), "non-positive-ev");

        let lenient = ScreenConfig {
            require_positive_ev: false,
            ..Default::default()
        };
        let decision = screen_market(&market(5, MarketStatus::Open), &e, Some(&lines), &lenient);
        assert!(decision.accepted);
    }

    #[test]
    fn test_zero_stake_is_not_positive_ev() {
        let lines = lines();
        let e = PoolEconomics {
            stake_per_line: 0.0,
            ..carried_pool()
        };
        let decision = screen_market(&market(5, MarketStatus::Open), &e, Some(&lines), &ScreenConfig::default());
        assert_eq!(decision.reason_summary(), "non-positive-ev");
    }
}
