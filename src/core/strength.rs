//! Strength Estimation
//!
//! Turns heterogeneous per-competitor signals into one positive, unit-free
//! strength per competitor. Only relative magnitude within a market matters:
//! the enumerator renormalizes over the candidate set.
//!
//! Resolution chain (for the default policy):
//!     model probability  ->  scaled 1/decimal_odds  ->  dropped

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::models::{Competitor, CompetitorSignal, MarketId, LINE_DEPTH};

/// Floor applied to a model probability of exactly zero
pub const MIN_STRENGTH: f64 = 1e-9;

/// Which signals may produce a strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrengthPolicy {
    ModelOnly,
    OddsOnly,
    #[default]
    ModelWithOddsFallback,
}

impl StrengthPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "model" | "model_only" => Some(StrengthPolicy::ModelOnly),
            "odds" | "odds_only" => Some(StrengthPolicy::OddsOnly),
            "fallback" | "model_with_odds_fallback" => Some(StrengthPolicy::ModelWithOddsFallback),
            _ => None,
        }
    }

    fn uses_model(self) -> bool {
        !matches!(self, StrengthPolicy::OddsOnly)
    }

    fn uses_odds(self) -> bool {
        !matches!(self, StrengthPolicy::ModelOnly)
    }
}

/// Multipliers applied to the strongest ("key") and weakest ("poor") competitors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrengthAdjustments {
    pub key_count: usize,
    pub key_multiplier: f64,
    pub poor_count: usize,
    pub poor_multiplier: f64,
}

impl Default for StrengthAdjustments {
    fn default() -> Self {
        Self {
            key_count: 0,
            key_multiplier: 1.2,
            poor_count: 0,
            poor_multiplier: 0.85,
        }
    }
}

impl StrengthAdjustments {
    pub fn is_noop(&self) -> bool {
        self.key_count == 0 && self.poor_count == 0
    }

    /// Apply to competitors already sorted strongest first
    fn apply(&self, competitors: &mut [Competitor]) {
        let n = competitors.len();
        let key = self.key_count.min(n);
        let poor = self.poor_count.min(n);

        for c in competitors.iter_mut().take(key) {
            c.strength *= self.key_multiplier;
        }
        for c in competitors.iter_mut().skip(n - poor) {
            c.strength *= self.poor_multiplier;
        }
        for c in competitors.iter_mut() {
            if !c.strength.is_finite() || c.strength <= 0.0 {
                c.strength = MIN_STRENGTH;
            }
        }
    }
}

/// Resolved strengths for one market, strongest first (ties by id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrengthMap {
    pub market_id: MarketId,
    pub competitors: Vec<Competitor>,
}

impl StrengthMap {
    pub fn len(&self) -> usize {
        self.competitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.competitors.is_empty()
    }

    pub fn get(&self, competitor_id: &str) -> Option<&Competitor> {
        self.competitors.iter().find(|c| c.id == competitor_id)
    }

    pub fn total_strength(&self) -> f64 {
        self.competitors.iter().map(|c| c.strength).sum()
    }

    /// Strength normalized to a win probability over the whole map
    pub fn win_probability(&self, competitor_id: &str) -> Option<f64> {
        let total = self.total_strength();
        self.get(competitor_id)
            .filter(|_| total > 0.0)
            .map(|c| c.strength / total)
    }
}

/// Deterministic order: strength descending, then id ascending
pub fn strength_order(a: &Competitor, b: &Competitor) -> Ordering {
    b.strength
        .partial_cmp(&a.strength)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.id.cmp(&b.id))
}

/// Strength estimator with an injectable resolution policy
#[derive(Debug, Clone, Default)]
pub struct StrengthEstimator {
    pub policy: StrengthPolicy,
    pub adjustments: StrengthAdjustments,
}

impl StrengthEstimator {
    pub fn new(policy: StrengthPolicy) -> Self {
        Self {
            policy,
            adjustments: StrengthAdjustments::default(),
        }
    }

    pub fn with_adjustments(mut self, adjustments: StrengthAdjustments) -> Self {
        self.adjustments = adjustments;
        self
    }

    /// Resolve strengths for one market
    ///
    /// Returns `InsufficientData` when fewer than four competitors resolve.
    pub fn estimate(&self, market_id: &str, signals: &[CompetitorSignal]) -> Result<StrengthMap> {
        let model: Vec<Option<f64>> = signals
            .iter()
            .map(|s| {
                if self.policy.uses_model() {
                    usable_probability(s.model_probability)
                } else {
                    None
                }
            })
            .collect();
        let implied: Vec<Option<f64>> = signals
            .iter()
            .map(|s| {
                if self.policy.uses_odds() {
                    usable_odds(s.decimal_odds).map(|o| 1.0 / o)
                } else {
                    None
                }
            })
            .collect();

        let scale = odds_scale(&model, &implied);

        let mut competitors: Vec<Competitor> = Vec::with_capacity(signals.len());
        for (i, signal) in signals.iter().enumerate() {
            let strength = match (model[i], implied[i]) {
                (Some(p), _) => Some(floor_zero(p)),
                (None, Some(q)) => Some(floor_zero(q * scale)),
                (None, None) => None,
            };

            match strength {
                Some(strength) => competitors.push(Competitor {
                    id: signal.competitor_id.clone(),
                    program_number: signal.program_number,
                    strength,
                    decimal_odds: usable_odds(signal.decimal_odds),
                }),
                None => debug!(
                    market_id,
                    competitor_id = %signal.competitor_id,
                    "dropping competitor without a usable strength signal"
                ),
            }
        }

        dedup_by_id(&mut competitors);

        if competitors.len() < LINE_DEPTH {
            return Err(EngineError::InsufficientData {
                market_id: market_id.to_string(),
                resolved: competitors.len(),
            });
        }

        competitors.sort_by(strength_order);
        if !self.adjustments.is_noop() {
            self.adjustments.apply(&mut competitors);
            competitors.sort_by(strength_order);
        }

        Ok(StrengthMap {
            market_id: market_id.to_string(),
            competitors,
        })
    }
}

/// Only an exact zero is lifted; positive values keep their magnitude
fn floor_zero(strength: f64) -> f64 {
    if strength == 0.0 {
        MIN_STRENGTH
    } else {
        strength
    }
}

fn usable_probability(value: Option<f64>) -> Option<f64> {
    value.filter(|p| p.is_finite() && *p >= 0.0)
}

fn usable_odds(value: Option<f64>) -> Option<f64> {
    value.filter(|o| o.is_finite() && *o > 1.0)
}

/// Factor bringing odds-implied values onto the model's scale
///
/// Uses competitors that carry both signals when there are any; otherwise
/// removes the overround so implied values sum to one.
fn odds_scale(model: &[Option<f64>], implied: &[Option<f64>]) -> f64 {
    let (model_sum, implied_sum) = model
        .iter()
        .zip(implied)
        .filter_map(|(m, q)| (*m).zip(*q))
        .fold((0.0, 0.0), |(ms, qs), (m, q)| (ms + m, qs + q));

    if implied_sum > 0.0 && model_sum > 0.0 {
        return model_sum / implied_sum;
    }

    let total_implied: f64 = implied.iter().flatten().sum();
    if total_implied > 0.0 {
        1.0 / total_implied
    } else {
        1.0
    }
}

/// Keep the first signal for each competitor id
fn dedup_by_id(competitors: &mut Vec<Competitor>) {
    let mut seen = HashSet::new();
    competitors.retain(|c| seen.insert(c.id.clone()));
}
