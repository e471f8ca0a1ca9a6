//! Core business logic modules

pub mod allocation;
pub mod permutations;
pub mod screen;
pub mod strength;
pub mod viability;

// Re-export commonly used types
pub use allocation::{AdvancedScenario, AllocationParams, ImpactBasis, LineStake};
pub use permutations::{
    line_probability, plackett_luce_probability, CoveragePoint, PermutationEnumerator,
    RankedLines, DEFAULT_TOP_N, MAX_TOP_N,
};
pub use screen::{screen_market, ScreenConfig, ScreenDecision, ScreenReason};
pub use strength::{StrengthAdjustments, StrengthEstimator, StrengthMap, StrengthPolicy};
pub use viability::{Crossing, EvaluationMode, PoolEconomics, ViabilityCalculator};
