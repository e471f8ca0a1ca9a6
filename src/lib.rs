//! Superfecta - pari-mutuel superfecta analytics
//!
//! This library provides:
//! - Competitor strength estimation from model probabilities or decimal odds
//! - Plackett-Luce ranking of every ordered top-4 line
//! - Pool viability (expected return, break-even pool, minimum coverage)
//! - Backtesting of the ranking against settled markets
//!
//! # Example
//!
//! ```no_run
//! use superfecta::core::{PermutationEnumerator, PoolEconomics, StrengthEstimator, ViabilityCalculator};
//! use superfecta::models::CompetitorSignal;
//!
//! let signals: Vec<CompetitorSignal> = (1..=8)
//!     .map(|n| CompetitorSignal::new(format!("R{}", n)).with_odds(2.0 + n as f64))
//!     .collect();
//!
//! let strengths = StrengthEstimator::default().estimate("M1", &signals)?;
//! let lines = PermutationEnumerator::new(8)?.enumerate(&strengths)?;
//!
//! let calc = ViabilityCalculator::new(PoolEconomics::default().with_others_pool(2_500.0))?;
//! let scenario = calc.evaluate_basic_fraction(&lines, 0.10)?;
//! println!("Expected profit: {:.2}", scenario.expected_profit);
//! # Ok::<(), superfecta::EngineError>(())
//! ```

pub mod backtesting;
pub mod config;
pub mod core;
pub mod data;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use backtesting::{BacktestConfig, BacktestReport, BacktestSummary, Backtester};
pub use config::{EngineConfig, RiskPreset};
pub use core::{
    Crossing, EvaluationMode, PermutationEnumerator, PoolEconomics, RankedLines,
    StrengthEstimator, ViabilityCalculator,
};
pub use data::{load_directory, MarketSource, MarketStore, RaceCard};
pub use error::{EngineError, Result};
pub use models::{
    CompetitorSignal, HistoricalResult, Market, MarketStatus, RankedLine, ViabilityScenario,
};
