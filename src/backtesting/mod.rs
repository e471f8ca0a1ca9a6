//! Backtesting engine for validating line rankings against settled markets

pub mod metrics;
pub mod simulator;
pub mod synthetic;

pub use metrics::{analyze_by_field_size, compute_summary, BacktestSummary, DimensionAnalysis};
pub use simulator::{
    BacktestConfig, BacktestReport, Backtester, MarketEvaluation, RankOutcome, SkipReason,
    SkippedMarket,
};
pub use synthetic::{SyntheticMarket, SyntheticMarketGenerator};
