use thiserror::Error;

use crate::models::MarketId;

/// Engine error types
#[derive(Debug, Error)]
pub enum EngineError {
    /// Fewer than four competitors carry a usable strength signal
    #[error("insufficient data for market {market_id}: {resolved} competitors with a resolvable strength, need at least 4")]
    InsufficientData { market_id: MarketId, resolved: usize },

    /// Parameter outside its documented domain
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Input record that cannot be turned into a model type
    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("data error: {0}")]
    Data(#[from] polars::prelude::PolarsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Whether the caller should skip the market rather than abort
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, EngineError::InsufficientData { .. })
    }
}

/// Validation functions
pub fn validate_top_n(top_n: usize) -> Result<()> {
    if top_n < 4 {
        return Err(EngineError::InvalidParameter(format!(
            "top_n must be at least 4, got {}",
            top_n
        )));
    }
    Ok(())
}

pub fn validate_takeout(takeout: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&takeout) {
        return Err(EngineError::InvalidParameter(format!(
            "Takeout rate must be between 0 and 1, got {}",
            takeout
        )));
    }
    Ok(())
}

pub fn validate_fraction(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(EngineError::InvalidParameter(format!(
            "{} must be between 0 and 1, got {}",
            name, value
        )));
    }
    Ok(())
}

pub fn validate_non_negative(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(EngineError::InvalidParameter(format!(
            "{} must be a non-negative number, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Decimal odds are usable only above evens-with-no-return (1.0)
pub fn validate_odds(odds: f64) -> Result<()> {
    if !odds.is_finite() || odds <= 1.0 {
        return Err(EngineError::InvalidParameter(format!(
            "Odds must be greater than 1.0, got {}",
            odds
        )));
    }
    Ok(())
}

pub fn validate_probability(prob: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&prob) {
        return Err(EngineError::InvalidParameter(format!(
            "Probability must be between 0 and 1, got {}",
            prob
        )));
    }
    Ok(())
}
