//! In-memory market store
//!
//! Holds already-resolved market records, competitor signals and settled
//! results. The backtester reads through [`MarketSource`] so any other
//! storage layer can stand in for it.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::models::{CompetitorId, CompetitorSignal, HistoricalResult, Market, MarketId};

/// Read access to markets, signals and results
pub trait MarketSource: Sync {
    /// Markets dated within `[from, to]`, ordered by (date, id)
    fn markets_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<&Market>;

    fn signals(&self, market_id: &str) -> &[CompetitorSignal];

    fn result(&self, market_id: &str) -> Option<&HistoricalResult>;
}

/// Market data indexed by market id
#[derive(Debug, Clone, Default)]
pub struct MarketStore {
    markets: HashMap<MarketId, Market>,
    signals: HashMap<MarketId, Vec<CompetitorSignal>>,
    results: HashMap<MarketId, HistoricalResult>,
}

impl MarketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a market record
    pub fn insert_market(&mut self, market: Market) {
        self.markets.insert(market.id.clone(), market);
    }

    pub fn market(&self, market_id: &str) -> Option<&Market> {
        self.markets.get(market_id)
    }

    pub fn market_mut(&mut self, market_id: &str) -> Option<&mut Market> {
        self.markets.get_mut(market_id)
    }

    pub fn set_signals(&mut self, market_id: impl Into<MarketId>, signals: Vec<CompetitorSignal>) {
        self.signals.insert(market_id.into(), signals);
    }

    /// Signal for one competitor, created empty if absent
    pub fn signal_mut(&mut self, market_id: &str, competitor_id: &str) -> &mut CompetitorSignal {
        let signals = self.signals.entry(market_id.to_string()).or_default();
        let idx = match signals.iter().position(|s| s.competitor_id == competitor_id) {
            Some(idx) => idx,
            None => {
                signals.push(CompetitorSignal::new(competitor_id));
                signals.len() - 1
            }
        };
        &mut signals[idx]
    }

    pub fn insert_result(&mut self, result: HistoricalResult) {
        self.results.insert(result.market_id.clone(), result);
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }

    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    /// All markets ordered by (date, id)
    pub fn markets(&self) -> Vec<&Market> {
        let mut markets: Vec<&Market> = self.markets.values().collect();
        markets.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        markets
    }

    /// Earliest and latest market date
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.markets.values().map(|m| m.date).min()?;
        let max = self.markets.values().map(|m| m.date).max()?;
        Some((min, max))
    }

    /// Competitor ids carrying a signal for a market
    pub fn competitor_ids(&self, market_id: &str) -> Vec<CompetitorId> {
        self.signals(market_id)
            .iter()
            .map(|s| s.competitor_id.clone())
            .collect()
    }
}

impl MarketSource for MarketStore {
    fn markets_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<&Market> {
        self.markets()
            .into_iter()
            .filter(|m| m.date >= from && m.date <= to)
            .collect()
    }

    fn signals(&self, market_id: &str) -> &[CompetitorSignal] {
        self.signals
            .get(market_id)
            .map(|s| s.as_slice())
            .unwrap_or(&[])
    }

    fn result(&self, market_id: &str) -> Option<&HistoricalResult> {
        self.results.get(market_id)
    }
}
