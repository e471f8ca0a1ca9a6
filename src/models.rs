use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

pub type MarketId = String;
pub type CompetitorId = String;

/// Number of finishing positions a superfecta line covers
pub const LINE_DEPTH: usize = 4;

/// Market lifecycle: OPEN -> CLOSED -> SETTLED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketStatus {
    Open,
    Closed,
    Settled,
}

impl MarketStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Some(MarketStatus::Open),
            "CLOSED" => Some(MarketStatus::Closed),
            "SETTLED" | "RESULTED" => Some(MarketStatus::Settled),
            _ => None,
        }
    }

    /// Only forward transitions are allowed
    pub fn can_transition_to(self, next: MarketStatus) -> bool {
        matches!(
            (self, next),
            (MarketStatus::Open, MarketStatus::Closed)
                | (MarketStatus::Closed, MarketStatus::Settled)
                | (MarketStatus::Open, MarketStatus::Settled)
        )
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketStatus::Open => "OPEN",
            MarketStatus::Closed => "CLOSED",
            MarketStatus::Settled => "SETTLED",
        };
        f.write_str(s)
    }
}

/// Pool totals at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub as_of: DateTime<Utc>,
    pub gross: f64,
    pub net: f64,
    pub rollover: f64,
    pub takeout: f64,
}

/// One superfecta pool for one race
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub id: MarketId,
    pub date: NaiveDate,
    pub competitor_count: usize,
    pub status: MarketStatus,
    pub currency: String,
    /// Snapshots ordered by `as_of` ascending
    #[serde(default)]
    pub pools: Vec<PoolSnapshot>,
}

impl Market {
    pub fn new(
        id: impl Into<MarketId>,
        date: NaiveDate,
        competitor_count: usize,
        status: MarketStatus,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            date,
            competitor_count,
            status,
            currency: currency.into(),
            pools: Vec::new(),
        }
    }

    /// Insert a snapshot keeping the series ordered
    pub fn push_pool(&mut self, snapshot: PoolSnapshot) {
        let idx = self
            .pools
            .partition_point(|existing| existing.as_of <= snapshot.as_of);
        self.pools.insert(idx, snapshot);
    }

    pub fn latest_pool(&self) -> Option<&PoolSnapshot> {
        self.pools.last()
    }

    /// Latest snapshot taken at or before `as_of`
    pub fn pool_as_of(&self, as_of: DateTime<Utc>) -> Option<&PoolSnapshot> {
        let idx = self.pools.partition_point(|s| s.as_of <= as_of);
        if idx == 0 {
            None
        } else {
            self.pools.get(idx - 1)
        }
    }

    /// N*(N-1)*(N-2)*(N-3) over the full field
    pub fn total_permutations(&self) -> usize {
        permutation_count(self.competitor_count)
    }

    pub fn is_settled(&self) -> bool {
        self.status == MarketStatus::Settled
    }
}

/// Ordered 4-permutations of `n` items
pub fn permutation_count(n: usize) -> usize {
    if n < LINE_DEPTH {
        return 0;
    }
    n * (n - 1) * (n - 2) * (n - 3)
}

/// Raw per-competitor signals as supplied by the calling layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorSignal {
    pub competitor_id: CompetitorId,
    #[serde(default)]
    pub program_number: Option<u32>,
    #[serde(default)]
    pub model_probability: Option<f64>,
    /// Best available decimal odds from the most recent snapshot
    #[serde(default)]
    pub decimal_odds: Option<f64>,
}

impl CompetitorSignal {
    pub fn new(competitor_id: impl Into<CompetitorId>) -> Self {
        Self {
            competitor_id: competitor_id.into(),
            program_number: None,
            model_probability: None,
            decimal_odds: None,
        }
    }

    pub fn with_probability(mut self, probability: f64) -> Self {
        self.model_probability = Some(probability);
        self
    }

    pub fn with_odds(mut self, odds: f64) -> Self {
        self.decimal_odds = Some(odds);
        self
    }

    pub fn with_number(mut self, number: u32) -> Self {
        self.program_number = Some(number);
        self
    }
}

/// A competitor with a resolved strength
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competitor {
    pub id: CompetitorId,
    pub program_number: Option<u32>,
    pub strength: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimal_odds: Option<f64>,
}

impl Competitor {
    /// Program number when known, id otherwise
    pub fn label(&self) -> String {
        match self.program_number {
            Some(n) => n.to_string(),
            None => self.id.clone(),
        }
    }
}

/// Why a set of placings cannot be used as a superfecta result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultRejection {
    /// More than one competitor at this position (dead heat)
    Tie(u8),
    MissingPosition(u8),
    DuplicateCompetitor(CompetitorId),
}

impl fmt::Display for ResultRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultRejection::Tie(pos) => write!(f, "dead heat at position {}", pos),
            ResultRejection::MissingPosition(pos) => write!(f, "no finisher at position {}", pos),
            ResultRejection::DuplicateCompetitor(id) => {
                write!(f, "competitor {} placed more than once", id)
            }
        }
    }
}

/// Confirmed top-4 finish of a settled market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalResult {
    pub market_id: MarketId,
    pub finish: [CompetitorId; LINE_DEPTH],
    /// Declared superfecta dividend per unit stake
    #[serde(default)]
    pub dividend: Option<f64>,
}

impl HistoricalResult {
    /// Build from (competitor, finishing position) pairs. Positions beyond 4 are ignored.
    pub fn from_placings(
        market_id: impl Into<MarketId>,
        placings: &[(CompetitorId, u8)],
        dividend: Option<f64>,
    ) -> Result<Self, ResultRejection> {
        let mut slots: [Option<CompetitorId>; LINE_DEPTH] = Default::default();
        let mut seen = HashSet::new();

        for (competitor, position) in placings {
            if *position == 0 || *position as usize > LINE_DEPTH {
                continue;
            }
            if !seen.insert(competitor.clone()) {
                return Err(ResultRejection::DuplicateCompetitor(competitor.clone()));
            }
            let slot = &mut slots[*position as usize - 1];
            if slot.is_some() {
                return Err(ResultRejection::Tie(*position));
            }
            *slot = Some(competitor.clone());
        }

        let [a, b, c, d] = slots;
        match (a, b, c, d) {
            (Some(a), Some(b), Some(c), Some(d)) => Ok(Self {
                market_id: market_id.into(),
                finish: [a, b, c, d],
                dividend: dividend.filter(|d| d.is_finite() && *d >= 0.0),
            }),
            (a, b, c, _) => {
                let missing = [a.is_none(), b.is_none(), c.is_none()]
                    .iter()
                    .position(|m| *m)
                    .map(|i| i as u8 + 1)
                    .unwrap_or(4);
                Err(ResultRejection::MissingPosition(missing))
            }
        }
    }
}

/// One ranked superfecta line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedLine {
    /// 1 = most probable
    pub rank: usize,
    pub competitors: [CompetitorId; LINE_DEPTH],
    pub probability: f64,
    pub cumulative_probability: f64,
}

impl RankedLine {
    pub fn matches(&self, finish: &[CompetitorId; LINE_DEPTH]) -> bool {
        self.competitors == *finish
    }

    pub fn display(&self) -> String {
        self.competitors.join("-")
    }
}

/// Outcome of evaluating one coverage level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViabilityScenario {
    pub coverage_fraction: f64,
    pub lines_covered: usize,
    pub total_lines: usize,
    pub total_stake: f64,
    pub pool_after_bet: f64,
    pub pool_share: f64,
    pub expected_return: f64,
    pub expected_profit: f64,
    pub viable: bool,
    /// Model probability that one of the covered lines wins
    pub hit_probability: f64,
}

impl ViabilityScenario {
    pub fn roi(&self) -> f64 {
        if self.total_stake > 0.0 {
            self.expected_profit / self.total_stake
        } else {
            0.0
        }
    }
}
