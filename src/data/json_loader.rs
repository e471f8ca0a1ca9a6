//! Race card JSON loading
//!
//! A race card carries everything needed to rank and price one market:
//!
//! ```json
//! {
//!   "market": { "id": "AYR-1430", "date": "2024-05-01", "competitor_count": 8,
//!               "status": "OPEN", "currency": "GBP",
//!               "pools": [{ "as_of": "2024-05-01T14:00:00Z", "gross": 1250.0,
//!                           "net": 875.0, "rollover": 0.0, "takeout": 0.3 }] },
//!   "competitors": [{ "competitor_id": "1", "program_number": 1,
//!                     "model_probability": 0.21, "decimal_odds": 4.5 }],
//!   "result": "3-1-7-2",
//!   "dividend": 412.5
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::store::MarketStore;
use crate::error::{EngineError, Result};
use crate::models::{CompetitorId, CompetitorSignal, HistoricalResult, Market, LINE_DEPTH};

/// One market with its competitor signals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceCard {
    pub market: Market,
    pub competitors: Vec<CompetitorSignal>,
    /// Settled finishing order as `a-b-c-d`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dividend: Option<f64>,
}

impl RaceCard {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let mut card: RaceCard = serde_json::from_str(content)?;
        if card.market.competitor_count == 0 {
            card.market.competitor_count = card.competitors.len();
        }
        // snapshots may arrive unordered
        card.market.pools.sort_by(|a, b| a.as_of.cmp(&b.as_of));
        Ok(card)
    }

    /// Settled result, when the card carries one
    pub fn historical_result(&self) -> Result<Option<HistoricalResult>> {
        let Some(key) = &self.result else {
            return Ok(None);
        };
        let finish = parse_line_key(key)
            .ok_or_else(|| EngineError::Malformed(format!("bad result line: {}", key)))?;
        let placings: Vec<(CompetitorId, u8)> = finish
            .into_iter()
            .zip(1u8..)
            .collect();
        HistoricalResult::from_placings(self.market.id.clone(), &placings, self.dividend)
            .map(Some)
            .map_err(|rejection| EngineError::Malformed(rejection.to_string()))
    }

    /// Store holding just this market
    pub fn into_store(self) -> Result<MarketStore> {
        let result = self.historical_result()?;
        let mut store = MarketStore::new();
        store.set_signals(self.market.id.clone(), self.competitors);
        store.insert_market(self.market);
        if let Some(result) = result {
            store.insert_result(result);
        }
        Ok(store)
    }
}

/// Parse line key "3-1-7-2" into four competitor ids
pub fn parse_line_key(key: &str) -> Option<[CompetitorId; LINE_DEPTH]> {
    let parts: Vec<&str> = key.split('-').map(str::trim).collect();
    if parts.len() != LINE_DEPTH || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    Some([
        parts[0].to_string(),
        parts[1].to_string(),
        parts[2].to_string(),
        parts[3].to_string(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::store::MarketSource;
    use crate::models::MarketStatus;
    use std::io::Write;

    const CARD: &str = r#"{
        "market": {
            "id": "AYR-1430",
            "date": "2024-05-01",
            "competitor_count": 0,
            "status": "SETTLED",
            "currency": "GBP",
            "pools": [
                { "as_of": "2024-05-01T14:20:00Z", "gross": 1500.0, "net": 1050.0, "rollover": 0.0, "takeout": 0.3 },
                { "as_of": "2024-05-01T14:00:00Z", "gross": 1250.0, "net": 875.0, "rollover": 0.0, "takeout": 0.3 }
            ]
        },
        "competitors": [
            { "competitor_id": "1", "program_number": 1, "model_probability": 0.3 },
            { "competitor_id": "2", "program_number": 2, "model_probability": 0.25, "decimal_odds": 4.0 },
            { "competitor_id": "3", "decimal_odds": 6.0 },
            { "competitor_id": "7", "model_probability": 0.15 },
            { "competitor_id": "9", "model_probability": 0.1 }
        ],
        "result": "3-1-7-2",
        "dividend": 412.5
    }"#;

    #[test]
    fn test_parse_line_key() {
        assert_eq!(parse_line_key("3-1-7-2"), Some(["3", "1", "7", "2"].map(String::from)));
        assert_eq!(parse_line_key("3 - 1 - 7 - 2"), Some(["3", "1", "7", "2"].map(String::from)));
        assert_eq!(parse_line_key("1-2-3"), None);
        assert_eq!(parse_line_key("1--2-3"), None);
    }

    #[test]
    fn test_load_race_card() {
        let card = RaceCard::from_json_str(CARD).unwrap();
        assert_eq!(card.market.status, MarketStatus::Settled);
        assert_eq!(card.market.competitor_count, 5);
        assert_eq!(card.competitors.len(), 5);
        assert_eq!(card.market.latest_pool().unwrap().gross, 1500.0);
        assert_eq!(card.competitors[2].decimal_odds, Some(6.0));
        assert!(card.competitors[2].model_probability.is_none());

        let result = card.historical_result().unwrap().unwrap();
        assert_eq!(result.finish, ["3", "1", "7", "2"].map(String::from));
        assert_eq!(result.dividend, Some(412.5));
    }

    #[test]
    fn test_card_into_store() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CARD.as_bytes()).unwrap();

        let store = RaceCard::load(file.path()).unwrap().into_store().unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.signals("AYR-1430").len(), 5);
        assert!(store.result("AYR-1430").is_some());
    }

    #[test]
    fn test_bad_result_rejected() {
        let card = CARD.replace("3-1-7-2", "3-1-3-2");
        let card = RaceCard::from_json_str(&card).unwrap();
        assert!(card.historical_result().is_err());

        assert!(RaceCard::from_json_str("{ not json").is_err());
    }
}
