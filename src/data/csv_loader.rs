//! CSV data loading for markets, pools, signals and results
//!
//! Expected files in a data directory (all but `markets.csv` optional):
//!
//! | file                      | columns                                              |
//! |---------------------------|------------------------------------------------------|
//! | `markets.csv`             | market_id, date, competitor_count, status, currency  |
//! | `pools.csv`               | market_id, as_of, gross, net, rollover, takeout      |
//! | `model_probabilities.csv` | market_id, competitor_id, probability [, program_number] |
//! | `odds.csv`                | market_id, competitor_id, decimal_odds [, as_of]     |
//! | `results.csv`             | market_id, competitor_id, position                   |
//! | `dividends.csv`           | market_id, dividend                                  |

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use polars::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use super::store::MarketStore;
use crate::error::Result;
use crate::models::{
    CompetitorId, HistoricalResult, Market, MarketId, MarketStatus, PoolSnapshot,
};

pub const MARKETS_FILE: &str = "markets.csv";
pub const POOLS_FILE: &str = "pools.csv";
pub const PROBABILITIES_FILE: &str = "model_probabilities.csv";
pub const ODDS_FILE: &str = "odds.csv";
pub const RESULTS_FILE: &str = "results.csv";
pub const DIVIDENDS_FILE: &str = "dividends.csv";

/// Model probability row
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityRow {
    pub market_id: MarketId,
    pub competitor_id: CompetitorId,
    pub program_number: Option<u32>,
    pub probability: f64,
}

/// Read a CSV file eagerly
fn read_csv(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

/// Column cast to strings (ids may be inferred as integers)
fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df.column(name)?.cast(&DataType::String)?;
    let values = series
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
        .collect();
    Ok(values)
}

fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df.column(name)?.cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

fn i64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let series = df.column(name)?.cast(&DataType::Int64)?;
    Ok(series.i64()?.into_iter().collect())
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

/// RFC 3339, or `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS` read as UTC
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y%m%d"))
        .ok()
}

fn not_after(ts: Option<DateTime<Utc>>, as_of: Option<DateTime<Utc>>) -> bool {
    match (ts, as_of) {
        (Some(ts), Some(limit)) => ts <= limit,
        _ => true,
    }
}

/// Load market records
pub fn load_markets(path: impl AsRef<Path>) -> Result<Vec<Market>> {
    let df = read_csv(path.as_ref())?;
    let ids = string_column(&df, "market_id")?;
    let dates = string_column(&df, "date")?;
    let counts = i64_column(&df, "competitor_count")?;
    let statuses = string_column(&df, "status")?;
    let currencies = if has_column(&df, "currency") {
        string_column(&df, "currency")?
    } else {
        vec![None; df.height()]
    };

    let mut markets = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let id = match &ids[i] {
            Some(id) => id.clone(),
            None => {
                warn!(row = i, "markets.csv row without market_id skipped");
                continue;
            }
        };
        let date = match dates[i].as_deref().and_then(parse_date) {
            Some(d) => d,
            None => {
                warn!(market_id = %id, "unparsable market date, row skipped");
                continue;
            }
        };
        let status = match statuses[i].as_deref().and_then(MarketStatus::parse) {
            Some(s) => s,
            None => {
                warn!(market_id = %id, status = ?statuses[i], "unknown market status, row skipped");
                continue;
            }
        };
        let count = counts[i].filter(|c| *c >= 0).unwrap_or(0) as usize;
        let currency = currencies[i].clone().unwrap_or_default();

        markets.push(Market::new(id, date, count, status, currency));
    }

    debug!(rows = df.height(), loaded = markets.len(), "loaded markets");
    Ok(markets)
}

/// Load pool snapshots taken at or before `as_of`
pub fn load_pools(
    path: impl AsRef<Path>,
    as_of: Option<DateTime<Utc>>,
) -> Result<Vec<(MarketId, PoolSnapshot)>> {
    let df = read_csv(path.as_ref())?;
    let ids = string_column(&df, "market_id")?;
    let stamps = string_column(&df, "as_of")?;
    let gross = f64_column(&df, "gross")?;
    let net = f64_column(&df, "net")?;
    let rollover = f64_column(&df, "rollover")?;
    let takeout = f64_column(&df, "takeout")?;

    let mut pools = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(id), Some(ts)) = (&ids[i], stamps[i].as_deref().and_then(parse_timestamp)) else {
            warn!(row = i, "pools.csv row without market_id or timestamp skipped");
            continue;
        };
        if !not_after(Some(ts), as_of) {
            continue;
        }
        let Some(gross) = gross[i].filter(|g| g.is_finite() && *g >= 0.0) else {
            warn!(market_id = %id, "pool snapshot without a usable gross total skipped");
            continue;
        };
        pools.push((
            id.clone(),
            PoolSnapshot {
                as_of: ts,
                gross,
                net: net[i].unwrap_or(0.0),
                rollover: rollover[i].unwrap_or(0.0),
                takeout: takeout[i].unwrap_or(f64::NAN),
            },
        ));
    }

    Ok(pools)
}

/// Load model win probabilities
pub fn load_model_probabilities(path: impl AsRef<Path>) -> Result<Vec<ProbabilityRow>> {
    let df = read_csv(path.as_ref())?;
    let market_ids = string_column(&df, "market_id")?;
    let competitor_ids = string_column(&df, "competitor_id")?;
    let probabilities = f64_column(&df, "probability")?;
    let numbers = if has_column(&df, "program_number") {
        i64_column(&df, "program_number")?
    } else {
        vec![None; df.height()]
    };

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(market_id), Some(competitor_id), Some(probability)) =
            (&market_ids[i], &competitor_ids[i], probabilities[i])
        else {
            warn!(row = i, "incomplete model probability row skipped");
            continue;
        };
        rows.push(ProbabilityRow {
            market_id: market_id.clone(),
            competitor_id: competitor_id.clone(),
            program_number: numbers[i].and_then(|n| u32::try_from(n).ok()),
            probability,
        });
    }

    Ok(rows)
}

/// Latest decimal odds per (market, competitor), at or before `as_of`
pub fn load_odds(
    path: impl AsRef<Path>,
    as_of: Option<DateTime<Utc>>,
) -> Result<HashMap<(MarketId, CompetitorId), f64>> {
    let df = read_csv(path.as_ref())?;
    let market_ids = string_column(&df, "market_id")?;
    let competitor_ids = string_column(&df, "competitor_id")?;
    let odds = f64_column(&df, "decimal_odds")?;
    let stamps: Vec<Option<DateTime<Utc>>> = if has_column(&df, "as_of") {
        string_column(&df, "as_of")?
            .iter()
            .map(|s| s.as_deref().and_then(parse_timestamp))
            .collect()
    } else {
        vec![None; df.height()]
    };

    let mut latest: HashMap<(MarketId, CompetitorId), (Option<DateTime<Utc>>, f64)> =
        HashMap::new();
    for i in 0..df.height() {
        let (Some(market_id), Some(competitor_id), Some(price)) =
            (&market_ids[i], &competitor_ids[i], odds[i])
        else {
            continue;
        };
        if !not_after(stamps[i], as_of) {
            continue;
        }
        let key = (market_id.clone(), competitor_id.clone());
        match latest.get(&key) {
            Some((Some(seen), _)) if stamps[i].map_or(true, |ts| ts < *seen) => {}
            _ => {
                latest.insert(key, (stamps[i], price));
            }
        }
    }

    Ok(latest.into_iter().map(|(k, (_, price))| (k, price)).collect())
}

/// Declared dividend per unit stake
pub fn load_dividends(path: impl AsRef<Path>) -> Result<HashMap<MarketId, f64>> {
    let df = read_csv(path.as_ref())?;
    let ids = string_column(&df, "market_id")?;
    let dividends = f64_column(&df, "dividend")?;

    Ok(ids
        .into_iter()
        .zip(dividends)
        .filter_map(|(id, d)| Some((id?, d.filter(|d| d.is_finite() && *d >= 0.0)?)))
        .collect())
}

/// Finishing positions validated into results; rejected markets are logged and skipped
pub fn load_results(
    path: impl AsRef<Path>,
    dividends: &HashMap<MarketId, f64>,
) -> Result<Vec<HistoricalResult>> {
    let df = read_csv(path.as_ref())?;
    let market_ids = string_column(&df, "market_id")?;
    let competitor_ids = string_column(&df, "competitor_id")?;
    let positions = i64_column(&df, "position")?;

    let mut placings: HashMap<MarketId, Vec<(CompetitorId, u8)>> = HashMap::new();
    for i in 0..df.height() {
        let (Some(market_id), Some(competitor_id), Some(position)) =
            (&market_ids[i], &competitor_ids[i], positions[i])
        else {
            continue;
        };
        let Ok(position) = u8::try_from(position) else {
            continue;
        };
        placings
            .entry(market_id.clone())
            .or_default()
            .push((competitor_id.clone(), position));
    }

    let mut market_ids: Vec<MarketId> = placings.keys().cloned().collect();
    market_ids.sort();

    let mut results = Vec::with_capacity(market_ids.len());
    for market_id in market_ids {
        let dividend = dividends.get(&market_id).copied();
        match HistoricalResult::from_placings(market_id.clone(), &placings[&market_id], dividend) {
            Ok(result) => results.push(result),
            Err(rejection) => {
                warn!(market_id = %market_id, reason = %rejection, "historical result rejected")
            }
        }
    }

    Ok(results)
}

/// Load every available file in `dir` into a store
pub fn load_directory(dir: impl AsRef<Path>, as_of: Option<DateTime<Utc>>) -> Result<MarketStore> {
    let dir = dir.as_ref();
    let mut store = MarketStore::new();

    for market in load_markets(dir.join(MARKETS_FILE))? {
        store.insert_market(market);
    }

    let pools_path = dir.join(POOLS_FILE);
    if pools_path.exists() {
        for (market_id, snapshot) in load_pools(&pools_path, as_of)? {
            if let Some(market) = store.market_mut(&market_id) {
                market.push_pool(snapshot);
            }
        }
    }

    let probabilities_path = dir.join(PROBABILITIES_FILE);
    if probabilities_path.exists() {
        for row in load_model_probabilities(&probabilities_path)? {
            let signal = store.signal_mut(&row.market_id, &row.competitor_id);
            signal.model_probability = Some(row.probability);
            if row.program_number.is_some() {
                signal.program_number = row.program_number;
            }
        }
    }

    let odds_path = dir.join(ODDS_FILE);
    if odds_path.exists() {
        let mut odds: Vec<_> = load_odds(&odds_path, as_of)?.into_iter().collect();
        odds.sort_by(|a, b| a.0.cmp(&b.0));
        for ((market_id, competitor_id), price) in odds {
            store.signal_mut(&market_id, &competitor_id).decimal_odds = Some(price);
        }
    }

    let dividends_path = dir.join(DIVIDENDS_FILE);
    let dividends = if dividends_path.exists() {
        load_dividends(&dividends_path)?
    } else {
        HashMap::new()
    };

    let results_path = dir.join(RESULTS_FILE);
    if results_path.exists() {
        for result in load_results(&results_path, &dividends)? {
            store.insert_result(result);
        }
    }

    info!(
        dir = %dir.display(),
        markets = store.len(),
        results = store.result_count(),
        "loaded market data"
    );
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::store::MarketSource;
    use chrono::TimeZone;
    use std::fs;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            MARKETS_FILE,
            "market_id,date,competitor_count,status,currency\n\
             M1,2024-05-01,5,SETTLED,GBP\n\
             M2,2024-05-02,4,OPEN,GBP\n\
             M3,not-a-date,4,OPEN,GBP\n",
        );
        write(
            dir.path(),
            POOLS_FILE,
            "market_id,as_of,gross,net,rollover,takeout\n\
             M1,2024-05-01T12:00:00Z,800,560,0,0.3\n\
             M1,2024-05-01T13:00:00Z,1200,840,50,0.3\n",
        );
        write(
            dir.path(),
            PROBABILITIES_FILE,
            "market_id,competitor_id,probability,program_number\n\
             M1,1,0.35,1\n\
             M1,2,0.25,2\n\
             M1,3,0.2,3\n\
             M1,4,0.15,4\n",
        );
        write(
            dir.path(),
            ODDS_FILE,
            "market_id,competitor_id,decimal_odds,as_of\n\
             M1,5,15.0,2024-05-01T12:00:00Z\n\
             M1,5,21.0,2024-05-01T13:00:00Z\n\
             M1,1,2.8,2024-05-01T12:00:00Z\n",
        );
        write(
            dir.path(),
            RESULTS_FILE,
            "market_id,competitor_id,position\n\
             M1,2,1\n\
             M1,1,2\n\
             M1,3,3\n\
             M1,5,4\n\
             M1,4,5\n\
             M2,1,1\n\
             M2,2,1\n\
             M2,3,3\n\
             M2,4,4\n",
        );
        write(dir.path(), DIVIDENDS_FILE, "market_id,dividend\nM1,412.5\n");
        dir
    }

    #[test]
    fn test_load_directory() {
        let dir = fixture();
        let store = load_directory(dir.path(), None).unwrap();

        // M3 has an unparsable date
        assert_eq!(store.len(), 2);

        let m1 = store.market("M1").unwrap();
        assert_eq!(m1.pools.len(), 2);
        assert_eq!(m1.latest_pool().unwrap().gross, 1200.0);

        let signals = store.signals("M1");
        assert_eq!(signals.len(), 5);
        let c1 = signals.iter().find(|s| s.competitor_id == "1").unwrap();
        assert_eq!(c1.model_probability, Some(0.35));
        assert_eq!(c1.decimal_odds, Some(2.8));
        assert_eq!(c1.program_number, Some(1));
        let c5 = signals.iter().find(|s| s.competitor_id == "5").unwrap();
        assert_eq!(c5.decimal_odds, Some(21.0));

        let result = store.result("M1").unwrap();
        assert_eq!(result.finish, ["2", "1", "3", "5"].map(String::from));
        assert_eq!(result.dividend, Some(412.5));

        // dead heat for first
        assert!(store.result("M2").is_none());
    }

    #[test]
    fn test_as_of_filters_snapshots() {
        let dir = fixture();
        let as_of = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let store = load_directory(dir.path(), Some(as_of)).unwrap();

        let m1 = store.market("M1").unwrap();
        assert_eq!(m1.pools.len(), 1);
        assert_eq!(m1.latest_pool().unwrap().gross, 800.0);

        let c5 = store
            .signals("M1")
            .iter()
            .find(|s| s.competitor_id == "5")
            .unwrap()
            .decimal_odds;
        assert_eq!(c5, Some(15.0));
    }

    #[test]
    fn test_missing_optional_files() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            MARKETS_FILE,
            "market_id,date,competitor_count,status\nM1,20240501,6,CLOSED\n",
        );
        let store = load_directory(dir.path(), None).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.signals("M1").is_empty());
        assert_eq!(store.market("M1").unwrap().status, MarketStatus::Closed);
    }

    #[test]
    fn test_missing_markets_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_directory(dir.path(), None).is_err());
    }

    #[test]
    fn test_parse_timestamp() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T13:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T15:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 13:00:00"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_parse_date() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1);
        assert_eq!(parse_date("2024-05-01"), expected);
        assert_eq!(parse_date("20240501"), expected);
        assert_eq!(parse_date("05/01/2024"), None);
    }
}
