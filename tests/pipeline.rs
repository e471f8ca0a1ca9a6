//! End-to-end: loaders -> estimator -> enumerator -> viability -> backtester

use std::fs;
use std::io::Write;
use std::path::Path;

use superfecta::backtesting::{SkipReason, SyntheticMarketGenerator};
use superfecta::core::{Crossing, EvaluationMode, PoolEconomics};
use superfecta::data::MarketSource;
use superfecta::{load_directory, BacktestConfig, Backtester, EngineConfig, RaceCard, RiskPreset};

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

fn data_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "markets.csv",
        "market_id,date,competitor_count,status,currency\n\
         M1,2024-06-01,5,SETTLED,GBP\n\
         M2,2024-06-02,5,SETTLED,GBP\n\
         M3,2024-06-03,5,OPEN,GBP\n",
    );
    write(
        dir.path(),
        "pools.csv",
        "market_id,as_of,gross,net,rollover,takeout\n\
         M1,2024-06-01T14:00:00Z,1000,700,0,0.3\n\
         M3,2024-06-03T14:00:00Z,400,280,150,0.3\n",
    );
    let mut probabilities = String::from("market_id,competitor_id,probability,program_number\n");
    for market in ["M1", "M2", "M3"] {
        for (n, p) in [0.35, 0.25, 0.2, 0.15, 0.05].iter().enumerate() {
            probabilities.push_str(&format!("{},{},{},{}\n", market, n + 1, p, n + 1));
        }
    }
    write(dir.path(), "model_probabilities.csv", &probabilities);
    write(
        dir.path(),
        "results.csv",
        "market_id,competitor_id,position\n\
         M1,1,1\nM1,2,2\nM1,3,3\nM1,4,4\nM1,5,5\n\
         M2,2,1\nM2,1,2\nM2,3,3\nM2,4,4\nM2,5,5\n",
    );
    write(dir.path(), "dividends.csv", "market_id,dividend\nM1,50\nM2,80\n");
    dir
}

#[test]
fn test_directory_to_viability() {
    let dir = data_dir();
    let store = load_directory(dir.path(), None).unwrap();
    let config = EngineConfig::default();

    let market = store.market("M1").unwrap();
    let strengths = config.estimator().estimate(&market.id, store.signals("M1")).unwrap();
    let lines = config.enumerator().unwrap().enumerate(&strengths).unwrap();

    assert_eq!(lines.len(), 120);
    assert!((lines.total_probability() - 1.0).abs() < 1e-9);
    assert_eq!(lines.top().unwrap().competitors, ["1", "2", "3", "4"].map(String::from));

    let economics = PoolEconomics::for_market(market, None, &config.economics).unwrap();
    let calc = config.calculator(economics).unwrap();

    // Full coverage with our stake in the pool returns (1 - t) of it
    let full = calc.evaluate_basic(&lines, lines.len()).unwrap();
    assert!((full.total_stake - 12.0).abs() < 1e-9);
    assert!((full.pool_after_bet - 708.4).abs() < 1e-9);
    assert!((full.expected_return - 8.4).abs() < 1e-9);
    assert!(!full.viable);
    assert_eq!(calc.break_even_pool(lines.len()), Crossing::NeverPositive);

    let grid = calc.grid(&lines, 4, EvaluationMode::Advanced).unwrap();
    assert_eq!(grid.len(), 4);
    assert!(grid.windows(2).all(|w| w[0].lines_covered < w[1].lines_covered));
}

#[test]
fn test_directory_backtest() {
    let dir = data_dir();
    let store = load_directory(dir.path(), None).unwrap();
    let (from, to) = store.date_range().unwrap();

    let config = BacktestConfig::from_engine(&EngineConfig::default(), from, to);
    let report = Backtester::new(config).unwrap().run(&store).unwrap();

    let ids: Vec<&str> = report.evaluations.iter().map(|e| e.market_id.as_str()).collect();
    assert_eq!(ids, vec!["M1", "M2"]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].reason, SkipReason::NotSettled);

    let m2 = &report.evaluations[1];
    assert!(!m2.hit_at_1);
    assert!(m2.hit_at_coverage);
    assert_eq!(m2.lines_covered, 12);

    let s = &report.summary;
    assert!((s.hit_rate_at_1 - 0.5).abs() < 1e-12);
    assert_eq!(s.total_staked, 2.0);
    assert_eq!(s.total_returned, 50.0);
    assert!((s.roi_at_1 - 24.0).abs() < 1e-12);
}

#[test]
fn test_dominant_markets_always_hit() {
    let store = SyntheticMarketGenerator::new(99).dominant_store(25, 8);
    let (from, to) = store.date_range().unwrap();
    let config = BacktestConfig {
        from,
        to,
        ..Default::default()
    };

    let report = Backtester::new(config).unwrap().run(&store).unwrap();
    assert_eq!(report.summary.markets_evaluated, 25);
    assert_eq!(report.summary.hit_rate_at_1, 1.0);
    assert_eq!(report.summary.hit_rate_at_coverage, 1.0);
}

#[test]
fn test_race_card_with_preset() {
    let card = r#"{
        "market": {
            "id": "NEW-1915",
            "date": "2024-06-10",
            "competitor_count": 6,
            "status": "OPEN",
            "currency": "GBP",
            "pools": [
                { "as_of": "2024-06-10T19:00:00Z", "gross": 600.0, "net": 420.0, "rollover": 900.0, "takeout": 0.3 }
            ]
        },
        "competitors": [
            { "competitor_id": "1", "program_number": 1, "decimal_odds": 2.5 },
            { "competitor_id": "2", "program_number": 2, "decimal_odds": 4.0 },
            { "competitor_id": "3", "program_number": 3, "decimal_odds": 5.0 },
            { "competitor_id": "4", "program_number": 4, "decimal_odds": 8.0 },
            { "competitor_id": "5", "program_number": 5, "decimal_odds": 12.0 },
            { "competitor_id": "6", "program_number": 6, "decimal_odds": 20.0 }
        ]
    }"#;
    let mut card_file = tempfile::NamedTempFile::new().unwrap();
    card_file.write_all(card.as_bytes()).unwrap();
    let mut config_file = tempfile::NamedTempFile::new().unwrap();
    config_file
        .write_all(b"preset = \"balanced\"\n\n[economics]\nstake_per_line = 0.5\n")
        .unwrap();

    let config = EngineConfig::load(config_file.path()).unwrap();
    assert_eq!(config.preset, Some(RiskPreset::Balanced));

    let card = RaceCard::load(card_file.path()).unwrap();
    let strengths = config.estimator().estimate(&card.market.id, &card.competitors).unwrap();
    let lines = config.enumerator().unwrap().enumerate(&strengths).unwrap();
    assert_eq!(lines.len(), 360);

    let economics = PoolEconomics::for_market(&card.market, None, &config.economics).unwrap();
    assert_eq!(economics.rollover, 900.0);
    assert_eq!(economics.stake_per_line, 0.5);
    let calc = config.calculator(economics).unwrap();

    // A large rollover against a small pool makes full coverage profitable
    let full = calc.evaluate_basic(&lines, lines.len()).unwrap();
    assert!(full.viable);
    assert_eq!(calc.min_coverage_fraction(lines.len()), Crossing::AlwaysPositive);

    let best = calc
        .optimal_coverage(&lines, 10, EvaluationMode::Advanced)
        .unwrap()
        .unwrap();
    let grid = calc.grid(&lines, 10, EvaluationMode::Advanced).unwrap();
    assert!(grid.iter().all(|s| s.expected_profit <= best.expected_profit + 1e-9));
}
