//! Synthetic Market Generation
//!
//! Settled markets drawn from the sequential-choice model itself, for
//! backtests when no historical data is at hand.
//!
//! Finishing orders are sampled by four weighted draws without replacement,
//! and each market pays the fair pari-mutuel dividend of its actual line:
//!
//! ```text
//!     dividend = (1 - takeout) / P(actual line)
//! ```

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::permutations::line_probability;
use crate::data::MarketStore;
use crate::models::{
    CompetitorSignal, HistoricalResult, Market, MarketStatus, PoolSnapshot, LINE_DEPTH,
};

/// Generated market with its signals and settled result
#[derive(Debug, Clone)]
pub struct SyntheticMarket {
    pub market: Market,
    pub signals: Vec<CompetitorSignal>,
    pub result: HistoricalResult,
}

/// Seeded synthetic market generator
pub struct SyntheticMarketGenerator {
    rng: StdRng,
    /// Commission rate (takeout)
    takeout: f64,
    /// Relative noise applied to model probabilities (0 = perfect model)
    model_noise: f64,
    start_date: NaiveDate,
}

impl SyntheticMarketGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            takeout: 0.30,
            model_noise: 0.0,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN),
        }
    }

    pub fn with_takeout(mut self, takeout: f64) -> Self {
        self.takeout = takeout.clamp(0.0, 1.0);
        self
    }

    pub fn with_model_noise(mut self, noise: f64) -> Self {
        self.model_noise = noise.clamp(0.0, 0.95);
        self
    }

    pub fn with_start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = date;
        self
    }

    /// Random positive strengths normalized to win probabilities
    pub fn random_strengths(&mut self, runners: usize) -> Vec<f64> {
        let raw: Vec<f64> = (0..runners)
            .map(|_| self.rng.gen_range(0.05_f64..1.0).powi(3))
            .collect();
        let total: f64 = raw.iter().sum();
        raw.into_iter().map(|s| s / total).collect()
    }

    /// Sample a finishing order (indices into `strengths`)
    pub fn sample_finish(&mut self, strengths: &[f64]) -> [usize; LINE_DEPTH] {
        let mut remaining: Vec<usize> = (0..strengths.len()).collect();
        let mut finish = [0usize; LINE_DEPTH];

        for slot in finish.iter_mut() {
            let total: f64 = remaining.iter().map(|&i| strengths[i]).sum();
            let mut target = self.rng.gen::<f64>() * total;
            let mut pick = remaining.len() - 1;
            for (pos, &i) in remaining.iter().enumerate() {
                if target < strengths[i] {
                    pick = pos;
                    break;
                }
                target -= strengths[i];
            }
            *slot = remaining.remove(pick);
        }

        finish
    }

    /// One settled market over `strengths` (at least four)
    pub fn generate_market(&mut self, id: &str, date: NaiveDate, strengths: &[f64]) -> SyntheticMarket {
        let total: f64 = strengths.iter().sum();
        let finish = self.sample_finish(strengths);
        let names: Vec<String> = (1..=strengths.len()).map(|n| format!("R{:02}", n)).collect();

        let p_line = line_probability(strengths, finish);
        let dividend = (p_line > 0.0).then(|| (1.0 - self.takeout) / p_line);

        let signals: Vec<CompetitorSignal> = strengths
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let p_win = s / total;
                let noise = if self.model_noise > 0.0 {
                    1.0 + self.model_noise * self.rng.gen_range(-1.0..1.0)
                } else {
                    1.0
                };
                CompetitorSignal::new(names[i].clone())
                    .with_number(i as u32 + 1)
                    .with_probability(p_win * noise)
                    .with_odds(((1.0 - self.takeout) / p_win).max(1.01))
            })
            .collect();

        let gross = self.rng.gen_range(500.0..5_000.0);
        let post_time = date
            .and_hms_opt(14, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .unwrap_or_default();

        let mut market = Market::new(id, date, strengths.len(), MarketStatus::Settled, "GBP");
        market.push_pool(PoolSnapshot {
            as_of: post_time,
            gross,
            net: gross * (1.0 - self.takeout),
            rollover: 0.0,
            takeout: self.takeout,
        });

        SyntheticMarket {
            market,
            signals,
            result: HistoricalResult {
                market_id: id.to_string(),
                finish: finish.map(|i| names[i].clone()),
                dividend,
            },
        }
    }

    /// `markets` random markets of `runners` competitors, one per day
    pub fn generate_store(&mut self, markets: usize, runners: usize) -> MarketStore {
        let mut store = MarketStore::new();
        for n in 0..markets {
            let strengths = self.random_strengths(runners);
            let date = self.start_date + Duration::days(n as i64);
            let generated = self.generate_market(&format!("SYN-{:05}", n + 1), date, &strengths);
            insert(&mut store, generated);
        }
        store
    }

    /// Markets where each rank outweighs the next by ten orders of magnitude
    pub fn dominant_store(&mut self, markets: usize, runners: usize) -> MarketStore {
        let strengths: Vec<f64> = (0..runners)
            .map(|i| 10f64.powi(40 - 10 * i.min(4) as i32))
            .collect();
        let mut store = MarketStore::new();
        for n in 0..markets {
            let date = self.start_date + Duration::days(n as i64);
            let generated = self.generate_market(&format!("DOM-{:05}", n + 1), date, &strengths);
            insert(&mut store, generated);
        }
        store
    }
}

fn insert(store: &mut MarketStore, generated: SyntheticMarket) {
    store.set_signals(generated.market.id.clone(), generated.signals);
    store.insert_market(generated.market);
    store.insert_result(generated.result);
}
