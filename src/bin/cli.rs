//! Superfecta CLI - line ranking, pool viability and backtesting

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use superfecta::backtesting::{
    analyze_by_field_size, BacktestConfig, BacktestReport, Backtester, SyntheticMarketGenerator,
};
use superfecta::config::{EngineConfig, RiskPreset, StakePlan};
use superfecta::core::{
    screen_market, AdvancedScenario, CoveragePoint, Crossing, EvaluationMode,
    PermutationEnumerator, PoolEconomics, RankedLines, ScreenDecision, ViabilityCalculator,
};
use superfecta::data::{csv_loader::parse_timestamp, load_directory, RaceCard};
use superfecta::models::{RankedLine, ViabilityScenario};

/// Coverage fractions shown under a ranking
const CURVE_POINTS: [f64; 6] = [0.01, 0.05, 0.10, 0.25, 0.50, 1.0];

#[derive(Parser)]
#[command(name = "superfecta-cli")]
#[command(author, version, about = "Superfecta line ranking, pool viability and backtesting", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine configuration (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Risk preset: conservative, balanced or aggressive
    #[arg(long, global = true)]
    preset: Option<RiskPreset>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank every line of one market
    Rank {
        /// Race card JSON
        #[arg(long)]
        card: PathBuf,

        /// Candidate competitors (4-12)
        #[arg(long)]
        top_n: Option<usize>,

        /// Number of lines to show
        #[arg(long, default_value = "20")]
        show: usize,
    },

    /// Price a coverage level in one market
    Viability {
        #[arg(long)]
        card: PathBuf,

        /// Number of top lines to buy
        #[arg(long, conflicts_with = "coverage")]
        lines: Option<usize>,

        /// Coverage fraction (0-1)
        #[arg(long)]
        coverage: Option<f64>,

        /// Concentrated staking with market impact
        #[arg(long)]
        advanced: bool,

        /// Evaluate K evenly spaced coverage levels instead
        #[arg(long)]
        grid: Option<usize>,

        /// Fixed pool share instead of the automatic one
        #[arg(long)]
        share: Option<f64>,

        #[arg(long)]
        top_n: Option<usize>,

        /// Use the pool snapshot at or before this timestamp
        #[arg(long)]
        as_of: Option<String>,
    },

    /// Search the coverage grid for the best expected profit
    Optimize {
        #[arg(long)]
        card: PathBuf,

        #[arg(long)]
        steps: Option<usize>,

        /// Also report the smallest coverage reaching this profit
        #[arg(long)]
        target_profit: Option<f64>,

        /// Bank to size stakes from with the active preset
        #[arg(long)]
        bankroll: Option<f64>,

        /// Use uniform staking instead of the advanced mode
        #[arg(long)]
        basic: bool,

        #[arg(long)]
        top_n: Option<usize>,
    },

    /// Replay the ranking against settled markets
    Backtest {
        /// Directory with markets.csv, results.csv, ...
        #[arg(long)]
        data_dir: PathBuf,

        /// First market date (YYYY-MM-DD, default: earliest)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last market date (YYYY-MM-DD, default: latest)
        #[arg(long)]
        to: Option<NaiveDate>,

        #[arg(long)]
        top_n: Option<usize>,

        #[arg(long)]
        coverage: Option<f64>,

        /// Ignore odds and pool snapshots taken after this timestamp
        #[arg(long)]
        as_of: Option<String>,

        /// Break results down by field size
        #[arg(long)]
        by_field: bool,
    },

    /// Backtest on synthetic markets drawn from the model itself
    Simulate {
        #[arg(long, default_value = "200")]
        markets: usize,

        #[arg(long, default_value = "42")]
        seed: u64,

        #[arg(long, default_value = "8")]
        runners: usize,

        /// Relative noise on model probabilities (0 = perfect model)
        #[arg(long, default_value = "0.0")]
        noise: f64,

        #[arg(long)]
        top_n: Option<usize>,

        #[arg(long)]
        coverage: Option<f64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref(), cli.preset)?;

    match cli.command {
        Commands::Rank { card, top_n, show } => rank(&config, &card, top_n, show, cli.json),
        Commands::Viability {
            card,
            lines,
            coverage,
            advanced,
            grid,
            share,
            top_n,
            as_of,
        } => {
            let request = ViabilityRequest {
                lines,
                coverage,
                mode: if advanced {
                    EvaluationMode::Advanced
                } else {
                    EvaluationMode::Basic
                },
                grid,
                share,
                top_n,
                as_of,
            };
            viability(&config, &card, request, cli.json)
        }
        Commands::Optimize {
            card,
            steps,
            target_profit,
            bankroll,
            basic,
            top_n,
        } => {
            let mode = if basic {
                EvaluationMode::Basic
            } else {
                EvaluationMode::Advanced
            };
            let request = OptimizeRequest {
                steps,
                target_profit,
                bankroll,
                mode,
                top_n,
            };
            optimize(&config, &card, request, cli.json)
        }
        Commands::Backtest {
            data_dir,
            from,
            to,
            top_n,
            coverage,
            as_of,
            by_field,
        } => backtest(
            &config,
            &data_dir,
            (from, to),
            top_n,
            coverage,
            as_of.as_deref(),
            by_field,
            cli.json,
        ),
        Commands::Simulate {
            markets,
            seed,
            runners,
            noise,
            top_n,
            coverage,
        } => simulate(&config, markets, seed, runners, noise, top_n, coverage, cli.json),
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("logging already initialised");
    }
}

fn load_config(path: Option<&Path>, preset: Option<RiskPreset>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?,
        None => EngineConfig::default(),
    };
    Ok(match preset {
        Some(preset) => config.with_preset(preset),
        None => config,
    })
}

fn parse_as_of(value: Option<&str>) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
    value
        .map(|v| parse_timestamp(v).with_context(|| format!("Invalid --as-of timestamp: {}", v)))
        .transpose()
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Load a card and rank its lines
fn ranked_card(config: &EngineConfig, card: &Path, top_n: Option<usize>) -> Result<(RaceCard, RankedLines)> {
    let card = RaceCard::load(card)
        .with_context(|| format!("Failed to load race card: {}", card.display()))?;
    let strengths = config
        .estimator()
        .estimate(&card.market.id, &card.competitors)
        .with_context(|| format!("Cannot rank market {}", card.market.id))?;
    let enumerator = match top_n {
        Some(n) => PermutationEnumerator::new(n)?,
        None => config.enumerator()?,
    };
    let lines = enumerator.enumerate(&strengths)?;
    Ok((card, lines))
}

/// Line as program numbers where known
fn line_label(lines: &RankedLines, line: &RankedLine) -> String {
    let labels: HashMap<&str, String> = lines
        .candidates
        .iter()
        .map(|c| (c.id.as_str(), c.label()))
        .collect();
    line.competitors
        .iter()
        .map(|id| labels.get(id.as_str()).cloned().unwrap_or_else(|| id.clone()))
        .collect::<Vec<_>>()
        .join("-")
}

fn crossing_label(crossing: Crossing, fmt: impl Fn(f64) -> String) -> String {
    match crossing {
        Crossing::At(x) => fmt(x),
        Crossing::AlwaysPositive => "always positive".green().to_string(),
        Crossing::NeverPositive => "never positive".red().to_string(),
        Crossing::Undefined => "undefined".yellow().to_string(),
    }
}

#[derive(Serialize)]
struct RankOutput<'a> {
    market_id: &'a str,
    total_lines: usize,
    retained_probability: f64,
    lines: &'a [RankedLine],
    coverage: Vec<CoveragePoint>,
}

fn curve_points(lines: &RankedLines) -> Vec<CoveragePoint> {
    let curve = lines.coverage_curve();
    CURVE_POINTS
        .iter()
        .filter_map(|alpha| {
            let m = lines.lines_for_coverage(*alpha);
            m.checked_sub(1).and_then(|i| curve.get(i).cloned())
        })
        .collect()
}

fn rank(config: &EngineConfig, card: &Path, top_n: Option<usize>, show: usize, json: bool) -> Result<()> {
    let (card, lines) = ranked_card(config, card, top_n)?;
    let shown = lines.covered(show);

    if json {
        return print_json(&RankOutput {
            market_id: &card.market.id,
            total_lines: lines.len(),
            retained_probability: lines.total_probability(),
            lines: shown,
            coverage: curve_points(&lines),
        });
    }

    println!(
        "{} {} ({} on {}, {} candidates, {} lines)",
        "Ranking".green(),
        card.market.id.bold(),
        card.market.status,
        card.market.date,
        lines.candidates.len(),
        lines.len()
    );
    println!();

    println!("{}", "Candidates:".yellow().bold());
    println!("{:>6} {:>12} {:>10}", "No.", "Strength", "Odds");
    println!("{}", "-".repeat(30));
    for c in &lines.candidates {
        let odds = c
            .decimal_odds
            .map(|o| format!("{:.2}", o))
            .unwrap_or_else(|| "-".to_string());
        println!("{:>6} {:>12.6} {:>10}", c.label(), c.strength, odds);
    }
    println!();

    println!("{}", "Top lines:".yellow().bold());
    println!("{:>6} {:>16} {:>12} {:>12}", "Rank", "Line", "Prob", "Cumulative");
    println!("{}", "-".repeat(50));
    for line in shown {
        println!(
            "{:>6} {:>16} {:>11.4}% {:>11.2}%",
            line.rank,
            line_label(&lines, line),
            line.probability * 100.0,
            line.cumulative_probability * 100.0
        );
    }
    println!();

    println!("{}", "Coverage curve:".yellow().bold());
    println!("{:>8} {:>8} {:>12} {:>12}", "Cover", "Lines", "Hit prob", "Efficiency");
    println!("{}", "-".repeat(44));
    for point in curve_points(&lines) {
        println!(
            "{:>7.1}% {:>8} {:>11.2}% {:>11.2}x",
            point.lines_fraction * 100.0,
            point.lines,
            point.cumulative_probability * 100.0,
            point.efficiency
        );
    }

    Ok(())
}

struct ViabilityRequest {
    lines: Option<usize>,
    coverage: Option<f64>,
    mode: EvaluationMode,
    grid: Option<usize>,
    share: Option<f64>,
    top_n: Option<usize>,
    as_of: Option<String>,
}

/// Economics from the card's pool snapshot, config defaults when it has none
fn card_economics(config: &EngineConfig, card: &RaceCard, as_of: Option<&str>, share: Option<f64>) -> Result<PoolEconomics> {
    let as_of = parse_as_of(as_of)?;
    let economics = match PoolEconomics::for_market(&card.market, as_of, &config.economics) {
        Ok(economics) => economics,
        Err(e) => {
            warn!(market_id = %card.market.id, error = %e, "using configured pool economics");
            config.economics.clone()
        }
    };
    Ok(match share {
        Some(f) => economics.with_pool_share(Some(f)),
        None => economics,
    })
}

#[derive(Serialize)]
struct ViabilityOutput {
    scenarios: Vec<ViabilityScenario>,
    #[serde(skip_serializing_if = "Option::is_none")]
    advanced: Option<AdvancedScenario>,
    break_even_pool: Crossing,
    min_coverage_fraction: Crossing,
    screen: ScreenDecision,
}

fn viability(config: &EngineConfig, card: &Path, request: ViabilityRequest, json: bool) -> Result<()> {
    let (card, lines) = ranked_card(config, card, request.top_n)?;
    let economics = card_economics(config, &card, request.as_of.as_deref(), request.share)?;
    let calc = config.calculator(economics)?;

    let mut advanced = None;
    let scenarios = match request.grid {
        Some(steps) => calc.grid(&lines, steps, request.mode)?,
        None => {
            let m = match (request.lines, request.coverage) {
                (Some(m), _) => m,
                (None, coverage) => {
                    let alpha = coverage.unwrap_or(config.backtest.coverage_fraction);
                    if !(0.0..=1.0).contains(&alpha) {
                        anyhow::bail!("--coverage must be between 0 and 1, got {}", alpha);
                    }
                    lines.lines_for_coverage(alpha)
                }
            };
            match request.mode {
                EvaluationMode::Basic => vec![calc.evaluate_basic(&lines, m)?],
                EvaluationMode::Advanced => {
                    let scenario = calc.evaluate_advanced(&lines, m)?;
                    let basic = scenario.scenario.clone();
                    advanced = Some(scenario);
                    vec![basic]
                }
            }
        }
    };

    let output = ViabilityOutput {
        scenarios,
        advanced,
        break_even_pool: calc.break_even_pool(lines.len()),
        min_coverage_fraction: calc.min_coverage_fraction(lines.len()),
        screen: screen_market(&card.market, &calc.economics, Some(&lines), &config.screen),
    };

    if json {
        return print_json(&output);
    }

    print_economics(&card, &calc);
    print_scenarios(&output.scenarios);

    if let Some(advanced) = &output.advanced {
        println!();
        println!("{}", "Staking plan (top 10):".yellow().bold());
        println!("{:>6} {:>16} {:>10} {:>10} {:>12} {:>8}", "Rank", "Line", "Prob", "Stake", "Others", "Share");
        println!("{}", "-".repeat(67));
        for row in advanced.plan.iter().take(10) {
            let line = RankedLine {
                rank: row.rank,
                competitors: row.competitors.clone(),
                probability: row.probability,
                cumulative_probability: 0.0,
            };
            println!(
                "{:>6} {:>16} {:>9.3}% {:>10.2} {:>12.2} {:>7.1}%",
                row.rank,
                line_label(&lines, &line),
                row.probability * 100.0,
                row.stake,
                row.others_money,
                row.pool_share * 100.0
            );
        }
    }

    println!();
    println!(
        "Break-even pool (full coverage): {}",
        crossing_label(output.break_even_pool, |o| format!("{:.2}", o))
    );
    println!(
        "Minimum profitable coverage:     {}",
        crossing_label(output.min_coverage_fraction, |a| format!("{:.2}%", a * 100.0))
    );
    if output.screen.accepted {
        println!("Screen:                          {}", "accepted".green());
    } else {
        println!(
            "Screen:                          {} ({})",
            "rejected".red(),
            output.screen.reason_summary()
        );
    }

    Ok(())
}

fn print_economics(card: &RaceCard, calc: &ViabilityCalculator) {
    let e = &calc.economics;
    println!("{} {}", "Market".green(), card.market.id.bold());
    println!(
        "Pool: {:.2} {}  rollover {:.2}  takeout {:.1}%  stake/line {:.2}  share {}",
        e.others_pool,
        card.market.currency,
        e.rollover,
        e.takeout * 100.0,
        e.stake_per_line,
        e.pool_share_override
            .map(|f| format!("{:.1}% (fixed)", f * 100.0))
            .unwrap_or_else(|| "auto".to_string())
    );
    println!();
}

fn print_scenarios(scenarios: &[ViabilityScenario]) {
    println!(
        "{:>8} {:>8} {:>10} {:>12} {:>8} {:>10} {:>12} {:>8}",
        "Cover", "Lines", "Stake", "Pool", "Share", "Hit prob", "Profit", "ROI"
    );
    println!("{}", "-".repeat(84));
    for s in scenarios {
        let profit = format!("{:.2}", s.expected_profit);
        let profit = if s.viable { profit.green() } else { profit.red() };
        println!(
            "{:>7.1}% {:>8} {:>10.2} {:>12.2} {:>7.1}% {:>9.2}% {:>12} {:>7.1}%",
            s.coverage_fraction * 100.0,
            s.lines_covered,
            s.total_stake,
            s.pool_after_bet,
            s.pool_share * 100.0,
            s.hit_probability * 100.0,
            profit,
            s.roi() * 100.0
        );
    }
}

#[derive(Serialize)]
struct OptimizeOutput {
    mode: EvaluationMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan: Option<StakePlan>,
    optimal: Option<ViabilityScenario>,
    target_profit: Option<f64>,
    first_reaching_target: Option<ViabilityScenario>,
}

struct OptimizeRequest {
    steps: Option<usize>,
    target_profit: Option<f64>,
    bankroll: Option<f64>,
    mode: EvaluationMode,
    top_n: Option<usize>,
}

fn optimize(config: &EngineConfig, card: &Path, request: OptimizeRequest, json: bool) -> Result<()> {
    let OptimizeRequest {
        steps,
        target_profit,
        bankroll,
        mode,
        top_n,
    } = request;
    let (card, lines) = ranked_card(config, card, top_n)?;
    let mut economics = card_economics(config, &card, None, None)?;

    let plan = match (bankroll, config.preset) {
        (Some(bank), Some(preset)) => {
            let plan = preset.profile().plan(bank, lines.len())?;
            economics.stake_per_line = plan.stake_per_line;
            Some(plan)
        }
        (Some(_), None) => anyhow::bail!("--bankroll needs a risk preset (--preset or `preset` in the config)"),
        (None, _) => None,
    };

    let calc = config.calculator(economics)?;
    let steps = steps.unwrap_or(config.backtest.grid_steps);

    let optimal = calc.optimal_coverage(&lines, steps, mode)?;
    // Preset target is a share of the planned budget, else of the full-coverage stake
    let target_profit = target_profit
        .or_else(|| plan.map(|p| p.target_profit))
        .or_else(|| {
            config.preset.map(|p| {
                p.profile().desired_profit_pct / 100.0 * lines.len() as f64 * calc.economics.stake_per_line
            })
        });
    let first_reaching_target = match target_profit {
        Some(target) => calc.first_reaching_profit(&lines, steps, mode, target)?,
        None => None,
    };
    let output = OptimizeOutput {
        mode,
        plan,
        optimal,
        target_profit,
        first_reaching_target,
    };

    if json {
        return print_json(&output);
    }

    if let Some(plan) = &output.plan {
        println!(
            "{} bank {:.2}, budget {:.2}, {:.4} per line over {} lines",
            "Stake plan:".yellow().bold(),
            plan.bank,
            plan.budget,
            plan.stake_per_line,
            plan.total_lines
        );
    }
    print_economics(&card, &calc);
    match &output.optimal {
        Some(best) => {
            println!("{}", "Optimal coverage:".yellow().bold());
            print_scenarios(std::slice::from_ref(best));
        }
        None => println!("{}", "No coverage levels evaluated.".yellow()),
    }
    if let Some(target) = output.target_profit {
        println!();
        match &output.first_reaching_target {
            Some(s) => {
                println!("{} {:.2}:", "Smallest coverage reaching".yellow().bold(), target);
                print_scenarios(std::slice::from_ref(s));
            }
            None => println!("{} {:.2}", "No coverage level reaches".red(), target),
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn backtest(
    config: &EngineConfig,
    data_dir: &Path,
    range: (Option<NaiveDate>, Option<NaiveDate>),
    top_n: Option<usize>,
    coverage: Option<f64>,
    as_of: Option<&str>,
    by_field: bool,
    json: bool,
) -> Result<()> {
    let as_of = parse_as_of(as_of)?;

    let pb = spinner("Loading market data...");
    let store = load_directory(data_dir, as_of)
        .with_context(|| format!("Failed to load data from {}", data_dir.display()))?;
    pb.finish_and_clear();

    let Some((first, last)) = store.date_range() else {
        println!("{}", "No markets found.".yellow());
        return Ok(());
    };
    let (from, to) = (range.0.unwrap_or(first), range.1.unwrap_or(last));

    let mut bt = BacktestConfig::from_engine(config, from, to);
    if let Some(n) = top_n {
        bt.top_n = n;
    }
    if let Some(alpha) = coverage {
        bt.coverage_fraction = alpha;
    }

    let pb = spinner("Running backtest...");
    let report = Backtester::new(bt)?.run(&store).with_context(|| "Backtest failed")?;
    pb.finish_and_clear();

    report_backtest(&report, by_field, json)
}

#[allow(clippy::too_many_arguments)]
fn simulate(
    config: &EngineConfig,
    markets: usize,
    seed: u64,
    runners: usize,
    noise: f64,
    top_n: Option<usize>,
    coverage: Option<f64>,
    json: bool,
) -> Result<()> {
    if runners < 4 {
        anyhow::bail!("--runners must be at least 4, got {}", runners);
    }

    let store = SyntheticMarketGenerator::new(seed)
        .with_takeout(config.economics.takeout)
        .with_model_noise(noise)
        .generate_store(markets, runners);
    let Some((from, to)) = store.date_range() else {
        println!("{}", "No markets generated.".yellow());
        return Ok(());
    };

    let mut bt = BacktestConfig::from_engine(config, from, to);
    if let Some(n) = top_n {
        bt.top_n = n;
    }
    if let Some(alpha) = coverage {
        bt.coverage_fraction = alpha;
    }

    let report = Backtester::new(bt)?.run(&store)?;
    report_backtest(&report, true, json)
}

fn report_backtest(report: &BacktestReport, by_field: bool, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }

    let s = &report.summary;
    println!("\n{}", "=".repeat(60));
    println!("BACKTEST RESULTS");
    println!("{}", "=".repeat(60));
    println!("Period: {} to {}", report.from, report.to);
    println!("Candidates (top_n): {}", report.top_n);
    println!("Coverage fraction: {:.1}%", report.coverage_fraction * 100.0);
    println!("{}", "-".repeat(60));
    println!("Markets evaluated: {}", s.markets_evaluated);
    println!(
        "Markets skipped: {} (not settled {}, no result {}, insufficient data {})",
        s.markets_skipped, s.skipped_not_settled, s.skipped_no_result, s.skipped_insufficient_data
    );
    println!("Unrankable outcomes: {}", s.unrankable);
    println!("{}", "-".repeat(60));
    println!("Hit rate @1: {:.2}% ({})", s.hit_rate_at_1 * 100.0, s.hits_at_1);
    println!(
        "Hit rate @coverage: {:.2}% ({})",
        s.hit_rate_at_coverage * 100.0,
        s.hits_at_coverage
    );
    if let Some(rank) = s.mean_actual_rank {
        println!("Mean rank of actual finish: {:.1}", rank);
    }
    if let Some(p) = s.mean_actual_probability {
        println!("Mean model probability of actual finish: {:.4}%", p * 100.0);
    }
    println!("{}", "-".repeat(60));
    println!("Total staked: {:.2}", s.total_staked);
    println!("Total returned: {:.2}", s.total_returned);
    let roi = format!("{:.1}%", s.roi_at_1 * 100.0);
    println!(
        "ROI @1: {}",
        if s.roi_at_1 > 0.0 { roi.green() } else { roi.red() }
    );
    println!("Max drawdown: {:.2}", s.max_drawdown);
    println!("{}", "=".repeat(60));

    if by_field && !report.evaluations.is_empty() {
        println!("\n{}", "Analysis by Field Size:".yellow().bold());
        println!(
            "{:>8} {:>8} {:>10} {:>12} {:>12} {:>10}",
            "Runners", "Markets", "Hit @1", "Hit @cover", "Profit", "ROI"
        );
        println!("{}", "-".repeat(65));
        for a in analyze_by_field_size(&report.evaluations) {
            println!(
                "{:>8} {:>8} {:>9.1}% {:>11.1}% {:>12.2} {:>9.1}%",
                a.key,
                a.markets,
                a.hit_rate_at_1 * 100.0,
                a.hit_rate_at_coverage * 100.0,
                a.profit,
                a.roi * 100.0
            );
        }
    }

    Ok(())
}
