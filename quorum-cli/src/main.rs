//! Quorum CLI — drive the signal engine from files.
//!
//! Commands:
//! - `decide`: run one decision cycle over a bars CSV and print the decision
//! - `record`: feed a closed trade back into the saved engine state
//! - `compare`: print the strategy ranking and recommendation
//! - `force` / `reset`: operator overrides of the adaptive selector
//! - `simulate`: run the full decide/record loop over a seeded random walk

mod bars;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use quorum_core::domain::{Action, MarketSeries, StrategyId};
use quorum_runner::{load_snapshot, save_snapshot, DecisionLog, Engine, EngineConfig};

#[derive(Parser)]
#[command(
    name = "quorum",
    about = "Quorum: adaptive multi-strategy trading signal engine"
)]
struct Cli {
    /// Engine configuration (TOML). Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one decision cycle and print the decision as JSON.
    Decide {
        /// Bars CSV: timestamp,open,high,low,close,volume.
        #[arg(long)]
        bars: PathBuf,

        #[arg(long, default_value = "SPY")]
        symbol: String,

        /// Engine state file, read before and written after the cycle.
        #[arg(long, default_value = "quorum-state.json")]
        state: PathBuf,

        /// Append the decision to this JSONL log.
        #[arg(long)]
        log: Option<PathBuf>,

        /// Decision time (RFC 3339). Defaults to now.
        #[arg(long)]
        at: Option<String>,
    },
    /// Record a closed trade for a strategy.
    Record {
        #[arg(long)]
        strategy: String,

        /// Realized P&L in dollars.
        #[arg(long, allow_hyphen_values = true)]
        pnl: f64,

        #[arg(long, default_value = "SPY")]
        symbol: String,

        #[arg(long, default_value = "quorum-state.json")]
        state: PathBuf,

        /// Close time (RFC 3339). Defaults to now.
        #[arg(long)]
        at: Option<String>,
    },
    /// Print the strategy ranking.
    Compare {
        #[arg(long, default_value = "quorum-state.json")]
        state: PathBuf,

        /// Print JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Make a strategy authoritative now.
    Force {
        #[arg(long)]
        strategy: String,

        #[arg(long, default_value = "quorum-state.json")]
        state: PathBuf,
    },
    /// Put every strategy back into testing.
    Reset {
        #[arg(long, default_value = "quorum-state.json")]
        state: PathBuf,
    },
    /// Simulate the decide/record loop over a synthetic random walk.
    Simulate {
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Bars before the first decision.
        #[arg(long, default_value_t = 60)]
        warmup: usize,

        /// Decision cycles to run.
        #[arg(long, default_value_t = 250)]
        steps: usize,

        /// Bars each simulated trade is held.
        #[arg(long, default_value_t = 5)]
        horizon: usize,

        #[arg(long, default_value = "SIM")]
        symbol: String,

        /// Save the final engine state here.
        #[arg(long)]
        state: Option<PathBuf>,

        /// Append every decision to this JSONL log.
        #[arg(long)]
        log: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Decide {
            bars,
            symbol,
            state,
            log,
            at,
        } => run_decide(config, &bars, &symbol, &state, log.as_deref(), at.as_deref()),
        Commands::Record {
            strategy,
            pnl,
            symbol,
            state,
            at,
        } => run_record(config, &strategy, pnl, &symbol, &state, at.as_deref()),
        Commands::Compare { state, json } => run_compare(config, &state, json),
        Commands::Force { strategy, state } => run_force(config, &strategy, &state),
        Commands::Reset { state } => run_reset(config, &state),
        Commands::Simulate {
            seed,
            warmup,
            steps,
            horizon,
            symbol,
            state,
            log,
        } => run_simulate(
            config,
            SimulateArgs {
                seed,
                warmup,
                steps,
                horizon,
                symbol,
            },
            state.as_deref(),
            log.as_deref(),
        ),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

// ─── Engine loading ──────────────────────────────────────────────────

fn load_engine(config_path: Option<&Path>, state: Option<&Path>) -> Result<Engine> {
    let config = match config_path {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    let engine = Engine::new(config).context("failed to build engine")?;
    if let Some(path) = state {
        if let Some(snapshot) = load_snapshot(path)
            .with_context(|| format!("failed to load state {}", path.display()))?
        {
            let loaded = engine.restore(snapshot);
            info!(loaded, state = %path.display(), "state restored");
        }
    }
    Ok(engine)
}

fn save_engine(engine: &Engine, path: &Path, now: DateTime<Utc>) -> Result<()> {
    save_snapshot(path, &engine.snapshot(now))
        .with_context(|| format!("failed to save state {}", path.display()))
}

fn parse_at(at: Option<&str>) -> Result<DateTime<Utc>> {
    match at {
        Some(raw) => Ok(DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("--at must be RFC 3339, got '{raw}'"))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

// ─── Commands ────────────────────────────────────────────────────────

fn run_decide(
    config: Option<&Path>,
    bars: &Path,
    symbol: &str,
    state: &Path,
    log: Option<&Path>,
    at: Option<&str>,
) -> Result<()> {
    let now = parse_at(at)?;
    let series = bars::load_csv(bars)?;
    if series.is_empty() {
        bail!("no valid bars in {}", bars.display());
    }
    let engine = load_engine(config, Some(state))?;

    let decision = engine.decide(symbol, &series, now);
    println!("{}", serde_json::to_string_pretty(&decision)?);

    if let Some(path) = log {
        DecisionLog::new(path)
            .append(&decision)
            .with_context(|| format!("failed to append to {}", path.display()))?;
    }
    save_engine(&engine, state, now)
}

fn run_record(
    config: Option<&Path>,
    strategy: &str,
    pnl: f64,
    symbol: &str,
    state: &Path,
    at: Option<&str>,
) -> Result<()> {
    let closed_at = parse_at(at)?;
    let engine = load_engine(config, Some(state))?;
    let recorded = engine.record_trade(&StrategyId::new(strategy), symbol, pnl, closed_at)?;
    println!(
        "{}: {} trades, win rate {:.1}%, P&L {:.2}, {}",
        recorded.strategy_id,
        recorded.total_trades,
        recorded.win_rate * 100.0,
        recorded.total_pnl,
        recorded.status
    );
    if let Some(verdict) = recorded.graduation {
        println!("Probation complete: {verdict:?}");
    }
    save_engine(&engine, state, closed_at)
}

fn run_compare(config: Option<&Path>, state: &Path, json: bool) -> Result<()> {
    let engine = load_engine(config, Some(state))?;
    let comparison = engine.comparison();
    if json {
        println!("{}", serde_json::to_string_pretty(&comparison)?);
    } else {
        println!("{comparison}");
        for err in engine.registration_errors() {
            println!("excluded: {err}");
        }
    }
    Ok(())
}

fn run_force(config: Option<&Path>, strategy: &str, state: &Path) -> Result<()> {
    let now = Utc::now();
    let engine = load_engine(config, Some(state))?;
    let result = engine.force_strategy(&StrategyId::new(strategy), now)?;
    println!(
        "{} -> {} ({})",
        result.from.as_ref().map(|id| id.as_str()).unwrap_or("-"),
        result.to.as_ref().map(|id| id.as_str()).unwrap_or("-"),
        result.reason
    );
    save_engine(&engine, state, now)
}

fn run_reset(config: Option<&Path>, state: &Path) -> Result<()> {
    let now = Utc::now();
    let engine = load_engine(config, Some(state))?;
    engine.reset_testing();
    println!("All strategies returned to testing.");
    save_engine(&engine, state, now)
}

// ─── Simulation ──────────────────────────────────────────────────────

struct SimulateArgs {
    seed: u64,
    warmup: usize,
    steps: usize,
    horizon: usize,
    symbol: String,
}

#[derive(Debug, Default, PartialEq)]
struct SimulationSummary {
    decisions: usize,
    directional: usize,
    trades: usize,
    switches: usize,
    total_pnl: f64,
}

/// Decide on each growing prefix of the walk; every directional decision is
/// closed `horizon` bars later and fed back as a trade.
fn simulate(
    engine: &Engine,
    args: &SimulateArgs,
    log: Option<&DecisionLog>,
) -> Result<SimulationSummary> {
    if args.horizon == 0 {
        bail!("--horizon must be at least 1");
    }
    let start = Utc
        .with_ymd_and_hms(2024, 1, 2, 21, 0, 0)
        .single()
        .context("invalid simulation start")?;
    let bars = bars::random_walk(args.warmup + args.steps + args.horizon, args.seed, start);
    let mut summary = SimulationSummary::default();

    for i in args.warmup..args.warmup + args.steps {
        let series = MarketSeries::new(bars[..=i].to_vec());
        let now = bars[i].timestamp;
        let decision = engine.decide(&args.symbol, &series, now);
        summary.decisions += 1;
        if decision.switch.switched {
            summary.switches += 1;
        }
        if let Some(log) = log {
            log.append(&decision)?;
        }
        if !decision.action.is_directional() || decision.size <= 0.0 {
            continue;
        }
        summary.directional += 1;

        let Some(strategy) = decision
            .strategy_id
            .clone()
            .or_else(|| engine.state().authoritative)
        else {
            continue;
        };
        let entry = bars[i].close;
        let exit = &bars[i + args.horizon];
        let direction = if decision.action == Action::Buy { 1.0 } else { -1.0 };
        let pnl = decision.size * direction * (exit.close / entry - 1.0);
        engine.record_trade(&strategy, &args.symbol, pnl, exit.timestamp)?;
        summary.trades += 1;
        summary.total_pnl += pnl;
    }
    Ok(summary)
}

fn run_simulate(
    config: Option<&Path>,
    args: SimulateArgs,
    state: Option<&Path>,
    log: Option<&Path>,
) -> Result<()> {
    let engine = load_engine(config, None)?;
    let log = log.map(DecisionLog::new);
    let summary = simulate(&engine, &args, log.as_ref())?;

    println!("=== Simulation (seed {}) ===", args.seed);
    println!("Decisions:   {}", summary.decisions);
    println!("Directional: {}", summary.directional);
    println!("Trades:      {}", summary.trades);
    println!("Switches:    {}", summary.switches);
    println!("Total P&L:   {:.2}", summary.total_pnl);
    println!(
        "Governing:   {}",
        engine
            .state()
            .authoritative
            .as_ref()
            .map(|id| id.as_str())
            .unwrap_or("-")
    );
    println!();
    println!("{}", engine.comparison());

    if let Some(path) = state {
        save_engine(&engine, path, Utc::now())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(seed: u64) -> SimulateArgs {
        SimulateArgs {
            seed,
            warmup: 60,
            steps: 80,
            horizon: 5,
            symbol: "SIM".into(),
        }
    }

    #[test]
    fn simulation_is_deterministic_for_a_seed() {
        let a = simulate(&Engine::new(EngineConfig::default()).unwrap(), &args(3), None).unwrap();
        let b = simulate(&Engine::new(EngineConfig::default()).unwrap(), &args(3), None).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.decisions, 80);
        assert!(a.switches >= 1);
        assert!(a.trades <= a.directional);
    }

    #[test]
    fn simulation_writes_decision_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = DecisionLog::new(dir.path().join("sim.jsonl"));
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let summary = simulate(&engine, &args(11), Some(&log)).unwrap();
        assert_eq!(log.read_all().unwrap().len(), summary.decisions);
    }

    #[test]
    fn zero_horizon_is_rejected() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let mut bad = args(1);
        bad.horizon = 0;
        assert!(simulate(&engine, &bad, None).is_err());
    }

    #[test]
    fn parse_at_accepts_rfc3339() {
        let at = parse_at(Some("2024-05-01T14:30:00Z")).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 5, 1, 14, 30, 0).unwrap());
        assert!(parse_at(Some("May 1")).is_err());
    }

    #[test]
    fn cli_parses_decide() {
        let cli = Cli::try_parse_from([
            "quorum", "decide", "--bars", "spy.csv", "--symbol", "QQQ",
        ])
        .unwrap();
        match cli.command {
            Commands::Decide { symbol, state, .. } => {
                assert_eq!(symbol, "QQQ");
                assert_eq!(state, PathBuf::from("quorum-state.json"));
            }
            _ => panic!("expected decide"),
        }
    }
}
