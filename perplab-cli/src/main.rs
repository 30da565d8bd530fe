//! PerpLab CLI: backtest, sweep, preset and synthetic-data commands.
//!
//! Commands:
//! - `run`: execute a backtest from a TOML config file or named preset
//! - `sweep`: grid-search engine parameters in parallel and rank the results
//! - `presets`: list the named presets or print one as JSON
//! - `synth`: write a synthetic candle file (CSV or JSON)

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use perplab_core::presets::{self, PRESET_NAMES};
use perplab_runner::config::DataConfig;
use perplab_runner::export::{write_artifacts, write_candles};
use perplab_runner::runner::{load_source, run_backtest};
use perplab_runner::sweep::run_sweep_with_progress;
use perplab_runner::synthetic::generate;
use perplab_runner::{BacktestReport, FitnessMetric, ParamGrid, Pattern, RunConfig, SweepResults, SyntheticSpec};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "perplab", about = "PerpLab CLI: leveraged perpetual-futures backtester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file or named preset.
    Run {
        #[command(flatten)]
        source: SourceArgs,

        /// Output directory for result.json, trades.csv and equity.csv.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Print the summary only; write no artifacts.
        #[arg(long, default_value_t = false)]
        no_export: bool,
    },
    /// Grid-search leverage, confidence, stop and take-profit settings.
    Sweep {
        #[command(flatten)]
        source: SourceArgs,

        /// Base leverage values (comma-separated).
        #[arg(long, value_delimiter = ',')]
        leverage: Vec<f64>,

        /// Minimum confidence values (comma-separated).
        #[arg(long, value_delimiter = ',')]
        min_confidence: Vec<f64>,

        /// Fixed stop-loss fractions (comma-separated).
        #[arg(long, value_delimiter = ',')]
        stop_loss: Vec<f64>,

        /// Take-profit offset multipliers (comma-separated).
        #[arg(long, value_delimiter = ',')]
        tp_scale: Vec<f64>,

        /// Ranking metric: sharpe, annualized_return, total_return, win_rate,
        /// profit_factor, calmar, max_drawdown, balanced, conservative,
        /// balanced_strict.
        #[arg(long, value_parser = parse_metric)]
        metric: Option<FitnessMetric>,

        /// Rows to print.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Stop starting new runs after this many seconds.
        #[arg(long)]
        time_limit_secs: Option<u64>,

        /// Write all outcomes as JSON to this file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List presets, or print one as JSON.
    Presets {
        /// Preset to print in full.
        name: Option<String>,
    },
    /// Write a synthetic candle file.
    Synth {
        #[command(flatten)]
        spec: SynthArgs,

        /// Output path (.csv or .json).
        #[arg(long)]
        out: PathBuf,
    },
}

/// Where the run configuration and candles come from.
#[derive(Args)]
struct SourceArgs {
    /// Path to a TOML run config.
    #[arg(long, conflicts_with_all = ["preset", "data"])]
    config: Option<PathBuf>,

    /// Named preset: conservative, balanced, aggressive, scalper.
    #[arg(long)]
    preset: Option<String>,

    /// Candle file (.csv or .json). Without it, synthetic candles are used.
    #[arg(long)]
    data: Option<PathBuf>,

    #[command(flatten)]
    synth: SynthArgs,
}

#[derive(Args, Clone)]
struct SynthArgs {
    /// Synthetic pattern: linear, random_walk, sine.
    #[arg(long, value_parser = parse_pattern, default_value = "random_walk")]
    pattern: Pattern,

    /// Number of synthetic candles.
    #[arg(long, default_value_t = 2_000)]
    candles: usize,

    /// Minutes between synthetic candles.
    #[arg(long, default_value_t = 60)]
    interval_minutes: i64,

    /// Random-walk seed.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Per-candle volatility of the random walk.
    #[arg(long, default_value_t = 0.01)]
    volatility: f64,

    /// Per-candle drift.
    #[arg(long, default_value_t = 0.0)]
    drift: f64,
}

impl SynthArgs {
    fn to_spec(&self) -> SyntheticSpec {
        SyntheticSpec {
            pattern: self.pattern,
            candles: self.candles,
            interval_minutes: self.interval_minutes,
            seed: self.seed,
            volatility: self.volatility,
            drift: self.drift,
            ..SyntheticSpec::default()
        }
    }
}

fn parse_pattern(s: &str) -> Result<Pattern, String> {
    match s {
        "linear" => Ok(Pattern::Linear),
        "random_walk" | "walk" => Ok(Pattern::RandomWalk),
        "sine" => Ok(Pattern::Sine),
        _ => Err(format!("unknown pattern '{s}' (linear, random_walk, sine)")),
    }
}

fn parse_metric(s: &str) -> Result<FitnessMetric, String> {
    FitnessMetric::from_name(s).ok_or_else(|| format!("unknown metric '{s}'"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            source,
            output_dir,
            no_export,
        } => run_cmd(source, output_dir, no_export),
        Commands::Sweep {
            source,
            leverage,
            min_confidence,
            stop_loss,
            tp_scale,
            metric,
            top,
            time_limit_secs,
            output,
        } => {
            let flags = ParamGrid {
                base_leverage: leverage,
                min_confidence,
                stop_loss,
                take_profit_scale: tp_scale,
            };
            sweep_cmd(source, flags, metric, top, time_limit_secs, output)
        }
        Commands::Presets { name } => presets_cmd(name),
        Commands::Synth { spec, out } => synth_cmd(spec, out),
    }
}

/// Build a `RunConfig` from `--config`, or from `--preset` plus a data source.
fn resolve_run_config(source: &SourceArgs) -> Result<RunConfig> {
    if let Some(path) = &source.config {
        return RunConfig::load(path).with_context(|| format!("loading {}", path.display()));
    }
    let preset = source.preset.clone().unwrap_or_else(|| "balanced".to_string());
    let data = match &source.data {
        Some(path) => DataConfig {
            path: Some(path.clone()),
            synthetic: None,
        },
        None => DataConfig {
            path: None,
            synthetic: Some(source.synth.to_spec()),
        },
    };
    Ok(RunConfig {
        name: preset.clone(),
        preset,
        data,
        ..RunConfig::default()
    })
}

fn run_cmd(source: SourceArgs, output_dir: PathBuf, no_export: bool) -> Result<()> {
    let run = resolve_run_config(&source)?;
    let config = run.engine_config()?;
    let (candles, synthetic) = load_source(&run.data_source()?)?;
    let report = run_backtest(&run.name, config, &candles, synthetic)?;

    print_summary(&report);

    if !no_export {
        let dir = output_dir.join(format!("{}-{}", report.name, report.fingerprint.short_id()));
        let paths = write_artifacts(&report, &dir).context("writing run artifacts")?;
        println!("Artifacts saved to: {}", paths.dir.display());
    }
    Ok(())
}

fn sweep_cmd(
    source: SourceArgs,
    flags: ParamGrid,
    metric: Option<FitnessMetric>,
    top: usize,
    time_limit_secs: Option<u64>,
    output: Option<PathBuf>,
) -> Result<()> {
    let run = resolve_run_config(&source)?;
    // Command-line axes replace the config file's grid axis by axis
    let mut grid = run.sweep.clone().unwrap_or_default();
    for (axis, values) in [
        (&mut grid.base_leverage, flags.base_leverage),
        (&mut grid.min_confidence, flags.min_confidence),
        (&mut grid.stop_loss, flags.stop_loss),
        (&mut grid.take_profit_scale, flags.take_profit_scale),
    ] {
        if !values.is_empty() {
            *axis = values;
        }
    }
    if grid == ParamGrid::default() {
        bail!("sweep grid is empty: pass --leverage/--min-confidence/--stop-loss/--tp-scale or a [sweep] section");
    }

    let metric = metric.unwrap_or(run.fitness);
    let base = run.engine_config()?;
    let (candles, _) = load_source(&run.data_source()?)?;

    let cancel = Arc::new(AtomicBool::new(false));
    if let Some(secs) = time_limit_secs {
        let flag = Arc::clone(&cancel);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs(secs));
            flag.store(true, Ordering::Relaxed);
        });
    }

    let total = grid.size();
    let step = (total / 10).max(1);
    let results = run_sweep_with_progress(&grid, &base, &candles, metric, &cancel, |done, of| {
        if done % step == 0 || done == of {
            info!(done, of, "sweep progress");
        }
    })?;
    if results.cancelled {
        warn!(completed = results.len(), "time limit reached; remaining runs skipped");
    }

    print_sweep(&results, top);

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&results)?;
        std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("Sweep results saved to: {}", path.display());
    }
    Ok(())
}

fn presets_cmd(name: Option<String>) -> Result<()> {
    match name {
        Some(name) => {
            let Some(config) = presets::preset(&name) else {
                bail!("unknown preset '{name}'. Valid: {}", PRESET_NAMES.join(", "));
            };
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        None => {
            println!(
                "{:<14} {:>9} {:>9} {:>8} {:>8} {:>10}",
                "Preset", "Leverage", "MinConf", "Size", "Stop", "MaxTrades"
            );
            println!("{}", "-".repeat(63));
            for name in PRESET_NAMES {
                let Some(c) = presets::preset(name) else { continue };
                let stop = match c.exits.stop_loss {
                    perplab_core::config::StopLossRule::Fixed { fraction } => format!("{:.1}%", fraction * 100.0),
                    perplab_core::config::StopLossRule::Atr { multiplier } => format!("{multiplier}×ATR"),
                };
                println!(
                    "{:<14} {:>9} {:>9.2} {:>7.1}% {:>8} {:>10}",
                    name,
                    format!("{}x", c.risk.base_leverage),
                    c.risk.min_confidence,
                    c.risk.base_size * 100.0,
                    stop,
                    c.risk.max_trades_per_day,
                );
            }
        }
    }
    Ok(())
}

fn synth_cmd(spec: SynthArgs, out: PathBuf) -> Result<()> {
    let candles = generate(&spec.to_spec());
    write_candles(&out, &candles).with_context(|| format!("writing {}", out.display()))?;
    println!("Wrote {} candles to {}", candles.len(), out.display());
    Ok(())
}

fn print_summary(report: &BacktestReport) {
    let r = &report.result;
    let m = &r.metrics;
    println!();
    println!("=== Backtest Result ===");
    println!("Run:            {} ({})", report.name, report.fingerprint.short_id());
    println!("Strategy:       {}", report.fingerprint.strategy_id);
    if let (Some(first), Some(last)) = (report.fingerprint.first_timestamp, report.fingerprint.last_timestamp) {
        println!("Period:         {first} to {last} ({:.1} days)", m.elapsed_days);
    }
    println!("Candles:        {}", r.diagnostics.candles);
    println!(
        "Signals:        {} evaluated, {} actionable, {} entries",
        r.diagnostics.signals_evaluated, r.diagnostics.actionable_signals, r.diagnostics.entries
    );
    println!("Trades:         {} ({} won, {} lost)", m.total_trades, m.winning_trades, m.losing_trades);
    println!();
    println!("--- Performance ---");
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("Annualized:     {:.2}%", m.annualized_return * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Calmar:         {:.3}", m.calmar);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    println!("Avg Win:        {:.2}%", m.avg_win * 100.0);
    println!("Avg Loss:       {:.2}%", m.avg_loss * 100.0);
    println!("Avg Holding:    {:.1}h", m.avg_holding_hours);
    println!("Max Consec Win: {}", m.max_consecutive_wins);
    println!("Max Consec Loss:{}", m.max_consecutive_losses);
    println!("Final Capital:  {:.2}", m.final_capital);

    if !m.exits_by_reason.is_empty() {
        println!();
        println!("--- Exits ---");
        for (reason, count) in &m.exits_by_reason {
            println!("{reason:<20} {count:>6}");
        }
    }
    if !r.diagnostics.declines.is_empty() {
        println!();
        println!("--- Declined Entries ---");
        for (reason, count) in &r.diagnostics.declines {
            println!("{reason:<20} {count:>6}");
        }
    }
    if !r.breaker_trips.is_empty() {
        println!();
        println!("--- Circuit Breakers ---");
        for trip in &r.breaker_trips {
            println!(
                "{:<12} {:?} at candle {} ({:.2}%, reset {:?})",
                trip.timestamp.format("%Y-%m-%d %H:%M"),
                trip.kind,
                trip.index,
                trip.value * 100.0,
                trip.reset
            );
        }
    }
    if report.synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!();
}

fn print_sweep(results: &SweepResults, top: usize) {
    println!();
    println!(
        "=== Sweep: {} runs, {} skipped, ranked by {} ===",
        results.len(),
        results.skipped,
        results.metric.name()
    );
    println!(
        "{:>4} {:<40} {:>10} {:>7} {:>9} {:>8} {:>8}",
        "#", "Params", "Fitness", "Trades", "Return", "MaxDD", "Sharpe"
    );
    println!("{}", "-".repeat(92));
    for (rank, o) in results.top_n(top).iter().enumerate() {
        let m = &o.metrics;
        println!(
            "{:>4} {:<40} {:>10.4} {:>7} {:>8.2}% {:>7.2}% {:>8.3}",
            rank + 1,
            o.params.label(),
            o.fitness,
            m.total_trades,
            m.total_return * 100.0,
            m.max_drawdown * 100.0,
            m.sharpe
        );
    }
    println!();
}
