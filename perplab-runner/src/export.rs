//! Reporting and export: JSON and CSV artifact generation.
//!
//! A run directory holds:
//! - `result.json`: the full `BacktestReport` with schema version
//! - `trades.csv`: one row per (partial) close
//! - `equity.csv`: the sampled equity curve
//!
//! Unknown schema versions are rejected on load.

use std::path::{Path, PathBuf};

use perplab_core::domain::{Candle, EquityPoint, Trade};
use tracing::info;

use crate::data_loader::CandleFormat;
use crate::runner::{BacktestReport, RunError, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a report to pretty JSON.
pub fn export_json(report: &BacktestReport) -> Result<String, RunError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Deserialize a report, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestReport, RunError> {
    let report: BacktestReport = serde_json::from_str(json)?;
    if report.schema_version > SCHEMA_VERSION {
        return Err(RunError::SchemaVersion {
            found: report.schema_version,
            supported: SCHEMA_VERSION,
        });
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Trade tape as CSV.
///
/// Columns: side, entry_index, entry_time, entry_price, exit_index,
/// exit_time, exit_price, close_fraction, leverage, margin, notional,
/// return_rate, fees, pnl, reason, candles_held, holding_hours, strategy
pub fn trades_csv(trades: &[Trade]) -> Result<String, RunError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "side",
        "entry_index",
        "entry_time",
        "entry_price",
        "exit_index",
        "exit_time",
        "exit_price",
        "close_fraction",
        "leverage",
        "margin",
        "notional",
        "return_rate",
        "fees",
        "pnl",
        "reason",
        "candles_held",
        "holding_hours",
        "strategy",
    ])?;

    for t in trades {
        wtr.write_record([
            &format!("{:?}", t.side).to_uppercase(),
            &t.entry_index.to_string(),
            &t.entry_time.to_rfc3339(),
            &format!("{:.6}", t.entry_price),
            &t.exit_index.to_string(),
            &t.exit_time.to_rfc3339(),
            &format!("{:.6}", t.exit_price),
            &format!("{:.6}", t.close_fraction),
            &format!("{:.2}", t.leverage),
            &format!("{:.2}", t.margin),
            &format!("{:.2}", t.notional),
            &format!("{:.6}", t.return_rate),
            &format!("{:.4}", t.fees),
            &format!("{:.2}", t.pnl),
            &t.close_reason.label(),
            &t.candles_held.to_string(),
            &format!("{:.2}", t.holding_hours()),
            &t.strategy_id,
        ])?;
    }

    finish(wtr)
}

/// Equity curve as CSV. Columns: timestamp, capital, drawdown
pub fn equity_csv(curve: &[EquityPoint]) -> Result<String, RunError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "capital", "drawdown"])?;
    for p in curve {
        wtr.write_record([
            p.timestamp.to_rfc3339(),
            format!("{:.2}", p.capital),
            format!("{:.6}", p.drawdown),
        ])?;
    }
    finish(wtr)
}

/// Candles in the loader's CSV layout.
pub fn candles_csv(candles: &[Candle]) -> Result<String, RunError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "open", "high", "low", "close", "volume"])?;
    for c in candles {
        wtr.write_record([
            c.timestamp.to_rfc3339(),
            c.open.to_string(),
            c.high.to_string(),
            c.low.to_string(),
            c.close.to_string(),
            c.volume.to_string(),
        ])?;
    }
    finish(wtr)
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, RunError> {
    let data = wtr.into_inner().map_err(|e| RunError::Csv(e.into_error().into()))?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

// ─── Files ──────────────────────────────────────────────────────────

/// Paths written by `write_artifacts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
    pub result_json: PathBuf,
    pub trades_csv: PathBuf,
    pub equity_csv: PathBuf,
}

fn write(path: &Path, contents: &str) -> Result<(), RunError> {
    std::fs::write(path, contents).map_err(|source| RunError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `result.json`, `trades.csv` and `equity.csv` into `dir` (created if missing).
pub fn write_artifacts(report: &BacktestReport, dir: &Path) -> Result<ArtifactPaths, RunError> {
    std::fs::create_dir_all(dir).map_err(|source| RunError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let paths = ArtifactPaths {
        dir: dir.to_path_buf(),
        result_json: dir.join("result.json"),
        trades_csv: dir.join("trades.csv"),
        equity_csv: dir.join("equity.csv"),
    };
    write(&paths.result_json, &export_json(report)?)?;
    write(&paths.trades_csv, &trades_csv(&report.result.trades)?)?;
    write(&paths.equity_csv, &equity_csv(&report.result.equity_curve)?)?;
    info!(dir = %dir.display(), run = report.fingerprint.short_id(), "artifacts written");
    Ok(paths)
}

/// Write candles as JSON or CSV, chosen by the file extension.
pub fn write_candles(path: &Path, candles: &[Candle]) -> Result<(), RunError> {
    let contents = match CandleFormat::from_path(path) {
        Some(CandleFormat::Json) => serde_json::to_string_pretty(candles)?,
        Some(CandleFormat::Csv) => candles_csv(candles)?,
        None => {
            return Err(RunError::Load(crate::data_loader::LoadError::UnsupportedFormat(
                path.to_path_buf(),
            )))
        }
    };
    write(path, &contents)
}
