//! Parameter sweep: grid of config variants run in parallel over one dataset.
//!
//! Runs are independent; cancellation is checked before each run starts and
//! abandoned runs produce no outcome.

use perplab_core::config::{EngineConfig, StopLossRule};
use perplab_core::domain::{validate_series, Candle};
use perplab_core::engine::Engine;
use perplab_core::fingerprint::ConfigHash;
use perplab_core::metrics::PerformanceMetrics;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, info};

use crate::fitness::FitnessMetric;
use crate::runner::RunError;

/// Values to try per parameter. An empty list keeps the base config's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamGrid {
    pub base_leverage: Vec<f64>,
    pub min_confidence: Vec<f64>,
    /// Fixed stop-loss fractions.
    pub stop_loss: Vec<f64>,
    /// Multipliers applied to every take-profit offset of the base ladder.
    pub take_profit_scale: Vec<f64>,
}

/// The parameter values of one grid point (`None` = base value).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepParams {
    pub base_leverage: Option<f64>,
    pub min_confidence: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit_scale: Option<f64>,
}

impl SweepParams {
    /// Apply these values to a copy of `base`.
    pub fn apply(&self, base: &EngineConfig) -> EngineConfig {
        let mut config = base.clone();
        if let Some(leverage) = self.base_leverage {
            config.risk.base_leverage = leverage;
        }
        if let Some(confidence) = self.min_confidence {
            config.risk.min_confidence = confidence;
        }
        if let Some(fraction) = self.stop_loss {
            config.exits.stop_loss = StopLossRule::Fixed { fraction };
        }
        if let Some(scale) = self.take_profit_scale {
            for level in &mut config.exits.take_profits {
                level.offset *= scale;
            }
        }
        config
    }

    /// Compact `key=value` label for logs and tables.
    pub fn label(&self) -> String {
        let parts: Vec<String> = [
            ("lev", self.base_leverage),
            ("conf", self.min_confidence),
            ("sl", self.stop_loss),
            ("tp_scale", self.take_profit_scale),
        ]
        .iter()
        .filter_map(|(k, v)| v.map(|v| format!("{k}={v}")))
        .collect();
        if parts.is_empty() {
            "base".to_string()
        } else {
            parts.join(" ")
        }
    }
}

fn axis(values: &[f64]) -> Vec<Option<f64>> {
    if values.is_empty() {
        vec![None]
    } else {
        values.iter().copied().map(Some).collect()
    }
}

impl ParamGrid {
    /// Number of grid points, before invalid combinations are dropped.
    pub fn size(&self) -> usize {
        [
            &self.base_leverage,
            &self.min_confidence,
            &self.stop_loss,
            &self.take_profit_scale,
        ]
        .iter()
        .map(|v| v.len().max(1))
        .product()
    }

    /// Every grid point in a fixed order.
    pub fn points(&self) -> Vec<SweepParams> {
        let mut points = Vec::with_capacity(self.size());
        for &base_leverage in &axis(&self.base_leverage) {
            for &min_confidence in &axis(&self.min_confidence) {
                for &stop_loss in &axis(&self.stop_loss) {
                    for &take_profit_scale in &axis(&self.take_profit_scale) {
                        points.push(SweepParams {
                            base_leverage,
                            min_confidence,
                            stop_loss,
                            take_profit_scale,
                        });
                    }
                }
            }
        }
        points
    }

    /// Configs for every grid point that passes validation.
    pub fn generate_configs(&self, base: &EngineConfig) -> Vec<(SweepParams, EngineConfig)> {
        self.points()
            .into_iter()
            .filter_map(|params| {
                let config = params.apply(base);
                match config.validate() {
                    Ok(()) => Some((params, config)),
                    Err(err) => {
                        debug!(params = %params.label(), error = %err, "skipping invalid grid point");
                        None
                    }
                }
            })
            .collect()
    }
}

/// Result of one grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepOutcome {
    pub params: SweepParams,
    pub config_hash: ConfigHash,
    pub fitness: f64,
    pub metrics: PerformanceMetrics,
}

/// All outcomes, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResults {
    pub metric: FitnessMetric,
    pub outcomes: Vec<SweepOutcome>,
    /// Grid points dropped by config validation.
    pub skipped: usize,
    /// True if cancellation stopped at least one run from starting.
    pub cancelled: bool,
}

impl SweepResults {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn best(&self) -> Option<&SweepOutcome> {
        self.outcomes.first()
    }

    pub fn top_n(&self, n: usize) -> &[SweepOutcome] {
        &self.outcomes[..n.min(self.outcomes.len())]
    }
}

/// Run every valid grid point in parallel and rank by `metric`.
pub fn run_sweep(
    grid: &ParamGrid,
    base: &EngineConfig,
    candles: &[Candle],
    metric: FitnessMetric,
    cancel: &AtomicBool,
) -> Result<SweepResults, RunError> {
    run_sweep_with_progress(grid, base, candles, metric, cancel, |_, _| {})
}

/// Same as `run_sweep`; `progress(done, total)` is called after each run.
pub fn run_sweep_with_progress<F>(
    grid: &ParamGrid,
    base: &EngineConfig,
    candles: &[Candle],
    metric: FitnessMetric,
    cancel: &AtomicBool,
    progress: F,
) -> Result<SweepResults, RunError>
where
    F: Fn(usize, usize) + Sync,
{
    validate_series(candles)?;
    let configs = grid.generate_configs(base);
    let total = configs.len();
    let skipped = grid.size() - total;
    let done = AtomicUsize::new(0);
    info!(points = total, skipped, metric = metric.name(), "starting sweep");

    let ran: Vec<Option<SweepOutcome>> = configs
        .into_par_iter()
        .map(|(params, config)| -> Result<Option<SweepOutcome>, RunError> {
            if cancel.load(Ordering::Relaxed) {
                return Ok(None);
            }
            let config_hash = ConfigHash::of(&config);
            let result = Engine::new(config)?.run(candles)?;
            let outcome = SweepOutcome {
                params,
                config_hash,
                fitness: metric.score(&result.metrics),
                metrics: result.metrics,
            };
            progress(done.fetch_add(1, Ordering::Relaxed) + 1, total);
            Ok(Some(outcome))
        })
        .collect::<Result<_, RunError>>()?;

    let cancelled = ran.iter().any(Option::is_none);
    let mut outcomes: Vec<SweepOutcome> = ran.into_iter().flatten().collect();
    // Stable: ties keep grid order
    outcomes.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));

    if let Some(best) = outcomes.first() {
        info!(
            completed = outcomes.len(),
            cancelled,
            best = %best.params.label(),
            fitness = best.fitness,
            "sweep complete"
        );
    }

    Ok(SweepResults {
        metric,
        outcomes,
        skipped,
        cancelled,
    })
}
