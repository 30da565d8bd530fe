//! Synthetic candle generators for demos, tests and sweeps without market data.
//!
//! Every generator is deterministic: the same spec (and seed) always yields
//! the same candles.

use chrono::{DateTime, Duration, TimeZone, Utc};
use perplab_core::domain::Candle;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const MIN_PRICE: f64 = 0.01;

/// Price path shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// Straight line from `start_price` to `end_price`.
    Linear,
    /// Multiplicative random walk with `drift` and `volatility` per candle.
    #[default]
    RandomWalk,
    /// Sine wave around `start_price` with `amplitude` (fraction) and `period`
    /// candles, plus `drift` per candle.
    Sine,
}

/// Parameters of a synthetic series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticSpec {
    pub pattern: Pattern,
    pub candles: usize,
    pub interval_minutes: i64,
    pub start: DateTime<Utc>,
    pub start_price: f64,
    pub end_price: f64,
    pub drift: f64,
    pub volatility: f64,
    pub amplitude: f64,
    pub period: f64,
    /// High/low extension beyond the open/close body, as a fraction of price.
    pub wick: f64,
    pub base_volume: f64,
    pub seed: u64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            pattern: Pattern::RandomWalk,
            candles: 2_000,
            interval_minutes: 60,
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            start_price: 100.0,
            end_price: 150.0,
            drift: 0.0,
            volatility: 0.01,
            amplitude: 0.1,
            period: 200.0,
            wick: 0.002,
            base_volume: 1_000.0,
            seed: 42,
        }
    }
}

/// Generate the series described by `spec`.
pub fn generate(spec: &SyntheticSpec) -> Vec<Candle> {
    match spec.pattern {
        Pattern::Linear => linear(spec),
        Pattern::RandomWalk => random_walk(spec),
        Pattern::Sine => sine(spec),
    }
}

fn timestamp(spec: &SyntheticSpec, i: usize) -> DateTime<Utc> {
    spec.start + Duration::minutes(spec.interval_minutes * i as i64)
}

/// Build a candle whose open is the previous close.
fn candle(ts: DateTime<Utc>, open: f64, close: f64, upper_wick: f64, lower_wick: f64, volume: f64) -> Candle {
    let high = open.max(close) * (1.0 + upper_wick);
    let low = (open.min(close) * (1.0 - lower_wick)).max(MIN_PRICE);
    Candle::new(ts, open, high, low, close, volume)
}

fn linear(spec: &SyntheticSpec) -> Vec<Candle> {
    let n = spec.candles;
    let step = if n > 1 {
        (spec.end_price - spec.start_price) / (n - 1) as f64
    } else {
        0.0
    };
    let mut prev = spec.start_price;
    (0..n)
        .map(|i| {
            let close = (spec.start_price + step * i as f64).max(MIN_PRICE);
            let c = candle(timestamp(spec, i), prev, close, spec.wick, spec.wick, spec.base_volume);
            prev = close;
            c
        })
        .collect()
}

fn random_walk(spec: &SyntheticSpec) -> Vec<Candle> {
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let mut prev = spec.start_price;
    (0..spec.candles)
        .map(|i| {
            // Uniform shock scaled to unit variance
            let shock: f64 = rng.gen_range(-1.0..1.0) * 3f64.sqrt();
            let close = (prev * (1.0 + spec.drift + spec.volatility * shock)).max(MIN_PRICE);
            let upper = rng.gen_range(0.0..=2.0) * spec.wick;
            let lower = rng.gen_range(0.0..=2.0) * spec.wick;
            let volume = spec.base_volume * rng.gen_range(0.5..1.5);
            let c = candle(timestamp(spec, i), prev, close, upper, lower, volume);
            prev = close;
            c
        })
        .collect()
}

fn sine(spec: &SyntheticSpec) -> Vec<Candle> {
    let period = spec.period.max(1.0);
    let mut prev = spec.start_price;
    (0..spec.candles)
        .map(|i| {
            let x = i as f64;
            let close = (spec.start_price * (1.0 + spec.amplitude * (2.0 * PI * x / period).sin() + spec.drift * x))
                .max(MIN_PRICE);
            // Volume swells with the size of the move
            let volume = spec.base_volume * (1.0 + ((close - prev) / prev).abs() * 100.0);
            let c = candle(timestamp(spec, i), prev, close, spec.wick, spec.wick, volume);
            prev = close;
            c
        })
        .collect()
}
