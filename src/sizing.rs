//! Volume sizing policies for new orders.
//!
//! Every policy sees each ETF ratio exactly once through [`SizingPolicy::observe`]
//! and is then asked for an unclamped volume per side. The position-limit clamp
//! is applied afterwards by the signal engine.

use crate::config::{SizingMode, StrategyParams};
use crate::types::Side;
use std::collections::VecDeque;

/// Bounded window of the most recent ratios with running moments.
#[derive(Debug, Clone)]
pub struct RatioSeries {
    capacity: usize,
    values: VecDeque<f64>,
    sum: f64,
    sum_sq: f64,
    pushes_since_rebuild: usize,
}

impl RatioSeries {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
            sum: 0.0,
            sum_sq: 0.0,
            pushes_since_rebuild: 0,
        }
    }

    pub fn push(&mut self, ratio: f64) {
        if self.values.len() >= self.capacity {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old;
                self.sum_sq -= old * old;
            }
        }
        self.values.push_back(ratio);
        self.sum += ratio;
        self.sum_sq += ratio * ratio;

        // Running sums drift after many evictions; resync once per window.
        self.pushes_since_rebuild += 1;
        if self.pushes_since_rebuild >= self.capacity {
            self.rebuild();
        }
    }

    fn rebuild(&mut self) {
        self.sum = self.values.iter().sum();
        self.sum_sq = self.values.iter().map(|v| v * v).sum();
        self.pushes_since_rebuild = 0;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    /// Population mean and standard deviation of the window.
    pub fn mean_std(&self) -> Option<(f64, f64)> {
        if self.values.is_empty() {
            return None;
        }
        let n = self.values.len() as f64;
        let mean = self.sum / n;
        let var = (self.sum_sq / n) - mean * mean;
        Some((mean, var.max(0.0).sqrt()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub mean: f64,
    pub std_dev: f64,
    pub upper: f64,
    pub lower: f64,
}

#[derive(Debug, Clone)]
pub struct BollingerState {
    series: RatioSeries,
    band_width: f64,
    bonus: u64,
    bands: Option<Bands>,
}

impl BollingerState {
    fn observe(&mut self, ratio: f64) {
        self.series.push(ratio);
        // Bands only exist once a full window has been seen.
        if !self.series.is_full() {
            return;
        }
        if let Some((mean, std_dev)) = self.series.mean_std() {
            self.bands = Some(Bands {
                mean,
                std_dev,
                upper: mean + self.band_width * std_dev,
                lower: mean - self.band_width * std_dev,
            });
        }
    }

    pub fn bands(&self) -> Option<Bands> {
        self.bands
    }
}

/// Running ratio extremes that relax toward 1.0 once past their limits.
#[derive(Debug, Clone)]
pub struct ExtremaState {
    max_ratio_seen: f64,
    min_ratio_seen: f64,
    new_high: bool,
    new_low: bool,
    decay_rate: f64,
    upper_limit: f64,
    lower_limit: f64,
    multiplier: u64,
}

impl ExtremaState {
    fn observe(&mut self, ratio: f64) {
        self.new_high = ratio > self.max_ratio_seen;
        if self.new_high {
            self.max_ratio_seen = ratio;
        } else if self.max_ratio_seen > self.upper_limit {
            self.max_ratio_seen -= (self.max_ratio_seen - 1.0) * self.decay_rate;
        }

        self.new_low = ratio < self.min_ratio_seen;
        if self.new_low {
            self.min_ratio_seen = ratio;
        } else if self.min_ratio_seen < self.lower_limit {
            self.min_ratio_seen += (1.0 - self.min_ratio_seen) * self.decay_rate;
        }
    }

    pub fn max_ratio_seen(&self) -> f64 {
        self.max_ratio_seen
    }

    pub fn min_ratio_seen(&self) -> f64 {
        self.min_ratio_seen
    }
}

#[derive(Debug, Clone)]
pub enum SizingPolicy {
    Static,
    DecayingExtrema(ExtremaState),
    Bollinger(BollingerState),
}

impl SizingPolicy {
    pub fn new(params: &StrategyParams) -> Self {
        match params.sizing_mode {
            SizingMode::Static => SizingPolicy::Static,
            SizingMode::DecayingExtrema => SizingPolicy::DecayingExtrema(ExtremaState {
                max_ratio_seen: 1.0,
                min_ratio_seen: 1.0,
                new_high: false,
                new_low: false,
                decay_rate: params.decay_rate,
                upper_limit: params.decay_upper_limit,
                lower_limit: params.decay_lower_limit,
                multiplier: params.extrema_multiplier,
            }),
            SizingMode::Bollinger => SizingPolicy::Bollinger(BollingerState {
                series: RatioSeries::new(params.window_size),
                band_width: params.band_width,
                bonus: params.bollinger_bonus,
                bands: None,
            }),
        }
    }

    pub fn observe(&mut self, ratio: f64) {
        match self {
            SizingPolicy::Static => {}
            SizingPolicy::DecayingExtrema(state) => state.observe(ratio),
            SizingPolicy::Bollinger(state) => state.observe(ratio),
        }
    }

    /// Volume before the position clamp for an order on `side` at `ratio`.
    pub fn volume(&self, side: Side, ratio: f64, lot_size: u64) -> u64 {
        match self {
            SizingPolicy::Static => lot_size,
            SizingPolicy::DecayingExtrema(state) => {
                let fresh = match side {
                    Side::Buy => state.new_low,
                    Side::Sell => state.new_high,
                };
                if fresh {
                    lot_size.saturating_mul(state.multiplier)
                } else {
                    lot_size
                }
            }
            SizingPolicy::Bollinger(state) => {
                let breach = match (state.bands, side) {
                    (Some(b), Side::Buy) => ratio < b.lower,
                    (Some(b), Side::Sell) => ratio > b.upper,
                    (None, _) => false,
                };
                if breach {
                    lot_size.saturating_mul(state.bonus)
                } else {
                    lot_size
                }
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SizingPolicy::Static => "static",
            SizingPolicy::DecayingExtrema(_) => "decaying_extrema",
            SizingPolicy::Bollinger(_) => "bollinger",
        }
    }
}
