//! Movement smoothness scoring.
//!
//! Runs beside repetition detection on its own rolling buffer of motion
//! magnitudes (hand speed or acceleration magnitude) and is never reset at a
//! repetition boundary.
//!
//! Each evaluation blends two scores:
//! - **spectral**: spectral arc length (SPARC) of the magnitude spectrum plus
//!   the share of energy below a low-frequency band. Slow, clean oscillation
//!   has a short arc and concentrated energy; tremor and jerks spread
//!   energy across the band and lengthen the arc.
//! - **statistical**: coefficient of variation and peak-to-trough ratio of
//!   the raw magnitudes.
//!
//! The blend is exponentially smoothed and only emitted when it moves by
//! more than `min_change` points.

use std::collections::VecDeque;
use std::fmt;

use num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::buffer::BoundedBuffer;
use crate::types::{ImuSample, Sample, SmoothnessSample};

/// Which stream feeds the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothnessSource {
    /// Hand speed derived from consecutive spatial positions.
    #[default]
    Position,
    /// Magnitude of inertial acceleration.
    Acceleration,
}

/// Configuration for smoothness scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothnessConfig {
    /// Rolling buffer length (samples). 120 is 2s at 60Hz.
    pub window_size: usize,
    /// Samples needed before the first evaluation.
    pub min_samples: usize,
    /// Evaluate every N new samples once warm.
    pub evaluate_every: usize,
    /// Weight of the spectral score; the statistical score gets the rest.
    pub spectral_weight: f32,
    /// Exponential smoothing factor across evaluations.
    pub ema_alpha: f32,
    /// Smoothed changes at or below this are not emitted (points).
    pub min_change: f32,
    /// Upper frequency bound of the arc length (Hz).
    pub cutoff_hz: f32,
    /// Normalized magnitude below which the spectrum is considered ended.
    pub amplitude_threshold: f32,
    /// Energy below this counts as low-frequency (Hz).
    pub low_band_hz: f32,
    /// Decay of the arc-length mapping. Larger is more forgiving.
    pub arc_length_scale: f32,
    /// Rate used when timestamps cannot provide one (Hz).
    pub fallback_rate_hz: f32,
    /// Emitted values kept for the session summary.
    pub history_capacity: usize,
}

impl Default for SmoothnessConfig {
    fn default() -> Self {
        Self {
            window_size: 120,
            min_samples: 30,
            evaluate_every: 6,
            spectral_weight: 0.6,
            ema_alpha: 0.2,
            min_change: 2.0,
            cutoff_hz: 10.0,
            amplitude_threshold: 0.05,
            low_band_hz: 3.0,
            arc_length_scale: 2.0,
            fallback_rate_hz: 60.0,
            history_capacity: 3600,
        }
    }
}

/// Breakdown of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothnessScores {
    /// Spectral arc length (≤ 0; closer to zero is smoother).
    pub arc_length: f32,
    /// Share of fluctuation energy below the low band.
    pub low_band_ratio: f32,
    pub spectral: f32,
    pub statistical: f32,
    /// Weighted blend, before smoothing.
    pub combined: f32,
}

/// Rolling spectral + statistical smoothness scorer.
pub struct SmoothnessAnalyzer {
    config: SmoothnessConfig,
    window: VecDeque<(u64, f32)>,
    prev_position: Option<Sample>,
    since_eval: usize,
    smoothed: Option<f32>,
    last_emitted: Option<f32>,
    history: BoundedBuffer<SmoothnessSample>,
    planner: FftPlanner<f32>,
    evaluations: u64,
}

impl fmt::Debug for SmoothnessAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmoothnessAnalyzer")
            .field("config", &self.config)
            .field("window_len", &self.window.len())
            .field("smoothed", &self.smoothed)
            .field("evaluations", &self.evaluations)
            .finish_non_exhaustive()
    }
}

impl SmoothnessAnalyzer {
    pub fn new(config: SmoothnessConfig) -> Self {
        let window = config.window_size.max(config.min_samples).max(1);
        Self {
            window: VecDeque::with_capacity(window),
            prev_position: None,
            since_eval: 0,
            smoothed: None,
            last_emitted: None,
            history: BoundedBuffer::at_least_one(config.history_capacity),
            planner: FftPlanner::new(),
            evaluations: 0,
            config,
        }
    }

    pub fn config(&self) -> &SmoothnessConfig {
        &self.config
    }

    /// Current smoothed score, if any evaluation has run.
    pub fn current(&self) -> Option<f32> {
        self.smoothed
    }

    /// Emitted values, oldest first.
    pub fn history(&self) -> &[SmoothnessSample] {
        self.history.as_slice()
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Feed a spatial position. Speed is derived from the previous one.
    pub fn push_position(&mut self, sample: &Sample) -> Option<SmoothnessSample> {
        let prev = self.prev_position.replace(*sample)?;
        if sample.timestamp_ms <= prev.timestamp_ms {
            return None;
        }
        let dt = (sample.timestamp_ms - prev.timestamp_ms) as f32 / 1000.0;
        let speed = sample.distance_to(&prev) / dt;
        self.push_magnitude(sample.timestamp_ms, speed)
    }

    /// Feed an inertial sample; its acceleration magnitude is scored.
    pub fn push_acceleration(&mut self, sample: &ImuSample) -> Option<SmoothnessSample> {
        self.push_magnitude(sample.timestamp_ms, sample.accel_magnitude())
    }

    /// Feed a raw magnitude. Returns a sample when a new value is emitted.
    pub fn push_magnitude(&mut self, timestamp_ms: u64, value: f32) -> Option<SmoothnessSample> {
        if !value.is_finite() {
            return None;
        }

        if self.window.len() >= self.config.window_size.max(self.config.min_samples).max(1) {
            self.window.pop_front();
        }
        self.window.push_back((timestamp_ms, value));
        self.since_eval += 1;

        if self.window.len() < self.config.min_samples.max(2)
            || self.since_eval < self.config.evaluate_every.max(1)
        {
            return None;
        }
        self.since_eval = 0;

        let values: Vec<f32> = self.window.iter().map(|(_, v)| *v).collect();
        let rate = self.sample_rate_hz();
        let scores = self.evaluate(&values, rate);
        self.evaluations += 1;

        let alpha = self.config.ema_alpha.clamp(0.0, 1.0);
        let smoothed = match self.smoothed {
            Some(prev) => alpha * scores.combined + (1.0 - alpha) * prev,
            None => scores.combined,
        };
        let smoothed = clamp_score(smoothed);
        self.smoothed = Some(smoothed);

        trace!(
            arc_length = scores.arc_length,
            spectral = scores.spectral,
            statistical = scores.statistical,
            smoothed,
            "smoothness evaluated"
        );

        let changed = match self.last_emitted {
            Some(last) => (smoothed - last).abs() > self.config.min_change,
            None => true,
        };
        if !changed {
            return None;
        }

        self.last_emitted = Some(smoothed);
        let sample = SmoothnessSample {
            value: smoothed,
            timestamp_ms,
        };
        self.history.append(sample);
        Some(sample)
    }

    /// Score a magnitude series sampled at `sample_rate_hz`.
    ///
    /// Fewer than two values, or a series without fluctuation, scores as
    /// perfectly smooth.
    pub fn evaluate(&mut self, values: &[f32], sample_rate_hz: f32) -> SmoothnessScores {
        let statistical = statistical_smoothness(values);
        let (arc_length, low_band_ratio) = self.spectral_features(values, sample_rate_hz);

        let arc_score = 100.0
            * (-(arc_length.abs() - 1.0).max(0.0) / self.config.arc_length_scale.max(f32::EPSILON))
                .exp();
        let spectral = clamp_score(0.5 * arc_score + 50.0 * low_band_ratio);

        let w = self.config.spectral_weight.clamp(0.0, 1.0);
        let combined = clamp_score(w * spectral + (1.0 - w) * statistical);

        SmoothnessScores {
            arc_length,
            low_band_ratio,
            spectral,
            statistical,
            combined,
        }
    }

    /// Drop buffered magnitudes, smoothing state and history.
    pub fn reset(&mut self) {
        self.window.clear();
        self.prev_position = None;
        self.since_eval = 0;
        self.smoothed = None;
        self.last_emitted = None;
        self.history.reset();
        self.evaluations = 0;
    }

    fn sample_rate_hz(&self) -> f32 {
        match (self.window.front(), self.window.back()) {
            (Some((first, _)), Some((last, _))) if last > first && self.window.len() > 1 => {
                let span_s = (last - first) as f32 / 1000.0;
                (self.window.len() - 1) as f32 / span_s
            }
            _ => self.config.fallback_rate_hz,
        }
    }

    /// Arc length and low-band energy share of the mean-removed, Hann
    /// windowed series.
    fn spectral_features(&mut self, values: &[f32], sample_rate_hz: f32) -> (f32, f32) {
        let n = values.len();
        if n < 2 || !(sample_rate_hz > 0.0) {
            return (0.0, 1.0);
        }

        let mean = values.iter().sum::<f32>() / n as f32;
        let rms = (values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n as f32).sqrt();
        // Rounding-level fluctuation is no fluctuation
        if rms <= 1e-6 || rms < 1e-3 * mean.abs() {
            return (0.0, 1.0);
        }

        let nfft = (n * 4).next_power_of_two();

        let mut buffer: Vec<Complex<f32>> = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let hann = 0.5
                    - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / (n - 1) as f32).cos();
                Complex::new((v - mean) * hann, 0.0)
            })
            .collect();
        buffer.resize(nfft, Complex::new(0.0, 0.0));

        let fft = self.planner.plan_fft_forward(nfft);
        fft.process(&mut buffer);

        let magnitudes: Vec<f32> = buffer[..=nfft / 2].iter().map(|c| c.norm()).collect();
        let df = sample_rate_hz / nfft as f32;

        let peak = magnitudes.iter().copied().fold(0.0f32, f32::max);
        if !(peak > 1e-6) {
            return (0.0, 1.0);
        }

        let total_energy: f32 = magnitudes.iter().map(|m| m * m).sum();
        let low_bins = ((self.config.low_band_hz / df) as usize + 1).min(magnitudes.len());
        let low_energy: f32 = magnitudes[..low_bins].iter().map(|m| m * m).sum();
        let low_band_ratio = (low_energy / total_energy).clamp(0.0, 1.0);

        let max_bin = ((self.config.cutoff_hz / df) as usize).min(magnitudes.len() - 1);
        let normalized: Vec<f32> = magnitudes[..=max_bin].iter().map(|m| m / peak).collect();

        (
            spectral_arc_length(&normalized, self.config.amplitude_threshold),
            low_band_ratio,
        )
    }
}

/// Spectral arc length over a peak-normalized magnitude spectrum.
///
/// The spectrum is cut after the last bin at or above `threshold` and the
/// frequency axis is rescaled to `[0, 1]` over what remains.
pub fn spectral_arc_length(normalized: &[f32], threshold: f32) -> f32 {
    if normalized.len() < 2 {
        return 0.0;
    }

    let last = normalized
        .iter()
        .rposition(|v| *v >= threshold)
        .unwrap_or(0)
        .max(1);

    let step = 1.0 / last as f32;
    let length: f32 = normalized[..=last]
        .windows(2)
        .map(|w| (step * step + (w[1] - w[0]).powi(2)).sqrt())
        .sum();

    -length
}

/// Score from coefficient of variation and peak-to-trough ratio of raw
/// magnitudes.
pub fn statistical_smoothness(values: &[f32]) -> f32 {
    if values.len() < 2 {
        return 100.0;
    }

    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    let cv = if mean.abs() > 1e-6 {
        variance.sqrt() / mean.abs()
    } else {
        0.0
    };

    let max = values.iter().copied().fold(f32::MIN, f32::max);
    let min = values.iter().copied().fold(f32::MAX, f32::min);
    let span = max.abs() + min.abs();
    let peak_to_trough = if span > 1e-6 {
        ((max - min) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };

    clamp_score(50.0 * (-cv).exp() + 50.0 * (1.0 - peak_to_trough))
}

/// Clamp to [0, 100]; NaN maps to 0.
pub fn clamp_score(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
