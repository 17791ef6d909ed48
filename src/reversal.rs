//! Acceleration-reversal repetition detection.
//!
//! For pendulum-style movement: the hand accelerates one way, then the
//! other, and every change of direction closes a swing.
//!
//! The sign of one acceleration axis is voted over a short rolling window so
//! a single noisy sample cannot flip it. A flip fires a boundary only when:
//! - the phase that just ended reached a minimum peak magnitude
//! - the debounce interval has elapsed since the last boundary
//!
//! A flip that fails either test still starts a new phase, so weak wobbles
//! do not accumulate into a later false boundary.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::rep_detection::{Debounce, RepBoundary, RepDetector, SensorInput};
use crate::types::{Axis, DetectionMethod, ImuSample};

/// Configuration for reversal detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReversalConfig {
    /// Acceleration axis whose sign is tracked.
    pub axis: Axis,
    /// Samples in the sign-voting window. 12 is 200ms at 60Hz.
    pub smoothing_window: usize,
    /// Peak |acceleration| a phase must reach to count (m/s²).
    pub min_peak_accel: f32,
    /// |acceleration| below this votes for neither sign (m/s²).
    pub deadband: f32,
    /// Minimum time between boundaries (ms).
    pub debounce_ms: u64,
}

impl Default for ReversalConfig {
    fn default() -> Self {
        Self {
            axis: Axis::X,
            smoothing_window: 12,
            min_peak_accel: 0.8,
            deadband: 0.05,
            debounce_ms: 300,
        }
    }
}

/// Sign-flip detector over one acceleration axis.
#[derive(Debug)]
pub struct ReversalDetector {
    config: ReversalConfig,

    // Rolling window of recent axis values
    recent: VecDeque<f32>,

    // Hysteresis
    current_sign: i8,
    peak_magnitude: f32,
    debounce: Debounce,

    // Statistics
    boundaries: u32,
    rejected_flips: u32,
}

impl ReversalDetector {
    pub fn new(config: ReversalConfig) -> Self {
        let window = config.smoothing_window.max(1);
        Self {
            recent: VecDeque::with_capacity(window),
            current_sign: 0,
            peak_magnitude: 0.0,
            debounce: Debounce::new(config.debounce_ms),
            boundaries: 0,
            rejected_flips: 0,
            config,
        }
    }

    /// Sign of the phase in progress (0 before the first phase).
    pub fn current_sign(&self) -> i8 {
        self.current_sign
    }

    /// Largest |acceleration| seen in the phase in progress.
    pub fn peak_magnitude(&self) -> f32 {
        self.peak_magnitude
    }

    /// Flips that were ignored for low magnitude or debounce.
    pub fn rejected_flips(&self) -> u32 {
        self.rejected_flips
    }

    fn process_imu(&mut self, sample: &ImuSample) -> Option<RepBoundary> {
        let value = sample.accel[self.config.axis.index()];
        if !value.is_finite() {
            return None;
        }

        if self.recent.len() >= self.config.smoothing_window.max(1) {
            self.recent.pop_front();
        }
        self.recent.push_back(value);

        // The vote lags the signal, so only same-sign values count toward
        // the phase in progress. Values of the next phase are picked up by
        // `phase_peak` when the flip lands.
        if self.current_sign == 0 || sign_of(value) == self.current_sign {
            self.peak_magnitude = self.peak_magnitude.max(value.abs());
        }

        let voted = self.voted_sign();
        if voted == 0 || voted == self.current_sign {
            return None;
        }

        if self.current_sign == 0 {
            // First phase of the session
            self.current_sign = voted;
            self.peak_magnitude = self.phase_peak(voted);
            return None;
        }

        let strong_enough = self.peak_magnitude >= self.config.min_peak_accel;
        let fire = strong_enough && self.debounce.ready(sample.timestamp_ms);

        self.current_sign = voted;
        self.peak_magnitude = self.phase_peak(voted);

        if fire {
            self.debounce.record(sample.timestamp_ms);
            self.boundaries += 1;
            Some(RepBoundary::new(sample.timestamp_ms, DetectionMethod::Reversal))
        } else {
            self.rejected_flips += 1;
            None
        }
    }

    /// Majority sign of the window, ignoring values inside the deadband.
    /// A tie keeps the current sign.
    fn voted_sign(&self) -> i8 {
        let deadband = self.config.deadband;
        let balance: i32 = self
            .recent
            .iter()
            .map(|v| {
                if *v > deadband {
                    1
                } else if *v < -deadband {
                    -1
                } else {
                    0
                }
            })
            .sum();

        match balance.signum() {
            0 => self.current_sign,
            s => s as i8,
        }
    }

    /// Peak of the window values that already belong to the new phase.
    fn phase_peak(&self, sign: i8) -> f32 {
        self.recent
            .iter()
            .filter(|v| sign_of(**v) == sign)
            .fold(0.0, |peak, v| peak.max(v.abs()))
    }
}

fn sign_of(value: f32) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

impl RepDetector for ReversalDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Reversal
    }

    fn process_sample(&mut self, input: SensorInput<'_>) -> Option<RepBoundary> {
        match input {
            SensorInput::Inertial(sample) => self.process_imu(sample),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.recent.clear();
        self.current_sign = 0;
        self.peak_magnitude = 0.0;
        self.debounce.reset();
        self.boundaries = 0;
        self.rejected_flips = 0;
    }

    fn boundary_count(&self) -> u32 {
        self.boundaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imu(t: u64, ax: f32) -> ImuSample {
        ImuSample::new(t, [ax, 0.0, 0.0], [0.0, 0.0, 0.0])
    }

    fn feed(detector: &mut ReversalDetector, samples: &[ImuSample]) -> Vec<(usize, RepBoundary)> {
        samples
            .iter()
            .enumerate()
            .filter_map(|(i, s)| detector.process_sample(SensorInput::Inertial(s)).map(|b| (i, b)))
            .collect()
    }

    /// Pendulum: sinusoidal acceleration along X at 60Hz.
    fn pendulum(period_ms: u64, swings: u32, amplitude: f32) -> Vec<ImuSample> {
        let dt = 16;
        let total = period_ms * swings as u64 / 2;
        (0..total / dt)
            .map(|i| {
                let t = i * dt;
                let phase = 2.0 * std::f32::consts::PI * t as f32 / period_ms as f32;
                imu(t, amplitude * phase.sin())
            })
            .collect()
    }

    #[test]
    fn test_single_strong_phase_fires_once_at_flip() {
        let mut detector = ReversalDetector::new(ReversalConfig::default());
        let values = [0.3, 0.4, 1.2, 0.3, -0.3, -0.3, -0.3, -0.3, -0.3];
        let samples: Vec<ImuSample> = values
            .iter()
            .enumerate()
            .map(|(i, v)| imu(1000 + i as u64 * 16, *v))
            .collect();

        let fired = feed(&mut detector, &samples);

        assert_eq!(fired.len(), 1);
        // Vote turns negative once negatives outnumber the four positives
        assert_eq!(fired[0].0, 8);
        assert_eq!(fired[0].1.method, DetectionMethod::Reversal);
        assert_eq!(fired[0].1.timestamp_ms, 1000 + 8 * 16);
        assert_eq!(detector.current_sign(), -1);
    }

    #[test]
    fn test_weak_flip_resets_without_firing() {
        let mut detector = ReversalDetector::new(ReversalConfig {
            smoothing_window: 1,
            ..ReversalConfig::default()
        });
        let samples = vec![imu(0, 0.3), imu(16, 0.4), imu(32, -0.3), imu(48, -0.5)];

        let fired = feed(&mut detector, &samples);

        assert!(fired.is_empty());
        assert_eq!(detector.rejected_flips(), 1);
        assert!(detector.peak_magnitude() < 0.8);
    }

    #[test]
    fn test_weak_phase_before_strong_one_does_not_fire() {
        let mut detector = ReversalDetector::new(ReversalConfig::default());
        let mut samples: Vec<ImuSample> = (0..12).map(|i| imu(i * 16, 0.3)).collect();
        samples.extend((12..24).map(|i| imu(i * 16, -2.0)));

        let fired = feed(&mut detector, &samples);

        // The vote lags by the window; the -2.0 samples seen before the flip
        // belong to the new phase, not to the weak one
        assert!(fired.is_empty(), "weak phase fired at {fired:?}");
        assert_eq!(detector.rejected_flips(), 1);
        assert_eq!(detector.current_sign(), -1);
        assert_eq!(detector.peak_magnitude(), 2.0);

        // The strong phase does count once it ends
        samples.clear();
        samples.extend((24..36).map(|i| imu(i * 16, 2.0)));
        let fired = feed(&mut detector, &samples);

        assert_eq!(fired.len(), 1);
        // Positives outnumber the remaining negatives on the 7th sample
        assert_eq!(fired[0].1.timestamp_ms, 30 * 16);
    }

    #[test]
    fn test_flips_inside_debounce_only_first_fires() {
        let mut detector = ReversalDetector::new(ReversalConfig {
            smoothing_window: 1,
            ..ReversalConfig::default()
        });
        // Strong flips every 50ms
        let samples: Vec<ImuSample> = (0..8)
            .map(|i| imu(i * 50, if i % 2 == 0 { 2.0 } else { -2.0 }))
            .collect();

        let fired = feed(&mut detector, &samples);

        // Flips at 50, 100, ..., 350; debounce 300 lets 50 and 350 through
        let times: Vec<u64> = fired.iter().map(|(_, b)| b.timestamp_ms).collect();
        assert_eq!(times, vec![50, 350]);
        assert!(!times.windows(2).any(|w| w[1] - w[0] < 300));
    }

    #[test]
    fn test_pendulum_counts_each_swing() {
        let mut detector = ReversalDetector::new(ReversalConfig::default());
        let samples = pendulum(2000, 10, 2.0);

        let fired = feed(&mut detector, &samples);

        // 10 half-periods; the first phase only arms the detector
        assert!(fired.len() >= 8 && fired.len() <= 10, "got {} swings", fired.len());
    }

    #[test]
    fn test_small_sway_never_fires() {
        let mut detector = ReversalDetector::new(ReversalConfig::default());
        let samples = pendulum(2000, 10, 0.3);

        assert!(feed(&mut detector, &samples).is_empty());
    }

    #[test]
    fn test_single_spike_does_not_flip() {
        let mut detector = ReversalDetector::new(ReversalConfig::default());
        let mut samples: Vec<ImuSample> = (0..12).map(|i| imu(i * 16, 1.5)).collect();
        samples.push(imu(12 * 16, -3.0));
        samples.extend((13..20).map(|i| imu(i * 16, 1.5)));

        assert!(feed(&mut detector, &samples).is_empty());
        assert_eq!(detector.current_sign(), 1);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut detector = ReversalDetector::new(ReversalConfig::default());
        let _ = feed(&mut detector, &pendulum(2000, 4, 2.0));
        assert!(detector.boundary_count() > 0);

        detector.reset();

        assert_eq!(detector.boundary_count(), 0);
        assert_eq!(detector.current_sign(), 0);
        assert_eq!(detector.peak_magnitude(), 0.0);
    }

    #[test]
    fn test_axis_selection() {
        let mut detector = ReversalDetector::new(ReversalConfig {
            axis: Axis::Z,
            smoothing_window: 1,
            ..ReversalConfig::default()
        });
        let samples = [
            ImuSample::new(0, [5.0, 0.0, 1.0], [0.0; 3]),
            ImuSample::new(400, [-5.0, 0.0, -1.0], [0.0; 3]),
        ];

        let fired: Vec<_> = samples
            .iter()
            .filter_map(|s| detector.process_sample(SensorInput::Inertial(s)))
            .collect();

        assert_eq!(fired.len(), 1);
    }
}
