//! Rotation-accumulation repetition detection.
//!
//! For rotational exercises (forearm pronation/supination, wrist turns) the
//! device barely translates, so spatial geometry says little. Instead the
//! angular rate about the dominant axis is integrated:
//! - the dominant axis is the one with the largest smoothed |rate|
//! - rotation accumulates while the rate keeps its sign
//! - a sign reversal closes the movement; it fires when the accumulated
//!   rotation passed the threshold and the debounce has elapsed
//!
//! The accumulated rotation is reported as the repetition's measured ROM.

use serde::{Deserialize, Serialize};

use crate::rep_detection::{Debounce, RepBoundary, RepDetector, SensorInput};
use crate::types::{Axis, DetectionMethod, ImuSample};

/// Configuration for rotation accumulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Fixed rotation axis. `None` follows the dominant axis.
    pub axis: Option<Axis>,
    /// Rotation that must accumulate before a reversal counts (degrees).
    pub threshold_deg: f32,
    /// |rate| below this neither continues nor reverses a movement (rad/s).
    pub rate_deadband: f32,
    /// Smoothing factor for per-axis |rate| used to pick the dominant axis.
    pub dominance_alpha: f32,
    /// Minimum time between boundaries (ms).
    pub debounce_ms: u64,
    /// Gaps longer than this are not integrated across (ms).
    pub max_gap_ms: u64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            axis: None,
            threshold_deg: 45.0,
            rate_deadband: 0.3,
            dominance_alpha: 0.1,
            debounce_ms: 400,
            max_gap_ms: 200,
        }
    }
}

/// Integrates angular rate about the dominant axis.
#[derive(Debug)]
pub struct RotationDetector {
    config: RotationConfig,

    // Axis selection
    axis_energy: [f32; 3],
    active_axis: Option<Axis>,

    // Integration
    prev_timestamp_ms: Option<u64>,
    accumulated_rad: f32,
    direction: i8,

    debounce: Debounce,
    boundaries: u32,
}

impl RotationDetector {
    pub fn new(config: RotationConfig) -> Self {
        Self {
            axis_energy: [0.0; 3],
            active_axis: config.axis,
            prev_timestamp_ms: None,
            accumulated_rad: 0.0,
            direction: 0,
            debounce: Debounce::new(config.debounce_ms),
            boundaries: 0,
            config,
        }
    }

    /// Axis currently integrated.
    pub fn active_axis(&self) -> Option<Axis> {
        self.active_axis
    }

    /// Rotation accumulated in the movement in progress (degrees, unsigned).
    pub fn accumulated_deg(&self) -> f32 {
        self.accumulated_rad.abs().to_degrees()
    }

    fn process_imu(&mut self, sample: &ImuSample) -> Option<RepBoundary> {
        if sample.gyro.iter().any(|g| !g.is_finite()) {
            return None;
        }

        let dt = match self.prev_timestamp_ms {
            Some(prev) if sample.timestamp_ms > prev => {
                let gap = sample.timestamp_ms - prev;
                if gap > self.config.max_gap_ms {
                    0.0
                } else {
                    gap as f32 / 1000.0
                }
            }
            _ => 0.0,
        };
        self.prev_timestamp_ms = Some(sample.timestamp_ms);

        self.update_axis(sample);
        let Some(axis) = self.active_axis else {
            return None;
        };

        let rate = sample.gyro[axis.index()];
        let rate_sign: i8 = if rate > self.config.rate_deadband {
            1
        } else if rate < -self.config.rate_deadband {
            -1
        } else {
            0
        };

        let mut boundary = None;

        if rate_sign != 0 {
            if self.direction == 0 {
                self.direction = rate_sign;
            } else if rate_sign != self.direction {
                boundary = self.close_movement(sample.timestamp_ms);
                self.direction = rate_sign;
                self.accumulated_rad = 0.0;
            }
        }

        if self.direction != 0 {
            self.accumulated_rad += rate * dt;
        }

        boundary
    }

    fn close_movement(&mut self, timestamp_ms: u64) -> Option<RepBoundary> {
        let swept_deg = self.accumulated_deg();
        if swept_deg < self.config.threshold_deg || !self.debounce.ready(timestamp_ms) {
            return None;
        }

        self.debounce.record(timestamp_ms);
        self.boundaries += 1;
        Some(
            RepBoundary::new(timestamp_ms, DetectionMethod::RotationAccumulation)
                .with_measured_rom(swept_deg),
        )
    }

    fn update_axis(&mut self, sample: &ImuSample) {
        if self.config.axis.is_some() {
            return;
        }

        let alpha = self.config.dominance_alpha;
        for axis in Axis::ALL {
            let i = axis.index();
            self.axis_energy[i] = alpha * sample.gyro[i].abs() + (1.0 - alpha) * self.axis_energy[i];
        }

        let mut dominant = Axis::X;
        for axis in Axis::ALL {
            if self.axis_energy[axis.index()] > self.axis_energy[dominant.index()] {
                dominant = axis;
            }
        }

        if self.axis_energy[dominant.index()] <= f32::EPSILON {
            return;
        }

        if self.active_axis != Some(dominant) {
            // Rotation about the old axis says nothing about the new one
            self.active_axis = Some(dominant);
            self.accumulated_rad = 0.0;
            self.direction = 0;
        }
    }
}

impl RepDetector for RotationDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::RotationAccumulation
    }

    fn process_sample(&mut self, input: SensorInput<'_>) -> Option<RepBoundary> {
        match input {
            SensorInput::Inertial(sample) => self.process_imu(sample),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.axis_energy = [0.0; 3];
        self.active_axis = self.config.axis;
        self.prev_timestamp_ms = None;
        self.accumulated_rad = 0.0;
        self.direction = 0;
        self.debounce.reset();
        self.boundaries = 0;
    }

    fn boundary_count(&self) -> u32 {
        self.boundaries
    }
}
