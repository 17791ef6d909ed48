//! Repetition boundary detection.
//!
//! A family of interchangeable strategies sharing one contract: feed samples
//! in, get `Some(RepBoundary)` back when a repetition has just finished.
//!
//! | Strategy | Input | Typical exercise |
//! |---|---|---|
//! | `ReversalDetector` | inertial acceleration | pendulum swings |
//! | `RotationDetector` | inertial angular rate | forearm rotation |
//! | `LoopClosureDetector` | spatial positions | tracing circles |
//! | `AngleThresholdDetector` | camera joint angle | camera-observed raises |
//!
//! Each strategy owns only a little hysteresis state (previous sign, peak
//! magnitude, last fire time) and ignores inputs it does not consume. None
//! of them touch the sample window; resetting it is the session's job.

use serde::{Deserialize, Serialize};

use crate::angle_threshold::{AngleThresholdConfig, AngleThresholdDetector};
use crate::loop_closure::{LoopClosureConfig, LoopClosureDetector};
use crate::reversal::{ReversalConfig, ReversalDetector};
use crate::rotation::{RotationConfig, RotationDetector};
use crate::types::{DetectionMethod, ImuSample, JointAngleSample, Sample};

/// One input to a detector.
#[derive(Debug, Clone, Copy)]
pub enum SensorInput<'a> {
    Pose(&'a Sample),
    Inertial(&'a ImuSample),
    JointAngle(&'a JointAngleSample),
}

impl SensorInput<'_> {
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            SensorInput::Pose(s) => s.timestamp_ms,
            SensorInput::Inertial(s) => s.timestamp_ms,
            SensorInput::JointAngle(s) => s.timestamp_ms,
        }
    }
}

/// A detected repetition boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepBoundary {
    pub timestamp_ms: u64,
    pub method: DetectionMethod,
    /// ROM measured directly by the strategy (degrees), when it has one.
    /// Window geometry is used otherwise.
    pub measured_rom_deg: Option<f32>,
}

impl RepBoundary {
    pub fn new(timestamp_ms: u64, method: DetectionMethod) -> Self {
        Self {
            timestamp_ms,
            method,
            measured_rom_deg: None,
        }
    }

    pub fn with_measured_rom(mut self, rom_deg: f32) -> Self {
        self.measured_rom_deg = Some(rom_deg);
        self
    }
}

/// Shared boundary-detection contract.
pub trait RepDetector: Send + std::fmt::Debug {
    /// Strategy implemented by this detector.
    fn method(&self) -> DetectionMethod;

    /// Process one input. Returns a boundary when a repetition just ended.
    fn process_sample(&mut self, input: SensorInput<'_>) -> Option<RepBoundary>;

    /// Drop all hysteresis state.
    fn reset(&mut self);

    /// Boundaries fired since construction or the last reset.
    fn boundary_count(&self) -> u32;

    /// Process a batch of inputs and return every boundary.
    fn process_batch(&mut self, inputs: &[SensorInput<'_>]) -> Vec<RepBoundary> {
        inputs
            .iter()
            .filter_map(|input| self.process_sample(*input))
            .collect()
    }
}

/// Minimum spacing between two accepted events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Debounce {
    interval_ms: u64,
    last_fire_ms: Option<u64>,
}

impl Debounce {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_fire_ms: None,
        }
    }

    /// Whether an event at `timestamp_ms` would be accepted.
    pub fn ready(&self, timestamp_ms: u64) -> bool {
        match self.last_fire_ms {
            None => true,
            Some(last) => timestamp_ms.saturating_sub(last) >= self.interval_ms,
        }
    }

    pub fn record(&mut self, timestamp_ms: u64) {
        self.last_fire_ms = Some(timestamp_ms);
    }

    pub fn last_fire_ms(&self) -> Option<u64> {
        self.last_fire_ms
    }

    pub fn reset(&mut self) {
        self.last_fire_ms = None;
    }
}

/// Strategy selection plus its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum DetectorSettings {
    Reversal(ReversalConfig),
    RotationAccumulation(RotationConfig),
    GeometricClosure(LoopClosureConfig),
    ExternalAngle(AngleThresholdConfig),
}

impl DetectorSettings {
    pub fn method(&self) -> DetectionMethod {
        match self {
            DetectorSettings::Reversal(_) => DetectionMethod::Reversal,
            DetectorSettings::RotationAccumulation(_) => DetectionMethod::RotationAccumulation,
            DetectorSettings::GeometricClosure(_) => DetectionMethod::GeometricClosure,
            DetectorSettings::ExternalAngle(_) => DetectionMethod::ExternalAngle,
        }
    }

    /// Build a fresh detector.
    pub fn build(&self) -> Box<dyn RepDetector> {
        match self {
            DetectorSettings::Reversal(c) => Box::new(ReversalDetector::new(c.clone())),
            DetectorSettings::RotationAccumulation(c) => Box::new(RotationDetector::new(c.clone())),
            DetectorSettings::GeometricClosure(c) => Box::new(LoopClosureDetector::new(c.clone())),
            DetectorSettings::ExternalAngle(c) => Box::new(AngleThresholdDetector::new(c.clone())),
        }
    }
}
