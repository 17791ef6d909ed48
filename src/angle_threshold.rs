//! External joint-angle threshold detection.
//!
//! Camera-observed exercises arrive as a pre-computed joint angle with a
//! confidence. A repetition is one excursion past the enter threshold and
//! back past the exit threshold. The gap between the two thresholds is the
//! hysteresis band, so jitter around a single threshold cannot double count.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::rep_detection::{Debounce, RepBoundary, RepDetector, SensorInput};
use crate::types::{DetectionMethod, JointAngleSample};

/// Which way the angle moves during the working phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdDirection {
    /// Angle grows during the movement (abduction, raises).
    #[default]
    Rising,
    /// Angle shrinks during the movement (elbow flexion measured at the elbow).
    Falling,
}

/// Configuration for the angle threshold detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AngleThresholdConfig {
    pub direction: ThresholdDirection,
    /// Crossing this starts the working phase (degrees).
    pub enter_deg: f32,
    /// Crossing back over this completes the repetition (degrees).
    pub exit_deg: f32,
    /// Estimator confidence below this is ignored.
    pub min_confidence: f32,
    /// Minimum time between boundaries (ms).
    pub cooldown_ms: u64,
}

impl Default for AngleThresholdConfig {
    fn default() -> Self {
        Self {
            direction: ThresholdDirection::Rising,
            enter_deg: 60.0,
            exit_deg: 30.0,
            min_confidence: 0.5,
            cooldown_ms: 800,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    /// Waiting for the enter crossing. Tracks the starting extreme.
    Rest { start_deg: Option<f32> },
    /// Past the enter threshold. Tracks the furthest angle reached.
    Working { start_deg: f32, extreme_deg: f32 },
}

/// Enter/exit threshold state machine over joint angles.
#[derive(Debug)]
pub struct AngleThresholdDetector {
    config: AngleThresholdConfig,
    phase: Phase,
    debounce: Debounce,
    boundaries: u32,
    low_confidence: u64,
}

impl AngleThresholdDetector {
    pub fn new(config: AngleThresholdConfig) -> Self {
        Self {
            phase: Phase::Rest { start_deg: None },
            debounce: Debounce::new(config.cooldown_ms),
            boundaries: 0,
            low_confidence: 0,
            config,
        }
    }

    /// Whether the working phase is in progress.
    pub fn in_working_phase(&self) -> bool {
        matches!(self.phase, Phase::Working { .. })
    }

    /// Samples dropped for low confidence.
    pub fn low_confidence_count(&self) -> u64 {
        self.low_confidence
    }

    /// `a` lies further along the working direction than `b`.
    fn further(&self, a: f32, b: f32) -> bool {
        match self.config.direction {
            ThresholdDirection::Rising => a > b,
            ThresholdDirection::Falling => a < b,
        }
    }

    fn process_angle(&mut self, sample: &JointAngleSample) -> Option<RepBoundary> {
        let angle = sample.angle_deg;
        if !angle.is_finite() || !(sample.confidence >= self.config.min_confidence) {
            self.low_confidence += 1;
            return None;
        }

        match self.phase {
            Phase::Rest { start_deg } => {
                let start = match start_deg {
                    Some(s) if !self.further(s, angle) => s,
                    _ => angle,
                };
                if !self.further(self.config.enter_deg, angle) {
                    trace!(angle_deg = angle, "working phase entered");
                    self.phase = Phase::Working {
                        start_deg: start,
                        extreme_deg: angle,
                    };
                } else {
                    self.phase = Phase::Rest {
                        start_deg: Some(start),
                    };
                }
                None
            }
            Phase::Working {
                start_deg,
                extreme_deg,
            } => {
                let extreme = if self.further(angle, extreme_deg) {
                    angle
                } else {
                    extreme_deg
                };

                if self.further(angle, self.config.exit_deg) {
                    self.phase = Phase::Working {
                        start_deg,
                        extreme_deg: extreme,
                    };
                    return None;
                }

                // Back past the exit threshold; the next excursion starts here
                self.phase = Phase::Rest {
                    start_deg: Some(angle),
                };

                if !self.debounce.ready(sample.timestamp_ms) {
                    return None;
                }

                self.debounce.record(sample.timestamp_ms);
                self.boundaries += 1;
                Some(
                    RepBoundary::new(sample.timestamp_ms, DetectionMethod::ExternalAngle)
                        .with_measured_rom((extreme - start_deg).abs()),
                )
            }
        }
    }
}

impl RepDetector for AngleThresholdDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::ExternalAngle
    }

    fn process_sample(&mut self, input: SensorInput<'_>) -> Option<RepBoundary> {
        match input {
            SensorInput::JointAngle(sample) => self.process_angle(sample),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.phase = Phase::Rest { start_deg: None };
        self.debounce.reset();
        self.boundaries = 0;
        self.low_confidence = 0;
    }

    fn boundary_count(&self) -> u32 {
        self.boundaries
    }
}
