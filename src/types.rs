//! Core data types for the motion analysis engine.
//!
//! This module defines the values that flow between the processing stages:
//! raw spatial, inertial and camera-angle inputs on one side, repetition
//! events and smoothness samples on the other.
//!
//! Design principle: Types should make intent obvious. If a concept exists,
//! it gets a type. Never pass raw tuples or untyped collections across boundaries.
//!
//! All inputs are immutable once created. Timestamps are monotonic
//! milliseconds supplied by the caller.

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// 3D vector in the world frame (meters).
pub type Vec3 = Vector3<f32>;

/// 2D point on a projection plane (meters).
pub type Vec2 = Vector2<f32>;

/// Limb length assumed when no calibration is available (meters).
pub const DEFAULT_LIMB_LENGTH_M: f32 = 0.6;

/// A single spatial position sample.
///
/// Created once per world-tracking callback (~60 Hz). Position is the
/// device position in the tracking world frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Device position [x, y, z] in meters.
    pub position: Vec3,
    /// Monotonic timestamp in milliseconds.
    pub timestamp_ms: u64,
}

impl Sample {
    /// Creates a sample from a timestamp and an `[x, y, z]` position.
    pub fn new(timestamp_ms: u64, position: [f32; 3]) -> Self {
        Self {
            position: Vec3::new(position[0], position[1], position[2]),
            timestamp_ms,
        }
    }

    /// Euclidean distance to another sample's position.
    pub fn distance_to(&self, other: &Sample) -> f32 {
        (self.position - other.position).norm()
    }
}

/// Quality flag reported by the world-tracking subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackingQuality {
    /// Full tracking.
    Normal,
    /// Tracking is running with reduced accuracy (fast motion, low texture).
    Limited,
    /// No pose available. Samples carry no usable position.
    Unavailable,
}

impl TrackingQuality {
    /// Whether samples at this quality may be buffered and measured.
    ///
    /// Processing starts as soon as tracking is usable; it does not wait for
    /// `Normal`.
    pub fn is_usable(&self) -> bool {
        !matches!(self, TrackingQuality::Unavailable)
    }
}

/// A spatial sample paired with the tracking quality it was captured under.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseSample {
    pub sample: Sample,
    pub quality: TrackingQuality,
}

impl PoseSample {
    pub fn new(timestamp_ms: u64, position: [f32; 3], quality: TrackingQuality) -> Self {
        Self {
            sample: Sample::new(timestamp_ms, position),
            quality,
        }
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.sample.timestamp_ms
    }
}

/// A single inertial measurement.
///
/// Acceleration is user acceleration in m/s² (gravity already removed by the
/// platform motion service), angular rate is in rad/s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuSample {
    /// Monotonic timestamp in milliseconds.
    pub timestamp_ms: u64,
    /// Accelerometer reading [x, y, z] in m/s².
    pub accel: [f32; 3],
    /// Gyroscope reading [x, y, z] in rad/s.
    pub gyro: [f32; 3],
}

impl ImuSample {
    pub fn new(timestamp_ms: u64, accel: [f32; 3], gyro: [f32; 3]) -> Self {
        Self {
            timestamp_ms,
            accel,
            gyro,
        }
    }

    /// Magnitude of acceleration in m/s².
    pub fn accel_magnitude(&self) -> f32 {
        let x2 = self.accel[0] * self.accel[0];
        let y2 = self.accel[1] * self.accel[1];
        let z2 = self.accel[2] * self.accel[2];
        (x2 + y2 + z2).sqrt()
    }
}

/// A joint angle produced by the external camera landmark estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointAngleSample {
    /// Monotonic timestamp in milliseconds.
    pub timestamp_ms: u64,
    /// Joint angle in degrees.
    pub angle_deg: f32,
    /// Estimator confidence [0.0, 1.0].
    pub confidence: f32,
}

impl JointAngleSample {
    pub fn new(timestamp_ms: u64, angle_deg: f32, confidence: f32) -> Self {
        Self {
            timestamp_ms,
            angle_deg,
            confidence,
        }
    }
}

/// A sensor axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(&self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Geometric shape of one repetition's projected path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementPattern {
    /// Mostly straight back-and-forth motion.
    Line,
    /// Curved, open path (pendulum, raise).
    Arc,
    /// Closed loop.
    Circle,
    /// No shape could be recognised. Measured like an arc.
    Unknown,
}

impl MovementPattern {
    /// Physiological ceiling for a ROM measured on this pattern (degrees).
    pub fn rom_cap_deg(&self) -> f32 {
        match self {
            MovementPattern::Circle => 360.0,
            MovementPattern::Line | MovementPattern::Arc | MovementPattern::Unknown => 180.0,
        }
    }
}

/// The plane a 3D window is projected onto. Named by the two kept axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectionPlane {
    XY,
    XZ,
    YZ,
}

impl ProjectionPlane {
    /// The plane orthogonal to `axis`.
    pub fn orthogonal_to(axis: Axis) -> Self {
        match axis {
            Axis::X => ProjectionPlane::YZ,
            Axis::Y => ProjectionPlane::XZ,
            Axis::Z => ProjectionPlane::XY,
        }
    }

    /// Project a 3D point by dropping the excluded axis.
    pub fn project(&self, p: &Vec3) -> Vec2 {
        match self {
            ProjectionPlane::XY => Vec2::new(p.x, p.y),
            ProjectionPlane::XZ => Vec2::new(p.x, p.z),
            ProjectionPlane::YZ => Vec2::new(p.y, p.z),
        }
    }
}

/// Which boundary strategy produced a repetition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectionMethod {
    /// Sign flip of a smoothed acceleration axis (pendulum motion).
    Reversal,
    /// Integrated angular rate past a threshold, then reversal.
    RotationAccumulation,
    /// Near-full turn that returns to its start point.
    GeometricClosure,
    /// Camera-supplied joint angle crossing thresholds.
    ExternalAngle,
}

/// One committed repetition.
///
/// Entries are only ever created by the session's boundary handler and never
/// mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepEvent {
    /// 1-based position in the session's history.
    pub index: u32,
    /// Range of motion in degrees, within `[0, pattern.rom_cap_deg()]`.
    pub rom_deg: f32,
    /// Timestamp of the boundary that closed the repetition.
    pub timestamp_ms: u64,
    pub method: DetectionMethod,
    /// Pattern the window was classified as.
    pub pattern: MovementPattern,
}

/// Calibration output consumed read-only at session start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    /// Shoulder-to-grip limb length in meters.
    pub limb_length_m: f32,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self {
            limb_length_m: DEFAULT_LIMB_LENGTH_M,
        }
    }
}

/// One published smoothness score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothnessSample {
    /// Smoothness in [0, 100]; higher is smoother.
    pub value: f32,
    pub timestamp_ms: u64,
}

/// Ephemeral values for live display. Never written to history.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LiveValues {
    /// Smoothed ROM estimate of the repetition in progress (degrees).
    pub rom_deg: f32,
    /// Repetitions committed so far.
    pub rep_count: u32,
    /// Latest smoothness score, if one has been computed.
    pub smoothness: Option<f32>,
    pub timestamp_ms: u64,
}
