//! Exercise strategy table.
//!
//! Each exercise type maps to one explicit profile: which boundary strategy
//! runs with which thresholds, how ROM is capped, and which stream feeds the
//! smoothness analyzer. Profiles are built once when a session starts.

use serde::{Deserialize, Serialize};

use crate::angle_threshold::{AngleThresholdConfig, ThresholdDirection};
use crate::loop_closure::LoopClosureConfig;
use crate::rep_detection::DetectorSettings;
use crate::reversal::ReversalConfig;
use crate::rotation::RotationConfig;
use crate::smoothness::SmoothnessSource;
use crate::types::{Axis, MovementPattern};

/// Supported exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseType {
    /// Codman pendulum: the arm hangs and swings front to back.
    PendulumSwing,
    /// Forward raise with the device held in hand.
    ArmRaise,
    /// Pronation/supination with the device held in hand.
    ForearmRotation,
    /// Drawing circles in the air with the device.
    CircleTrace,
    /// Camera-observed side raise.
    ShoulderAbduction,
    /// Camera-observed elbow bend.
    ElbowFlexion,
}

impl ExerciseType {
    pub const ALL: [ExerciseType; 6] = [
        ExerciseType::PendulumSwing,
        ExerciseType::ArmRaise,
        ExerciseType::ForearmRotation,
        ExerciseType::CircleTrace,
        ExerciseType::ShoulderAbduction,
        ExerciseType::ElbowFlexion,
    ];

    /// Default profile for this exercise.
    pub fn profile(&self) -> ExerciseProfile {
        match self {
            ExerciseType::PendulumSwing => ExerciseProfile {
                detector: DetectorSettings::Reversal(ReversalConfig::default()),
                cap_policy: RomCapPolicy::PatternBased,
                smoothness_source: SmoothnessSource::Position,
                requires_spatial_tracking: true,
            },
            ExerciseType::ArmRaise => ExerciseProfile {
                detector: DetectorSettings::Reversal(ReversalConfig {
                    axis: Axis::Y,
                    min_peak_accel: 1.0,
                    debounce_ms: 600,
                    ..ReversalConfig::default()
                }),
                cap_policy: RomCapPolicy::Hemisphere,
                smoothness_source: SmoothnessSource::Position,
                requires_spatial_tracking: true,
            },
            ExerciseType::ForearmRotation => ExerciseProfile {
                detector: DetectorSettings::RotationAccumulation(RotationConfig::default()),
                cap_policy: RomCapPolicy::Hemisphere,
                smoothness_source: SmoothnessSource::Acceleration,
                requires_spatial_tracking: false,
            },
            ExerciseType::CircleTrace => ExerciseProfile {
                detector: DetectorSettings::GeometricClosure(LoopClosureConfig::default()),
                cap_policy: RomCapPolicy::PatternBased,
                smoothness_source: SmoothnessSource::Position,
                requires_spatial_tracking: true,
            },
            ExerciseType::ShoulderAbduction => ExerciseProfile {
                detector: DetectorSettings::ExternalAngle(AngleThresholdConfig::default()),
                cap_policy: RomCapPolicy::Hemisphere,
                smoothness_source: SmoothnessSource::Acceleration,
                requires_spatial_tracking: false,
            },
            ExerciseType::ElbowFlexion => ExerciseProfile {
                detector: DetectorSettings::ExternalAngle(AngleThresholdConfig {
                    direction: ThresholdDirection::Falling,
                    enter_deg: 90.0,
                    exit_deg: 150.0,
                    ..AngleThresholdConfig::default()
                }),
                cap_policy: RomCapPolicy::Hemisphere,
                smoothness_source: SmoothnessSource::Acceleration,
                requires_spatial_tracking: false,
            },
        }
    }
}

/// How the ROM ceiling is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RomCapPolicy {
    /// 180° for Line/Arc/Unknown, 360° for Circle.
    #[default]
    PatternBased,
    /// Never above 180°, whatever the pattern.
    Hemisphere,
}

impl RomCapPolicy {
    /// Cap for a window of the given pattern. Never exceeds the pattern cap.
    pub fn cap_deg(&self, pattern: MovementPattern) -> f32 {
        match self {
            RomCapPolicy::PatternBased => pattern.rom_cap_deg(),
            RomCapPolicy::Hemisphere => pattern.rom_cap_deg().min(180.0),
        }
    }
}

/// Everything a session needs to know about the selected exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseProfile {
    pub detector: DetectorSettings,
    pub cap_policy: RomCapPolicy,
    pub smoothness_source: SmoothnessSource,
    /// Boundaries are dropped while spatial tracking is unavailable.
    pub requires_spatial_tracking: bool,
}
