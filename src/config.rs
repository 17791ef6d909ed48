//! Session configuration.
//!
//! Every field has a default. A JSON document only needs the fields it
//! overrides:
//!
//! ```json
//! { "buffer_capacity": 2000, "rom": { "chord_weight": 0.4, "arc_weight": 0.6 } }
//! ```

use serde::{Deserialize, Serialize};

use crate::angle_threshold::ThresholdDirection;
use crate::buffer::DEFAULT_EVICTION_FRACTION;
use crate::error::{MotionError, Result};
use crate::exercise::RomCapPolicy;
use crate::pattern::ClassifierConfig;
use crate::projection::ProjectorConfig;
use crate::rep_detection::DetectorSettings;
use crate::rom::RomConfig;
use crate::smoothness::SmoothnessConfig;

/// Full configuration of a motion session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Window capacity (samples).
    pub buffer_capacity: usize,
    /// Share of the window evicted on overflow.
    pub eviction_fraction: f32,
    pub projector: ProjectorConfig,
    pub classifier: ClassifierConfig,
    pub rom: RomConfig,
    pub smoothness: SmoothnessConfig,
    /// Spatial samples ignored after tracking becomes usable (ms).
    pub settle_ms: u64,
    /// Usable pose samples between live ROM updates.
    pub live_rom_interval: usize,
    /// Smoothing factor of the live ROM estimate.
    pub live_rom_alpha: f32,
    /// Replaces the exercise's detector settings.
    pub detector_override: Option<DetectorSettings>,
    /// Replaces the exercise's cap policy.
    pub cap_policy_override: Option<RomCapPolicy>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 5_000,
            eviction_fraction: DEFAULT_EVICTION_FRACTION,
            projector: ProjectorConfig::default(),
            classifier: ClassifierConfig::default(),
            rom: RomConfig::default(),
            smoothness: SmoothnessConfig::default(),
            settle_ms: 100,
            live_rom_interval: 10,
            live_rom_alpha: 0.3,
            detector_override: None,
            cap_policy_override: None,
        }
    }
}

impl SessionConfig {
    /// Parse a JSON override document and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every invariant the engine relies on.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(MotionError::ZeroCapacity);
        }
        if !(self.eviction_fraction > 0.0 && self.eviction_fraction <= 1.0) {
            return Err(MotionError::InvalidEvictionFraction(self.eviction_fraction));
        }
        if self.live_rom_interval == 0 {
            return Err(MotionError::invalid("live_rom_interval", "must be at least 1"));
        }
        check_fraction("live_rom_alpha", self.live_rom_alpha)?;
        if self.live_rom_alpha == 0.0 {
            return Err(MotionError::invalid("live_rom_alpha", "must be greater than 0"));
        }

        check_non_negative("projector.min_variance", self.projector.min_variance)?;

        let c = &self.classifier;
        check_fraction("classifier.circle_circularity", c.circle_circularity)?;
        check_fraction("classifier.strong_circularity", c.strong_circularity)?;
        check_fraction("classifier.line_linearity", c.line_linearity)?;
        check_fraction("classifier.arc_linearity", c.arc_linearity)?;
        check_fraction("classifier.arc_circularity", c.arc_circularity)?;
        check_non_negative("classifier.circle_max_closure", c.circle_max_closure)?;

        let r = &self.rom;
        check_non_negative("rom.joint_offset_m", r.joint_offset_m)?;
        check_positive("rom.default_limb_length_m", r.default_limb_length_m)?;
        check_fraction("rom.chord_weight", r.chord_weight)?;
        check_fraction("rom.arc_weight", r.arc_weight)?;
        check_positive("rom.loop_arc_ratio", r.loop_arc_ratio)?;

        let s = &self.smoothness;
        if s.min_samples < 2 {
            return Err(MotionError::invalid("smoothness.min_samples", "must be at least 2"));
        }
        if s.window_size < s.min_samples {
            return Err(MotionError::invalid(
                "smoothness.window_size",
                format!("must be at least min_samples ({})", s.min_samples),
            ));
        }
        check_fraction("smoothness.spectral_weight", s.spectral_weight)?;
        check_fraction("smoothness.ema_alpha", s.ema_alpha)?;
        check_non_negative("smoothness.min_change", s.min_change)?;
        check_positive("smoothness.cutoff_hz", s.cutoff_hz)?;
        check_positive("smoothness.fallback_rate_hz", s.fallback_rate_hz)?;

        if let Some(detector) = &self.detector_override {
            validate_detector(detector)?;
        }

        Ok(())
    }
}

/// Check strategy thresholds.
pub fn validate_detector(settings: &DetectorSettings) -> Result<()> {
    match settings {
        DetectorSettings::Reversal(c) => {
            if c.smoothing_window == 0 {
                return Err(MotionError::invalid("reversal.smoothing_window", "must be at least 1"));
            }
            check_positive("reversal.min_peak_accel", c.min_peak_accel)?;
            check_non_negative("reversal.deadband", c.deadband)?;
        }
        DetectorSettings::RotationAccumulation(c) => {
            check_positive("rotation.threshold_deg", c.threshold_deg)?;
            check_non_negative("rotation.rate_deadband", c.rate_deadband)?;
            check_fraction("rotation.dominance_alpha", c.dominance_alpha)?;
        }
        DetectorSettings::GeometricClosure(c) => {
            check_fraction("loop_closure.full_turn_fraction", c.full_turn_fraction)?;
            check_positive("loop_closure.closure_tolerance_m", c.closure_tolerance_m)?;
            check_non_negative("loop_closure.min_radius_m", c.min_radius_m)?;
            if c.min_samples < 3 {
                return Err(MotionError::invalid("loop_closure.min_samples", "must be at least 3"));
            }
        }
        DetectorSettings::ExternalAngle(c) => {
            check_fraction("angle.min_confidence", c.min_confidence)?;
            let ordered = match c.direction {
                ThresholdDirection::Rising => c.enter_deg > c.exit_deg,
                ThresholdDirection::Falling => c.enter_deg < c.exit_deg,
            };
            if !ordered {
                return Err(MotionError::invalid(
                    "angle.exit_deg",
                    format!(
                        "exit {} must lie before enter {} in the {:?} direction",
                        c.exit_deg, c.enter_deg, c.direction
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn check_fraction(field: &'static str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(MotionError::invalid(field, format!("must be in [0, 1], got {value}")))
    }
}

fn check_positive(field: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(MotionError::invalid(field, format!("must be positive, got {value}")))
    }
}

fn check_non_negative(field: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(MotionError::invalid(field, format!("must be non-negative, got {value}")))
    }
}
