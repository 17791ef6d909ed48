//! Range-of-motion calculation.
//!
//! Converts a projected repetition path into a joint angle. The device is
//! modelled as riding on a rigid limb of known length swinging about the
//! joint, so the path lies on a circle of radius `limb + offset`:
//!
//! - chord: farthest distance from the first point, gives the opening angle
//!   through `2·asin(chord / 2r)`
//! - arc: cumulative path length, used for genuine loops where a chord
//!   cannot exceed the diameter
//!
//! Results are clamped to the pattern's physiological cap. A clamp that
//! changes the value is logged as a warning: it points to drift or a bad
//! calibration, but the repetition still counts.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{MovementPattern, Vec2, DEFAULT_LIMB_LENGTH_M};

/// Parameters of the limb model and the loop blend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RomConfig {
    /// Distance from the limb's end to the sensor (meters).
    pub joint_offset_m: f32,
    /// Limb length substituted for a missing or non-positive calibration.
    pub default_limb_length_m: f32,
    /// Weight of the chord angle in the loop blend.
    pub chord_weight: f32,
    /// Weight of the arc angle in the loop blend.
    pub arc_weight: f32,
    /// Arc-to-chord ratio above which a circle is treated as a full loop.
    pub loop_arc_ratio: f32,
    /// Paths shorter than this yield a zero ROM.
    pub min_points: usize,
}

impl Default for RomConfig {
    fn default() -> Self {
        Self {
            joint_offset_m: 0.15,
            default_limb_length_m: DEFAULT_LIMB_LENGTH_M,
            chord_weight: 0.3,
            arc_weight: 0.7,
            loop_arc_ratio: 1.5,
            min_points: 2,
        }
    }
}

/// Outcome of one ROM measurement.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RomResult {
    /// Final angle in degrees, within `[0, cap_deg]`.
    pub angle_deg: f32,
    /// Angle before clamping.
    pub raw_angle_deg: f32,
    /// Cap applied.
    pub cap_deg: f32,
    /// Whether clamping changed the value.
    pub clamped: bool,
    pub chord_m: f32,
    pub arc_m: f32,
    pub radius_m: f32,
}

/// Measures ROM for one user's calibrated limb.
#[derive(Debug, Clone)]
pub struct RomCalculator {
    config: RomConfig,
    limb_length_m: f32,
}

impl RomCalculator {
    /// Create a calculator for a calibrated limb length.
    ///
    /// A non-positive or non-finite length is replaced by the configured
    /// default and logged; it is never an error.
    pub fn new(config: RomConfig, limb_length_m: f32) -> Self {
        let limb_length_m = if limb_length_m.is_finite() && limb_length_m > 0.0 {
            limb_length_m
        } else {
            warn!(
                limb_length_m,
                default_m = config.default_limb_length_m,
                "invalid limb length, using default"
            );
            config.default_limb_length_m
        };

        Self {
            config,
            limb_length_m,
        }
    }

    pub fn config(&self) -> &RomConfig {
        &self.config
    }

    /// Effective limb length (meters).
    pub fn limb_length_m(&self) -> f32 {
        self.limb_length_m
    }

    /// Swing radius: limb length plus sensor offset.
    pub fn radius_m(&self) -> f32 {
        self.limb_length_m + self.config.joint_offset_m
    }

    /// Measure a path, capped by its pattern.
    pub fn measure(&self, points: &[Vec2], pattern: MovementPattern) -> RomResult {
        self.measure_with_cap(points, pattern, pattern.rom_cap_deg())
    }

    /// Measure a path with an explicit cap. The cap never exceeds the
    /// pattern's own cap.
    pub fn measure_with_cap(&self, points: &[Vec2], pattern: MovementPattern, cap_deg: f32) -> RomResult {
        let cap_deg = cap_deg.min(pattern.rom_cap_deg());
        let radius_m = self.radius_m();

        if points.len() < self.config.min_points {
            return RomResult {
                cap_deg,
                radius_m,
                ..RomResult::default()
            };
        }

        let chord_m = chord_length(points);
        let arc_m = arc_length(points);
        let base_deg = chord_angle_deg(chord_m, radius_m);

        let raw_angle_deg = if pattern == MovementPattern::Circle
            && arc_m > self.config.loop_arc_ratio * chord_m
        {
            let arc_deg = (arc_m / radius_m).to_degrees();
            self.config.chord_weight * base_deg + self.config.arc_weight * arc_deg
        } else {
            base_deg
        };

        let (angle_deg, clamped) = self.finalize(raw_angle_deg, cap_deg);

        RomResult {
            angle_deg,
            raw_angle_deg,
            cap_deg,
            clamped,
            chord_m,
            arc_m,
            radius_m,
        }
    }

    /// Clamp a raw angle to `[0, cap_deg]`, warning when the value changes.
    pub fn finalize(&self, raw_deg: f32, cap_deg: f32) -> (f32, bool) {
        let angle = clamp_rom(raw_deg, cap_deg);
        let clamped = angle != raw_deg;
        if clamped {
            warn!(raw_deg, cap_deg, angle, "ROM clamped to physiological range");
        }
        (angle, clamped)
    }
}

/// `min(max(raw, 0), cap)`; non-finite input maps to 0.
pub fn clamp_rom(raw_deg: f32, cap_deg: f32) -> f32 {
    if !raw_deg.is_finite() {
        return 0.0;
    }
    raw_deg.max(0.0).min(cap_deg.max(0.0))
}

/// Largest distance from the first point to any other point.
pub fn chord_length(points: &[Vec2]) -> f32 {
    let Some(first) = points.first() else {
        return 0.0;
    };
    points[1..]
        .iter()
        .map(|p| (p - first).norm())
        .fold(0.0, f32::max)
}

/// Cumulative point-to-point distance.
pub fn arc_length(points: &[Vec2]) -> f32 {
    points.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
}

/// Opening angle of a chord on a circle, in degrees.
pub fn chord_angle_deg(chord_m: f32, radius_m: f32) -> f32 {
    if radius_m <= 0.0 {
        return 0.0;
    }
    let ratio = (chord_m / (2.0 * radius_m)).min(1.0);
    (2.0 * ratio.asin()).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::PI;

    fn circle_points(radius: f32, turns: f32, count: usize) -> Vec<Vec2> {
        (0..count)
            .map(|i| {
                let t = 2.0 * PI * turns * i as f32 / (count - 1) as f32;
                Vec2::new(radius * t.cos(), radius * t.sin())
            })
            .collect()
    }

    #[test]
    fn test_chord_angle_scenario() {
        let calculator = RomCalculator::new(RomConfig::default(), 0.7);
        let points = vec![Vec2::new(0.0, 0.0), Vec2::new(0.25, 0.05), Vec2::new(0.5, 0.0)];

        let result = calculator.measure(&points, MovementPattern::Arc);

        assert_abs_diff_eq!(result.radius_m, 0.85, epsilon = 1e-6);
        assert_abs_diff_eq!(result.chord_m, 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(result.angle_deg, 34.2, epsilon = 0.1);
        assert!(!result.clamped);
    }

    #[test]
    fn test_line_clamps_to_180_with_flag() {
        let calculator = RomCalculator::new(RomConfig::default(), 0.6);

        let (angle, clamped) = calculator.finalize(404.0, MovementPattern::Line.rom_cap_deg());

        assert_eq!(angle, 180.0);
        assert!(clamped);
    }

    #[test]
    fn test_multi_loop_circle_clamps_to_360() {
        let calculator = RomCalculator::new(RomConfig::default(), 0.1);
        let points = circle_points(0.2, 3.0, 300);

        let result = calculator.measure(&points, MovementPattern::Circle);

        assert!(result.raw_angle_deg > 360.0);
        assert_eq!(result.angle_deg, 360.0);
        assert!(result.clamped);
    }

    #[test]
    fn test_single_loop_uses_arc_blend() {
        let calculator = RomCalculator::new(RomConfig::default(), 0.45);
        let points = circle_points(0.2, 1.0, 120);

        let result = calculator.measure(&points, MovementPattern::Circle);

        let base = chord_angle_deg(result.chord_m, 0.6);
        let arc_deg = (result.arc_m / 0.6).to_degrees();
        assert_abs_diff_eq!(result.raw_angle_deg, 0.3 * base + 0.7 * arc_deg, epsilon = 1e-3);
        assert!(result.angle_deg <= 360.0);
    }

    #[test]
    fn test_arc_pattern_ignores_loop_blend() {
        let calculator = RomCalculator::new(RomConfig::default(), 0.45);
        let points = circle_points(0.2, 1.0, 120);

        let result = calculator.measure(&points, MovementPattern::Arc);

        assert_abs_diff_eq!(result.raw_angle_deg, chord_angle_deg(result.chord_m, 0.6), epsilon = 1e-4);
    }

    #[test]
    fn test_short_path_is_zero() {
        let calculator = RomCalculator::new(RomConfig::default(), 0.6);
        let result = calculator.measure(&[Vec2::new(1.0, 1.0)], MovementPattern::Line);
        assert_eq!(result.angle_deg, 0.0);
        assert!(!result.clamped);

        let empty = calculator.measure(&[], MovementPattern::Circle);
        assert_eq!(empty.angle_deg, 0.0);
    }

    #[test]
    fn test_non_positive_limb_uses_default() {
        let calculator = RomCalculator::new(RomConfig::default(), 0.0);
        assert_eq!(calculator.limb_length_m(), DEFAULT_LIMB_LENGTH_M);
        assert_abs_diff_eq!(calculator.radius_m(), 0.75, epsilon = 1e-6);

        let calculator = RomCalculator::new(RomConfig::default(), -1.0);
        assert_eq!(calculator.limb_length_m(), DEFAULT_LIMB_LENGTH_M);

        let calculator = RomCalculator::new(RomConfig::default(), f32::NAN);
        assert_eq!(calculator.limb_length_m(), DEFAULT_LIMB_LENGTH_M);
    }

    #[test]
    fn test_explicit_cap_cannot_exceed_pattern_cap() {
        let calculator = RomCalculator::new(RomConfig::default(), 0.6);
        let points = [Vec2::new(0.0, 0.0), Vec2::new(0.1, 0.0)];
        let result = calculator.measure_with_cap(&points, MovementPattern::Line, 500.0);
        assert_eq!(result.cap_deg, 180.0);
    }

    #[test]
    fn test_chord_saturates_at_diameter() {
        assert_abs_diff_eq!(chord_angle_deg(10.0, 0.5), 180.0, epsilon = 1e-3);
        assert_eq!(chord_angle_deg(0.3, 0.0), 0.0);
    }

    #[test]
    fn test_path_lengths() {
        let points = vec![Vec2::new(0.0, 0.0), Vec2::new(3.0, 4.0), Vec2::new(0.0, 0.0)];
        assert_abs_diff_eq!(chord_length(&points), 5.0);
        assert_abs_diff_eq!(arc_length(&points), 10.0);
    }

    proptest::proptest! {
        #[test]
        fn prop_clamp_is_min_max(raw in -1000.0f32..1000.0, cap in 0.0f32..400.0) {
            proptest::prop_assert_eq!(clamp_rom(raw, cap), raw.max(0.0).min(cap));
        }

        #[test]
        fn prop_rom_within_pattern_cap(
            coords in proptest::collection::vec((-3.0f32..3.0, -3.0f32..3.0), 0..80),
            limb in -1.0f32..2.0,
            pattern_idx in 0usize..4,
        ) {
            let pattern = [
                MovementPattern::Line,
                MovementPattern::Arc,
                MovementPattern::Circle,
                MovementPattern::Unknown,
            ][pattern_idx];
            let points: Vec<Vec2> = coords.iter().map(|(x, y)| Vec2::new(*x, *y)).collect();
            let calculator = RomCalculator::new(RomConfig::default(), limb);

            let result = calculator.measure(&points, pattern);

            proptest::prop_assert!(result.angle_deg >= 0.0);
            proptest::prop_assert!(result.angle_deg <= pattern.rom_cap_deg());
        }
    }
}
