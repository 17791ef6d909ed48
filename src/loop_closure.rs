//! Geometric loop-closure repetition detection.
//!
//! For free-form circular motion traced with the device. A repetition is a
//! loop that:
//! 1. sweeps at least ~85% of a full turn about its center
//! 2. comes back to within a tolerance of where it started
//!
//! Both are required. Sweep alone accepts spirals that drift away; closure
//! alone accepts a short out-and-back.
//!
//! The center is re-estimated on every sample with an algebraic (Kåsa)
//! least-squares circle fit over the loop so far. A running centroid is not
//! good enough: on a partial arc it sits inside the arc and under-reports the
//! swept angle by roughly a quarter turn.

use std::f32::consts::TAU;

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::buffer::BoundedBuffer;
use crate::projection::{axis_statistics, least_variance_axis};
use crate::rep_detection::{Debounce, RepBoundary, RepDetector, SensorInput};
use crate::types::{DetectionMethod, ProjectionPlane, Sample, Vec2};

/// Configuration for loop closure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopClosureConfig {
    /// Share of a full turn the loop must sweep.
    pub full_turn_fraction: f32,
    /// Absolute start-return tolerance (meters).
    pub closure_tolerance_m: f32,
    /// Start-return tolerance relative to the fitted radius.
    pub closure_tolerance_ratio: f32,
    /// Loops with a smaller fitted radius are jitter (meters).
    pub min_radius_m: f32,
    /// Samples needed before a loop is evaluated.
    pub min_samples: usize,
    /// Longest loop attempt kept (samples). Older points are evicted.
    pub max_loop_samples: usize,
    /// Minimum time between boundaries (ms).
    pub debounce_ms: u64,
}

impl Default for LoopClosureConfig {
    fn default() -> Self {
        Self {
            full_turn_fraction: 0.85,
            closure_tolerance_m: 0.05,
            closure_tolerance_ratio: 0.3,
            min_radius_m: 0.03,
            min_samples: 10,
            max_loop_samples: 900,
            debounce_ms: 500,
        }
    }
}

/// Fitted circle on a projection plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleFit {
    pub center: Vec2,
    pub radius: f32,
}

/// Loop detector over spatial positions.
#[derive(Debug)]
pub struct LoopClosureDetector {
    config: LoopClosureConfig,
    loop_points: BoundedBuffer<Sample>,
    last_sweep_rad: f32,
    last_fit: Option<CircleFit>,
    debounce: Debounce,
    boundaries: u32,
}

impl LoopClosureDetector {
    pub fn new(config: LoopClosureConfig) -> Self {
        let capacity = config.max_loop_samples.max(config.min_samples);
        Self {
            loop_points: BoundedBuffer::at_least_one(capacity),
            last_sweep_rad: 0.0,
            last_fit: None,
            debounce: Debounce::new(config.debounce_ms),
            boundaries: 0,
            config,
        }
    }

    /// Angle swept by the loop in progress at the last evaluation (degrees, signed).
    pub fn swept_deg(&self) -> f32 {
        self.last_sweep_rad.to_degrees()
    }

    /// Circle fitted at the last evaluation.
    pub fn last_fit(&self) -> Option<CircleFit> {
        self.last_fit
    }

    /// Samples in the loop attempt in progress.
    pub fn loop_len(&self) -> usize {
        self.loop_points.len()
    }

    fn process_position(&mut self, sample: &Sample) -> Option<RepBoundary> {
        if sample.position.iter().any(|c| !c.is_finite()) {
            return None;
        }

        self.loop_points.append(*sample);
        if self.loop_points.len() < self.config.min_samples {
            return None;
        }

        let points = self.loop_points.as_slice();
        let (_, variance) = axis_statistics(points);
        let plane = ProjectionPlane::orthogonal_to(least_variance_axis(&variance));
        let projected: Vec<Vec2> = points.iter().map(|s| plane.project(&s.position)).collect();

        let fit = fit_circle(&projected);
        self.last_fit = fit;
        let Some(fit) = fit else {
            self.last_sweep_rad = 0.0;
            return None;
        };
        if fit.radius < self.config.min_radius_m {
            self.last_sweep_rad = 0.0;
            return None;
        }

        self.last_sweep_rad = swept_angle(&projected, fit.center, 0.5 * fit.radius);

        let start = points[0].position;
        let return_distance = (sample.position - start).norm();
        let tolerance = self
            .config
            .closure_tolerance_m
            .max(self.config.closure_tolerance_ratio * fit.radius);

        let full_enough = self.last_sweep_rad.abs() >= self.config.full_turn_fraction * TAU;
        if !full_enough || return_distance > tolerance {
            return None;
        }

        // The loop closed; the next attempt starts here whether or not it counts
        let fire = self.debounce.ready(sample.timestamp_ms);
        self.restart_at(*sample);

        if !fire {
            return None;
        }

        self.debounce.record(sample.timestamp_ms);
        self.boundaries += 1;
        Some(RepBoundary::new(sample.timestamp_ms, DetectionMethod::GeometricClosure))
    }

    fn restart_at(&mut self, sample: Sample) {
        self.loop_points.reset();
        self.loop_points.append(sample);
        self.last_sweep_rad = 0.0;
    }
}

impl RepDetector for LoopClosureDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::GeometricClosure
    }

    fn process_sample(&mut self, input: SensorInput<'_>) -> Option<RepBoundary> {
        match input {
            SensorInput::Pose(sample) => self.process_position(sample),
            _ => None,
        }
    }

    fn reset(&mut self) {
        self.loop_points.reset();
        self.last_sweep_rad = 0.0;
        self.last_fit = None;
        self.debounce.reset();
        self.boundaries = 0;
    }

    fn boundary_count(&self) -> u32 {
        self.boundaries
    }
}

/// Algebraic least-squares circle fit.
///
/// Solves `u² + v² + D·u + E·v + F = 0` in coordinates centered on the mean.
/// Returns `None` for fewer than three points or (near-)colinear input.
pub fn fit_circle(points: &[Vec2]) -> Option<CircleFit> {
    if points.len() < 3 {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.x as f64).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y as f64).sum::<f64>() / n;

    let mut normal = Matrix3::<f64>::zeros();
    let mut rhs = Vector3::<f64>::zeros();
    for p in points {
        let u = p.x as f64 - mean_x;
        let v = p.y as f64 - mean_y;
        let row = Vector3::new(u, v, 1.0);
        normal += row * row.transpose();
        rhs += row * -(u * u + v * v);
    }

    // Reject ill-conditioned systems relative to the data scale
    let scale = normal[(0, 0)] + normal[(1, 1)];
    if scale <= 0.0 || normal.determinant().abs() <= 1e-9 * scale * scale * n {
        return None;
    }

    let solution = normal.lu().solve(&rhs)?;
    let (d, e, f) = (solution[0], solution[1], solution[2]);
    let cu = -d / 2.0;
    let cv = -e / 2.0;
    let radius_sq = cu * cu + cv * cv - f;
    if !radius_sq.is_finite() || radius_sq <= 0.0 {
        return None;
    }

    Some(CircleFit {
        center: Vec2::new((cu + mean_x) as f32, (cv + mean_y) as f32),
        radius: radius_sq.sqrt() as f32,
    })
}

/// Signed angle swept by a path about `center` (radians).
///
/// Points closer than `min_radius` to the center carry no reliable angle and
/// break the chain.
pub fn swept_angle(points: &[Vec2], center: Vec2, min_radius: f32) -> f32 {
    let mut total = 0.0;
    let mut prev_angle: Option<f32> = None;

    for p in points {
        let d = p - center;
        if d.norm() < min_radius {
            prev_angle = None;
            continue;
        }
        let angle = d.y.atan2(d.x);
        if let Some(prev) = prev_angle {
            total += wrap_angle(angle - prev);
        }
        prev_angle = Some(angle);
    }

    total
}

/// Wrap an angle difference into `(-π, π]`.
fn wrap_angle(mut delta: f32) -> f32 {
    use std::f32::consts::PI;
    while delta > PI {
        delta -= TAU;
    }
    while delta <= -PI {
        delta += TAU;
    }
    delta
}
