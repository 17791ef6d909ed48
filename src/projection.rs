//! Principal-plane projection.
//!
//! Reduces a 3D window to the 2D plane carrying the most motion. Only the
//! diagonal of the covariance is used: the axis with the least variance is
//! taken to be incidental tilt and sensor noise, and is dropped.
//!
//! A full eigendecomposition would find tilted planes too, but handheld
//! exercises are performed roughly aligned to the world frame and the
//! diagonal keeps the step O(n) with no allocation beyond the output.

use serde::{Deserialize, Serialize};

use crate::types::{Axis, ProjectionPlane, Sample, Vec2, Vec3};

/// Configuration for plane selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorConfig {
    /// Fewer samples than this are treated as degenerate.
    pub min_samples: usize,
    /// Largest per-axis variance (m²) below which the window is considered
    /// motionless.
    pub min_variance: f32,
    /// Plane used for degenerate windows.
    pub fallback_plane: ProjectionPlane,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            min_samples: 3,
            min_variance: 1e-6,
            fallback_plane: ProjectionPlane::XY,
        }
    }
}

/// A window flattened onto its projection plane.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedPath {
    pub plane: ProjectionPlane,
    /// Projected points, same order as the input samples.
    pub points: Vec<Vec2>,
    /// Centroid of the 3D window.
    pub centroid: Vec3,
    /// Per-axis variance of the 3D window (m²).
    pub variance: Vec3,
    /// True when the fallback plane was used.
    pub degenerate: bool,
}

impl ProjectedPath {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Selects a projection plane and flattens windows onto it.
#[derive(Debug, Clone, Default)]
pub struct PlaneProjector {
    config: ProjectorConfig,
}

impl PlaneProjector {
    pub fn new(config: ProjectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProjectorConfig {
        &self.config
    }

    /// Pick the plane for a window.
    ///
    /// Deterministic: identical input always yields the same plane. Ties
    /// between axes resolve in X, Y, Z order.
    pub fn select_plane(&self, samples: &[Sample]) -> (ProjectionPlane, bool) {
        if samples.len() < self.config.min_samples {
            return (self.config.fallback_plane, true);
        }

        let (_, variance) = axis_statistics(samples);
        if variance.max() < self.config.min_variance {
            return (self.config.fallback_plane, true);
        }

        (ProjectionPlane::orthogonal_to(least_variance_axis(&variance)), false)
    }

    /// Project a window onto its plane. Never fails; degenerate windows are
    /// projected onto the fallback plane.
    pub fn project(&self, samples: &[Sample]) -> ProjectedPath {
        let (centroid, variance) = axis_statistics(samples);
        let (plane, degenerate) = self.select_plane(samples);

        let points = samples.iter().map(|s| plane.project(&s.position)).collect();

        ProjectedPath {
            plane,
            points,
            centroid,
            variance,
            degenerate,
        }
    }
}

/// Centroid and per-axis population variance of a window.
///
/// Returns zeros for an empty window.
pub fn axis_statistics(samples: &[Sample]) -> (Vec3, Vec3) {
    if samples.is_empty() {
        return (Vec3::zeros(), Vec3::zeros());
    }

    let n = samples.len() as f32;
    let centroid = samples.iter().fold(Vec3::zeros(), |acc, s| acc + s.position) / n;

    let variance = samples.iter().fold(Vec3::zeros(), |acc, s| {
        let d = s.position - centroid;
        acc + d.component_mul(&d)
    }) / n;

    (centroid, variance)
}

/// Axis with the smallest variance; first axis wins on ties.
pub fn least_variance_axis(variance: &Vec3) -> Axis {
    let mut best = Axis::X;
    for axis in Axis::ALL {
        if variance[axis.index()] < variance[best.index()] {
            best = axis;
        }
    }
    best
}
