//! Geometric pattern classification.
//!
//! Labels a projected repetition path as a Line, Arc, Circle or Unknown from
//! three shape scores:
//! - **Linearity**: how well a single line explains the points (orthogonal
//!   regression, so vertical paths score as well as horizontal ones)
//! - **Circularity**: how constant the distance to the centroid is
//! - **Closure**: start-to-end gap relative to the path's extent
//!
//! The thresholds are empirically tuned and live in `ClassifierConfig`.

use nalgebra::Matrix2;
use serde::{Deserialize, Serialize};

use crate::types::{MovementPattern, Vec2};

/// Classification thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Circularity above which a closed path is a circle.
    pub circle_circularity: f32,
    /// Closure ratio below which a path counts as closed.
    pub circle_max_closure: f32,
    /// Circularity above which any path is a circle, closed or not.
    pub strong_circularity: f32,
    /// Linearity above which a path is a line.
    pub line_linearity: f32,
    /// Linearity above which a non-line path is an arc.
    pub arc_linearity: f32,
    /// "Moderate" circularity that also qualifies as an arc.
    pub arc_circularity: f32,
    /// Fewer points than this cannot be classified.
    pub min_points: usize,
    /// Paths smaller than this (meters) cannot be classified.
    pub min_extent_m: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            circle_circularity: 0.75,
            circle_max_closure: 0.4,
            strong_circularity: 0.85,
            line_linearity: 0.85,
            arc_linearity: 0.5,
            arc_circularity: 0.5,
            min_points: 3,
            min_extent_m: 1e-4,
        }
    }
}

/// Shape scores for one path.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PatternScores {
    /// [0, 1]; 1 means all points on one line.
    pub linearity: f32,
    /// [0, 1]; 1 means all points equidistant from the centroid.
    pub circularity: f32,
    /// Start-to-end distance over extent; 0 means the path closes on itself.
    pub closure_ratio: f32,
    /// Bounding-box diagonal of the path (meters).
    pub extent_m: f32,
}

/// Result of classifying one path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub pattern: MovementPattern,
    pub scores: PatternScores,
}

/// Classifies projected paths.
#[derive(Debug, Clone, Default)]
pub struct PatternClassifier {
    config: ClassifierConfig,
}

impl PatternClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Compute scores and label the path.
    pub fn classify(&self, points: &[Vec2]) -> Classification {
        let extent_m = extent(points);

        if points.len() < self.config.min_points || extent_m < self.config.min_extent_m {
            return Classification {
                pattern: MovementPattern::Unknown,
                scores: PatternScores {
                    extent_m,
                    closure_ratio: 1.0,
                    ..PatternScores::default()
                },
            };
        }

        let scores = PatternScores {
            linearity: linearity(points),
            circularity: circularity(points),
            closure_ratio: closure_ratio(points),
            extent_m,
        };

        Classification {
            pattern: self.label(&scores),
            scores,
        }
    }

    /// Apply the decision order to precomputed scores.
    pub fn label(&self, scores: &PatternScores) -> MovementPattern {
        let c = &self.config;

        let closed_circle =
            scores.circularity > c.circle_circularity && scores.closure_ratio < c.circle_max_closure;
        if closed_circle || scores.circularity > c.strong_circularity {
            MovementPattern::Circle
        } else if scores.linearity > c.line_linearity {
            MovementPattern::Line
        } else if scores.linearity > c.arc_linearity || scores.circularity > c.arc_circularity {
            MovementPattern::Arc
        } else {
            MovementPattern::Unknown
        }
    }
}

/// Mean of a point set.
pub fn centroid(points: &[Vec2]) -> Vec2 {
    if points.is_empty() {
        return Vec2::zeros();
    }
    points.iter().fold(Vec2::zeros(), |acc, p| acc + p) / points.len() as f32
}

/// Goodness of fit to the best orthogonal-regression line.
///
/// Computed as `1 - λmin / λmax` of the 2x2 covariance matrix.
pub fn linearity(points: &[Vec2]) -> f32 {
    if points.len() < 2 {
        return 0.0;
    }

    let c = centroid(points);
    let mut cov = Matrix2::<f32>::zeros();
    for p in points {
        let d = p - c;
        cov += d * d.transpose();
    }
    cov /= points.len() as f32;
    if cov.iter().any(|v| !v.is_finite()) {
        return 0.0;
    }

    let eigenvalues = cov.symmetric_eigenvalues();
    let major = eigenvalues.max();
    let minor = eigenvalues.min().max(0.0);

    if major <= f32::EPSILON {
        return 0.0;
    }

    (1.0 - minor / major).clamp(0.0, 1.0)
}

/// Inverse spread of point-to-centroid distances: `1 - std(r) / mean(r)`.
pub fn circularity(points: &[Vec2]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }

    let c = centroid(points);
    let n = points.len() as f32;
    let radii: Vec<f32> = points.iter().map(|p| (p - c).norm()).collect();

    let mean = radii.iter().sum::<f32>() / n;
    if mean <= f32::EPSILON {
        return 0.0;
    }

    let variance = radii.iter().map(|r| (r - mean) * (r - mean)).sum::<f32>() / n;

    (1.0 - variance.sqrt() / mean).clamp(0.0, 1.0)
}

/// Start-to-end distance relative to the bounding-box diagonal.
///
/// Returns 1.0 (fully open) when the path has no extent.
pub fn closure_ratio(points: &[Vec2]) -> f32 {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return 1.0;
    };

    let size = extent(points);
    if size <= f32::EPSILON {
        return 1.0;
    }

    (last - first).norm() / size
}

/// Bounding-box diagonal of a point set.
pub fn extent(points: &[Vec2]) -> f32 {
    let Some(first) = points.first() else {
        return 0.0;
    };

    let (min, max) = points.iter().fold((*first, *first), |(lo, hi), p| {
        (lo.inf(p), hi.sup(p))
    });

    (max - min).norm()
}
