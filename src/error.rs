//! Error types.
//!
//! Degraded input (too few samples, flat geometry, missing calibration) is
//! never an error: those paths return neutral values and log. `MotionError`
//! only covers configuration that would break an invariant if accepted.

/// Common result type for engine construction.
pub type Result<T> = std::result::Result<T, MotionError>;

/// Invariant violations detected while building engine components.
#[derive(Debug, thiserror::Error)]
pub enum MotionError {
    /// A bounded buffer was requested with no room at all.
    #[error("buffer capacity must be greater than zero")]
    ZeroCapacity,

    /// Eviction fraction outside `(0, 1]`.
    #[error("eviction fraction must be in (0, 1], got {0}")]
    InvalidEvictionFraction(f32),

    /// A configuration field failed validation.
    #[error("invalid configuration for `{field}`: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: String,
    },

    /// A configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl MotionError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        MotionError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}
