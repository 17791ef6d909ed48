//! Range-of-motion sensing engine.
//!
//! Converts spatial-position, inertial and camera joint-angle streams from a
//! handheld or camera-observed exercise session into per-repetition range of
//! motion, a repetition count and a continuous smoothness score.
//!
//! # Design Philosophy
//!
//! - **Bounded memory**: every buffer has a hard capacity; sessions that never
//!   see a repetition boundary do not grow.
//! - **Degrade, don't fail**: too few samples, flat geometry or a missing
//!   calibration yield neutral values and a log line, never an error.
//! - **One commit path**: repetitions enter the history only from the
//!   boundary handler, after the ROM of the pre-reset window is known.
//!
//! # Example
//!
//! ```no_run
//! use rom_sensing::{CalibrationProfile, ExerciseType, ImuSample, MotionSession};
//!
//! let (session, outputs) = MotionSession::with_defaults(
//!     ExerciseType::ForearmRotation,
//!     Some(CalibrationProfile { limb_length_m: 0.65 }),
//! )?;
//!
//! session.process_imu(&ImuSample::new(0, [0.0, 0.0, 0.0], [0.0, 0.0, 1.5]));
//! for rep in outputs.reps.try_iter() {
//!     println!("rep {} rom {:.1}°", rep.index, rep.rom_deg);
//! }
//! let _summary = session.stop();
//! # Ok::<(), rom_sensing::MotionError>(())
//! ```

pub mod angle_threshold;
pub mod buffer;
pub mod config;
pub mod error;
pub mod exercise;
pub mod loop_closure;
pub mod pattern;
pub mod projection;
pub mod rep_detection;
pub mod reversal;
pub mod rom;
pub mod rotation;
pub mod session;
pub mod smoothness;
pub mod types;

#[cfg(test)]
mod integration_tests;
#[cfg(test)]
mod stress_tests;

// Re-export commonly used types
pub use buffer::BoundedBuffer;
pub use config::SessionConfig;
pub use error::{MotionError, Result};
pub use exercise::{ExerciseProfile, ExerciseType, RomCapPolicy};
pub use pattern::{Classification, PatternClassifier};
pub use projection::{PlaneProjector, ProjectedPath};
pub use rep_detection::{DetectorSettings, RepBoundary, RepDetector, SensorInput};
pub use rom::{RomCalculator, RomResult};
pub use session::{MotionSession, SessionOutputs, SessionSummary};
pub use smoothness::{SmoothnessAnalyzer, SmoothnessSource};
pub use types::{
    CalibrationProfile, DetectionMethod, ImuSample, JointAngleSample, LiveValues, MovementPattern,
    PoseSample, ProjectionPlane, RepEvent, Sample, SmoothnessSample, TrackingQuality,
};
