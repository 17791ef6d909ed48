//! Motion session orchestration.
//!
//! `MotionSession` owns one instance of every stage and wires the sensor
//! streams through them:
//!
//! ```text
//! pose ──► tracking gate ──► window ──┐
//! inertial ───────────────────────────┼──► detector ──► boundary
//! joint angle ────────────────────────┘                    │
//!                         snapshot ──► project ──► classify ──► ROM ──► RepEvent
//! pose / inertial ──► smoothness analyzer ──► SmoothnessSample
//! ```
//!
//! All entry points take `&self` so sensor callbacks on different threads can
//! share one `Arc<MotionSession>`. Each buffer sits behind its own mutex
//! (single writer at a time). Locks are always taken in the order
//! detector, motion, history.
//!
//! A repetition result is computed from a snapshot outside the locks and
//! committed only if neither the session epoch (bumped by `stop`/`reset`) nor
//! the window generation (bumped by every window reset) moved in between.
//! The window reset that follows a boundary therefore always happens after
//! the ROM computation that read it, and results derived from a stale
//! snapshot are discarded rather than published.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::buffer::BoundedBuffer;
use crate::config::{validate_detector, SessionConfig};
use crate::error::Result;
use crate::exercise::{ExerciseProfile, ExerciseType};
use crate::pattern::PatternClassifier;
use crate::projection::PlaneProjector;
use crate::rep_detection::{RepBoundary, RepDetector, SensorInput};
use crate::rom::RomCalculator;
use crate::smoothness::{SmoothnessAnalyzer, SmoothnessSource};
use crate::types::{
    CalibrationProfile, ImuSample, JointAngleSample, LiveValues, MovementPattern, PoseSample,
    RepEvent, Sample, SmoothnessSample, TrackingQuality,
};

/// Receiving ends of the session's output channels.
///
/// Created once with the session; results are pushed as they happen.
#[derive(Debug)]
pub struct SessionOutputs {
    pub reps: Receiver<RepEvent>,
    pub live: Receiver<LiveValues>,
    pub smoothness: Receiver<SmoothnessSample>,
}

/// Aggregate returned when a session stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub exercise: ExerciseType,
    pub rep_count: u32,
    pub rep_history: Vec<RepEvent>,
    pub smoothness_history: Vec<SmoothnessSample>,
    pub mean_rom_deg: f32,
    pub max_rom_deg: f32,
    pub mean_smoothness: Option<f32>,
    /// Repetitions whose ROM was clamped to the cap.
    pub clamped_reps: u32,
}

/// Admits spatial samples once tracking has been usable for the settle delay.
#[derive(Debug, Clone)]
struct TrackingGate {
    settle_ms: u64,
    usable_since_ms: Option<u64>,
    last_quality: Option<TrackingQuality>,
}

impl TrackingGate {
    fn new(settle_ms: u64) -> Self {
        Self {
            settle_ms,
            usable_since_ms: None,
            last_quality: None,
        }
    }

    /// Whether a pose sample with this quality enters the window.
    ///
    /// Limited and Normal are admitted alike.
    fn admit(&mut self, quality: TrackingQuality, timestamp_ms: u64) -> bool {
        if self.last_quality != Some(quality) {
            debug!(?quality, timestamp_ms, "tracking quality changed");
            self.last_quality = Some(quality);
        }

        if !quality.is_usable() {
            self.usable_since_ms = None;
            return false;
        }

        let since = *self.usable_since_ms.get_or_insert(timestamp_ms);
        timestamp_ms.saturating_sub(since) >= self.settle_ms
    }

    /// Spatial tracking was explicitly reported lost.
    fn lost(&self) -> bool {
        self.last_quality == Some(TrackingQuality::Unavailable)
    }

    fn reset(&mut self) {
        self.usable_since_ms = None;
        self.last_quality = None;
    }
}

/// Window and live-display state, guarded together.
#[derive(Debug)]
struct MotionState {
    window: BoundedBuffer<Sample>,
    /// Bumped on every window reset.
    generation: u64,
    tracking: TrackingGate,
    live_rom_deg: Option<f32>,
    since_live: usize,
}

impl MotionState {
    fn reset_window(&mut self) {
        self.close_window(0);
    }

    /// Start a new repetition, keeping the `keep` newest samples.
    fn close_window(&mut self, keep: usize) {
        self.window.retain_newest(keep);
        self.generation += 1;
        self.live_rom_deg = None;
        self.since_live = 0;
    }
}

/// Committed repetitions.
#[derive(Debug, Default)]
struct RepLedger {
    events: Vec<RepEvent>,
    clamped: u32,
}

/// Window contents captured at a boundary.
struct PendingRep {
    boundary: RepBoundary,
    snapshot: Vec<Sample>,
    /// Window append count when the snapshot was taken.
    appended: u64,
    generation: u64,
    epoch: u64,
}

/// One exercise session.
#[derive(Debug)]
pub struct MotionSession {
    exercise: ExerciseType,
    profile: ExerciseProfile,
    config: SessionConfig,

    projector: PlaneProjector,
    classifier: PatternClassifier,
    rom: RomCalculator,

    detector: Mutex<Box<dyn RepDetector>>,
    motion: Mutex<MotionState>,
    history: Mutex<RepLedger>,
    smoothness: Mutex<SmoothnessAnalyzer>,

    epoch: AtomicU64,
    active: AtomicBool,

    rep_tx: Sender<RepEvent>,
    live_tx: Sender<LiveValues>,
    smoothness_tx: Sender<SmoothnessSample>,
}

impl MotionSession {
    /// Build a session for one exercise.
    ///
    /// A missing calibration falls back to the default limb length with a
    /// warning. Only invalid configuration is an error.
    pub fn new(
        exercise: ExerciseType,
        calibration: Option<CalibrationProfile>,
        config: SessionConfig,
    ) -> Result<(Self, SessionOutputs)> {
        config.validate()?;

        let mut profile = exercise.profile();
        if let Some(detector) = &config.detector_override {
            profile.detector = detector.clone();
        }
        if let Some(policy) = config.cap_policy_override {
            profile.cap_policy = policy;
        }
        validate_detector(&profile.detector)?;

        let calibration = calibration.unwrap_or_else(|| {
            warn!(
                default_m = config.rom.default_limb_length_m,
                "no calibration profile, using default limb length"
            );
            CalibrationProfile {
                limb_length_m: config.rom.default_limb_length_m,
            }
        });

        let window = BoundedBuffer::with_eviction(config.buffer_capacity, config.eviction_fraction)?;

        let (rep_tx, reps) = unbounded();
        let (live_tx, live) = unbounded();
        let (smoothness_tx, smoothness) = unbounded();

        info!(
            ?exercise,
            method = ?profile.detector.method(),
            limb_length_m = calibration.limb_length_m,
            "motion session started"
        );

        let session = Self {
            projector: PlaneProjector::new(config.projector.clone()),
            classifier: PatternClassifier::new(config.classifier.clone()),
            rom: RomCalculator::new(config.rom.clone(), calibration.limb_length_m),
            detector: Mutex::new(profile.detector.build()),
            motion: Mutex::new(MotionState {
                window,
                generation: 0,
                tracking: TrackingGate::new(config.settle_ms),
                live_rom_deg: None,
                since_live: 0,
            }),
            history: Mutex::new(RepLedger::default()),
            smoothness: Mutex::new(SmoothnessAnalyzer::new(config.smoothness.clone())),
            epoch: AtomicU64::new(0),
            active: AtomicBool::new(true),
            rep_tx,
            live_tx,
            smoothness_tx,
            exercise,
            profile,
            config,
        };

        let outputs = SessionOutputs { reps, live, smoothness };
        Ok((session, outputs))
    }

    /// Session with default configuration.
    pub fn with_defaults(
        exercise: ExerciseType,
        calibration: Option<CalibrationProfile>,
    ) -> Result<(Self, SessionOutputs)> {
        Self::new(exercise, calibration, SessionConfig::default())
    }

    pub fn exercise(&self) -> ExerciseType {
        self.exercise
    }

    pub fn profile(&self) -> &ExerciseProfile {
        &self.profile
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Process one spatial pose sample.
    pub fn process_pose(&self, pose: &PoseSample) -> Option<RepEvent> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        if !self.is_active() {
            return None;
        }
        if pose.sample.position.iter().any(|c| !c.is_finite()) {
            trace!(timestamp_ms = pose.sample.timestamp_ms, "non-finite position dropped");
            return None;
        }

        let mut live_snapshot = None;
        let pending = {
            let mut detector = self.detector.lock();
            let mut motion = self.motion.lock();
            if self.epoch.load(Ordering::SeqCst) != epoch {
                return None;
            }

            if !motion.tracking.admit(pose.quality, pose.sample.timestamp_ms) {
                // Paused: the window keeps what it has
                return None;
            }

            motion.window.append(pose.sample);
            motion.since_live += 1;

            match detector.process_sample(SensorInput::Pose(&pose.sample)) {
                Some(boundary) => Some(PendingRep {
                    boundary,
                    snapshot: motion.window.snapshot(),
                    appended: motion.window.total_appended(),
                    generation: motion.generation,
                    epoch,
                }),
                None => {
                    if motion.since_live >= self.config.live_rom_interval {
                        motion.since_live = 0;
                        live_snapshot = Some((motion.window.snapshot(), motion.generation));
                    }
                    None
                }
            }
        };

        if self.profile.smoothness_source == SmoothnessSource::Position {
            let emitted = self.smoothness.lock().push_position(&pose.sample);
            self.publish_smoothness(emitted);
        }

        if let Some((snapshot, generation)) = live_snapshot {
            self.update_live_rom(&snapshot, generation, epoch, pose.sample.timestamp_ms);
        }

        pending.and_then(|p| self.complete_rep(p))
    }

    /// Process one inertial sample.
    pub fn process_imu(&self, sample: &ImuSample) -> Option<RepEvent> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        if !self.is_active() {
            return None;
        }

        let pending = self.detect(SensorInput::Inertial(sample), epoch);

        if self.profile.smoothness_source == SmoothnessSource::Acceleration {
            let emitted = self.smoothness.lock().push_acceleration(sample);
            self.publish_smoothness(emitted);
        }

        pending.and_then(|p| self.complete_rep(p))
    }

    /// Process one camera joint-angle sample.
    pub fn process_joint_angle(&self, sample: &JointAngleSample) -> Option<RepEvent> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        if !self.is_active() {
            return None;
        }

        self.detect(SensorInput::JointAngle(sample), epoch)
            .and_then(|p| self.complete_rep(p))
    }

    pub fn process_pose_batch(&self, poses: &[PoseSample]) -> Vec<RepEvent> {
        poses.iter().filter_map(|p| self.process_pose(p)).collect()
    }

    pub fn process_imu_batch(&self, samples: &[ImuSample]) -> Vec<RepEvent> {
        samples.iter().filter_map(|s| self.process_imu(s)).collect()
    }

    pub fn process_joint_angle_batch(&self, samples: &[JointAngleSample]) -> Vec<RepEvent> {
        samples
            .iter()
            .filter_map(|s| self.process_joint_angle(s))
            .collect()
    }

    /// Run the detector on a non-spatial input and capture the window if it fires.
    ///
    /// `epoch` must be read before the active check so a concurrent `stop`
    /// always invalidates the result.
    fn detect(&self, input: SensorInput<'_>, epoch: u64) -> Option<PendingRep> {
        let mut detector = self.detector.lock();
        let boundary = detector.process_sample(input)?;

        let motion = self.motion.lock();
        if self.profile.requires_spatial_tracking && motion.tracking.lost() {
            debug!(
                timestamp_ms = boundary.timestamp_ms,
                "boundary dropped while spatial tracking is unavailable"
            );
            return None;
        }

        Some(PendingRep {
            boundary,
            snapshot: motion.window.snapshot(),
            appended: motion.window.total_appended(),
            generation: motion.generation,
            epoch,
        })
    }

    /// Measure a captured window and commit the repetition if still current.
    fn complete_rep(&self, pending: PendingRep) -> Option<RepEvent> {
        let PendingRep {
            boundary,
            snapshot,
            appended,
            generation,
            epoch,
        } = pending;

        let (pattern, rom_deg, clamped) = self.measure(&snapshot, boundary.measured_rom_deg);

        let mut motion = self.motion.lock();
        if self.epoch.load(Ordering::SeqCst) != epoch || motion.generation != generation {
            debug!(
                timestamp_ms = boundary.timestamp_ms,
                "discarding repetition computed from a stale window"
            );
            return None;
        }

        // Reset strictly after the ROM above consumed the snapshot. Pose
        // samples that arrived since the capture belong to the next repetition.
        let newer = motion.window.total_appended().saturating_sub(appended);
        motion.close_window(newer as usize);

        let event = {
            let mut history = self.history.lock();
            let event = RepEvent {
                index: history.events.len() as u32 + 1,
                rom_deg,
                timestamp_ms: boundary.timestamp_ms,
                method: boundary.method,
                pattern,
            };
            history.events.push(event);
            if clamped {
                history.clamped += 1;
            }
            event
        };
        drop(motion);

        debug!(
            index = event.index,
            rom_deg = event.rom_deg,
            pattern = ?event.pattern,
            method = ?event.method,
            clamped,
            samples = snapshot.len(),
            "repetition committed"
        );

        let _ = self.rep_tx.send(event);
        self.publish_live(LiveValues {
            rom_deg,
            rep_count: event.index,
            smoothness: self.smoothness.lock().current(),
            timestamp_ms: event.timestamp_ms,
        });

        Some(event)
    }

    /// Pattern, capped ROM, and whether the cap changed the value. A
    /// strategy-measured ROM replaces the window geometry but is capped the
    /// same way.
    fn measure(&self, snapshot: &[Sample], measured_rom_deg: Option<f32>) -> (MovementPattern, f32, bool) {
        let path = self.projector.project(snapshot);
        let pattern = self.classifier.classify(&path.points).pattern;
        let cap_deg = self.profile.cap_policy.cap_deg(pattern);

        let (rom_deg, clamped) = match measured_rom_deg {
            Some(measured) => self.rom.finalize(measured, cap_deg),
            None => {
                let result = self.rom.measure_with_cap(&path.points, pattern, cap_deg);
                (result.angle_deg, result.clamped)
            }
        };

        (pattern, rom_deg, clamped)
    }

    fn update_live_rom(&self, snapshot: &[Sample], generation: u64, epoch: u64, timestamp_ms: u64) {
        let (_, rom_deg, _) = self.measure(snapshot, None);

        let live_rom = {
            let mut motion = self.motion.lock();
            if self.epoch.load(Ordering::SeqCst) != epoch || motion.generation != generation {
                return;
            }
            let alpha = self.config.live_rom_alpha;
            let smoothed = match motion.live_rom_deg {
                Some(prev) => alpha * rom_deg + (1.0 - alpha) * prev,
                None => rom_deg,
            };
            motion.live_rom_deg = Some(smoothed);
            smoothed
        };

        self.publish_live(LiveValues {
            rom_deg: live_rom,
            rep_count: self.rep_count(),
            smoothness: self.smoothness.lock().current(),
            timestamp_ms,
        });
    }

    fn publish_smoothness(&self, emitted: Option<SmoothnessSample>) {
        let Some(sample) = emitted else {
            return;
        };
        let _ = self.smoothness_tx.send(sample);

        let rom_deg = self.motion.lock().live_rom_deg.unwrap_or(0.0);
        self.publish_live(LiveValues {
            rom_deg,
            rep_count: self.rep_count(),
            smoothness: Some(sample.value),
            timestamp_ms: sample.timestamp_ms,
        });
    }

    fn publish_live(&self, values: LiveValues) {
        let _ = self.live_tx.send(values);
    }

    /// Repetitions committed so far.
    pub fn rep_count(&self) -> u32 {
        self.history.lock().events.len() as u32
    }

    /// Copy of the repetition history.
    pub fn rep_history(&self) -> Vec<RepEvent> {
        self.history.lock().events.clone()
    }

    /// Committed repetitions whose ROM hit the cap.
    pub fn clamped_rep_count(&self) -> u32 {
        self.history.lock().clamped
    }

    /// Copy of the emitted smoothness series.
    pub fn smoothness_history(&self) -> Vec<SmoothnessSample> {
        self.smoothness.lock().history().to_vec()
    }

    /// Samples currently in the window.
    pub fn window_len(&self) -> usize {
        self.motion.lock().window.len()
    }

    /// Smoothed live ROM of the repetition in progress.
    pub fn live_rom_deg(&self) -> Option<f32> {
        self.motion.lock().live_rom_deg
    }

    /// Hard stop. Clears every buffer, discards in-flight results, and
    /// ignores further samples until `reset`.
    pub fn stop(&self) -> SessionSummary {
        self.active.store(false, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);

        self.detector.lock().reset();
        {
            let mut motion = self.motion.lock();
            motion.reset_window();
            motion.tracking.reset();
        }

        let (rep_history, clamped_reps) = {
            let history = self.history.lock();
            (history.events.clone(), history.clamped)
        };
        let smoothness_history = {
            let mut analyzer = self.smoothness.lock();
            let history = analyzer.history().to_vec();
            analyzer.reset();
            history
        };

        let summary = summarize(self.exercise, rep_history, smoothness_history, clamped_reps);
        info!(
            rep_count = summary.rep_count,
            clamped_reps,
            mean_rom_deg = summary.mean_rom_deg,
            max_rom_deg = summary.max_rom_deg,
            "motion session stopped"
        );
        summary
    }

    /// Clear history and buffers and start accepting samples again.
    pub fn reset(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);

        self.detector.lock().reset();
        {
            let mut motion = self.motion.lock();
            motion.reset_window();
            motion.tracking.reset();
        }
        *self.history.lock() = RepLedger::default();
        self.smoothness.lock().reset();

        self.active.store(true, Ordering::SeqCst);
        info!(exercise = ?self.exercise, "motion session reset");
    }
}

fn summarize(
    exercise: ExerciseType,
    rep_history: Vec<RepEvent>,
    smoothness_history: Vec<SmoothnessSample>,
    clamped_reps: u32,
) -> SessionSummary {
    let rep_count = rep_history.len() as u32;
    let (mean_rom_deg, max_rom_deg) = if rep_history.is_empty() {
        (0.0, 0.0)
    } else {
        let total: f32 = rep_history.iter().map(|r| r.rom_deg).sum();
        let max = rep_history.iter().map(|r| r.rom_deg).fold(0.0, f32::max);
        (total / rep_count as f32, max)
    };
    let mean_smoothness = if smoothness_history.is_empty() {
        None
    } else {
        let total: f32 = smoothness_history.iter().map(|s| s.value).sum();
        Some(total / smoothness_history.len() as f32)
    };

    SessionSummary {
        exercise,
        rep_count,
        rep_history,
        smoothness_history,
        mean_rom_deg,
        max_rom_deg,
        mean_smoothness,
        clamped_reps,
    }
}
