/// End-to-end session tests.
/// Drive complete sessions with synthetic sensor streams and check the
/// guarantees the engine makes about repetitions, ROM and smoothness.

#[cfg(test)]
mod integration_tests {
    use std::f32::consts::PI;

    use approx::assert_abs_diff_eq;

    use crate::config::SessionConfig;
    use crate::exercise::ExerciseType;
    use crate::session::{MotionSession, SessionOutputs};
    use crate::types::*;

    const DT_MS: u64 = 16;

    /// Helper: session with a calibrated 0.6m limb
    fn session_for(exercise: ExerciseType) -> (MotionSession, SessionOutputs) {
        MotionSession::with_defaults(exercise, Some(CalibrationProfile { limb_length_m: 0.6 })).unwrap()
    }

    /// Helper: pendulum swing of ±`amplitude_deg` about the shoulder on a
    /// 0.75m radius (limb plus sensor offset). Returns pose and inertial
    /// samples on the same clock.
    fn pendulum_profile(duration_ms: u64, period_ms: u64, amplitude_deg: f32) -> Vec<(PoseSample, ImuSample)> {
        let radius = 0.75;
        let amplitude = amplitude_deg.to_radians();
        let omega = 2.0 * PI / (period_ms as f32 / 1000.0);

        (0..duration_ms / DT_MS)
            .map(|i| {
                let t_ms = i * DT_MS;
                let t = t_ms as f32 / 1000.0;
                let theta = amplitude * (omega * t).sin();
                let pose = PoseSample::new(
                    t_ms,
                    [radius * theta.sin(), 1.4 - radius * theta.cos(), 0.001 * (5.0 * t).sin()],
                    TrackingQuality::Normal,
                );
                let tangential = -radius * amplitude * omega * omega * (omega * t).sin();
                (pose, ImuSample::new(t_ms, [tangential, 0.0, 0.0], [0.0; 3]))
            })
            .collect()
    }

    /// Helper: circles in the XZ plane
    fn circle_profile(loops: u64, samples_per_loop: u64, radius: f32, quality: TrackingQuality) -> Vec<PoseSample> {
        (0..loops * samples_per_loop)
            .map(|i| {
                let angle = 2.0 * PI * i as f32 / samples_per_loop as f32;
                PoseSample::new(
                    i * DT_MS,
                    [radius * angle.cos(), 1.2, -0.4 + radius * angle.sin()],
                    quality,
                )
            })
            .collect()
    }

    /// Helper: alternating rotation about Z
    fn rotation_profile(sweep_deg: f32, half_cycle_ms: u64, half_cycles: u64) -> Vec<ImuSample> {
        let rate = sweep_deg.to_radians() / (half_cycle_ms as f32 / 1000.0);
        (0..half_cycle_ms * half_cycles / DT_MS)
            .map(|i| {
                let t = i * DT_MS;
                let sign = if (t / half_cycle_ms) % 2 == 0 { 1.0 } else { -1.0 };
                ImuSample::new(t, [0.1, 0.0, 0.2], [0.01, 0.02, sign * rate])
            })
            .collect()
    }

    #[test]
    fn test_pendulum_session_counts_swings() {
        let (session, outputs) = session_for(ExerciseType::PendulumSwing);

        let mut events = Vec::new();
        for (pose, imu) in pendulum_profile(10_000, 2_000, 30.0) {
            session.process_pose(&pose);
            if let Some(event) = session.process_imu(&imu) {
                // No cross-repetition leakage
                assert_eq!(session.window_len(), 0);
                events.push(event);
            }
        }

        assert!(events.len() >= 7 && events.len() <= 10, "got {} swings", events.len());
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.index, i as u32 + 1);
            assert_eq!(event.method, DetectionMethod::Reversal);
            assert!(event.rom_deg <= event.pattern.rom_cap_deg());
        }
        // Each window runs from one centre crossing to the next, through an extreme
        for event in &events[1..] {
            assert!(event.rom_deg > 12.0 && event.rom_deg < 35.0, "rom {}", event.rom_deg);
        }

        let published: Vec<RepEvent> = outputs.reps.try_iter().collect();
        assert_eq!(published, events);
        assert_eq!(session.rep_history(), events);
    }

    #[test]
    fn test_circle_session_counts_loops() {
        let (session, outputs) = session_for(ExerciseType::CircleTrace);

        let events = session.process_pose_batch(&circle_profile(5, 90, 0.2, TrackingQuality::Normal));

        assert!(events.len() >= 4 && events.len() <= 5, "got {} loops", events.len());
        for event in &events {
            assert_eq!(event.method, DetectionMethod::GeometricClosure);
            assert_eq!(event.pattern, MovementPattern::Circle);
            assert!(event.rom_deg > 0.0 && event.rom_deg <= 360.0);
        }
        assert_eq!(outputs.reps.try_iter().count(), events.len());

        // Constant-speed tracing is smooth
        let smoothness: Vec<SmoothnessSample> = outputs.smoothness.try_iter().collect();
        assert!(!smoothness.is_empty());
        assert!(smoothness.iter().all(|s| (0.0..=100.0).contains(&s.value)));
        assert!(smoothness.last().unwrap().value > 80.0);
    }

    #[test]
    fn test_limited_tracking_processed_like_normal() {
        let (normal, _) = session_for(ExerciseType::CircleTrace);
        let (limited, _) = session_for(ExerciseType::CircleTrace);

        let a = normal.process_pose_batch(&circle_profile(4, 90, 0.2, TrackingQuality::Normal));
        let b = limited.process_pose_batch(&circle_profile(4, 90, 0.2, TrackingQuality::Limited));

        assert!(!a.is_empty());
        assert_eq!(a, b);
    }

    #[test]
    fn test_tracking_loss_preserves_window() {
        let (session, _) = session_for(ExerciseType::CircleTrace);
        let line = |i: u64, quality| PoseSample::new(i * DT_MS, [i as f32 * 0.005, 1.0, 0.0], quality);

        for i in 0..20 {
            session.process_pose(&line(i, TrackingQuality::Normal));
        }
        // 100ms settle: samples from t=112 on were admitted
        assert_eq!(session.window_len(), 13);

        for i in 20..30 {
            session.process_pose(&line(i, TrackingQuality::Unavailable));
        }
        assert_eq!(session.window_len(), 13);

        for i in 30..40 {
            session.process_pose(&line(i, TrackingQuality::Normal));
        }
        // Settling again from t=480; t=592, 608, 624 admitted
        assert_eq!(session.window_len(), 16);
        assert_eq!(session.rep_count(), 0);
    }

    #[test]
    fn test_rotation_session_uses_measured_rom() {
        let (session, _) = session_for(ExerciseType::ForearmRotation);

        let events = session.process_imu_batch(&rotation_profile(80.0, 1_000, 6));

        assert_eq!(events.len(), 5);
        for event in &events {
            assert_eq!(event.method, DetectionMethod::RotationAccumulation);
            assert_eq!(event.pattern, MovementPattern::Unknown);
            assert_abs_diff_eq!(event.rom_deg, 80.0, epsilon = 3.0);
        }
    }

    #[test]
    fn test_camera_session_counts_raises() {
        let (session, outputs) = session_for(ExerciseType::ShoulderAbduction);

        let angles: Vec<JointAngleSample> = (0..8_000 / 33)
            .map(|i| {
                let t = i * 33;
                let phase = 2.0 * PI * t as f32 / 2_000.0;
                JointAngleSample::new(t, 10.0 + 55.0 * (1.0 - phase.cos()), 0.9)
            })
            .collect();

        let events = session.process_joint_angle_batch(&angles);

        assert!(events.len() >= 3 && events.len() <= 4, "got {}", events.len());
        for event in &events {
            assert_eq!(event.method, DetectionMethod::ExternalAngle);
            assert!(event.rom_deg > 90.0 && event.rom_deg <= 180.0);
        }
        assert_eq!(outputs.reps.try_iter().count(), events.len());
    }

    #[test]
    fn test_single_strong_phase_fires_once_at_flip() {
        let (session, _) = session_for(ExerciseType::PendulumSwing);
        let values = [0.3, 0.4, 1.2, 0.3, -0.3, -0.3, -0.3, -0.3, -0.3];

        let fired: Vec<(usize, RepEvent)> = values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| {
                session
                    .process_imu(&ImuSample::new(5_000 + i as u64 * DT_MS, [*v, 0.0, 0.0], [0.0; 3]))
                    .map(|e| (i, e))
            })
            .collect();

        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].0, 8);
        assert_eq!(fired[0].1.index, 1);
        // Nothing was in the window
        assert_eq!(fired[0].1.rom_deg, 0.0);
    }

    #[test]
    fn test_live_values_never_enter_history() {
        let (session, outputs) = session_for(ExerciseType::CircleTrace);

        let events = session.process_pose_batch(&circle_profile(3, 90, 0.2, TrackingQuality::Normal));

        let live: Vec<LiveValues> = outputs.live.try_iter().collect();
        assert!(live.len() > events.len());
        assert!(live.iter().all(|v| v.rom_deg >= 0.0 && v.rom_deg <= 360.0));
        assert!(live.iter().all(|v| v.rep_count as usize <= events.len()));
        assert_eq!(session.rep_history().len(), events.len());
    }

    #[test]
    fn test_live_rom_tracks_partial_repetition() {
        let (session, _) = session_for(ExerciseType::CircleTrace);

        // Half a loop: no boundary yet, but a live estimate exists
        let half: Vec<PoseSample> = circle_profile(1, 90, 0.2, TrackingQuality::Normal)
            .into_iter()
            .take(45)
            .collect();
        session.process_pose_batch(&half);

        assert_eq!(session.rep_count(), 0);
        let live = session.live_rom_deg().unwrap();
        assert!(live > 0.0 && live <= 180.0);
    }

    #[test]
    fn test_json_config_drives_detector() {
        let config = SessionConfig::from_json(
            r#"{ "detector_override": { "strategy": "rotation_accumulation", "threshold_deg": 30.0 } }"#,
        )
        .unwrap();
        let (tuned, _) = MotionSession::new(ExerciseType::ForearmRotation, None, config).unwrap();
        let (stock, _) = session_for(ExerciseType::ForearmRotation);

        let samples = rotation_profile(40.0, 500, 8);

        assert_eq!(tuned.process_imu_batch(&samples).len(), 7);
        assert!(stock.process_imu_batch(&samples).is_empty());
    }

    #[test]
    fn test_stop_summary_and_reset() {
        let (session, _) = session_for(ExerciseType::CircleTrace);
        let events = session.process_pose_batch(&circle_profile(3, 90, 0.2, TrackingQuality::Normal));

        let summary = session.stop();

        assert_eq!(summary.rep_count as usize, events.len());
        assert_eq!(summary.rep_history, events);
        assert!(summary.max_rom_deg >= summary.mean_rom_deg);
        assert!(summary.mean_smoothness.is_some());
        assert_eq!(session.window_len(), 0);

        // Ignored until reset
        assert!(session.process_pose_batch(&circle_profile(2, 90, 0.2, TrackingQuality::Normal)).is_empty());

        session.reset();
        let again = session.process_pose_batch(&circle_profile(2, 90, 0.2, TrackingQuality::Normal));
        assert!(!again.is_empty());
        assert_eq!(again[0].index, 1);
    }

    #[test]
    fn test_missing_calibration_uses_default() {
        let (session, _) = MotionSession::with_defaults(ExerciseType::PendulumSwing, None).unwrap();
        let (calibrated, _) = session_for(ExerciseType::PendulumSwing);

        let profile = pendulum_profile(4_000, 2_000, 30.0);
        let mut a = Vec::new();
        let mut b = Vec::new();
        for (pose, imu) in &profile {
            session.process_pose(pose);
            a.extend(session.process_imu(imu));
            calibrated.process_pose(pose);
            b.extend(calibrated.process_imu(imu));
        }

        // Default limb is 0.6m, same as the calibrated one here
        assert_eq!(a, b);
    }
}
