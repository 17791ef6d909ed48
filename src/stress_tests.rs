/// Stress testing for motion sessions.
///
/// Long sessions, hostile input and concurrent sensor callbacks: the failure
/// modes that only show up under sustained or pathological conditions.

#[cfg(test)]
mod stress_tests {
    use std::f32::consts::PI;
    use std::sync::Arc;
    use std::thread;

    use crate::config::SessionConfig;
    use crate::exercise::ExerciseType;
    use crate::session::MotionSession;
    use crate::types::*;

    fn pendulum_pose(t_ms: u64) -> PoseSample {
        let t = t_ms as f32 / 1000.0;
        let theta = 0.5 * (PI * t).sin();
        PoseSample::new(
            t_ms,
            [0.75 * theta.sin(), 1.4 - 0.75 * theta.cos(), 0.0],
            TrackingQuality::Normal,
        )
    }

    fn pendulum_imu(t_ms: u64) -> ImuSample {
        let t = t_ms as f32 / 1000.0;
        ImuSample::new(t_ms, [-3.7 * (PI * t).sin(), 0.1, 0.2], [0.0; 3])
    }

    // ============================================================================
    // CATEGORY 1: EXTREME DURATION & MEMORY BOUNDS
    // ============================================================================

    /// A session that never sees a boundary must not grow past capacity
    #[test]
    fn stress_window_bounded_without_boundaries() {
        let (session, _) = MotionSession::with_defaults(ExerciseType::CircleTrace, None).unwrap();

        for i in 0..20_000u64 {
            // Slow straight drift: never closes a loop
            let pose = PoseSample::new(i * 16, [i as f32 * 1e-4, 1.0, 0.0], TrackingQuality::Normal);
            session.process_pose(&pose);
            assert!(session.window_len() <= 5_000);
        }

        assert_eq!(session.rep_count(), 0);
        assert!(session.window_len() > 0);
    }

    /// Ten minutes of pendulum swings at 60Hz
    #[test]
    fn stress_ten_minute_pendulum() {
        let (session, outputs) = MotionSession::with_defaults(ExerciseType::PendulumSwing, None).unwrap();

        for i in 0..(600_000 / 16) {
            let t = i * 16;
            session.process_pose(&pendulum_pose(t));
            session.process_imu(&pendulum_imu(t));
        }

        // One boundary per half period, minus the arming phase
        let count = session.rep_count();
        assert!((590..=600).contains(&count), "got {count}");

        let smoothness_capacity = session.config().smoothness.history_capacity;
        assert!(session.smoothness_history().len() <= smoothness_capacity);

        let history = session.rep_history();
        for (i, rep) in history.iter().enumerate() {
            assert_eq!(rep.index, i as u32 + 1);
            assert!(rep.rom_deg >= 0.0 && rep.rom_deg <= rep.pattern.rom_cap_deg());
        }
        assert_eq!(outputs.reps.try_iter().count(), history.len());
    }

    // ============================================================================
    // CATEGORY 2: CORRUPTED INPUT
    // ============================================================================

    #[test]
    fn stress_nan_and_inf_corruption() {
        for exercise in ExerciseType::ALL {
            let (session, _) = MotionSession::with_defaults(exercise, None).unwrap();

            for i in 0..2_000u64 {
                let t = i * 16;
                let bad = match i % 7 {
                    0 => f32::NAN,
                    1 => f32::INFINITY,
                    2 => f32::NEG_INFINITY,
                    _ => (i as f32 * 0.1).sin(),
                };
                session.process_pose(&PoseSample::new(t, [bad, 1.0, bad * 0.5], TrackingQuality::Normal));
                session.process_imu(&ImuSample::new(t, [bad * 3.0, 0.0, 0.0], [0.0, 0.0, bad * 2.0]));
                session.process_joint_angle(&JointAngleSample::new(t, bad * 90.0, 0.9));
            }

            for rep in session.rep_history() {
                assert!(rep.rom_deg.is_finite(), "{exercise:?} produced {rep:?}");
                assert!(rep.rom_deg >= 0.0 && rep.rom_deg <= 360.0);
            }
            for sample in session.smoothness_history() {
                assert!((0.0..=100.0).contains(&sample.value));
            }
        }
    }

    #[test]
    fn stress_nonmonotonic_timestamps() {
        let (session, _) = MotionSession::with_defaults(ExerciseType::ForearmRotation, None).unwrap();

        for i in 0..3_000u64 {
            let t = if i % 5 == 0 { i * 16 - (i % 3) * 40 } else { i * 16 };
            let rate = if (i / 60) % 2 == 0 { 2.0 } else { -2.0 };
            session.process_imu(&ImuSample::new(t, [0.0; 3], [0.0, 0.0, rate]));
        }

        for rep in session.rep_history() {
            assert!(rep.rom_deg >= 0.0 && rep.rom_deg <= 180.0);
        }
    }

    #[test]
    fn stress_extreme_configurations() {
        let config = SessionConfig {
            buffer_capacity: 1,
            eviction_fraction: 1.0,
            settle_ms: 0,
            live_rom_interval: 1,
            live_rom_alpha: 1.0,
            ..SessionConfig::default()
        };
        let (session, _) = MotionSession::new(ExerciseType::PendulumSwing, None, config).unwrap();

        for i in 0..2_000 {
            let t = i * 16;
            session.process_pose(&pendulum_pose(t));
            session.process_imu(&pendulum_imu(t));
            assert!(session.window_len() <= 1);
        }
        assert!(session.rep_count() > 0);
    }

    // ============================================================================
    // CATEGORY 3: CONCURRENT SENSOR CALLBACKS
    // ============================================================================

    /// Pose and inertial callbacks on separate threads against one session
    #[test]
    fn stress_concurrent_streams() {
        let (session, outputs) = MotionSession::with_defaults(ExerciseType::PendulumSwing, None).unwrap();
        let session = Arc::new(session);

        let pose_thread = {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                for i in 0..6_000 {
                    session.process_pose(&pendulum_pose(i * 16));
                }
            })
        };
        let imu_thread = {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                for i in 0..6_000 {
                    session.process_imu(&pendulum_imu(i * 16));
                }
            })
        };

        pose_thread.join().unwrap();
        imu_thread.join().unwrap();

        let history = session.rep_history();
        assert!(!history.is_empty());
        for (i, rep) in history.iter().enumerate() {
            assert_eq!(rep.index, i as u32 + 1);
            assert!(rep.rom_deg >= 0.0 && rep.rom_deg <= rep.pattern.rom_cap_deg());
        }
        let published: Vec<RepEvent> = outputs.reps.try_iter().collect();
        assert_eq!(published, history);
    }

    /// Stop while callbacks are still arriving: nothing lands after the barrier
    #[test]
    fn stress_stop_during_processing() {
        let (session, outputs) = MotionSession::with_defaults(ExerciseType::ForearmRotation, None).unwrap();
        let session = Arc::new(session);

        let feeder = {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                for i in 0..50_000u64 {
                    let rate = if (i / 40) % 2 == 0 { 3.0 } else { -3.0 };
                    session.process_imu(&ImuSample::new(i * 16, [0.0; 3], [0.0, 0.0, rate]));
                }
            })
        };

        while session.rep_count() < 3 {
            thread::yield_now();
        }
        let summary = session.stop();

        feeder.join().unwrap();

        assert_eq!(session.rep_count(), summary.rep_count);
        assert_eq!(session.rep_history(), summary.rep_history);
        assert_eq!(outputs.reps.try_iter().count(), summary.rep_count as usize);
    }

    /// Repeated stop/reset cycles under load
    #[test]
    fn stress_repeated_reset_cycles() {
        let (session, _) = MotionSession::with_defaults(ExerciseType::PendulumSwing, None).unwrap();
        let session = Arc::new(session);

        let feeder = {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                for i in 0..20_000 {
                    let t = i * 16;
                    session.process_pose(&pendulum_pose(t));
                    session.process_imu(&pendulum_imu(t));
                }
            })
        };

        for _ in 0..50 {
            session.stop();
            session.reset();
            thread::yield_now();
        }
        feeder.join().unwrap();

        let history = session.rep_history();
        for (i, rep) in history.iter().enumerate() {
            assert_eq!(rep.index, i as u32 + 1);
        }
    }
}
