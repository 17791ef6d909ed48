//! Range-of-motion sensing engine demo.
//!
//! Runs two synthetic sessions (a pendulum swing and a traced circle) and
//! prints what the engine reports. Set `RUST_LOG=debug` to see every
//! committed repetition.

use std::f32::consts::PI;

use rom_sensing::{
    CalibrationProfile, ExerciseType, ImuSample, MotionSession, PoseSample, Result, SessionSummary,
    TrackingQuality,
};
use tracing_subscriber::EnvFilter;

const SAMPLE_INTERVAL_MS: u64 = 16;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("Range-of-motion sensing engine v{}", env!("CARGO_PKG_VERSION"));

    match run_pendulum().and_then(|p| run_circle().map(|c| (p, c))) {
        Ok((pendulum, circle)) => {
            print_summary("Pendulum swing", &pendulum);
            print_summary("Circle trace", &circle);
        }
        Err(e) => {
            eprintln!("demo failed: {e}");
            std::process::exit(1);
        }
    }
}

/// Arm of 0.6m swinging ±30° about the shoulder, 2s period, 10s long.
fn run_pendulum() -> Result<SessionSummary> {
    let calibration = CalibrationProfile { limb_length_m: 0.6 };
    let (session, outputs) = MotionSession::with_defaults(ExerciseType::PendulumSwing, Some(calibration))?;

    let radius = 0.75;
    let amplitude = 30f32.to_radians();
    let omega = 2.0 * PI / 2.0;

    for i in 0..(10_000 / SAMPLE_INTERVAL_MS) {
        let t_ms = i * SAMPLE_INTERVAL_MS;
        let t = t_ms as f32 / 1000.0;
        let theta = amplitude * (omega * t).sin();

        let position = [radius * theta.sin(), 1.4 - radius * theta.cos(), 0.002 * (7.0 * t).sin()];
        session.process_pose(&PoseSample::new(t_ms, position, TrackingQuality::Normal));

        let tangential = -radius * amplitude * omega * omega * (omega * t).sin();
        session.process_imu(&ImuSample::new(t_ms, [tangential, 0.0, 0.0], [0.0, 0.0, 0.0]));
    }

    for rep in outputs.reps.try_iter() {
        println!("  pendulum rep {:>2}: {:>6.1}° ({:?})", rep.index, rep.rom_deg, rep.pattern);
    }

    Ok(session.stop())
}

/// Circles of 20cm radius in front of the body, 1.5s per loop.
fn run_circle() -> Result<SessionSummary> {
    let (session, outputs) = MotionSession::with_defaults(ExerciseType::CircleTrace, None)?;

    let radius = 0.2;
    let samples_per_loop = 1_500 / SAMPLE_INTERVAL_MS;

    // Tracking starts limited, as it does right after launch
    for i in 0..(samples_per_loop * 5) {
        let t_ms = i * SAMPLE_INTERVAL_MS;
        let angle = 2.0 * PI * i as f32 / samples_per_loop as f32;
        let quality = if t_ms < 500 {
            TrackingQuality::Limited
        } else {
            TrackingQuality::Normal
        };
        let position = [radius * angle.cos(), 1.2, -0.4 + radius * angle.sin()];
        session.process_pose(&PoseSample::new(t_ms, position, quality));
    }

    for rep in outputs.reps.try_iter() {
        println!("  circle rep {:>2}: {:>6.1}° ({:?})", rep.index, rep.rom_deg, rep.pattern);
    }
    if let Some(last) = outputs.smoothness.try_iter().last() {
        println!("  latest smoothness: {:.1}", last.value);
    }

    Ok(session.stop())
}

fn print_summary(name: &str, summary: &SessionSummary) {
    println!("{name}:");
    println!("  reps:           {}", summary.rep_count);
    println!("  mean ROM:       {:.1}°", summary.mean_rom_deg);
    println!("  max ROM:        {:.1}°", summary.max_rom_deg);
    println!("  clamped reps:   {}", summary.clamped_reps);
    match summary.mean_smoothness {
        Some(s) => println!("  mean smoothness: {s:.1}"),
        None => println!("  mean smoothness: n/a"),
    }
}
