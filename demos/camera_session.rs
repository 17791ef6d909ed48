/// Camera session example: elbow flexion from a joint-angle estimator,
/// with settings loaded from JSON
use rom_sensing::{ExerciseType, JointAngleSample, MotionSession, SessionConfig};

const CONFIG: &str = r#"{
    "detector_override": {
        "strategy": "external_angle",
        "direction": "falling",
        "enter_deg": 100.0,
        "exit_deg": 150.0,
        "min_confidence": 0.6,
        "cooldown_ms": 600
    }
}"#;

fn main() -> rom_sensing::Result<()> {
    println!("=== ROM Sensing Engine: Camera Session ===\n");

    let config = SessionConfig::from_json(CONFIG)?;
    let (session, outputs) = MotionSession::new(ExerciseType::ElbowFlexion, None, config)?;

    // 30Hz estimator output: the elbow bends from 170° to 50° and back every 3s.
    // Every tenth frame the estimator loses the arm and reports low confidence.
    for i in 0..(15_000 / 33) {
        let t = i * 33;
        let phase = 2.0 * std::f32::consts::PI * t as f32 / 3_000.0;
        let angle = 110.0 + 60.0 * phase.cos();
        let confidence = if i % 10 == 9 { 0.2 } else { 0.92 };
        session.process_joint_angle(&JointAngleSample::new(t, angle, confidence));
    }

    for rep in outputs.reps.try_iter() {
        println!("Rep {:>2}: {:>6.1}° at {:>5}ms", rep.index, rep.rom_deg, rep.timestamp_ms);
    }

    let summary = session.stop();
    println!("\n{} reps, mean {:.1}°, max {:.1}°", summary.rep_count, summary.mean_rom_deg, summary.max_rom_deg);

    Ok(())
}
