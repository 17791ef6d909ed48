/// Basic usage example: forearm rotations from a gyroscope stream
use rom_sensing::{CalibrationProfile, ExerciseType, ImuSample, MotionSession};

fn main() -> rom_sensing::Result<()> {
    println!("=== ROM Sensing Engine: Basic Example ===\n");

    // Rotation exercises only need the inertial stream
    let (session, outputs) = MotionSession::with_defaults(
        ExerciseType::ForearmRotation,
        Some(CalibrationProfile { limb_length_m: 0.62 }),
    )?;

    // Simulate six alternating turns of ~75° at 60Hz
    let rate = 75f32.to_radians(); // rad/s over a 1s turn
    let mut samples = Vec::new();
    for i in 0..(6_000 / 16) {
        let t = i * 16;
        let direction = if (t / 1_000) % 2 == 0 { 1.0 } else { -1.0 };
        samples.push(ImuSample::new(t, [0.05, 0.1, 0.3], [0.02, -0.01, direction * rate]));
    }

    println!("Processing {} samples...\n", samples.len());

    for sample in &samples {
        if let Some(rep) = session.process_imu(sample) {
            println!(
                "✓ Rep {} at {}ms: {:.1}° ({:?})",
                rep.index, rep.timestamp_ms, rep.rom_deg, rep.method
            );
        }
    }

    // The same events were pushed to the output channel
    println!("\nChannel received {} reps", outputs.reps.try_iter().count());
    if let Some(latest) = outputs.smoothness.try_iter().last() {
        println!("Latest smoothness: {:.1}", latest.value);
    }

    let summary = session.stop();
    println!("\n=== Summary ===");
    println!("Reps:      {}", summary.rep_count);
    println!("Mean ROM:  {:.1}°", summary.mean_rom_deg);
    println!("Max ROM:   {:.1}°", summary.max_rom_deg);

    Ok(())
}
