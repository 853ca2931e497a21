use core::f64::consts::FRAC_PI_2;

use twr_kinematics::*;

fn main() {
    let wheel_radius = 20.0;
    let axle_length = 85.0;
    let sample_frequency = 1.0;

    let model = match DifferentialDrive::new(wheel_radius, axle_length)
        .and_then(|drive| MotionModel::from_sample_frequency(drive, sample_frequency))
    {
        Ok(model) => model,
        Err(e) => {
            eprintln!("Failed to initialize motion model: {}", e);
            eprintln!(
                "Please ensure wheel_radius ({}), axle_length ({}) and sample_frequency ({}) are positive.",
                wheel_radius, axle_length, sample_frequency
            );
            return;
        }
    };

    let mut current_pose = Pose::new(250.0, 375.0, FRAC_PI_2);
    let input = ControlInput::new(1.0, 2.0);
    let num_steps = 27;

    println!("Initializing simulation...");
    println!("  {}", model.drive());
    println!("  ICC radius:   {:?}", model.drive().icc_radius(input));
    println!("  Initial pose: {}", current_pose);
    println!("  Command:      {}", input);
    println!("  Time step:    {}", model.sample_period());
    println!("\nSimulating...");

    for i in 0..num_steps {
        match model.predict(current_pose, input) {
            Ok(transition) => {
                current_pose = transition.pose;
                println!(
                    "Step {:>2}: Pose: {}  dx/dθ: {:>8.2}  dy/dθ: {:>8.2}",
                    i + 1,
                    current_pose,
                    transition.state_jacobian[(0, 2)],
                    transition.state_jacobian[(1, 2)]
                );
            }
            Err(e) => {
                eprintln!("Error during simulation step {}: {}", i + 1, e);
                break;
            }
        }
    }

    println!("\nSimulation complete.");
    println!("Final Pose: {:?}", current_pose);
}
