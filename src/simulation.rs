use anyhow::Context;
use nalgebra::Matrix3;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use twr_estimation::{Pose, TwoWheeledRobot};

use crate::settings::SimulationSettings;

/// State after one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickRecord {
    pub step: usize,
    pub true_pose: Pose,
    pub estimated_pose: Pose,
    pub covariance: Matrix3<f64>,
    /// Whether the measurement update was applied this tick.
    pub measured: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationReport {
    pub ticks: Vec<TickRecord>,
    /// Ticks whose measurement update failed and was skipped.
    pub rejected_measurements: usize,
}

impl SimulationReport {
    pub fn final_tick(&self) -> Option<&TickRecord> {
        self.ticks.last()
    }

    /// Euclidean distance between the final true and estimated positions.
    pub fn position_error(&self) -> Option<f64> {
        self.final_tick().map(|tick| {
            (tick.true_pose.x - tick.estimated_pose.x).hypot(tick.true_pose.y - tick.estimated_pose.y)
        })
    }
}

/// Drive the robot with a constant command for `settings.steps` ticks.
///
/// A failed measurement update is logged and skipped; the estimate keeps its
/// predicted value for that tick. A failed time update ends the run.
pub fn run(settings: &SimulationSettings) -> anyhow::Result<SimulationReport> {
    let rng = StdRng::seed_from_u64(settings.seed);
    let mut robot = TwoWheeledRobot::new(&settings.robot, rng).context("invalid robot configuration")?;
    let mut report = SimulationReport {
        ticks: Vec::with_capacity(settings.steps),
        rejected_measurements: 0,
    };

    info!(
        seed = settings.seed,
        steps = settings.steps,
        command = %settings.command,
        "starting simulation from {}",
        robot.true_pose()
    );

    for step in 1..=settings.steps {
        robot
            .time_update(settings.command)
            .with_context(|| format!("time update failed at step {}", step))?;

        let measured = match robot.measurement_update() {
            Ok(()) => true,
            Err(e) => {
                warn!(step, true_pose = %robot.true_pose(), "measurement update skipped: {}", e);
                report.rejected_measurements += 1;
                false
            }
        };

        let (x, y, theta) = robot.estimated_pose_degrees();
        info!(
            step,
            true_pose = %robot.true_pose(),
            "estimate: x = {:.2}, y = {:.2}, theta = {:.2} deg, cov trace = {:.4}",
            x,
            y,
            theta,
            robot.covariance().trace()
        );

        report.ticks.push(TickRecord {
            step,
            true_pose: robot.true_pose(),
            estimated_pose: robot.estimated_pose(),
            covariance: *robot.covariance(),
            measured,
        });
    }

    Ok(report)
}
