//! The simulated two-wheeled robot and its EKF pose estimate.
//!
//! One tick is exactly one [`TwoWheeledRobot::time_update`] followed by one
//! [`TwoWheeledRobot::measurement_update`]. The robot owns its random number
//! generator, seeded by the caller, so runs are reproducible. Each update
//! draws from a copy of the generator and keeps the copy only on success, so
//! a rejected call does not shift later draws.

use nalgebra::Matrix3;
use rand::Rng;
use rand::rngs::StdRng;
use tracing::{debug, trace};

use twr_kinematics::{ControlInput, MotionModel, Pose};

use crate::config::{LinearizationPoint, RobotConfig};
use crate::error::EstimationError;
use crate::filter::EstimatorState;
use crate::noise::NoiseConfig;
use crate::observation::{ObservationModel, RangeMeasurement, WallAssignment};

/// The inputs and outputs of the most recent successful measurement update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementRecord {
    /// Noiseless readings at the true pose.
    pub true_ranges: RangeMeasurement,
    /// `true_ranges` plus measurement noise; what the filter saw.
    pub measured: RangeMeasurement,
    /// Readings predicted from the estimate before correction.
    pub predicted: RangeMeasurement,
    /// Walls the true pose's sensors strike.
    pub true_walls: WallAssignment,
    /// Walls used to build `H` and the prediction.
    pub walls: WallAssignment,
}

/// A simulated robot carrying both its true pose and an EKF estimate of it.
#[derive(Debug, Clone)]
pub struct TwoWheeledRobot<R: Rng = StdRng> {
    motion: MotionModel,
    observation: ObservationModel,
    noise: NoiseConfig,
    linearization: LinearizationPoint,
    true_pose: Pose,
    estimate: EstimatorState,
    last_measurement: Option<MeasurementRecord>,
    rng: R,
}

impl<R: Rng + Clone> TwoWheeledRobot<R> {
    /// Build a robot whose estimate starts exactly at the true initial pose.
    ///
    /// # Errors
    ///
    /// Returns the first invalid parameter found by [`RobotConfig::validate`].
    pub fn new(config: &RobotConfig, rng: R) -> Result<Self, EstimationError> {
        let start = Pose::normalized(config.initial_pose.x, config.initial_pose.y, config.initial_pose.theta);
        Self::with_estimate(config, EstimatorState::new(start), rng)
    }

    /// Build a robot whose estimate starts from an arbitrary belief.
    pub fn with_estimate(
        config: &RobotConfig,
        estimate: EstimatorState,
        rng: R,
    ) -> Result<Self, EstimationError> {
        config.validate()?;
        let true_pose = Pose::normalized(config.initial_pose.x, config.initial_pose.y, config.initial_pose.theta);
        debug!(
            initial_pose = %true_pose,
            estimate = %estimate.pose(),
            linearization = ?config.linearization,
            "robot initialized"
        );
        Ok(TwoWheeledRobot {
            motion: config.motion_model()?,
            observation: config.observation_model()?,
            noise: config.noise,
            linearization: config.linearization,
            true_pose,
            estimate,
            last_measurement: None,
            rng,
        })
    }

    /// Advance the true robot (with actuator noise) and the estimate
    /// (noiseless, with covariance growth) by one tick.
    ///
    /// # Errors
    ///
    /// Fails without modifying any pose or the covariance if the command,
    /// either pose, or a propagated value is not finite.
    pub fn time_update(&mut self, input: ControlInput) -> Result<(), EstimationError> {
        let mut rng = self.rng.clone();
        let true_next = if self.noise.enabled {
            self.motion
                .propagate_noisy(self.true_pose, input, self.noise.process_std, &mut rng)?
        } else {
            self.motion.propagate(self.true_pose, input)?
        };
        let transition = self.motion.predict(self.estimate.pose(), input)?;

        let mut estimate = self.estimate;
        estimate.predict(&transition, &self.noise.process_covariance())?;

        self.true_pose = true_next;
        self.estimate = estimate;
        self.rng = rng;
        trace!(
            %input,
            true_pose = %self.true_pose,
            estimate = %self.estimate.pose(),
            "time update"
        );
        Ok(())
    }

    /// Range both sensors against the true pose and correct the estimate.
    ///
    /// # Errors
    ///
    /// Fails without modifying the estimate or covariance if a pose lies
    /// outside the arena, a sensor sees no wall, or the innovation
    /// covariance cannot be inverted.
    pub fn measurement_update(&mut self) -> Result<(), EstimationError> {
        let (true_ranges, true_walls) = self.observation.observe(&self.true_pose)?;
        let walls = match self.linearization {
            LinearizationPoint::TruePose => true_walls,
            LinearizationPoint::EstimatedPose => self.observation.select_walls(&self.estimate.pose())?,
        };

        let mut rng = self.rng.clone();
        let measured = self.noise.perturb_measurement(true_ranges, &mut rng);
        let belief = self.estimate.pose();
        let predicted = self.observation.measure(&belief, walls);
        let h = self.observation.jacobian(&belief, walls);

        let correction = self
            .estimate
            .correct(&measured, &predicted, &h, &self.noise.measurement_covariance())?;

        self.rng = rng;
        self.last_measurement = Some(MeasurementRecord {
            true_ranges,
            measured,
            predicted,
            true_walls,
            walls,
        });
        debug!(
            %measured,
            %predicted,
            %walls,
            innovation_norm = correction.innovation.norm(),
            "measurement update"
        );
        Ok(())
    }

    /// Pose of the simulated robot.
    pub fn true_pose(&self) -> Pose {
        self.true_pose
    }

    /// Mean of the filter's belief.
    pub fn estimated_pose(&self) -> Pose {
        self.estimate.pose()
    }

    /// Estimated `(x, y, θ°)`, for display.
    pub fn estimated_pose_degrees(&self) -> (f64, f64, f64) {
        self.estimate.pose().to_degrees()
    }

    /// Covariance of the filter's belief.
    pub fn covariance(&self) -> &Matrix3<f64> {
        self.estimate.covariance()
    }

    /// The filter's full belief.
    pub fn estimator(&self) -> &EstimatorState {
        &self.estimate
    }

    /// Record of the last successful measurement update, if any.
    pub fn last_measurement(&self) -> Option<&MeasurementRecord> {
        self.last_measurement.as_ref()
    }

    /// Where the observation Jacobian's walls are chosen.
    pub fn linearization(&self) -> LinearizationPoint {
        self.linearization
    }

    /// The motion model both poses are propagated with.
    pub fn motion_model(&self) -> &MotionModel {
        &self.motion
    }

    /// The range sensors' model.
    pub fn observation_model(&self) -> &ObservationModel {
        &self.observation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::{FRAC_PI_2, PI, TAU};
    use nalgebra::{Matrix2, Vector3};
    use rand::SeedableRng;

    use crate::arena::Wall;

    const EPSILON: f64 = 1e-9;

    fn noiseless_config() -> RobotConfig {
        RobotConfig {
            noise: NoiseConfig::noiseless(),
            ..RobotConfig::default()
        }
    }

    fn quiet_noise_config() -> RobotConfig {
        RobotConfig {
            initial_pose: Pose::new(300.0, 375.0, FRAC_PI_2),
            noise: NoiseConfig {
                process_std: 0.05,
                measurement_std: 2.0,
                ..NoiseConfig::default()
            },
            ..RobotConfig::default()
        }
    }

    fn min_eigenvalue(m: &Matrix3<f64>) -> f64 {
        m.symmetric_eigen().eigenvalues.min()
    }

    #[test]
    fn test_first_time_update_matches_closed_form() {
        let config = RobotConfig::default();
        let mut robot = TwoWheeledRobot::new(&config, StdRng::seed_from_u64(0)).unwrap();
        robot.time_update(ControlInput::new(1.0, 2.0)).unwrap();

        let theta_next = FRAC_PI_2 + 20.0 / 85.0;
        let rc = 127.5;
        let estimate = robot.estimated_pose();
        assert!((estimate.theta - theta_next).abs() < EPSILON);
        assert!((estimate.x - (250.0 + rc * (theta_next.sin() - 1.0))).abs() < EPSILON);
        assert!((estimate.y - (375.0 - rc * theta_next.cos())).abs() < EPSILON);

        let transition = robot
            .motion_model()
            .predict(Pose::new(250.0, 375.0, FRAC_PI_2), ControlInput::new(1.0, 2.0))
            .unwrap();
        let q = Matrix2::identity() * (PI / 6.0).powi(2);
        let w = transition.noise_jacobian;
        assert!((robot.covariance() - w * q * w.transpose()).abs().max() < EPSILON);

        // the true robot was perturbed
        assert_ne!(robot.true_pose(), estimate);
    }

    #[test]
    fn test_zero_noise_round_trip() {
        let mut robot = TwoWheeledRobot::new(&noiseless_config(), StdRng::seed_from_u64(0)).unwrap();
        robot.time_update(ControlInput::new(1.0, 2.0)).unwrap();
        robot.measurement_update().unwrap();

        let truth = robot.true_pose();
        let estimate = robot.estimated_pose();
        assert!((truth.x - estimate.x).abs() < EPSILON);
        assert!((truth.y - estimate.y).abs() < EPSILON);
        assert!((truth.theta - estimate.theta).abs() < EPSILON);
        assert_eq!(*robot.covariance(), Matrix3::zeros());
    }

    #[test]
    fn test_straight_driving_moves_along_heading() {
        let config = RobotConfig {
            initial_pose: Pose::new(250.0, 375.0, PI / 6.0),
            ..noiseless_config()
        };
        let mut robot = TwoWheeledRobot::new(&config, StdRng::seed_from_u64(0)).unwrap();
        robot.time_update(ControlInput::new(1.5, 1.5)).unwrap();
        let pose = robot.estimated_pose();
        assert!((pose.x - (250.0 + 30.0 * (PI / 6.0).cos())).abs() < EPSILON);
        assert!((pose.y - (375.0 + 30.0 * (PI / 6.0).sin())).abs() < EPSILON);
        assert!((pose.theta - PI / 6.0).abs() < EPSILON);
    }

    #[test]
    fn test_exact_ranges_recover_position() {
        let config = RobotConfig {
            initial_pose: Pose::new(375.0, 375.0, 0.0),
            ..noiseless_config()
        };
        let belief = EstimatorState::with_covariance(
            Pose::new(385.0, 370.0, 0.0),
            Matrix3::from_diagonal(&Vector3::new(100.0, 100.0, 0.01)),
        );
        let mut robot = TwoWheeledRobot::with_estimate(&config, belief, StdRng::seed_from_u64(0)).unwrap();
        robot.measurement_update().unwrap();

        let estimate = robot.estimated_pose();
        assert!((estimate.x - 375.0).abs() < 1e-9);
        assert!((estimate.y - 375.0).abs() < 1e-9);
        assert!(robot.covariance()[(0, 0)].abs() < 1e-9);
        assert!(robot.covariance()[(1, 1)].abs() < 1e-9);

        let record = robot.last_measurement().unwrap();
        assert_eq!(record.walls.front, Wall::Right);
        assert_eq!(record.walls.right, Wall::Bottom);
        assert!((record.predicted.front - 115.0).abs() < 1e-9);
        assert!((record.predicted.right - 370.0).abs() < 1e-9);
    }

    #[test]
    fn test_covariance_stays_symmetric_psd_and_heading_wrapped() {
        let config = quiet_noise_config();
        let mut robot = TwoWheeledRobot::new(&config, StdRng::seed_from_u64(42)).unwrap();
        for _ in 0..30 {
            robot.time_update(ControlInput::new(1.0, 2.0)).unwrap();
            // a rejected measurement leaves the belief as it was; keep driving
            let _ = robot.measurement_update();

            let sigma = robot.covariance();
            let tolerance = 1e-9 * sigma.trace().max(1.0);
            assert!((sigma - sigma.transpose()).abs().max() <= tolerance);
            assert!(min_eigenvalue(sigma) >= -1e-6 * sigma.trace().max(1.0));
            assert!((0.0..TAU).contains(&robot.estimated_pose().theta));
            assert!((0.0..TAU).contains(&robot.true_pose().theta));
        }
    }

    #[test]
    fn test_repeated_measurement_update_shrinks_covariance() {
        let mut robot = TwoWheeledRobot::new(&RobotConfig::default(), StdRng::seed_from_u64(5)).unwrap();
        robot.time_update(ControlInput::new(1.0, 2.0)).unwrap();

        robot.measurement_update().unwrap();
        let first = *robot.last_measurement().unwrap();
        let sigma_first = *robot.covariance();

        robot.measurement_update().unwrap();
        let second = *robot.last_measurement().unwrap();
        let sigma_second = *robot.covariance();

        assert_eq!(first.true_ranges, second.true_ranges);
        assert_eq!(first.true_walls, second.true_walls);

        let shrink = sigma_first - sigma_second;
        assert!(min_eigenvalue(&shrink) >= -1e-9 * sigma_first.trace().max(1.0));
        assert!(sigma_second.trace() <= sigma_first.trace());
    }

    #[test]
    fn test_failed_measurement_leaves_state_untouched() {
        let config = RobotConfig {
            initial_pose: Pose::new(490.0, 375.0, 0.0),
            ..noiseless_config()
        };
        let mut robot = TwoWheeledRobot::new(&config, StdRng::seed_from_u64(0)).unwrap();
        // drives 20 units straight through the wall at x = W
        robot.time_update(ControlInput::new(1.0, 1.0)).unwrap();
        let estimate = robot.estimated_pose();
        let sigma = *robot.covariance();

        assert!(matches!(robot.measurement_update(), Err(EstimationError::PoseOutsideArena)));
        assert_eq!(robot.estimated_pose(), estimate);
        assert_eq!(*robot.covariance(), sigma);
        assert!(robot.last_measurement().is_none());
    }

    #[test]
    fn test_non_finite_command_leaves_state_untouched() {
        let mut robot = TwoWheeledRobot::new(&RobotConfig::default(), StdRng::seed_from_u64(0)).unwrap();
        robot.time_update(ControlInput::new(1.0, 2.0)).unwrap();
        let truth = robot.true_pose();
        let estimate = robot.estimated_pose();
        let sigma = *robot.covariance();

        let result = robot.time_update(ControlInput::new(f64::NAN, 2.0));
        assert!(matches!(result, Err(EstimationError::Kinematics(_))));
        assert_eq!(robot.true_pose(), truth);
        assert_eq!(robot.estimated_pose(), estimate);
        assert_eq!(*robot.covariance(), sigma);
    }

    #[test]
    fn test_rejected_time_update_keeps_generator_in_step() {
        let config = RobotConfig::default();
        let mut interrupted = TwoWheeledRobot::new(&config, StdRng::seed_from_u64(3)).unwrap();
        let mut steady = TwoWheeledRobot::new(&config, StdRng::seed_from_u64(3)).unwrap();

        assert!(interrupted.time_update(ControlInput::new(1.0, f64::INFINITY)).is_err());
        for _ in 0..3 {
            interrupted.time_update(ControlInput::new(1.0, 2.0)).unwrap();
            steady.time_update(ControlInput::new(1.0, 2.0)).unwrap();
        }
        assert_eq!(interrupted.true_pose(), steady.true_pose());
        assert_eq!(interrupted.estimated_pose(), steady.estimated_pose());
    }

    #[test]
    fn test_rejected_measurement_update_keeps_generator_in_step() {
        let config = RobotConfig {
            initial_pose: Pose::new(300.0, 375.0, 0.0),
            ..RobotConfig::default()
        };
        // an estimate with a non-finite covariance fails after the noise draw
        let broken = EstimatorState::with_covariance(
            Pose::new(300.0, 375.0, 0.0),
            Matrix3::from_diagonal(&Vector3::new(f64::MAX, f64::MAX, 1.0)),
        );
        let mut interrupted =
            TwoWheeledRobot::with_estimate(&config, broken, StdRng::seed_from_u64(8)).unwrap();
        assert!(interrupted.measurement_update().is_err());

        let mut steady = TwoWheeledRobot::new(&config, StdRng::seed_from_u64(8)).unwrap();
        let mut resumed = TwoWheeledRobot::with_estimate(
            &config,
            EstimatorState::new(Pose::new(300.0, 375.0, 0.0)),
            interrupted.rng.clone(),
        )
        .unwrap();
        resumed.measurement_update().unwrap();
        steady.measurement_update().unwrap();
        assert_eq!(
            resumed.last_measurement().unwrap().measured,
            steady.last_measurement().unwrap().measured
        );
    }

    #[test]
    fn test_linearization_point_selects_walls() {
        // Near the top-right corner at 45°: the true front ray reaches x = W
        // first, the offset estimate's ray reaches y = L first.
        let belief = EstimatorState::new(Pose::new(440.0, 740.0, PI / 4.0));
        let base = RobotConfig {
            initial_pose: Pose::new(480.0, 700.0, PI / 4.0),
            ..noiseless_config()
        };

        let mut reference =
            TwoWheeledRobot::with_estimate(&base, belief, StdRng::seed_from_u64(0)).unwrap();
        reference.measurement_update().unwrap();
        let record = reference.last_measurement().unwrap();
        assert_eq!(record.true_walls.front, Wall::Right);
        assert_eq!(record.walls.front, Wall::Right);

        let config = RobotConfig {
            linearization: LinearizationPoint::EstimatedPose,
            ..base
        };
        let mut robot = TwoWheeledRobot::with_estimate(&config, belief, StdRng::seed_from_u64(0)).unwrap();
        robot.measurement_update().unwrap();
        let record = robot.last_measurement().unwrap();
        assert_eq!(record.true_walls.front, Wall::Right);
        assert_eq!(record.walls.front, Wall::Top);
        assert_eq!(robot.linearization(), LinearizationPoint::EstimatedPose);
    }

    #[test]
    fn test_same_seed_same_run() {
        let config = RobotConfig::default();
        let mut a = TwoWheeledRobot::new(&config, StdRng::seed_from_u64(9)).unwrap();
        let mut b = TwoWheeledRobot::new(&config, StdRng::seed_from_u64(9)).unwrap();
        for _ in 0..5 {
            a.time_update(ControlInput::new(1.0, 2.0)).unwrap();
            b.time_update(ControlInput::new(1.0, 2.0)).unwrap();
            let ra = a.measurement_update();
            let rb = b.measurement_update();
            assert_eq!(ra, rb);
        }
        assert_eq!(a.true_pose(), b.true_pose());
        assert_eq!(a.estimated_pose(), b.estimated_pose());
        assert_eq!(a.covariance(), b.covariance());
    }
}
