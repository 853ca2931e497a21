//! Robot, arena and filter parameters.

use core::f64::consts::FRAC_PI_2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use twr_kinematics::{DifferentialDrive, HeadingJacobian, MotionModel, Pose};

use crate::arena::Arena;
use crate::error::EstimationError;
use crate::noise::NoiseConfig;
use crate::observation::ObservationModel;

/// Pose at which the observation Jacobian's wall assignment is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LinearizationPoint {
    /// Reuse the walls the true pose's sensors strike. Only an approximation
    /// of an EKF linearization, since the filter cannot know the true pose.
    #[default]
    TruePose,
    /// Select walls from the estimated pose.
    EstimatedPose,
}

/// Everything needed to build a [`crate::TwoWheeledRobot`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RobotConfig {
    /// Wheel radius `r`.
    pub wheel_radius: f64,
    /// Distance between the wheels `b`.
    pub axle_length: f64,
    /// Sampling frequency `f_s`; one tick lasts `1/f_s`.
    pub sample_frequency: f64,
    /// Arena extent along x (`W`).
    pub arena_width: f64,
    /// Arena extent along y (`L`).
    pub arena_length: f64,
    /// Starting pose of both the robot and the estimate.
    pub initial_pose: Pose,
    /// Noise levels for the simulated robot and the filter.
    pub noise: NoiseConfig,
    /// Pose the observation Jacobian's walls are chosen from.
    pub linearization: LinearizationPoint,
    /// Sign convention of the state Jacobian's `∂y'/∂θ` entry.
    pub heading_jacobian: HeadingJacobian,
}

impl Default for RobotConfig {
    fn default() -> Self {
        RobotConfig {
            wheel_radius: 20.0,
            axle_length: 85.0,
            sample_frequency: 1.0,
            arena_width: 500.0,
            arena_length: 750.0,
            initial_pose: Pose::new(250.0, 375.0, FRAC_PI_2),
            noise: NoiseConfig::default(),
            linearization: LinearizationPoint::TruePose,
            heading_jacobian: HeadingJacobian::Mirrored,
        }
    }
}

impl RobotConfig {
    /// Checks every parameter without building anything.
    pub fn validate(&self) -> Result<(), EstimationError> {
        self.motion_model()?;
        let arena = self.arena()?;
        self.noise.validate()?;
        if !self.initial_pose.is_finite() {
            return Err(EstimationError::InvalidConfig("initial pose must be finite"));
        }
        if !arena.contains(&self.initial_pose) {
            return Err(EstimationError::InvalidConfig("initial pose must lie inside the arena"));
        }
        Ok(())
    }

    /// The motion model described by the drive geometry and sample frequency.
    pub fn motion_model(&self) -> Result<MotionModel, EstimationError> {
        let drive = DifferentialDrive::new(self.wheel_radius, self.axle_length)?;
        Ok(MotionModel::from_sample_frequency(drive, self.sample_frequency)?
            .with_heading_jacobian(self.heading_jacobian))
    }

    /// The arena described by `arena_width` × `arena_length`.
    pub fn arena(&self) -> Result<Arena, EstimationError> {
        Arena::new(self.arena_width, self.arena_length)
    }

    /// Range sensors ranging against [`RobotConfig::arena`].
    pub fn observation_model(&self) -> Result<ObservationModel, EstimationError> {
        Ok(ObservationModel::new(self.arena()?))
    }
}
