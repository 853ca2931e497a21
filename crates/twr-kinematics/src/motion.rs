//! Arc motion model for a differential-drive robot.
//!
//! Over one sample period the wheel speeds are held constant, so the chassis
//! center follows a circular arc about the instantaneous center of rotation
//! (or a straight segment when both wheels turn equally). Besides the new pose,
//! [`MotionModel::predict`] returns the Jacobians with respect to the state
//! (`F`, 3×3) and to the wheel commands (`W`, 3×2) used for covariance growth
//! `Σ ← F·Σ·Fᵀ + W·Q·Wᵀ`.

use nalgebra::{Matrix2, Matrix3, Matrix3x2};
use rand::Rng;
use rand_distr::StandardNormal;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{ControlInput, DifferentialDrive, KinematicsError, Pose};

/// Below this heading change per step the wheels are treated as equal, so
/// the arc formulas never divide by a vanishing wheel-speed difference.
pub const STRAIGHT_HEADING_THRESHOLD: f64 = 1e-6;

/// Sign convention of the `∂y'/∂θ` entry of the state Jacobian on an arc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum HeadingJacobian {
    /// `F[1][2] = Rc·(sin θ − sin θ')`. This is the opposite sign of the
    /// derivative of the arc update, kept so established runs reproduce.
    #[default]
    Mirrored,
    /// `F[1][2] = Rc·(sin θ' − sin θ)`, the derivative of
    /// `y' = y − Rc·(cos θ' − cos θ)`.
    Analytic,
}

/// Pose propagation over a fixed sampling interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionModel {
    drive: DifferentialDrive,
    /// Sampling interval `d_t`.
    sample_period: f64,
    heading_jacobian: HeadingJacobian,
}

/// A propagated pose with the linearization of the step that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    /// Pose after the step, heading in `[0, 2π)`.
    pub pose: Pose,
    /// `F = ∂(x', y', θ')/∂(x, y, θ)`.
    pub state_jacobian: Matrix3<f64>,
    /// `W = ∂(x', y', θ')/∂(ωL, ωR)`.
    pub noise_jacobian: Matrix3x2<f64>,
}

impl Transition {
    /// Propagate a covariance through this step: `F·Σ·Fᵀ + W·Q·Wᵀ`.
    ///
    /// # Arguments
    ///
    /// * `covariance`: Pose covariance before the step.
    /// * `process_covariance`: Wheel-command noise covariance `Q`.
    pub fn propagate_covariance(
        &self,
        covariance: &Matrix3<f64>,
        process_covariance: &Matrix2<f64>,
    ) -> Matrix3<f64> {
        let f = &self.state_jacobian;
        let w = &self.noise_jacobian;
        f * covariance * f.transpose() + w * process_covariance * w.transpose()
    }
}

/// Intermediate result of one kinematic step.
struct Step {
    pose: Pose,
    /// Heading after the step, before wrapping.
    theta_next: f64,
    dx_dtheta: f64,
    dy_dtheta: f64,
}

impl MotionModel {
    /// Construct a motion model.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidSamplePeriod)` if `sample_period`
    /// is not positive and finite.
    pub fn new(drive: DifferentialDrive, sample_period: f64) -> Result<Self, KinematicsError> {
        if !(sample_period > 0.0) || !sample_period.is_finite() {
            return Err(KinematicsError::InvalidSamplePeriod("must be positive and finite"));
        }
        Ok(MotionModel {
            drive,
            sample_period,
            heading_jacobian: HeadingJacobian::default(),
        })
    }

    /// Use `convention` for the `∂y'/∂θ` entry of [`Transition::state_jacobian`].
    pub fn with_heading_jacobian(mut self, convention: HeadingJacobian) -> Self {
        self.heading_jacobian = convention;
        self
    }

    /// Construct a motion model from a sampling frequency `f_s` (`d_t = 1/f_s`).
    pub fn from_sample_frequency(
        drive: DifferentialDrive,
        sample_frequency: f64,
    ) -> Result<Self, KinematicsError> {
        if !(sample_frequency > 0.0) || !sample_frequency.is_finite() {
            return Err(KinematicsError::InvalidSamplePeriod(
                "sample frequency must be positive and finite",
            ));
        }
        MotionModel::new(drive, 1.0 / sample_frequency)
    }

    /// Returns the drive geometry.
    pub fn drive(&self) -> &DifferentialDrive {
        &self.drive
    }

    /// Returns the sampling interval.
    pub fn sample_period(&self) -> f64 {
        self.sample_period
    }

    /// Returns the `∂y'/∂θ` sign convention.
    pub fn heading_jacobian(&self) -> HeadingJacobian {
        self.heading_jacobian
    }

    /// Apply the kinematics to `pose` with the commanded wheel speeds.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::NonFiniteInput)` if the pose or command
    /// contains NaN/∞, and `Err(KinematicsError::NonFiniteState)` if the
    /// result is not finite.
    pub fn propagate(&self, pose: Pose, input: ControlInput) -> Result<Pose, KinematicsError> {
        self.step(pose, input).map(|step| step.pose)
    }

    /// Apply the kinematics after perturbing each wheel speed with an
    /// independent `N(0, process_std²)` draw (left wheel drawn first).
    ///
    /// This is the path the simulated "true" robot follows. Nothing is drawn
    /// from `rng` when the pose, command or deviation is rejected up front.
    pub fn propagate_noisy<R: Rng + ?Sized>(
        &self,
        pose: Pose,
        input: ControlInput,
        process_std: f64,
        rng: &mut R,
    ) -> Result<Pose, KinematicsError> {
        if !(process_std >= 0.0) || !process_std.is_finite() {
            return Err(KinematicsError::InvalidNoiseDeviation(
                "process deviation must be non-negative and finite",
            ));
        }
        check_finite(pose, input)?;
        let n_l: f64 = rng.sample(StandardNormal);
        let n_r: f64 = rng.sample(StandardNormal);
        let perturbed = ControlInput::new(input.w_l + process_std * n_l, input.w_r + process_std * n_r);
        self.propagate(pose, perturbed)
    }

    /// Noiseless propagation with the step's Jacobians, for the filter's estimate.
    pub fn predict(&self, pose: Pose, input: ControlInput) -> Result<Transition, KinematicsError> {
        let step = self.step(pose, input)?;

        let mut state_jacobian = Matrix3::identity();
        state_jacobian[(0, 2)] = step.dx_dtheta;
        state_jacobian[(1, 2)] = step.dy_dtheta;

        let noise_jacobian = self.noise_jacobian(pose.theta, step.theta_next, input);
        if noise_jacobian.iter().any(|v| !v.is_finite()) {
            return Err(KinematicsError::NonFiniteState("noise jacobian"));
        }

        Ok(Transition {
            pose: step.pose,
            state_jacobian,
            noise_jacobian,
        })
    }

    /// ICC radius for this step, or `None` when the heading change is below
    /// [`STRAIGHT_HEADING_THRESHOLD`].
    fn arc_radius(&self, input: ControlInput) -> Option<f64> {
        let heading_change = self.drive.forward_kinematics(input).omega * self.sample_period;
        if heading_change.abs() < STRAIGHT_HEADING_THRESHOLD {
            return None;
        }
        self.drive.icc_radius(input)
    }

    fn step(&self, pose: Pose, input: ControlInput) -> Result<Step, KinematicsError> {
        check_finite(pose, input)?;

        let dt = self.sample_period;
        let speeds = self.drive.forward_kinematics(input);
        let theta = pose.theta;
        let theta_next = theta + speeds.omega * dt;

        let (x, y, dx_dtheta, dy_dtheta) = match self.arc_radius(input) {
            None => (
                pose.x + speeds.v * dt * theta.cos(),
                pose.y + speeds.v * dt * theta.sin(),
                0.0,
                0.0,
            ),
            Some(radius) => {
                let (sin0, cos0) = theta.sin_cos();
                let (sin1, cos1) = theta_next.sin_cos();
                (
                    pose.x + radius * (sin1 - sin0),
                    pose.y - radius * (cos1 - cos0),
                    radius * (cos1 - cos0),
                    match self.heading_jacobian {
                        HeadingJacobian::Mirrored => radius * (sin0 - sin1),
                        HeadingJacobian::Analytic => radius * (sin1 - sin0),
                    },
                )
            }
        };

        let next = Pose::normalized(x, y, theta_next);
        if !next.is_finite() || !dx_dtheta.is_finite() || !dy_dtheta.is_finite() {
            return Err(KinematicsError::NonFiniteState("propagated pose"));
        }

        Ok(Step {
            pose: next,
            theta_next,
            dx_dtheta,
            dy_dtheta,
        })
    }

    /// `∂(x', y', θ')/∂(ωL, ωR)` at the commanded input.
    ///
    /// The straight-line branch is the limit of the arc expressions as
    /// `ωR − ωL → 0`, evaluated at the mean wheel speed, so it never divides
    /// by the wheel-speed difference.
    fn noise_jacobian(&self, theta: f64, theta_next: f64, input: ControlInput) -> Matrix3x2<f64> {
        let r = self.drive.wheel_radius();
        let b = self.drive.axle_length();
        let dt = self.sample_period;
        // dθ'/dωR; dθ'/dωL is its negation
        let k = dt * r / b;

        match self.arc_radius(input) {
            None => {
                let (sin0, cos0) = theta.sin_cos();
                let mean = (input.w_l + input.w_r) / 2.0;
                let along = r * dt / 2.0;
                let across = r * r * mean * dt * dt / (2.0 * b);
                Matrix3x2::new(
                    along * cos0 + across * sin0,
                    along * cos0 - across * sin0,
                    along * sin0 - across * cos0,
                    along * sin0 + across * cos0,
                    -k,
                    k,
                )
            }
            Some(radius) => {
                let (sin0, cos0) = theta.sin_cos();
                let (sin1, cos1) = theta_next.sin_cos();
                let diff = input.w_r - input.w_l;
                let dradius_dl = b * input.w_r / (diff * diff);
                let dradius_dr = -b * input.w_l / (diff * diff);
                let ds = sin1 - sin0;
                let dc = cos1 - cos0;
                Matrix3x2::new(
                    dradius_dl * ds - k * radius * cos1,
                    dradius_dr * ds + k * radius * cos1,
                    -dradius_dl * dc - k * radius * sin1,
                    -dradius_dr * dc + k * radius * sin1,
                    -k,
                    k,
                )
            }
        }
    }
}

fn check_finite(pose: Pose, input: ControlInput) -> Result<(), KinematicsError> {
    if !pose.is_finite() {
        return Err(KinematicsError::NonFiniteInput("pose"));
    }
    if !input.is_finite() {
        return Err(KinematicsError::NonFiniteInput("wheel speeds"));
    }
    Ok(())
}
