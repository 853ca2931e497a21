#![warn(missing_docs)]
#![doc = "Kinematics for a two-wheeled (differential-drive) robot."]
#![doc = ""]
#![doc = "This crate provides the pose and wheel-command types, forward kinematics,"]
#![doc = "and the arc motion model together with the analytic Jacobians an"]
#![doc = "Extended Kalman Filter needs to propagate its covariance."]

use core::f64::consts::TAU;
use core::fmt;

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod error;
pub mod motion;

pub use error::KinematicsError;
pub use motion::{HeadingJacobian, MotionModel, Transition};

/// A 2‑D pose `(x, y, θ)` in arena units and radians (θ measured
/// counter‑clockwise from the x‑axis in the arena frame).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    /// Arena‑frame x position.
    pub x: f64,
    /// Arena‑frame y position.
    pub y: f64,
    /// Heading (rad), normalized to `[0, 2π)`.
    pub theta: f64,
}

impl Pose {
    /// Construct a new pose. The heading is stored as given; use
    /// [`Pose::normalized`] when it may lie outside `[0, 2π)`.
    ///
    /// # Arguments
    ///
    /// * `x`: Arena-frame x position.
    /// * `y`: Arena-frame y position.
    /// * `theta`: Heading in radians.
    pub const fn new(x: f64, y: f64, theta: f64) -> Self {
        Pose { x, y, theta }
    }

    /// Construct a pose with its heading wrapped into `[0, 2π)`.
    pub fn normalized(x: f64, y: f64, theta: f64) -> Self {
        Pose::new(x, y, Pose::normalize_angle(theta))
    }

    /// Normalize an angle to be within `[0, 2π)`.
    ///
    /// Tiny negative angles whose Euclidean remainder rounds up to `2π`
    /// are mapped to `0`.
    ///
    /// # Arguments
    ///
    /// * `angle`: The angle in radians to normalize.
    ///
    /// # Returns
    ///
    /// The normalized angle in radians.
    pub fn normalize_angle(angle: f64) -> f64 {
        let a = angle.rem_euclid(TAU);
        if a >= TAU { 0.0 } else { a }
    }

    /// Heading in degrees, for display.
    pub fn theta_degrees(&self) -> f64 {
        self.theta.to_degrees()
    }

    /// The `(x, y, θ°)` triple, for display and plotting.
    pub fn to_degrees(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.theta_degrees())
    }

    /// The pose as a column vector `[x, y, θ]`.
    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.theta)
    }

    /// Build a pose from a column vector `[x, y, θ]`, re-wrapping the heading.
    pub fn from_vector(v: &Vector3<f64>) -> Self {
        Pose::normalized(v[0], v[1], v[2])
    }

    /// Returns `true` if every component is finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.theta.is_finite()
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(x: {:.2}, y: {:.2}, θ: {:.2}°)", self.x, self.y, self.theta_degrees())
    }
}

/// Commanded left and right wheel angular velocities.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlInput {
    /// Left wheel angular velocity (rad per unit time).
    pub w_l: f64,
    /// Right wheel angular velocity (rad per unit time).
    pub w_r: f64,
}

impl ControlInput {
    /// Construct a wheel command.
    ///
    /// # Arguments
    ///
    /// * `w_l`: Left wheel angular velocity.
    /// * `w_r`: Right wheel angular velocity.
    pub const fn new(w_l: f64, w_r: f64) -> Self {
        ControlInput { w_l, w_r }
    }

    /// Returns `true` if both wheel speeds are finite.
    pub fn is_finite(&self) -> bool {
        self.w_l.is_finite() && self.w_r.is_finite()
    }

    /// Returns `true` when both wheels turn at exactly the same speed, i.e.
    /// the instantaneous center of rotation is at infinity.
    pub fn is_straight(&self) -> bool {
        self.w_l == self.w_r
    }
}

impl fmt::Display for ControlInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(ωL: {:.3}, ωR: {:.3})", self.w_l, self.w_r)
    }
}

/// Linear and angular chassis velocities.
/// These represent the overall motion of the robot's chassis.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChassisSpeeds {
    /// Linear speed of the chassis center.
    pub v: f64,
    /// Angular speed of the chassis (rad per unit time).
    pub omega: f64,
}

impl ChassisSpeeds {
    /// Construct chassis speeds.
    ///
    /// # Arguments
    ///
    /// * `v`: Linear speed of the chassis center.
    /// * `omega`: Angular speed of the chassis.
    pub const fn new(v: f64, omega: f64) -> Self {
        ChassisSpeeds { v, omega }
    }
}

impl fmt::Display for ChassisSpeeds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(v: {:.2}, ω: {:.4} rad)", self.v, self.omega)
    }
}

/// Differential‑drive geometry.
///
/// This struct encapsulates the physical parameters of a differential-drive robot
/// (wheel radius and wheel separation) and provides the kinematic relations the
/// motion model is built on.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifferentialDrive {
    /// Wheel radius `r`.
    wheel_radius: f64,
    /// Distance between the wheels `b`.
    axle_length: f64,
}

impl DifferentialDrive {
    /// Construct a new differential‑drive kinematics helper.
    ///
    /// # Arguments
    ///
    /// * `wheel_radius`: The radius of the robot's wheels.
    /// * `axle_length`: The distance between the centers of the two drive wheels.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidWheelRadius)` if `wheel_radius` is not positive.
    /// Returns `Err(KinematicsError::InvalidAxleLength)` if `axle_length` is not positive.
    pub const fn new(wheel_radius: f64, axle_length: f64) -> Result<Self, KinematicsError> {
        if !(wheel_radius > 0.0) {
            return Err(KinematicsError::InvalidWheelRadius("must be positive"));
        }
        if !(axle_length > 0.0) {
            return Err(KinematicsError::InvalidAxleLength("must be positive"));
        }
        Ok(DifferentialDrive {
            wheel_radius,
            axle_length,
        })
    }

    /// Returns the wheel radius.
    pub fn wheel_radius(&self) -> f64 {
        self.wheel_radius
    }

    /// Returns the distance between the wheels.
    pub fn axle_length(&self) -> f64 {
        self.axle_length
    }

    /// Calculates the robot's chassis speeds (linear and angular velocity)
    /// from the wheel speeds. This is the forward kinematics problem.
    ///
    /// # Arguments
    ///
    /// * `input`: The commanded angular velocities of the left and right wheels.
    ///
    /// # Returns
    ///
    /// The resulting linear and angular velocities of the robot chassis.
    pub fn forward_kinematics(&self, input: ControlInput) -> ChassisSpeeds {
        let v_l = input.w_l * self.wheel_radius;
        let v_r = input.w_r * self.wheel_radius;

        let v = (v_r + v_l) / 2.0;
        let omega = (v_r - v_l) / self.axle_length;

        ChassisSpeeds::new(v, omega)
    }

    /// Signed radius of the arc traced by the chassis center,
    /// `b/2 · (ωR + ωL) / (ωR − ωL)`.
    ///
    /// Returns `None` for straight-line motion (`ωL == ωR`), where the
    /// instantaneous center of rotation lies at infinity.
    pub fn icc_radius(&self, input: ControlInput) -> Option<f64> {
        if input.is_straight() {
            return None;
        }
        Some(self.axle_length / 2.0 * (input.w_r + input.w_l) / (input.w_r - input.w_l))
    }
}

impl fmt::Display for DifferentialDrive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DifferentialDrive (r: {:.2}, b: {:.2})", self.wheel_radius, self.axle_length)
    }
}
