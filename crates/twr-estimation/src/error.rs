//! This module defines the error types used by the `twr-estimation` crate.

use twr_kinematics::KinematicsError;

use crate::observation::Sensor;

/// Error type for estimation operations.
///
/// Every variant describes a failure of a single update call. A failing
/// update leaves the true pose, the estimate and the covariance untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum EstimationError {
    /// The motion model rejected the step (non-finite input or result,
    /// invalid geometry or noise deviation).
    Kinematics(KinematicsError),
    /// Error for invalid configuration values.
    InvalidConfig(&'static str),
    /// The pose used for ranging lies outside the arena, where wall
    /// selection is undefined.
    PoseOutsideArena,
    /// No wall lies at a strictly positive, finite distance along the
    /// sensor's ray.
    NoWallInView(Sensor),
    /// The innovation covariance `S` is singular or too ill-conditioned to invert.
    SingularInnovation,
    /// A measurement, prediction or correction contained NaN or ∞.
    NonFiniteMeasurement(&'static str),
    /// The filter's propagated belief contained NaN or ∞.
    NonFiniteState(&'static str),
}

impl core::fmt::Display for EstimationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            EstimationError::Kinematics(err) => write!(f, "Motion update failed: {}", err),
            EstimationError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            EstimationError::PoseOutsideArena => write!(f, "Pose lies outside the arena"),
            EstimationError::NoWallInView(sensor) => {
                write!(f, "No wall at a positive distance for the {} sensor", sensor)
            }
            EstimationError::SingularInnovation => {
                write!(f, "Innovation covariance is singular or ill-conditioned")
            }
            EstimationError::NonFiniteMeasurement(msg) => {
                write!(f, "Non-finite measurement: {}", msg)
            }
            EstimationError::NonFiniteState(msg) => write!(f, "Non-finite filter state: {}", msg),
        }
    }
}

impl core::error::Error for EstimationError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            EstimationError::Kinematics(err) => Some(err),
            _ => None,
        }
    }
}

impl From<KinematicsError> for EstimationError {
    fn from(err: KinematicsError) -> Self {
        EstimationError::Kinematics(err)
    }
}
