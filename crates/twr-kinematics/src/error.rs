#![warn(missing_docs)]

//! Error types for the kinematics library.
//!
//! This module defines error types that can occur while building the drive
//! geometry or propagating a pose through the motion model.

use core::fmt;

/// Errors that can occur in kinematic calculations.
#[derive(Debug, Clone, PartialEq)]
pub enum KinematicsError {
    /// Error for invalid wheel radius.
    /// This variant is returned when a wheel radius is provided that is not positive.
    InvalidWheelRadius(&'static str),
    /// Error for invalid wheel separation.
    /// This variant is returned when an axle length is provided that is not positive.
    InvalidAxleLength(&'static str),
    /// Error for an invalid sampling interval.
    /// This variant is returned when the sample period is not a positive, finite number.
    InvalidSamplePeriod(&'static str),
    /// Error for an invalid noise standard deviation.
    /// This variant is returned when a deviation is negative or not finite.
    InvalidNoiseDeviation(&'static str),
    /// A pose or wheel command handed to the motion model contains NaN or ∞.
    NonFiniteInput(&'static str),
    /// Propagation produced a pose or Jacobian that is not finite.
    NonFiniteState(&'static str),
}

impl fmt::Display for KinematicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KinematicsError::InvalidWheelRadius(msg) => write!(f, "Invalid wheel radius: {}", msg),
            KinematicsError::InvalidAxleLength(msg) => write!(f, "Invalid axle length: {}", msg),
            KinematicsError::InvalidSamplePeriod(msg) => write!(f, "Invalid sample period: {}", msg),
            KinematicsError::InvalidNoiseDeviation(msg) => {
                write!(f, "Invalid noise deviation: {}", msg)
            }
            KinematicsError::NonFiniteInput(msg) => write!(f, "Non-finite input: {}", msg),
            KinematicsError::NonFiniteState(msg) => write!(f, "Non-finite state: {}", msg),
        }
    }
}

impl std::error::Error for KinematicsError {}
