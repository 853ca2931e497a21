//! Noise configuration shared by the simulated robot and the filter.

use core::f64::consts::PI;

use nalgebra::Matrix2;
use rand::Rng;
use rand_distr::StandardNormal;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::EstimationError;
use crate::observation::RangeMeasurement;

/// How measurement noise is drawn for the two range readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MeasurementDraw {
    /// One scalar draw added to both readings.
    #[default]
    Shared,
    /// An independent draw per reading.
    Independent,
}

/// Process and measurement noise levels.
///
/// When `enabled` is false both the simulated robot and the filter behave
/// as if every deviation were zero.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NoiseConfig {
    /// Whether any noise is applied.
    pub enabled: bool,
    /// Standard deviation σ_w added to each commanded wheel speed.
    pub process_std: f64,
    /// Standard deviation σ_r added to the range readings.
    pub measurement_std: f64,
    /// Shared or per-sensor measurement draws.
    pub measurement_draw: MeasurementDraw,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        NoiseConfig {
            enabled: true,
            process_std: PI / 6.0,
            measurement_std: 9.375,
            measurement_draw: MeasurementDraw::Shared,
        }
    }
}

impl NoiseConfig {
    /// A configuration with noise switched off.
    pub fn noiseless() -> Self {
        NoiseConfig {
            enabled: false,
            ..NoiseConfig::default()
        }
    }

    /// Checks that both deviations are non-negative and finite.
    pub fn validate(&self) -> Result<(), EstimationError> {
        if !(self.process_std >= 0.0) || !self.process_std.is_finite() {
            return Err(EstimationError::InvalidConfig(
                "process noise deviation must be non-negative and finite",
            ));
        }
        if !(self.measurement_std >= 0.0) || !self.measurement_std.is_finite() {
            return Err(EstimationError::InvalidConfig(
                "measurement noise deviation must be non-negative and finite",
            ));
        }
        Ok(())
    }

    /// σ_w, or zero when noise is disabled.
    pub fn effective_process_std(&self) -> f64 {
        if self.enabled { self.process_std } else { 0.0 }
    }

    /// σ_r, or zero when noise is disabled.
    pub fn effective_measurement_std(&self) -> f64 {
        if self.enabled { self.measurement_std } else { 0.0 }
    }

    /// `Q = σ_w² · I₂`.
    pub fn process_covariance(&self) -> Matrix2<f64> {
        Matrix2::identity() * self.effective_process_std().powi(2)
    }

    /// `R = σ_r² · I₂`.
    pub fn measurement_covariance(&self) -> Matrix2<f64> {
        Matrix2::identity() * self.effective_measurement_std().powi(2)
    }

    /// Add measurement noise to `clean`. Draws nothing when noise is disabled.
    pub fn perturb_measurement<R: Rng + ?Sized>(
        &self,
        clean: RangeMeasurement,
        rng: &mut R,
    ) -> RangeMeasurement {
        if !self.enabled {
            return clean;
        }
        let std = self.measurement_std;
        match self.measurement_draw {
            MeasurementDraw::Shared => {
                let n: f64 = rng.sample(StandardNormal);
                RangeMeasurement::new(clean.front + std * n, clean.right + std * n)
            }
            MeasurementDraw::Independent => {
                let n_front: f64 = rng.sample(StandardNormal);
                let n_right: f64 = rng.sample(StandardNormal);
                RangeMeasurement::new(clean.front + std * n_front, clean.right + std * n_right)
            }
        }
    }
}
