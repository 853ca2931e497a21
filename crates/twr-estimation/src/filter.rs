//! Gaussian pose belief and the EKF time/measurement corrections.

use nalgebra::{Matrix2, Matrix2x3, Matrix3, Matrix3x2, Vector2};
use tracing::{debug, trace};

use twr_kinematics::{Pose, Transition};

use crate::error::EstimationError;
use crate::observation::RangeMeasurement;

/// Below this reciprocal condition estimate `S` is treated as singular.
const MIN_INNOVATION_RCOND: f64 = 1e-12;

/// The filter's belief: mean pose and its 3×3 covariance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorState {
    pose: Pose,
    covariance: Matrix3<f64>,
}

/// What a measurement correction did, kept for logging and inspection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    /// `y − ŷ`.
    pub innovation: Vector2<f64>,
    /// `K = Σ·Hᵀ·S⁻¹`; zero when the belief carried no uncertainty in the
    /// observed directions.
    pub gain: Matrix3x2<f64>,
}

impl EstimatorState {
    /// A belief that `pose` is known exactly (zero covariance).
    pub fn new(pose: Pose) -> Self {
        EstimatorState {
            pose,
            covariance: Matrix3::zeros(),
        }
    }

    /// A belief with an explicit starting covariance.
    pub fn with_covariance(pose: Pose, covariance: Matrix3<f64>) -> Self {
        EstimatorState { pose, covariance }
    }

    /// Mean pose.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Pose covariance `Σ`.
    pub fn covariance(&self) -> &Matrix3<f64> {
        &self.covariance
    }

    /// Time update: adopt the propagated mean and grow the covariance by
    /// `F·Σ·Fᵀ + W·Q·Wᵀ`.
    ///
    /// `transition` must have been produced from this belief's pose.
    ///
    /// # Errors
    ///
    /// Returns `EstimationError::NonFiniteState` and keeps the belief if the
    /// propagated covariance is not finite.
    pub fn predict(
        &mut self,
        transition: &Transition,
        process_covariance: &Matrix2<f64>,
    ) -> Result<(), EstimationError> {
        let covariance = symmetrize(&transition.propagate_covariance(&self.covariance, process_covariance));
        if covariance.iter().any(|v| !v.is_finite()) {
            return Err(EstimationError::NonFiniteState("propagated covariance"));
        }
        self.pose = transition.pose;
        self.covariance = covariance;
        trace!(pose = %self.pose, cov_trace = self.covariance.trace(), "time update applied");
        Ok(())
    }

    /// Measurement update with a Kalman gain built from `H`, `Σ` and `R`.
    ///
    /// The heading is re-wrapped into `[0, 2π)` and `Σ ← Σ − K·H·Σ`. On
    /// error the belief is left unchanged.
    ///
    /// # Errors
    ///
    /// * `EstimationError::NonFiniteMeasurement` if either measurement or the
    ///   corrected belief is not finite.
    /// * `EstimationError::SingularInnovation` if `S = H·Σ·Hᵀ + R` cannot be
    ///   inverted reliably.
    pub fn correct(
        &mut self,
        measured: &RangeMeasurement,
        predicted: &RangeMeasurement,
        observation_jacobian: &Matrix2x3<f64>,
        measurement_covariance: &Matrix2<f64>,
    ) -> Result<Correction, EstimationError> {
        if !measured.is_finite() {
            return Err(EstimationError::NonFiniteMeasurement("measured ranges"));
        }
        if !predicted.is_finite() {
            return Err(EstimationError::NonFiniteMeasurement("predicted ranges"));
        }

        let h = observation_jacobian;
        let innovation = measured.to_vector() - predicted.to_vector();
        let gain = kalman_gain(&self.covariance, h, measurement_covariance)?;

        let pose = Pose::from_vector(&(self.pose.to_vector() + gain * innovation));
        let covariance = symmetrize(&(self.covariance - gain * h * self.covariance));
        if !pose.is_finite() || covariance.iter().any(|v| !v.is_finite()) {
            return Err(EstimationError::NonFiniteMeasurement("corrected belief"));
        }

        debug!(
            innovation_front = innovation[0],
            innovation_right = innovation[1],
            pose = %pose,
            cov_trace = covariance.trace(),
            "measurement update applied"
        );
        self.pose = pose;
        self.covariance = covariance;
        Ok(Correction { innovation, gain })
    }
}

/// `K = Σ·Hᵀ·S⁻¹` with `S = H·Σ·Hᵀ + R`.
///
/// When `Σ·Hᵀ` is exactly zero there is nothing to correct and the gain is
/// zero whatever `S` is.
pub fn kalman_gain(
    covariance: &Matrix3<f64>,
    observation_jacobian: &Matrix2x3<f64>,
    measurement_covariance: &Matrix2<f64>,
) -> Result<Matrix3x2<f64>, EstimationError> {
    let pht = covariance * observation_jacobian.transpose();
    if pht.iter().all(|v| *v == 0.0) {
        return Ok(Matrix3x2::zeros());
    }
    let s = observation_jacobian * pht + measurement_covariance;
    let s_inv = invert_innovation(&s)?;
    Ok(pht * s_inv)
}

fn invert_innovation(s: &Matrix2<f64>) -> Result<Matrix2<f64>, EstimationError> {
    let scale = s.norm_squared();
    let det = s.determinant();
    if !det.is_finite() || !(scale > 0.0) || det.abs() / scale < MIN_INNOVATION_RCOND {
        return Err(EstimationError::SingularInnovation);
    }
    s.try_inverse().ok_or(EstimationError::SingularInnovation)
}

fn symmetrize(m: &Matrix3<f64>) -> Matrix3<f64> {
    (m + m.transpose()) * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::PI;
    use twr_kinematics::{ControlInput, DifferentialDrive, MotionModel};

    fn transition_from(pose: Pose) -> Transition {
        let model = MotionModel::new(DifferentialDrive::new(20.0, 85.0).unwrap(), 1.0).unwrap();
        model.predict(pose, ControlInput::new(1.0, 2.0)).unwrap()
    }

    #[test]
    fn test_new_state_has_zero_covariance() {
        let state = EstimatorState::new(Pose::new(1.0, 2.0, 0.5));
        assert_eq!(*state.covariance(), Matrix3::zeros());
        assert_eq!(state.pose(), Pose::new(1.0, 2.0, 0.5));
    }

    #[test]
    fn test_predict_adopts_transition() {
        let start = Pose::new(250.0, 375.0, PI / 2.0);
        let mut state = EstimatorState::new(start);
        let transition = transition_from(start);
        let q = Matrix2::identity() * (PI / 6.0).powi(2);
        state.predict(&transition, &q).unwrap();
        assert_eq!(state.pose(), transition.pose);
        let w = transition.noise_jacobian;
        assert!((state.covariance() - w * q * w.transpose()).abs().max() < 1e-9);
    }

    #[test]
    fn test_overflowing_covariance_is_a_state_error() {
        let start = Pose::new(250.0, 375.0, PI / 2.0);
        let mut state = EstimatorState::with_covariance(start, Matrix3::identity() * f64::MAX);
        let before = state;
        let result = state.predict(&transition_from(start), &Matrix2::identity());
        assert!(matches!(result, Err(EstimationError::NonFiniteState(_))));
        assert_eq!(state, before);
    }

    #[test]
    fn test_gain_is_zero_without_uncertainty() {
        let h = Matrix2x3::new(-1.0, 0.0, 0.0, 0.0, 1.0, 0.0);
        let gain = kalman_gain(&Matrix3::zeros(), &h, &Matrix2::zeros()).unwrap();
        assert_eq!(gain, Matrix3x2::zeros());
    }

    #[test]
    fn test_singular_innovation_is_reported() {
        // both rows observe only x, and R is zero: S has rank one
        let h = Matrix2x3::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);
        let covariance = Matrix3::identity();
        assert!(matches!(
            kalman_gain(&covariance, &h, &Matrix2::zeros()),
            Err(EstimationError::SingularInnovation)
        ));

        let mut state = EstimatorState::with_covariance(Pose::new(10.0, 10.0, 0.0), covariance);
        let before = state;
        let result = state.correct(
            &RangeMeasurement::new(1.0, 1.0),
            &RangeMeasurement::new(0.0, 0.0),
            &h,
            &Matrix2::zeros(),
        );
        assert!(matches!(result, Err(EstimationError::SingularInnovation)));
        assert_eq!(state, before);
    }

    #[test]
    fn test_correction_pulls_toward_measurement_and_shrinks_covariance() {
        let covariance = Matrix3::from_diagonal(&nalgebra::Vector3::new(100.0, 100.0, 0.01));
        let mut state = EstimatorState::with_covariance(Pose::new(375.0, 375.0, 0.0), covariance);
        // front sees x = W - range, right sees y
        let h = Matrix2x3::new(-1.0, 0.0, 0.0, 0.0, 1.0, 0.0);
        let r = Matrix2::identity() * 100.0;
        let correction = state
            .correct(
                &RangeMeasurement::new(115.0, 385.0),
                &RangeMeasurement::new(125.0, 375.0),
                &h,
                &r,
            )
            .unwrap();

        assert!((correction.innovation - Vector2::new(-10.0, 10.0)).abs().max() < 1e-12);
        // equal prior and noise variance: halfway
        assert!((state.pose().x - 380.0).abs() < 1e-9);
        assert!((state.pose().y - 380.0).abs() < 1e-9);
        assert!((state.covariance()[(0, 0)] - 50.0).abs() < 1e-9);
        assert!((state.covariance()[(1, 1)] - 50.0).abs() < 1e-9);
        assert!((state.covariance()[(2, 2)] - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_correction_wraps_heading() {
        let covariance = Matrix3::from_diagonal(&nalgebra::Vector3::new(1.0, 1.0, 1.0));
        let mut state = EstimatorState::with_covariance(Pose::new(100.0, 100.0, 0.01), covariance);
        // a measurement that only informs heading, pushing it negative
        let h = Matrix2x3::new(0.0, 0.0, 1.0, 0.0, 0.0, 1.0);
        state
            .correct(
                &RangeMeasurement::new(-0.5, -0.5),
                &RangeMeasurement::new(0.0, 0.0),
                &h,
                &(Matrix2::identity() * 1.0),
            )
            .unwrap();
        let theta = state.pose().theta;
        assert!((0.0..2.0 * PI).contains(&theta));
        assert!(theta > PI);
    }

    #[test]
    fn test_non_finite_measurement_is_rejected() {
        let mut state = EstimatorState::with_covariance(Pose::new(1.0, 1.0, 0.0), Matrix3::identity());
        let h = Matrix2x3::new(-1.0, 0.0, 0.0, 0.0, 1.0, 0.0);
        assert!(matches!(
            state.correct(
                &RangeMeasurement::new(f64::NAN, 1.0),
                &RangeMeasurement::new(0.0, 0.0),
                &h,
                &Matrix2::identity(),
            ),
            Err(EstimationError::NonFiniteMeasurement(_))
        ));
    }
}
