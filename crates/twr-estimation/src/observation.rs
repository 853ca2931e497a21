//! Range-sensor observation model.
//!
//! Two range sensors are rigidly mounted on the robot: one looking along the
//! heading ("front") and one rotated 90° clockwise from it ("right"). Each
//! reads the distance along its ray to the first wall it strikes.
//!
//! For a wall whose distance along the ray is `gap / cos(θ − α)`, where `gap`
//! is the perpendicular distance to the wall line and `α` the ray-to-wall
//! bearing offset, the Jacobian row is
//! `(∂gap/∂x / cos φ, ∂gap/∂y / cos φ, gap · tan φ / cos φ)` with `φ = θ − α`.

use core::f64::consts::{FRAC_PI_2, PI};
use core::fmt;

use nalgebra::{Matrix2x3, RowVector3, Vector2};
use rand::Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use twr_kinematics::Pose;

use crate::arena::{Arena, Wall};
use crate::error::EstimationError;
use crate::noise::NoiseConfig;

/// Rays with `|cos φ|` below this are parallel to the wall and never strike it.
pub const MIN_RAY_COSINE: f64 = 1e-9;

/// The two range sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Sensor {
    /// Looks along the heading.
    Front,
    /// Looks 90° clockwise from the heading.
    Right,
}

impl Sensor {
    /// Both sensors, in measurement-vector order.
    pub const ALL: [Sensor; 2] = [Sensor::Front, Sensor::Right];

    /// Offset `α` subtracted from the heading in the cosine term of the
    /// ray distance to `wall`.
    pub fn bearing_offset(self, wall: Wall) -> f64 {
        match (self, wall) {
            (Sensor::Front, _) => wall.normal_angle(),
            (Sensor::Right, Wall::Right) => FRAC_PI_2,
            (Sensor::Right, Wall::Top) => PI,
            (Sensor::Right, Wall::Left) => 3.0 * FRAC_PI_2,
            (Sensor::Right, Wall::Bottom) => 0.0,
        }
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sensor::Front => write!(f, "front"),
            Sensor::Right => write!(f, "right"),
        }
    }
}

/// A pair of range readings.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RangeMeasurement {
    /// Distance seen by the front sensor.
    pub front: f64,
    /// Distance seen by the right sensor.
    pub right: f64,
}

impl RangeMeasurement {
    /// Construct a measurement.
    pub const fn new(front: f64, right: f64) -> Self {
        RangeMeasurement { front, right }
    }

    /// The measurement as a column vector `[front, right]`.
    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.front, self.right)
    }

    /// Reading of one sensor.
    pub fn get(&self, sensor: Sensor) -> f64 {
        match sensor {
            Sensor::Front => self.front,
            Sensor::Right => self.right,
        }
    }

    /// Returns `true` if both readings are finite.
    pub fn is_finite(&self) -> bool {
        self.front.is_finite() && self.right.is_finite()
    }
}

impl fmt::Display for RangeMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(front: {:.2}, right: {:.2})", self.front, self.right)
    }
}

/// Which wall each sensor is facing.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallAssignment {
    /// Wall struck by the front sensor.
    pub front: Wall,
    /// Wall struck by the right sensor.
    pub right: Wall,
}

impl WallAssignment {
    /// Wall assigned to `sensor`.
    pub fn get(&self, sensor: Sensor) -> Wall {
        match sensor {
            Sensor::Front => self.front,
            Sensor::Right => self.right,
        }
    }
}

impl fmt::Display for WallAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(front: {}, right: {})", self.front, self.right)
    }
}

/// Range readings of both sensors against the walls of an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservationModel {
    arena: Arena,
}

impl ObservationModel {
    /// Creates an observation model for `arena`.
    pub fn new(arena: Arena) -> Self {
        ObservationModel { arena }
    }

    /// Returns the arena.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Signed distance along `sensor`'s ray from `pose` to the line of `wall`.
    /// Negative when the wall lies behind the sensor.
    pub fn ray_distance(&self, pose: &Pose, sensor: Sensor, wall: Wall) -> f64 {
        let phi = pose.theta - sensor.bearing_offset(wall);
        self.arena.gap(wall, pose) / phi.cos()
    }

    /// The wall `sensor` strikes first: the smallest strictly positive,
    /// finite ray distance. Walls the ray runs parallel to (see
    /// [`MIN_RAY_COSINE`]) are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Err(EstimationError::NoWallInView)` if no wall qualifies.
    pub fn select_wall(&self, pose: &Pose, sensor: Sensor) -> Result<Wall, EstimationError> {
        let mut best: Option<(Wall, f64)> = None;
        for wall in Wall::ALL {
            let cos_phi = (pose.theta - sensor.bearing_offset(wall)).cos();
            if cos_phi.abs() < MIN_RAY_COSINE {
                continue;
            }
            let d = self.arena.gap(wall, pose) / cos_phi;
            if !(d > 0.0) || !d.is_finite() {
                continue;
            }
            match best {
                Some((_, current)) if current <= d => {}
                _ => best = Some((wall, d)),
            }
        }
        best.map(|(wall, _)| wall).ok_or(EstimationError::NoWallInView(sensor))
    }

    /// Wall selection for both sensors.
    ///
    /// # Errors
    ///
    /// * `EstimationError::NonFiniteMeasurement` if the pose is not finite.
    /// * `EstimationError::PoseOutsideArena` if the pose lies outside the arena.
    /// * `EstimationError::NoWallInView` if a sensor sees no wall ahead.
    pub fn select_walls(&self, pose: &Pose) -> Result<WallAssignment, EstimationError> {
        if !pose.is_finite() {
            return Err(EstimationError::NonFiniteMeasurement("pose"));
        }
        if !self.arena.contains(pose) {
            return Err(EstimationError::PoseOutsideArena);
        }
        Ok(WallAssignment {
            front: self.select_wall(pose, Sensor::Front)?,
            right: self.select_wall(pose, Sensor::Right)?,
        })
    }

    /// Noiseless readings of `pose` against an already chosen wall assignment.
    pub fn measure(&self, pose: &Pose, walls: WallAssignment) -> RangeMeasurement {
        RangeMeasurement::new(
            self.ray_distance(pose, Sensor::Front, walls.front),
            self.ray_distance(pose, Sensor::Right, walls.right),
        )
    }

    /// Select walls for `pose` and return the noiseless readings.
    pub fn observe(&self, pose: &Pose) -> Result<(RangeMeasurement, WallAssignment), EstimationError> {
        let walls = self.select_walls(pose)?;
        Ok((self.measure(pose, walls), walls))
    }

    /// Like [`ObservationModel::observe`], with measurement noise from `noise` added.
    pub fn observe_noisy<R: Rng + ?Sized>(
        &self,
        pose: &Pose,
        noise: &NoiseConfig,
        rng: &mut R,
    ) -> Result<(RangeMeasurement, WallAssignment), EstimationError> {
        let (clean, walls) = self.observe(pose)?;
        Ok((noise.perturb_measurement(clean, rng), walls))
    }

    /// Observation Jacobian `H = ∂(front, right)/∂(x, y, θ)` at `pose`,
    /// linearized about the given wall assignment.
    pub fn jacobian(&self, pose: &Pose, walls: WallAssignment) -> Matrix2x3<f64> {
        Matrix2x3::from_rows(&[
            self.jacobian_row(pose, Sensor::Front, walls.front),
            self.jacobian_row(pose, Sensor::Right, walls.right),
        ])
    }

    fn jacobian_row(&self, pose: &Pose, sensor: Sensor, wall: Wall) -> RowVector3<f64> {
        let phi = pose.theta - sensor.bearing_offset(wall);
        let (sin_phi, cos_phi) = phi.sin_cos();
        let gap = self.arena.gap(wall, pose);
        let (dgap_dx, dgap_dy) = Arena::gap_gradient(wall);
        RowVector3::new(
            dgap_dx / cos_phi,
            dgap_dy / cos_phi,
            gap * (sin_phi / cos_phi) / cos_phi,
        )
    }
}
