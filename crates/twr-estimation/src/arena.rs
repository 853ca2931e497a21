
//! The rectangular arena the robot drives in.
//!
//! The arena spans `[0, W] × [0, L]`. Its four walls are numbered
//! counter-clockwise starting from the wall at `x = W`.

use core::f64::consts::{FRAC_PI_2, PI};
use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use twr_kinematics::Pose;

use crate::error::EstimationError;

/// One of the four arena walls.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Wall {
    /// The wall at `x = W`.
    Right = 1,
    /// The wall at `y = L`.
    Top = 2,
    /// The wall at `x = 0`.
    Left = 3,
    /// The wall at `y = 0`.
    Bottom = 4,
}

impl Wall {
    /// All walls in index order. Ties in wall selection resolve to the
    /// earlier entry.
    pub const ALL: [Wall; 4] = [Wall::Right, Wall::Top, Wall::Left, Wall::Bottom];

    /// The wall's index, 1 through 4.
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Direction (rad) of the outward wall normal, i.e. the heading a ray
    /// must have to hit this wall head-on.
    pub fn normal_angle(self) -> f64 {
        match self {
            Wall::Right => 0.0,
            Wall::Top => FRAC_PI_2,
            Wall::Left => PI,
            Wall::Bottom => 3.0 * FRAC_PI_2,
        }
    }
}

impl fmt::Display for Wall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Wall::Right => "RIGHT",
            Wall::Top => "TOP",
            Wall::Left => "LEFT",
            Wall::Bottom => "BOTTOM",
        };
        write!(f, "{}({})", name, self.index())
    }
}

/// A `width × length` rectangle with its lower-left corner at the origin.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arena {
    /// Extent along x (`W`).
    width: f64,
    /// Extent along y (`L`).
    length: f64,
}

impl Arena {
    /// Creates a new arena.
    ///
    /// # Errors
    ///
    /// Returns `Err(EstimationError::InvalidConfig)` unless both sides are
    /// positive and finite.
    pub fn new(width: f64, length: f64) -> Result<Self, EstimationError> {
        if !(width > 0.0) || !width.is_finite() {
            return Err(EstimationError::InvalidConfig("arena width must be positive and finite"));
        }
        if !(length > 0.0) || !length.is_finite() {
            return Err(EstimationError::InvalidConfig("arena length must be positive and finite"));
        }
        Ok(Arena { width, length })
    }

    /// Returns the arena width `W`.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Returns the arena length `L`.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Whether `pose` lies inside the closed rectangle.
    pub fn contains(&self, pose: &Pose) -> bool {
        (0.0..=self.width).contains(&pose.x) && (0.0..=self.length).contains(&pose.y)
    }

    /// Perpendicular gap between `pose` and the line of `wall`, positive
    /// while the pose is inside the arena.
    pub fn gap(&self, wall: Wall, pose: &Pose) -> f64 {
        match wall {
            Wall::Right => self.width - pose.x,
            Wall::Top => self.length - pose.y,
            Wall::Left => pose.x,
            Wall::Bottom => pose.y,
        }
    }

    /// `(∂gap/∂x, ∂gap/∂y)` for `wall`.
    pub fn gap_gradient(wall: Wall) -> (f64, f64) {
        match wall {
            Wall::Right => (-1.0, 0.0),
            Wall::Top => (0.0, -1.0),
            Wall::Left => (1.0, 0.0),
            Wall::Bottom => (0.0, 1.0),
        }
    }
}

impl Default for Arena {
    fn default() -> Self {
        Arena {
            width: 500.0,
            length: 750.0,
        }
    }
}

impl fmt::Display for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Arena ({:.1} x {:.1})", self.width, self.length)
    }
}
