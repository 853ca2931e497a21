#![warn(missing_docs)]
//! Extended Kalman Filter pose estimation for a two-wheeled robot.
//!
//! The robot drives inside a rectangular arena and carries two range sensors,
//! one looking ahead and one looking to its right. Each tick the simulated
//! robot moves under noisy wheel commands while the filter propagates a
//! noiseless estimate with linearized covariance growth; the filter then
//! corrects that estimate from noisy range readings.
//!
//! ```no_run
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//! use twr_estimation::{ControlInput, RobotConfig, TwoWheeledRobot};
//!
//! let mut robot = TwoWheeledRobot::new(&RobotConfig::default(), StdRng::seed_from_u64(0))?;
//! robot.time_update(ControlInput::new(1.0, 2.0))?;
//! robot.measurement_update()?;
//! println!("{} ~ {}", robot.true_pose(), robot.estimated_pose());
//! # Ok::<(), twr_estimation::EstimationError>(())
//! ```

pub mod arena;
pub mod config;
pub mod error;
pub mod filter;
pub mod noise;
pub mod observation;
pub mod robot;

pub use arena::{Arena, Wall};
pub use config::{LinearizationPoint, RobotConfig};
pub use error::EstimationError;
pub use filter::{Correction, EstimatorState};
pub use noise::{MeasurementDraw, NoiseConfig};
pub use observation::{ObservationModel, RangeMeasurement, Sensor, WallAssignment};
pub use robot::{MeasurementRecord, TwoWheeledRobot};

pub use twr_kinematics::{ControlInput, HeadingJacobian, Pose};
