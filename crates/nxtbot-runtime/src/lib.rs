//! `nxtbot-runtime` – The robot facade and its control programs.
//!
//! Ties the sensor cache and the motor gateway into a single [`Robot`]
//! handle, and layers the three shipped control programs on top of it.
//!
//! # Modules
//!
//! - [`robot`] – [`Robot`][robot::Robot]:
//!   the application-facing handle that owns the cache pump task, gates
//!   startup on link readiness with a hard timeout, and exposes sensor reads
//!   plus timed motor pulses.
//! - [`avoidance`] – [`ObstacleAvoidance`][avoidance::ObstacleAvoidance]:
//!   drive forward until the ultrasonic range crosses the stop threshold,
//!   sampling on a fixed interval.
//! - [`patrol`] – [`Patrol`][patrol::Patrol]:
//!   approach-and-retreat laps ending in a full stop sweep; two uneven
//!   reverse pulses swing the chassis away from the obstacle.
//! - [`teleop`] – [`Teleop`][teleop::Teleop]:
//!   stateless console-token-to-pulse mapping behind the
//!   [`InputSource`][teleop::InputSource] seam.

pub mod avoidance;
pub mod patrol;
pub mod robot;
pub mod teleop;

pub use avoidance::{AvoidanceConfig, DriveState, ObstacleAvoidance};
pub use patrol::{Patrol, PatrolConfig};
pub use robot::Robot;
pub use teleop::{InputSource, StdinInput, Teleop, TeleopConfig};
