//! `nxtbot-hal` – Hardware Access Layer
//!
//! The two halves of the NXT hardware surface, seen from this side of the
//! rosbridge link:
//!
//! - [`cache`] – [`SensorCache`][cache::SensorCache]: latest-value store for
//!   the touch, ultrasonic, intensity, and color sensors, kept current by a
//!   pump task on the bus sensor lanes.
//! - [`gateway`] – [`MotorGateway`][gateway::MotorGateway]: motion primitives
//!   (`run_motor`, `run_two_motors`, `stop_all`) published as fire-and-forget
//!   `JointCommand` events, with interruptible timed pulses.

pub mod cache;
pub mod gateway;

pub use cache::SensorCache;
pub use gateway::{InterruptHandle, MotorGateway};
