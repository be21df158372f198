//! Drive-until-obstacle control loop.
//!
//! [`ObstacleAvoidance`] drives both wheels forward while the ultrasonic
//! range stays at or above the stop threshold, and latches into
//! [`DriveState::Stopped`] the first time a sample falls below it.  One
//! [`tick`](ObstacleAvoidance::tick) is exactly one sample, which keeps the
//! state machine deterministic; [`run`](ObstacleAvoidance::run) paces ticks
//! with a [`tokio::time::interval`] instead of spinning on the sensor.
//!
//! Whether the crossing also emits a `stop_all` sweep is configurable: the
//! hardware keeps its last effort without one, so
//! [`AvoidanceConfig::stop_on_obstacle`] defaults to `true`.

use std::sync::Arc;
use std::time::Duration;

use nxtbot_hal::{MotorGateway, SensorCache};
use nxtbot_types::{Motor, NxtError};
use tracing::{debug, info};

/// Configuration bundle for [`ObstacleAvoidance`].
#[derive(Debug, Clone)]
pub struct AvoidanceConfig {
    /// Left wheel motor.
    pub left: Motor,
    /// Right wheel motor.
    pub right: Motor,
    /// Forward drive effort.
    pub effort: f64,
    /// Range (meters) below which the robot stops.
    pub stop_range: f64,
    /// Pause between consecutive range samples.  Must be non-zero;
    /// [`run`](ObstacleAvoidance::run) paces itself on this interval.
    pub sample_interval: Duration,
    /// Emit a `stop_all` sweep when the threshold is crossed.
    pub stop_on_obstacle: bool,
}

impl Default for AvoidanceConfig {
    fn default() -> Self {
        Self {
            left: Motor::C,
            right: Motor::B,
            effort: 1.0,
            stop_range: 0.3,
            sample_interval: Duration::from_millis(100),
            stop_on_obstacle: true,
        }
    }
}

/// Drive state of the avoidance loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveState {
    /// Path clear, forward commands flowing.
    Driving,
    /// Threshold crossed; terminal until [`ObstacleAvoidance::restart`].
    Stopped,
}

/// The drive-until-obstacle state machine.
pub struct ObstacleAvoidance {
    cache: Arc<SensorCache>,
    gateway: MotorGateway,
    config: AvoidanceConfig,
    state: DriveState,
}

impl ObstacleAvoidance {
    /// Build the loop in [`DriveState::Driving`].
    pub fn new(cache: Arc<SensorCache>, gateway: MotorGateway, config: AvoidanceConfig) -> Self {
        Self {
            cache,
            gateway,
            config,
            state: DriveState::Driving,
        }
    }

    /// Current drive state.
    pub fn state(&self) -> DriveState {
        self.state
    }

    /// Re-arm a stopped loop so the next tick samples again.
    pub fn restart(&mut self) {
        debug!("avoidance loop re-armed");
        self.state = DriveState::Driving;
    }

    /// Take one range sample and act on it.
    ///
    /// While driving: a clear sample (range at or above the threshold) sends
    /// the zero-duration forward command to both wheels; a blocked sample
    /// latches [`DriveState::Stopped`] and, if configured, sweeps all motors
    /// to zero effort.  A stopped loop ignores further ticks.
    pub async fn tick(&mut self) -> Result<DriveState, NxtError> {
        if self.state == DriveState::Stopped {
            return Ok(self.state);
        }

        let range = self.cache.range();
        if range >= self.config.stop_range {
            self.gateway
                .run_two_motors(
                    self.config.right,
                    self.config.left,
                    Duration::ZERO,
                    self.config.effort,
                )
                .await?;
        } else {
            info!(
                range,
                threshold = self.config.stop_range,
                "obstacle inside stop range"
            );
            self.state = DriveState::Stopped;
            if self.config.stop_on_obstacle {
                self.gateway.stop_all();
            }
        }
        Ok(self.state)
    }

    /// Sample at the configured interval until the loop stops.
    pub async fn run(&mut self) -> Result<(), NxtError> {
        let mut interval = tokio::time::interval(self.config.sample_interval);
        while self.state == DriveState::Driving {
            interval.tick().await;
            self.tick().await?;
        }
        Ok(())
    }
}
