//! Patrol program: approach an obstacle, back out, repeat.
//!
//! Each lap drives forward until the ultrasonic range drops to the approach
//! threshold, then backs out with two reverse pulses of different lengths so
//! the robot swings away from the obstacle (short pulse on the left wheel,
//! long pulse on the right).  After the configured number of laps every
//! motor is swept to zero effort.

use std::sync::Arc;
use std::time::Duration;

use nxtbot_hal::{MotorGateway, SensorCache};
use nxtbot_types::{Motor, NxtError};
use tracing::debug;

/// Configuration bundle for [`Patrol`].
#[derive(Debug, Clone)]
pub struct PatrolConfig {
    /// Left wheel motor.
    pub left: Motor,
    /// Right wheel motor.
    pub right: Motor,
    /// Forward drive effort; retreat pulses run at its negation.
    pub effort: f64,
    /// Range (meters) at which the approach phase ends.
    pub approach_range: f64,
    /// Pause between consecutive range samples while approaching.  Must be
    /// non-zero; the approach phase paces itself on this interval.
    pub sample_interval: Duration,
    /// Number of approach/retreat laps.
    pub laps: u32,
    /// Reverse pulse on the left wheel (the short, turning one).
    pub turn_pulse: Duration,
    /// Reverse pulse on the right wheel (the long, retreating one).
    pub retreat_pulse: Duration,
    /// Settle pause at the end of each lap.
    pub settle_pause: Duration,
}

impl Default for PatrolConfig {
    fn default() -> Self {
        Self {
            left: Motor::C,
            right: Motor::B,
            effort: 1.0,
            approach_range: 0.5,
            sample_interval: Duration::from_millis(100),
            laps: 10,
            turn_pulse: Duration::from_millis(50),
            retreat_pulse: Duration::from_millis(300),
            settle_pause: Duration::from_millis(100),
        }
    }
}

/// The approach/retreat patrol program.
pub struct Patrol {
    cache: Arc<SensorCache>,
    gateway: MotorGateway,
    config: PatrolConfig,
}

impl Patrol {
    pub fn new(cache: Arc<SensorCache>, gateway: MotorGateway, config: PatrolConfig) -> Self {
        Self {
            cache,
            gateway,
            config,
        }
    }

    /// Run all configured laps, then stop every motor.
    ///
    /// # Errors
    ///
    /// Returns [`NxtError::MotionInterrupted`] if a retreat pulse is
    /// cancelled mid-wait; the final stop sweep is skipped in that case and
    /// the caller decides how to leave the motors.
    pub async fn run(&self) -> Result<(), NxtError> {
        for lap in 0..self.config.laps {
            debug!(lap, "patrol lap");
            self.approach().await?;
            self.retreat().await?;
        }
        self.gateway.stop_all();
        Ok(())
    }

    /// Drive forward until the range drops to the approach threshold.
    async fn approach(&self) -> Result<(), NxtError> {
        let mut interval = tokio::time::interval(self.config.sample_interval);
        loop {
            interval.tick().await;
            if self.cache.range() <= self.config.approach_range {
                return Ok(());
            }
            self.gateway
                .run_two_motors(
                    self.config.right,
                    self.config.left,
                    Duration::ZERO,
                    self.config.effort,
                )
                .await?;
        }
    }

    /// Back out with the two reverse pulses, then let the chassis settle.
    async fn retreat(&self) -> Result<(), NxtError> {
        self.gateway
            .run_motor(self.config.left, self.config.turn_pulse, -self.config.effort)
            .await?;
        self.gateway
            .run_motor(
                self.config.right,
                self.config.retreat_pulse,
                -self.config.effort,
            )
            .await?;
        tokio::time::sleep(self.config.settle_pause).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nxtbot_middleware::{EventBus, Topic, TopicReceiver};
    use nxtbot_types::{EventPayload, JointCommand, Range};

    fn test_config() -> PatrolConfig {
        PatrolConfig {
            sample_interval: Duration::from_millis(5),
            turn_pulse: Duration::from_millis(10),
            retreat_pulse: Duration::from_millis(15),
            settle_pause: Duration::from_millis(5),
            laps: 1,
            ..PatrolConfig::default()
        }
    }

    fn make_patrol(config: PatrolConfig) -> (Arc<SensorCache>, Patrol, TopicReceiver) {
        let bus = EventBus::default();
        let rx = bus.subscribe_to(Topic::JointCommands);
        let cache = Arc::new(SensorCache::new());
        let patrol = Patrol::new(Arc::clone(&cache), MotorGateway::new(bus), config);
        (cache, patrol, rx)
    }

    fn drain_commands(rx: &mut TopicReceiver) -> Vec<JointCommand> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let EventPayload::JointCommand(cmd) = event.payload {
                out.push(cmd);
            }
        }
        out
    }

    #[tokio::test]
    async fn zero_laps_is_just_the_final_stop_sweep() {
        let (_cache, patrol, mut rx) = make_patrol(PatrolConfig {
            laps: 0,
            ..test_config()
        });

        patrol.run().await.unwrap();

        let commands = drain_commands(&mut rx);
        assert_eq!(commands.len(), 3);
        assert!(commands.iter().all(|c| c.effort == 0.0));
    }

    /// With the obstacle already inside the approach range the lap skips
    /// straight to the retreat pulses.
    #[tokio::test]
    async fn lap_with_blocked_path_retreats_immediately() {
        let (_cache, patrol, mut rx) = make_patrol(test_config());

        // Cache default range is 0.0, well inside the approach threshold.
        patrol.run().await.unwrap();

        let commands = drain_commands(&mut rx);
        // Left turn pulse (start + stop), right retreat pulse (start + stop),
        // final three-motor sweep.
        assert_eq!(commands.len(), 7);
        assert_eq!(commands[0].name, "c_motor_joint");
        assert!((commands[0].effort - (-1.0)).abs() < f64::EPSILON);
        assert_eq!(commands[1].effort, 0.0);
        assert_eq!(commands[2].name, "b_motor_joint");
        assert!((commands[2].effort - (-1.0)).abs() < f64::EPSILON);
        assert_eq!(commands[3].effort, 0.0);
        assert!(commands[4..].iter().all(|c| c.effort == 0.0));
    }

    #[tokio::test]
    async fn approach_drives_until_the_threshold_is_reached() {
        let (cache, patrol, mut rx) = make_patrol(test_config());

        cache.apply(&EventPayload::Range(Range { range: 1.0 }));
        let cache_writer = Arc::clone(&cache);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(25)).await;
            cache_writer.apply(&EventPayload::Range(Range { range: 0.4 }));
        });

        tokio::time::timeout(Duration::from_secs(2), patrol.run())
            .await
            .expect("patrol must terminate")
            .unwrap();

        let commands = drain_commands(&mut rx);
        // At least one forward sample went out before the retreat.
        assert!(commands.iter().any(|c| (c.effort - 1.0).abs() < f64::EPSILON));
        // The lap ends with the three-motor stop sweep.
        let tail: Vec<_> = commands.iter().rev().take(3).collect();
        assert!(tail.iter().all(|c| c.effort == 0.0));
    }
}
