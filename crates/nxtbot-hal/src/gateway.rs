//! Motor command gateway.
//!
//! [`MotorGateway`] turns motion primitives into `JointCommand` events on the
//! bus's [`Topic::JointCommands`] lane.  Publishing is fire-and-forget: a
//! command reaches whatever is subscribed at that moment, typically the
//! rosbridge link, and carries no delivery confirmation.
//!
//! Timed pulses (`duration > 0`) block the calling task for the duration and
//! then send the matching zero-effort stop.  The wait can be cancelled
//! through an [`InterruptHandle`]; a cancelled pulse returns
//! [`NxtError::MotionInterrupted`] and does **not** send the stop, so the
//! last commanded effort stays in place until the caller decides otherwise.

use std::sync::Arc;
use std::time::Duration;

use nxtbot_middleware::{EventBus, Topic};
use nxtbot_types::{Event, EventPayload, JointCommand, Motor, NxtError};
use tokio::sync::watch;
use tracing::debug;

const BUS_SOURCE: &str = "nxtbot-hal::gateway";

/// Publishes motor commands onto the event bus.
///
/// Clone it cheaply; all clones share the same interrupt channel, so an
/// interrupt cancels whichever clone currently sits in a timed wait.
#[derive(Clone, Debug)]
pub struct MotorGateway {
    bus: EventBus,
    interrupt: Arc<watch::Sender<bool>>,
}

/// Cancels in-flight timed pulses on the [`MotorGateway`] it came from.
///
/// The signal is edge-triggered: it aborts the waits that are pending when
/// [`interrupt`](Self::interrupt) fires, later pulses run normally.
#[derive(Clone, Debug)]
pub struct InterruptHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl InterruptHandle {
    /// Abort every timed pulse currently waiting out its duration.
    pub fn interrupt(&self) {
        self.tx.send_replace(true);
    }
}

impl MotorGateway {
    pub fn new(bus: EventBus) -> Self {
        let (interrupt, _) = watch::channel(false);
        Self {
            bus,
            interrupt: Arc::new(interrupt),
        }
    }

    /// Hand out an [`InterruptHandle`] wired to this gateway's pulses.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            tx: Arc::clone(&self.interrupt),
        }
    }

    /// Drive one motor at `effort`.
    ///
    /// Sends the effort command immediately.  With a zero `duration` that is
    /// all: the motor keeps running and the call returns at once.  With a
    /// non-zero `duration` the call waits it out and then sends the matching
    /// zero-effort stop.
    ///
    /// # Errors
    ///
    /// Returns [`NxtError::MotionInterrupted`] if the wait is cancelled; the
    /// stop command is skipped in that case.
    pub async fn run_motor(
        &self,
        motor: Motor,
        duration: Duration,
        effort: f64,
    ) -> Result<(), NxtError> {
        debug!(motor = %motor, effort, duration_ms = duration.as_millis() as u64, "run motor");
        self.send_effort(motor, effort);
        if duration.is_zero() {
            return Ok(());
        }
        self.wait_out(duration).await?;
        self.send_effort(motor, 0.0);
        Ok(())
    }

    /// Drive two motors at the same `effort`, e.g. both wheels of the base.
    ///
    /// The two effort commands go out back to back in call order as two
    /// independent messages; there is no atomic pairing on the wire.  Timing
    /// semantics match [`run_motor`](Self::run_motor): a non-zero `duration`
    /// is waited out once and followed by two stop commands.
    ///
    /// # Errors
    ///
    /// Returns [`NxtError::MotionInterrupted`] if the wait is cancelled; both
    /// stop commands are skipped in that case.
    pub async fn run_two_motors(
        &self,
        first: Motor,
        second: Motor,
        duration: Duration,
        effort: f64,
    ) -> Result<(), NxtError> {
        debug!(
            first = %first,
            second = %second,
            effort,
            duration_ms = duration.as_millis() as u64,
            "run two motors"
        );
        self.send_effort(first, effort);
        self.send_effort(second, effort);
        if duration.is_zero() {
            return Ok(());
        }
        self.wait_out(duration).await?;
        self.send_effort(first, 0.0);
        self.send_effort(second, 0.0);
        Ok(())
    }

    /// Send a zero-effort command to every motor port, pending motion or not.
    pub fn stop_all(&self) {
        debug!("stopping all motors");
        for motor in Motor::ALL {
            self.send_effort(motor, 0.0);
        }
    }

    fn send_effort(&self, motor: Motor, effort: f64) {
        let event = Event::new(
            BUS_SOURCE,
            EventPayload::JointCommand(JointCommand::new(motor, effort)),
        );
        self.bus.publish_to(Topic::JointCommands, event);
    }

    async fn wait_out(&self, duration: Duration) -> Result<(), NxtError> {
        let mut interrupted = self.interrupt.subscribe();
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = interrupted.changed() => Err(NxtError::MotionInterrupted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nxtbot_middleware::TopicReceiver;
    use std::time::Instant;
    use tokio::time::timeout;

    fn make_gateway() -> (MotorGateway, TopicReceiver) {
        let bus = EventBus::default();
        let rx = bus.subscribe_to(Topic::JointCommands);
        (MotorGateway::new(bus), rx)
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
    async fn zero_duration_pulse_sends_exactly_one_command() {
        let (gateway, mut rx) = make_gateway();

        gateway
            .run_motor(Motor::B, Duration::ZERO, 1.0)
            .await
            .unwrap();

        let commands = drain_commands(&mut rx);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].name, "b_motor_joint");
        assert!((commands[0].effort - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn zero_duration_pulse_returns_without_waiting() {
        let (gateway, _rx) = make_gateway();
        timeout(
            Duration::from_millis(250),
            gateway.run_motor(Motor::A, Duration::ZERO, -1.0),
        )
        .await
        .expect("zero-duration pulse must not block")
        .unwrap();
    }

    #[tokio::test]
    async fn timed_pulse_sends_start_then_stop_after_the_duration() {
        let (gateway, mut rx) = make_gateway();
        let pulse = Duration::from_millis(30);

        let started = Instant::now();
        gateway.run_motor(Motor::C, pulse, 1.0).await.unwrap();
        assert!(started.elapsed() >= pulse);

        let commands = drain_commands(&mut rx);
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].name, "c_motor_joint");
        assert!((commands[0].effort - 1.0).abs() < f64::EPSILON);
        assert_eq!(commands[1].name, "c_motor_joint");
        assert_eq!(commands[1].effort, 0.0);
    }

    #[tokio::test]
    async fn two_motor_zero_duration_preserves_call_order() {
        let (gateway, mut rx) = make_gateway();

        gateway
            .run_two_motors(Motor::C, Motor::B, Duration::ZERO, 1.0)
            .await
            .unwrap();

        let commands = drain_commands(&mut rx);
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].name, "c_motor_joint");
        assert_eq!(commands[1].name, "b_motor_joint");
        assert!(commands.iter().all(|c| (c.effort - 1.0).abs() < f64::EPSILON));
    }

    #[tokio::test]
    async fn two_motor_timed_pulse_stops_both_motors() {
        let (gateway, mut rx) = make_gateway();

        gateway
            .run_two_motors(Motor::B, Motor::C, Duration::from_millis(25), -1.0)
            .await
            .unwrap();

        let commands = drain_commands(&mut rx);
        assert_eq!(commands.len(), 4);
        assert!((commands[0].effort - (-1.0)).abs() < f64::EPSILON);
        assert!((commands[1].effort - (-1.0)).abs() < f64::EPSILON);
        assert_eq!(commands[2].effort, 0.0);
        assert_eq!(commands[3].effort, 0.0);
        assert_eq!(commands[2].name, "b_motor_joint");
        assert_eq!(commands[3].name, "c_motor_joint");
    }

    #[tokio::test]
    async fn stop_all_sends_three_zero_effort_commands() {
        let (gateway, mut rx) = make_gateway();

        gateway.stop_all();

        let commands = drain_commands(&mut rx);
        assert_eq!(commands.len(), 3);
        assert_eq!(commands[0].name, "a_motor_joint");
        assert_eq!(commands[1].name, "b_motor_joint");
        assert_eq!(commands[2].name, "c_motor_joint");
        assert!(commands.iter().all(|c| c.effort == 0.0));
    }

    #[tokio::test]
    async fn interrupt_aborts_timed_pulse_and_skips_the_stop() {
        let (gateway, mut rx) = make_gateway();
        let handle = gateway.interrupt_handle();

        let task = {
            let gateway = gateway.clone();
            tokio::spawn(async move {
                gateway
                    .run_motor(Motor::B, Duration::from_secs(5), 1.0)
                    .await
            })
        };
        // Give the pulse a moment to send its start command and park.
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.interrupt();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(NxtError::MotionInterrupted)));

        // Only the start command went out; the motor is left running.
        let commands = drain_commands(&mut rx);
        assert_eq!(commands.len(), 1);
        assert!((commands[0].effort - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn pulses_after_an_interrupt_run_normally() {
        let (gateway, mut rx) = make_gateway();
        let handle = gateway.interrupt_handle();

        let task = {
            let gateway = gateway.clone();
            tokio::spawn(async move {
                gateway
                    .run_motor(Motor::A, Duration::from_secs(5), 1.0)
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.interrupt();
        assert!(task.await.unwrap().is_err());
        drain_commands(&mut rx);

        // The interrupt is consumed; a fresh pulse completes with its stop.
        gateway
            .run_motor(Motor::A, Duration::from_millis(10), 1.0)
            .await
            .unwrap();
        let commands = drain_commands(&mut rx);
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1].effort, 0.0);
    }

    #[tokio::test]
    async fn commands_without_subscribers_are_dropped_silently() {
        let gateway = MotorGateway::new(EventBus::default());
        // Nobody is listening on the command lane; the pulse still succeeds.
        gateway
            .run_motor(Motor::C, Duration::ZERO, 1.0)
            .await
            .unwrap();
        gateway.stop_all();
    }
}
