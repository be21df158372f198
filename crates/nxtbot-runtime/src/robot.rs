//! [`Robot`] – the client-side facade over the whole stack.
//!
//! Owns the [`SensorCache`] (pump spawned at construction), the
//! [`MotorGateway`], and the transport readiness flag.  Control programs talk
//! to this one type instead of wiring bus lanes themselves.
//!
//! # Startup
//!
//! The rosbridge link signals readiness once its advertise/subscribe
//! handshake is out.  [`Robot::wait_ready`] awaits that flag under an
//! explicit deadline; a gateway host that never comes up surfaces as
//! [`NxtError::InitializationTimeout`] instead of hanging the program.

use std::sync::Arc;
use std::time::Duration;

use nxtbot_hal::{InterruptHandle, MotorGateway, SensorCache};
use nxtbot_middleware::EventBus;
use nxtbot_types::{Color, Motor, NamedColor, NxtError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Facade over sensors and motors for one NXT robot.
pub struct Robot {
    cache: Arc<SensorCache>,
    gateway: MotorGateway,
    ready: watch::Receiver<bool>,
    pump: JoinHandle<()>,
}

impl Robot {
    /// Build a robot on `bus`, spawning the sensor pump task.
    ///
    /// `ready` is the readiness flag handed out by the transport link; pass a
    /// channel that is already `true` when no link is involved (tests, dry
    /// runs).
    pub fn new(bus: EventBus, ready: watch::Receiver<bool>) -> Self {
        let cache = Arc::new(SensorCache::new());
        let pump = SensorCache::spawn_pump(Arc::clone(&cache), &bus);
        let gateway = MotorGateway::new(bus);
        Self {
            cache,
            gateway,
            ready,
            pump,
        }
    }

    /// Wait until the transport link reports ready, at most `limit`.
    ///
    /// # Errors
    ///
    /// * [`NxtError::InitializationTimeout`] – the flag never flipped within
    ///   `limit`.
    /// * [`NxtError::Transport`] – the link task ended before becoming ready.
    pub async fn wait_ready(&self, limit: Duration) -> Result<(), NxtError> {
        let mut ready = self.ready.clone();
        match tokio::time::timeout(limit, ready.wait_for(|flag| *flag)).await {
            Ok(Ok(_)) => {
                debug!("transport link ready");
                Ok(())
            }
            Ok(Err(_)) => Err(NxtError::Transport(
                "link task ended before becoming ready".to_string(),
            )),
            Err(_) => Err(NxtError::InitializationTimeout(limit)),
        }
    }

    // -------------------------------------------------------------------------
    // Sensor accessors
    // -------------------------------------------------------------------------

    /// Latest bumper reading.
    pub fn contact(&self) -> bool {
        self.cache.contact()
    }

    /// Latest ultrasonic range in meters.
    pub fn range(&self) -> f64 {
        self.cache.range()
    }

    /// Latest reflected-light intensity.
    pub fn light_intensity(&self) -> f64 {
        self.cache.light_intensity()
    }

    /// Latest full color sample.
    pub fn color(&self) -> Color {
        self.cache.color()
    }

    /// Latest color sample classified against the canonical table.
    pub fn named_color(&self) -> NamedColor {
        self.cache.named_color()
    }

    // -------------------------------------------------------------------------
    // Motion
    // -------------------------------------------------------------------------

    /// See [`MotorGateway::run_motor`].
    pub async fn run_motor(
        &self,
        motor: Motor,
        duration: Duration,
        effort: f64,
    ) -> Result<(), NxtError> {
        self.gateway.run_motor(motor, duration, effort).await
    }

    /// See [`MotorGateway::run_two_motors`].
    pub async fn run_two_motors(
        &self,
        first: Motor,
        second: Motor,
        duration: Duration,
        effort: f64,
    ) -> Result<(), NxtError> {
        self.gateway
            .run_two_motors(first, second, duration, effort)
            .await
    }

    /// Send a zero-effort command to every motor port.
    pub fn stop_all(&self) {
        self.gateway.stop_all();
    }

    // -------------------------------------------------------------------------
    // Subsystem accessors (for control programs / external wiring)
    // -------------------------------------------------------------------------

    /// Return a clone of the gateway so control programs can publish commands.
    pub fn gateway(&self) -> MotorGateway {
        self.gateway.clone()
    }

    /// Return the shared sensor cache.
    pub fn cache(&self) -> Arc<SensorCache> {
        Arc::clone(&self.cache)
    }

    /// Handle that cancels in-flight timed pulses, e.g. from a Ctrl-C hook.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.gateway.interrupt_handle()
    }
}

impl Drop for Robot {
    fn drop(&mut self) {
        self.pump.abort();
    }
}
