//! Latest-value cache for the four NXT sensors.
//!
//! [`SensorCache`] holds exactly one reading per sensor and overwrites it as
//! new messages arrive; readers never wait for fresh data.  Each sensor has
//! its own independently synchronised cell, so a read across two different
//! sensors may pair values that arrived at different times.  Within one cell
//! the reading is consistent: the color sample keeps its r/g/b/intensity
//! components together behind a lock, the scalar sensors live in atomics.
//!
//! Before the first message arrives every cell reports its zero value
//! (`false`, `0.0`, black).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use nxtbot_middleware::{EventBus, Topic};
use nxtbot_types::{Color, EventPayload, NamedColor};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

/// Shared latest-value store fed by the bus sensor lanes.
///
/// The `f64` sensors are stored as raw bits in an [`AtomicU64`] so reads
/// never contend with the pump task.
#[derive(Debug, Default)]
pub struct SensorCache {
    contact: AtomicBool,
    range_bits: AtomicU64,
    intensity_bits: AtomicU64,
    color: RwLock<Color>,
}

impl SensorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest bumper reading, `false` until the first contact message.
    pub fn contact(&self) -> bool {
        self.contact.load(Ordering::Acquire)
    }

    /// Latest ultrasonic range in meters, `0.0` until the first echo.
    pub fn range(&self) -> f64 {
        f64::from_bits(self.range_bits.load(Ordering::Acquire))
    }

    /// Latest reflected-light intensity, `0.0` until the first sample.
    pub fn light_intensity(&self) -> f64 {
        f64::from_bits(self.intensity_bits.load(Ordering::Acquire))
    }

    /// Latest full color sample.
    pub fn color(&self) -> Color {
        match self.color.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Latest color sample classified against the canonical table.
    pub fn named_color(&self) -> NamedColor {
        NamedColor::from(self.color())
    }

    /// Route a bus payload into the matching cell.
    ///
    /// Non-sensor payloads are ignored.
    pub fn apply(&self, payload: &EventPayload) {
        match payload {
            EventPayload::Contact(c) => self.contact.store(c.contact, Ordering::Release),
            EventPayload::Range(r) => self.range_bits.store(r.range.to_bits(), Ordering::Release),
            EventPayload::Intensity(c) => self
                .intensity_bits
                .store(c.intensity.to_bits(), Ordering::Release),
            EventPayload::Color(c) => {
                let mut guard = match self.color.write() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                *guard = *c;
            }
            EventPayload::JointCommand(_) => {}
        }
    }

    /// Spawn the pump task that keeps `cache` current from the bus.
    ///
    /// Subscribes to all four sensor lanes once, then applies every incoming
    /// event until the bus shuts down.  A lagged lane drops the missed
    /// readings and carries on with the newest ones.
    pub fn spawn_pump(cache: Arc<SensorCache>, bus: &EventBus) -> JoinHandle<()> {
        let mut touch = bus.subscribe_to(Topic::TouchSensor);
        let mut range = bus.subscribe_to(Topic::UltrasonicSensor);
        let mut intensity = bus.subscribe_to(Topic::IntensitySensor);
        let mut color = bus.subscribe_to(Topic::ColorSensor);

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    e = touch.recv() => e,
                    e = range.recv() => e,
                    e = intensity.recv() => e,
                    e = color.recv() => e,
                };
                match event {
                    Ok(event) => cache.apply(&event.payload),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(lagged_by = n, "sensor pump lagged, skipped stale readings");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
