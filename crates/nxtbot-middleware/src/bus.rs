//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! Traffic is partitioned into five [`Topic`] lanes, one per ROS topic on the
//! NXT side, so components only receive the messages they care about:
//!
//! | Topic | Direction | Typical traffic |
//! |---|---|---|
//! | [`Topic::JointCommands`] | outbound | Motor effort commands |
//! | [`Topic::TouchSensor`] | inbound | Bumper contact readings |
//! | [`Topic::UltrasonicSensor`] | inbound | Range echoes in meters |
//! | [`Topic::IntensitySensor`] | inbound | Reflected-light intensity |
//! | [`Topic::ColorSensor`] | inbound | Full rgb + intensity samples |

use nxtbot_types::Event;
use tokio::sync::broadcast;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Enumeration of all first-class routing topics on the event bus.
///
/// Publishers and subscribers reference a `Topic` variant to ensure
/// messages are delivered only to the correct topic channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Motor effort commands on their way out to the brick.
    JointCommands,
    /// Bumper pressed/released readings.
    TouchSensor,
    /// Ultrasonic range echoes.
    UltrasonicSensor,
    /// Reflected-light intensity samples.
    IntensitySensor,
    /// Full color samples (rgb + intensity).
    ColorSensor,
}

impl Topic {
    /// The four inbound sensor lanes, in subscription order.
    pub const SENSORS: [Topic; 4] = [
        Topic::TouchSensor,
        Topic::UltrasonicSensor,
        Topic::IntensitySensor,
        Topic::ColorSensor,
    ];

    /// The ROS topic name this lane maps to on the wire.
    pub fn ros_name(self) -> &'static str {
        match self {
            Topic::JointCommands => "joint_command",
            Topic::TouchSensor => "touch_sensor",
            Topic::UltrasonicSensor => "ultrasonic_sensor",
            Topic::IntensitySensor => "intensity_sensor",
            Topic::ColorSensor => "color_sensor",
        }
    }

    /// Reverse mapping from a wire topic name. `None` for unknown topics.
    pub fn from_ros_name(name: &str) -> Option<Topic> {
        match name {
            "joint_command" => Some(Topic::JointCommands),
            "touch_sensor" => Some(Topic::TouchSensor),
            "ultrasonic_sensor" => Some(Topic::UltrasonicSensor),
            "intensity_sensor" => Some(Topic::IntensitySensor),
            "color_sensor" => Some(Topic::ColorSensor),
            _ => None,
        }
    }
}

/// Shared event bus. Clone it cheaply, all clones share the same underlying
/// broadcast channels.
///
/// Publishing is fire-and-forget: a publish with no subscribers simply
/// reaches nobody, it is not a failure.
#[derive(Clone, Debug)]
pub struct EventBus {
    joint_commands: broadcast::Sender<Event>,
    touch_sensor: broadcast::Sender<Event>,
    ultrasonic_sensor: broadcast::Sender<Event>,
    intensity_sensor: broadcast::Sender<Event>,
    color_sensor: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(capacity: usize) -> Self {
        let (joint_commands, _) = broadcast::channel(capacity);
        let (touch_sensor, _) = broadcast::channel(capacity);
        let (ultrasonic_sensor, _) = broadcast::channel(capacity);
        let (intensity_sensor, _) = broadcast::channel(capacity);
        let (color_sensor, _) = broadcast::channel(capacity);
        Self {
            joint_commands,
            touch_sensor,
            ultrasonic_sensor,
            intensity_sensor,
            color_sensor,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event.
    /// `0` means no subscriber is currently listening on the topic, which is
    /// a normal condition: command publishes carry no delivery confirmation.
    pub fn publish_to(&self, topic: Topic, event: Event) -> usize {
        match self.topic_sender(topic).send(event) {
            Ok(n) => n,
            Err(broadcast::error::SendError(_)) => 0,
        }
    }

    /// Subscribe to a specific [`Topic`] channel.
    ///
    /// The returned [`TopicReceiver`] yields only events published to that
    /// topic, starting with the first event published after this call.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::JointCommands => &self.joint_commands,
            Topic::TouchSensor => &self.touch_sensor,
            Topic::UltrasonicSensor => &self.ultrasonic_sensor,
            Topic::IntensitySensor => &self.intensity_sensor,
            Topic::ColorSensor => &self.color_sensor,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.  The caller decides whether to
    ///   continue or abort.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv); returns
    /// `Err(TryRecvError::Empty)` when no event is queued.
    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nxtbot_types::{EventPayload, Range};

    fn make_event(source: &str) -> Event {
        Event::new(source, EventPayload::Range(Range { range: 1.25 }))
    }

    #[tokio::test]
    async fn publish_and_receive_on_a_lane() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::UltrasonicSensor);

        let event = make_event("nxtbot-middleware::test");
        let delivered = bus.publish_to(Topic::UltrasonicSensor, event.clone());
        assert_eq!(delivered, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, event.id);
        assert_eq!(received.source, event.source);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe_to(Topic::JointCommands);
        let mut rx2 = bus.subscribe_to(Topic::JointCommands);

        let event = make_event("nxtbot-hal::gateway");
        assert_eq!(bus.publish_to(Topic::JointCommands, event.clone()), 2);

        assert_eq!(rx1.recv().await.unwrap().id, event.id);
        assert_eq!(rx2.recv().await.unwrap().id, event.id);
    }

    /// A subscriber on the touch lane must not receive events published to
    /// the ultrasonic lane because they are routed through separate channels.
    #[tokio::test]
    async fn subscriber_does_not_receive_other_topic_events() {
        let bus = EventBus::default();
        let mut touch_sub = bus.subscribe_to(Topic::TouchSensor);
        let _range_sub = bus.subscribe_to(Topic::UltrasonicSensor);

        bus.publish_to(Topic::UltrasonicSensor, make_event("nxtbot-middleware::rosbridge"));

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            touch_sub.recv(),
        )
        .await;

        assert!(
            result.is_err(),
            "touch subscriber must not receive an ultrasonic event"
        );
    }

    #[test]
    fn publish_with_no_subscribers_reaches_nobody() {
        let bus = EventBus::default();
        assert_eq!(bus.publish_to(Topic::JointCommands, make_event("test")), 0);
    }

    #[test]
    fn try_recv_drains_queued_events_then_reports_empty() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::JointCommands);

        bus.publish_to(Topic::JointCommands, make_event("first"));
        bus.publish_to(Topic::JointCommands, make_event("second"));

        assert_eq!(rx.try_recv().unwrap().source, "first");
        assert_eq!(rx.try_recv().unwrap().source, "second");
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    /// Flooding a low-capacity channel while a subscriber sleeps must produce
    /// a `Lagged` error rather than panicking or blocking.
    #[tokio::test]
    async fn channel_lag_on_slow_subscriber() {
        const CAPACITY: usize = 64;
        let bus = EventBus::new(CAPACITY);
        let mut slow_sub = bus.subscribe_to(Topic::UltrasonicSensor);

        for _ in 0..10_000 {
            bus.publish_to(Topic::UltrasonicSensor, make_event("flood::range"));
        }

        let result = slow_sub.recv().await;
        assert!(
            matches!(result, Err(broadcast::error::RecvError::Lagged(_))),
            "expected Lagged error, got: {result:?}"
        );
    }

    #[test]
    fn ros_names_roundtrip() {
        let all = [
            Topic::JointCommands,
            Topic::TouchSensor,
            Topic::UltrasonicSensor,
            Topic::IntensitySensor,
            Topic::ColorSensor,
        ];
        for topic in all {
            assert_eq!(Topic::from_ros_name(topic.ros_name()), Some(topic));
        }
        assert_eq!(Topic::from_ros_name("cmd_vel"), None);
    }

    #[test]
    fn sensor_lanes_exclude_the_command_lane() {
        assert!(!Topic::SENSORS.contains(&Topic::JointCommands));
        assert_eq!(Topic::SENSORS.len(), 4);
    }
}
