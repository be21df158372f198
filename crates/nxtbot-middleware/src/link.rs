//! rosbridge WebSocket link to the NXT gateway host.
//!
//! This module provides [`RosbridgeLink`], which:
//!
//! 1. **Advertises** the `joint_command` topic and forwards every event on
//!    the bus's [`Topic::JointCommands`] lane to the rosbridge server as a
//!    JSON `publish` frame.
//!
//! 2. **Subscribes** to the four NXT sensor topics and republishes incoming
//!    frames onto the matching bus lane as typed [`Event`] values.
//!
//! The link is intentionally agnostic about the *meaning* of the data it
//! routes; it only handles serialisation and transport.  Readiness is
//! signalled through a [`watch`] flag that flips to `true` once the
//! advertise/subscribe handshake has gone out, and back to `false` when the
//! socket drops.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use nxtbot_types::{Event, EventPayload, JointCommand, NxtError};
use serde_json::json;
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::bus::{EventBus, Topic};

/// ROS message type advertised or subscribed for a given lane.
fn ros_type(topic: Topic) -> &'static str {
    match topic {
        Topic::JointCommands => "nxt_msgs/JointCommand",
        Topic::TouchSensor => "nxt_msgs/Contact",
        Topic::UltrasonicSensor => "nxt_msgs/Range",
        Topic::IntensitySensor | Topic::ColorSensor => "nxt_msgs/Color",
    }
}

/// WebSocket client bridging the internal [`EventBus`] and a
/// `rosbridge_server`-compatible endpoint on the NXT gateway host.
pub struct RosbridgeLink {
    bus: Arc<EventBus>,
    /// `ws://host:port` of the gateway's rosbridge endpoint.
    url: String,
    ready_tx: watch::Sender<bool>,
    ready_rx: watch::Receiver<bool>,
}

impl RosbridgeLink {
    /// Create a new link backed by `bus`.
    ///
    /// `url` should be the WebSocket URL of the gateway's `rosbridge_server`
    /// (e.g. `"ws://localhost:9090"`).  Nothing is connected until
    /// [`run`](Self::run) is awaited.
    pub fn new(bus: Arc<EventBus>, url: impl Into<String>) -> Self {
        let (ready_tx, ready_rx) = watch::channel(false);
        Self {
            bus,
            url: url.into(),
            ready_tx,
            ready_rx,
        }
    }

    /// Return the rosbridge URL this link is configured to use.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Hand out a receiver for the readiness flag.
    ///
    /// The flag is `false` until the advertise/subscribe handshake has been
    /// sent, and drops back to `false` when the socket closes.
    pub fn ready(&self) -> watch::Receiver<bool> {
        self.ready_rx.clone()
    }

    // -----------------------------------------------------------------------
    // Frame builders
    // -----------------------------------------------------------------------

    /// Build the rosbridge frame that advertises the `joint_command` topic.
    pub fn build_advertise_frame() -> String {
        json!({
            "op": "advertise",
            "topic": Topic::JointCommands.ros_name(),
            "type": ros_type(Topic::JointCommands)
        })
        .to_string()
    }

    /// Build the rosbridge frame that subscribes to a sensor `topic`.
    pub fn build_subscribe_frame(topic: Topic) -> String {
        json!({
            "op": "subscribe",
            "topic": topic.ros_name(),
            "type": ros_type(topic)
        })
        .to_string()
    }

    /// Build the rosbridge `publish` frame for an outgoing motor command.
    pub fn build_publish_frame(cmd: &JointCommand) -> String {
        json!({
            "op": "publish",
            "topic": Topic::JointCommands.ros_name(),
            "msg": {
                "name": cmd.name,
                "effort": cmd.effort
            }
        })
        .to_string()
    }

    // -----------------------------------------------------------------------
    // Inbound frames
    // -----------------------------------------------------------------------

    /// Parse an incoming rosbridge text frame and publish it onto the bus.
    ///
    /// Only `op: "publish"` frames on one of the four sensor topics are
    /// accepted; the `msg` object is deserialised into the matching typed
    /// payload.  Returns the lane the event was published to, or `None` for
    /// frames that were ignored (unknown topic, non-publish op, malformed
    /// `msg`); every ignored frame is logged at debug level.  Sensor messages
    /// may carry extra fields such as headers or range limits; those are
    /// skipped during deserialisation.
    pub fn ingest_frame(&self, text: &str) -> Option<Topic> {
        let Ok(frame) = serde_json::from_str::<serde_json::Value>(text) else {
            debug!("dropping non-json ws frame");
            return None;
        };

        let op = frame.get("op").and_then(|o| o.as_str());
        if op != Some("publish") {
            debug!(op = op.unwrap_or("none"), "ignoring non-publish ws frame");
            return None;
        }
        let Some(name) = frame.get("topic").and_then(|t| t.as_str()) else {
            debug!("dropping publish frame without a topic");
            return None;
        };
        let Some(topic) = Topic::from_ros_name(name) else {
            debug!(topic = name, "ignoring publish on an unknown topic");
            return None;
        };
        let Some(msg) = frame.get("msg").cloned() else {
            debug!(topic = name, "dropping publish frame without a msg");
            return None;
        };

        let parsed = match topic {
            Topic::TouchSensor => serde_json::from_value(msg).map(EventPayload::Contact),
            Topic::UltrasonicSensor => serde_json::from_value(msg).map(EventPayload::Range),
            Topic::IntensitySensor => serde_json::from_value(msg).map(EventPayload::Intensity),
            Topic::ColorSensor => serde_json::from_value(msg).map(EventPayload::Color),
            // Echoes of our own command topic are not sensor data.
            Topic::JointCommands => {
                debug!("ignoring echo of the command topic");
                return None;
            }
        };
        let payload = match parsed {
            Ok(payload) => payload,
            Err(e) => {
                debug!(topic = name, error = %e, "dropping sensor frame with a malformed msg");
                return None;
            }
        };

        let source = format!("nxtbot-middleware::rosbridge/{}", topic.ros_name());
        self.bus.publish_to(topic, Event::new(source, payload));
        Some(topic)
    }

    // -----------------------------------------------------------------------
    // Connection pump
    // -----------------------------------------------------------------------

    /// Connect to the rosbridge endpoint and pump frames until the socket
    /// closes.
    ///
    /// On connect the link advertises `joint_command`, subscribes to every
    /// sensor topic, and flips the readiness flag.  From then on it forwards
    /// bus commands out and ingests sensor frames in.  The readiness flag is
    /// cleared on any exit path.
    ///
    /// # Errors
    ///
    /// Returns [`NxtError::Transport`] if the connection cannot be
    /// established or drops while the bus is still alive.
    pub async fn run(self) -> Result<(), NxtError> {
        info!(url = %self.url, "connecting to rosbridge");
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| NxtError::Transport(format!("connect to {}: {e}", self.url)))?;
        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        ws_tx
            .send(Message::Text(Self::build_advertise_frame().into()))
            .await
            .map_err(|e| NxtError::Transport(format!("advertise: {e}")))?;
        for topic in Topic::SENSORS {
            ws_tx
                .send(Message::Text(Self::build_subscribe_frame(topic).into()))
                .await
                .map_err(|e| NxtError::Transport(format!("subscribe {}: {e}", topic.ros_name())))?;
        }
        self.ready_tx.send_replace(true);
        info!(url = %self.url, "rosbridge link ready");

        let mut commands = self.bus.subscribe_to(Topic::JointCommands);
        let result = loop {
            tokio::select! {
                // Forward motor commands from the bus to the gateway host.
                cmd = commands.recv() => {
                    match cmd {
                        Ok(event) => {
                            if let EventPayload::JointCommand(cmd) = event.payload {
                                let frame = Self::build_publish_frame(&cmd);
                                if let Err(e) = ws_tx.send(Message::Text(frame.into())).await {
                                    break Err(NxtError::Transport(format!("ws send: {e}")));
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(lagged_by = n, "command subscriber lagged, motor commands dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => break Ok(()),
                    }
                }
                // Ingest sensor frames from the gateway host.
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.ingest_frame(text.as_str());
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            break Err(NxtError::Transport(
                                "rosbridge closed the connection".to_string(),
                            ));
                        }
                        Some(Err(e)) => break Err(NxtError::Transport(format!("ws receive: {e}"))),
                        _ => {}
                    }
                }
            }
        };
        self.ready_tx.send_replace(false);
        result
    }
}
