//! `nxtbot-middleware` – The Nervous System
//!
//! Routes asynchronous data between the control programs and the NXT gateway
//! host without caring about the data's meaning.
//!
//! # Modules
//!
//! - [`bus`] – Headless, typed, topic-based publish/subscribe event bus built
//!   on Tokio broadcast channels.
//! - [`link`] – rosbridge WebSocket client that carries motor commands out to
//!   the gateway host and sensor frames back in.

pub mod bus;
pub mod link;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use link::RosbridgeLink;
