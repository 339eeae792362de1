//! Publish/subscribe bus abstraction.
//!
//! The relay only needs two things from a broker: subscribe to a set of
//! channels, and pull the next event from that subscription. `nats` talks to a
//! real broker; `memory` is an in-process bus for tests and local runs.

use std::future::Future;

use crate::error::ClientResult;

pub mod memory;
pub mod nats;

pub use memory::{MemoryBus, MemorySubscription};
pub use nats::{NatsBus, NatsSubscription};

/// Channel that carries server-wide announcements.
pub const SYSTEM_CHANNEL: &str = "system";

/// Delimiter that replaces whitespace in room channel names.
pub const ROOM_NAME_DELIMITER: char = '_';

/// Returns the channel for messages addressed to one player.
pub fn player_channel(player_id: &str) -> String {
    format!("player:{player_id}")
}

/// Returns the channel for a room, e.g. `"Engine Room"` -> `room:Engine_Room`.
///
/// Returns `None` if the name is blank.
pub fn room_channel(room_name: &str) -> Option<String> {
    let trimmed = room_name.trim();
    if trimmed.is_empty() {
        return None;
    }
    let token: String = trimmed
        .chars()
        .map(|c| if c.is_whitespace() { ROOM_NAME_DELIMITER } else { c })
        .collect();
    Some(format!("room:{token}"))
}

/// An event read from a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// Broker acknowledged a subscription.
    Subscribed { channel: String },
    /// Broker acknowledged an unsubscription.
    Unsubscribed { channel: String },
    /// A data message published on `channel`.
    Message { channel: String, payload: String },
}

/// A broker the relay can subscribe to.
pub trait Bus: Send + Sync + 'static {
    type Subscription: Subscription;

    /// Subscribes to every channel in `channels` as one subscription.
    fn subscribe(
        &self,
        channels: Vec<String>,
    ) -> impl Future<Output = ClientResult<Self::Subscription>> + Send;
}

/// A live subscription to a set of channels.
pub trait Subscription: Send + 'static {
    /// Waits for the next event.
    ///
    /// Returns `Ok(None)` once the broker connection is closed. Must be
    /// cancel-safe: the relay drops this future when its poll interval elapses.
    fn next_event(&mut self) -> impl Future<Output = ClientResult<Option<BusEvent>>> + Send;

    /// Unsubscribes from every channel.
    fn unsubscribe(self) -> impl Future<Output = ClientResult<()>> + Send;
}
