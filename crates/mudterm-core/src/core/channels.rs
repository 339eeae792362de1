//! Session/channel manager: which bus channels the current player listens to.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::relay::{Relay, RelayEvent, SubscriptionTarget};
use super::transcript::Category;
use crate::bus::{self, Bus};

/// The channels one player is subscribed to: their own, the system channel,
/// and (when known) their current room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSet {
    player_channel: String,
    system_channel: String,
    room_channel: Option<String>,
}

impl SubscriptionSet {
    pub fn for_player(player_id: &str) -> Self {
        Self {
            player_channel: bus::player_channel(player_id),
            system_channel: bus::SYSTEM_CHANNEL.to_string(),
            room_channel: None,
        }
    }

    /// Replaces the room channel. `None` or a blank name leaves the set without one.
    #[must_use]
    pub fn with_room(mut self, room_name: Option<&str>) -> Self {
        self.room_channel = room_name.and_then(bus::room_channel);
        self
    }

    pub fn player_channel(&self) -> &str {
        &self.player_channel
    }

    pub fn system_channel(&self) -> &str {
        &self.system_channel
    }

    pub fn room_channel(&self) -> Option<&str> {
        self.room_channel.as_deref()
    }

    pub fn channels(&self) -> Vec<String> {
        let mut channels = vec![self.player_channel.clone(), self.system_channel.clone()];
        channels.extend(self.room_channel.clone());
        channels
    }

    /// Transcript category for a message that arrived on `channel`, or `None`
    /// if the channel is not part of this set.
    pub fn category_for(&self, channel: &str) -> Option<Category> {
        if channel == self.player_channel {
            Some(Category::Private)
        } else if channel == self.system_channel {
            Some(Category::System)
        } else if self.room_channel.as_deref() == Some(channel) {
            Some(Category::Room)
        } else {
            None
        }
    }
}

/// Owns the player identity, the current subscription set and the relay worker.
///
/// Every recompute of the set bumps `generation`; the relay stamps inbound
/// messages with the generation they were received under.
pub struct ChannelManager<B: Bus> {
    relay: Relay<B>,
    player_id: Option<String>,
    room: Option<String>,
    set: Option<SubscriptionSet>,
    generation: u64,
}

impl<B: Bus> ChannelManager<B> {
    pub fn new(bus: Arc<B>, outbox: mpsc::Sender<RelayEvent>, poll_interval: Duration) -> Self {
        Self {
            relay: Relay::new(bus, outbox, poll_interval),
            player_id: None,
            room: None,
            set: None,
            generation: 0,
        }
    }

    /// Establishes the baseline subscriptions `{player:<id>, system}` and
    /// starts the relay. Any previous room is forgotten.
    pub fn set_identity(&mut self, player_id: &str) {
        self.player_id = Some(player_id.to_string());
        self.room = None;
        self.apply(SubscriptionSet::for_player(player_id));
    }

    /// Recomputes the set with the channel for `room_name` and resubscribes.
    ///
    /// A missing or blank room name omits the room channel. Without an identity
    /// this is a no-op.
    pub fn update_room(&mut self, room_name: Option<&str>) {
        let Some(player_id) = self.player_id.as_deref() else {
            tracing::debug!("update_room ignored: no identity");
            return;
        };
        let room = room_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        let set = SubscriptionSet::for_player(player_id).with_room(room.as_deref());
        self.room = room;
        self.apply(set);
    }

    /// Drops the identity and subscriptions and stops the relay.
    pub fn clear_identity(&mut self) {
        self.player_id = None;
        self.room = None;
        self.set = None;
        self.generation += 1;
        self.relay.retarget(None);
        self.relay.stop();
    }

    /// Starts the relay if it is not running (e.g. after it stopped on a bus error).
    pub fn ensure_relay(&mut self) -> bool {
        self.relay.start()
    }

    /// Stops the relay and waits for it to unsubscribe.
    pub async fn shutdown(&mut self) {
        self.relay.shutdown().await;
    }

    fn apply(&mut self, set: SubscriptionSet) {
        self.generation += 1;
        tracing::debug!(
            generation = self.generation,
            channels = ?set.channels(),
            "subscription set updated"
        );
        self.relay.retarget(Some(SubscriptionTarget {
            set: set.clone(),
            generation: self.generation,
        }));
        self.set = Some(set);
        self.relay.start();
    }

    pub fn player_id(&self) -> Option<&str> {
        self.player_id.as_deref()
    }

    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    pub fn subscription_set(&self) -> Option<&SubscriptionSet> {
        self.set.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn relay_running(&self) -> bool {
        self.relay.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryBus;
    use crate::core::relay::handoff_queue;

    fn manager() -> (ChannelManager<MemoryBus>, mpsc::Receiver<RelayEvent>) {
        let (tx, rx) = handoff_queue(8);
        let manager = ChannelManager::new(
            Arc::new(MemoryBus::new()),
            tx,
            Duration::from_millis(10),
        );
        (manager, rx)
    }

    #[test]
    fn test_subscription_set_channels() {
        let set = SubscriptionSet::for_player("42").with_room(Some("Engine Room"));
        assert_eq!(
            set.channels(),
            vec!["player:42", "system", "room:Engine_Room"]
        );
        assert_eq!(set.category_for("player:42"), Some(Category::Private));
        assert_eq!(set.category_for("system"), Some(Category::System));
        assert_eq!(set.category_for("room:Engine_Room"), Some(Category::Room));
        assert_eq!(set.category_for("room:Bridge"), None);
    }

    #[tokio::test]
    async fn test_set_identity_establishes_baseline() {
        let (mut manager, _rx) = manager();
        manager.set_identity("42");

        let set = manager.subscription_set().unwrap();
        assert_eq!(set.channels(), vec!["player:42", "system"]);
        assert_eq!(set.room_channel(), None);
        assert!(manager.relay_running());
    }

    #[tokio::test]
    async fn test_update_room_is_idempotent() {
        let (mut manager, _rx) = manager();
        manager.set_identity("42");

        manager.update_room(Some("Engine Room"));
        let once = manager.subscription_set().cloned();
        manager.update_room(Some("Engine Room"));
        let twice = manager.subscription_set().cloned();

        assert_eq!(once, twice);
        assert_eq!(
            twice.unwrap().room_channel(),
            Some("room:Engine_Room")
        );
        assert_eq!(manager.room(), Some("Engine Room"));
        assert!(manager.relay_running());
    }

    #[tokio::test]
    async fn test_update_room_replaces_previous_room() {
        let (mut manager, _rx) = manager();
        manager.set_identity("1");
        manager.update_room(Some("Bridge"));
        let before = manager.generation();
        manager.update_room(Some("Cargo Bay"));

        let set = manager.subscription_set().unwrap();
        assert_eq!(set.channels(), vec!["player:1", "system", "room:Cargo_Bay"]);
        assert!(manager.generation() > before);
    }

    #[tokio::test]
    async fn test_unknown_room_omits_room_channel() {
        let (mut manager, _rx) = manager();
        manager.set_identity("1");
        manager.update_room(Some("Bridge"));
        manager.update_room(None);
        assert_eq!(manager.subscription_set().unwrap().room_channel(), None);

        manager.update_room(Some("   "));
        assert_eq!(manager.subscription_set().unwrap().room_channel(), None);
        assert_eq!(manager.room(), None);
    }

    #[tokio::test]
    async fn test_update_room_without_identity_is_noop() {
        let (mut manager, _rx) = manager();
        manager.update_room(Some("Bridge"));
        assert!(manager.subscription_set().is_none());
        assert!(!manager.relay_running());
    }

    #[tokio::test]
    async fn test_clear_identity_stops_relay() {
        let (mut manager, _rx) = manager();
        manager.set_identity("1");
        manager.clear_identity();
        assert!(manager.player_id().is_none());
        assert!(manager.subscription_set().is_none());
        assert!(!manager.relay_running());
    }
}
