//! In-process bus backed by a tokio broadcast channel.
//!
//! Behaves like a broker that acknowledges subscriptions, so the relay's
//! acknowledgement filtering is exercised without a network.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use super::{Bus, BusEvent, Subscription};
use crate::error::{ClientError, ClientResult};

const DEFAULT_BUFFER: usize = 1024;

#[derive(Debug, Clone)]
struct Published {
    channel: String,
    payload: String,
}

/// Shared in-process bus. Cloning is not supported; share it behind an `Arc`.
#[derive(Debug)]
pub struct MemoryBus {
    sender: Mutex<Option<broadcast::Sender<Published>>>,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_BUFFER);
        Self {
            sender: Mutex::new(Some(sender)),
        }
    }

    fn sender(&self) -> MutexGuard<'_, Option<broadcast::Sender<Published>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes a payload. Returns how many live subscriptions received it.
    pub fn publish(&self, channel: &str, payload: &str) -> usize {
        let guard = self.sender();
        let Some(sender) = guard.as_ref() else {
            return 0;
        };
        sender
            .send(Published {
                channel: channel.to_string(),
                payload: payload.to_string(),
            })
            .unwrap_or(0)
    }

    /// Number of live subscriptions (subscribed and not yet dropped).
    pub fn subscription_count(&self) -> usize {
        self.sender()
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Simulates losing the broker: open subscriptions end, new ones fail.
    pub fn close(&self) {
        self.sender().take();
    }
}

impl Bus for MemoryBus {
    type Subscription = MemorySubscription;

    async fn subscribe(&self, channels: Vec<String>) -> ClientResult<MemorySubscription> {
        let rx = self
            .sender()
            .as_ref()
            .map(broadcast::Sender::subscribe)
            .ok_or_else(|| ClientError::transport("Memory bus is closed"))?;

        let pending = channels
            .iter()
            .map(|channel| BusEvent::Subscribed {
                channel: channel.clone(),
            })
            .collect();

        Ok(MemorySubscription {
            rx,
            channels: channels.into_iter().collect(),
            pending,
        })
    }
}

/// Subscription on a [`MemoryBus`].
#[derive(Debug)]
pub struct MemorySubscription {
    rx: broadcast::Receiver<Published>,
    channels: HashSet<String>,
    pending: VecDeque<BusEvent>,
}

impl Subscription for MemorySubscription {
    async fn next_event(&mut self) -> ClientResult<Option<BusEvent>> {
        if let Some(ack) = self.pending.pop_front() {
            return Ok(Some(ack));
        }

        loop {
            match self.rx.recv().await {
                Ok(published) if self.channels.contains(&published.channel) => {
                    return Ok(Some(BusEvent::Message {
                        channel: published.channel,
                        payload: published.payload,
                    }));
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "memory bus subscription lagged");
                }
                Err(RecvError::Closed) => return Ok(None),
            }
        }
    }

    async fn unsubscribe(self) -> ClientResult<()> {
        drop(self.rx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_acks_then_filters_by_channel() {
        let bus = MemoryBus::new();
        let mut sub = bus
            .subscribe(vec!["system".to_string(), "player:1".to_string()])
            .await
            .unwrap();

        assert!(matches!(
            sub.next_event().await.unwrap(),
            Some(BusEvent::Subscribed { .. })
        ));
        assert!(matches!(
            sub.next_event().await.unwrap(),
            Some(BusEvent::Subscribed { .. })
        ));

        bus.publish("room:Elsewhere", "ignored");
        bus.publish("player:1", "hello");

        assert_eq!(
            sub.next_event().await.unwrap(),
            Some(BusEvent::Message {
                channel: "player:1".to_string(),
                payload: "hello".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_close_ends_subscription_and_rejects_new_ones() {
        let bus = MemoryBus::new();
        let mut sub = bus.subscribe(Vec::new()).await.unwrap();
        assert_eq!(bus.subscription_count(), 1);

        bus.close();

        assert_eq!(sub.next_event().await.unwrap(), None);
        let err = bus.subscribe(Vec::new()).await.unwrap_err();
        assert_eq!(err.kind, crate::error::ClientErrorKind::TransportFailure);
    }

    #[tokio::test]
    async fn test_unsubscribe_releases_receiver() {
        let bus = MemoryBus::new();
        let sub = bus.subscribe(vec!["system".to_string()]).await.unwrap();
        assert_eq!(bus.subscription_count(), 1);
        sub.unsubscribe().await.unwrap();
        assert_eq!(bus.subscription_count(), 0);
    }
}
