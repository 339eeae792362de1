//! NATS-backed bus. Channel names are used verbatim as subjects.

use futures_util::StreamExt;
use futures_util::stream::{SelectAll, select_all};

use super::{Bus, BusEvent, Subscription};
use crate::error::{ClientError, ClientResult};

#[derive(Clone, Debug)]
pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    /// Connects to the broker at `host:port`.
    pub async fn connect(host: &str, port: u16) -> ClientResult<Self> {
        let url = format!("nats://{host}:{port}");
        let client = async_nats::connect(url.as_str()).await.map_err(|err| {
            ClientError::transport(format!("Unable to connect to message bus at {url}: {err}"))
        })?;
        tracing::debug!(%url, "connected to message bus");
        Ok(Self { client })
    }
}

impl Bus for NatsBus {
    type Subscription = NatsSubscription;

    async fn subscribe(&self, channels: Vec<String>) -> ClientResult<NatsSubscription> {
        let mut subscribers = Vec::with_capacity(channels.len());
        for channel in channels {
            let subscriber = self.client.subscribe(channel.clone()).await.map_err(|err| {
                ClientError::subscription(format!("subscribe to {channel} failed: {err}"))
            })?;
            subscribers.push(subscriber);
        }
        Ok(NatsSubscription {
            subscribers: select_all(subscribers),
        })
    }
}

/// All subscribers of one subscription set, merged into one stream.
pub struct NatsSubscription {
    subscribers: SelectAll<async_nats::Subscriber>,
}

impl Subscription for NatsSubscription {
    async fn next_event(&mut self) -> ClientResult<Option<BusEvent>> {
        Ok(self.subscribers.next().await.map(|message| BusEvent::Message {
            channel: message.subject.to_string(),
            payload: String::from_utf8_lossy(&message.payload).into_owned(),
        }))
    }

    async fn unsubscribe(self) -> ClientResult<()> {
        for mut subscriber in self.subscribers {
            subscriber
                .unsubscribe()
                .await
                .map_err(|err| ClientError::subscription(format!("unsubscribe failed: {err}")))?;
        }
        Ok(())
    }
}
