//! Inbound relay: one background task that drains the bus into a bounded queue.
//!
//! The worker owns the bus subscription. It learns what to subscribe to from a
//! `watch` channel and reports back only through the hand-off queue. Every
//! forwarded message carries the generation of the subscription it arrived on,
//! so the consumer can drop anything received under a superseded set.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::channels::SubscriptionSet;
use crate::bus::{Bus, BusEvent, Subscription};

/// How long the worker waits on the bus before re-checking for stop/retarget.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default capacity of the hand-off queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// The subscription set the worker should hold, stamped with a generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionTarget {
    pub set: SubscriptionSet,
    pub generation: u64,
}

/// Raw payload received from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub channel: String,
    pub payload: String,
    /// Generation of the subscription set the message was received under.
    pub generation: u64,
}

/// What the worker hands to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    Message(InboundMessage),
    /// The worker hit a bus error and exited.
    Failed { generation: u64, reason: String },
}

/// Creates the hand-off queue shared by the relay (producer) and the session (consumer).
pub fn handoff_queue(capacity: usize) -> (mpsc::Sender<RelayEvent>, mpsc::Receiver<RelayEvent>) {
    mpsc::channel(capacity.max(1))
}

struct Worker {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Handle to the (at most one) relay worker of a session.
pub struct Relay<B: Bus> {
    bus: Arc<B>,
    poll_interval: Duration,
    outbox: mpsc::Sender<RelayEvent>,
    targets: watch::Sender<Option<SubscriptionTarget>>,
    worker: Option<Worker>,
}

impl<B: Bus> Relay<B> {
    pub fn new(bus: Arc<B>, outbox: mpsc::Sender<RelayEvent>, poll_interval: Duration) -> Self {
        let (targets, _) = watch::channel(None);
        Self {
            bus,
            poll_interval,
            outbox,
            targets,
            worker: None,
        }
    }

    /// Replaces the subscription target. A running worker unsubscribes from the
    /// previous set and subscribes to the new one on its next iteration.
    pub fn retarget(&self, target: Option<SubscriptionTarget>) {
        self.targets.send_replace(target);
    }

    /// Current target, if any.
    pub fn target(&self) -> Option<SubscriptionTarget> {
        self.targets.borrow().clone()
    }

    /// Returns true while a worker is live and has not been asked to stop.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| !w.cancel.is_cancelled() && !w.handle.is_finished())
    }

    /// Starts the worker. No-op (returns false) if one is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        if let Some(previous) = self.worker.take() {
            // Stopped workers exit on their own within one poll interval;
            // abort so two never overlap.
            previous.cancel.cancel();
            previous.handle.abort();
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_worker(
            Arc::clone(&self.bus),
            self.targets.subscribe(),
            self.outbox.clone(),
            cancel.clone(),
            self.poll_interval,
        ));
        self.worker = Some(Worker { handle, cancel });
        tracing::debug!("relay worker started");
        true
    }

    /// Asks the worker to stop. Cooperative: it exits within one poll interval.
    pub fn stop(&mut self) {
        if let Some(worker) = &self.worker {
            worker.cancel.cancel();
        }
    }

    /// Stops the worker and waits for it to unsubscribe and exit.
    pub async fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.cancel.cancel();
            if let Err(err) = worker.handle.await
                && err.is_panic()
            {
                tracing::warn!("relay worker panicked during shutdown");
            }
        }
    }
}

impl<B: Bus> Drop for Relay<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn forward(
    outbox: &mpsc::Sender<RelayEvent>,
    cancel: &CancellationToken,
    event: RelayEvent,
) -> bool {
    tokio::select! {
        () = cancel.cancelled() => false,
        sent = outbox.send(event) => sent.is_ok(),
    }
}

async fn run_worker<B: Bus>(
    bus: Arc<B>,
    mut targets: watch::Receiver<Option<SubscriptionTarget>>,
    outbox: mpsc::Sender<RelayEvent>,
    cancel: CancellationToken,
    poll_interval: Duration,
) {
    let mut active: Option<(B::Subscription, u64)> = None;
    let mut first_pass = true;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let Ok(changed) = targets.has_changed() else {
            // Relay handle dropped.
            break;
        };
        if changed || first_pass {
            first_pass = false;
            let target = targets.borrow_and_update().clone();

            if let Some((subscription, generation)) = active.take()
                && let Err(err) = subscription.unsubscribe().await
            {
                tracing::warn!(generation, error = %err, "relay unsubscribe failed");
            }

            if let Some(target) = target {
                match bus.subscribe(target.set.channels()).await {
                    Ok(subscription) => {
                        tracing::debug!(
                            generation = target.generation,
                            channels = ?target.set.channels(),
                            "relay subscribed"
                        );
                        active = Some((subscription, target.generation));
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "relay subscribe failed, stopping");
                        let failed = RelayEvent::Failed {
                            generation: target.generation,
                            reason: err.message,
                        };
                        forward(&outbox, &cancel, failed).await;
                        break;
                    }
                }
            }
        }

        let Some((subscription, generation)) = active.as_mut() else {
            tokio::time::sleep(poll_interval).await;
            continue;
        };
        let generation = *generation;

        match tokio::time::timeout(poll_interval, subscription.next_event()).await {
            Err(_elapsed) => {}
            Ok(Ok(Some(BusEvent::Message { channel, payload }))) => {
                let message = RelayEvent::Message(InboundMessage {
                    channel,
                    payload,
                    generation,
                });
                if !forward(&outbox, &cancel, message).await {
                    break;
                }
            }
            Ok(Ok(Some(ack))) => {
                tracing::trace!(?ack, "relay ignoring acknowledgement");
            }
            Ok(Ok(None)) => {
                tracing::warn!(generation, "message bus connection closed, relay stopping");
                let failed = RelayEvent::Failed {
                    generation,
                    reason: "Message bus connection closed".to_string(),
                };
                forward(&outbox, &cancel, failed).await;
                break;
            }
            Ok(Err(err)) => {
                tracing::warn!(generation, error = %err, "message bus error, relay stopping");
                let failed = RelayEvent::Failed {
                    generation,
                    reason: err.message,
                };
                forward(&outbox, &cancel, failed).await;
                break;
            }
        }
    }

    if let Some((subscription, generation)) = active.take()
        && let Err(err) = subscription.unsubscribe().await
    {
        tracing::debug!(generation, error = %err, "relay unsubscribe on exit failed");
    }
    tracing::debug!("relay worker exited");
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::bus::MemoryBus;

    const POLL: Duration = Duration::from_millis(10);

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met in time");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn recv(rx: &mut mpsc::Receiver<RelayEvent>) -> RelayEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("relay event in time")
            .expect("queue open")
    }

    fn target(player: &str, room: Option<&str>, generation: u64) -> SubscriptionTarget {
        SubscriptionTarget {
            set: SubscriptionSet::for_player(player).with_room(room),
            generation,
        }
    }

    fn setup() -> (Arc<MemoryBus>, Relay<MemoryBus>, mpsc::Receiver<RelayEvent>) {
        let bus = Arc::new(MemoryBus::new());
        let (tx, rx) = handoff_queue(16);
        let relay = Relay::new(Arc::clone(&bus), tx, POLL);
        (bus, relay, rx)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_twice_keeps_one_worker() {
        let (bus, mut relay, mut rx) = setup();
        relay.retarget(Some(target("7", None, 1)));

        assert!(relay.start());
        wait_until(|| bus.subscription_count() == 1).await;
        assert!(!relay.start());
        assert!(relay.is_running());

        tokio::time::sleep(POLL * 5).await;
        assert_eq!(bus.subscription_count(), 1);

        bus.publish("player:7", "you feel watched");
        let event = recv(&mut rx).await;
        assert_eq!(
            event,
            RelayEvent::Message(InboundMessage {
                channel: "player:7".to_string(),
                payload: "you feel watched".to_string(),
                generation: 1,
            })
        );
        tokio::time::sleep(POLL * 3).await;
        assert!(rx.try_recv().is_err(), "message must be delivered once");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_acknowledgements_are_not_forwarded() {
        let (bus, mut relay, mut rx) = setup();
        relay.retarget(Some(target("1", Some("Bridge"), 3)));
        relay.start();
        wait_until(|| bus.subscription_count() == 1).await;

        bus.publish("room:Bridge", "The captain nods.");
        match recv(&mut rx).await {
            RelayEvent::Message(msg) => {
                assert_eq!(msg.channel, "room:Bridge");
                assert_eq!(msg.generation, 3);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_retarget_resubscribes_with_new_generation() {
        let (bus, mut relay, mut rx) = setup();
        relay.retarget(Some(target("1", Some("Bridge"), 1)));
        relay.start();
        wait_until(|| bus.subscription_count() == 1).await;

        relay.retarget(Some(target("1", Some("Engine Room"), 2)));

        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            bus.publish("room:Engine_Room", "The engines hum.");
            match tokio::time::timeout(POLL * 2, rx.recv()).await {
                Ok(Some(RelayEvent::Message(msg))) if msg.channel == "room:Engine_Room" => {
                    assert_eq!(msg.generation, 2);
                    break;
                }
                _ => assert!(Instant::now() < deadline, "never resubscribed"),
            }
        }
        assert_eq!(bus.subscription_count(), 1);

        tokio::time::sleep(POLL * 3).await;
        while rx.try_recv().is_ok() {}
        bus.publish("room:Bridge", "stale");
        tokio::time::sleep(POLL * 5).await;
        while let Ok(event) = rx.try_recv() {
            if let RelayEvent::Message(msg) = event {
                assert_ne!(msg.channel, "room:Bridge");
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_is_cooperative_and_unsubscribes() {
        let (bus, mut relay, _rx) = setup();
        relay.retarget(Some(target("1", None, 1)));
        relay.start();
        wait_until(|| bus.subscription_count() == 1).await;

        relay.stop();
        assert!(!relay.is_running());
        wait_until(|| bus.subscription_count() == 0).await;

        assert!(relay.start());
        wait_until(|| bus.subscription_count() == 1).await;
        relay.shutdown().await;
        assert_eq!(bus.subscription_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_transport_loss_reports_failure_and_exits() {
        let (bus, mut relay, mut rx) = setup();
        relay.retarget(Some(target("1", None, 4)));
        relay.start();
        wait_until(|| bus.subscription_count() == 1).await;

        bus.close();

        match recv(&mut rx).await {
            RelayEvent::Failed { generation, reason } => {
                assert_eq!(generation, 4);
                assert!(reason.contains("closed"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        wait_until(|| !relay.is_running()).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_subscribe_failure_reports_and_exits() {
        let (bus, mut relay, mut rx) = setup();
        bus.close();
        relay.retarget(Some(target("1", None, 9)));
        relay.start();

        assert!(matches!(
            recv(&mut rx).await,
            RelayEvent::Failed { generation: 9, .. }
        ));
        wait_until(|| !relay.is_running()).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_idle_without_target() {
        let (bus, mut relay, _rx) = setup();
        relay.start();
        tokio::time::sleep(POLL * 3).await;
        assert!(relay.is_running());
        assert_eq!(bus.subscription_count(), 0);
        assert_eq!(relay.target(), None);
    }
}
