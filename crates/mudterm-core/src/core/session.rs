//! Game session: the transcript plus everything that feeds it.
//!
//! Two paths append to the transcript: command results (foreground, after
//! each `send`) and relay messages (drained by `poll_relay` on every UI tick).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TryRecvError};

use super::format::format_command_output;
use super::gateway::CommandGateway;
use super::relay::{self, InboundMessage, RelayEvent};
use super::transcript::{Category, Transcript};
use crate::api::{CommandResult, GameServerClient};
use crate::bus::Bus;
use crate::error::ClientResult;

const UNKNOWN_ERROR: &str = "Unknown error occurred";

/// Tunables for a session.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub max_messages: usize,
    pub poll_interval: Duration,
    pub queue_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            max_messages: Transcript::DEFAULT_CAPACITY,
            poll_interval: relay::DEFAULT_POLL_INTERVAL,
            queue_capacity: relay::DEFAULT_QUEUE_CAPACITY,
        }
    }
}

pub struct GameSession<B: Bus> {
    transcript: Transcript,
    gateway: CommandGateway<B>,
    inbox: mpsc::Receiver<RelayEvent>,
    /// Generation whose relay failure is already in the transcript.
    reported_failure: Option<u64>,
}

impl<B: Bus> GameSession<B> {
    pub fn new(client: GameServerClient, bus: Arc<B>, options: SessionOptions) -> Self {
        let (outbox, inbox) = relay::handoff_queue(options.queue_capacity);
        Self {
            transcript: Transcript::new(options.max_messages),
            gateway: CommandGateway::new(client, bus, outbox, options.poll_interval),
            inbox,
            reported_failure: None,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn clear_transcript(&mut self) {
        self.transcript.clear();
    }

    pub fn gateway(&self) -> &CommandGateway<B> {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut CommandGateway<B> {
        &mut self.gateway
    }

    /// Joins the game. The welcome message (or the failure) is appended.
    pub async fn join(&mut self, player_id: &str, user_id: &str) -> ClientResult<String> {
        match self.gateway.join(player_id, user_id).await {
            Ok(welcome) => {
                if !welcome.trim().is_empty() {
                    self.transcript.append(welcome.clone(), Category::System);
                }
                Ok(welcome)
            }
            Err(err) => {
                self.transcript.append(err.message.clone(), Category::Error);
                Err(err)
            }
        }
    }

    /// Sends a command and appends its result.
    ///
    /// `NotConnected` is returned to the caller and leaves the transcript
    /// untouched.
    pub async fn send(&mut self, command: &str) -> ClientResult<CommandResult> {
        let result = self.gateway.send(command).await?;
        self.record_result(command, &result);
        Ok(result)
    }

    fn record_result(&mut self, command: &str, result: &CommandResult) {
        if let Some(private) = result.private_text() {
            let text = format_command_output(command, private);
            self.transcript.append(text, Category::Private);
        }
        if let Some(room) = result.room_text() {
            self.transcript.append(room, Category::Room);
        }
        match (result.message_text(), result.success) {
            (Some(message), true) => self.transcript.append(message, Category::System),
            (Some(message), false) => self.transcript.append(message, Category::Error),
            (None, false) if result.private_text().is_none() && result.room_text().is_none() => {
                self.transcript.append(UNKNOWN_ERROR, Category::Error);
            }
            (None, _) => {}
        }
    }

    /// Drains the relay hand-off queue into the transcript. Never blocks.
    ///
    /// Messages received under a superseded subscription set are dropped. A
    /// relay failure is reported once per subscription generation, so restarts
    /// against a bus that is still down stay quiet.
    /// Returns how many entries were appended.
    pub fn poll_relay(&mut self) -> usize {
        let mut appended = 0;
        loop {
            let event = match self.inbox.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            };
            let current = self.gateway.channels().generation();
            match event {
                RelayEvent::Message(message) => {
                    if self.record_inbound(message, current) {
                        appended += 1;
                    }
                }
                RelayEvent::Failed { generation, .. } if generation != current => {
                    tracing::debug!(generation, current, "dropping stale relay failure");
                }
                RelayEvent::Failed { generation, reason }
                    if self.reported_failure == Some(generation) =>
                {
                    tracing::debug!(generation, %reason, "relay failed again");
                }
                RelayEvent::Failed { generation, reason } => {
                    self.transcript
                        .append(format!("Message relay stopped: {reason}"), Category::Error);
                    self.reported_failure = Some(generation);
                    appended += 1;
                }
            }
        }
        appended
    }

    fn record_inbound(&mut self, message: InboundMessage, current: u64) -> bool {
        if message.generation != current {
            tracing::debug!(
                channel = %message.channel,
                generation = message.generation,
                current,
                "dropping message from superseded subscription"
            );
            return false;
        }
        let category = self
            .gateway
            .channels()
            .subscription_set()
            .and_then(|set| set.category_for(&message.channel));
        let Some(category) = category else {
            tracing::debug!(channel = %message.channel, "dropping message on unknown channel");
            return false;
        };
        self.transcript.append(message.payload, category);
        true
    }

    /// Leaves the game and stops the relay. The transcript is kept.
    pub async fn leave(&mut self) {
        self.gateway.leave().await;
        self.poll_relay();
    }
}
