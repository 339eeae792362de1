//! Command gateway: request/response bridge to the game server.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::channels::ChannelManager;
use super::relay::RelayEvent;
use crate::api::{CommandResult, GameServerClient, PendingCommand};
use crate::bus::Bus;
use crate::error::{ClientError, ClientResult};

/// Returns true for `go` and `go <direction>` (case-insensitive).
pub fn is_movement_command(command: &str) -> bool {
    let command = command.trim().to_lowercase();
    command == "go" || command.starts_with("go ")
}

/// Destination room from a movement result: the first line of the private message.
pub fn room_from_private_message(private_message: Option<&str>) -> Option<&str> {
    private_message
        .and_then(|text| text.lines().next())
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

pub struct CommandGateway<B: Bus> {
    client: GameServerClient,
    channels: ChannelManager<B>,
}

impl<B: Bus> CommandGateway<B> {
    pub fn new(
        client: GameServerClient,
        bus: Arc<B>,
        outbox: mpsc::Sender<RelayEvent>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            channels: ChannelManager::new(bus, outbox, poll_interval),
        }
    }

    pub fn client(&self) -> &GameServerClient {
        &self.client
    }

    pub fn channels(&self) -> &ChannelManager<B> {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut ChannelManager<B> {
        &mut self.channels
    }

    /// Joins the game as `player_id` and subscribes to that player's channels.
    ///
    /// Returns the server's welcome message.
    pub async fn join(&mut self, player_id: &str, user_id: &str) -> ClientResult<String> {
        if let Err(err) = self.client.health().await {
            tracing::warn!(error = %err, "game server health check failed");
            let mut unavailable = ClientError::transport("Game server is not available");
            unavailable.details = Some(err.message);
            return Err(unavailable);
        }

        let welcome = self.client.join(player_id, user_id).await?;
        tracing::info!(player_id, "joined game");
        self.channels.set_identity(player_id);

        let room = self.lookup_room(player_id).await;
        if room.is_some() {
            self.channels.update_room(room.as_deref());
        }
        Ok(welcome)
    }

    /// Sends a command for the current player.
    ///
    /// Fails only with `NotConnected`. Transport and protocol failures come back
    /// as a `CommandResult` with `success = false`.
    pub async fn send(&mut self, command: &str) -> ClientResult<CommandResult> {
        let Some(player_id) = self.channels.player_id().map(str::to_string) else {
            return Err(ClientError::not_connected());
        };

        let pending = PendingCommand {
            player_id: player_id.clone(),
            command: command.to_string(),
        };
        let result = match self.client.command(&pending).await {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(kind = %err.kind, error = %err, "command failed");
                return Ok(CommandResult::failure(err.message));
            }
        };

        if result.success && is_movement_command(command) {
            let room = match room_from_private_message(result.private_text()) {
                Some(room) => Some(room.to_string()),
                None => self.lookup_room(&player_id).await,
            };
            self.channels.update_room(room.as_deref());
        } else {
            // Restarts a relay that stopped on a bus error.
            self.channels.ensure_relay();
        }
        Ok(result)
    }

    /// Drops the identity and stops the relay.
    pub async fn leave(&mut self) {
        self.channels.clear_identity();
        self.channels.shutdown().await;
    }

    /// Best-effort room lookup. Failures are logged and yield `None`.
    async fn lookup_room(&self, player_id: &str) -> Option<String> {
        match self.client.get_character(player_id).await {
            Ok(state) => state.room_name().map(str::to_string),
            Err(err) => {
                tracing::warn!(player_id, error = %err, "player state lookup failed");
                None
            }
        }
    }
}
