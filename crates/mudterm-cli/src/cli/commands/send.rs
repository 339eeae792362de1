//! One-shot command: join, send, collect whatever the relay delivers within
//! one refresh interval, print the transcript.

use std::sync::Arc;

use anyhow::{Context, Result};
use mudterm_core::bus::{Bus, MemoryBus, NatsBus};
use mudterm_core::config::ResolvedEnvironment;
use mudterm_core::core::GameSession;

pub async fn run(
    environment: &ResolvedEnvironment,
    character: &str,
    user: Option<String>,
    command: &str,
) -> Result<()> {
    let user_id = super::resolve_user_id(user)?;
    match NatsBus::connect(&environment.bus_host, environment.bus_port).await {
        Ok(bus) => send_with(Arc::new(bus), environment, character, &user_id, command).await,
        Err(err) => {
            tracing::warn!(%err, "message bus unavailable, room and system messages will be missing");
            send_with(Arc::new(MemoryBus::new()), environment, character, &user_id, command).await
        }
    }
}

async fn send_with<B: Bus>(
    bus: Arc<B>,
    environment: &ResolvedEnvironment,
    character: &str,
    user_id: &str,
    command: &str,
) -> Result<()> {
    let mut session = GameSession::new(
        super::game_client(environment),
        bus,
        super::session_options(environment),
    );
    session
        .join(character, user_id)
        .await
        .context("Failed to join the game")?;
    let result = session.send(command).await;

    tokio::time::sleep(environment.refresh_interval).await;
    session.poll_relay();
    session.leave().await;

    println!("{}", session.transcript().format_plain());
    if !result?.success {
        anyhow::bail!("Command failed");
    }
    Ok(())
}
