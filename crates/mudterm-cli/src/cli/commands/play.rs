use std::sync::Arc;

use anyhow::{Context, Result};
use mudterm_core::bus::NatsBus;
use mudterm_core::config::ResolvedEnvironment;
use mudterm_core::core::GameSession;

pub async fn run(
    environment: &ResolvedEnvironment,
    character: &str,
    user: Option<String>,
) -> Result<()> {
    let user_id = super::resolve_user_id(user)?;
    let bus = NatsBus::connect(&environment.bus_host, environment.bus_port)
        .await
        .context("Live messages need the message bus")?;
    tracing::info!(environment = %environment.name, character, "starting game");

    let session = GameSession::new(
        super::game_client(environment),
        Arc::new(bus),
        super::session_options(environment),
    );
    mudterm_tui::run_game(session, character, &user_id, environment.refresh_interval).await
}
