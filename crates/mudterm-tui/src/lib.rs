//! Full-screen terminal client for a game session.

pub mod render;
pub mod runtime;
pub mod state;
pub mod terminal;
pub mod update;

use std::io::{IsTerminal, stdout};
use std::time::Duration;

use anyhow::Result;
use mudterm_core::bus::Bus;
use mudterm_core::core::GameSession;
pub use runtime::TuiRuntime;

/// Joins as `player_id` and runs the interactive session until the player
/// quits.
///
/// # Errors
/// Returns an error if stdout is not a terminal or the terminal fails.
pub async fn run_game<B: Bus>(
    session: GameSession<B>,
    player_id: &str,
    user_id: &str,
    refresh_interval: Duration,
) -> Result<()> {
    if !stdout().is_terminal() {
        anyhow::bail!(
            "The game needs a terminal.\n\
             Use `mudterm send` for non-interactive commands."
        );
    }

    let mut runtime = TuiRuntime::new(session, refresh_interval)?;
    runtime.join(player_id, user_id).await?;
    runtime.run().await
}
