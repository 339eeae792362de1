//! CLI command handlers.

pub mod account;
pub mod characters;
pub mod config;
pub mod health;
#[cfg(feature = "tui")]
pub mod play;
pub mod send;

use anyhow::{Context, Result};
use mudterm_core::accounts::AuthSession;
use mudterm_core::api::GameServerClient;
use mudterm_core::config::ResolvedEnvironment;
use mudterm_core::core::SessionOptions;

pub(crate) fn saved_session() -> Result<Option<AuthSession>> {
    AuthSession::load_from(&AuthSession::path())
}

pub(crate) fn require_session() -> Result<AuthSession> {
    saved_session()?.context("Not signed in. Run `mudterm account login` first.")
}

/// `--user` if given, otherwise the signed-in account.
pub(crate) fn resolve_user_id(explicit: Option<String>) -> Result<String> {
    match explicit.map(|id| id.trim().to_string()).filter(|id| !id.is_empty()) {
        Some(id) => Ok(id),
        None => Ok(require_session()?.user.id),
    }
}

pub(crate) fn game_client(environment: &ResolvedEnvironment) -> GameServerClient {
    GameServerClient::new(environment.base_url.as_str()).with_timeout(environment.request_timeout)
}

pub(crate) fn session_options(environment: &ResolvedEnvironment) -> SessionOptions {
    SessionOptions {
        max_messages: environment.max_messages,
        ..SessionOptions::default()
    }
}
