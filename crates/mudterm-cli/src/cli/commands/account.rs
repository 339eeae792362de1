//! Account command handlers. The session is saved to `session.json` under
//! the mudterm home directory.

use anyhow::{Context, Result};
use mudterm_core::accounts::{AuthClient, AuthSession};
use mudterm_core::config::Config;

fn auth_client(config: &Config) -> Result<AuthClient> {
    Ok(AuthClient::new(&config.resolve_store()?))
}

fn save(session: &AuthSession) -> Result<()> {
    let path = AuthSession::path();
    session
        .save_to(&path)
        .with_context(|| format!("save session to {}", path.display()))
}

fn display_name(session: &AuthSession) -> &str {
    session.user.email.as_deref().unwrap_or(&session.user.id)
}

pub async fn signup(config: &Config, email: &str, password: &str, confirm: &str) -> Result<()> {
    let outcome = auth_client(config)?.sign_up(email, password, confirm).await?;
    match outcome.session {
        Some(session) => {
            save(&session)?;
            println!("Signed up and signed in as {}", display_name(&session));
        }
        None => {
            println!("Signed up as {email}.");
            println!("Confirm the account from your email, then run `mudterm account login`.");
        }
    }
    Ok(())
}

pub async fn login(config: &Config, email: &str, password: &str) -> Result<()> {
    let session = auth_client(config)?.sign_in(email, password).await?;
    save(&session)?;
    println!("Signed in as {}", display_name(&session));
    Ok(())
}

pub async fn logout(config: &Config) -> Result<()> {
    let Some(session) = super::saved_session()? else {
        println!("Not signed in.");
        return Ok(());
    };
    // The local session is removed even if the provider cannot be reached.
    let revoked = match auth_client(config) {
        Ok(client) => client.sign_out(&session).await,
        Err(err) => Err(err),
    };
    if let Err(err) = revoked {
        tracing::warn!("Sign-out request failed: {err:#}");
    }
    AuthSession::clear_at(&AuthSession::path())?;
    println!("Signed out.");
    Ok(())
}

pub fn whoami() -> Result<()> {
    match super::saved_session()? {
        Some(session) => println!("{} ({})", display_name(&session), session.user.id),
        None => println!("Not signed in."),
    }
    Ok(())
}
