use anyhow::{Context, Result};
use mudterm_core::config::ResolvedEnvironment;

pub async fn run(environment: &ResolvedEnvironment) -> Result<()> {
    let client = super::game_client(environment);
    client
        .health()
        .await
        .with_context(|| format!("Game server at {} is not available", client.base_url()))?;
    println!("Game server at {} is up ({})", client.base_url(), environment.name);
    Ok(())
}
