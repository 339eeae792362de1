//! Character command handlers.

use anyhow::{Context, Result};
use mudterm_core::accounts::{
    CharacterRecord, CharacterService, NewCharacter, StoreClient, choose_roll, roll_choices,
};
use mudterm_core::api::{Attributes, CharacterClass, Race};
use mudterm_core::config::{Config, ResolvedEnvironment};

pub struct CreateArgs<'a> {
    pub name: &'a str,
    pub race: &'a str,
    pub class: &'a str,
    pub attributes: Option<&'a str>,
    pub rolls: usize,
    pub pick: usize,
}

/// Character service acting as the signed-in user when there is one.
fn service(config: &Config, environment: &ResolvedEnvironment) -> Result<CharacterService> {
    let mut store = StoreClient::new(&config.resolve_store()?);
    if let Some(session) = super::saved_session()? {
        store = store.with_access_token(session.access_token);
    }
    Ok(CharacterService::new(super::game_client(environment), store))
}

fn print_attributes(attributes: &Attributes) {
    for (name, score) in attributes {
        println!("  {name:<14} {score:>3}");
    }
}

fn print_rolls(rolls: &[Attributes]) {
    for (idx, roll) in rolls.iter().enumerate() {
        println!("Roll {}:", idx + 1);
        print_attributes(roll);
    }
}

fn print_details(record: &CharacterRecord) {
    println!("{}", record.summary());
    if let Some(room) = record.room.as_deref() {
        println!("  room: {room}");
    }
    print_attributes(&record.attributes);
}

pub async fn list(config: &Config, environment: &ResolvedEnvironment) -> Result<()> {
    let owner = super::require_session()?.user.id;
    let characters = service(config, environment)?.list(&owner).await?;
    if characters.is_empty() {
        println!("No characters yet. Create one with `mudterm characters create`.");
        return Ok(());
    }
    for character in &characters {
        println!("{}", character.summary());
    }
    Ok(())
}

pub async fn show(config: &Config, environment: &ResolvedEnvironment, id: &str) -> Result<()> {
    let record = service(config, environment)?.get(id).await?;
    print_details(&record);
    Ok(())
}

pub async fn roll(environment: &ResolvedEnvironment, count: usize) -> Result<()> {
    let rolls = roll_choices(&super::game_client(environment), count).await?;
    print_rolls(&rolls);
    Ok(())
}

pub async fn create(
    config: &Config,
    environment: &ResolvedEnvironment,
    args: CreateArgs<'_>,
) -> Result<()> {
    let race: Race = args.race.parse().map_err(anyhow::Error::msg)?;
    let class: CharacterClass = args.class.parse().map_err(anyhow::Error::msg)?;
    let owner_id = super::require_session()?.user.id;
    let service = service(config, environment)?;

    let attributes = match args.attributes {
        Some(json) => serde_json::from_str::<Attributes>(json)
            .context("Attributes must be a JSON object of name to score")?,
        None => {
            let rolls = service.roll_choices(args.rolls).await?;
            if rolls.len() > 1 {
                print_rolls(&rolls);
                println!("Keeping roll {}", args.pick);
            }
            choose_roll(rolls, args.pick)?
        }
    };

    let record = service
        .create(&NewCharacter {
            owner_id,
            first_name: args.name.to_string(),
            race,
            class,
            attributes,
        })
        .await?;
    println!("Created {}", record.summary());
    print_attributes(&record.attributes);
    Ok(())
}

pub async fn delete(config: &Config, environment: &ResolvedEnvironment, id: &str) -> Result<()> {
    let record = service(config, environment)?.delete(id).await?;
    println!("Deleted {}", record.summary());
    Ok(())
}
