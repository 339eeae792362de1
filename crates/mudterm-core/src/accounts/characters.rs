//! Character service: characters live both on the game server and in the store.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::store::StoreClient;
use crate::api::types::id_string;
use crate::api::{Attributes, CharacterClass, GameServerClient, NewGameCharacter, Race};

const CHARACTER_TABLE: &str = "character";
const LIST_COLUMNS: &str = "id,first_name,race,class,level,game_id";

/// Most attribute sets a player may roll before choosing one.
pub const MAX_ROLLS: usize = 3;

/// A character row in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterRecord {
    #[serde(deserialize_with = "id_string::required")]
    pub id: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    pub first_name: String,
    pub race: String,
    pub class: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default = "default_level")]
    pub level: i64,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default, deserialize_with = "id_string::option")]
    pub game_id: Option<String>,
}

fn default_level() -> i64 {
    1
}

impl CharacterRecord {
    /// One-line summary, e.g. `Ada (#12) - Level 1 SYNTH HACKER`.
    pub fn summary(&self) -> String {
        format!(
            "{} (#{}) - Level {} {} {}",
            self.first_name, self.id, self.level, self.race, self.class
        )
    }
}

/// Input for [`CharacterService::create`].
#[derive(Debug, Clone)]
pub struct NewCharacter {
    pub owner_id: String,
    pub first_name: String,
    pub race: Race,
    pub class: CharacterClass,
    pub attributes: Attributes,
}

#[derive(Debug, Serialize)]
struct CharacterRow<'a> {
    owner_id: &'a str,
    first_name: &'a str,
    race: Race,
    class: CharacterClass,
    attributes: &'a Attributes,
    level: i64,
    game_id: &'a str,
}

pub struct CharacterService {
    game: GameServerClient,
    store: StoreClient,
}

impl CharacterService {
    pub fn new(game: GameServerClient, store: StoreClient) -> Self {
        Self { game, store }
    }

    /// Characters owned by `owner_id`, in store order.
    pub async fn list(&self, owner_id: &str) -> Result<Vec<CharacterRecord>> {
        self.store
            .select(CHARACTER_TABLE, LIST_COLUMNS, &[("owner_id", owner_id)])
            .await
            .context("Failed to list characters")
    }

    pub async fn get(&self, character_id: &str) -> Result<CharacterRecord> {
        let rows: Vec<CharacterRecord> = self
            .store
            .select(CHARACTER_TABLE, "*", &[("id", character_id)])
            .await
            .context("Failed to load character")?;
        rows.into_iter()
            .next()
            .with_context(|| format!("Character not found: {character_id}"))
    }

    /// Rolls `count` attribute sets to choose from.
    pub async fn roll_choices(&self, count: usize) -> Result<Vec<Attributes>> {
        roll_choices(&self.game, count).await
    }

    /// Creates the character on the game server, then records it in the store.
    ///
    /// If the store insert fails, the game server character is deleted again
    /// (best effort) so the two sides don't drift apart.
    pub async fn create(&self, new: &NewCharacter) -> Result<CharacterRecord> {
        let first_name = new.first_name.trim();
        if first_name.is_empty() {
            anyhow::bail!("Please enter a character name");
        }
        if new.attributes.is_empty() {
            anyhow::bail!("Please roll for attributes first");
        }

        let taken: Vec<serde_json::Value> = self
            .store
            .select(CHARACTER_TABLE, "first_name", &[("first_name", first_name)])
            .await
            .context("Failed to check character name")?;
        if !taken.is_empty() {
            anyhow::bail!("Character name already exists");
        }

        let game_character = self
            .game
            .create_character(&NewGameCharacter {
                owner_id: &new.owner_id,
                first_name,
                last_name: "",
                race: new.race,
                character_class: new.class,
                attributes: &new.attributes,
            })
            .await
            .context("Failed to create character in game server")?;
        tracing::debug!(game_id = %game_character.id, "character created on game server");

        let row = CharacterRow {
            owner_id: &new.owner_id,
            first_name,
            race: new.race,
            class: new.class,
            attributes: &new.attributes,
            level: 1,
            game_id: &game_character.id,
        };
        let inserted: Result<Vec<CharacterRecord>> =
            self.store.insert(CHARACTER_TABLE, &row).await;

        match inserted {
            Ok(rows) if !rows.is_empty() => rows
                .into_iter()
                .next()
                .context("Failed to create character in database"),
            outcome => {
                self.compensate(&game_character.id).await;
                match outcome {
                    Err(err) => Err(err.context("Failed to create character in database")),
                    Ok(_) => anyhow::bail!("Failed to create character in database"),
                }
            }
        }
    }

    async fn compensate(&self, game_id: &str) {
        match self.game.delete_character(game_id).await {
            Ok(()) => tracing::info!(game_id, "rolled back game server character"),
            Err(err) => {
                tracing::warn!(game_id, error = %err, "failed to roll back game server character");
            }
        }
    }

    /// Updates columns of a stored character. The game server copy is not touched.
    pub async fn update(
        &self,
        character_id: &str,
        updates: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<CharacterRecord> {
        if updates.is_empty() {
            anyhow::bail!("Nothing to update");
        }
        let rows: Vec<CharacterRecord> = self
            .store
            .update(CHARACTER_TABLE, &[("id", character_id)], updates)
            .await
            .context("Failed to update character")?;
        rows.into_iter()
            .next()
            .context("Failed to update character")
    }

    /// Deletes the character from the store, then from the game server (best effort).
    pub async fn delete(&self, character_id: &str) -> Result<CharacterRecord> {
        let record = self.get(character_id).await?;
        self.store
            .delete::<serde_json::Value>(CHARACTER_TABLE, &[("id", character_id)])
            .await
            .context("Failed to delete character")?;

        if let Some(game_id) = record.game_id.as_deref()
            && let Err(err) = self.game.delete_character(game_id).await
        {
            tracing::warn!(game_id, error = %err, "game server character was not deleted");
        }
        Ok(record)
    }
}

/// Rolls `count` attribute sets (1 to [`MAX_ROLLS`]) on the game server.
pub async fn roll_choices(game: &GameServerClient, count: usize) -> Result<Vec<Attributes>> {
    if !(1..=MAX_ROLLS).contains(&count) {
        anyhow::bail!("You can roll between 1 and {MAX_ROLLS} times");
    }
    let mut rolls = Vec::with_capacity(count);
    for _ in 0..count {
        let rolled = game
            .roll_attributes()
            .await
            .context("Failed to roll attributes")?;
        rolls.push(rolled);
    }
    Ok(rolls)
}

/// Takes roll number `pick` (1-based) out of `rolls`.
pub fn choose_roll(mut rolls: Vec<Attributes>, pick: usize) -> Result<Attributes> {
    if pick == 0 || pick > rolls.len() {
        anyhow::bail!("Pick a roll between 1 and {}", rolls.len());
    }
    Ok(rolls.swap_remove(pick - 1))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::ResolvedStore;

    fn can_bind_localhost() -> bool {
        std::net::TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn service(server: &MockServer) -> CharacterService {
        let store = StoreClient::new(&ResolvedStore {
            url: server.uri(),
            api_key: "anon".to_string(),
        });
        CharacterService::new(GameServerClient::new(server.uri()), store)
    }

    fn new_character() -> NewCharacter {
        NewCharacter {
            owner_id: "u1".to_string(),
            first_name: "Ada".to_string(),
            race: Race::Synth,
            class: CharacterClass::Hacker,
            attributes: Attributes::from([("strength".to_string(), 12)]),
        }
    }

    async fn mount_name_free(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/character"))
            .and(query_param("first_name", "eq.Ada"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(server)
            .await;
    }

    #[test]
    fn test_record_summary_and_numeric_ids() {
        let record: CharacterRecord = serde_json::from_value(json!({
            "id": 12,
            "first_name": "Ada",
            "race": "SYNTH",
            "class": "HACKER",
            "game_id": 99
        }))
        .unwrap();
        assert_eq!(record.game_id.as_deref(), Some("99"));
        assert_eq!(record.summary(), "Ada (#12) - Level 1 SYNTH HACKER");
    }

    #[test]
    fn test_choose_roll_is_one_based() {
        let rolls = vec![
            Attributes::from([("strength".to_string(), 8)]),
            Attributes::from([("strength".to_string(), 15)]),
        ];
        let chosen = choose_roll(rolls.clone(), 2).unwrap();
        assert_eq!(chosen.get("strength"), Some(&15));

        assert!(choose_roll(rolls.clone(), 0).is_err());
        let err = choose_roll(rolls, 3).unwrap_err();
        assert_eq!(err.to_string(), "Pick a roll between 1 and 2");
    }

    #[tokio::test]
    async fn test_roll_choices_is_capped() {
        let game = GameServerClient::new("http://127.0.0.1:9");
        let err = roll_choices(&game, MAX_ROLLS + 1).await.unwrap_err();
        assert_eq!(err.to_string(), "You can roll between 1 and 3 times");
        assert!(roll_choices(&game, 0).await.is_err());
    }

    #[tokio::test]
    async fn test_roll_choices_rolls_each_set() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/game/attributes/roll"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"rolls": {"strength": 11}})),
            )
            .expect(3)
            .mount(&server)
            .await;

        let rolls = service(&server).roll_choices(3).await.unwrap();
        assert_eq!(rolls.len(), 3);
    }

    #[tokio::test]
    async fn test_create_writes_game_then_store() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        mount_name_free(&server).await;
        Mock::given(method("POST"))
            .and(path("/game/characters"))
            .and(body_partial_json(json!({
                "ownerId": "u1",
                "firstName": "Ada",
                "lastName": "",
                "race": "SYNTH",
                "characterClass": "HACKER"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 77})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/character"))
            .and(body_partial_json(json!({"game_id": "77", "class": "HACKER", "level": 1})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
                "id": 5, "owner_id": "u1", "first_name": "Ada", "race": "SYNTH",
                "class": "HACKER", "attributes": {"strength": 12}, "level": 1, "game_id": "77"
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let record = service(&server).create(&new_character()).await.unwrap();
        assert_eq!(record.id, "5");
        assert_eq!(record.game_id.as_deref(), Some("77"));
    }

    #[tokio::test]
    async fn test_create_rolls_back_game_character_when_store_fails() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        mount_name_free(&server).await;
        Mock::given(method("POST"))
            .and(path("/game/characters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "g-1"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/character"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(json!({"message": "db offline"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/game/characters/g-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let err = service(&server).create(&new_character()).await.unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("Failed to create character in database"));
        assert!(message.contains("db offline"));
    }

    #[tokio::test]
    async fn test_create_rejects_taken_name() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/character"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"first_name": "Ada"}])),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/game/characters"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = service(&server).create(&new_character()).await.unwrap_err();
        assert_eq!(err.to_string(), "Character name already exists");
    }

    #[tokio::test]
    async fn test_create_requires_name_and_rolls() {
        let store = StoreClient::new(&ResolvedStore {
            url: "http://127.0.0.1:9".to_string(),
            api_key: "anon".to_string(),
        });
        let service = CharacterService::new(GameServerClient::new("http://127.0.0.1:9"), store);

        let mut unnamed = new_character();
        unnamed.first_name = "  ".to_string();
        assert!(service.create(&unnamed).await.is_err());

        let mut unrolled = new_character();
        unrolled.attributes.clear();
        let err = service.create(&unrolled).await.unwrap_err();
        assert_eq!(err.to_string(), "Please roll for attributes first");
    }

    #[tokio::test]
    async fn test_update_returns_stored_row() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/character"))
            .and(query_param("id", "eq.5"))
            .and(body_partial_json(json!({"room": "Bridge"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": 5, "first_name": "Ada", "race": "SYNTH", "class": "HACKER", "room": "Bridge"
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let updates = json!({"room": "Bridge"}).as_object().cloned().unwrap();
        let record = service(&server).update("5", &updates).await.unwrap();
        assert_eq!(record.room.as_deref(), Some("Bridge"));
    }

    #[tokio::test]
    async fn test_update_without_matching_row_fails() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/character"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let updates = json!({"level": 3}).as_object().cloned().unwrap();
        let err = service(&server).update("404", &updates).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to update character");
    }

    #[tokio::test]
    async fn test_delete_removes_store_row_then_game_character() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/character"))
            .and(query_param("id", "eq.5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": 5, "first_name": "Ada", "race": "SYNTH", "class": "HACKER", "game_id": "77"
            }])))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/character"))
            .and(query_param("id", "eq.5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/game/characters/77"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let record = service(&server).delete("5").await.unwrap();
        assert_eq!(record.first_name, "Ada");
    }
}
