//! Wire types for the game server HTTP API.
//!
//! Requests are sent in camelCase. Responses accept camelCase and the
//! snake_case spelling of the same field.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Attribute name -> rolled score.
pub type Attributes = BTreeMap<String, i64>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest<'a> {
    pub player_id: &'a str,
    pub user_id: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default, alias = "player_id", rename = "playerId", deserialize_with = "id_string::option")]
    pub player_id: Option<String>,
}

/// A command on its way to the game server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCommand {
    pub player_id: String,
    pub command: String,
}

/// Normalized outcome of a command.
///
/// Successful responses are unpacked from the `result` envelope; failures are
/// built locally with `success = false` and the error text in `message`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommandResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "privateMessage", alias = "private_message")]
    pub private_message: Option<String>,
    #[serde(default, rename = "roomMessage", alias = "room_message")]
    pub room_message: Option<String>,
}

impl CommandResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            private_message: None,
            room_message: None,
        }
    }

    /// Private message, if present and not blank.
    pub fn private_text(&self) -> Option<&str> {
        non_blank(self.private_message.as_deref())
    }

    pub fn room_text(&self) -> Option<&str> {
        non_blank(self.room_message.as_deref())
    }

    pub fn message_text(&self) -> Option<&str> {
        non_blank(self.message.as_deref())
    }
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.trim().is_empty())
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommandEnvelope {
    #[serde(default)]
    pub result: Option<CommandResult>,
}

/// Room reference in a player-state response: either a bare name or an object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RoomRef {
    Name(String),
    Object {
        #[serde(alias = "title")]
        name: String,
    },
}

impl RoomRef {
    pub fn name(&self) -> &str {
        match self {
            RoomRef::Name(name) | RoomRef::Object { name } => name,
        }
    }
}

/// Player state as reported by `GET /game/characters/get/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerState {
    #[serde(default, deserialize_with = "id_string::option")]
    pub id: Option<String>,
    #[serde(default, rename = "firstName", alias = "first_name")]
    pub first_name: Option<String>,
    #[serde(default, alias = "currentRoom", alias = "current_room")]
    pub room: Option<RoomRef>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl PlayerState {
    pub fn room_name(&self) -> Option<&str> {
        self.room
            .as_ref()
            .map(RoomRef::name)
            .filter(|name| !name.trim().is_empty())
    }
}

/// Body of `POST /game/characters`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGameCharacter<'a> {
    pub owner_id: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub race: Race,
    pub character_class: CharacterClass,
    pub attributes: &'a Attributes,
}

/// Character as created on the game server. Only the id is needed locally.
#[derive(Debug, Clone, Deserialize)]
pub struct GameCharacter {
    #[serde(deserialize_with = "id_string::required")]
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RollResponse {
    pub rolls: Attributes,
}

/// Playable races.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Race {
    Human,
    Draconian,
    Synth,
    Construct,
    Android,
}

impl Race {
    pub const ALL: [Race; 5] = [
        Race::Human,
        Race::Draconian,
        Race::Synth,
        Race::Construct,
        Race::Android,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Race::Human => "HUMAN",
            Race::Draconian => "DRACONIAN",
            Race::Synth => "SYNTH",
            Race::Construct => "CONSTRUCT",
            Race::Android => "ANDROID",
        }
    }
}

/// Playable classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CharacterClass {
    Soldier,
    Pilot,
    Hacker,
    Engineer,
    Medic,
}

impl CharacterClass {
    pub const ALL: [CharacterClass; 5] = [
        CharacterClass::Soldier,
        CharacterClass::Pilot,
        CharacterClass::Hacker,
        CharacterClass::Engineer,
        CharacterClass::Medic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CharacterClass::Soldier => "SOLDIER",
            CharacterClass::Pilot => "PILOT",
            CharacterClass::Hacker => "HACKER",
            CharacterClass::Engineer => "ENGINEER",
            CharacterClass::Medic => "MEDIC",
        }
    }
}

impl fmt::Display for Race {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn valid_values<T: fmt::Display>(all: &[T]) -> String {
    all.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl FromStr for Race {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Race::ALL
            .into_iter()
            .find(|race| race.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| {
                format!(
                    "Unknown race: {value} (expected one of {})",
                    valid_values(&Race::ALL)
                )
            })
    }
}

impl FromStr for CharacterClass {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        CharacterClass::ALL
            .into_iter()
            .find(|class| class.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| {
                format!(
                    "Unknown class: {value} (expected one of {})",
                    valid_values(&CharacterClass::ALL)
                )
            })
    }
}

/// Ids arrive as JSON numbers or strings; they are always handled as strings.
pub(crate) mod id_string {
    use super::{Deserialize, Deserializer, Value};

    fn to_string<E: serde::de::Error>(value: Value) -> Result<Option<String>, E> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            Value::Number(n) => Ok(Some(n.to_string())),
            other => Err(E::custom(format!("expected string or number id, got {other}"))),
        }
    }

    pub fn option<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        to_string(Value::deserialize(deserializer)?)
    }

    pub fn required<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        to_string(Value::deserialize(deserializer)?)?
            .ok_or_else(|| serde::de::Error::custom("id must not be null"))
    }
}
