//! HTTP client for the game server.

use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::error::{ClientError, ClientResult};

pub mod types;

pub use types::{
    Attributes, CharacterClass, CommandResult, GameCharacter, NewGameCharacter, PendingCommand,
    PlayerState, Race, RoomRef,
};
use types::{CommandEnvelope, JoinRequest, JoinResponse, RollResponse};

/// Standard User-Agent header for game server requests.
pub const USER_AGENT: &str = concat!("mudterm/", env!("CARGO_PKG_VERSION"));

/// Upper bound for one request, including reading the response body.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds an HTTP client that gives up on a silent server after `timeout`.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .timeout(timeout)
        .build()
        .unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Failed to build HTTP client, using defaults");
            reqwest::Client::new()
        })
}

/// Typed client for the game server endpoints.
#[derive(Debug, Clone)]
pub struct GameServerClient {
    base_url: String,
    http: reqwest::Client,
}

impl GameServerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http: http_client(DEFAULT_REQUEST_TIMEOUT),
        }
    }

    /// Replaces the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = http_client(timeout);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET /health`. Any non-success status counts as unavailable.
    pub async fn health(&self) -> ClientResult<()> {
        send(self.http.get(self.url("/health"))).await.map(|_| ())
    }

    /// `POST /game/join`. Returns the welcome message.
    pub async fn join(&self, player_id: &str, user_id: &str) -> ClientResult<String> {
        let request = self
            .http
            .post(self.url("/game/join"))
            .json(&JoinRequest { player_id, user_id });
        let joined: JoinResponse = send_json(request).await?;
        Ok(joined.message)
    }

    /// `POST /game/command`. Returns the unpacked `result` envelope.
    pub async fn command(&self, command: &PendingCommand) -> ClientResult<CommandResult> {
        let request = self.http.post(self.url("/game/command")).json(command);
        let envelope: CommandEnvelope = send_json(request).await?;
        envelope
            .result
            .ok_or_else(|| ClientError::protocol("Command response is missing `result`"))
    }

    /// `GET /game/characters/get/{id}`.
    pub async fn get_character(&self, character_id: &str) -> ClientResult<PlayerState> {
        let request = self
            .http
            .get(self.url(&format!("/game/characters/get/{character_id}")));
        send_json(request).await
    }

    /// `POST /game/characters`.
    pub async fn create_character(
        &self,
        character: &NewGameCharacter<'_>,
    ) -> ClientResult<GameCharacter> {
        let request = self.http.post(self.url("/game/characters")).json(character);
        send_json(request).await
    }

    /// `DELETE /game/characters/{id}`.
    pub async fn delete_character(&self, character_id: &str) -> ClientResult<()> {
        let request = self
            .http
            .delete(self.url(&format!("/game/characters/{character_id}")));
        send(request).await.map(|_| ())
    }

    /// `POST /game/attributes/roll`. Returns one set of rolled attributes.
    pub async fn roll_attributes(&self) -> ClientResult<Attributes> {
        let request = self.http.post(self.url("/game/attributes/roll"));
        let rolled: RollResponse = send_json(request).await?;
        Ok(rolled.rolls)
    }
}

/// Sends the request and returns the body of a successful response.
async fn send(request: RequestBuilder) -> ClientResult<String> {
    let response = request.header("user-agent", USER_AGENT).send().await?;
    read_body(response).await
}

async fn read_body(response: Response) -> ClientResult<String> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(ClientError::http_status(status.as_u16(), &body));
    }
    Ok(body)
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> ClientResult<T> {
    let body = send(request).await?;
    serde_json::from_str(&body).map_err(|err| {
        let mut error = ClientError::protocol(format!("Unexpected response from game server: {err}"));
        error.details = Some(body);
        error
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::error::ClientErrorKind;

    fn can_bind_localhost() -> bool {
        std::net::TcpListener::bind("127.0.0.1:0").is_ok()
    }

    #[tokio::test]
    async fn test_command_unpacks_result_envelope() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/game/command"))
            .and(body_json(json!({"playerId": "7", "command": "look"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {
                    "success": true,
                    "privateMessage": "Bridge\nScreens glow.",
                    "roomMessage": null
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GameServerClient::new(format!("{}/", server.uri()));
        let result = client
            .command(&PendingCommand {
                player_id: "7".into(),
                command: "look".into(),
            })
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.private_text(), Some("Bridge\nScreens glow."));
        assert_eq!(result.room_text(), None);
    }

    #[tokio::test]
    async fn test_error_status_uses_structured_message() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/game/join"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"error": "Character not found"})),
            )
            .mount(&server)
            .await;

        let client = GameServerClient::new(server.uri());
        let err = client.join("1", "u1").await.unwrap_err();
        assert_eq!(err.kind, ClientErrorKind::ProtocolFailure);
        assert_eq!(err.message, "Character not found");
    }

    #[tokio::test]
    async fn test_malformed_body_is_protocol_failure() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/game/attributes/roll"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = GameServerClient::new(server.uri());
        let err = client.roll_attributes().await.unwrap_err();
        assert_eq!(err.kind, ClientErrorKind::ProtocolFailure);
        assert_eq!(err.details.as_deref(), Some("not json"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_failure() {
        let client = GameServerClient::new("http://127.0.0.1:9");
        let err = client.health().await.unwrap_err();
        assert_eq!(err.kind, ClientErrorKind::TransportFailure);
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;

        let client = GameServerClient::new(server.uri()).with_timeout(Duration::from_millis(200));
        let err = tokio::time::timeout(Duration::from_secs(10), client.health())
            .await
            .expect("client should give up on its own")
            .unwrap_err();
        assert_eq!(err.kind, ClientErrorKind::TransportFailure);
        assert!(err.message.starts_with("Request timed out"), "{}", err.message);
    }

    #[tokio::test]
    async fn test_roll_and_get_character() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/game/attributes/roll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "rolls": {"strength": 14, "agility": 11}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/game/characters/get/5"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": 5, "firstName": "Ada", "room": "Hangar"})),
            )
            .mount(&server)
            .await;

        let client = GameServerClient::new(server.uri());
        let rolls = client.roll_attributes().await.unwrap();
        assert_eq!(rolls.get("strength"), Some(&14));

        let state = client.get_character("5").await.unwrap();
        assert_eq!(state.first_name.as_deref(), Some("Ada"));
        assert_eq!(state.room_name(), Some("Hangar"));
    }
}
