//! Account sign-up/sign-in against a GoTrue-style auth provider (`/auth/v1`).
//!
//! The signed-in session is stored in `<base>/session.json` with restricted
//! permissions (0600). Tokens are never logged or displayed in full.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::store::StoreClient;
use crate::config::{ResolvedStore, paths};

const AUTH_PATH: &str = "/auth/v1";
const USER_TABLE: &str = "user";
const MIN_PASSWORD_LEN: usize = 6;

/// Authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// A signed-in session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: AuthUser,
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &mask_token(&self.access_token))
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl AuthSession {
    /// Returns the path to the saved session file.
    pub fn path() -> PathBuf {
        paths::session_path()
    }

    /// Loads the saved session, if any.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read session from {}", path.display()))?;
        let session = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse session from {}", path.display()))?;
        Ok(Some(session))
    }

    /// Saves the session with restricted permissions (0600).
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize session")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path)
                .with_context(|| format!("Failed to open {} for writing", path.display()))?;
            file.write_all(contents.as_bytes())
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(path, contents)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }

        Ok(())
    }

    /// Removes the saved session. Returns whether one existed.
    pub fn clear_at(path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)
            .with_context(|| format!("Failed to remove {}", path.display()))?;
        Ok(true)
    }
}

/// Returns a masked version of a token for display (first 12 chars + ...).
pub fn mask_token(token: &str) -> String {
    if token.len() <= 16 {
        return "***".to_string();
    }
    let prefix: String = token.chars().take(12).collect();
    format!("{prefix}...")
}

/// Result of a sign-up. Providers that require email confirmation return a
/// user without a session.
#[derive(Debug, Clone)]
pub struct SignUp {
    pub user: AuthUser,
    pub session: Option<AuthSession>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<AuthUser>,
    // Sign-up without auto-confirm returns the user object at the top level.
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_parts(self) -> (Option<AuthUser>, Option<String>, Option<String>) {
        let user = self.user.or_else(|| {
            self.id.map(|id| AuthUser {
                id,
                email: self.email,
            })
        });
        (user, self.access_token, self.refresh_token)
    }
}

#[derive(Debug, Serialize)]
struct UserRow<'a> {
    id: &'a str,
    email: &'a str,
    characters: [&'a str; 0],
    created_at: String,
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// Client for the auth provider plus the `user` profile table.
pub struct AuthClient {
    base_url: String,
    api_key: String,
    store: StoreClient,
    http: reqwest::Client,
}

impl AuthClient {
    pub fn new(store: &ResolvedStore) -> Self {
        Self {
            base_url: store.url.trim_end_matches('/').to_string(),
            api_key: store.api_key.clone(),
            store: StoreClient::new(store),
            http: crate::api::http_client(crate::api::DEFAULT_REQUEST_TIMEOUT),
        }
    }

    fn headers(&self, bearer: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.api_key).unwrap_or_else(|_| HeaderValue::from_static("")),
        );
        if let Some(token) = bearer {
            headers.insert(
                "Authorization",
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .unwrap_or_else(|_| HeaderValue::from_static("")),
            );
        }
        headers.insert(
            "user-agent",
            HeaderValue::from_static(crate::api::USER_AGENT),
        );
        headers
    }

    async fn user_exists(&self, email: &str) -> Result<bool> {
        let rows: Vec<Value> = self
            .store
            .select(USER_TABLE, "email", &[("email", email)])
            .await
            .context("Failed to check user")?;
        Ok(!rows.is_empty())
    }

    async fn post_credentials(&self, path: &str, email: &str, password: &str) -> Result<TokenResponse> {
        let response = self
            .http
            .post(format!("{}{}{}", self.base_url, AUTH_PATH, path))
            .headers(self.headers(None))
            .json(&Credentials { email, password })
            .send()
            .await
            .context("Failed to reach auth provider")?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("{}", auth_error_message(&body, status.as_u16()));
        }
        serde_json::from_str(&body).context("Failed to parse auth response")
    }

    /// Signs up a new user and creates their profile row.
    ///
    /// # Errors
    /// Returns an error on mismatched/short passwords, an existing user, or a
    /// provider/store failure.
    pub async fn sign_up(&self, email: &str, password: &str, confirm: &str) -> Result<SignUp> {
        let email = email.trim();
        if password != confirm {
            anyhow::bail!("Passwords do not match!");
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            anyhow::bail!("Password must be at least {MIN_PASSWORD_LEN} characters long!");
        }
        if self.user_exists(email).await? {
            anyhow::bail!("User already exists. Please sign in instead.");
        }

        let (user, access_token, refresh_token) = self
            .post_credentials("/signup", email, password)
            .await?
            .into_parts();
        let user = user.context("Failed to sign up. Please try again.")?;

        let profile_store = match access_token.as_deref() {
            Some(token) => self.store.clone().with_access_token(token),
            None => self.store.clone(),
        };
        profile_store
            .insert::<_, Value>(
                USER_TABLE,
                &UserRow {
                    id: &user.id,
                    email,
                    characters: [],
                    created_at: chrono::Utc::now().to_rfc3339(),
                },
            )
            .await
            .context("Failed to create user profile. Please try again.")?;
        tracing::info!(user_id = %user.id, "signed up");

        let session = access_token.map(|access_token| AuthSession {
            access_token,
            refresh_token,
            user: user.clone(),
        });
        Ok(SignUp { user, session })
    }

    /// Signs in with email and password.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let email = email.trim();
        if !self.user_exists(email).await? {
            anyhow::bail!("User not found. Please sign up first.");
        }

        let (user, access_token, refresh_token) = self
            .post_credentials("/token?grant_type=password", email, password)
            .await?
            .into_parts();
        let (Some(user), Some(access_token)) = (user, access_token) else {
            anyhow::bail!("Failed to sign in. Please check your credentials.");
        };
        tracing::info!(user_id = %user.id, "signed in");
        Ok(AuthSession {
            access_token,
            refresh_token,
            user,
        })
    }

    /// Revokes the session on the provider.
    pub async fn sign_out(&self, session: &AuthSession) -> Result<()> {
        let response = self
            .http
            .post(format!("{}{}/logout", self.base_url, AUTH_PATH))
            .headers(self.headers(Some(&session.access_token)))
            .send()
            .await
            .context("Failed to reach auth provider")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("{}", auth_error_message(&body, status.as_u16()));
        }
        Ok(())
    }
}

/// GoTrue reports errors as `error_description`, `msg`, or the generic shapes.
fn auth_error_message(body: &str, status: u16) -> String {
    let described = serde_json::from_str::<Value>(body).ok().and_then(|json| {
        ["error_description", "msg"]
            .iter()
            .find_map(|key| json.get(*key).and_then(Value::as_str).map(str::to_string))
    });
    described.unwrap_or_else(|| crate::error::ClientError::http_status(status, body).message)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn can_bind_localhost() -> bool {
        std::net::TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn client(url: &str) -> AuthClient {
        AuthClient::new(&ResolvedStore {
            url: url.to_string(),
            api_key: "anon".to_string(),
        })
    }

    fn session() -> AuthSession {
        AuthSession {
            access_token: "eyJhbGciOiJIUzI1NiJ9.payload.sig".to_string(),
            refresh_token: Some("refresh".to_string()),
            user: AuthUser {
                id: "u1".to_string(),
                email: Some("ada@example.com".to_string()),
            },
        }
    }

    async fn mount_user_lookup(server: &MockServer, rows: Value) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/user"))
            .and(query_param("email", "eq.ada@example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows))
            .mount(server)
            .await;
    }

    #[test]
    fn test_session_file_roundtrip_and_permissions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        assert_eq!(AuthSession::load_from(&path).unwrap(), None);
        session().save_to(&path).unwrap();
        assert_eq!(AuthSession::load_from(&path).unwrap(), Some(session()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        assert!(AuthSession::clear_at(&path).unwrap());
        assert!(!AuthSession::clear_at(&path).unwrap());
    }

    #[test]
    fn test_debug_masks_token() {
        let rendered = format!("{:?}", session());
        assert!(!rendered.contains("payload.sig"));
        assert!(rendered.contains("eyJhbGciOiJI..."));
        assert_eq!(mask_token("short"), "***");
    }

    #[tokio::test]
    async fn test_sign_up_validates_passwords_locally() {
        let auth = client("http://127.0.0.1:9");
        let err = auth.sign_up("a@b.c", "secret1", "secret2").await.unwrap_err();
        assert_eq!(err.to_string(), "Passwords do not match!");
        let err = auth.sign_up("a@b.c", "abc", "abc").await.unwrap_err();
        assert_eq!(err.to_string(), "Password must be at least 6 characters long!");
    }

    #[tokio::test]
    async fn test_sign_in_returns_session() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        mount_user_lookup(&server, json!([{"email": "ada@example.com"}])).await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "anon"))
            .and(body_json(json!({"email": "ada@example.com", "password": "hunter22"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-token-value-123456",
                "refresh_token": "r1",
                "user": {"id": "u1", "email": "ada@example.com"}
            })))
            .mount(&server)
            .await;

        let session = client(&server.uri())
            .sign_in("ada@example.com", "hunter22")
            .await
            .unwrap();
        assert_eq!(session.user.id, "u1");
        assert_eq!(session.refresh_token.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_sign_in_unknown_user() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        mount_user_lookup(&server, json!([])).await;

        let err = client(&server.uri())
            .sign_in("ada@example.com", "hunter22")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "User not found. Please sign up first.");
    }

    #[tokio::test]
    async fn test_sign_in_reports_provider_error() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        mount_user_lookup(&server, json!([{"email": "ada@example.com"}])).await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .sign_in("ada@example.com", "wrong-pass")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid login credentials");
    }

    #[tokio::test]
    async fn test_sign_up_creates_profile_row() {
        if !can_bind_localhost() {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        }
        let server = MockServer::start().await;
        mount_user_lookup(&server, json!([])).await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "u9",
                "email": "ada@example.com"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/user"))
            .and(wiremock::matchers::body_partial_json(json!({
                "id": "u9",
                "email": "ada@example.com",
                "characters": []
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{"id": "u9"}])))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server.uri())
            .sign_up("ada@example.com", "hunter22", "hunter22")
            .await
            .unwrap();
        assert_eq!(outcome.user.id, "u9");
        assert!(outcome.session.is_none());
    }
}
