//! Configuration management for mudterm.
//!
//! Loads configuration from ${MUDTERM_HOME}/config.toml with sensible defaults.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Merges user config values into the default template.
///
/// New comments/sections from the template are always present, while the
/// user's customized values are preserved.
fn merge_with_template(user_config: &str) -> Result<String> {
    use toml_edit::DocumentMut;

    let mut doc: DocumentMut = default_config_template()
        .parse()
        .context("Failed to parse default config template")?;
    let user_doc: DocumentMut = user_config.parse().context("Failed to parse user config")?;

    merge_items(doc.as_table_mut(), user_doc.as_table());

    Ok(doc.to_string())
}

/// Recursively merges items from source table into target table.
fn merge_items(target: &mut toml_edit::Table, source: &toml_edit::Table) {
    use toml_edit::Item;

    for (key, value) in source.iter() {
        match value {
            Item::Value(v) => {
                target[key] = Item::Value(v.clone());
            }
            Item::Table(src_table) => {
                if let Some(Item::Table(target_table)) = target.get_mut(key) {
                    merge_items(target_table, src_table);
                } else {
                    target[key] = Item::Table(src_table.clone());
                }
            }
            Item::ArrayOfTables(src_arr) => {
                target[key] = Item::ArrayOfTables(src_arr.clone());
            }
            Item::None => {}
        }
    }
}

pub mod paths {
    //! Path resolution for mudterm configuration and data directories.
    //!
    //! MUDTERM_HOME resolution order:
    //! 1. MUDTERM_HOME environment variable (if set)
    //! 2. ~/.config/mudterm (default)

    use std::path::PathBuf;

    /// Returns the mudterm home directory.
    pub fn mudterm_home() -> PathBuf {
        if let Ok(home) = std::env::var("MUDTERM_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".mudterm"),
            |h| h.join(".config").join("mudterm"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        mudterm_home().join("config.toml")
    }

    /// Returns the path to the saved account session.
    pub fn session_path() -> PathBuf {
        mudterm_home().join("session.json")
    }

    /// Returns the directory for TUI log files.
    pub fn logs_dir() -> PathBuf {
        mudterm_home().join("logs")
    }
}

/// Settings for one named environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Game server base URL
    pub base_url: String,
    /// UI refresh (and relay drain) interval in milliseconds
    pub refresh_interval_ms: u64,
    /// Transcript capacity
    pub max_messages: usize,
    /// Game server request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Message bus host
    pub bus_host: String,
    /// Message bus port
    pub bus_port: u16,
}

impl EnvironmentConfig {
    pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
    const DEFAULT_REFRESH_INTERVAL_MS: u64 = 1000;
    const MIN_REFRESH_INTERVAL_MS: u64 = 50;
    const DEFAULT_MAX_MESSAGES: usize = 100;
    const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
    const MIN_REQUEST_TIMEOUT_MS: u64 = 100;
    const DEFAULT_BUS_HOST: &str = "127.0.0.1";
    const DEFAULT_BUS_PORT: u16 = 4222;

    /// Refresh interval, clamped so the UI never spins.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(Self::MIN_REFRESH_INTERVAL_MS))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(Self::MIN_REQUEST_TIMEOUT_MS))
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            refresh_interval_ms: Self::DEFAULT_REFRESH_INTERVAL_MS,
            max_messages: Self::DEFAULT_MAX_MESSAGES,
            request_timeout_ms: Self::DEFAULT_REQUEST_TIMEOUT_MS,
            bus_host: Self::DEFAULT_BUS_HOST.to_string(),
            bus_port: Self::DEFAULT_BUS_PORT,
        }
    }
}

/// Account/character store settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
}

impl StoreConfig {
    pub const DEFAULT_URL: &str = "http://localhost:54321";

    /// Returns the configured URL if it's non-empty.
    pub fn effective_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Returns the configured API key if it's non-empty.
    pub fn effective_api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment used when none is selected on the command line
    pub environment: String,

    /// Named environments
    pub environments: BTreeMap<String, EnvironmentConfig>,

    /// Account and character store
    pub store: StoreConfig,
}

/// Environment settings after env-var overrides are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEnvironment {
    pub name: String,
    pub base_url: String,
    pub refresh_interval: Duration,
    pub max_messages: usize,
    pub request_timeout: Duration,
    pub bus_host: String,
    pub bus_port: u16,
}

/// Store settings after env-var overrides are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStore {
    pub url: String,
    pub api_key: String,
}

impl Config {
    pub const DEFAULT_ENVIRONMENT: &str = "development";

    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Resolves the selected environment (`name`, or the configured default).
    ///
    /// `MUDTERM_BASE_URL` overrides the environment's base URL.
    ///
    /// # Errors
    /// Returns an error if the environment is not defined or a URL is invalid.
    pub fn resolve_environment(&self, name: Option<&str>) -> Result<ResolvedEnvironment> {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(self.environment.as_str());
        let Some(env) = self.environments.get(name) else {
            let known = self
                .environments
                .keys()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            anyhow::bail!("Unknown environment '{name}'. Configured environments: {known}");
        };

        let base_url = resolve_url(
            Some(&env.base_url),
            "MUDTERM_BASE_URL",
            EnvironmentConfig::DEFAULT_BASE_URL,
            "game server",
        )?;

        Ok(ResolvedEnvironment {
            name: name.to_string(),
            base_url,
            refresh_interval: env.refresh_interval(),
            max_messages: env.max_messages.max(1),
            request_timeout: env.request_timeout(),
            bus_host: env.bus_host.clone(),
            bus_port: env.bus_port,
        })
    }

    /// Resolves store URL and API key.
    ///
    /// URL precedence: `MUDTERM_STORE_URL` > config > default.
    /// Key precedence: config > `MUDTERM_STORE_KEY`.
    ///
    /// # Errors
    /// Returns an error if no API key is available or the URL is invalid.
    pub fn resolve_store(&self) -> Result<ResolvedStore> {
        let url = resolve_url(
            self.store.effective_url(),
            "MUDTERM_STORE_URL",
            StoreConfig::DEFAULT_URL,
            "store",
        )?;
        let api_key = match self.store.effective_api_key() {
            Some(key) => key.trim().to_string(),
            None => std::env::var("MUDTERM_STORE_KEY")
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .context("No store API key available. Set MUDTERM_STORE_KEY or api_key in [store].")?,
        };
        Ok(ResolvedStore { url, api_key })
    }

    /// Saves only the default environment name to the config file.
    ///
    /// Creates the file from the template if it doesn't exist and preserves
    /// existing fields and comments.
    pub fn save_environment_to(path: &Path, name: &str) -> Result<()> {
        let current = if path.exists() {
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?
        } else {
            default_config_template().to_string()
        };

        let mut doc: toml_edit::DocumentMut = merge_with_template(&current)?
            .parse()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        doc["environment"] = toml_edit::value(name);

        let config: Config =
            toml::from_str(&doc.to_string()).context("Failed to validate updated config")?;
        if !config.environments.contains_key(name) {
            anyhow::bail!("Unknown environment '{name}'. Add [environments.{name}] first.");
        }

        Self::write_config(path, &doc.to_string())
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Generates a fresh config TOML from Rust defaults.
    ///
    /// Uses the embedded template for structure/comments and merges
    /// generated values from `Config::default()` into it.
    pub fn generate() -> Result<String> {
        let generated_toml = toml::to_string(&Config::default())
            .context("Failed to serialize default config to TOML")?;
        merge_with_template(&generated_toml)
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut environments = BTreeMap::new();
        environments.insert(
            Self::DEFAULT_ENVIRONMENT.to_string(),
            EnvironmentConfig::default(),
        );
        Self {
            environment: Self::DEFAULT_ENVIRONMENT.to_string(),
            environments,
            store: StoreConfig {
                url: Some(StoreConfig::DEFAULT_URL.to_string()),
                api_key: None,
            },
        }
    }
}

/// Resolves a URL with precedence: env > config > default.
fn resolve_url(
    config_url: Option<&str>,
    env_var: &str,
    default_url: &str,
    label: &str,
) -> Result<String> {
    if let Ok(env_url) = std::env::var(env_var) {
        let trimmed = env_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed, label)?;
            return Ok(trimmed.to_string());
        }
    }

    if let Some(config_url) = config_url {
        let trimmed = config_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed, label)?;
            return Ok(trimmed.to_string());
        }
    }

    Ok(default_url.to_string())
}

fn validate_url(url: &str, label: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid {label} URL: {url}"))?;
    Ok(())
}
