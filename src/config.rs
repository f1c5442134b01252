use std::{
    env, fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Deserializer};
use url::Url;

/// Environment variable holding the rewards service API key.
pub const API_KEY_VAR: &str = "JOIN4JOIN_API_KEY";

/// Environment variable holding the Discord bot token.
pub const DISCORD_TOKEN_VAR: &str = "DISCORD_TOKEN";

/// Name of the counter file inside the data directory.
const COUNTER_FILE: &str = "counters.json";

/// Runtime configuration, built once at startup and handed to the pieces that need it.
///
/// Values come from an optional TOML file and may then be overridden on the command line. Secrets
/// are never part of this struct; see [`Credential`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Base address of the rewards service; endpoint paths are joined onto it.
    pub base_url: Url,
    /// Upper bound on the duration of a single call to the rewards service.
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    /// How calls are authenticated.
    pub auth: AuthScheme,
    /// Prefix that marks a chat message as a command.
    pub prefix: String,
    /// Directory holding the counter file [default: platform data directory].
    pub data_dir: Option<PathBuf>,
    /// Capacity of the queue between the Discord handler and the command worker.
    pub queue_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: Url::parse("https://join4join.xyz/api/v1/").expect("default base url is valid"),
            timeout: Duration::from_secs(10),
            auth: AuthScheme::Header,
            prefix: "!".to_string(),
            data_dir: None,
            queue_size: 64,
        }
    }
}

impl Config {
    /// Read a configuration file, or fall back to the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
        let Some(path) = path else {
            return Ok(Config::default());
        };
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Path of the JSON file holding the local counters.
    pub fn counter_path(&self) -> anyhow::Result<PathBuf> {
        let data_dir = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => ProjectDirs::from("xyz", "join4join", "join4join-bot")
                .context("could not determine the platform data directory")?
                .data_dir()
                .to_owned(),
        };
        Ok(data_dir.join(COUNTER_FILE))
    }
}

/// How outbound calls carry the API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ArgEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AuthScheme {
    /// `Authorization` header with a JSON request body.
    Header,
    /// Deprecated: `secret_key` query parameter alongside the payload.
    SecretKey,
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthScheme::Header => f.write_str("header"),
            AuthScheme::SecretKey => f.write_str("secret-key"),
        }
    }
}

/// The rewards service API key.
///
/// The value is never printed; `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Credential(secret.into())
    }

    /// Read the API key from [`API_KEY_VAR`].
    pub fn from_env() -> anyhow::Result<Self> {
        let secret = env::var(API_KEY_VAR)
            .with_context(|| format!("missing environment variable {API_KEY_VAR}"))?;
        if secret.trim().is_empty() {
            anyhow::bail!("environment variable {API_KEY_VAR} is empty");
        }
        Ok(Credential(secret))
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(serde::de::Error::custom)
}
