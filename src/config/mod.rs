
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::CardId;

const DEFAULT_BASE_URL: &str = "https://at.govt.nz";
const DEFAULT_PERIOD_SECS: u64 = 3600;
const DEFAULT_STARTUP_DELAY_SECS: u64 = 60;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Required environment variable [{0}] is not set")]
    MissingVariable(&'static str),
    #[error("Invalid value {value:?} for [{key}] (must be an integer)")]
    InvalidInteger { key: &'static str, value: String },
    #[error("Card list entry {0:?} has an empty card id")]
    EmptyCardId(String),
    #[error("AT_CARDS does not contain any card ids")]
    NoCards,
}

/// One configured card: remote id plus an optional local display label.
#[derive(Debug, Clone)]
pub struct CardConfig {
    pub id: CardId,
    pub name: Option<String>,
}

impl CardConfig {
    pub fn new(id: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.map(str::to_string),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }
}

#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub token: String,
    pub channel: String,
}

/// Runtime configuration, sourced from `AT_*` environment variables (a local
/// `.env` file is honored first).
#[derive(Debug, Clone)]
pub struct Config {
    pub cards: Vec<CardConfig>,
    pub database_file: PathBuf,
    pub period: Duration,
    pub startup_delay: Duration,
    pub request_timeout: Duration,
    pub base_url: String,
    /// Session cookies handed over by the external login flow, as
    /// `name=value` pairs separated by `;`. Empty when the login flow injects
    /// them through some other channel.
    pub session_cookies: Vec<(String, String)>,
    /// Absent unless both the Slack token and channel are configured;
    /// absence disables notifications while ingestion proceeds.
    pub slack: Option<SlackConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            cards: Self::parse_cards(&Self::required("AT_CARDS")?)?,
            database_file: PathBuf::from(Self::required("AT_DATABASE_FILE")?),
            period: Duration::from_secs(Self::integer_or("AT_PERIOD", DEFAULT_PERIOD_SECS)?),
            startup_delay: Duration::from_secs(Self::integer_or(
                "AT_STARTUP_DELAY",
                DEFAULT_STARTUP_DELAY_SECS,
            )?),
            request_timeout: Duration::from_secs(Self::integer_or(
                "AT_REQUEST_TIMEOUT",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            base_url: env::var("AT_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            session_cookies: Self::parse_cookies(env::var("AT_SESSION_COOKIES").ok().as_deref()),
            slack: Self::slack_from_env(),
        })
    }

    /// Parses the card list: comma-separated entries of `id` or `id:name`.
    pub fn parse_cards(cards: &str) -> Result<Vec<CardConfig>, ConfigError> {
        let mut parsed = Vec::new();

        for entry in cards.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }

            let (id, name) = match entry.split_once(':') {
                Some((id, name)) => (id.trim(), Some(name.trim())),
                None => (entry, None),
            };

            if id.is_empty() {
                return Err(ConfigError::EmptyCardId(entry.to_string()));
            }

            parsed.push(CardConfig {
                id: id.to_string(),
                name: name.filter(|name| !name.is_empty()).map(str::to_string),
            });
        }

        if parsed.is_empty() {
            return Err(ConfigError::NoCards);
        }

        Ok(parsed)
    }

    fn parse_cookies(cookies: Option<&str>) -> Vec<(String, String)> {
        let Some(cookies) = cookies else {
            return Vec::new();
        };

        cookies
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                Some((name.to_string(), value.trim().to_string()))
            })
            .collect()
    }

    fn slack_from_env() -> Option<SlackConfig> {
        let token = env::var("AT_SLACK_API_TOKEN").ok().filter(|t| !t.is_empty())?;
        let channel = env::var("AT_SLACK_CHANNEL").ok().filter(|c| !c.is_empty())?;
        Some(SlackConfig { token, channel })
    }

    fn required(key: &'static str) -> Result<String, ConfigError> {
        env::var(key)
            .ok()
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingVariable(key))
    }

    fn integer_or(key: &'static str, default: u64) -> Result<u64, ConfigError> {
        match env::var(key) {
            Ok(value) => value.parse().map_err(|_| ConfigError::InvalidInteger {
                key,
                value,
            }),
            Err(_) => Ok(default),
        }
    }
}
