use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::{Error, Result};

/// Timing and sizing of a single trivia game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSettings {
    /// Wait between the prompt and each hint, and before the answer is revealed
    pub hint_delay: Duration,
    /// Pause between one question closing and the next one being asked
    pub question_delay: Duration,
    /// Number of questions used when the start command does not give one
    pub default_question_count: usize,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            hint_delay: Duration::from_secs(5),
            question_delay: Duration::from_secs(5),
            default_question_count: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub database_path: String,
    pub max_connections: u32,
    pub retry_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: "./trivia.db".to_string(),
            max_connections: 4,
            retry_attempts: 3,
        }
    }
}

pub struct Config {
    pub discord_token: String,
    pub bot_activity: String,
    pub game: GameSettings,
    pub store: StoreConfig,
}

pub fn load_config() -> miette::Result<Config> {
    info!("Loading configuration");

    // Load environment variables
    dotenv().ok();

    Ok(Config::from_lookup(|key| env::var(key).ok())?)
}

impl Config {
    /// Build the configuration from a key lookup, normally the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let discord_token = lookup("DISCORD_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| Error::Config("Missing DISCORD_TOKEN".to_string()))?;

        let bot_activity = lookup("BOT_ACTIVITY").unwrap_or_else(|| "Trivia".to_string());

        let hint_delay_secs: u64 = parse_or(&lookup, "TRIVIA_HINT_DELAY_SECONDS", 5)?;
        let question_delay_secs: u64 = parse_or(&lookup, "TRIVIA_QUESTION_DELAY_SECONDS", 5)?;

        let default_question_count: usize = parse_or(&lookup, "TRIVIA_DEFAULT_QUESTION_COUNT", 10)?;
        if default_question_count == 0 {
            return Err(Error::Config(
                "TRIVIA_DEFAULT_QUESTION_COUNT must be at least 1".to_string(),
            ));
        }

        let database_path =
            lookup("TRIVIA_DATABASE_PATH").unwrap_or_else(|| "./trivia.db".to_string());

        let max_connections: u32 = parse_or(&lookup, "TRIVIA_STORE_MAX_CONNECTIONS", 4)?;
        let retry_attempts: u32 = parse_or(&lookup, "TRIVIA_STORE_RETRY_ATTEMPTS", 3)?;
        if max_connections == 0 || retry_attempts == 0 {
            return Err(Error::Config(
                "TRIVIA_STORE_MAX_CONNECTIONS and TRIVIA_STORE_RETRY_ATTEMPTS must be at least 1"
                    .to_string(),
            ));
        }

        Ok(Config {
            discord_token,
            bot_activity,
            game: GameSettings {
                hint_delay: Duration::from_secs(hint_delay_secs),
                question_delay: Duration::from_secs(question_delay_secs),
                default_question_count,
            },
            store: StoreConfig {
                database_path,
                max_connections,
                retry_attempts,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| Error::Config(format!("Invalid {key}: '{raw}'"))),
        None => Ok(default),
    }
}
