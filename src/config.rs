use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Newline-delimited JSON file of normalized events.
    pub events_path: String,
    /// Events applied per persisted transaction.
    pub replay_batch_size: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = required(&env_map, "DATABASE_PATH")?;
        let events_path = required(&env_map, "EVENTS_PATH")?;

        let replay_batch_size = env_map
            .get("REPLAY_BATCH_SIZE")
            .map(|s| s.as_str())
            .unwrap_or("500")
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "REPLAY_BATCH_SIZE".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        Ok(Config {
            port,
            database_path,
            events_path,
            replay_batch_size,
        })
    }
}

fn required(env_map: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    env_map
        .get(name)
        .filter(|s| !s.trim().is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnv(name.to_string()))
}
