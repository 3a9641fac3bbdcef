//! Configuration loading from environment.

use std::env;

/// Application configuration.
pub struct Config {
    pub bind_address: String,
    pub base_path: String,
    pub ui_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_address =
            env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:9091".to_string());

        let base_path = env::var("BASE_PATH").unwrap_or_else(|_| "./imagestore".to_string());

        let ui_origin =
            env::var("UI_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            base_path,
            ui_origin,
        })
    }
}
