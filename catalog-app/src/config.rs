//! Configuration loading from environment.

use std::env;

/// Application configuration.
pub struct Config {
    pub bind_address: String,
    pub currency_grpc_url: String,
    pub ui_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_address =
            env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:9090".to_string());

        let currency_grpc_url =
            env::var("CURRENCY_GRPC_URL").unwrap_or_else(|_| "http://localhost:9092".to_string());

        let ui_origin =
            env::var("UI_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            currency_grpc_url,
            ui_origin,
        })
    }
}
