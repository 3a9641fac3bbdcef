//! Configuration loading from environment.

use std::env;
use std::time::Duration;

const DEFAULT_FEED_URL: &str = "https://www.ecb.europa.eu/stats/eurofxref/eurofxref-daily.xml";

/// Application configuration.
pub struct Config {
    pub bind_address: String,
    pub rate_feed_url: String,
    pub monitor_interval: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_address =
            env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:9092".to_string());

        let rate_feed_url =
            env::var("RATE_FEED_URL").unwrap_or_else(|_| DEFAULT_FEED_URL.to_string());

        let monitor_interval = env::var("MONITOR_INTERVAL_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map(Duration::from_secs)?;

        Ok(Self {
            bind_address,
            rate_feed_url,
            monitor_interval,
        })
    }
}
