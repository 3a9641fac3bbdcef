//! Exchange rate store.
//!
//! Rates are quoted against EUR and bootstrapped from the ECB daily
//! reference-rate XML feed. A monitor task perturbs every non-EUR rate on an
//! interval to simulate market movement and notifies a consumer through a
//! bounded channel; the send is awaited so no tick is lost between the
//! writer and the fan-out stage.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum RatesError {
    #[error("rate not found for currency {0}")]
    NotFound(String),

    #[error("failed to fetch rate feed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("rate feed returned status {0}")]
    FeedStatus(u16),

    #[error("failed to decode rate feed: {0}")]
    Decode(#[from] quick_xml::DeError),
}

// ECB envelope: gesmes:Envelope > Cube > Cube[time] > Cube[currency, rate].
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Cube")]
    cube: CubeWrapper,
}

#[derive(Debug, Deserialize)]
struct CubeWrapper {
    #[serde(rename = "Cube")]
    daily: DailyCube,
}

#[derive(Debug, Deserialize)]
struct DailyCube {
    #[serde(rename = "Cube", default)]
    rates: Vec<RateCube>,
}

#[derive(Debug, Deserialize)]
struct RateCube {
    #[serde(rename = "@currency")]
    currency: String,
    #[serde(rename = "@rate")]
    rate: f64,
}

/// Thread-safe table of currency code -> rate against EUR.
///
/// The table always contains `EUR = 1.0`. Readers take the shared lock, the
/// monitor is the only writer after startup.
pub struct RateStore {
    rates: RwLock<HashMap<String, f64>>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RateStore {
    /// Builds a store from an explicit rate table. EUR is pinned to 1.0.
    pub fn with_rates(mut rates: HashMap<String, f64>) -> Self {
        rates.insert("EUR".to_string(), 1.0);
        let (shutdown, _) = watch::channel(false);
        Self {
            rates: RwLock::new(rates),
            shutdown,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Fetches the daily feed and builds the store. Any fetch or decode
    /// failure is fatal to startup.
    pub async fn from_feed(url: &str) -> Result<Self, RatesError> {
        let response = reqwest::get(url).await?;
        if !response.status().is_success() {
            return Err(RatesError::FeedStatus(response.status().as_u16()));
        }

        let body = response.text().await?;
        let rates = parse_feed(&body)?;
        info!(currencies = rates.len(), "Loaded exchange rates from feed");

        Ok(Self::with_rates(rates))
    }

    /// Returns `table[destination] / table[base]`.
    pub async fn rate(&self, base: &str, destination: &str) -> Result<f64, RatesError> {
        let rates = self.rates.read().await;

        let base_rate = rates
            .get(base)
            .ok_or_else(|| RatesError::NotFound(base.to_string()))?;
        let dest_rate = rates
            .get(destination)
            .ok_or_else(|| RatesError::NotFound(destination.to_string()))?;

        Ok(dest_rate / base_rate)
    }

    /// Returns a defensive copy of the whole table.
    pub async fn all(&self) -> HashMap<String, f64> {
        self.rates.read().await.clone()
    }

    /// Starts the monitor task and returns its tick channel.
    ///
    /// Every `interval` the task perturbs all non-EUR rates by a factor in
    /// [0.9, 1.1] and then awaits the tick send, so an unconsumed update
    /// parks the monitor rather than being dropped. The task stops when the
    /// store shuts down or the receiver is dropped.
    pub fn monitor(self: &Arc<Self>, interval: Duration) -> mpsc::Receiver<()> {
        let (tx, rx) = mpsc::channel(1);
        let store = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick of a tokio interval fires immediately; skip it
            // so the first update lands one full interval after startup.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        store.perturb().await;
                        tokio::select! {
                            _ = shutdown.changed() => break,
                            sent = tx.send(()) => {
                                if sent.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                }
            }
            debug!("Rate monitor stopped");
        });

        self.tasks.lock().expect("task list poisoned").push(handle);
        rx
    }

    /// Applies a random factor in [0.9, 1.1] to every non-EUR rate.
    async fn perturb(&self) {
        let mut rates = self.rates.write().await;
        let mut rng = rand::thread_rng();

        for (code, rate) in rates.iter_mut() {
            if code == "EUR" {
                continue;
            }

            let change = rng.gen_range(0.0..0.1);
            let factor = if rng.gen_bool(0.5) {
                1.0 - change
            } else {
                1.0 + change
            };
            *rate *= factor;
        }
    }

    /// Signals the monitor to stop and waits for it. Idempotent.
    pub async fn close(&self) {
        let _ = self.shutdown.send(true);
        let handles: Vec<_> = {
            let mut tasks = self.tasks.lock().expect("task list poisoned");
            tasks.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
        info!("Rate store closed");
    }
}

fn parse_feed(body: &str) -> Result<HashMap<String, f64>, RatesError> {
    let envelope: Envelope = quick_xml::de::from_str(body)?;

    let mut rates: HashMap<String, f64> = envelope
        .cube
        .daily
        .rates
        .into_iter()
        .map(|cube| (cube.currency, cube.rate))
        .collect();

    // EUR is the reference currency and never appears in the feed.
    rates.insert("EUR".to_string(), 1.0);
    Ok(rates)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED_FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gesmes:Envelope xmlns:gesmes="http://www.gesmes.org/xml/2002-08-01"
    xmlns="http://www.ecb.int/vocabulary/2002-08-01/eurofxref">
    <gesmes:subject>Reference rates</gesmes:subject>
    <gesmes:Sender>
        <gesmes:name>European Central Bank</gesmes:name>
    </gesmes:Sender>
    <Cube>
        <Cube time="2024-06-14">
            <Cube currency="USD" rate="1.10"/>
            <Cube currency="GBP" rate="0.85"/>
            <Cube currency="JPY" rate="168.32"/>
        </Cube>
    </Cube>
</gesmes:Envelope>"#;

    fn test_store() -> Arc<RateStore> {
        Arc::new(RateStore::with_rates(HashMap::from([
            ("USD".to_string(), 1.10),
            ("GBP".to_string(), 0.85),
        ])))
    }

    #[test]
    fn test_parse_feed() {
        let rates = parse_feed(FEED_FIXTURE).unwrap();
        assert_eq!(rates.len(), 4);
        assert_eq!(rates["USD"], 1.10);
        assert_eq!(rates["EUR"], 1.0);
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse_feed("not xml at all").is_err());
    }

    #[tokio::test]
    async fn test_rate_from_eur() {
        let store = test_store();
        let rate = store.rate("EUR", "USD").await.unwrap();
        assert!((rate - 1.10).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_rate_inverse() {
        let store = test_store();
        let rate = store.rate("USD", "EUR").await.unwrap();
        assert!((rate - 1.0 / 1.10).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_reciprocal_invariant() {
        let store = test_store();
        for (a, b) in [("EUR", "USD"), ("USD", "GBP"), ("GBP", "EUR")] {
            let forward = store.rate(a, b).await.unwrap();
            let back = store.rate(b, a).await.unwrap();
            assert!((forward * back - 1.0).abs() < 1e-9, "{}/{}", a, b);
        }
    }

    #[tokio::test]
    async fn test_unknown_currency() {
        let store = test_store();
        assert!(matches!(
            store.rate("EUR", "XXX").await,
            Err(RatesError::NotFound(code)) if code == "XXX"
        ));
        assert!(store.rate("XXX", "EUR").await.is_err());
    }

    #[tokio::test]
    async fn test_all_is_a_copy() {
        let store = test_store();
        let mut snapshot = store.all().await;
        snapshot.insert("USD".to_string(), 999.0);
        assert!((store.rate("EUR", "USD").await.unwrap() - 1.10).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_perturb_bounds_and_eur_pinned() {
        let store = test_store();
        store.perturb().await;

        let rates = store.all().await;
        assert_eq!(rates["EUR"], 1.0);
        assert!(rates["USD"] >= 1.10 * 0.9 && rates["USD"] <= 1.10 * 1.1);
        assert!(rates["GBP"] >= 0.85 * 0.9 && rates["GBP"] <= 0.85 * 1.1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_ticks_and_stops() {
        let store = test_store();
        let mut updates = store.monitor(Duration::from_secs(5));

        // One tick per interval, with the rates already perturbed by the
        // time the notification arrives.
        updates.recv().await.expect("first tick");
        let rates = store.all().await;
        assert_eq!(rates["EUR"], 1.0);

        store.close().await;
        // At most one buffered tick can remain; the channel then closes
        // because the monitor task has exited.
        while updates.recv().await.is_some() {}
    }
}
