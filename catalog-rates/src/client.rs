//! Streaming rate client.

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::Channel;
use tonic::{Code, Status, Streaming};
use tracing::{debug, error, info, warn};

use catalog_events::{Event, EventBus, RateChanged};
use catalog_types::{RateError, RateProvider};
use currency_proto::currency_client::CurrencyClient;
use currency_proto::{
    streaming_rate_response, Currencies, Empty, RateRequest, StreamingRateResponse,
};

use crate::cache::RateCache;

/// Pause before re-establishing a broken stream.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// How often the client proves its liveness to the server.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Buffer of the outbound request half of the stream.
const STREAM_BUFFER: usize = 16;

type Outbound = mpsc::Sender<RateRequest>;

/// Client for the currency service.
///
/// Owns the bidirectional subscription stream, a cache of every rate seen
/// on it, and the background tasks (receiver + heartbeat) that keep both
/// alive. Rate changes are published on the shared event bus.
pub struct RateClient {
    client: CurrencyClient<Channel>,
    cache: Arc<RwLock<RateCache>>,
    /// Sending half of the live stream; `None` while disconnected.
    outbound: Arc<Mutex<Option<Outbound>>>,
    /// Currencies already requested on the stream. Survives reconnects so
    /// redundant requests are not re-sent for the client's lifetime.
    subscribed: RwLock<HashSet<String>>,
    bus: Arc<EventBus<Event>>,
    shutdown: watch::Sender<bool>,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

impl RateClient {
    /// Creates the client and starts its receiver and heartbeat tasks.
    ///
    /// The subscription stream is established by the receiver task; if the
    /// currency service is unreachable the client stays in a disconnected
    /// state and keeps retrying with a backoff.
    pub fn new(client: CurrencyClient<Channel>, bus: Arc<EventBus<Event>>) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        let this = Arc::new(Self {
            client: client.clone(),
            cache: Arc::new(RwLock::new(RateCache::new())),
            outbound: Arc::new(Mutex::new(None)),
            subscribed: RwLock::new(HashSet::new()),
            bus,
            shutdown,
            tasks: StdMutex::new(Vec::new()),
        });

        let receiver = tokio::spawn(run_receiver(
            client,
            Arc::clone(&this.outbound),
            Arc::clone(&this.cache),
            Arc::clone(&this.bus),
            this.shutdown.subscribe(),
        ));
        let heartbeat = tokio::spawn(run_heartbeat(
            Arc::clone(&this.outbound),
            this.shutdown.subscribe(),
        ));

        let mut tasks = this.tasks.lock().expect("task list poisoned");
        tasks.push(receiver);
        tasks.push(heartbeat);
        drop(tasks);

        this
    }

    /// Shuts the client down: closes the outbound side of the stream and
    /// joins the background tasks. Idempotent.
    pub async fn close(&self) {
        let _ = self.shutdown.send(true);
        *self.outbound.lock().await = None;

        let handles: Vec<_> = {
            let mut tasks = self.tasks.lock().expect("task list poisoned");
            tasks.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
        info!("Rate client closed");
    }

    fn parse_code(code: &str) -> Result<Currencies, RateError> {
        match Currencies::from_str_name(code) {
            Some(Currencies::Unknown) | None => {
                Err(RateError::InvalidCurrency(code.to_string()))
            }
            Some(currency) => Ok(currency),
        }
    }
}

#[async_trait]
impl RateProvider for RateClient {
    async fn rate(&self, base: &str, destination: &str) -> Result<f64, RateError> {
        debug!(base, destination, "Getting exchange rate");

        // Fast path: the stream keeps this cache current.
        if let Some(rate) = self.cache.read().await.get(destination) {
            return Ok(rate);
        }

        let base_code = Self::parse_code(base)?;
        let destination_code = Self::parse_code(destination)?;

        let mut client = self.client.clone();
        let response = client
            .get_rate(RateRequest::pair(base_code, destination_code))
            .await
            .map_err(|status| status_to_rate_error(status, base, destination))?;
        let rate = response.into_inner().rate;

        self.cache.write().await.apply(destination, rate);

        // Ask for pushes so the next lookup is a cache hit. Failure here is
        // not fatal: the rate we just fetched is still good.
        if let Err(err) = self.subscribe(&[destination.to_string()]).await {
            error!(destination, error = %err, "Failed to subscribe to rate updates");
        }

        Ok(rate)
    }

    async fn subscribe(&self, currencies: &[String]) -> Result<(), RateError> {
        debug!(?currencies, "Subscribing to currency rate updates");

        for code in currencies {
            if self.subscribed.read().await.contains(code) {
                continue;
            }

            let currency = Self::parse_code(code)?;
            let outbound = self.outbound.lock().await.clone();
            let tx = outbound.ok_or_else(|| {
                RateError::Transport("subscription stream not established".to_string())
            })?;

            tx.send(RateRequest::pair(Currencies::Eur, currency))
                .await
                .map_err(|_| {
                    RateError::Transport("subscription stream closed".to_string())
                })?;

            self.subscribed.write().await.insert(code.clone());
        }

        Ok(())
    }

    async fn list_currencies(&self) -> Result<Vec<String>, RateError> {
        let mut client = self.client.clone();
        let response = client
            .list_currencies(Empty {})
            .await
            .map_err(|status| RateError::Transport(status.message().to_string()))?;
        Ok(response.into_inner().currencies)
    }
}

fn status_to_rate_error(status: Status, base: &str, destination: &str) -> RateError {
    match status.code() {
        Code::NotFound => RateError::NotFound(base.to_string(), destination.to_string()),
        Code::InvalidArgument => RateError::InvalidCurrency(status.message().to_string()),
        _ => RateError::Transport(status.message().to_string()),
    }
}

/// Opens a fresh stream and installs its sending half.
async fn initialize_stream(
    client: &mut CurrencyClient<Channel>,
    outbound: &Mutex<Option<Outbound>>,
) -> Result<Streaming<StreamingRateResponse>, Status> {
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    let inbound = client
        .subscribe_rates(ReceiverStream::new(rx))
        .await?
        .into_inner();
    *outbound.lock().await = Some(tx);
    info!("Subscription stream established");
    Ok(inbound)
}

/// Read loop of the subscription stream.
///
/// Applies every rate update to the cache and publishes a `RateChanged`
/// event when the value is new or different. In-band error statuses are
/// logged. Transport failures drop the stream; it is re-established after
/// a pause.
async fn run_receiver(
    mut client: CurrencyClient<Channel>,
    outbound: Arc<Mutex<Option<Outbound>>>,
    cache: Arc<RwLock<RateCache>>,
    bus: Arc<EventBus<Event>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut inbound: Option<Streaming<StreamingRateResponse>> = None;
    let mut first_attempt = true;

    loop {
        let mut stream = match inbound.take() {
            Some(stream) => stream,
            None => {
                if !first_attempt {
                    tokio::select! {
                        _ = shutdown.changed() => return,
                        _ = tokio::time::sleep(RECONNECT_BACKOFF) => {}
                    }
                }
                first_attempt = false;

                match initialize_stream(&mut client, &outbound).await {
                    Ok(stream) => stream,
                    Err(status) => {
                        error!(error = %status, "Error establishing subscription stream");
                        continue;
                    }
                }
            }
        };

        tokio::select! {
            _ = shutdown.changed() => return,
            message = stream.message() => match message {
                Ok(Some(reply)) => {
                    apply_reply(&cache, &bus, reply).await;
                    inbound = Some(stream);
                }
                Ok(None) => {
                    warn!("Server closed the subscription stream");
                    *outbound.lock().await = None;
                }
                Err(status) => {
                    error!(error = %status, "Error receiving rate updates");
                    *outbound.lock().await = None;
                }
            }
        }
    }
}

/// Applies one stream message to the cache, publishing on change.
async fn apply_reply(
    cache: &RwLock<RateCache>,
    bus: &EventBus<Event>,
    reply: StreamingRateResponse,
) {
    match reply.message {
        Some(streaming_rate_response::Message::RateResponse(update)) => {
            let currency = update.destination().as_str_name().to_string();
            let new_rate = update.rate;

            let changed = cache.write().await.apply(&currency, new_rate);
            debug!(%currency, rate = new_rate, "Updated rate");

            if changed {
                bus.publish(Event::RateChanged(RateChanged { currency, new_rate }));
            }
        }
        Some(streaming_rate_response::Message::Error(status)) => {
            warn!(message = %status.message, "Received error from rate server");
        }
        None => {}
    }
}

/// Sends a heartbeat every minute so the server keeps the subscription
/// alive. A failed send means the stream is gone; the receiver loop
/// notices the dead transport and re-establishes it.
async fn run_heartbeat(
    outbound: Arc<Mutex<Option<Outbound>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = ticker.tick() => {
                let tx = outbound.lock().await.clone();
                match tx {
                    Some(tx) => {
                        if tx.send(RateRequest::heartbeat()).await.is_err() {
                            warn!("Failed to send heartbeat, stream is down");
                        } else {
                            debug!("Heartbeat sent");
                        }
                    }
                    None => debug!("Stream not established, skipping heartbeat"),
                }
            }
        }
    }
}
