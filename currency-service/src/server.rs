//! gRPC surface of the currency service.
//!
//! Unary `GetRate`/`ListCurrencies` plus the bidirectional `SubscribeRates`
//! stream. Each open stream gets an id and a registry entry holding its
//! registered pairs, its liveness timestamp and the sending half of its
//! response channel. A fan-out task pushes fresh rates to every registered
//! pair on each monitor tick; a reaper evicts streams that have been silent
//! for too long.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Code, Request, Response, Status, Streaming};
use tracing::{debug, error, info, warn};

use currency_proto::currency_server::Currency;
use currency_proto::{
    Currencies, CurrencyList, Empty, RateRequest, RateResponse, StreamingRateResponse,
};

use crate::rates::RateStore;

/// How often the reaper scans for stale subscriptions.
const REAP_INTERVAL: Duration = Duration::from_secs(60);

/// A subscription with no traffic (heartbeat or request) for this long is
/// evicted.
const STALE_AFTER: Duration = Duration::from_secs(5 * 60);

/// Outbound buffer per stream. A client that stops reading parks the fan-out
/// on this stream until the send fails or the buffer drains.
const OUTBOUND_BUFFER: usize = 16;

/// Stable identifier assigned to each accepted stream. The registry refers
/// to streams only through this id, never the transport handle.
pub type StreamId = u64;

type OutboundSender = mpsc::Sender<Result<StreamingRateResponse, Status>>;

struct Subscription {
    requests: Vec<(Currencies, Currencies)>,
    last_activity: Instant,
    tx: OutboundSender,
}

pub enum RegisterOutcome {
    Registered,
    Duplicate,
}

/// Per-stream subscription state behind a reader-writer lock.
///
/// Writers are the inbound receivers, the reaper and fan-out failure
/// cleanup; the fan-out reads a snapshot.
pub struct SubscriptionRegistry {
    inner: RwLock<HashMap<StreamId, Subscription>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Refreshes the liveness timestamp of an existing subscription.
    /// A heartbeat from a stream that never registered anything is a no-op:
    /// subscriptions are created lazily by the first real request.
    pub async fn touch(&self, id: StreamId) {
        if let Some(sub) = self.inner.write().await.get_mut(&id) {
            sub.last_activity = Instant::now();
        }
    }

    /// Adds a pair for the stream, creating the subscription on first use.
    pub async fn register(
        &self,
        id: StreamId,
        tx: &OutboundSender,
        base: Currencies,
        destination: Currencies,
    ) -> RegisterOutcome {
        let mut inner = self.inner.write().await;
        let sub = inner.entry(id).or_insert_with(|| Subscription {
            requests: Vec::new(),
            last_activity: Instant::now(),
            tx: tx.clone(),
        });

        if sub.requests.contains(&(base, destination)) {
            return RegisterOutcome::Duplicate;
        }

        sub.requests.push((base, destination));
        sub.last_activity = Instant::now();
        RegisterOutcome::Registered
    }

    /// Drops the subscription for a closed or failed stream.
    pub async fn remove(&self, id: StreamId) {
        self.inner.write().await.remove(&id);
    }

    /// Removes every subscription idle longer than `max_idle` and returns
    /// the evicted ids.
    pub async fn evict_stale(&self, max_idle: Duration) -> Vec<StreamId> {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        let stale: Vec<StreamId> = inner
            .iter()
            .filter(|(_, sub)| now.duration_since(sub.last_activity) > max_idle)
            .map(|(id, _)| *id)
            .collect();

        for id in &stale {
            inner.remove(id);
        }
        stale
    }

    /// Snapshot of every stream's registered pairs and sender, so the
    /// fan-out can run without holding the lock across sends.
    async fn snapshot(&self) -> Vec<(StreamId, Vec<(Currencies, Currencies)>, OutboundSender)> {
        self.inner
            .read()
            .await
            .iter()
            .map(|(id, sub)| (*id, sub.requests.clone(), sub.tx.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks a stream or unary request for a usable pair.
fn validate_pair(request: &RateRequest) -> Result<(Currencies, Currencies), String> {
    let base = request.base();
    let destination = request.destination();

    if base == Currencies::Unknown {
        return Err("base currency is not specified".to_string());
    }
    if destination == Currencies::Unknown {
        return Err("destination currency is not specified".to_string());
    }
    if base == destination {
        return Err("base and destination currencies must differ".to_string());
    }

    Ok((base, destination))
}

/// Applies one inbound stream message to the registry.
///
/// Heartbeats only refresh liveness. Invalid and duplicate requests are
/// answered with an in-band `ErrorStatus` on the stream, which stays open
/// either way.
pub async fn handle_stream_request(
    registry: &SubscriptionRegistry,
    id: StreamId,
    tx: &OutboundSender,
    request: RateRequest,
) {
    if request.is_heartbeat() {
        debug!(stream = id, "Heartbeat received");
        registry.touch(id).await;
        return;
    }

    match validate_pair(&request) {
        Err(message) => {
            warn!(stream = id, %message, "Rejecting subscription request");
            let reply = StreamingRateResponse::error(Code::InvalidArgument, message, request);
            let _ = tx.send(Ok(reply)).await;
        }
        Ok((base, destination)) => {
            match registry.register(id, tx, base, destination).await {
                RegisterOutcome::Registered => {
                    info!(
                        stream = id,
                        base = base.as_str_name(),
                        destination = destination.as_str_name(),
                        "Registered rate subscription"
                    );
                }
                RegisterOutcome::Duplicate => {
                    let message = format!(
                        "subscription already exists for {}/{}",
                        base.as_str_name(),
                        destination.as_str_name()
                    );
                    warn!(stream = id, %message, "Rejecting duplicate subscription");
                    let reply =
                        StreamingRateResponse::error(Code::InvalidArgument, message, request);
                    let _ = tx.send(Ok(reply)).await;
                }
            }
        }
    }
}

/// Pushes the current rate for every registered pair to its stream.
///
/// A failed rate lookup skips that pair; a failed send means the client is
/// gone, so its whole subscription is dropped.
pub async fn fan_out(registry: &SubscriptionRegistry, rates: &RateStore) {
    for (id, requests, tx) in registry.snapshot().await {
        for (base, destination) in requests {
            let rate = match rates
                .rate(base.as_str_name(), destination.as_str_name())
                .await
            {
                Ok(rate) => rate,
                Err(err) => {
                    error!(
                        stream = id,
                        base = base.as_str_name(),
                        destination = destination.as_str_name(),
                        error = %err,
                        "Unable to get updated rate"
                    );
                    continue;
                }
            };

            let update = StreamingRateResponse::rate(RateResponse {
                base: base as i32,
                destination: destination as i32,
                rate,
            });

            if tx.send(Ok(update)).await.is_err() {
                debug!(stream = id, "Client stream closed, dropping subscription");
                registry.remove(id).await;
                break;
            }
        }
    }
}

/// The gRPC service implementation.
pub struct CurrencyService {
    rates: Arc<RateStore>,
    registry: Arc<SubscriptionRegistry>,
    next_stream_id: AtomicU64,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CurrencyService {
    /// Creates the service and starts its fan-out and reaper tasks.
    pub fn new(rates: Arc<RateStore>, monitor_interval: Duration) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());
        let (shutdown, _) = watch::channel(false);
        let mut tasks = Vec::new();

        // Fan-out: one pass over the registry per monitor tick. Ends when
        // the store's monitor channel closes on shutdown.
        let mut updates = rates.monitor(monitor_interval);
        {
            let registry = Arc::clone(&registry);
            let rates = Arc::clone(&rates);
            let mut shutdown_rx = shutdown.subscribe();
            tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown_rx.changed() => break,
                        tick = updates.recv() => match tick {
                            Some(()) => {
                                debug!("Got updated rates");
                                fan_out(&registry, &rates).await;
                            }
                            None => break,
                        }
                    }
                }
                debug!("Fan-out task stopped");
            }));
        }

        // Reaper: evict streams that went silent.
        {
            let registry = Arc::clone(&registry);
            let mut shutdown_rx = shutdown.subscribe();
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(REAP_INTERVAL);
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = shutdown_rx.changed() => break,
                        _ = ticker.tick() => {
                            for id in registry.evict_stale(STALE_AFTER).await {
                                info!(stream = id, "Evicted stale subscription");
                            }
                        }
                    }
                }
                debug!("Reaper task stopped");
            }));
        }

        Self {
            rates,
            registry,
            next_stream_id: AtomicU64::new(1),
            shutdown,
            tasks: Mutex::new(tasks),
        }
    }

    /// Number of live subscriptions, for logging and tests.
    pub async fn subscription_count(&self) -> usize {
        self.registry.len().await
    }

    /// Stops the fan-out and reaper tasks. Idempotent; callers bound the
    /// whole shutdown sequence with a deadline.
    pub async fn close(&self) {
        let _ = self.shutdown.send(true);
        let handles: Vec<_> = {
            let mut tasks = self.tasks.lock().expect("task list poisoned");
            tasks.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
        info!("Currency service closed");
    }
}

#[tonic::async_trait]
impl Currency for CurrencyService {
    async fn get_rate(
        &self,
        request: Request<RateRequest>,
    ) -> Result<Response<RateResponse>, Status> {
        let request = request.into_inner();
        debug!(
            base = request.base().as_str_name(),
            destination = request.destination().as_str_name(),
            "Handling GetRate"
        );

        let (base, destination) =
            validate_pair(&request).map_err(Status::invalid_argument)?;

        let rate = self
            .rates
            .rate(base.as_str_name(), destination.as_str_name())
            .await
            .map_err(|err| Status::not_found(err.to_string()))?;

        Ok(Response::new(RateResponse {
            base: base as i32,
            destination: destination as i32,
            rate,
        }))
    }

    async fn list_currencies(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<CurrencyList>, Status> {
        let mut currencies: Vec<String> = self.rates.all().await.into_keys().collect();
        currencies.sort();

        Ok(Response::new(CurrencyList { currencies }))
    }

    type SubscribeRatesStream = ReceiverStream<Result<StreamingRateResponse, Status>>;

    async fn subscribe_rates(
        &self,
        request: Request<Streaming<RateRequest>>,
    ) -> Result<Response<Self::SubscribeRatesStream>, Status> {
        let mut inbound = request.into_inner();
        let id = self.next_stream_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        let registry = Arc::clone(&self.registry);

        info!(stream = id, "Subscription stream opened");

        tokio::spawn(async move {
            loop {
                match inbound.message().await {
                    Ok(Some(request)) => {
                        handle_stream_request(&registry, id, &tx, request).await;
                    }
                    Ok(None) => {
                        info!(stream = id, "Client closed the subscription stream");
                        registry.remove(id).await;
                        break;
                    }
                    Err(status) => {
                        error!(stream = id, error = %status, "Unable to read from client");
                        registry.remove(id).await;
                        let _ = tx
                            .send(Err(Status::internal("subscription stream failed")))
                            .await;
                        break;
                    }
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use currency_proto::streaming_rate_response::Message;

    fn test_rates() -> Arc<RateStore> {
        Arc::new(RateStore::with_rates(HashMap::from([(
            "USD".to_string(),
            1.10,
        )])))
    }

    fn outbound() -> (OutboundSender, mpsc::Receiver<Result<StreamingRateResponse, Status>>) {
        mpsc::channel(OUTBOUND_BUFFER)
    }

    fn error_of(reply: StreamingRateResponse) -> currency_proto::ErrorStatus {
        match reply.message {
            Some(Message::Error(status)) => status,
            other => panic!("expected error status, got {:?}", other),
        }
    }

    fn rate_of(reply: StreamingRateResponse) -> RateResponse {
        match reply.message {
            Some(Message::RateResponse(rate)) => rate,
            other => panic!("expected rate response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_first_request_creates_subscription() {
        let registry = SubscriptionRegistry::new();
        let (tx, mut rx) = outbound();

        let request = RateRequest::pair(Currencies::Eur, Currencies::Usd);
        handle_stream_request(&registry, 1, &tx, request).await;

        assert_eq!(registry.len().await, 1);
        assert!(rx.try_recv().is_err(), "registration must not reply");
    }

    #[tokio::test]
    async fn test_duplicate_pair_rejected_once() {
        let registry = SubscriptionRegistry::new();
        let (tx, mut rx) = outbound();

        let request = RateRequest::pair(Currencies::Eur, Currencies::Usd);
        handle_stream_request(&registry, 1, &tx, request.clone()).await;
        handle_stream_request(&registry, 1, &tx, request.clone()).await;

        let status = error_of(rx.recv().await.unwrap().unwrap());
        assert_eq!(status.code, Code::InvalidArgument as i32);
        assert_eq!(status.request, Some(request));

        // Still a single registration with a single pair.
        assert_eq!(registry.len().await, 1);
        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot[0].1.len(), 1);
    }

    #[tokio::test]
    async fn test_heartbeat_never_registers_or_replies() {
        let registry = SubscriptionRegistry::new();
        let (tx, mut rx) = outbound();

        handle_stream_request(&registry, 1, &tx, RateRequest::heartbeat()).await;

        assert_eq!(registry.len().await, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_invalid_pairs_answered_in_band() {
        let registry = SubscriptionRegistry::new();
        let (tx, mut rx) = outbound();

        for request in [
            RateRequest::pair(Currencies::Unknown, Currencies::Usd),
            RateRequest::pair(Currencies::Eur, Currencies::Unknown),
            RateRequest::pair(Currencies::Usd, Currencies::Usd),
        ] {
            handle_stream_request(&registry, 1, &tx, request).await;
            let status = error_of(rx.recv().await.unwrap().unwrap());
            assert_eq!(status.code, Code::InvalidArgument as i32);
        }

        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn test_fan_out_sends_current_rate() {
        let rates = test_rates();
        let registry = SubscriptionRegistry::new();
        let (tx, mut rx) = outbound();

        let request = RateRequest::pair(Currencies::Eur, Currencies::Usd);
        handle_stream_request(&registry, 1, &tx, request).await;

        fan_out(&registry, &rates).await;

        let update = rate_of(rx.recv().await.unwrap().unwrap());
        assert_eq!(update.base(), Currencies::Eur);
        assert_eq!(update.destination(), Currencies::Usd);
        assert!((update.rate - 1.10).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_fan_out_drops_closed_streams() {
        let rates = test_rates();
        let registry = SubscriptionRegistry::new();
        let (tx, rx) = outbound();

        let request = RateRequest::pair(Currencies::Eur, Currencies::Usd);
        handle_stream_request(&registry, 1, &tx, request).await;

        drop(rx);
        fan_out(&registry, &rates).await;

        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn test_fan_out_skips_unresolvable_pairs() {
        let rates = test_rates();
        let registry = SubscriptionRegistry::new();
        let (tx, mut rx) = outbound();

        // GBP is not in the table; the pair is skipped but the subscription
        // survives and other pairs still get their update.
        handle_stream_request(
            &registry,
            1,
            &tx,
            RateRequest::pair(Currencies::Eur, Currencies::Gbp),
        )
        .await;
        handle_stream_request(
            &registry,
            1,
            &tx,
            RateRequest::pair(Currencies::Eur, Currencies::Usd),
        )
        .await;

        fan_out(&registry, &rates).await;

        let update = rate_of(rx.recv().await.unwrap().unwrap());
        assert_eq!(update.destination(), Currencies::Usd);
        assert!(rx.try_recv().is_err());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_evicts_silent_streams() {
        let registry = SubscriptionRegistry::new();
        let (tx, _rx) = outbound();

        handle_stream_request(
            &registry,
            1,
            &tx,
            RateRequest::pair(Currencies::Eur, Currencies::Usd),
        )
        .await;

        tokio::time::advance(Duration::from_secs(6 * 60)).await;
        let evicted = registry.evict_stale(STALE_AFTER).await;

        assert_eq!(evicted, vec![1]);
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_keeps_subscription_alive() {
        let registry = SubscriptionRegistry::new();
        let (tx, _rx) = outbound();

        handle_stream_request(
            &registry,
            1,
            &tx,
            RateRequest::pair(Currencies::Eur, Currencies::Usd),
        )
        .await;

        tokio::time::advance(Duration::from_secs(4 * 60)).await;
        handle_stream_request(&registry, 1, &tx, RateRequest::heartbeat()).await;

        tokio::time::advance(Duration::from_secs(4 * 60)).await;
        assert!(registry.evict_stale(STALE_AFTER).await.is_empty());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_rate_validation_and_lookup() {
        let service = CurrencyService::new(test_rates(), Duration::from_secs(3600));

        let ok = service
            .get_rate(Request::new(RateRequest::pair(
                Currencies::Eur,
                Currencies::Usd,
            )))
            .await
            .unwrap()
            .into_inner();
        assert!((ok.rate - 1.10).abs() < 1e-9);

        let inverse = service
            .get_rate(Request::new(RateRequest::pair(
                Currencies::Usd,
                Currencies::Eur,
            )))
            .await
            .unwrap()
            .into_inner();
        assert!((inverse.rate - 1.0 / 1.10).abs() < 1e-9);

        let invalid = service
            .get_rate(Request::new(RateRequest::heartbeat()))
            .await
            .unwrap_err();
        assert_eq!(invalid.code(), Code::InvalidArgument);

        let same = service
            .get_rate(Request::new(RateRequest::pair(
                Currencies::Usd,
                Currencies::Usd,
            )))
            .await
            .unwrap_err();
        assert_eq!(same.code(), Code::InvalidArgument);

        let missing = service
            .get_rate(Request::new(RateRequest::pair(
                Currencies::Eur,
                Currencies::Gbp,
            )))
            .await
            .unwrap_err();
        assert_eq!(missing.code(), Code::NotFound);

        service.close().await;
    }

    #[tokio::test]
    async fn test_list_currencies_sorted() {
        let service = CurrencyService::new(test_rates(), Duration::from_secs(3600));

        let list = service
            .list_currencies(Request::new(Empty {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(list.currencies, vec!["EUR".to_string(), "USD".to_string()]);

        service.close().await;
    }
}
