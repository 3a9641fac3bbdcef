//! # Catalog Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Dial the currency service and probe it once
//! - Create the event bus, rate client, repository and product service
//! - Start the HTTP server
//!
//! The event bus is created first and closed implicitly last: every other
//! component only holds a handle to it.

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use opentelemetry::global;
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace as sdktrace};
use tonic::transport::Channel;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catalog_events::{Event, EventBus};
use catalog_hex::{inbound::HttpServer, ProductService};
use catalog_rates::RateClient;
use catalog_repo::build_repo;
use currency_proto::currency_client::CurrencyClient;
use currency_proto::{Currencies, RateRequest};

fn init_tracer() -> (sdktrace::Tracer, sdktrace::SdkTracerProvider) {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // Use gRPC exporter with batch processing (non-blocking)
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()
        .expect("failed to create OTLP span exporter");

    let provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();

    global::set_tracer_provider(provider.clone());

    use opentelemetry::trace::TracerProvider as _;
    (provider.tracer("catalog-service"), provider)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize OpenTelemetry tracing
    let (otel_tracer, otel_provider) = init_tracer();
    let telemetry = tracing_opentelemetry::layer().with_tracer(otel_tracer);

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,catalog_app=debug,catalog_hex=debug,catalog_rates=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry)
        .init();

    // Load configuration
    let config = config::Config::from_env()?;

    tracing::info!("Starting catalog server on {}", config.bind_address);
    tracing::info!("Using currency service at {}", config.currency_grpc_url);

    // Dial the currency service and make sure it answers before serving
    // traffic; a missing upstream is a fatal startup error.
    let channel = Channel::from_shared(config.currency_grpc_url.clone())
        .context("invalid currency service url")?
        .connect_lazy();
    check_currency_service(channel.clone())
        .await
        .context("currency service is not available")?;

    // The event bus is shared between the rate client, the product service
    // and every push session.
    let bus = Arc::new(EventBus::<Event>::new());

    // Rate client: opens the subscription stream and keeps the rate cache
    // current in the background.
    let rate_client = RateClient::new(CurrencyClient::new(channel), Arc::clone(&bus));

    // Repository and product service (this also starts the price projector).
    let repo = Arc::new(build_repo());
    let service = Arc::new(ProductService::new(
        repo,
        Arc::clone(&rate_client),
        Arc::clone(&bus),
    ));

    // Create and run the HTTP server
    let server =
        HttpServer::new(Arc::clone(&service), Arc::clone(&bus)).with_ui_origin(config.ui_origin.as_str());
    server.run(&config.bind_address).await?;

    // The HTTP server has drained; stop the background machinery in order.
    service.close().await;
    rate_client.close().await;

    // Ensure traces are flushed before exit
    let _ = otel_provider.shutdown();
    Ok(())
}

/// One unary call with a short deadline, so a missing currency service
/// fails startup instead of the first user request.
async fn check_currency_service(channel: Channel) -> anyhow::Result<()> {
    let mut client = CurrencyClient::new(channel);

    let mut request = tonic::Request::new(RateRequest::pair(Currencies::Eur, Currencies::Usd));
    request.set_timeout(Duration::from_secs(5));

    client.get_rate(request).await?;
    Ok(())
}
