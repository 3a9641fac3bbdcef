//! Client example demonstrating catalog flows against an in-process server.
//!
//! Uses a fixed-rate provider so it runs without the currency service.
//!
//! Run with: cargo run -p catalog-app --example client_example

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpListener;

use catalog_client::CatalogClient;
use catalog_events::EventBus;
use catalog_hex::{inbound::HttpServer, ProductService};
use catalog_repo::build_repo;
use catalog_types::{ProductDraft, RateError, RateProvider};

/// Fixed rates so the example does not need the currency service running.
struct FixedRates(HashMap<String, f64>);

#[async_trait]
impl RateProvider for FixedRates {
    async fn rate(&self, _base: &str, destination: &str) -> Result<f64, RateError> {
        self.0
            .get(destination)
            .copied()
            .ok_or_else(|| RateError::InvalidCurrency(destination.to_string()))
    }

    async fn subscribe(&self, _currencies: &[String]) -> Result<(), RateError> {
        Ok(())
    }

    async fn list_currencies(&self) -> Result<Vec<String>, RateError> {
        Ok(vec!["EUR".to_string(), "USD".to_string(), "GBP".to_string()])
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt().with_env_filter("info").init();

    // Find an available port
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr: SocketAddr = listener.local_addr()?;
    let port = addr.port();
    drop(listener);

    println!("🚀 Starting catalog server on port {port}...");

    let bus = Arc::new(EventBus::new());
    let rates = Arc::new(FixedRates(HashMap::from([
        ("USD".to_string(), 1.10),
        ("GBP".to_string(), 0.85),
    ])));
    let service = Arc::new(ProductService::new(
        Arc::new(build_repo()),
        rates,
        Arc::clone(&bus),
    ));

    let router = HttpServer::new(Arc::clone(&service), bus).router();

    let server_addr = format!("127.0.0.1:{port}");
    tokio::spawn(async move {
        axum::serve(
            TcpListener::bind(&server_addr).await.unwrap(),
            router.into_make_service(),
        )
        .await
        .unwrap();
    });

    // Wait for server to start
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;

    // Create client
    let base_url = format!("http://127.0.0.1:{port}");
    let client = CatalogClient::new(&base_url);

    // ─────────────────────────────────────────────────────────────────────────
    // Demo: Full catalog flow
    // ─────────────────────────────────────────────────────────────────────────

    // Health check
    let health = client.health().await?;
    println!("✅ Server health: {health}");

    // The seed catalog
    let products = client.products(None).await?;
    println!("\n📋 Seed catalog:");
    for product in &products {
        println!("   - {} ({}): €{:.2}", product.name, product.sku, product.price);
    }

    // The same catalog priced in USD
    let priced = client.products(Some("USD")).await?;
    println!("\n📋 Priced in USD:");
    for product in &priced {
        println!("   - {}: ${:.2}", product.name, product.price);
    }

    // Add a product
    let mocha = client
        .add_product(&ProductDraft {
            name: "Mocha".to_string(),
            description: "Chocolate flavoured coffee".to_string(),
            price: 3.10,
            sku: "cof-moc-reg".to_string(),
        })
        .await?;
    println!("\n✅ Added product: {} (id={})", mocha.name, mocha.id);

    // Update it
    client
        .update_product(
            mocha.id,
            &ProductDraft {
                name: "Mocha".to_string(),
                description: "Chocolate flavoured coffee".to_string(),
                price: 3.25,
                sku: "cof-moc-reg".to_string(),
            },
        )
        .await?;
    let updated = client.product(mocha.id, None).await?;
    println!("✅ Updated price: €{:.2}", updated.price);

    // Validation errors surface as API errors
    let invalid = client
        .add_product(&ProductDraft {
            name: String::new(),
            description: String::new(),
            price: -1.0,
            sku: "nope".to_string(),
        })
        .await;
    println!("✅ Invalid product rejected: {}", invalid.unwrap_err());

    // Delete it again
    client.delete_product(mocha.id).await?;
    println!("✅ Deleted product {}", mocha.id);

    // Available currencies
    let currencies = client.currencies().await?;
    println!("\n💱 Currencies: {}", currencies.join(", "));

    println!("\n🎉 Example completed successfully!");

    Ok(())
}
