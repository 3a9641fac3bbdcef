//! Exchange rate provider port.
//!
//! This trait defines the interface the catalog uses to price products in
//! other currencies. The production adapter talks gRPC to the currency
//! service and keeps a live cache; tests plug in a mock.

/// Error type for exchange rate operations.
#[derive(Debug, thiserror::Error)]
pub enum RateError {
    #[error("Unsupported currency: {0}")]
    InvalidCurrency(String),

    #[error("Rate not available for {0} -> {1}")]
    NotFound(String, String),

    #[error("Rate service unavailable: {0}")]
    Transport(String),
}

/// Port trait for exchange rate providers.
#[async_trait::async_trait]
pub trait RateProvider: Send + Sync + 'static {
    /// Returns how many units of `destination` one unit of `base` buys.
    async fn rate(&self, base: &str, destination: &str) -> Result<f64, RateError>;

    /// Registers interest in updates for the given currency codes.
    /// Codes already subscribed are skipped.
    async fn subscribe(&self, currencies: &[String]) -> Result<(), RateError>;

    /// Lists the currency codes the rate service knows about.
    async fn list_currencies(&self) -> Result<Vec<String>, RateError>;
}
