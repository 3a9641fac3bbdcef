//! Catalog Application Service
//!
//! Orchestrates domain operations through the repository and rate provider
//! ports, publishes catalog events, and runs the price projector that turns
//! rate changes into per-product price updates.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use catalog_events::{
    Event, EventBus, PriceUpdate, ProductAdded, ProductDeleted, ProductUpdated, Subscription,
};
use catalog_types::{
    AppError, Product, ProductDraft, ProductId, ProductRepository, RateProvider,
};

/// Application service for catalog operations.
///
/// Generic over the repository and rate provider ports - the adapters are
/// injected at construction. Creating the service also starts the price
/// projector: a task that reacts to every `RateChanged` event by publishing
/// a `PriceUpdate` for each product in the catalog.
pub struct ProductService<R: ProductRepository, P: RateProvider> {
    repo: Arc<R>,
    rates: Arc<P>,
    bus: Arc<EventBus<Event>>,
    projector: Mutex<Option<(u64, JoinHandle<()>)>>,
}

impl<R: ProductRepository, P: RateProvider> ProductService<R, P> {
    /// Creates the service and starts the price projector.
    pub fn new(repo: Arc<R>, rates: Arc<P>, bus: Arc<EventBus<Event>>) -> Self {
        let subscription = bus.subscribe();
        let subscriber_id = subscription.id();
        let handle = tokio::spawn(run_projector(
            subscription,
            Arc::clone(&repo),
            Arc::clone(&bus),
        ));

        Self {
            repo,
            rates,
            bus,
            projector: Mutex::new(Some((subscriber_id, handle))),
        }
    }

    /// Lists all products, priced in `currency` when one is given.
    ///
    /// Priced reads scale a copy of each product; the stored catalog always
    /// stays in EUR.
    pub async fn get_products(&self, currency: Option<&str>) -> Result<Vec<Product>, AppError> {
        let products = self.repo.get_all().await?;

        let Some(code) = currency.filter(|c| !c.is_empty()) else {
            return Ok(products);
        };

        let rate = self.rates.rate("EUR", code).await?;
        Ok(products
            .iter()
            .map(|p| p.with_price_scaled(rate))
            .collect())
    }

    /// Returns one product, priced in `currency` when one is given.
    pub async fn get_product(
        &self,
        id: ProductId,
        currency: Option<&str>,
    ) -> Result<Product, AppError> {
        let product = self.repo.get_by_id(id).await?;

        let Some(code) = currency.filter(|c| !c.is_empty()) else {
            return Ok(product);
        };

        let rate = self.rates.rate("EUR", code).await?;
        Ok(product.with_price_scaled(rate))
    }

    /// Validates and stores a new product, then publishes `ProductAdded`.
    pub async fn add_product(&self, draft: ProductDraft) -> Result<Product, AppError> {
        let product = draft.into_product(0);
        product.validate().map_err(AppError::Validation)?;

        let stored = self.repo.add(product).await?;
        info!(id = stored.id, name = %stored.name, "Product added");

        self.bus.publish(Event::ProductAdded(ProductAdded {
            product_id: stored.id,
        }));
        Ok(stored)
    }

    /// Validates and replaces an existing product, then publishes
    /// `ProductUpdated`.
    pub async fn update_product(
        &self,
        id: ProductId,
        draft: ProductDraft,
    ) -> Result<(), AppError> {
        let product = draft.into_product(id);
        product.validate().map_err(AppError::Validation)?;

        self.repo.update(product).await?;
        info!(id, "Product updated");

        self.bus
            .publish(Event::ProductUpdated(ProductUpdated { product_id: id }));
        Ok(())
    }

    /// Deletes a product, then publishes `ProductDeleted`.
    pub async fn delete_product(&self, id: ProductId) -> Result<(), AppError> {
        self.repo.delete(id).await?;
        info!(id, "Product deleted");

        self.bus
            .publish(Event::ProductDeleted(ProductDeleted { product_id: id }));
        Ok(())
    }

    /// Lists the currency codes the rate service supports.
    pub async fn list_currencies(&self) -> Result<Vec<String>, AppError> {
        Ok(self.rates.list_currencies().await?)
    }

    /// Stops the price projector. Idempotent.
    pub async fn close(&self) {
        let projector = {
            let mut slot = self.projector.lock().expect("projector slot poisoned");
            slot.take()
        };

        if let Some((subscriber_id, handle)) = projector {
            // Unsubscribing closes the projector's queue; the task drains it
            // and exits.
            self.bus.unsubscribe(subscriber_id);
            let _ = handle.await;
        }
        info!("Product service closed");
    }
}

/// Reacts to rate changes by republishing a price update per product.
/// Other event kinds on the bus are ignored.
async fn run_projector<R: ProductRepository>(
    mut subscription: Subscription<Event>,
    repo: Arc<R>,
    bus: Arc<EventBus<Event>>,
) {
    while let Some(event) = subscription.recv().await {
        let Event::RateChanged(rate) = event else {
            continue;
        };

        debug!(
            currency = %rate.currency,
            new_rate = rate.new_rate,
            "Projecting rate change into price updates"
        );

        let products = match repo.get_all().await {
            Ok(products) => products,
            Err(err) => {
                error!(error = %err, "Failed to load products for price updates");
                continue;
            }
        };

        for product in products {
            bus.publish(Event::PriceUpdate(PriceUpdate {
                product_id: product.id,
                new_price: product.price * rate.new_rate,
                currency: rate.currency.clone(),
            }));
        }
    }
    debug!("Price projector stopped");
}
