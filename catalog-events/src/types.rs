//! Event payloads carried on the catalog bus.

use serde::{Deserialize, Serialize};

use catalog_types::ProductId;

/// An exchange rate changed on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateChanged {
    pub currency: String,
    pub new_rate: f64,
}

/// A product's price expressed in a foreign currency changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub product_id: ProductId,
    pub new_price: f64,
    pub currency: String,
}

/// A product was added to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAdded {
    pub product_id: ProductId,
}

/// A product was updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdated {
    pub product_id: ProductId,
}

/// A product was deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDeleted {
    pub product_id: ProductId,
}

/// The sum of everything that travels on the catalog bus.
/// Subscribers dispatch on the variant and ignore what they don't handle.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    RateChanged(RateChanged),
    PriceUpdate(PriceUpdate),
    ProductAdded(ProductAdded),
    ProductUpdated(ProductUpdated),
    ProductDeleted(ProductDeleted),
}
