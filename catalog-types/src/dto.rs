//! Data Transfer Objects (DTOs) for requests and responses.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Product, ProductId};

/// Incoming payload for creating or updating a product. The identifier is
/// assigned by the repository (create) or taken from the path (update), so
/// it is not part of the body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductDraft {
    #[schema(example = "Latte")]
    pub name: String,
    #[serde(default)]
    #[schema(example = "Frothy milky coffee")]
    pub description: String,
    #[schema(example = 2.45)]
    pub price: f64,
    #[schema(example = "lat-tte-cof")]
    pub sku: String,
}

impl ProductDraft {
    /// Materialises the draft as a product with the given identifier.
    pub fn into_product(self, id: ProductId) -> Product {
        Product {
            id,
            name: self.name,
            description: self.description,
            price: self.price,
            sku: self.sku,
        }
    }
}

/// Generic error body returned by the HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub code: u16,
}
