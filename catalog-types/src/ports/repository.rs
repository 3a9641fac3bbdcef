//! Repository port trait.
//!
//! This is the primary port in our hexagonal architecture.
//! Adapters (in-memory today, a database tomorrow) implement this trait.

use crate::domain::{Product, ProductId};
use crate::error::RepoError;

/// The main repository port for catalog operations.
#[async_trait::async_trait]
pub trait ProductRepository: Send + Sync + 'static {
    /// Returns a snapshot of every product in the catalog.
    async fn get_all(&self) -> Result<Vec<Product>, RepoError>;

    /// Returns the product with the given id.
    async fn get_by_id(&self, id: ProductId) -> Result<Product, RepoError>;

    /// Stores a new product. The repository assigns the identifier; the
    /// returned product carries it.
    async fn add(&self, product: Product) -> Result<Product, RepoError>;

    /// Replaces the product with the same id.
    async fn update(&self, product: Product) -> Result<(), RepoError>;

    /// Removes the product with the given id.
    async fn delete(&self, id: ProductId) -> Result<(), RepoError>;
}
