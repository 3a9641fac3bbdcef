//! In-memory product repository.

use async_trait::async_trait;
use tokio::sync::RwLock;

use catalog_types::{DomainError, Product, ProductId, ProductRepository, RepoError};

struct Inner {
    products: Vec<Product>,
    /// Next id to hand out. Only ever grows, so deleted ids are never
    /// reissued.
    next_id: ProductId,
}

/// Thread-safe in-memory product list.
pub struct MemoryProductRepository {
    inner: RwLock<Inner>,
}

impl MemoryProductRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::from_products(Vec::new())
    }

    /// Creates a repository pre-populated with demo products.
    pub fn with_seed_data() -> Self {
        Self::from_products(vec![
            Product {
                id: 1,
                name: "Latte".to_string(),
                description: "Frothy milky coffee".to_string(),
                price: 2.45,
                sku: "cof-lat-reg".to_string(),
            },
            Product {
                id: 2,
                name: "Espresso".to_string(),
                description: "Short and strong coffee without milk".to_string(),
                price: 1.99,
                sku: "cof-esp-reg".to_string(),
            },
        ])
    }

    fn from_products(products: Vec<Product>) -> Self {
        let next_id = products.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        Self {
            inner: RwLock::new(Inner { products, next_id }),
        }
    }
}

impl Default for MemoryProductRepository {
    fn default() -> Self {
        Self::with_seed_data()
    }
}

#[async_trait]
impl ProductRepository for MemoryProductRepository {
    async fn get_all(&self) -> Result<Vec<Product>, RepoError> {
        let inner = self.inner.read().await;
        Ok(inner.products.clone())
    }

    async fn get_by_id(&self, id: ProductId) -> Result<Product, RepoError> {
        let inner = self.inner.read().await;
        inner
            .products
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(RepoError::Domain(DomainError::ProductNotFound(id)))
    }

    async fn add(&self, mut product: Product) -> Result<Product, RepoError> {
        let mut inner = self.inner.write().await;
        product.id = inner.next_id;
        inner.next_id += 1;
        inner.products.push(product.clone());
        Ok(product)
    }

    async fn update(&self, product: Product) -> Result<(), RepoError> {
        let mut inner = self.inner.write().await;
        match inner.products.iter_mut().find(|p| p.id == product.id) {
            Some(slot) => {
                *slot = product;
                Ok(())
            }
            None => Err(RepoError::Domain(DomainError::ProductNotFound(product.id))),
        }
    }

    async fn delete(&self, id: ProductId) -> Result<(), RepoError> {
        let mut inner = self.inner.write().await;
        let before = inner.products.len();
        inner.products.retain(|p| p.id != id);
        if inner.products.len() == before {
            return Err(RepoError::Domain(DomainError::ProductNotFound(id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str) -> Product {
        Product {
            id: 0,
            name: name.to_string(),
            description: String::new(),
            price: 1.0,
            sku: "aaa-bbb-ccc".to_string(),
        }
    }

    #[tokio::test]
    async fn test_seed_data_present() {
        let repo = MemoryProductRepository::with_seed_data();
        let all = repo.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, 1);
    }

    #[tokio::test]
    async fn test_add_assigns_next_id() {
        let repo = MemoryProductRepository::with_seed_data();
        let added = repo.add(draft("Mocha")).await.unwrap();
        assert_eq!(added.id, 3);

        let fetched = repo.get_by_id(3).await.unwrap();
        assert_eq!(fetched.name, "Mocha");
    }

    #[tokio::test]
    async fn test_ids_never_reused_after_delete() {
        let repo = MemoryProductRepository::with_seed_data();
        let added = repo.add(draft("Mocha")).await.unwrap();
        assert_eq!(added.id, 3);

        repo.delete(3).await.unwrap();

        let readded = repo.add(draft("Flat White")).await.unwrap();
        assert_eq!(readded.id, 4);
    }

    #[tokio::test]
    async fn test_update_replaces() {
        let repo = MemoryProductRepository::with_seed_data();
        let mut latte = repo.get_by_id(1).await.unwrap();
        latte.price = 2.99;
        repo.update(latte).await.unwrap();

        let fetched = repo.get_by_id(1).await.unwrap();
        assert!((fetched.price - 2.99).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_missing_product_errors() {
        let repo = MemoryProductRepository::new();

        assert!(matches!(
            repo.get_by_id(42).await,
            Err(RepoError::Domain(DomainError::ProductNotFound(42)))
        ));
        assert!(repo.delete(42).await.is_err());

        let mut ghost = draft("Ghost");
        ghost.id = 42;
        assert!(repo.update(ghost).await.is_err());
    }

    #[tokio::test]
    async fn test_get_all_returns_copies() {
        let repo = MemoryProductRepository::with_seed_data();
        let mut all = repo.get_all().await.unwrap();
        all[0].price = 99.0;

        let fetched = repo.get_by_id(1).await.unwrap();
        assert!((fetched.price - 2.45).abs() < f64::EPSILON);
    }
}
