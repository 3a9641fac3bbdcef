//! # Catalog Client SDK
//!
//! A typed Rust client for the catalog API.

use catalog_types::{Product, ProductDraft, ProductId};
use reqwest::Client;
use serde::de::DeserializeOwned;

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Catalog API client.
pub struct CatalogClient {
    base_url: String,
    http: Client,
}

impl CatalogClient {
    /// Creates a new client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    /// Checks if the API is healthy.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    /// Lists all products, priced in `currency` when one is given.
    pub async fn products(&self, currency: Option<&str>) -> Result<Vec<Product>, ClientError> {
        match currency {
            Some(code) => {
                self.get(&format!("/products?currency={}", code)).await
            }
            None => self.get("/products").await,
        }
    }

    /// Gets a product by id, priced in `currency` when one is given.
    pub async fn product(
        &self,
        id: ProductId,
        currency: Option<&str>,
    ) -> Result<Product, ClientError> {
        match currency {
            Some(code) => {
                self.get(&format!("/products/{}?currency={}", id, code)).await
            }
            None => self.get(&format!("/products/{}", id)).await,
        }
    }

    /// Adds a product and returns it with its assigned id.
    pub async fn add_product(&self, draft: &ProductDraft) -> Result<Product, ClientError> {
        let resp = self
            .http
            .post(format!("{}/products", self.base_url))
            .json(draft)
            .send()
            .await?;
        Self::parse(resp).await
    }

    /// Updates an existing product.
    pub async fn update_product(
        &self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<(), ClientError> {
        let resp = self
            .http
            .put(format!("{}/products/{}", self.base_url, id))
            .json(draft)
            .send()
            .await?;
        Self::check(resp).await
    }

    /// Deletes a product.
    pub async fn delete_product(&self, id: ProductId) -> Result<(), ClientError> {
        let resp = self
            .http
            .delete(format!("{}/products/{}", self.base_url, id))
            .send()
            .await?;
        Self::check(resp).await
    }

    /// Lists the available currency codes.
    pub async fn currencies(&self) -> Result<Vec<String>, ClientError> {
        self.get("/currencies").await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await?;
        Self::parse(resp).await
    }

    async fn parse<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp.json().await?)
    }

    async fn check(resp: reqwest::Response) -> Result<(), ClientError> {
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalised() {
        let client = CatalogClient::new("http://localhost:9090/");
        assert_eq!(client.base_url, "http://localhost:9090");
    }
}
