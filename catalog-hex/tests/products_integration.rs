//! Integration tests for the catalog HTTP surface.
//!
//! These drive the full Axum router (routing, extractors, error mapping)
//! against the in-memory repository and a fixed-rate provider.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use catalog_events::EventBus;
use catalog_hex::{inbound::HttpServer, ProductService};
use catalog_repo::MemoryProductRepository;
use catalog_types::{Product, RateError, RateProvider};

struct FixedRates(HashMap<String, f64>);

impl FixedRates {
    fn new() -> Self {
        Self(HashMap::from([("USD".to_string(), 1.10)]))
    }
}

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
        Ok(vec!["EUR".to_string(), "USD".to_string()])
    }
}

fn test_router() -> Router {
    let bus = Arc::new(EventBus::new());
    let service = Arc::new(ProductService::new(
        Arc::new(MemoryProductRepository::with_seed_data()),
        Arc::new(FixedRates::new()),
        Arc::clone(&bus),
    ));
    HttpServer::new(service, bus).router()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: Method, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let response = test_router().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_list_products() {
    let response = test_router().oneshot(get("/products")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let products: Vec<Product> = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(products[0].name, "Latte");
}

#[tokio::test]
async fn test_list_products_priced() {
    let response = test_router()
        .oneshot(get("/products?currency=USD"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let products: Vec<Product> = serde_json::from_value(body_json(response).await).unwrap();
    assert!((products[0].price - 2.45 * 1.10).abs() < 1e-9);
}

#[tokio::test]
async fn test_unknown_currency_is_400() {
    let response = test_router()
        .oneshot(get("/products?currency=ZZZ"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_single_product() {
    let response = test_router().oneshot(get("/products/1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let product: Product = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(product.id, 1);
}

#[tokio::test]
async fn test_missing_product_is_404() {
    let response = test_router().oneshot(get("/products/99")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_non_numeric_id_is_400() {
    let response = test_router().oneshot(get("/products/abc")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_add_product_roundtrip() {
    let router = test_router();

    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/products",
            r#"{"name":"Mocha","description":"Chocolate coffee","price":3.10,"sku":"cof-moc-reg"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let created = body_json(response).await;
    assert_eq!(created["id"], 3);
    assert_eq!(created["name"], "Mocha");

    let response = router.oneshot(get("/products/3")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = body_json(response).await;
    assert_eq!(fetched["sku"], "cof-moc-reg");
}

#[tokio::test]
async fn test_add_invalid_product_is_422() {
    let response = test_router()
        .oneshot(json_request(
            Method::POST,
            "/products",
            r#"{"name":"","price":-1.0,"sku":"nope"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert_eq!(body["fields"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_update_product() {
    let router = test_router();

    let response = router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/products/1",
            r#"{"name":"Latte","description":"Frothy milky coffee","price":2.60,"sku":"cof-lat-reg"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = router.oneshot(get("/products/1")).await.unwrap();
    let fetched = body_json(response).await;
    assert!((fetched["price"].as_f64().unwrap() - 2.60).abs() < 1e-9);
}

#[tokio::test]
async fn test_update_missing_product_is_404() {
    let response = test_router()
        .oneshot(json_request(
            Method::PUT,
            "/products/99",
            r#"{"name":"Ghost","description":"","price":1.0,"sku":"gho-sts-cof"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_product() {
    let router = test_router();

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri("/products/2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = router.oneshot(get("/products/2")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_currencies() {
    let response = test_router().oneshot(get("/currencies")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let currencies: Vec<String> = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(currencies, vec!["EUR".to_string(), "USD".to_string()]);
}
