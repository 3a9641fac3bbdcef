//! OpenAPI specification and documentation.

#![allow(dead_code)] // Path functions are only used by utoipa for documentation generation

use catalog_types::{ErrorBody, FieldError, Product, ProductDraft};
use utoipa::OpenApi;

// Dummy functions to generate path documentation
// These are not the actual handlers, just for OpenAPI path generation

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = inline(serde_json::Value), example = json!({"status": "healthy"}))
    )
)]
async fn health() {}

/// List products
#[utoipa::path(
    get,
    path = "/products",
    tag = "products",
    params(
        ("currency" = Option<String>, Query, description = "Currency code to price the products in (omit for EUR)")
    ),
    responses(
        (status = 200, description = "The product list", body = [Product]),
        (status = 400, description = "Unknown currency", body = ErrorBody),
        (status = 500, description = "Internal error", body = ErrorBody)
    )
)]
async fn get_products() {}

/// Get a single product
#[utoipa::path(
    get,
    path = "/products/{id}",
    tag = "products",
    params(
        ("id" = i64, Path, description = "Product id"),
        ("currency" = Option<String>, Query, description = "Currency code to price the product in (omit for EUR)")
    ),
    responses(
        (status = 200, description = "The product", body = Product),
        (status = 400, description = "Invalid id or currency", body = ErrorBody),
        (status = 404, description = "Product not found", body = ErrorBody)
    )
)]
async fn get_product() {}

/// Add a product
#[utoipa::path(
    post,
    path = "/products",
    tag = "products",
    request_body = ProductDraft,
    responses(
        (status = 201, description = "Product created", body = Product),
        (status = 422, description = "Validation failed", body = [FieldError]),
        (status = 500, description = "Internal error", body = ErrorBody)
    )
)]
async fn add_product() {}

/// Update a product
#[utoipa::path(
    put,
    path = "/products/{id}",
    tag = "products",
    params(("id" = i64, Path, description = "Product id")),
    request_body = ProductDraft,
    responses(
        (status = 204, description = "Product updated"),
        (status = 404, description = "Product not found", body = ErrorBody),
        (status = 422, description = "Validation failed", body = [FieldError])
    )
)]
async fn update_product() {}

/// Delete a product
#[utoipa::path(
    delete,
    path = "/products/{id}",
    tag = "products",
    params(("id" = i64, Path, description = "Product id")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, description = "Product not found", body = ErrorBody)
    )
)]
async fn delete_product() {}

/// List available currencies
#[utoipa::path(
    get,
    path = "/currencies",
    tag = "currencies",
    responses(
        (status = 200, description = "Available currency codes", body = [String]),
        (status = 500, description = "Rate service unavailable", body = ErrorBody)
    )
)]
async fn list_currencies() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        get_products,
        get_product,
        add_product,
        update_product,
        delete_product,
        list_currencies
    ),
    components(schemas(Product, ProductDraft, FieldError, ErrorBody)),
    tags(
        (name = "products", description = "Product catalog CRUD"),
        (name = "currencies", description = "Currency information"),
        (name = "health", description = "Service health")
    ),
    info(
        title = "Catalog API",
        description = "Product catalog with live multi-currency pricing"
    )
)]
pub struct ApiDoc;
