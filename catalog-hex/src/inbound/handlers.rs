//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use catalog_events::{Event, EventBus};
use catalog_types::{
    AppError, Product, ProductDraft, ProductId, ProductRepository, RateProvider,
};

use crate::ProductService;

/// Application state shared across handlers.
pub struct AppState<R: ProductRepository, P: RateProvider> {
    pub service: Arc<ProductService<R, P>>,
    pub bus: Arc<EventBus<Event>>,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            AppError::Validation(errors) => {
                let body = serde_json::json!({
                    "error": "validation failed",
                    "code": StatusCode::UNPROCESSABLE_ENTITY.as_u16(),
                    "fields": errors,
                });
                (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
            }
            other => {
                let (status, message) = match &other {
                    AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                    AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
                    AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
                    AppError::Validation(_) => unreachable!("handled above"),
                };

                let body = serde_json::json!({
                    "error": message,
                    "code": status.as_u16(),
                });
                (status, Json(body)).into_response()
            }
        }
    }
}

/// Query parameters for priced product reads.
#[derive(Debug, Deserialize)]
pub struct PricingQuery {
    pub currency: Option<String>,
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// `GET /products?currency=CCC`
pub async fn get_products<R: ProductRepository, P: RateProvider>(
    State(state): State<Arc<AppState<R, P>>>,
    Query(query): Query<PricingQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let products = state
        .service
        .get_products(query.currency.as_deref())
        .await?;
    Ok(Json(products))
}

/// `GET /products/{id}?currency=CCC`
pub async fn get_product<R: ProductRepository, P: RateProvider>(
    State(state): State<Arc<AppState<R, P>>>,
    Path(id): Path<ProductId>,
    Query(query): Query<PricingQuery>,
) -> Result<Json<Product>, ApiError> {
    let product = state
        .service
        .get_product(id, query.currency.as_deref())
        .await?;
    Ok(Json(product))
}

/// `POST /products`
pub async fn add_product<R: ProductRepository, P: RateProvider>(
    State(state): State<Arc<AppState<R, P>>>,
    Json(draft): Json<ProductDraft>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let stored = state.service.add_product(draft).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// `PUT /products/{id}`
pub async fn update_product<R: ProductRepository, P: RateProvider>(
    State(state): State<Arc<AppState<R, P>>>,
    Path(id): Path<ProductId>,
    Json(draft): Json<ProductDraft>,
) -> Result<StatusCode, ApiError> {
    state.service.update_product(id, draft).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /products/{id}`
pub async fn delete_product<R: ProductRepository, P: RateProvider>(
    State(state): State<Arc<AppState<R, P>>>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /currencies`
pub async fn list_currencies<R: ProductRepository, P: RateProvider>(
    State(state): State<Arc<AppState<R, P>>>,
) -> Result<Json<Vec<String>>, ApiError> {
    let currencies = state.service.list_currencies().await?;
    Ok(Json(currencies))
}
