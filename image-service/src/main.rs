//! # Image Service
//!
//! Binary serving product images: multipart and raw uploads, downloads with
//! gzip compression, local filesystem storage with a size cap.

mod config;
mod handlers;
mod storage;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::handlers::AppState;
use crate::storage::Local;

/// Maximum image size: 5 MiB.
const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

fn router(state: Arc<AppState>, ui_origin: &str) -> Router {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let cors = match ui_origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => cors.allow_origin(Any),
    };

    Router::new()
        .route("/images", post(handlers::upload_multipart))
        .route("/images/{id}/{filename}", post(handlers::upload_rest))
        .route("/images/{id}/{filename}", get(handlers::get_file))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 1024))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,image_service=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env()?;

    let state = Arc::new(AppState {
        store: Local::new(&config.base_path, MAX_IMAGE_BYTES),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!("Image server listening on {}", listener.local_addr()?);
    tracing::info!("Serving images from {}", config.base_path);

    axum::serve(listener, router(state, &config.ui_origin))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use tower::ServiceExt;

    fn test_router() -> Router {
        let dir = std::env::temp_dir().join(format!("image-service-test-{}", std::process::id()));
        let state = Arc::new(AppState {
            store: Local::new(dir, MAX_IMAGE_BYTES),
        });
        router(state, "http://localhost:3000")
    }

    #[tokio::test]
    async fn test_rest_upload_then_download() {
        let app = test_router();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/images/1/coffee.png")
                    .body(Body::from("fake image bytes"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/images/1/coffee.png")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            HeaderValue::from_static("image/png")
        );
    }

    #[tokio::test]
    async fn test_bad_filename_rejected() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/images/1/noextension")
                    .body(Body::from("bytes"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_image_is_404() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/images/5/ghost.png")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
