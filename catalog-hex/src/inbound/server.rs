//! HTTP Server configuration and startup.

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use catalog_events::{Event, EventBus};
use catalog_types::{ProductRepository, RateProvider};

use super::handlers::{self, AppState};
use super::websocket;
use crate::openapi::ApiDoc;
use crate::ProductService;

/// HTTP server for the catalog API.
pub struct HttpServer<R: ProductRepository, P: RateProvider> {
    state: Arc<AppState<R, P>>,
    ui_origin: Option<String>,
}

impl<R: ProductRepository, P: RateProvider> HttpServer<R, P> {
    /// Creates a new HTTP server over the given service and event bus.
    pub fn new(service: Arc<ProductService<R, P>>, bus: Arc<EventBus<Event>>) -> Self {
        Self {
            state: Arc::new(AppState { service, bus }),
            ui_origin: None,
        }
    }

    /// Restricts CORS to the given browser origin. Without this the server
    /// answers any origin, which is fine for local development.
    pub fn with_ui_origin(mut self, origin: impl Into<String>) -> Self {
        self.ui_origin = Some(origin.into());
        self
    }

    fn cors_layer(&self) -> CorsLayer {
        let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
        match self
            .ui_origin
            .as_deref()
            .and_then(|origin| origin.parse::<HeaderValue>().ok())
        {
            Some(origin) => layer.allow_origin(origin),
            None => layer.allow_origin(Any),
        }
    }

    /// Builds the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
            .route("/health", get(handlers::health))
            .route("/products", get(handlers::get_products::<R, P>))
            .route("/products", post(handlers::add_product::<R, P>))
            .route("/products/{id}", get(handlers::get_product::<R, P>))
            .route("/products/{id}", put(handlers::update_product::<R, P>))
            .route("/products/{id}", delete(handlers::delete_product::<R, P>))
            .route("/currencies", get(handlers::list_currencies::<R, P>))
            .route("/ws", get(websocket::ws_handler::<R, P>))
            .layer(self.cors_layer())
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.state))
    }

    /// Runs the server on the given address with graceful shutdown.
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Server listening on {}", local_addr);
        tracing::info!("API Docs: http://{}/swagger-ui", local_addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
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
