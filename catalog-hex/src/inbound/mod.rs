//! HTTP Inbound Adapter
//!
//! Axum-based HTTP server that drives the application layer, plus the
//! WebSocket push channel that forwards catalog events to browser sessions.

mod handlers;
mod server;
mod websocket;

pub use handlers::AppState;
pub use server::HttpServer;
