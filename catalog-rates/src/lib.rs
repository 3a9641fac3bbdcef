//! # Catalog Rates
//!
//! Outbound adapter for the currency service. `RateClient` keeps a
//! long-lived bidirectional subscription stream open, caches every rate it
//! sees and publishes a [`RateChanged`] event on the shared bus whenever a
//! cached value is new or different. Synchronous lookups hit the cache
//! first and fall back to a unary `GetRate`, subscribing the pair for
//! future pushes.
//!
//! The stream is self-healing: a transport error or server close tears it
//! down, and the receiver task re-establishes it after a short pause.

mod cache;
mod client;

pub use cache::RateCache;
pub use client::RateClient;
