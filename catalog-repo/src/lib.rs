//! # Catalog Repository
//!
//! Concrete repository implementations (adapters) for the catalog service.
//! The catalog keeps no durable state, so the only adapter is an in-memory
//! list behind a reader-writer lock.

mod memory;

pub use memory::MemoryProductRepository;

/// Builds the default repository, seeded with a couple of products so the
/// storefront has something to show.
pub fn build_repo() -> MemoryProductRepository {
    MemoryProductRepository::with_seed_data()
}
