//! Port traits implemented by the outbound adapters.

pub mod rates;
pub mod repository;

pub use rates::{RateError, RateProvider};
pub use repository::ProductRepository;
