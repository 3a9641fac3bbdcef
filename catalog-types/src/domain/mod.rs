//! Domain models for the product catalog.

pub mod product;

pub use product::{FieldError, Product, ProductId, ValidationErrors};
