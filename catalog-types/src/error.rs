//! Error types for the catalog service.

use crate::domain::{ProductId, ValidationErrors};
use crate::ports::RateError;

/// Domain-level errors (business rule violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Invalid currency: {0}")]
    InvalidCurrency(String),

    #[error("Validation failed")]
    Validation(ValidationErrors),
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Entity not found")]
    NotFound,
}

/// Application-level errors (for HTTP responses).
///
/// Maps cleanly to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed")]
    Validation(ValidationErrors),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(DomainError::ProductNotFound(id)) => {
                AppError::NotFound(format!("Product {}", id))
            }
            RepoError::Domain(DomainError::InvalidCurrency(code)) => {
                AppError::BadRequest(format!("Invalid currency: {}", code))
            }
            RepoError::Domain(DomainError::Validation(errors)) => AppError::Validation(errors),
            RepoError::NotFound => AppError::NotFound("Resource not found".into()),
        }
    }
}

impl From<RateError> for AppError {
    fn from(err: RateError) -> Self {
        match err {
            RateError::InvalidCurrency(code) => {
                AppError::BadRequest(format!("Invalid currency: {}", code))
            }
            RateError::NotFound(base, dest) => {
                AppError::BadRequest(format!("No rate available for {} -> {}", base, dest))
            }
            RateError::Transport(msg) => AppError::Internal(msg),
        }
    }
}
