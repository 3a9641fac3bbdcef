//! Product model and field validation.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Identifier of a product. Assigned by the repository, starting at 1.
pub type ProductId = i64;

/// SKUs look like `abc-def-ghi`: three lowercase words joined by dashes.
static SKU_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]+-[a-z]+-[a-z]+$").expect("valid sku regex"));

/// A product in the catalog. Prices are stored in EUR; priced reads convert
/// a copy on the way out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    /// Repository-assigned identifier, >= 1.
    #[schema(example = 1, minimum = 1)]
    pub id: ProductId,
    /// Display name, must not be empty.
    #[schema(example = "Latte")]
    pub name: String,
    /// Free-form description.
    #[schema(example = "Frothy milky coffee")]
    pub description: String,
    /// Price in EUR, strictly positive.
    #[schema(example = 2.45, minimum = 0.01)]
    pub price: f64,
    /// Stock keeping unit in the format abc-def-ghi.
    #[schema(example = "lat-tte-cof", pattern = "^[a-z]+-[a-z]+-[a-z]+$")]
    pub sku: String,
}

impl Product {
    /// Checks the business rules on this product's fields.
    ///
    /// All violations are collected so the caller can report them together.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(FieldError::new("name", "must not be empty"));
        }

        if !(self.price.is_finite() && self.price > 0.0) {
            errors.push(FieldError::new("price", "must be greater than zero"));
        }

        if !SKU_PATTERN.is_match(&self.sku) {
            errors.push(FieldError::new("sku", "must match the format abc-def-ghi"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Returns a copy of this product with the price scaled by `rate`.
    /// The original is left untouched; stored products always remain in EUR.
    pub fn with_price_scaled(&self, rate: f64) -> Product {
        let mut copy = self.clone();
        copy.price *= rate;
        copy
    }
}

/// A single failed validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "field '{}': {}", self.field, self.message)
    }
}

/// All violations found on one product.
pub type ValidationErrors = Vec<FieldError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_product() -> Product {
        Product {
            id: 1,
            name: "Latte".to_string(),
            description: "Frothy milky coffee".to_string(),
            price: 2.45,
            sku: "cof-lat-big".to_string(),
        }
    }

    #[test]
    fn test_valid_product_passes() {
        assert!(valid_product().validate().is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut p = valid_product();
        p.name = "  ".to_string();
        let errors = p.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "name");
    }

    #[test]
    fn test_non_positive_price_rejected() {
        let mut p = valid_product();
        p.price = 0.0;
        assert!(p.validate().is_err());

        p.price = -1.0;
        assert!(p.validate().is_err());

        p.price = f64::NAN;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_sku_format() {
        let mut p = valid_product();
        for bad in ["abc", "abc-def", "ABC-DEF-GHI", "ab1-def-ghi", "a-b-c-d"] {
            p.sku = bad.to_string();
            assert!(p.validate().is_err(), "sku {:?} should be rejected", bad);
        }

        p.sku = "a-b-c".to_string();
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_multiple_violations_collected() {
        let p = Product {
            id: 1,
            name: String::new(),
            description: String::new(),
            price: -2.0,
            sku: "nope".to_string(),
        };
        let errors = p.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_price_scaling_copies() {
        let p = valid_product();
        let scaled = p.with_price_scaled(1.1);
        assert!((scaled.price - 2.695).abs() < 1e-9);
        assert!((p.price - 2.45).abs() < 1e-9);
    }
}
