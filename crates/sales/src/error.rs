use thiserror::Error;

use backoffice_products::ProductId;

/// Rejected sale input. Raised before anything is persisted.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SaleError {
    #[error("product {0} not found in catalog")]
    ProductNotFound(ProductId),

    #[error("quantity must be positive (got {0})")]
    InvalidQuantity(i64),

    #[error("product {product_id} has no usable price: {reason}")]
    InvalidProduct { product_id: ProductId, reason: String },

    #[error("discount must be a non-negative amount (got {0})")]
    InvalidDiscount(f64),
}
