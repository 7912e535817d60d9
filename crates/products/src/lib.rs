//! Product catalog records.
//!
//! Products are plain documents edited from the admin screens; the sale
//! calculator reads them, nothing here is event-sourced.

pub mod product;

pub use product::{NewProduct, Product, ProductId};
