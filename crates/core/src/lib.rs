//! `backoffice-core`: shared domain building blocks.
//!
//! Identifiers, the domain error model and the traits every back-office module
//! builds on. No IO lives here.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, TenantId};
