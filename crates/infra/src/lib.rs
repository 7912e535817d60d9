//! Infrastructure layer: event store, document stores, projections, services,
//! configuration and the composition root.

pub mod app;
pub mod command_dispatcher;
pub mod config;
pub mod error;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod services;

#[cfg(test)]
mod integration_tests;

pub use app::Backoffice;
pub use config::{BackofficeConfig, ConfigError};
pub use error::{PersistenceError, ServiceError};
