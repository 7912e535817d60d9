use thiserror::Error;

use backoffice_core::DomainError;
use backoffice_logistics::LogisticsError;
use backoffice_sales::SaleError;

use crate::command_dispatcher::DispatchError;
use crate::projections::DispatchOrderProjectionError;

/// Document store failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("storage backend failure: {0}")]
    Backend(String),

    /// Insert-only write hit an existing record.
    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("record not found: {0}")]
    NotFound(String),
}

impl PersistenceError {
    pub(crate) fn poisoned() -> Self {
        Self::Backend("lock poisoned".to_string())
    }
}

/// Error surfaced by the application services.
///
/// Every failure is returned to the caller; nothing is swallowed or replaced by
/// placeholder data.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Sale(#[from] SaleError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Projection(#[from] DispatchOrderProjectionError),

    #[error(transparent)]
    Logistics(#[from] LogisticsError),

    #[error("{0} not found")]
    NotFound(String),
}

impl ServiceError {
    pub(crate) fn not_found(what: impl core::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    /// True for optimistic-concurrency and uniqueness conflicts; callers may retry or report.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ServiceError::Domain(DomainError::Conflict(_))
                | ServiceError::Persistence(PersistenceError::Conflict(_))
                | ServiceError::Dispatch(DispatchError::Concurrency(_))
        )
    }
}
