//! Application services: the operations the dashboard and webhook handlers call.
//!
//! Each service owns `Arc` handles to its stores and is cheap to share. All
//! methods are tenant-scoped and fail visibly with [`ServiceError`](crate::ServiceError).

use std::sync::{Arc, Mutex, MutexGuard};

use backoffice_affiliates::{Affiliate, AffiliateId};
use backoffice_products::{Product, ProductId};
use backoffice_sales::{Sale, SaleId};

use crate::error::PersistenceError;
use crate::read_model::TenantStore;

pub mod affiliates;
pub mod catalog;
pub mod fulfillment;
pub mod sales;

pub use affiliates::AffiliateService;
pub use catalog::CatalogService;
pub use fulfillment::{FulfillmentService, NewDispatchOrder};
pub use sales::{RecordSale, SalesService};

pub type ProductStore = Arc<dyn TenantStore<ProductId, Product>>;
pub type AffiliateStore = Arc<dyn TenantStore<AffiliateId, Affiliate>>;
pub type SaleStore = Arc<dyn TenantStore<SaleId, Sale>>;

/// Serializes read-modify-write sequences against a document store.
#[derive(Debug, Default)]
pub(crate) struct WriteLock(Mutex<()>);

impl WriteLock {
    pub(crate) fn acquire(&self) -> Result<MutexGuard<'_, ()>, PersistenceError> {
        self.0.lock().map_err(|_| PersistenceError::poisoned())
    }
}
