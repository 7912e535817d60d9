//! Composition root.
//!
//! [`Backoffice`] is built once from a [`BackofficeConfig`] and owns every store
//! and service; there are no process-wide singletons.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::info;

use backoffice_affiliates::{Affiliate, AffiliateId};
use backoffice_core::TenantId;
use backoffice_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};
use backoffice_fulfillment::{DispatchOrderId, ShippingAddress};
use backoffice_logistics::{LogisticsProvider, build_provider};
use backoffice_products::{Product, ProductId};
use backoffice_sales::{Sale, SaleId};

use crate::command_dispatcher::CommandDispatcher;
use crate::config::{BackofficeConfig, ConfigError};
use crate::error::ServiceError;
use crate::event_store::InMemoryEventStore;
use crate::projections::DispatchOrderDocument;
use crate::read_model::InMemoryTenantStore;
use crate::services::{AffiliateService, CatalogService, FulfillmentService, NewDispatchOrder, SalesService};

pub type SharedEventStore = Arc<InMemoryEventStore>;
pub type SharedEventBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

pub struct Backoffice {
    config: BackofficeConfig,
    catalog: CatalogService,
    affiliates: AffiliateService,
    sales: SalesService,
    fulfillment: FulfillmentService<SharedEventStore, SharedEventBus>,
}

impl Backoffice {
    /// Wire everything from `config`, with the carrier it selects.
    pub fn from_config(config: BackofficeConfig) -> Result<Self, ConfigError> {
        let logistics = build_provider(config.logistics.provider);
        Self::with_logistics(config, logistics)
    }

    /// Wire everything from `config` around an explicit carrier (tests, staging).
    pub fn with_logistics(config: BackofficeConfig, logistics: Arc<dyn LogisticsProvider>) -> Result<Self, ConfigError> {
        config.validate()?;

        let products: Arc<InMemoryTenantStore<ProductId, Product>> = Arc::new(InMemoryTenantStore::new());
        let affiliates: Arc<InMemoryTenantStore<AffiliateId, Affiliate>> = Arc::new(InMemoryTenantStore::new());
        let sales: Arc<InMemoryTenantStore<SaleId, Sale>> = Arc::new(InMemoryTenantStore::new());
        let orders: Arc<InMemoryTenantStore<DispatchOrderId, DispatchOrderDocument>> =
            Arc::new(InMemoryTenantStore::new());
        let dispatcher = CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), Arc::new(InMemoryEventBus::new()));

        info!(
            carrier = logistics.name(),
            overhead = ?config.sales.calculator_options().overhead,
            missing_product = ?config.sales.missing_product,
            payment_gate = ?config.fulfillment.payment_gate(),
            "back-office wired"
        );

        Ok(Self {
            catalog: CatalogService::new(products.clone()),
            affiliates: AffiliateService::new(affiliates.clone()),
            sales: SalesService::new(products, affiliates, sales, config.sales.calculator_options()),
            fulfillment: FulfillmentService::new(dispatcher, orders, logistics, config.fulfillment.payment_gate()),
            config,
        })
    }

    /// Install the tracing subscriber described by the `logging` section.
    pub fn init_logging(&self) -> bool {
        backoffice_observability::init_with(&self.config.logging)
    }

    pub fn config(&self) -> &BackofficeConfig {
        &self.config
    }

    pub fn catalog(&self) -> &CatalogService {
        &self.catalog
    }

    pub fn affiliates(&self) -> &AffiliateService {
        &self.affiliates
    }

    pub fn sales(&self) -> &SalesService {
        &self.sales
    }

    pub fn fulfillment(&self) -> &FulfillmentService<SharedEventStore, SharedEventBus> {
        &self.fulfillment
    }

    /// Committed dispatch events, as JSON envelopes, from now on.
    pub fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
        self.fulfillment.bus().subscribe()
    }

    /// Credit the sale's commission to its affiliate.
    ///
    /// Returns `None` when the sale earned no commission. Calling it twice
    /// credits twice; the operator decides when a sale is settled.
    pub fn credit_affiliate_for_sale(&self, tenant_id: TenantId, sale_id: SaleId) -> Result<Option<Affiliate>, ServiceError> {
        let sale = self.sales.get_sale(tenant_id, sale_id)?;
        let commission = sale.breakdown().commission;
        match sale.affiliate_id() {
            Some(affiliate_id) if commission > 0.0 => self
                .affiliates
                .credit_commission(tenant_id, affiliate_id, commission)
                .map(Some),
            _ => Ok(None),
        }
    }

    /// Refold the tenant's `despachos` documents from the event store.
    pub fn rebuild_dispatch_projection(&self, tenant_id: TenantId) -> Result<(), ServiceError> {
        self.fulfillment.rebuild_projection(tenant_id)
    }

    /// Open a dispatch order for a recorded sale.
    pub fn dispatch_sale(
        &self,
        tenant_id: TenantId,
        sale_id: SaleId,
        shipping: ShippingAddress,
        occurred_at: DateTime<Utc>,
    ) -> Result<DispatchOrderDocument, ServiceError> {
        let sale = self.sales.get_sale(tenant_id, sale_id)?;
        let product = self.catalog.get_product(tenant_id, sale.product_id())?;
        self.fulfillment
            .create_order(tenant_id, NewDispatchOrder::from_sale(&sale, product.name, shipping), occurred_at)
    }
}
