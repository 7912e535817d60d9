use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use backoffice_core::{AggregateId, TenantId};
use backoffice_events::EventEnvelope;
use backoffice_fulfillment::{
    DispatchOrder, DispatchOrderEvent, DispatchOrderId, OrderOrigin, PaymentStatus, PricingSnapshot,
    ShipmentStatus, ShippingAddress,
};
use backoffice_products::ProductId;

use crate::error::PersistenceError;
use crate::read_model::TenantStore;

/// Dispatch order as the dashboard reads it (`despachos` document).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOrderDocument {
    pub id: DispatchOrderId,
    #[serde(flatten)]
    pub origin: OrderOrigin,
    #[serde(rename = "envio")]
    pub shipping: ShippingAddress,
    #[serde(rename = "producto_id")]
    pub product_id: ProductId,
    #[serde(rename = "producto_nombre")]
    pub product_name: String,
    #[serde(rename = "cantidad")]
    pub quantity: i64,
    #[serde(flatten)]
    pub pricing: PricingSnapshot,
    #[serde(rename = "estado_pago")]
    pub payment_status: PaymentStatus,
    #[serde(rename = "proveedor_pago")]
    pub payment_provider: Option<String>,
    #[serde(rename = "pago_id")]
    pub payment_id: Option<String>,
    #[serde(rename = "estado_envio")]
    pub shipment_status: ShipmentStatus,
    pub tracking_number: Option<String>,
    pub courier: Option<String>,
    pub created_at: DateTime<Utc>,
    pub despachado_at: Option<DateTime<Utc>>,
    pub entregado_at: Option<DateTime<Utc>>,
    /// Last applied stream sequence number.
    pub version: u64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchOrderProjectionError {
    #[error("failed to deserialize dispatch order event: {0}")]
    Deserialize(String),
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
    #[error("event for unknown dispatch order {0}")]
    MissingDocument(DispatchOrderId),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

/// Builds [`DispatchOrderDocument`]s from committed dispatch events.
///
/// Idempotent under redelivery: a per-stream cursor skips envelopes already
/// applied and rejects gaps.
#[derive(Debug)]
pub struct DispatchOrdersProjection<S>
where
    S: TenantStore<DispatchOrderId, DispatchOrderDocument>,
{
    store: S,
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl<S> DispatchOrdersProjection<S>
where
    S: TenantStore<DispatchOrderId, DispatchOrderDocument>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(
        &self,
        tenant_id: TenantId,
        order_id: &DispatchOrderId,
    ) -> Result<Option<DispatchOrderDocument>, PersistenceError> {
        self.store.get(tenant_id, order_id)
    }

    /// All orders of a tenant, newest first.
    pub fn list(&self, tenant_id: TenantId) -> Result<Vec<DispatchOrderDocument>, PersistenceError> {
        let mut docs = self.store.list(tenant_id)?;
        docs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(docs)
    }

    pub fn list_by_status(
        &self,
        tenant_id: TenantId,
        status: ShipmentStatus,
    ) -> Result<Vec<DispatchOrderDocument>, PersistenceError> {
        let mut docs = self.list(tenant_id)?;
        docs.retain(|d| d.shipment_status == status);
        Ok(docs)
    }

    fn cursor(&self, key: CursorKey) -> Result<u64, PersistenceError> {
        let cursors = self.cursors.read().map_err(|_| PersistenceError::poisoned())?;
        Ok(cursors.get(&key).copied().unwrap_or(0))
    }

    fn set_cursor(&self, key: CursorKey, seq: u64) -> Result<(), PersistenceError> {
        let mut cursors = self.cursors.write().map_err(|_| PersistenceError::poisoned())?;
        cursors.insert(key, seq);
        Ok(())
    }

    /// Apply one committed envelope. Envelopes of other aggregate types are ignored.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), DispatchOrderProjectionError> {
        if envelope.aggregate_type() != DispatchOrder::AGGREGATE_TYPE {
            return Ok(());
        }

        let tenant_id = envelope.tenant_id();
        let key = CursorKey {
            tenant_id,
            aggregate_id: envelope.aggregate_id(),
        };
        let seq = envelope.sequence_number();
        let last = self.cursor(key)?;

        if seq == 0 || seq > last + 1 {
            return Err(DispatchOrderProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }

        let ev: DispatchOrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| DispatchOrderProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, order_id) = match &ev {
            DispatchOrderEvent::DispatchOrderCreated(e) => (e.tenant_id, e.order_id),
            DispatchOrderEvent::PaymentConfirmed(e) => (e.tenant_id, e.order_id),
            DispatchOrderEvent::OrderShipped(e) => (e.tenant_id, e.order_id),
            DispatchOrderEvent::OrderDelivered(e) => (e.tenant_id, e.order_id),
            DispatchOrderEvent::ShipmentStatusOverridden(e) => (e.tenant_id, e.order_id),
        };
        if event_tenant != tenant_id {
            return Err(DispatchOrderProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if order_id.0 != key.aggregate_id {
            return Err(DispatchOrderProjectionError::TenantIsolation(
                "event order_id does not match envelope aggregate_id".to_string(),
            ));
        }

        let doc = match ev {
            DispatchOrderEvent::DispatchOrderCreated(e) => {
                let (payment_provider, payment_id) = match &e.payment {
                    Some(p) => (Some(p.provider.clone()), Some(p.payment_id.clone())),
                    None => (None, None),
                };
                DispatchOrderDocument {
                    id: e.order_id,
                    origin: e.origin,
                    shipping: e.shipping,
                    product_id: e.product_id,
                    product_name: e.product_name,
                    quantity: e.quantity,
                    pricing: e.pricing,
                    payment_status: if e.payment.is_some() {
                        PaymentStatus::Paid
                    } else {
                        PaymentStatus::Pending
                    },
                    payment_provider,
                    payment_id,
                    shipment_status: ShipmentStatus::Pending,
                    tracking_number: None,
                    courier: None,
                    created_at: e.occurred_at,
                    despachado_at: None,
                    entregado_at: None,
                    version: seq,
                }
            }
            other => {
                let mut doc = self
                    .store
                    .get(tenant_id, &order_id)?
                    .ok_or(DispatchOrderProjectionError::MissingDocument(order_id))?;
                match other {
                    DispatchOrderEvent::PaymentConfirmed(e) => {
                        doc.payment_status = PaymentStatus::Paid;
                        doc.payment_provider = Some(e.payment.provider);
                        doc.payment_id = Some(e.payment.payment_id);
                    }
                    DispatchOrderEvent::OrderShipped(e) => {
                        doc.shipment_status = ShipmentStatus::Shipped;
                        doc.tracking_number = e.tracking_number;
                        doc.courier = e.courier_name;
                        doc.despachado_at = Some(e.occurred_at);
                    }
                    DispatchOrderEvent::OrderDelivered(e) => {
                        doc.shipment_status = ShipmentStatus::Delivered;
                        doc.entregado_at = Some(e.occurred_at);
                    }
                    DispatchOrderEvent::ShipmentStatusOverridden(e) => {
                        doc.shipment_status = e.to;
                    }
                    DispatchOrderEvent::DispatchOrderCreated(_) => {}
                }
                doc.version = seq;
                doc
            }
        };

        self.store.upsert(tenant_id, order_id, doc)?;
        self.set_cursor(key, seq)?;
        Ok(())
    }

    /// Drop the tenant's documents and cursors, then replay `envelopes` in order.
    pub fn rebuild_tenant<'a>(
        &self,
        tenant_id: TenantId,
        envelopes: impl IntoIterator<Item = &'a EventEnvelope<JsonValue>>,
    ) -> Result<(), DispatchOrderProjectionError> {
        self.store.clear_tenant(tenant_id)?;
        {
            let mut cursors = self.cursors.write().map_err(|_| PersistenceError::poisoned())?;
            cursors.retain(|k, _| k.tenant_id != tenant_id);
        }
        for envelope in envelopes {
            if envelope.tenant_id() == tenant_id {
                self.apply_envelope(envelope)?;
            }
        }
        Ok(())
    }
}
