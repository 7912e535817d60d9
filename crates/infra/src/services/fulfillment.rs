use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::{error, info, instrument, warn};

use backoffice_core::{Aggregate, AggregateId, TenantId};
use backoffice_events::{EventBus, EventEnvelope};
use backoffice_fulfillment::{
    ConfirmPayment, CreateDispatchOrder, DispatchOrder, DispatchOrderCommand, DispatchOrderId,
    MarkDelivered, MarkShipped, OrderOrigin, OverrideShipmentStatus, PaymentConfirmation, PaymentGate,
    PricingSnapshot, ShipmentStatus, ShippingAddress,
};
use backoffice_logistics::{LogisticsError, LogisticsProvider, Shipment, ShipmentRequest, ShippingQuote};
use backoffice_products::ProductId;
use backoffice_sales::Sale;

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::error::ServiceError;
use super::WriteLock;
use crate::event_store::{EventStore, StoredEvent};
use crate::projections::{DispatchOrderDocument, DispatchOrdersProjection};
use crate::read_model::TenantStore;

pub type DispatchOrderStore = Arc<dyn TenantStore<DispatchOrderId, DispatchOrderDocument>>;

/// Everything needed to open a dispatch order.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDispatchOrder {
    pub origin: OrderOrigin,
    pub shipping: ShippingAddress,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i64,
    pub pricing: PricingSnapshot,
    /// Set when the order comes from a confirmed checkout.
    pub payment: Option<PaymentConfirmation>,
}

impl NewDispatchOrder {
    /// Order for a recorded sale, priced from the sale's frozen breakdown.
    pub fn from_sale(sale: &Sale, product_name: impl Into<String>, shipping: ShippingAddress) -> Self {
        Self {
            origin: OrderOrigin {
                conversation_id: None,
                sale_id: Some(sale.id_typed()),
            },
            shipping,
            product_id: sale.product_id(),
            product_name: product_name.into(),
            quantity: sale.quantity(),
            pricing: PricingSnapshot::from(&sale.breakdown()),
            payment: None,
        }
    }
}

/// Dispatch-order lifecycle: create, pay, ship, deliver, and the admin override.
///
/// Commands go through the [`CommandDispatcher`]; the order's stream is then
/// folded into the `despachos` projection before the call returns. Commit and
/// projection run under one write lock so documents never skip a version.
pub struct FulfillmentService<S, B> {
    dispatcher: CommandDispatcher<S, B>,
    projection: DispatchOrdersProjection<DispatchOrderStore>,
    logistics: Arc<dyn LogisticsProvider>,
    payment_gate: PaymentGate,
    write_lock: WriteLock,
}

impl<S, B> FulfillmentService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: CommandDispatcher<S, B>,
        orders: DispatchOrderStore,
        logistics: Arc<dyn LogisticsProvider>,
        payment_gate: PaymentGate,
    ) -> Self {
        Self {
            dispatcher,
            projection: DispatchOrdersProjection::new(orders),
            logistics,
            payment_gate,
            write_lock: WriteLock::default(),
        }
    }

    pub fn bus(&self) -> &B {
        self.dispatcher.bus()
    }

    pub fn payment_gate(&self) -> PaymentGate {
        self.payment_gate
    }

    #[instrument(skip(self, order), fields(product_id = %order.product_id))]
    pub fn create_order(
        &self,
        tenant_id: TenantId,
        order: NewDispatchOrder,
        occurred_at: DateTime<Utc>,
    ) -> Result<DispatchOrderDocument, ServiceError> {
        let order_id = DispatchOrderId::new(AggregateId::new());
        let doc = self.execute(
            tenant_id,
            order_id,
            DispatchOrderCommand::CreateDispatchOrder(CreateDispatchOrder {
                tenant_id,
                order_id,
                origin: order.origin,
                shipping: order.shipping,
                product_id: order.product_id,
                product_name: order.product_name,
                quantity: order.quantity,
                pricing: order.pricing,
                payment: order.payment,
                occurred_at,
            }),
        )?;
        info!(%order_id, payment_status = ?doc.payment_status, "dispatch order created");
        Ok(doc)
    }

    /// Payment webhook. Redelivery of the same payment is a no-op.
    #[instrument(skip(self, payment), fields(provider = %payment.provider, payment_id = %payment.payment_id))]
    pub fn confirm_payment(
        &self,
        tenant_id: TenantId,
        order_id: DispatchOrderId,
        payment: PaymentConfirmation,
        occurred_at: DateTime<Utc>,
    ) -> Result<DispatchOrderDocument, ServiceError> {
        self.execute(
            tenant_id,
            order_id,
            DispatchOrderCommand::ConfirmPayment(ConfirmPayment {
                tenant_id,
                order_id,
                payment,
                occurred_at,
            }),
        )
    }

    /// Mark an order shipped with a manually entered tracking number.
    #[instrument(skip(self))]
    pub fn mark_shipped(
        &self,
        tenant_id: TenantId,
        order_id: DispatchOrderId,
        tracking_number: Option<String>,
        courier_name: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Result<DispatchOrderDocument, ServiceError> {
        let doc = self.execute(
            tenant_id,
            order_id,
            self.ship_command(tenant_id, order_id, tracking_number, courier_name, occurred_at),
        )?;
        info!(tracking_number = ?doc.tracking_number, "order shipped");
        Ok(doc)
    }

    /// Book the shipment with the configured carrier, then mark the order shipped
    /// with the carrier's tracking number and courier.
    ///
    /// The transition is checked before the carrier is called, so an order that
    /// cannot ship never books a shipment. If another writer ships the order while
    /// the carrier call is in flight, the booking is orphaned: the error is returned
    /// and the carrier's tracking number is logged at `error` for manual cancellation.
    #[instrument(skip(self))]
    pub async fn ship_with_carrier(
        &self,
        tenant_id: TenantId,
        order_id: DispatchOrderId,
        occurred_at: DateTime<Utc>,
    ) -> Result<(DispatchOrderDocument, Shipment), ServiceError> {
        let order = self.load(tenant_id, order_id)?;
        if !order.exists() {
            return Err(ServiceError::not_found(format!("dispatch order {order_id}")));
        }
        order
            .handle(&self.ship_command(tenant_id, order_id, None, None, occurred_at))
            .map_err(DispatchError::from)?;

        let destination = order
            .shipping()
            .destination()
            .ok_or_else(|| LogisticsError::InvalidDestination("order has no city, district or address".to_string()))?;
        let request = ShipmentRequest {
            reference: order_id.to_string(),
            recipient: order.shipping().recipient.clone(),
            phone: order.shipping().phone.clone(),
            address_line: order.shipping().address_line.clone(),
            destination: destination.to_string(),
            quantity: order.quantity(),
        };

        let shipment = self
            .logistics
            .create_shipment(&request)
            .await
            .inspect_err(|e| warn!(carrier = self.logistics.name(), error = %e, "carrier rejected shipment"))?;

        let doc = self.execute(
            tenant_id,
            order_id,
            self.ship_command(
                tenant_id,
                order_id,
                Some(shipment.tracking_number.clone()),
                Some(shipment.courier_name.clone()),
                occurred_at,
            ),
        )
        .inspect_err(|e| {
            error!(
                %order_id,
                carrier = self.logistics.name(),
                tracking_number = %shipment.tracking_number,
                error = %e,
                "carrier shipment booked but order not marked shipped; cancel it with the carrier"
            )
        })?;
        info!(
            carrier = self.logistics.name(),
            tracking_number = %shipment.tracking_number,
            cost = shipment.cost,
            "order shipped with carrier"
        );
        Ok((doc, shipment))
    }

    #[instrument(skip(self))]
    pub fn mark_delivered(
        &self,
        tenant_id: TenantId,
        order_id: DispatchOrderId,
        occurred_at: DateTime<Utc>,
    ) -> Result<DispatchOrderDocument, ServiceError> {
        let doc = self.execute(
            tenant_id,
            order_id,
            DispatchOrderCommand::MarkDelivered(MarkDelivered {
                tenant_id,
                order_id,
                occurred_at,
            }),
        )?;
        info!("order delivered");
        Ok(doc)
    }

    /// Administrative status edit. Bypasses the lifecycle rules.
    #[instrument(skip(self, reason))]
    pub fn override_status(
        &self,
        tenant_id: TenantId,
        order_id: DispatchOrderId,
        status: ShipmentStatus,
        reason: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Result<DispatchOrderDocument, ServiceError> {
        warn!(%status, reason = reason.as_deref().unwrap_or(""), "shipment status overridden");
        self.execute(
            tenant_id,
            order_id,
            DispatchOrderCommand::OverrideShipmentStatus(OverrideShipmentStatus {
                tenant_id,
                order_id,
                status,
                reason,
                occurred_at,
            }),
        )
    }

    pub async fn quote_shipping(&self, destination: &str) -> Result<ShippingQuote, ServiceError> {
        Ok(self.logistics.quote(destination).await?)
    }

    pub fn get_order(&self, tenant_id: TenantId, order_id: DispatchOrderId) -> Result<DispatchOrderDocument, ServiceError> {
        self.projection
            .get(tenant_id, &order_id)?
            .ok_or_else(|| ServiceError::not_found(format!("dispatch order {order_id}")))
    }

    /// Newest first.
    pub fn list_orders(&self, tenant_id: TenantId) -> Result<Vec<DispatchOrderDocument>, ServiceError> {
        Ok(self.projection.list(tenant_id)?)
    }

    pub fn list_by_status(
        &self,
        tenant_id: TenantId,
        status: ShipmentStatus,
    ) -> Result<Vec<DispatchOrderDocument>, ServiceError> {
        Ok(self.projection.list_by_status(tenant_id, status)?)
    }

    /// Drop the tenant's documents and refold them from the event store.
    #[instrument(skip(self))]
    pub fn rebuild_projection(&self, tenant_id: TenantId) -> Result<(), ServiceError> {
        let _guard = self.write_lock.acquire()?;
        let history = self
            .dispatcher
            .store()
            .load_tenant(tenant_id, DispatchOrder::AGGREGATE_TYPE)
            .map_err(DispatchError::from)?;
        let envelopes: Vec<_> = history.iter().map(StoredEvent::to_envelope).collect();
        self.projection.rebuild_tenant(tenant_id, &envelopes)?;
        info!(events = envelopes.len(), "dispatch order projection rebuilt");
        Ok(())
    }

    fn ship_command(
        &self,
        tenant_id: TenantId,
        order_id: DispatchOrderId,
        tracking_number: Option<String>,
        courier_name: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> DispatchOrderCommand {
        DispatchOrderCommand::MarkShipped(MarkShipped {
            tenant_id,
            order_id,
            tracking_number,
            courier_name,
            payment_gate: self.payment_gate,
            occurred_at,
        })
    }

    fn load(&self, tenant_id: TenantId, order_id: DispatchOrderId) -> Result<DispatchOrder, ServiceError> {
        Ok(self
            .dispatcher
            .load(tenant_id, order_id.0, |id| DispatchOrder::empty(DispatchOrderId::new(id)))?)
    }

    fn execute(
        &self,
        tenant_id: TenantId,
        order_id: DispatchOrderId,
        command: DispatchOrderCommand,
    ) -> Result<DispatchOrderDocument, ServiceError> {
        let _guard = self.write_lock.acquire()?;
        let outcome = self
            .dispatcher
            .dispatch(tenant_id, order_id.0, DispatchOrder::AGGREGATE_TYPE, command, |id| {
                DispatchOrder::empty(DispatchOrderId::new(id))
            });
        // A rejected command may still have lost to a writer outside this service.
        let caught_up = self.catch_up(tenant_id, order_id);

        outcome.inspect_err(|e| match e {
            DispatchError::Store(_) | DispatchError::Publish(_) => {
                error!(%order_id, error = %e, "dispatch order write failed")
            }
            _ => warn!(%order_id, error = %e, "dispatch command rejected"),
        })?;
        caught_up.inspect_err(|e| error!(%order_id, error = %e, "dispatch order projection is behind the stream"))?;
        self.get_order(tenant_id, order_id)
    }

    /// Fold every committed event past the document's cursor.
    fn catch_up(&self, tenant_id: TenantId, order_id: DispatchOrderId) -> Result<(), ServiceError> {
        let stream = self
            .dispatcher
            .store()
            .load_stream(tenant_id, order_id.0)
            .map_err(DispatchError::from)?;
        for stored in &stream {
            self.projection.apply_envelope(&stored.to_envelope())?;
        }
        Ok(())
    }
}
