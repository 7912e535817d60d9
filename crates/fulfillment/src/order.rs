use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use backoffice_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use backoffice_events::Event;
use backoffice_products::ProductId;
use backoffice_sales::{SaleBreakdown, SaleId};

/// Dispatch order identifier; doubles as the event stream id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DispatchOrderId(pub AggregateId);

impl DispatchOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for DispatchOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Shipment lifecycle.
///
/// `Pending -> Shipped -> Delivered` is driven by commands. `Preparing` and
/// `Returned` are only reachable through [`OverrideShipmentStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShipmentStatus {
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "preparando")]
    Preparing,
    #[serde(rename = "enviado")]
    Shipped,
    #[serde(rename = "entregado")]
    Delivered,
    #[serde(rename = "devuelto")]
    Returned,
}

impl ShipmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ShipmentStatus::Pending => "pendiente",
            ShipmentStatus::Preparing => "preparando",
            ShipmentStatus::Shipped => "enviado",
            ShipmentStatus::Delivered => "entregado",
            ShipmentStatus::Returned => "devuelto",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ShipmentStatus::Delivered | ShipmentStatus::Returned)
    }
}

impl core::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment sub-state, independent of the shipment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "pagado")]
    Paid,
}

/// Whether shipping requires a confirmed payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentGate {
    /// Unpaid orders may ship.
    #[default]
    Ignore,
    RequirePaid,
}

/// Where the order came from. Both links are loose references.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderOrigin {
    #[serde(rename = "conversacion_id")]
    pub conversation_id: Option<String>,
    #[serde(rename = "venta_id")]
    pub sale_id: Option<SaleId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShippingAddress {
    #[serde(rename = "nombre")]
    pub recipient: Option<String>,
    #[serde(rename = "telefono")]
    pub phone: Option<String>,
    #[serde(rename = "direccion")]
    pub address_line: Option<String>,
    #[serde(rename = "distrito")]
    pub district: Option<String>,
    #[serde(rename = "ciudad")]
    pub city: Option<String>,
    #[serde(rename = "referencia")]
    pub reference: Option<String>,
}

impl ShippingAddress {
    /// Best destination string for carrier quotes: city, else district, else the address line.
    pub fn destination(&self) -> Option<&str> {
        [&self.city, &self.district, &self.address_line]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
    }
}

/// Amounts copied from the sale at order time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PricingSnapshot {
    #[serde(rename = "precio_unitario")]
    pub unit_price: f64,
    pub total: f64,
    #[serde(rename = "costo")]
    pub cost: f64,
    #[serde(rename = "ganancia_neta")]
    pub net_profit: f64,
}

impl From<&SaleBreakdown> for PricingSnapshot {
    fn from(b: &SaleBreakdown) -> Self {
        Self {
            unit_price: b.unit_price,
            total: b.total,
            cost: b.cost,
            net_profit: b.profit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    /// e.g. `"stripe"`.
    pub provider: String,
    pub payment_id: String,
}

/// Aggregate root: DispatchOrder.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOrder {
    id: DispatchOrderId,
    tenant_id: Option<TenantId>,
    origin: OrderOrigin,
    shipping: ShippingAddress,
    product_id: Option<ProductId>,
    product_name: String,
    quantity: i64,
    pricing: PricingSnapshot,
    payment_status: PaymentStatus,
    payment: Option<PaymentConfirmation>,
    shipment_status: ShipmentStatus,
    tracking_number: Option<String>,
    courier_name: Option<String>,
    created_at: Option<DateTime<Utc>>,
    dispatched_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl DispatchOrder {
    /// Stream type recorded with every stored event.
    pub const AGGREGATE_TYPE: &'static str = "fulfillment.order";

    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: DispatchOrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            origin: OrderOrigin::default(),
            shipping: ShippingAddress::default(),
            product_id: None,
            product_name: String::new(),
            quantity: 0,
            pricing: PricingSnapshot::default(),
            payment_status: PaymentStatus::Pending,
            payment: None,
            shipment_status: ShipmentStatus::Pending,
            tracking_number: None,
            courier_name: None,
            created_at: None,
            dispatched_at: None,
            delivered_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> DispatchOrderId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn origin(&self) -> &OrderOrigin {
        &self.origin
    }

    pub fn shipping(&self) -> &ShippingAddress {
        &self.shipping
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn pricing(&self) -> &PricingSnapshot {
        &self.pricing
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn payment(&self) -> Option<&PaymentConfirmation> {
        self.payment.as_ref()
    }

    pub fn shipment_status(&self) -> ShipmentStatus {
        self.shipment_status
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn courier_name(&self) -> Option<&str> {
        self.courier_name.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn dispatched_at(&self) -> Option<DateTime<Utc>> {
        self.dispatched_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }
}

impl AggregateRoot for DispatchOrder {
    type Id = DispatchOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateDispatchOrder.
///
/// `payment` is set when the order comes from a confirmed checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateDispatchOrder {
    pub tenant_id: TenantId,
    pub order_id: DispatchOrderId,
    pub origin: OrderOrigin,
    pub shipping: ShippingAddress,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i64,
    pub pricing: PricingSnapshot,
    pub payment: Option<PaymentConfirmation>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmPayment {
    pub tenant_id: TenantId,
    pub order_id: DispatchOrderId,
    pub payment: PaymentConfirmation,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkShipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkShipped {
    pub tenant_id: TenantId,
    pub order_id: DispatchOrderId,
    pub tracking_number: Option<String>,
    pub courier_name: Option<String>,
    pub payment_gate: PaymentGate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkDelivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkDelivered {
    pub tenant_id: TenantId,
    pub order_id: DispatchOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: OverrideShipmentStatus (administrative direct edit, unguarded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideShipmentStatus {
    pub tenant_id: TenantId,
    pub order_id: DispatchOrderId,
    pub status: ShipmentStatus,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DispatchOrderCommand {
    CreateDispatchOrder(CreateDispatchOrder),
    ConfirmPayment(ConfirmPayment),
    MarkShipped(MarkShipped),
    MarkDelivered(MarkDelivered),
    OverrideShipmentStatus(OverrideShipmentStatus),
}

/// Event: DispatchOrderCreated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOrderCreated {
    pub tenant_id: TenantId,
    pub order_id: DispatchOrderId,
    pub origin: OrderOrigin,
    pub shipping: ShippingAddress,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i64,
    pub pricing: PricingSnapshot,
    pub payment: Option<PaymentConfirmation>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmed {
    pub tenant_id: TenantId,
    pub order_id: DispatchOrderId,
    pub payment: PaymentConfirmation,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderShipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderShipped {
    pub tenant_id: TenantId,
    pub order_id: DispatchOrderId,
    pub tracking_number: Option<String>,
    pub courier_name: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderDelivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDelivered {
    pub tenant_id: TenantId,
    pub order_id: DispatchOrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ShipmentStatusOverridden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentStatusOverridden {
    pub tenant_id: TenantId,
    pub order_id: DispatchOrderId,
    pub from: ShipmentStatus,
    pub to: ShipmentStatus,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DispatchOrderEvent {
    DispatchOrderCreated(DispatchOrderCreated),
    PaymentConfirmed(PaymentConfirmed),
    OrderShipped(OrderShipped),
    OrderDelivered(OrderDelivered),
    ShipmentStatusOverridden(ShipmentStatusOverridden),
}

impl Event for DispatchOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DispatchOrderEvent::DispatchOrderCreated(_) => "fulfillment.order.created",
            DispatchOrderEvent::PaymentConfirmed(_) => "fulfillment.order.payment_confirmed",
            DispatchOrderEvent::OrderShipped(_) => "fulfillment.order.shipped",
            DispatchOrderEvent::OrderDelivered(_) => "fulfillment.order.delivered",
            DispatchOrderEvent::ShipmentStatusOverridden(_) => "fulfillment.order.status_overridden",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DispatchOrderEvent::DispatchOrderCreated(e) => e.occurred_at,
            DispatchOrderEvent::PaymentConfirmed(e) => e.occurred_at,
            DispatchOrderEvent::OrderShipped(e) => e.occurred_at,
            DispatchOrderEvent::OrderDelivered(e) => e.occurred_at,
            DispatchOrderEvent::ShipmentStatusOverridden(e) => e.occurred_at,
        }
    }
}

impl Aggregate for DispatchOrder {
    type Command = DispatchOrderCommand;
    type Event = DispatchOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DispatchOrderEvent::DispatchOrderCreated(e) => {
                self.id = e.order_id;
                self.tenant_id = Some(e.tenant_id);
                self.origin = e.origin.clone();
                self.shipping = e.shipping.clone();
                self.product_id = Some(e.product_id);
                self.product_name = e.product_name.clone();
                self.quantity = e.quantity;
                self.pricing = e.pricing;
                self.payment_status = if e.payment.is_some() {
                    PaymentStatus::Paid
                } else {
                    PaymentStatus::Pending
                };
                self.payment = e.payment.clone();
                self.shipment_status = ShipmentStatus::Pending;
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            DispatchOrderEvent::PaymentConfirmed(e) => {
                self.payment_status = PaymentStatus::Paid;
                self.payment = Some(e.payment.clone());
            }
            DispatchOrderEvent::OrderShipped(e) => {
                self.shipment_status = ShipmentStatus::Shipped;
                self.tracking_number = e.tracking_number.clone();
                self.courier_name = e.courier_name.clone();
                self.dispatched_at = Some(e.occurred_at);
            }
            DispatchOrderEvent::OrderDelivered(e) => {
                self.shipment_status = ShipmentStatus::Delivered;
                self.delivered_at = Some(e.occurred_at);
            }
            DispatchOrderEvent::ShipmentStatusOverridden(e) => {
                self.shipment_status = e.to;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            DispatchOrderCommand::CreateDispatchOrder(cmd) => self.handle_create(cmd),
            DispatchOrderCommand::ConfirmPayment(cmd) => self.handle_confirm_payment(cmd),
            DispatchOrderCommand::MarkShipped(cmd) => self.handle_mark_shipped(cmd),
            DispatchOrderCommand::MarkDelivered(cmd) => self.handle_mark_delivered(cmd),
            DispatchOrderCommand::OverrideShipmentStatus(cmd) => self.handle_override(cmd),
        }
    }
}

impl DispatchOrder {
    fn ensure_existing(&self, tenant_id: TenantId, order_id: DispatchOrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateDispatchOrder) -> Result<Vec<DispatchOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("dispatch order already exists"));
        }
        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        let product_name = cmd.product_name.trim();
        if product_name.is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        let p = &cmd.pricing;
        if ![p.unit_price, p.total, p.cost, p.net_profit].iter().all(|v| v.is_finite()) {
            return Err(DomainError::validation("pricing snapshot must hold finite amounts"));
        }
        if let Some(payment) = &cmd.payment {
            validate_payment(payment)?;
        }

        Ok(vec![DispatchOrderEvent::DispatchOrderCreated(DispatchOrderCreated {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            origin: cmd.origin.clone(),
            shipping: cmd.shipping.clone(),
            product_id: cmd.product_id,
            product_name: product_name.to_string(),
            quantity: cmd.quantity,
            pricing: cmd.pricing,
            payment: cmd.payment.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm_payment(&self, cmd: &ConfirmPayment) -> Result<Vec<DispatchOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;
        validate_payment(&cmd.payment)?;

        match (self.payment_status, &self.payment) {
            // Webhooks are redelivered; the same confirmation twice is a no-op.
            (PaymentStatus::Paid, Some(existing)) if existing == &cmd.payment => Ok(vec![]),
            (PaymentStatus::Paid, _) => Err(DomainError::conflict(
                "order is already paid with a different payment",
            )),
            (PaymentStatus::Pending, _) => Ok(vec![DispatchOrderEvent::PaymentConfirmed(PaymentConfirmed {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                payment: cmd.payment.clone(),
                occurred_at: cmd.occurred_at,
            })]),
        }
    }

    fn handle_mark_shipped(&self, cmd: &MarkShipped) -> Result<Vec<DispatchOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;

        if self.shipment_status != ShipmentStatus::Pending {
            return Err(DomainError::invalid_transition(
                self.shipment_status,
                ShipmentStatus::Shipped,
            ));
        }
        if cmd.payment_gate == PaymentGate::RequirePaid && self.payment_status != PaymentStatus::Paid {
            return Err(DomainError::invariant("order must be paid before shipping"));
        }

        Ok(vec![DispatchOrderEvent::OrderShipped(OrderShipped {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            tracking_number: non_blank(cmd.tracking_number.as_deref()),
            courier_name: non_blank(cmd.courier_name.as_deref()),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_delivered(&self, cmd: &MarkDelivered) -> Result<Vec<DispatchOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;

        if self.shipment_status != ShipmentStatus::Shipped {
            return Err(DomainError::invalid_transition(
                self.shipment_status,
                ShipmentStatus::Delivered,
            ));
        }

        Ok(vec![DispatchOrderEvent::OrderDelivered(OrderDelivered {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_override(&self, cmd: &OverrideShipmentStatus) -> Result<Vec<DispatchOrderEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.order_id)?;

        if self.shipment_status == cmd.status {
            return Ok(vec![]);
        }

        Ok(vec![DispatchOrderEvent::ShipmentStatusOverridden(ShipmentStatusOverridden {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            from: self.shipment_status,
            to: cmd.status,
            reason: non_blank(cmd.reason.as_deref()),
            occurred_at: cmd.occurred_at,
        })])
    }
}

fn validate_payment(payment: &PaymentConfirmation) -> Result<(), DomainError> {
    if payment.provider.trim().is_empty() || payment.payment_id.trim().is_empty() {
        return Err(DomainError::validation("payment provider and payment id are required"));
    }
    Ok(())
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}
