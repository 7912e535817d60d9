//! Dispatch orders (`despachos`): the fulfillment lifecycle of a paid or
//! manually registered order, implemented as a deterministic event-sourced
//! aggregate.

pub mod order;

pub use order::{
    ConfirmPayment, CreateDispatchOrder, DispatchOrder, DispatchOrderCommand, DispatchOrderCreated,
    DispatchOrderEvent, DispatchOrderId, MarkDelivered, MarkShipped, OrderDelivered, OrderOrigin,
    OrderShipped, OverrideShipmentStatus, PaymentConfirmation, PaymentConfirmed, PaymentGate,
    PaymentStatus, PricingSnapshot, ShipmentStatus, ShipmentStatusOverridden, ShippingAddress,
};
