//! Read models rebuilt from committed events.

pub mod dispatch_orders;

pub use dispatch_orders::{DispatchOrderDocument, DispatchOrderProjectionError, DispatchOrdersProjection};
