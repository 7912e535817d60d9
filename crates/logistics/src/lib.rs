//! Carrier integration seam.
//!
//! Dispatch code talks to a [`LogisticsProvider`] trait object; which carrier sits
//! behind it is a configuration choice made once by [`build_provider`]. Only the
//! mock carrier exists today.

pub mod clock;
pub mod factory;
pub mod mock;
pub mod provider;

pub use clock::{Clock, FixedClock, SystemClock};
pub use factory::{LogisticsProviderKind, build_provider};
pub use mock::MockLogisticsProvider;
pub use provider::{LogisticsError, LogisticsProvider, Shipment, ShipmentRequest, ShippingQuote};
