//! Domain events and their transport.
//!
//! Event-sourced modules (dispatch orders) implement [`Event`]; infra wraps the
//! committed payloads in an [`EventEnvelope`] and fans them out over an
//! [`EventBus`] to whatever outer layer is listening.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
