use chrono::{DateTime, Utc};

/// An immutable, versioned business fact.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable dotted name, e.g. `"fulfillment.order.shipped"`.
    fn event_type(&self) -> &'static str;

    /// Schema version of the payload.
    fn version(&self) -> u32;

    /// Business time of the fact (not the append time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
