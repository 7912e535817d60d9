use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LogisticsError {
    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    #[error("carrier rejected the shipment: {0}")]
    Rejected(String),

    #[error("carrier unavailable: {0}")]
    Unavailable(String),
}

/// Price and lead time for shipping to a destination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShippingQuote {
    pub cost: f64,
    pub days: u32,
}

/// What a carrier needs to book a shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentRequest {
    /// Caller-side reference, usually the dispatch order id.
    pub reference: String,
    pub recipient: Option<String>,
    pub phone: Option<String>,
    pub address_line: Option<String>,
    /// City or district used for tier selection.
    pub destination: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub tracking_number: String,
    pub courier_name: String,
    pub cost: f64,
    pub estimated_days: u32,
    pub label_url: Option<String>,
}

/// Carrier capability. Real carriers are network-bound, hence async.
#[async_trait::async_trait]
pub trait LogisticsProvider: Send + Sync {
    /// Short identifier used in logs, e.g. `"mock"`.
    fn name(&self) -> &'static str;

    async fn quote(&self, destination: &str) -> Result<ShippingQuote, LogisticsError>;

    async fn create_shipment(&self, request: &ShipmentRequest) -> Result<Shipment, LogisticsError>;
}
