use std::sync::Arc;

use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::provider::{LogisticsError, LogisticsProvider, Shipment, ShipmentRequest, ShippingQuote};

const LIMA_COST: f64 = 10.0;
const LIMA_DAYS: u32 = 1;
const PROVINCIAL_COST: f64 = 20.0;
const PROVINCIAL_DAYS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Lima,
    Provincial,
}

impl Tier {
    fn for_destination(destination: &str) -> Self {
        let normalized = destination.to_lowercase();
        if normalized.contains("lima") || normalized.contains("callao") {
            Tier::Lima
        } else {
            Tier::Provincial
        }
    }

    fn quote(self) -> ShippingQuote {
        match self {
            Tier::Lima => ShippingQuote { cost: LIMA_COST, days: LIMA_DAYS },
            Tier::Provincial => ShippingQuote {
                cost: PROVINCIAL_COST,
                days: PROVINCIAL_DAYS,
            },
        }
    }

    fn code(self) -> &'static str {
        match self {
            Tier::Lima => "LIMA",
            Tier::Provincial => "PROV",
        }
    }

    fn courier(self) -> &'static str {
        match self {
            Tier::Lima => "Mock Express Lima",
            Tier::Provincial => "Mock Cargo Provincias",
        }
    }
}

/// Stand-in carrier with two flat-rate tiers: Lima/Callao and everywhere else.
///
/// Tracking numbers are `MOCK-<LIMA|PROV>-<NNNN>` where `NNNN` is the last four
/// digits of the clock's epoch milliseconds.
#[derive(Clone)]
pub struct MockLogisticsProvider {
    clock: Arc<dyn Clock>,
}

impl MockLogisticsProvider {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn tracking_number(&self, tier: Tier) -> String {
        let millis = self.clock.now().timestamp_millis();
        format!("MOCK-{}-{:04}", tier.code(), millis.rem_euclid(10_000))
    }
}

impl Default for MockLogisticsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for MockLogisticsProvider {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MockLogisticsProvider").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl LogisticsProvider for MockLogisticsProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn quote(&self, destination: &str) -> Result<ShippingQuote, LogisticsError> {
        Ok(Tier::for_destination(destination).quote())
    }

    async fn create_shipment(&self, request: &ShipmentRequest) -> Result<Shipment, LogisticsError> {
        let tier = Tier::for_destination(&request.destination);
        let quote = tier.quote();
        let tracking_number = self.tracking_number(tier);

        debug!(
            reference = %request.reference,
            destination = %request.destination,
            tracking_number = %tracking_number,
            "mock shipment created"
        );

        Ok(Shipment {
            label_url: Some(format!("https://labels.mock-courier.local/{tracking_number}.pdf")),
            tracking_number,
            courier_name: tier.courier().to_string(),
            cost: quote.cost,
            estimated_days: quote.days,
        })
    }
}
