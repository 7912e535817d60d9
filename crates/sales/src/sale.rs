use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use backoffice_affiliates::AffiliateId;
use backoffice_core::{Entity, uuid_id};
use backoffice_products::ProductId;

use crate::calculator::{SaleBreakdown, SaleInput};
use crate::pricing::SaleChannel;

uuid_id! {
    pub struct SaleId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SaleStatus {
    #[serde(rename = "Pendiente")]
    Pending,
    #[default]
    #[serde(rename = "Completada")]
    Completed,
    #[serde(rename = "Cancelada")]
    Cancelled,
    #[serde(rename = "Reembolsada")]
    Refunded,
}

/// Human-facing sale number, `V-<YYYYMMDD>-<NNNN>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaleNumber(String);

impl SaleNumber {
    /// `sequence` is the tenant's running sale count (1-based).
    pub fn generate(date: NaiveDate, sequence: u64) -> Self {
        Self(format!("V-{}-{sequence:04}", date.format("%Y%m%d")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Running count encoded in the number; `None` for a malformed number.
    pub fn sequence(&self) -> Option<u64> {
        self.0.rsplit('-').next()?.parse().ok()
    }
}

impl core::fmt::Display for SaleNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A recorded sale (`venta`): an immutable ledger entry.
///
/// The unit price and every derived amount are frozen at recording time, so
/// later catalog edits never change historical profit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    id: SaleId,
    #[serde(rename = "numero_venta")]
    number: SaleNumber,
    #[serde(rename = "producto_id")]
    product_id: ProductId,
    #[serde(rename = "afiliado_id")]
    affiliate_id: Option<AffiliateId>,
    #[serde(rename = "canal")]
    channel: SaleChannel,
    #[serde(rename = "cantidad")]
    quantity: i64,
    #[serde(rename = "precio_unitario")]
    unit_price: f64,
    subtotal: f64,
    #[serde(rename = "descuento")]
    discount: f64,
    total: f64,
    #[serde(rename = "costo_total")]
    cost: f64,
    #[serde(rename = "comision_afiliado")]
    commission: f64,
    #[serde(rename = "gastos_operativos")]
    overhead: f64,
    #[serde(rename = "ganancia_neta")]
    profit: f64,
    #[serde(rename = "estado")]
    status: SaleStatus,
    #[serde(rename = "fecha")]
    recorded_at: DateTime<Utc>,
}

impl Sale {
    pub fn record(
        id: SaleId,
        number: SaleNumber,
        input: &SaleInput,
        breakdown: &SaleBreakdown,
        status: SaleStatus,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            number,
            product_id: input.product_id,
            affiliate_id: input.affiliate_id,
            channel: input.channel,
            quantity: input.quantity,
            unit_price: breakdown.unit_price,
            subtotal: breakdown.subtotal,
            discount: input.discount,
            total: breakdown.total,
            cost: breakdown.cost,
            commission: breakdown.commission,
            overhead: breakdown.overhead,
            profit: breakdown.profit,
            status,
            recorded_at,
        }
    }

    pub fn id_typed(&self) -> SaleId {
        self.id
    }

    pub fn number(&self) -> &SaleNumber {
        &self.number
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn affiliate_id(&self) -> Option<AffiliateId> {
        self.affiliate_id
    }

    pub fn channel(&self) -> SaleChannel {
        self.channel
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn unit_price(&self) -> f64 {
        self.unit_price
    }

    pub fn discount(&self) -> f64 {
        self.discount
    }

    pub fn status(&self) -> SaleStatus {
        self.status
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    pub fn breakdown(&self) -> SaleBreakdown {
        SaleBreakdown {
            unit_price: self.unit_price,
            subtotal: self.subtotal,
            total: self.total,
            cost: self.cost,
            commission: self.commission,
            overhead: self.overhead,
            profit: self.profit,
        }
    }
}

impl Entity for Sale {
    type Id = SaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
