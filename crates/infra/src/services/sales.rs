use chrono::{DateTime, Utc};
use tracing::{error, info, instrument, warn};

use backoffice_affiliates::AffiliateId;
use backoffice_core::TenantId;
use backoffice_sales::{
    CalculatorOptions, MissingProductPolicy, Sale, SaleBreakdown, SaleId, SaleInput, SaleNumber,
    SaleStatus, calculate_sale,
};

use super::{AffiliateStore, ProductStore, SaleStore, WriteLock};
use crate::error::ServiceError;

/// A sale as submitted from the admin form.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSale {
    pub input: SaleInput,
    pub status: SaleStatus,
    pub recorded_at: DateTime<Utc>,
}

impl RecordSale {
    pub fn completed(input: SaleInput, recorded_at: DateTime<Utc>) -> Self {
        Self {
            input,
            status: SaleStatus::Completed,
            recorded_at,
        }
    }
}

/// Prices, records and lists sales.
///
/// Recording a sale neither decrements stock nor credits the affiliate; both
/// are separate operator actions.
pub struct SalesService {
    products: ProductStore,
    affiliates: AffiliateStore,
    sales: SaleStore,
    options: CalculatorOptions,
    numbering: WriteLock,
}

impl SalesService {
    pub fn new(products: ProductStore, affiliates: AffiliateStore, sales: SaleStore, options: CalculatorOptions) -> Self {
        Self {
            products,
            affiliates,
            sales,
            options,
            numbering: WriteLock::default(),
        }
    }

    pub fn options(&self) -> CalculatorOptions {
        self.options
    }

    /// Price a sale without recording it (form preview).
    pub fn quote(&self, tenant_id: TenantId, input: &SaleInput) -> Result<SaleBreakdown, ServiceError> {
        self.calculate(tenant_id, input).map(|(breakdown, _)| breakdown)
    }

    /// Price and append a sale to the ledger with the next sale number.
    #[instrument(skip(self, request), fields(product_id = %request.input.product_id, channel = %request.input.channel))]
    pub fn record_sale(&self, tenant_id: TenantId, request: RecordSale) -> Result<Sale, ServiceError> {
        let (breakdown, product_found) = self
            .calculate(tenant_id, &request.input)
            .inspect_err(|e| warn!(error = %e, "sale rejected"))?;

        if !product_found {
            warn!("product missing from catalog; recording a zero-valued sale");
        }

        let _guard = self.numbering.acquire()?;
        let sequence = self.sales.count(tenant_id)? as u64 + 1;
        let number = SaleNumber::generate(request.recorded_at.date_naive(), sequence);
        let sale = Sale::record(
            SaleId::new(),
            number,
            &request.input,
            &breakdown,
            request.status,
            request.recorded_at,
        );
        self.sales
            .insert_new(tenant_id, sale.id_typed(), sale.clone())
            .inspect_err(|e| error!(sale_number = %sale.number(), error = %e, "sale ledger write failed"))?;

        info!(
            sale_number = %sale.number(),
            total = breakdown.total,
            profit = breakdown.profit,
            "sale recorded"
        );
        Ok(sale)
    }

    pub fn get_sale(&self, tenant_id: TenantId, sale_id: SaleId) -> Result<Sale, ServiceError> {
        self.sales
            .get(tenant_id, &sale_id)?
            .ok_or_else(|| ServiceError::not_found(format!("sale {sale_id}")))
    }

    /// Ledger in recording order.
    pub fn list_sales(&self, tenant_id: TenantId) -> Result<Vec<Sale>, ServiceError> {
        let mut sales = self.sales.list(tenant_id)?;
        sales.sort_by(|a, b| {
            a.recorded_at()
                .cmp(&b.recorded_at())
                .then_with(|| a.number().sequence().cmp(&b.number().sequence()))
        });
        Ok(sales)
    }

    pub fn sales_for_affiliate(&self, tenant_id: TenantId, affiliate_id: AffiliateId) -> Result<Vec<Sale>, ServiceError> {
        let mut sales = self.list_sales(tenant_id)?;
        sales.retain(|s| s.affiliate_id() == Some(affiliate_id));
        Ok(sales)
    }

    /// Breakdown plus whether the product was found in the catalog.
    fn calculate(&self, tenant_id: TenantId, input: &SaleInput) -> Result<(SaleBreakdown, bool), ServiceError> {
        let products = self.products.list(tenant_id)?;
        let affiliates = self.affiliates.list(tenant_id)?;
        let breakdown = calculate_sale(input, &products, &affiliates, &self.options)?;

        let product_found = self.options.missing_product == MissingProductPolicy::Reject
            || products.iter().any(|p| p.id == input.product_id);
        Ok((breakdown, product_found))
    }
}
