use tracing::{info, instrument, warn};

use backoffice_core::{DomainError, TenantId};
use backoffice_products::{NewProduct, Product, ProductId};

use super::{ProductStore, WriteLock};
use crate::error::ServiceError;

/// Product catalog maintenance.
pub struct CatalogService {
    products: ProductStore,
    write_lock: WriteLock,
}

impl CatalogService {
    pub fn new(products: ProductStore) -> Self {
        Self {
            products,
            write_lock: WriteLock::default(),
        }
    }

    /// Create a product. SKUs are unique per tenant (case-insensitive).
    #[instrument(skip(self, input), fields(sku = %input.sku))]
    pub fn create_product(&self, tenant_id: TenantId, input: NewProduct) -> Result<Product, ServiceError> {
        let product = Product::create(ProductId::new(), input)?;

        let _guard = self.write_lock.acquire()?;
        if self.find_by_sku(tenant_id, &product.sku)?.is_some() {
            return Err(DomainError::conflict(format!("sku '{}' already exists", product.sku)).into());
        }
        if !product.has_consistent_pricing() {
            warn!(
                product_id = %product.id,
                retail_price = product.retail_price,
                b2b_price = product.b2b_price,
                "wholesale price above retail"
            );
        }
        self.products.insert_new(tenant_id, product.id, product.clone())?;

        info!(product_id = %product.id, "product created");
        Ok(product)
    }

    pub fn get_product(&self, tenant_id: TenantId, product_id: ProductId) -> Result<Product, ServiceError> {
        self.products
            .get(tenant_id, &product_id)?
            .ok_or_else(|| ServiceError::not_found(format!("product {product_id}")))
    }

    pub fn find_by_sku(&self, tenant_id: TenantId, sku: &str) -> Result<Option<Product>, ServiceError> {
        let sku = sku.trim();
        Ok(self
            .products
            .list(tenant_id)?
            .into_iter()
            .find(|p| p.sku.eq_ignore_ascii_case(sku)))
    }

    /// Whole catalog ordered by SKU.
    pub fn list_products(&self, tenant_id: TenantId) -> Result<Vec<Product>, ServiceError> {
        let mut products = self.products.list(tenant_id)?;
        products.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(products)
    }

    /// Active products at or below their minimum stock.
    pub fn low_stock(&self, tenant_id: TenantId) -> Result<Vec<Product>, ServiceError> {
        let mut products = self.list_products(tenant_id)?;
        products.retain(|p| p.active && p.is_low_stock());
        Ok(products)
    }

    #[instrument(skip(self))]
    pub fn update_prices(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        retail_price: f64,
        b2b_price: f64,
        unit_cost: f64,
    ) -> Result<Product, ServiceError> {
        self.modify(tenant_id, product_id, |p| {
            p.update_prices(retail_price, b2b_price, unit_cost)?;
            if !p.has_consistent_pricing() {
                warn!(%product_id, "wholesale price above retail");
            }
            Ok(())
        })
    }

    /// Apply a signed stock movement; stock never goes below zero.
    #[instrument(skip(self))]
    pub fn adjust_stock(&self, tenant_id: TenantId, product_id: ProductId, delta: i64) -> Result<Product, ServiceError> {
        let product = self.modify(tenant_id, product_id, |p| p.adjust_stock(delta).map(|_| ()))?;
        if product.is_low_stock() {
            warn!(%product_id, stock = product.stock, min_stock = product.min_stock, "product at or below minimum stock");
        }
        Ok(product)
    }

    pub fn set_min_stock(&self, tenant_id: TenantId, product_id: ProductId, min_stock: i64) -> Result<Product, ServiceError> {
        self.modify(tenant_id, product_id, |p| p.set_min_stock(min_stock))
    }

    pub fn set_active(&self, tenant_id: TenantId, product_id: ProductId, active: bool) -> Result<Product, ServiceError> {
        self.modify(tenant_id, product_id, |p| {
            if active { p.activate() } else { p.deactivate() }
            Ok(())
        })
    }

    fn modify(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        change: impl FnOnce(&mut Product) -> Result<(), DomainError>,
    ) -> Result<Product, ServiceError> {
        let _guard = self.write_lock.acquire()?;
        let mut product = self.get_product(tenant_id, product_id)?;
        change(&mut product)?;
        self.products.upsert(tenant_id, product_id, product.clone())?;
        Ok(product)
    }
}
