use serde::{Deserialize, Serialize};

use backoffice_core::{DomainError, DomainResult, Entity, uuid_id};

uuid_id! {
    pub struct ProductId;
}

/// Catalog product as stored in the `productos` collection.
///
/// Prices and cost are currency amounts in floating point; nothing is rounded
/// before presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "precio_retail")]
    pub retail_price: f64,
    /// Wholesale price. Expected to be `<= retail_price`, not enforced.
    #[serde(rename = "precio_b2b")]
    pub b2b_price: f64,
    /// Purchase cost per unit.
    #[serde(rename = "costo_compra")]
    pub unit_cost: f64,
    pub stock: i64,
    #[serde(rename = "stock_minimo")]
    pub min_stock: i64,
    #[serde(rename = "activo")]
    pub active: bool,
}

/// Admin form input for a new product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub retail_price: f64,
    pub b2b_price: f64,
    pub unit_cost: f64,
    pub stock: i64,
    pub min_stock: i64,
}

impl Product {
    pub fn create(id: ProductId, input: NewProduct) -> DomainResult<Self> {
        let sku = input.sku.trim().to_string();
        let name = input.name.trim().to_string();
        if sku.is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        validate_amounts(input.retail_price, input.b2b_price, input.unit_cost)?;
        if input.stock < 0 {
            return Err(DomainError::validation("stock cannot be negative"));
        }
        if input.min_stock < 0 {
            return Err(DomainError::validation("min_stock cannot be negative"));
        }

        Ok(Self {
            id,
            sku,
            name,
            retail_price: input.retail_price,
            b2b_price: input.b2b_price,
            unit_cost: input.unit_cost,
            stock: input.stock,
            min_stock: input.min_stock,
            active: true,
        })
    }

    pub fn update_prices(&mut self, retail_price: f64, b2b_price: f64, unit_cost: f64) -> DomainResult<()> {
        validate_amounts(retail_price, b2b_price, unit_cost)?;
        self.retail_price = retail_price;
        self.b2b_price = b2b_price;
        self.unit_cost = unit_cost;
        Ok(())
    }

    /// Apply a signed stock movement (restock or manual correction).
    pub fn adjust_stock(&mut self, delta: i64) -> DomainResult<i64> {
        let next = self
            .stock
            .checked_add(delta)
            .ok_or_else(|| DomainError::validation("stock overflow"))?;
        if next < 0 {
            return Err(DomainError::validation(format!(
                "insufficient stock for {} (on hand: {}, movement: {delta})",
                self.sku, self.stock
            )));
        }
        self.stock = next;
        Ok(next)
    }

    pub fn set_min_stock(&mut self, min_stock: i64) -> DomainResult<()> {
        if min_stock < 0 {
            return Err(DomainError::validation("min_stock cannot be negative"));
        }
        self.min_stock = min_stock;
        Ok(())
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.min_stock
    }

    /// Whether the wholesale price is at or below retail.
    pub fn has_consistent_pricing(&self) -> bool {
        self.b2b_price <= self.retail_price
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn validate_amounts(retail_price: f64, b2b_price: f64, unit_cost: f64) -> DomainResult<()> {
    for (label, value) in [
        ("retail_price", retail_price),
        ("b2b_price", b2b_price),
        ("unit_cost", unit_cost),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(DomainError::validation(format!(
                "{label} must be a non-negative amount (got {value})"
            )));
        }
    }
    Ok(())
}
