use serde::{Deserialize, Serialize};

use backoffice_products::Product;

use crate::error::SaleError;

/// Channel a sale is made through. Decides the price list and whether
/// affiliate commission applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SaleChannel {
    Retail,
    B2B,
    #[serde(rename = "Afiliado")]
    Affiliate,
}

impl core::fmt::Display for SaleChannel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            SaleChannel::Retail => "Retail",
            SaleChannel::B2B => "B2B",
            SaleChannel::Affiliate => "Afiliado",
        })
    }
}

/// Unit price for `product` on `channel`: wholesale for B2B, retail otherwise.
pub fn resolve_price(product: &Product, channel: SaleChannel) -> Result<f64, SaleError> {
    let (label, price) = match channel {
        SaleChannel::B2B => ("b2b_price", product.b2b_price),
        SaleChannel::Retail | SaleChannel::Affiliate => ("retail_price", product.retail_price),
    };

    if !price.is_finite() || price < 0.0 {
        return Err(SaleError::InvalidProduct {
            product_id: product.id,
            reason: format!("{label} is {price}"),
        });
    }

    Ok(price)
}
