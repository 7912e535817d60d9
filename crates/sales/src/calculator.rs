//! Sale profit calculator.
//!
//! Amounts are `f64` and are never rounded here: the order of operations below
//! is part of the contract, so stored sales reproduce bit for bit.

use serde::{Deserialize, Serialize};

use backoffice_affiliates::{Affiliate, AffiliateId};
use backoffice_products::{Product, ProductId};

use crate::error::SaleError;
use crate::pricing::{SaleChannel, resolve_price};

/// Operating-expense share of the sale total used unless a configured rate is opted into.
pub const FIXED_OVERHEAD_RATE: f64 = 0.05;

/// What to do when the sale references a product missing from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingProductPolicy {
    /// Fail with [`SaleError::ProductNotFound`].
    #[default]
    Reject,
    /// Legacy behaviour: return an all-zero breakdown.
    ZeroResult,
}

/// How the operating overhead is derived from the sale total.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "percent")]
pub enum OverheadPolicy {
    /// Always [`FIXED_OVERHEAD_RATE`], whatever the settings screen shows.
    #[default]
    Fixed,
    /// The configured "gastos operativos" percentage (0..=100).
    Configured(f64),
}

impl OverheadPolicy {
    pub fn rate(self) -> f64 {
        match self {
            OverheadPolicy::Fixed => FIXED_OVERHEAD_RATE,
            OverheadPolicy::Configured(percent) => percent / 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CalculatorOptions {
    pub missing_product: MissingProductPolicy,
    pub overhead: OverheadPolicy,
}

/// One sale line as entered by the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleInput {
    pub product_id: ProductId,
    pub channel: SaleChannel,
    pub quantity: i64,
    /// Only earns commission when `channel` is [`SaleChannel::Affiliate`].
    pub affiliate_id: Option<AffiliateId>,
    /// Currency amount taken off the subtotal (not a percentage).
    pub discount: f64,
}

/// Monetary fields derived for one sale line.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SaleBreakdown {
    pub unit_price: f64,
    pub subtotal: f64,
    pub total: f64,
    pub cost: f64,
    pub commission: f64,
    pub overhead: f64,
    pub profit: f64,
}

impl SaleBreakdown {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }
}

/// Derive subtotal, total, cost, commission, overhead and profit for one line.
///
/// Quantity and discount are validated first; the product is then resolved
/// against `products` (see [`MissingProductPolicy`]) and the affiliate, when
/// relevant, against `affiliates`. An affiliate id that resolves to nothing
/// simply earns no commission.
pub fn calculate_sale(
    input: &SaleInput,
    products: &[Product],
    affiliates: &[Affiliate],
    options: &CalculatorOptions,
) -> Result<SaleBreakdown, SaleError> {
    if input.quantity <= 0 {
        return Err(SaleError::InvalidQuantity(input.quantity));
    }
    if !input.discount.is_finite() || input.discount < 0.0 {
        return Err(SaleError::InvalidDiscount(input.discount));
    }

    let Some(product) = products.iter().find(|p| p.id == input.product_id) else {
        return match options.missing_product {
            MissingProductPolicy::Reject => Err(SaleError::ProductNotFound(input.product_id)),
            MissingProductPolicy::ZeroResult => Ok(SaleBreakdown::zero()),
        };
    };

    let quantity = input.quantity as f64;
    let unit_price = resolve_price(product, input.channel)?;
    let subtotal = unit_price * quantity;
    let total = subtotal - input.discount;
    let cost = product.unit_cost * quantity;

    let commission = match (input.channel, input.affiliate_id) {
        (SaleChannel::Affiliate, Some(affiliate_id)) => affiliates
            .iter()
            .find(|a| a.id_typed() == affiliate_id)
            .map(|a| total * (a.commission_percent() / 100.0))
            .unwrap_or(0.0),
        _ => 0.0,
    };

    let overhead = total * options.overhead.rate();
    let profit = total - cost - commission - overhead;

    Ok(SaleBreakdown {
        unit_price,
        subtotal,
        total,
        cost,
        commission,
        overhead,
        profit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use backoffice_affiliates::{AffiliateTier, ContactInfo, NewAffiliate};
    use backoffice_products::NewProduct;

    fn product(retail: f64, b2b: f64, cost: f64) -> Product {
        Product::create(
            ProductId::new(),
            NewProduct {
                sku: "SKU-TEST".to_string(),
                name: "Producto de prueba".to_string(),
                retail_price: retail,
                b2b_price: b2b,
                unit_cost: cost,
                stock: 100,
                min_stock: 5,
            },
        )
        .unwrap()
    }

    fn affiliate(percent: f64) -> Affiliate {
        Affiliate::register(
            AffiliateId::new(),
            NewAffiliate {
                name: "Socio".to_string(),
                contact: ContactInfo::default(),
                referral_code: "SOCIO".to_string(),
                commission_percent: percent,
                tier: AffiliateTier::Gold,
            },
        )
        .unwrap()
    }

    fn input(product: &Product, channel: SaleChannel, quantity: i64) -> SaleInput {
        SaleInput {
            product_id: product.id,
            channel,
            quantity,
            affiliate_id: None,
            discount: 0.0,
        }
    }

    #[test]
    fn retail_single_unit() {
        let p = product(29.99, 22.0, 12.0);
        let b = calculate_sale(&input(&p, SaleChannel::Retail, 1), &[p.clone()], &[], &CalculatorOptions::default())
            .unwrap();

        assert_eq!(b.subtotal, 29.99);
        assert_eq!(b.total, 29.99);
        assert_eq!(b.cost, 12.0);
        assert_eq!(b.commission, 0.0);
        assert_eq!(b.overhead, 29.99 * 0.05);
        assert!((b.overhead - 1.4995).abs() < 1e-12);
        assert_eq!(b.profit, 29.99 - 12.0 - 0.0 - 29.99 * 0.05);
        assert!((b.profit - 16.4905).abs() < 1e-9);
    }

    #[test]
    fn b2b_two_units() {
        let p = product(1000.0, 900.0, 800.0);
        let b = calculate_sale(&input(&p, SaleChannel::B2B, 2), &[p.clone()], &[], &CalculatorOptions::default())
            .unwrap();

        assert_eq!(b.unit_price, 900.0);
        assert_eq!(b.subtotal, 1800.0);
        assert_eq!(b.cost, 1600.0);
        assert_eq!(b.overhead, 90.0);
        assert_eq!(b.profit, 110.0);
    }

    #[test]
    fn affiliate_ten_percent() {
        let p = product(1000.0, 900.0, 800.0);
        let a = affiliate(10.0);
        let sale = SaleInput {
            affiliate_id: Some(a.id_typed()),
            ..input(&p, SaleChannel::Affiliate, 1)
        };

        let b = calculate_sale(&sale, &[p], &[a], &CalculatorOptions::default()).unwrap();

        assert_eq!(b.total, 1000.0);
        assert_eq!(b.commission, 100.0);
        assert_eq!(b.overhead, 50.0);
        assert_eq!(b.profit, 50.0);
    }

    #[test]
    fn affiliate_id_on_retail_sale_earns_nothing() {
        let p = product(1000.0, 900.0, 800.0);
        let a = affiliate(10.0);
        for channel in [SaleChannel::Retail, SaleChannel::B2B] {
            let sale = SaleInput {
                affiliate_id: Some(a.id_typed()),
                ..input(&p, channel, 1)
            };
            let b = calculate_sale(&sale, &[p.clone()], &[a.clone()], &CalculatorOptions::default()).unwrap();
            assert_eq!(b.commission, 0.0);
        }
    }

    #[test]
    fn unresolved_affiliate_earns_nothing() {
        let p = product(1000.0, 900.0, 800.0);
        let sale = SaleInput {
            affiliate_id: Some(AffiliateId::new()),
            ..input(&p, SaleChannel::Affiliate, 1)
        };
        let b = calculate_sale(&sale, &[p], &[affiliate(10.0)], &CalculatorOptions::default()).unwrap();
        assert_eq!(b.commission, 0.0);
        assert_eq!(b.profit, 1000.0 - 800.0 - 50.0);
    }

    #[test]
    fn discount_is_taken_from_total() {
        let p = product(100.0, 80.0, 40.0);
        let sale = SaleInput {
            discount: 15.5,
            ..input(&p, SaleChannel::Retail, 3)
        };
        let b = calculate_sale(&sale, &[p], &[], &CalculatorOptions::default()).unwrap();

        assert_eq!(b.subtotal, 300.0);
        assert_eq!(b.total, 284.5);
        assert_eq!(b.overhead, 284.5 * 0.05);
    }

    #[test]
    fn discount_above_subtotal_yields_negative_total() {
        let p = product(10.0, 8.0, 4.0);
        let sale = SaleInput {
            discount: 25.0,
            ..input(&p, SaleChannel::Retail, 1)
        };
        let b = calculate_sale(&sale, &[p], &[], &CalculatorOptions::default()).unwrap();
        assert_eq!(b.total, -15.0);
    }

    #[test]
    fn negative_discount_is_rejected() {
        let p = product(10.0, 8.0, 4.0);
        let sale = SaleInput {
            discount: -1.0,
            ..input(&p, SaleChannel::Retail, 1)
        };
        let err = calculate_sale(&sale, &[p], &[], &CalculatorOptions::default()).unwrap_err();
        assert_eq!(err, SaleError::InvalidDiscount(-1.0));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let p = product(10.0, 8.0, 4.0);
        for q in [0, -3] {
            let err = calculate_sale(&input(&p, SaleChannel::Retail, q), &[p.clone()], &[], &CalculatorOptions::default())
                .unwrap_err();
            assert_eq!(err, SaleError::InvalidQuantity(q));
        }
    }

    #[test]
    fn missing_product_rejected_by_default() {
        let p = product(10.0, 8.0, 4.0);
        let missing = input(&p, SaleChannel::Retail, 1);

        let err = calculate_sale(&missing, &[], &[], &CalculatorOptions::default()).unwrap_err();
        assert_eq!(err, SaleError::ProductNotFound(p.id));
    }

    #[test]
    fn missing_product_zero_result_policy() {
        let p = product(10.0, 8.0, 4.0);
        let options = CalculatorOptions {
            missing_product: MissingProductPolicy::ZeroResult,
            ..CalculatorOptions::default()
        };

        let b = calculate_sale(&input(&p, SaleChannel::Affiliate, 4), &[], &[], &options).unwrap();

        assert!(b.is_zero());
        assert_eq!(b.subtotal, 0.0);
        assert_eq!(b.total, 0.0);
        assert_eq!(b.cost, 0.0);
        assert_eq!(b.commission, 0.0);
        assert_eq!(b.overhead, 0.0);
        assert_eq!(b.profit, 0.0);
    }

    #[test]
    fn configured_overhead_is_opt_in() {
        let p = product(200.0, 150.0, 100.0);
        let sale = input(&p, SaleChannel::Retail, 1);

        let fixed = calculate_sale(&sale, &[p.clone()], &[], &CalculatorOptions::default()).unwrap();
        let configured = calculate_sale(
            &sale,
            &[p],
            &[],
            &CalculatorOptions {
                overhead: OverheadPolicy::Configured(12.0),
                ..CalculatorOptions::default()
            },
        )
        .unwrap();

        assert_eq!(fixed.overhead, 10.0);
        assert_eq!(configured.overhead, 200.0 * (12.0 / 100.0));
        assert_eq!(configured.profit, 200.0 - 100.0 - configured.overhead);
    }

    #[test]
    fn configured_five_percent_matches_fixed_rate() {
        assert_eq!(OverheadPolicy::Configured(5.0).rate(), FIXED_OVERHEAD_RATE);
    }

    #[test]
    fn cent_amounts_are_not_rounded() {
        let p = product(0.1, 0.1, 0.2);
        let b = calculate_sale(&input(&p, SaleChannel::Retail, 3), &[p], &[], &CalculatorOptions::default()).unwrap();

        // 0.1 * 3 is not exactly 0.3 in binary floating point; nothing rounds it.
        assert_eq!(b.subtotal, 0.1 * 3.0);
        assert_ne!(b.subtotal, 0.3);
        assert!((b.subtotal - 0.3).abs() < 1e-15);
        assert_eq!(format!("{:.2}", b.subtotal), "0.30");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn money() -> impl Strategy<Value = f64> {
            (0u32..1_000_000).prop_map(|cents| f64::from(cents) / 100.0)
        }

        fn channel() -> impl Strategy<Value = SaleChannel> {
            prop_oneof![
                Just(SaleChannel::Retail),
                Just(SaleChannel::B2B),
                Just(SaleChannel::Affiliate),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            #[test]
            fn retail_subtotal_is_price_times_quantity(
                retail in money(), b2b in money(), cost in money(), q in 1i64..1_000
            ) {
                let p = product(retail, b2b, cost);
                let b = calculate_sale(&input(&p, SaleChannel::Retail, q), &[p], &[], &CalculatorOptions::default()).unwrap();
                prop_assert_eq!(b.subtotal, retail * q as f64);
            }

            #[test]
            fn b2b_cost_is_unit_cost_times_quantity(
                retail in money(), b2b in money(), cost in money(), q in 1i64..1_000
            ) {
                let p = product(retail, b2b, cost);
                let b = calculate_sale(&input(&p, SaleChannel::B2B, q), &[p], &[], &CalculatorOptions::default()).unwrap();
                prop_assert_eq!(b.cost, cost * q as f64);
            }

            #[test]
            fn commission_only_on_affiliate_channel(
                retail in money(), q in 1i64..100, percent in 0.0f64..100.0, ch in channel(), discount in money()
            ) {
                let p = product(retail, retail, 1.0);
                let a = affiliate(percent);
                let sale = SaleInput {
                    affiliate_id: Some(a.id_typed()),
                    discount,
                    ..input(&p, ch, q)
                };
                let b = calculate_sale(&sale, &[p], &[a], &CalculatorOptions::default()).unwrap();

                if ch == SaleChannel::Affiliate {
                    prop_assert_eq!(b.commission, b.total * (percent / 100.0));
                } else {
                    prop_assert_eq!(b.commission, 0.0);
                }
            }

            #[test]
            fn overhead_is_five_percent_of_total(
                retail in money(), b2b in money(), q in 1i64..500, ch in channel(), discount in money()
            ) {
                let p = product(retail, b2b, 3.0);
                let sale = SaleInput { discount, ..input(&p, ch, q) };
                let b = calculate_sale(&sale, &[p], &[], &CalculatorOptions::default()).unwrap();
                prop_assert_eq!(b.overhead, b.total * 0.05);
            }

            #[test]
            fn profit_reconciles(
                retail in money(), b2b in money(), cost in money(), q in 1i64..500,
                ch in channel(), discount in money(), percent in 0.0f64..100.0
            ) {
                let p = product(retail, b2b, cost);
                let a = affiliate(percent);
                let sale = SaleInput {
                    affiliate_id: Some(a.id_typed()),
                    discount,
                    ..input(&p, ch, q)
                };
                let b = calculate_sale(&sale, &[p], &[a], &CalculatorOptions::default()).unwrap();
                prop_assert_eq!(b.profit, b.total - b.cost - b.commission - b.overhead);
                prop_assert_eq!(b.total, b.subtotal - discount);
            }
        }
    }
}
