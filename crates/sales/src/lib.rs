//! Sales domain: channel pricing, the sale profit calculator and the sale ledger entry.
//!
//! Everything here is deterministic and IO-free. Callers hand in the product and
//! affiliate collections they loaded; persistence lives in infra.

pub mod calculator;
pub mod error;
pub mod pricing;
pub mod sale;

pub use calculator::{
    CalculatorOptions, FIXED_OVERHEAD_RATE, MissingProductPolicy, OverheadPolicy, SaleBreakdown,
    SaleInput, calculate_sale,
};
pub use error::SaleError;
pub use pricing::{SaleChannel, resolve_price};
pub use sale::{Sale, SaleId, SaleNumber, SaleStatus};
