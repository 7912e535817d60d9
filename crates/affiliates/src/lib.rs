//! Referral partners and their commission balances.

pub mod affiliate;

pub use affiliate::{Affiliate, AffiliateId, AffiliateTier, ContactInfo, NewAffiliate};
