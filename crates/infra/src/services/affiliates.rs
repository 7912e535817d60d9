use tracing::{info, instrument};

use backoffice_affiliates::{Affiliate, AffiliateId, AffiliateTier, ContactInfo, NewAffiliate};
use backoffice_core::{DomainError, TenantId};

use super::{AffiliateStore, WriteLock};
use crate::error::ServiceError;

/// Affiliate registry and commission ledger.
pub struct AffiliateService {
    affiliates: AffiliateStore,
    write_lock: WriteLock,
}

impl AffiliateService {
    pub fn new(affiliates: AffiliateStore) -> Self {
        Self {
            affiliates,
            write_lock: WriteLock::default(),
        }
    }

    /// Register an affiliate; referral codes are unique per tenant.
    #[instrument(skip(self, input), fields(code = %input.referral_code))]
    pub fn register(&self, tenant_id: TenantId, input: NewAffiliate) -> Result<Affiliate, ServiceError> {
        let affiliate = Affiliate::register(AffiliateId::new(), input)?;

        let _guard = self.write_lock.acquire()?;
        if self.find_by_code(tenant_id, affiliate.referral_code())?.is_some() {
            return Err(DomainError::conflict(format!(
                "referral code '{}' already in use",
                affiliate.referral_code()
            ))
            .into());
        }
        self.affiliates
            .insert_new(tenant_id, affiliate.id_typed(), affiliate.clone())?;

        info!(affiliate_id = %affiliate.id_typed(), "affiliate registered");
        Ok(affiliate)
    }

    pub fn get(&self, tenant_id: TenantId, affiliate_id: AffiliateId) -> Result<Affiliate, ServiceError> {
        self.affiliates
            .get(tenant_id, &affiliate_id)?
            .ok_or_else(|| ServiceError::not_found(format!("affiliate {affiliate_id}")))
    }

    /// Case-insensitive lookup, as typed by a customer at checkout.
    pub fn find_by_code(&self, tenant_id: TenantId, code: &str) -> Result<Option<Affiliate>, ServiceError> {
        Ok(self
            .affiliates
            .list(tenant_id)?
            .into_iter()
            .find(|a| a.matches_code(code)))
    }

    /// All affiliates ordered by name.
    pub fn list(&self, tenant_id: TenantId) -> Result<Vec<Affiliate>, ServiceError> {
        let mut affiliates = self.affiliates.list(tenant_id)?;
        affiliates.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(affiliates)
    }

    pub fn set_commission_percent(
        &self,
        tenant_id: TenantId,
        affiliate_id: AffiliateId,
        percent: f64,
    ) -> Result<Affiliate, ServiceError> {
        self.modify(tenant_id, affiliate_id, |a| a.set_commission_percent(percent))
    }

    pub fn set_tier(&self, tenant_id: TenantId, affiliate_id: AffiliateId, tier: AffiliateTier) -> Result<Affiliate, ServiceError> {
        self.modify(tenant_id, affiliate_id, |a| {
            a.set_tier(tier);
            Ok(())
        })
    }

    pub fn update_contact(
        &self,
        tenant_id: TenantId,
        affiliate_id: AffiliateId,
        contact: ContactInfo,
    ) -> Result<Affiliate, ServiceError> {
        self.modify(tenant_id, affiliate_id, |a| {
            a.update_contact(contact);
            Ok(())
        })
    }

    pub fn set_active(&self, tenant_id: TenantId, affiliate_id: AffiliateId, active: bool) -> Result<Affiliate, ServiceError> {
        self.modify(tenant_id, affiliate_id, |a| {
            if active { a.activate() } else { a.deactivate() }
            Ok(())
        })
    }

    /// Add earned commission to the affiliate's accumulated balance.
    #[instrument(skip(self))]
    pub fn credit_commission(
        &self,
        tenant_id: TenantId,
        affiliate_id: AffiliateId,
        amount: f64,
    ) -> Result<Affiliate, ServiceError> {
        let affiliate = self.modify(tenant_id, affiliate_id, |a| a.credit_commission(amount).map(|_| ()))?;
        info!(accumulated = affiliate.accumulated_balance(), "commission credited");
        Ok(affiliate)
    }

    /// Record a payout; it may not exceed the pending balance.
    #[instrument(skip(self))]
    pub fn register_payout(
        &self,
        tenant_id: TenantId,
        affiliate_id: AffiliateId,
        amount: f64,
    ) -> Result<Affiliate, ServiceError> {
        let affiliate = self.modify(tenant_id, affiliate_id, |a| a.register_payout(amount).map(|_| ()))?;
        info!(pending = affiliate.pending_balance(), "payout registered");
        Ok(affiliate)
    }

    fn modify(
        &self,
        tenant_id: TenantId,
        affiliate_id: AffiliateId,
        change: impl FnOnce(&mut Affiliate) -> Result<(), DomainError>,
    ) -> Result<Affiliate, ServiceError> {
        let _guard = self.write_lock.acquire()?;
        let mut affiliate = self.get(tenant_id, affiliate_id)?;
        change(&mut affiliate)?;
        self.affiliates.upsert(tenant_id, affiliate_id, affiliate.clone())?;
        Ok(affiliate)
    }
}
