use serde::{Deserialize, Serialize};

use backoffice_core::{DomainError, DomainResult, Entity, uuid_id};

uuid_id! {
    pub struct AffiliateId;
}

/// Display tier. Informational only: no rule promotes an affiliate automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AffiliateTier {
    #[default]
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    #[serde(rename = "telefono")]
    pub phone: Option<String>,
}

/// Admin form input for a new affiliate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAffiliate {
    pub name: String,
    pub contact: ContactInfo,
    pub referral_code: String,
    pub commission_percent: f64,
    pub tier: AffiliateTier,
}

/// Referral partner as stored in the `afiliados` collection.
///
/// Balances only move through [`Affiliate::credit_commission`] and
/// [`Affiliate::register_payout`], which keeps `paid <= accumulated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Affiliate {
    id: AffiliateId,
    #[serde(rename = "nombre")]
    name: String,
    #[serde(rename = "contacto", default)]
    contact: ContactInfo,
    #[serde(rename = "codigo_referido")]
    referral_code: String,
    #[serde(rename = "comision_porcentaje")]
    commission_percent: f64,
    #[serde(rename = "saldo_acumulado")]
    accumulated_balance: f64,
    #[serde(rename = "saldo_pagado")]
    paid_balance: f64,
    #[serde(rename = "activo")]
    active: bool,
    #[serde(rename = "nivel", default)]
    tier: AffiliateTier,
}

impl Affiliate {
    pub fn register(id: AffiliateId, input: NewAffiliate) -> DomainResult<Self> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        let referral_code = normalize_code(&input.referral_code);
        if referral_code.is_empty() {
            return Err(DomainError::validation("referral code cannot be empty"));
        }
        validate_percent(input.commission_percent)?;

        Ok(Self {
            id,
            name,
            contact: input.contact,
            referral_code,
            commission_percent: input.commission_percent,
            accumulated_balance: 0.0,
            paid_balance: 0.0,
            active: true,
            tier: input.tier,
        })
    }

    pub fn id_typed(&self) -> AffiliateId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn referral_code(&self) -> &str {
        &self.referral_code
    }

    /// Commission as a percentage in `0..=100`.
    pub fn commission_percent(&self) -> f64 {
        self.commission_percent
    }

    pub fn accumulated_balance(&self) -> f64 {
        self.accumulated_balance
    }

    pub fn paid_balance(&self) -> f64 {
        self.paid_balance
    }

    /// Earned but not yet paid out.
    pub fn pending_balance(&self) -> f64 {
        self.accumulated_balance - self.paid_balance
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn tier(&self) -> AffiliateTier {
        self.tier
    }

    pub fn matches_code(&self, code: &str) -> bool {
        self.referral_code == normalize_code(code)
    }

    pub fn set_commission_percent(&mut self, percent: f64) -> DomainResult<()> {
        validate_percent(percent)?;
        self.commission_percent = percent;
        Ok(())
    }

    pub fn set_tier(&mut self, tier: AffiliateTier) {
        self.tier = tier;
    }

    pub fn update_contact(&mut self, contact: ContactInfo) {
        self.contact = contact;
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Add earned commission to the accumulated balance.
    pub fn credit_commission(&mut self, amount: f64) -> DomainResult<f64> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(DomainError::validation(format!(
                "commission credit must be a non-negative amount (got {amount})"
            )));
        }
        self.accumulated_balance += amount;
        Ok(self.accumulated_balance)
    }

    /// Record money paid to the affiliate; cannot exceed the pending balance.
    pub fn register_payout(&mut self, amount: f64) -> DomainResult<f64> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(DomainError::validation(format!(
                "payout must be a positive amount (got {amount})"
            )));
        }
        let pending = self.pending_balance();
        if amount > pending {
            return Err(DomainError::validation(format!(
                "payout {amount} exceeds pending balance {pending}"
            )));
        }
        // Clamp so float rounding cannot push paid past accumulated.
        self.paid_balance = (self.paid_balance + amount).min(self.accumulated_balance);
        Ok(self.pending_balance())
    }
}

impl Entity for Affiliate {
    type Id = AffiliateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn validate_percent(percent: f64) -> DomainResult<()> {
    if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
        return Err(DomainError::validation(format!(
            "commission percent must be within 0..=100 (got {percent})"
        )));
    }
    Ok(())
}
