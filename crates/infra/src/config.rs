//! Layered configuration: built-in defaults, then a TOML file, then
//! `BACKOFFICE_`-prefixed environment variables (`__` separates sections, e.g.
//! `BACKOFFICE_SALES__OVERHEAD_PERCENT=8`).

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use backoffice_fulfillment::PaymentGate;
use backoffice_logistics::LogisticsProviderKind;
use backoffice_observability::LogConfig;
use backoffice_sales::{CalculatorOptions, FIXED_OVERHEAD_RATE, MissingProductPolicy, OverheadPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(#[from] figment::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesConfig {
    /// Operating-expense percentage shown on the settings screen.
    pub overhead_percent: f64,
    /// Use `overhead_percent` in the calculator instead of the fixed 5%.
    pub apply_configured_overhead: bool,
    pub missing_product: MissingProductPolicy,
}

impl Default for SalesConfig {
    fn default() -> Self {
        Self {
            overhead_percent: FIXED_OVERHEAD_RATE * 100.0,
            apply_configured_overhead: false,
            missing_product: MissingProductPolicy::Reject,
        }
    }
}

impl SalesConfig {
    pub fn calculator_options(&self) -> CalculatorOptions {
        CalculatorOptions {
            missing_product: self.missing_product,
            overhead: if self.apply_configured_overhead {
                OverheadPolicy::Configured(self.overhead_percent)
            } else {
                OverheadPolicy::Fixed
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FulfillmentConfig {
    pub require_payment_before_shipping: bool,
}

impl FulfillmentConfig {
    pub fn payment_gate(&self) -> PaymentGate {
        if self.require_payment_before_shipping {
            PaymentGate::RequirePaid
        } else {
            PaymentGate::Ignore
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticsConfig {
    pub provider: LogisticsProviderKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackofficeConfig {
    pub sales: SalesConfig,
    pub fulfillment: FulfillmentConfig,
    pub logistics: LogisticsConfig,
    pub logging: LogConfig,
}

impl BackofficeConfig {
    /// Load defaults, then `path` if it exists, then the environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Self::default()))
                .merge(Toml::file(path.as_ref()))
                .merge(Env::prefixed("BACKOFFICE_").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let pct = self.sales.overhead_percent;
        if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
            return Err(ConfigError::Invalid(format!(
                "sales.overhead_percent must be within 0..=100 (got {pct})"
            )));
        }
        Ok(())
    }
}
