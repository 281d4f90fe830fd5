use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::decimal::Rate;
use crate::errors::{PaymentError, Result};
use crate::types::{AllocationStrategy, LateFeeBasis};

/// late fee terms, snapshotted onto every payment record at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LateFeeConfig {
    /// percentage of the installment charged per day late
    pub rate: Rate,
    /// days past the due date before fees start
    pub grace_period_days: u32,
}

impl Default for LateFeeConfig {
    fn default() -> Self {
        Self {
            rate: Rate::from_percentage(1),
            grace_period_days: 5,
        }
    }
}

/// payment processing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PaymentConfig {
    pub late_fee: LateFeeConfig,
    pub allocation_strategy: AllocationStrategy,
    pub late_fee_basis: LateFeeBasis,
}

impl PaymentConfig {
    /// 1% per day after a five day grace, oldest installment only, unpaid installments only
    pub fn standard() -> Self {
        Self {
            late_fee: LateFeeConfig::default(),
            allocation_strategy: AllocationStrategy::SingleInstallment,
            late_fee_basis: LateFeeBasis::PendingOnly,
        }
    }

    /// half a percent per day after fifteen days, payments cascade, partial balances charged
    pub fn lenient() -> Self {
        Self {
            late_fee: LateFeeConfig {
                rate: Rate::from_percentage(dec!(0.5)),
                grace_period_days: 15,
            },
            allocation_strategy: AllocationStrategy::Cascade,
            late_fee_basis: LateFeeBasis::RemainingBalance,
        }
    }

    /// parse from a TOML document; missing keys fall back to defaults
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: PaymentConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// load from a TOML file on disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            PaymentError::ConfigLoad(format!("{}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::info!(path = %path.display(), "loaded payment configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.late_fee.rate.is_negative() {
            return Err(PaymentError::InvalidConfiguration {
                message: format!("late fee rate must not be negative, got {}", self.late_fee.rate),
            });
        }
        if self.late_fee.rate.as_percentage() > dec!(100) {
            return Err(PaymentError::InvalidConfiguration {
                message: format!("late fee rate above 100% per day: {}", self.late_fee.rate),
            });
        }
        Ok(())
    }
}
