use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::decimal::Money;
use crate::errors::{PaymentError, Result};

use super::{CouponDiscount, CouponEvaluator, FeeStructure};

/// net fee position for an admission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeResolution {
    pub gross_total_fee: Money,
    pub discount: Option<CouponDiscount>,
    /// why a requested coupon was not applied
    pub coupon_rejection: Option<String>,
    /// gross minus discount, floored at zero
    pub net_total_fee: Money,
    pub registration_fee: Money,
    pub processing_fee: Money,
    pub initial_payment: Money,
    /// net total minus initial payment, not clamped
    pub outstanding: Money,
}

impl FeeResolution {
    pub fn discount_amount(&self) -> Money {
        self.discount
            .as_ref()
            .map(|d| d.discount_amount)
            .unwrap_or(Money::ZERO)
    }
}

/// turns a fee structure, coupon and initial payment into an amount due
pub struct FeeResolver;

impl FeeResolver {
    pub fn resolve(
        program_id: &str,
        fee_structure: Option<&FeeStructure>,
        coupon_code: Option<&str>,
        initial_payment: Option<Money>,
    ) -> Result<FeeResolution> {
        let fees = fee_structure.ok_or_else(|| PaymentError::MissingFeeStructure {
            program_id: program_id.to_string(),
        })?;

        let initial_payment = initial_payment.unwrap_or(Money::ZERO);
        if initial_payment.is_negative() {
            return Err(PaymentError::InvalidPaymentAmount {
                amount: initial_payment,
            });
        }

        let gross = fees.total_fee;
        let mut coupon_rejection = None;

        let discount = match coupon_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => match CouponEvaluator::evaluate(code, &fees.coupons, gross) {
                Ok(discount) => Some(discount),
                Err(e) if e.is_non_fatal() => {
                    warn!(program_id, code, error = %e, "coupon not applied, continuing without discount");
                    coupon_rejection = Some(e.to_string());
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        let discount_amount = discount.as_ref().map(|d| d.discount_amount).unwrap_or(Money::ZERO);
        let net_total_fee = (gross - discount_amount).non_negative();

        Ok(FeeResolution {
            gross_total_fee: gross,
            discount,
            coupon_rejection,
            net_total_fee,
            registration_fee: fees.registration_fee,
            processing_fee: fees.processing_fee,
            initial_payment,
            outstanding: net_total_fee - initial_payment,
        })
    }
}
