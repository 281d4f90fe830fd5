use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decimal::{Money, Rate};
use crate::errors::{PaymentError, Result};
use crate::types::DiscountType;

use super::{normalize_code, CouponCode};

/// discount computed for a matched coupon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponDiscount {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    /// gross total fee the discount was computed against
    pub base_value: Money,
    /// never more than `base_value`
    pub discount_amount: Money,
}

/// validates coupon codes and computes discounts
pub struct CouponEvaluator;

impl CouponEvaluator {
    /// evaluate `code` against a coupon list.
    ///
    /// An inactive match reports `CouponInactive`, no match at all reports
    /// `CouponNotFound`. Both are non-fatal for fee resolution.
    pub fn evaluate(code: &str, coupons: &[CouponCode], base_value: Money) -> Result<CouponDiscount> {
        let wanted = normalize_code(code);

        let coupon = match coupons.iter().find(|c| c.is_active && c.matches(&wanted)) {
            Some(coupon) => coupon,
            None if coupons.iter().any(|c| c.matches(&wanted)) => {
                return Err(PaymentError::CouponInactive { code: wanted });
            }
            None => return Err(PaymentError::CouponNotFound { code: wanted }),
        };

        let discount_amount = Self::discount_for(coupon, base_value);

        debug!(
            code = %coupon.code,
            base = %base_value,
            discount = %discount_amount,
            "coupon evaluated"
        );

        Ok(CouponDiscount {
            code: coupon.code.clone(),
            discount_type: coupon.discount_type,
            discount_value: coupon.discount_value,
            base_value,
            discount_amount,
        })
    }

    /// raw discount clamped to [0, base]
    pub fn discount_for(coupon: &CouponCode, base_value: Money) -> Money {
        let raw = match coupon.discount_type {
            DiscountType::Percentage => {
                base_value.percentage(Rate::from_percentage(coupon.discount_value))
            }
            DiscountType::Fixed => Money::from_decimal(coupon.discount_value),
        };

        raw.min(base_value.non_negative()).non_negative()
    }
}
