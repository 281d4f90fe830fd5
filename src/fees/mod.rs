pub mod coupon;
pub mod resolver;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::decimal::Money;
use crate::types::DiscountType;

pub use coupon::{CouponDiscount, CouponEvaluator};
pub use resolver::{FeeResolution, FeeResolver};

/// coupon attached to a fee structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponCode {
    /// stored uppercase, matched case-insensitively
    pub code: String,
    pub discount_type: DiscountType,
    /// percentage points for `Percentage`, currency amount for `Fixed`
    pub discount_value: Decimal,
    pub is_active: bool,
}

impl CouponCode {
    pub fn new(code: &str, discount_type: DiscountType, discount_value: Decimal) -> Self {
        Self {
            code: normalize_code(code),
            discount_type,
            discount_value,
            is_active: true,
        }
    }

    pub fn percentage(code: &str, percent: Decimal) -> Self {
        Self::new(code, DiscountType::Percentage, percent)
    }

    pub fn fixed(code: &str, amount: Money) -> Self {
        Self::new(code, DiscountType::Fixed, amount.as_decimal())
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn matches(&self, code: &str) -> bool {
        self.code.trim().eq_ignore_ascii_case(code.trim())
    }
}

/// canonical form of a coupon code
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// installment count choice offered by a program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmiOption {
    pub id: String,
    pub installments: u32,
    pub label: Option<String>,
}

impl EmiOption {
    pub fn new(id: &str, installments: u32) -> Self {
        Self {
            id: id.to_string(),
            installments,
            label: None,
        }
    }
}

/// fee structure owned by a program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeStructure {
    pub total_fee: Money,
    pub registration_fee: Money,
    pub processing_fee: Money,
    #[serde(default)]
    pub emi_options: Vec<EmiOption>,
    #[serde(default)]
    pub coupons: Vec<CouponCode>,
}

impl FeeStructure {
    pub fn new(total_fee: Money) -> Self {
        Self {
            total_fee,
            registration_fee: Money::ZERO,
            processing_fee: Money::ZERO,
            emi_options: Vec::new(),
            coupons: Vec::new(),
        }
    }

    pub fn with_registration_fee(mut self, fee: Money) -> Self {
        self.registration_fee = fee;
        self
    }

    pub fn with_processing_fee(mut self, fee: Money) -> Self {
        self.processing_fee = fee;
        self
    }

    pub fn with_emi_option(mut self, option: EmiOption) -> Self {
        self.emi_options.push(option);
        self
    }

    pub fn with_coupon(mut self, coupon: CouponCode) -> Self {
        self.coupons.push(coupon);
        self
    }

    pub fn emi_option(&self, id: &str) -> Option<&EmiOption> {
        self.emi_options.iter().find(|o| o.id == id)
    }
}

/// program as seen by the payment core; catalog storage lives elsewhere
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub id: String,
    pub name: String,
    pub fee_structure: Option<FeeStructure>,
}

impl Program {
    pub fn new(id: &str, name: &str, fee_structure: Option<FeeStructure>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            fee_structure,
        }
    }
}

/// read-only access to the program catalog
pub trait ProgramCatalog {
    fn program(&self, program_id: &str) -> Option<Program>;
}

impl ProgramCatalog for HashMap<String, Program> {
    fn program(&self, program_id: &str) -> Option<Program> {
        self.get(program_id).cloned()
    }
}
