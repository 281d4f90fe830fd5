pub mod allocator;
pub mod schedule;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{PaymentError, Result};
use crate::types::{PaymentMethod, TransactionStatus};

pub use allocator::{AllocationOutcome, InstallmentApplication, PaymentAllocator};
pub use schedule::{EmiPlan, EmiScheduleGenerator, Installment};

/// incoming payment against a record
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub amount: Money,
    pub method: PaymentMethod,
    /// idempotency key; generated when absent
    pub transaction_id: Option<String>,
    pub gateway_reference: Option<String>,
    pub description: Option<String>,
}

impl PaymentRequest {
    pub fn new(amount: Money, method: PaymentMethod) -> Self {
        Self {
            amount,
            method,
            transaction_id: None,
            gateway_reference: None,
            description: None,
        }
    }

    pub fn with_transaction_id(mut self, id: impl Into<String>) -> Self {
        self.transaction_id = Some(id.into());
        self
    }

    pub fn with_gateway_reference(mut self, reference: impl Into<String>) -> Self {
        self.gateway_reference = Some(reference.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.amount.is_positive() {
            return Err(PaymentError::InvalidPaymentAmount {
                amount: self.amount,
            });
        }
        if let PaymentMethod::Other(name) = &self.method {
            if name.trim().is_empty() {
                return Err(PaymentError::MissingPaymentMethod);
            }
        }
        if let Some(id) = &self.transaction_id {
            if id.trim().is_empty() {
                return Err(PaymentError::InvalidIdentifier {
                    field: "transaction_id",
                    value: id.clone(),
                });
            }
        }
        Ok(())
    }
}

/// recorded payment; append-only once on a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub amount: Money,
    pub method: PaymentMethod,
    pub gateway_reference: Option<String>,
    pub status: TransactionStatus,
    pub timestamp: DateTime<Utc>,
    pub description: Option<String>,
}

impl Transaction {
    pub fn is_success(&self) -> bool {
        self.status == TransactionStatus::Success
    }
}

/// synthetic transaction id, `TXN-<unix millis>-<8 hex chars>`
pub fn generate_transaction_id(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::random();
    format!("TXN-{}-{:08x}", now.timestamp_millis(), suffix)
}
