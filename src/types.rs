use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::PaymentError;

/// unique identifier for a payment record
pub type RecordId = Uuid;

/// how a coupon's discount value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    /// value is a percentage of the gross total fee
    Percentage,
    /// value is an absolute currency amount
    Fixed,
}

/// installment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallmentStatus {
    /// nothing paid, not yet past due
    Pending,
    /// some amount paid, balance remaining
    Partial,
    /// fully settled
    Paid,
    /// nothing paid and past due date
    Overdue,
}

impl InstallmentStatus {
    /// nothing has been paid against the installment
    pub fn is_unpaid(&self) -> bool {
        matches!(self, InstallmentStatus::Pending | InstallmentStatus::Overdue)
    }

    /// installment can still receive payments
    pub fn is_open(&self) -> bool {
        !matches!(self, InstallmentStatus::Paid)
    }
}

/// aggregate payment status of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Completed,
    Overdue,
}

/// transaction status as reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

/// payment method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Upi,
    NetBanking,
    BankTransfer,
    Cheque,
    Online,
    Other(String),
}

impl FromStr for PaymentMethod {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "" => Err(PaymentError::MissingPaymentMethod),
            "cash" => Ok(PaymentMethod::Cash),
            "card" | "credit_card" | "debit_card" => Ok(PaymentMethod::Card),
            "upi" => Ok(PaymentMethod::Upi),
            "netbanking" | "net_banking" => Ok(PaymentMethod::NetBanking),
            "bank_transfer" | "neft" | "rtgs" | "imps" => Ok(PaymentMethod::BankTransfer),
            "cheque" | "check" => Ok(PaymentMethod::Cheque),
            "online" => Ok(PaymentMethod::Online),
            _ => Ok(PaymentMethod::Other(s.trim().to_string())),
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::Upi => write!(f, "upi"),
            PaymentMethod::NetBanking => write!(f, "net_banking"),
            PaymentMethod::BankTransfer => write!(f, "bank_transfer"),
            PaymentMethod::Cheque => write!(f, "cheque"),
            PaymentMethod::Online => write!(f, "online"),
            PaymentMethod::Other(name) => write!(f, "{}", name),
        }
    }
}

/// installment frequency; monthly is the only schedule offered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmiFrequency {
    #[default]
    Monthly,
}

/// how a single payment is spread over open installments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
    /// apply to the earliest open installment only; excess stays unapplied
    #[default]
    SingleInstallment,
    /// roll excess into the following open installments in due order
    Cascade,
}

/// which installments accrue late fees and on what base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LateFeeBasis {
    /// only installments with nothing paid, charged on the full amount
    #[default]
    PendingOnly,
    /// unpaid and partially paid installments, charged on the remaining balance
    RemainingBalance,
}
