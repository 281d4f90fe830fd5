use thiserror::Error;

use crate::decimal::Money;
use crate::types::RecordId;

/// how callers should surface an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// record, program or fee structure absent (404-equivalent)
    NotFound,
    /// malformed or missing input, never retried (400-equivalent)
    InvalidInput,
    /// stale write or duplicate submission (409-equivalent)
    Conflict,
    /// degrades to a default, e.g. zero discount
    NonFatal,
    /// storage or configuration failure
    Internal,
}

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("payment record not found: {id}")]
    RecordNotFound {
        id: RecordId,
    },

    #[error("program not found: {program_id}")]
    ProgramNotFound {
        program_id: String,
    },

    #[error("program {program_id} has no fee structure configured")]
    MissingFeeStructure {
        program_id: String,
    },

    #[error("emi option not found: {option_id}")]
    EmiOptionNotFound {
        option_id: String,
    },

    #[error("invalid payment amount: {amount}")]
    InvalidPaymentAmount {
        amount: Money,
    },

    #[error("payment method is required")]
    MissingPaymentMethod,

    #[error("invalid installment count {count}: {reason}")]
    InvalidInstallmentCount {
        count: u32,
        reason: String,
    },

    #[error("invalid identifier for {field}: {value:?}")]
    InvalidIdentifier {
        field: &'static str,
        value: String,
    },

    #[error("invalid discount: {message}")]
    InvalidDiscount {
        message: String,
    },

    #[error("coupon not found: {code}")]
    CouponNotFound {
        code: String,
    },

    #[error("coupon inactive: {code}")]
    CouponInactive {
        code: String,
    },

    #[error("coupon {code} already applied to this record")]
    CouponAlreadyApplied {
        code: String,
    },

    #[error("emi plan already set up for record {id}")]
    EmiPlanAlreadyExists {
        id: RecordId,
    },

    #[error("payment record {id} is inactive")]
    RecordInactive {
        id: RecordId,
    },

    #[error("version conflict on record {id}: expected {expected}, found {found}")]
    VersionConflict {
        id: RecordId,
        expected: u64,
        found: u64,
    },

    #[error("active payment record {id} already exists for this payer, course and program")]
    ActiveRecordExists {
        id: RecordId,
    },

    #[error("duplicate transaction: {transaction_id}")]
    DuplicateTransaction {
        transaction_id: String,
    },

    #[error("date out of range: {message}")]
    DateOutOfRange {
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("failed to load configuration: {0}")]
    ConfigLoad(String),

    #[error("record store unavailable: {message}")]
    StoreUnavailable {
        message: String,
    },
}

impl PaymentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::RecordNotFound { .. }
            | PaymentError::ProgramNotFound { .. }
            | PaymentError::MissingFeeStructure { .. }
            | PaymentError::EmiOptionNotFound { .. } => ErrorKind::NotFound,

            PaymentError::InvalidPaymentAmount { .. }
            | PaymentError::MissingPaymentMethod
            | PaymentError::InvalidInstallmentCount { .. }
            | PaymentError::InvalidIdentifier { .. }
            | PaymentError::InvalidDiscount { .. }
            | PaymentError::RecordInactive { .. }
            | PaymentError::EmiPlanAlreadyExists { .. }
            | PaymentError::DateOutOfRange { .. } => ErrorKind::InvalidInput,

            PaymentError::CouponNotFound { .. } | PaymentError::CouponInactive { .. } => {
                ErrorKind::NonFatal
            }

            PaymentError::CouponAlreadyApplied { .. }
            | PaymentError::VersionConflict { .. }
            | PaymentError::ActiveRecordExists { .. }
            | PaymentError::DuplicateTransaction { .. } => ErrorKind::Conflict,

            PaymentError::InvalidConfiguration { .. }
            | PaymentError::ConfigLoad(_)
            | PaymentError::StoreUnavailable { .. } => ErrorKind::Internal,
        }
    }

    /// coupon misses never block fee resolution
    pub fn is_non_fatal(&self) -> bool {
        self.kind() == ErrorKind::NonFatal
    }
}

impl From<toml::de::Error> for PaymentError {
    fn from(e: toml::de::Error) -> Self {
        PaymentError::ConfigLoad(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;
