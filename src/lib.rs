pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod fees;
pub mod late_fee;
pub mod payments;
pub mod record;
pub mod serialization;
pub mod service;
pub mod store;
pub mod types;

// re-export key types
pub use config::{LateFeeConfig, PaymentConfig};
pub use decimal::{Money, Rate};
pub use errors::{ErrorKind, PaymentError, Result};
pub use events::{Event, EventStore};
pub use fees::{
    CouponCode, CouponDiscount, CouponEvaluator, EmiOption, FeeResolution, FeeResolver,
    FeeStructure, Program, ProgramCatalog,
};
pub use late_fee::{LateFeeAssessment, LateFeeCalculator, LateFeeCharge};
pub use payments::{
    generate_transaction_id, AllocationOutcome, EmiPlan, EmiScheduleGenerator, Installment,
    InstallmentApplication, PaymentAllocator, PaymentRequest, Transaction,
};
pub use record::{CouponUsage, PaymentReceipt, PaymentRecord};
pub use serialization::{EmiPlanView, FeeView, InstallmentView, PaymentRecordView};
pub use service::{
    AdmissionOutcome, AdmissionRequest, LateFeeOutcome, PaymentOutcome, PaymentService,
    RecordUpdate,
};
pub use store::{InMemoryRecordStore, PaymentRecordStore};
pub use types::{
    AllocationStrategy, DiscountType, EmiFrequency, InstallmentStatus, LateFeeBasis,
    PaymentMethod, PaymentStatus, RecordId, TransactionStatus,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
