use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::LateFeeConfig;
use crate::decimal::Money;
use crate::errors::{PaymentError, Result};
use crate::events::{Event, EventStore};
use crate::fees::{normalize_code, CouponDiscount, FeeResolution};
use crate::late_fee::{LateFeeAssessment, LateFeeCalculator};
use crate::payments::{
    generate_transaction_id, AllocationOutcome, EmiPlan, PaymentAllocator, PaymentRequest,
    Transaction,
};
use crate::types::{
    AllocationStrategy, DiscountType, InstallmentStatus, LateFeeBasis, PaymentMethod,
    PaymentStatus, RecordId, TransactionStatus,
};

/// coupon applied to a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponUsage {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub base_value: Money,
    pub discount_amount: Money,
    pub applied_at: DateTime<Utc>,
}

impl CouponUsage {
    pub fn from_discount(discount: &CouponDiscount, applied_at: DateTime<Utc>) -> Self {
        Self {
            code: discount.code.clone(),
            discount_type: discount.discount_type,
            discount_value: discount.discount_value,
            base_value: discount.base_value,
            discount_amount: discount.discount_amount,
            applied_at,
        }
    }
}

/// what a recorded payment produced
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReceipt {
    pub transaction: Transaction,
    /// `None` when the record has no emi plan
    pub allocation: Option<AllocationOutcome>,
}

/// fee and payment state of one admission; derived fields are only ever
/// written by `recompute_invariants`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    id: RecordId,
    payer_id: String,
    course_id: String,
    program_id: String,

    total_fee: Money,
    registration_fee: Money,
    processing_fee: Money,

    // derived
    total_paid: Money,
    total_due: Money,
    total_discount: Money,
    status: PaymentStatus,
    next_payment_date: Option<DateTime<Utc>>,

    emi_plan: Option<EmiPlan>,
    transactions: Vec<Transaction>,
    coupon_usages: Vec<CouponUsage>,

    late_fee_config: LateFeeConfig,
    total_late_fee: Money,

    last_payment_date: Option<DateTime<Utc>>,
    is_active: bool,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,

    #[serde(skip)]
    events: EventStore,
}

fn require_identifier(field: &'static str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PaymentError::InvalidIdentifier {
            field,
            value: value.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

impl PaymentRecord {
    /// open a record for a resolved fee position
    pub fn new(
        payer_id: &str,
        course_id: &str,
        program_id: &str,
        fees: &FeeResolution,
        late_fee_config: LateFeeConfig,
        time_provider: &SafeTimeProvider,
    ) -> Result<Self> {
        let payer_id = require_identifier("payer_id", payer_id)?;
        let course_id = require_identifier("course_id", course_id)?;
        let program_id = require_identifier("program_id", program_id)?;
        let now = time_provider.now();

        let mut record = Self {
            id: Uuid::new_v4(),
            payer_id,
            course_id,
            program_id,
            total_fee: fees.gross_total_fee,
            registration_fee: fees.registration_fee,
            processing_fee: fees.processing_fee,
            total_paid: Money::ZERO,
            total_due: fees.gross_total_fee,
            total_discount: Money::ZERO,
            status: PaymentStatus::Pending,
            next_payment_date: None,
            emi_plan: None,
            transactions: Vec::new(),
            coupon_usages: Vec::new(),
            late_fee_config,
            total_late_fee: Money::ZERO,
            last_payment_date: None,
            is_active: true,
            version: 0,
            created_at: now,
            updated_at: now,
            events: EventStore::new(),
        };
        record.recompute_invariants(now);

        record.events.emit(Event::RecordCreated {
            record_id: record.id,
            payer_id: record.payer_id.clone(),
            program_id: record.program_id.clone(),
            total_fee: record.total_fee,
            total_due: record.total_due,
            timestamp: now,
        });

        info!(
            record_id = %record.id,
            payer_id = %record.payer_id,
            program_id = %record.program_id,
            total_fee = %record.total_fee,
            "payment record created"
        );

        Ok(record)
    }

    fn ensure_active(&self) -> Result<()> {
        if !self.is_active {
            return Err(PaymentError::RecordInactive { id: self.id });
        }
        Ok(())
    }

    /// attach a coupon discount; each code counts once per record and
    /// only before installments are scheduled
    pub fn apply_coupon(
        &mut self,
        discount: &CouponDiscount,
        time_provider: &SafeTimeProvider,
    ) -> Result<CouponUsage> {
        self.ensure_active()?;
        if self.emi_plan.is_some() {
            warn!(record_id = %self.id, code = %discount.code, "coupon rejected, installments already scheduled");
            return Err(PaymentError::EmiPlanAlreadyExists { id: self.id });
        }

        let code = normalize_code(&discount.code);
        if self.coupon_usages.iter().any(|u| normalize_code(&u.code) == code) {
            return Err(PaymentError::CouponAlreadyApplied { code });
        }
        if discount.discount_amount.is_negative() {
            return Err(PaymentError::InvalidDiscount {
                message: format!("negative discount {} for coupon {}", discount.discount_amount, code),
            });
        }

        let now = time_provider.now();
        let usage = CouponUsage::from_discount(discount, now);
        self.coupon_usages.push(usage.clone());

        self.events.emit(Event::CouponApplied {
            record_id: self.id,
            code: code.clone(),
            discount_amount: discount.discount_amount,
            timestamp: now,
        });
        info!(record_id = %self.id, code = %code, discount = %discount.discount_amount, "coupon applied");

        self.recompute_invariants(now);
        Ok(usage)
    }

    /// attach a generated installment plan
    pub fn set_emi_plan(&mut self, plan: EmiPlan, time_provider: &SafeTimeProvider) -> Result<()> {
        self.ensure_active()?;
        if self.emi_plan.is_some() {
            return Err(PaymentError::EmiPlanAlreadyExists { id: self.id });
        }

        let now = time_provider.now();
        self.events.emit(Event::EmiPlanCreated {
            record_id: self.id,
            installment_count: plan.installment_count,
            installment_amount: plan.installment_amount,
            first_due_date: plan.start_date,
            timestamp: now,
        });
        info!(
            record_id = %self.id,
            installments = plan.installment_count,
            installment_amount = %plan.installment_amount,
            "emi plan created"
        );

        self.emi_plan = Some(plan);
        self.recompute_invariants(now);
        Ok(())
    }

    /// split the current amount due into `count` monthly installments
    pub fn setup_emi_plan(&mut self, count: u32, time_provider: &SafeTimeProvider) -> Result<()> {
        self.ensure_active()?;
        if self.emi_plan.is_some() {
            return Err(PaymentError::EmiPlanAlreadyExists { id: self.id });
        }
        let plan = EmiPlan::generate(self.total_due, count, self.created_at)?;
        self.set_emi_plan(plan, time_provider)
    }

    /// record a payment taken at admission, before any plan exists
    pub fn record_initial_payment(
        &mut self,
        amount: Money,
        method: PaymentMethod,
        time_provider: &SafeTimeProvider,
    ) -> Result<Transaction> {
        let request = PaymentRequest::new(amount, method).with_description("initial payment");
        let receipt = self.record_payment(request, AllocationStrategy::SingleInstallment, time_provider)?;
        Ok(receipt.transaction)
    }

    /// append a successful transaction and allocate it against the plan
    pub fn record_payment(
        &mut self,
        request: PaymentRequest,
        strategy: AllocationStrategy,
        time_provider: &SafeTimeProvider,
    ) -> Result<PaymentReceipt> {
        self.ensure_active()?;
        request.validate()?;

        let now = time_provider.now();
        let transaction_id = match request.transaction_id {
            Some(id) => id.trim().to_string(),
            None => generate_transaction_id(now),
        };
        if self.transactions.iter().any(|t| t.transaction_id == transaction_id) {
            warn!(record_id = %self.id, transaction_id = %transaction_id, "duplicate transaction rejected");
            return Err(PaymentError::DuplicateTransaction { transaction_id });
        }

        let allocation = match self.emi_plan.as_mut() {
            Some(plan) => Some(PaymentAllocator::new(strategy).allocate(plan, request.amount, now)?),
            None => None,
        };

        let transaction = Transaction {
            transaction_id,
            amount: request.amount,
            method: request.method,
            gateway_reference: request.gateway_reference,
            status: TransactionStatus::Success,
            timestamp: now,
            description: request.description,
        };
        self.transactions.push(transaction.clone());
        self.last_payment_date = Some(now);

        let (applied, unapplied) = match &allocation {
            Some(outcome) => (outcome.total_applied(), outcome.unapplied),
            None => (Money::ZERO, Money::ZERO),
        };

        self.events.emit(Event::PaymentReceived {
            record_id: self.id,
            transaction_id: transaction.transaction_id.clone(),
            amount: transaction.amount,
            method: transaction.method.clone(),
            applied,
            unapplied,
            strategy,
            timestamp: now,
        });
        if let Some(outcome) = &allocation {
            for application in outcome.applications.iter().filter(|a| a.settled) {
                self.events.emit(Event::InstallmentSettled {
                    record_id: self.id,
                    installment_number: application.number,
                    amount_paid: application.amount_paid,
                    status: application.status,
                    timestamp: now,
                });
            }
        }

        info!(
            record_id = %self.id,
            transaction_id = %transaction.transaction_id,
            amount = %transaction.amount,
            method = %transaction.method,
            "payment recorded"
        );

        self.recompute_invariants(now);

        Ok(PaymentReceipt {
            transaction,
            allocation,
        })
    }

    /// run a late fee pass over the plan as of now
    pub fn assess_late_fees(
        &mut self,
        basis: LateFeeBasis,
        time_provider: &SafeTimeProvider,
    ) -> Result<LateFeeAssessment> {
        self.ensure_active()?;
        let now = time_provider.now();

        let assessment = match self.emi_plan.as_mut() {
            Some(plan) => {
                LateFeeCalculator::new(self.late_fee_config, basis).assess(&mut plan.installments, now)
            }
            None => LateFeeAssessment::default(),
        };
        self.total_late_fee = assessment.total;

        if !assessment.charges.is_empty() || !assessment.newly_overdue.is_empty() {
            self.events.emit(Event::LateFeeAssessed {
                record_id: self.id,
                total_late_fee: assessment.total,
                overdue_installments: assessment.charges.iter().map(|c| c.number).collect(),
                timestamp: now,
            });
        }

        debug!(record_id = %self.id, total_late_fee = %assessment.total, "late fee pass complete");

        self.recompute_invariants(now);
        Ok(assessment)
    }

    /// soft-delete; history stays readable
    pub fn deactivate(&mut self, time_provider: &SafeTimeProvider) -> Result<()> {
        self.ensure_active()?;
        let now = time_provider.now();
        self.is_active = false;
        self.updated_at = now;
        self.events.emit(Event::RecordDeactivated {
            record_id: self.id,
            timestamp: now,
        });
        info!(record_id = %self.id, "payment record deactivated");
        Ok(())
    }

    /// rederive every computed field, in dependency order
    pub fn recompute_invariants(&mut self, now: DateTime<Utc>) {
        if let Some(plan) = self.emi_plan.as_mut() {
            plan.refresh_counters();
        }

        self.total_paid = self
            .transactions
            .iter()
            .filter(|t| t.is_success())
            .map(|t| t.amount)
            .sum();
        self.total_discount = self.coupon_usages.iter().map(|u| u.discount_amount).sum();
        self.total_due = self.total_fee - self.total_paid + self.total_late_fee - self.total_discount;

        let new_status = self.derive_status();
        if new_status != self.status {
            self.events.emit(Event::StatusChanged {
                record_id: self.id,
                old_status: self.status,
                new_status,
                timestamp: now,
            });
            debug!(record_id = %self.id, old = ?self.status, new = ?new_status, "status changed");
            self.status = new_status;
        }

        self.next_payment_date = self.emi_plan.as_ref().and_then(|plan| {
            plan.installments
                .iter()
                .filter(|i| i.status.is_unpaid())
                .map(|i| i.due_date)
                .min()
        });

        self.updated_at = now;
    }

    fn derive_status(&self) -> PaymentStatus {
        let any_overdue = self
            .emi_plan
            .as_ref()
            .map(|plan| plan.installments.iter().any(|i| i.status == InstallmentStatus::Overdue))
            .unwrap_or(false);

        if !self.total_due.is_positive() {
            PaymentStatus::Completed
        } else if any_overdue {
            PaymentStatus::Overdue
        } else if self.total_paid.is_positive() {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Pending
        }
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.take_events()
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn payer_id(&self) -> &str {
        &self.payer_id
    }

    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    pub fn program_id(&self) -> &str {
        &self.program_id
    }

    pub fn total_fee(&self) -> Money {
        self.total_fee
    }

    pub fn registration_fee(&self) -> Money {
        self.registration_fee
    }

    pub fn processing_fee(&self) -> Money {
        self.processing_fee
    }

    pub fn total_paid(&self) -> Money {
        self.total_paid
    }

    pub fn total_due(&self) -> Money {
        self.total_due
    }

    pub fn total_discount(&self) -> Money {
        self.total_discount
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn next_payment_date(&self) -> Option<DateTime<Utc>> {
        self.next_payment_date
    }

    pub fn last_payment_date(&self) -> Option<DateTime<Utc>> {
        self.last_payment_date
    }

    pub fn emi_plan(&self) -> Option<&EmiPlan> {
        self.emi_plan.as_ref()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn coupon_usages(&self) -> &[CouponUsage] {
        &self.coupon_usages
    }

    pub fn late_fee_config(&self) -> LateFeeConfig {
        self.late_fee_config
    }

    pub fn total_late_fee(&self) -> Money {
        self.total_late_fee
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
