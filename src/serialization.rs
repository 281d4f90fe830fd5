//! serialization support for payment records
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::payments::{EmiPlan, Installment, Transaction};
use crate::record::{CouponUsage, PaymentRecord};
use crate::types::{EmiFrequency, InstallmentStatus, PaymentStatus, RecordId};

/// serializable view of a payment record
#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentRecordView {
    pub id: RecordId,
    pub payer_id: String,
    pub course_id: String,
    pub program_id: String,
    pub status: PaymentStatus,
    pub is_active: bool,
    pub version: u64,
    pub fees: FeeView,
    pub emi_plan: Option<EmiPlanView>,
    pub transactions: Vec<Transaction>,
    pub coupons: Vec<CouponUsage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeeView {
    pub total_fee: Money,
    pub registration_fee: Money,
    pub processing_fee: Money,
    pub total_discount: Money,
    pub total_paid: Money,
    pub total_late_fee: Money,
    pub total_due: Money,
    pub late_fee_rate: Rate,
    pub grace_period_days: u32,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub last_payment_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmiPlanView {
    pub installment_count: u32,
    pub installment_amount: Money,
    pub frequency: EmiFrequency,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub emis_paid: u32,
    pub emis_remaining: u32,
    pub outstanding_balance: Money,
    pub installments: Vec<InstallmentView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InstallmentView {
    pub number: u32,
    pub due_date: DateTime<Utc>,
    pub amount: Money,
    pub amount_paid: Money,
    pub remaining: Money,
    pub paid_date: Option<DateTime<Utc>>,
    pub status: InstallmentStatus,
    pub late_fee: Money,
}

impl InstallmentView {
    pub fn from_installment(inst: &Installment) -> Self {
        InstallmentView {
            number: inst.number,
            due_date: inst.due_date,
            amount: inst.amount,
            amount_paid: inst.amount_paid,
            remaining: inst.remaining(),
            paid_date: inst.paid_date,
            status: inst.status,
            late_fee: inst.late_fee,
        }
    }
}

impl EmiPlanView {
    pub fn from_plan(plan: &EmiPlan) -> Self {
        EmiPlanView {
            installment_count: plan.installment_count,
            installment_amount: plan.installment_amount,
            frequency: plan.frequency,
            start_date: plan.start_date,
            end_date: plan.end_date,
            emis_paid: plan.emis_paid,
            emis_remaining: plan.emis_remaining,
            outstanding_balance: plan.outstanding_balance(),
            installments: plan.installments.iter().map(InstallmentView::from_installment).collect(),
        }
    }
}

impl PaymentRecordView {
    pub fn from_record(record: &PaymentRecord) -> Self {
        let late_fee = record.late_fee_config();
        PaymentRecordView {
            id: record.id(),
            payer_id: record.payer_id().to_string(),
            course_id: record.course_id().to_string(),
            program_id: record.program_id().to_string(),
            status: record.status(),
            is_active: record.is_active(),
            version: record.version(),
            fees: FeeView {
                total_fee: record.total_fee(),
                registration_fee: record.registration_fee(),
                processing_fee: record.processing_fee(),
                total_discount: record.total_discount(),
                total_paid: record.total_paid(),
                total_late_fee: record.total_late_fee(),
                total_due: record.total_due(),
                late_fee_rate: late_fee.rate,
                grace_period_days: late_fee.grace_period_days,
                next_payment_date: record.next_payment_date(),
                last_payment_date: record.last_payment_date(),
            },
            emi_plan: record.emi_plan().map(EmiPlanView::from_plan),
            transactions: record.transactions().to_vec(),
            coupons: record.coupon_usages().to_vec(),
            created_at: record.created_at(),
            updated_at: record.updated_at(),
        }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
