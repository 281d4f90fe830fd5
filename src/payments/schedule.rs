use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{PaymentError, Result};
use crate::types::{EmiFrequency, InstallmentStatus};

/// one scheduled installment of an emi plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    /// 1-based position in the plan
    pub number: u32,
    pub due_date: DateTime<Utc>,
    pub amount: Money,
    pub amount_paid: Money,
    pub paid_date: Option<DateTime<Utc>>,
    pub status: InstallmentStatus,
    pub late_fee: Money,
}

impl Installment {
    pub fn new(number: u32, due_date: DateTime<Utc>, amount: Money) -> Self {
        Self {
            number,
            due_date,
            amount,
            amount_paid: Money::ZERO,
            paid_date: None,
            status: InstallmentStatus::Pending,
            late_fee: Money::ZERO,
        }
    }

    /// balance still owed, never negative
    pub fn remaining(&self) -> Money {
        (self.amount - self.amount_paid).non_negative()
    }

    pub fn is_settled(&self) -> bool {
        self.status == InstallmentStatus::Paid
    }

    /// open and strictly past its due date
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        self.status.is_open() && self.due_date < now
    }
}

/// monthly installment plan attached to a payment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmiPlan {
    pub installment_count: u32,
    /// base (ceiling) amount of installments 1..N-1
    pub installment_amount: Money,
    pub frequency: EmiFrequency,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub installments: Vec<Installment>,
    pub emis_paid: u32,
    pub emis_remaining: u32,
}

impl EmiPlan {
    /// build a plan for `outstanding` split into `count` monthly installments,
    /// first due one calendar month after `created_at`
    pub fn generate(outstanding: Money, count: u32, created_at: DateTime<Utc>) -> Result<Self> {
        let installments = EmiScheduleGenerator::generate(outstanding, count, created_at)?;
        Self::from_installments(installments)
    }

    /// wrap an already generated installment list
    pub fn from_installments(installments: Vec<Installment>) -> Result<Self> {
        let (first, last) = match (installments.first(), installments.last()) {
            (Some(first), Some(last)) => (first.clone(), last.clone()),
            _ => {
                return Err(PaymentError::InvalidInstallmentCount {
                    count: 0,
                    reason: "at least one installment is required".to_string(),
                })
            }
        };

        let mut plan = Self {
            installment_count: installments.len() as u32,
            installment_amount: first.amount,
            frequency: EmiFrequency::Monthly,
            start_date: first.due_date,
            end_date: last.due_date,
            installments,
            emis_paid: 0,
            emis_remaining: 0,
        };
        plan.refresh_counters();
        Ok(plan)
    }

    pub fn installment(&self, number: u32) -> Option<&Installment> {
        self.installments.iter().find(|i| i.number == number)
    }

    pub fn installment_mut(&mut self, number: u32) -> Option<&mut Installment> {
        self.installments.iter_mut().find(|i| i.number == number)
    }

    /// earliest-due installment that can still take a payment
    pub fn next_open_installment(&self) -> Option<&Installment> {
        self.installments
            .iter()
            .filter(|i| i.status.is_open())
            .min_by_key(|i| (i.due_date, i.number))
    }

    /// sum of unpaid balances across all installments
    pub fn outstanding_balance(&self) -> Money {
        self.installments.iter().map(|i| i.remaining()).sum()
    }

    pub fn total_scheduled(&self) -> Money {
        self.installments.iter().map(|i| i.amount).sum()
    }

    pub fn total_late_fee(&self) -> Money {
        self.installments.iter().map(|i| i.late_fee).sum()
    }

    pub fn overdue_installments(&self, now: DateTime<Utc>) -> Vec<&Installment> {
        self.installments.iter().filter(|i| i.is_past_due(now)).collect()
    }

    /// recount paid/remaining installments from their statuses
    pub fn refresh_counters(&mut self) {
        let paid = self.installments.iter().filter(|i| i.is_settled()).count() as u32;
        self.installment_count = self.installments.len() as u32;
        self.emis_paid = paid;
        self.emis_remaining = self.installment_count - paid;
    }
}

/// splits an outstanding amount into dated monthly installments
pub struct EmiScheduleGenerator;

impl EmiScheduleGenerator {
    pub fn generate(
        outstanding: Money,
        count: u32,
        created_at: DateTime<Utc>,
    ) -> Result<Vec<Installment>> {
        if count == 0 {
            return Err(PaymentError::InvalidInstallmentCount {
                count,
                reason: "at least one installment is required".to_string(),
            });
        }
        if !outstanding.is_positive() {
            return Err(PaymentError::InvalidPaymentAmount {
                amount: outstanding,
            });
        }

        let base = Self::base_amount(outstanding, count);
        let last = outstanding - base * Decimal::from(count - 1);
        if !last.is_positive() {
            return Err(PaymentError::InvalidInstallmentCount {
                count,
                reason: format!("too many installments for outstanding amount {}", outstanding),
            });
        }

        let start_date = add_months(created_at, 1)?;

        (1..=count)
            .map(|number| -> Result<Installment> {
                let due_date = add_months(start_date, number - 1)?;
                let amount = if number == count { last } else { base };
                Ok(Installment::new(number, due_date, amount))
            })
            .collect()
    }

    /// ceiling of outstanding / count in whole currency units
    pub fn base_amount(outstanding: Money, count: u32) -> Money {
        Money::from_decimal((outstanding.as_decimal() / Decimal::from(count)).ceil())
    }
}

/// calendar-month addition, clamped to the end of shorter months
fn add_months(date: DateTime<Utc>, months: u32) -> Result<DateTime<Utc>> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| PaymentError::DateOutOfRange {
            message: format!("{} plus {} months", date, months),
        })
}
