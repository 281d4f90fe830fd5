use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decimal::Money;
use crate::errors::{PaymentError, Result};
use crate::types::{AllocationStrategy, InstallmentStatus};

use super::schedule::{EmiPlan, Installment};

/// amount applied to one installment by a payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentApplication {
    pub number: u32,
    pub applied: Money,
    pub amount_paid: Money,
    pub status: InstallmentStatus,
    /// this payment moved the installment to paid
    pub settled: bool,
}

/// result of spreading a payment over a plan
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AllocationOutcome {
    pub applications: Vec<InstallmentApplication>,
    /// part of the payment no installment absorbed
    pub unapplied: Money,
}

impl AllocationOutcome {
    pub fn total_applied(&self) -> Money {
        self.applications.iter().map(|a| a.applied).sum()
    }

    pub fn settled_installments(&self) -> Vec<u32> {
        self.applications
            .iter()
            .filter(|a| a.settled)
            .map(|a| a.number)
            .collect()
    }
}

/// applies payments to installments in due-date order
#[derive(Debug, Clone, Copy)]
pub struct PaymentAllocator {
    strategy: AllocationStrategy,
}

impl PaymentAllocator {
    pub fn new(strategy: AllocationStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> AllocationStrategy {
        self.strategy
    }

    /// allocate `amount` against the plan.
    ///
    /// `SingleInstallment` touches only the earliest-due open installment and
    /// leaves any excess unapplied. `Cascade` keeps going through later
    /// installments until the payment is used up.
    pub fn allocate(
        &self,
        plan: &mut EmiPlan,
        amount: Money,
        paid_at: DateTime<Utc>,
    ) -> Result<AllocationOutcome> {
        if !amount.is_positive() {
            return Err(PaymentError::InvalidPaymentAmount { amount });
        }

        let mut order: Vec<usize> = plan
            .installments
            .iter()
            .enumerate()
            .filter(|(_, i)| i.status.is_open())
            .map(|(idx, _)| idx)
            .collect();
        order.sort_by_key(|&idx| {
            let inst = &plan.installments[idx];
            (inst.due_date, inst.number)
        });

        let mut remaining = amount;
        let mut outcome = AllocationOutcome::default();

        for idx in order {
            if remaining.is_zero() {
                break;
            }

            let inst = &mut plan.installments[idx];
            let (application, left) = self.apply_to_installment(inst, remaining, paid_at);
            remaining = left;
            outcome.applications.push(application);

            if self.strategy == AllocationStrategy::SingleInstallment {
                break;
            }
        }

        outcome.unapplied = remaining;
        plan.refresh_counters();

        debug!(
            amount = %amount,
            applied = %outcome.total_applied(),
            unapplied = %outcome.unapplied,
            strategy = ?self.strategy,
            "payment allocated"
        );

        Ok(outcome)
    }

    fn apply_to_installment(
        &self,
        inst: &mut Installment,
        available: Money,
        paid_at: DateTime<Utc>,
    ) -> (InstallmentApplication, Money) {
        let applied = available.min(inst.remaining());
        inst.amount_paid += applied;

        let was_paid = inst.is_settled();
        if inst.amount_paid >= inst.amount {
            inst.status = InstallmentStatus::Paid;
            inst.paid_date = Some(paid_at);
        } else if inst.amount_paid.is_positive() {
            inst.status = InstallmentStatus::Partial;
        }

        let application = InstallmentApplication {
            number: inst.number,
            applied,
            amount_paid: inst.amount_paid,
            status: inst.status,
            settled: !was_paid && inst.is_settled(),
        };

        (application, available - applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn plan() -> EmiPlan {
        let created = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        EmiPlan::generate(Money::from_major(50_000), 12, created).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_single_installment_overpayment_not_rolled() {
        let mut plan = plan();
        let allocator = PaymentAllocator::new(AllocationStrategy::SingleInstallment);

        let outcome = allocator.allocate(&mut plan, Money::from_major(5_000), now()).unwrap();

        assert_eq!(outcome.applications.len(), 1);
        assert_eq!(outcome.total_applied(), Money::from_major(4_167));
        assert_eq!(outcome.unapplied, Money::from_major(833));
        assert_eq!(outcome.settled_installments(), vec![1]);

        let first = plan.installment(1).unwrap();
        assert_eq!(first.status, InstallmentStatus::Paid);
        assert_eq!(first.paid_date, Some(now()));
        let second = plan.installment(2).unwrap();
        assert_eq!(second.status, InstallmentStatus::Pending);
        assert_eq!(second.amount_paid, Money::ZERO);
        assert_eq!(plan.emis_paid, 1);
    }

    #[test]
    fn test_partial_payment() {
        let mut plan = plan();
        let allocator = PaymentAllocator::new(AllocationStrategy::SingleInstallment);

        allocator.allocate(&mut plan, Money::from_major(1_000), now()).unwrap();
        let first = plan.installment(1).unwrap();
        assert_eq!(first.status, InstallmentStatus::Partial);
        assert_eq!(first.remaining(), Money::from_major(3_167));
        assert!(first.paid_date.is_none());

        // the next payment goes to the same partial installment
        let outcome = allocator.allocate(&mut plan, Money::from_major(3_167), now()).unwrap();
        assert_eq!(outcome.applications[0].number, 1);
        assert!(outcome.applications[0].settled);
        assert_eq!(plan.next_open_installment().map(|i| i.number), Some(2));
    }

    #[test]
    fn test_overdue_installment_receives_payment() {
        let mut plan = plan();
        plan.installments[0].status = InstallmentStatus::Overdue;
        let allocator = PaymentAllocator::new(AllocationStrategy::SingleInstallment);

        allocator.allocate(&mut plan, Money::from_major(4_167), now()).unwrap();
        assert_eq!(plan.installment(1).unwrap().status, InstallmentStatus::Paid);
    }

    #[test]
    fn test_cascade_rolls_excess_forward() {
        let mut plan = plan();
        let allocator = PaymentAllocator::new(AllocationStrategy::Cascade);

        let outcome = allocator.allocate(&mut plan, Money::from_major(10_000), now()).unwrap();

        assert_eq!(outcome.applications.len(), 3);
        assert_eq!(outcome.settled_installments(), vec![1, 2]);
        assert!(outcome.unapplied.is_zero());
        assert_eq!(plan.installment(3).unwrap().amount_paid, Money::from_major(1_666));
        assert_eq!(plan.installment(3).unwrap().status, InstallmentStatus::Partial);
        assert_eq!(plan.emis_paid, 2);
    }

    #[test]
    fn test_cascade_beyond_plan_leaves_unapplied() {
        let mut plan = plan();
        let allocator = PaymentAllocator::new(AllocationStrategy::Cascade);

        let outcome = allocator.allocate(&mut plan, Money::from_major(60_000), now()).unwrap();
        assert_eq!(outcome.unapplied, Money::from_major(10_000));
        assert_eq!(plan.emis_remaining, 0);
        assert!(plan.next_open_installment().is_none());
    }

    #[test]
    fn test_fully_paid_plan_absorbs_nothing() {
        let mut plan = plan();
        let allocator = PaymentAllocator::new(AllocationStrategy::Cascade);
        allocator.allocate(&mut plan, Money::from_major(50_000), now()).unwrap();

        let outcome = allocator.allocate(&mut plan, Money::from_major(100), now()).unwrap();
        assert!(outcome.applications.is_empty());
        assert_eq!(outcome.unapplied, Money::from_major(100));
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let mut plan = plan();
        let allocator = PaymentAllocator::new(AllocationStrategy::SingleInstallment);
        let result = allocator.allocate(&mut plan, Money::ZERO, now());
        assert!(matches!(result, Err(PaymentError::InvalidPaymentAmount { .. })));
    }
}
