use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LateFeeConfig;
use crate::decimal::Money;
use crate::payments::Installment;
use crate::types::{InstallmentStatus, LateFeeBasis};

/// late fee charged on one installment in a pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LateFeeCharge {
    pub number: u32,
    pub days_late: u32,
    /// amount the daily rate was applied to
    pub base: Money,
    pub fee: Money,
}

/// result of a late fee pass over a record's installments
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LateFeeAssessment {
    /// late fee charged across all installments by this pass
    pub total: Money,
    pub charges: Vec<LateFeeCharge>,
    /// installments that moved from pending to overdue in this pass
    pub newly_overdue: Vec<u32>,
}

/// computes per-day late fees for installments past their grace period
#[derive(Debug, Clone, Copy)]
pub struct LateFeeCalculator {
    pub config: LateFeeConfig,
    pub basis: LateFeeBasis,
}

impl LateFeeCalculator {
    pub fn new(config: LateFeeConfig, basis: LateFeeBasis) -> Self {
        Self { config, basis }
    }

    /// whole days between due date and `now`, zero when not yet due
    pub fn days_late(due_date: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
        if due_date >= now {
            return 0;
        }
        (now - due_date).num_days().max(0) as u32
    }

    /// fee for `base` outstanding `days_late` days; nothing inside the grace period
    pub fn calculate_fee(&self, base: Money, days_late: u32) -> Money {
        if days_late <= self.config.grace_period_days {
            return Money::ZERO;
        }

        let fee = base.as_decimal() * self.config.rate.as_percentage() * Decimal::from(days_late)
            / Decimal::ONE_HUNDRED;
        Money::from_decimal(fee)
    }

    /// late fee base for an installment, `None` when it does not accrue under the basis
    fn chargeable_base(&self, inst: &Installment) -> Option<Money> {
        match (self.basis, inst.status) {
            (_, InstallmentStatus::Pending | InstallmentStatus::Overdue) => Some(inst.amount),
            (LateFeeBasis::RemainingBalance, InstallmentStatus::Partial) => Some(inst.remaining()),
            _ => None,
        }
    }

    /// recompute late fees as of `now`.
    ///
    /// Unpaid installments past due are marked overdue. Fees are rebuilt from
    /// scratch: installments the pass does not charge carry no fee afterwards,
    /// so repeating a pass with the same `now` changes nothing.
    pub fn assess(&self, installments: &mut [Installment], now: DateTime<Utc>) -> LateFeeAssessment {
        let mut assessment = LateFeeAssessment::default();

        for inst in installments.iter_mut() {
            inst.late_fee = Money::ZERO;
            if inst.due_date >= now {
                continue;
            }

            if inst.status == InstallmentStatus::Pending {
                inst.status = InstallmentStatus::Overdue;
                assessment.newly_overdue.push(inst.number);
            }

            let Some(base) = self.chargeable_base(inst) else {
                continue;
            };

            let days_late = Self::days_late(inst.due_date, now);
            let fee = self.calculate_fee(base, days_late);
            inst.late_fee = fee;

            if fee.is_positive() {
                assessment.total += fee;
                assessment.charges.push(LateFeeCharge {
                    number: inst.number,
                    days_late,
                    base,
                    fee,
                });
            }
        }

        debug!(
            total = %assessment.total,
            charged = assessment.charges.len(),
            newly_overdue = assessment.newly_overdue.len(),
            "late fees assessed"
        );

        assessment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Rate;
    use chrono::{Duration, TimeZone};
    use hourglass_rs::{SafeTimeProvider, TimeSource};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 20, 12, 0, 0).unwrap()
    }

    fn standard() -> LateFeeCalculator {
        LateFeeCalculator::new(LateFeeConfig::default(), LateFeeBasis::PendingOnly)
    }

    #[test]
    fn test_ten_days_late_past_grace() {
        let mut installments = vec![Installment::new(1, now() - Duration::days(10), Money::from_major(4_167))];

        let assessment = standard().assess(&mut installments, now());

        assert_eq!(assessment.total, Money::from_str_exact("416.70").unwrap());
        assert_eq!(assessment.charges[0].days_late, 10);
        assert_eq!(installments[0].late_fee, Money::from_str_exact("416.70").unwrap());
        assert_eq!(installments[0].status, InstallmentStatus::Overdue);
        assert_eq!(assessment.newly_overdue, vec![1]);
    }

    #[test]
    fn test_within_grace_period() {
        let mut installments = vec![Installment::new(1, now() - Duration::days(5), Money::from_major(4_167))];

        let assessment = standard().assess(&mut installments, now());

        assert!(assessment.total.is_zero());
        assert!(assessment.charges.is_empty());
        // still overdue, just not charged yet
        assert_eq!(installments[0].status, InstallmentStatus::Overdue);
    }

    #[test]
    fn test_future_installment_untouched() {
        let mut installments = vec![Installment::new(1, now() + Duration::days(3), Money::from_major(1_000))];
        let assessment = standard().assess(&mut installments, now());
        assert!(assessment.total.is_zero());
        assert_eq!(installments[0].status, InstallmentStatus::Pending);
    }

    #[test]
    fn test_pass_is_idempotent() {
        let time = SafeTimeProvider::new(TimeSource::Test(now()));
        let mut installments = vec![
            Installment::new(1, now() - Duration::days(40), Money::from_major(1_000)),
            Installment::new(2, now() - Duration::days(10), Money::from_major(1_000)),
        ];

        let first = standard().assess(&mut installments, time.now());
        let second = standard().assess(&mut installments, time.now());

        assert_eq!(first.total, Money::from_major(500));
        assert_eq!(first.total, second.total);
        assert!(second.newly_overdue.is_empty());
    }

    #[test]
    fn test_fee_grows_with_time() {
        let time = SafeTimeProvider::new(TimeSource::Test(now()));
        let mut installments = vec![Installment::new(1, now() - Duration::days(10), Money::from_major(1_000))];

        let first = standard().assess(&mut installments, time.now());
        time.test_control().unwrap().advance(Duration::days(5));
        let later = standard().assess(&mut installments, time.now());

        assert_eq!(first.total, Money::from_major(100));
        assert_eq!(later.total, Money::from_major(150));
    }

    #[test]
    fn test_partial_skipped_under_pending_only() {
        let mut inst = Installment::new(1, now() - Duration::days(10), Money::from_major(1_000));
        inst.amount_paid = Money::from_major(400);
        inst.status = InstallmentStatus::Partial;
        let mut installments = vec![inst];

        let assessment = standard().assess(&mut installments, now());
        assert!(assessment.total.is_zero());
        assert_eq!(installments[0].status, InstallmentStatus::Partial);
    }

    #[test]
    fn test_partial_charged_on_remaining_balance() {
        let mut inst = Installment::new(1, now() - Duration::days(10), Money::from_major(1_000));
        inst.amount_paid = Money::from_major(400);
        inst.status = InstallmentStatus::Partial;
        let mut installments = vec![inst];

        let calculator = LateFeeCalculator::new(LateFeeConfig::default(), LateFeeBasis::RemainingBalance);
        let assessment = calculator.assess(&mut installments, now());

        assert_eq!(assessment.total, Money::from_major(60));
        assert_eq!(assessment.charges[0].base, Money::from_major(600));
    }

    #[test]
    fn test_settled_installment_fee_dropped() {
        let mut installments = vec![Installment::new(1, now() - Duration::days(10), Money::from_major(1_000))];
        let first = standard().assess(&mut installments, now());
        assert_eq!(first.total, Money::from_major(100));

        installments[0].amount_paid = Money::from_major(1_000);
        installments[0].status = InstallmentStatus::Paid;

        let assessment = standard().assess(&mut installments, now() + Duration::days(10));
        assert!(assessment.total.is_zero());
        assert!(assessment.charges.is_empty());
        assert!(installments[0].late_fee.is_zero());
    }

    #[test]
    fn test_partial_fee_dropped_under_pending_only() {
        let mut installments = vec![Installment::new(1, now() - Duration::days(10), Money::from_major(1_000))];
        standard().assess(&mut installments, now());

        installments[0].amount_paid = Money::from_major(400);
        installments[0].status = InstallmentStatus::Partial;

        let assessment = standard().assess(&mut installments, now());
        assert!(assessment.total.is_zero());
        assert!(installments[0].late_fee.is_zero());
        assert_eq!(installments[0].status, InstallmentStatus::Partial);
    }

    #[test]
    fn test_custom_rate() {
        let config = LateFeeConfig {
            rate: Rate::from_percentage(dec!(0.5)),
            grace_period_days: 15,
        };
        let calculator = LateFeeCalculator::new(config, LateFeeBasis::PendingOnly);

        assert!(calculator.calculate_fee(Money::from_major(4_167), 15).is_zero());
        assert_eq!(
            calculator.calculate_fee(Money::from_major(4_167), 16),
            Money::from_str_exact("333.36").unwrap()
        );
    }
}
