use hourglass_rs::SafeTimeProvider;
use tracing::{debug, info, warn};

use crate::config::PaymentConfig;
use crate::decimal::Money;
use crate::errors::{PaymentError, Result};
use crate::events::Event;
use crate::fees::{CouponEvaluator, FeeResolver, FeeStructure, Program, ProgramCatalog};
use crate::late_fee::LateFeeAssessment;
use crate::payments::{EmiPlan, PaymentRequest};
use crate::record::{PaymentReceipt, PaymentRecord};
use crate::store::PaymentRecordStore;
use crate::types::{PaymentMethod, RecordId};

/// admission submitted by a payer
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AdmissionRequest {
    pub payer_id: String,
    pub course_id: String,
    pub program_id: String,
    pub emi_option_id: Option<String>,
    pub coupon_code: Option<String>,
    pub initial_payment: Option<Money>,
    pub initial_payment_method: Option<PaymentMethod>,
}

impl AdmissionRequest {
    pub fn new(payer_id: &str, course_id: &str, program_id: &str) -> Self {
        Self {
            payer_id: payer_id.to_string(),
            course_id: course_id.to_string(),
            program_id: program_id.to_string(),
            ..Default::default()
        }
    }

    pub fn with_emi_option(mut self, option_id: &str) -> Self {
        self.emi_option_id = Some(option_id.to_string());
        self
    }

    pub fn with_coupon(mut self, code: &str) -> Self {
        self.coupon_code = Some(code.to_string());
        self
    }

    pub fn with_initial_payment(mut self, amount: Money, method: PaymentMethod) -> Self {
        self.initial_payment = Some(amount);
        self.initial_payment_method = Some(method);
        self
    }
}

/// result of an admission submission
#[derive(Debug, Clone)]
pub struct AdmissionOutcome {
    pub record: PaymentRecord,
    /// false when an active record already existed and was returned as is
    pub created: bool,
    pub coupon_rejection: Option<String>,
    pub events: Vec<Event>,
}

/// result of a payment submission
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    pub receipt: PaymentReceipt,
    pub record: PaymentRecord,
    pub events: Vec<Event>,
}

/// result of a late fee pass on one record
#[derive(Debug, Clone)]
pub struct LateFeeOutcome {
    pub assessment: LateFeeAssessment,
    pub record: PaymentRecord,
    pub events: Vec<Event>,
}

/// persisted record after any other mutation
#[derive(Debug, Clone)]
pub struct RecordUpdate {
    pub record: PaymentRecord,
    pub events: Vec<Event>,
}

/// entry point for admission fee and payment operations
pub struct PaymentService<S, C> {
    store: S,
    catalog: C,
    config: PaymentConfig,
}

impl<S: PaymentRecordStore, C: ProgramCatalog> PaymentService<S, C> {
    pub fn new(store: S, catalog: C, config: PaymentConfig) -> Self {
        Self {
            store,
            catalog,
            config,
        }
    }

    pub fn config(&self) -> &PaymentConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn program(&self, program_id: &str) -> Result<Program> {
        self.catalog
            .program(program_id)
            .ok_or_else(|| PaymentError::ProgramNotFound {
                program_id: program_id.to_string(),
            })
    }

    fn fee_structure(&self, program_id: &str) -> Result<FeeStructure> {
        self.program(program_id)?
            .fee_structure
            .ok_or_else(|| PaymentError::MissingFeeStructure {
                program_id: program_id.to_string(),
            })
    }

    /// open a payment record for an admission.
    ///
    /// Returns `Ok(None)` when the program has no fee structure, since the
    /// admission itself still goes ahead. An existing active record for the
    /// same payer, course and program is returned instead of a duplicate.
    pub fn submit_admission(
        &self,
        request: AdmissionRequest,
        time_provider: &SafeTimeProvider,
    ) -> Result<Option<AdmissionOutcome>> {
        let program = self.program(&request.program_id)?;
        let fees = match program.fee_structure {
            Some(fees) => fees,
            None => {
                warn!(
                    program_id = %request.program_id,
                    payer_id = %request.payer_id,
                    "program has no fee structure, admission continues without payment record"
                );
                return Ok(None);
            }
        };

        if let Some(existing) =
            self.store
                .find_active(&request.payer_id, &request.course_id, &request.program_id)?
        {
            return Ok(Some(Self::existing_admission(existing)));
        }

        let emi_option = match request.emi_option_id.as_deref() {
            Some(option_id) => Some(fees.emi_option(option_id).cloned().ok_or_else(|| {
                PaymentError::EmiOptionNotFound {
                    option_id: option_id.to_string(),
                }
            })?),
            None => None,
        };

        let initial = request.initial_payment.filter(|a| !a.is_zero());
        let initial_method = match (initial, request.initial_payment_method.clone()) {
            (Some(amount), Some(method)) if amount.is_positive() => Some((amount, method)),
            (Some(amount), None) if amount.is_positive() => return Err(PaymentError::MissingPaymentMethod),
            _ => None,
        };

        let resolution = FeeResolver::resolve(
            &request.program_id,
            Some(&fees),
            request.coupon_code.as_deref(),
            initial,
        )?;

        let mut record = PaymentRecord::new(
            &request.payer_id,
            &request.course_id,
            &request.program_id,
            &resolution,
            self.config.late_fee,
            time_provider,
        )?;

        if let Some(discount) = &resolution.discount {
            record.apply_coupon(discount, time_provider)?;
        }

        if let Some((amount, method)) = initial_method {
            record.record_initial_payment(amount, method, time_provider)?;
        }

        if let Some(option) = emi_option {
            if resolution.outstanding.is_positive() {
                let plan = EmiPlan::generate(resolution.outstanding, option.installments, record.created_at())?;
                record.set_emi_plan(plan, time_provider)?;
            } else {
                debug!(record_id = %record.id(), "nothing outstanding, emi plan skipped");
            }
        }

        let events = record.take_events();
        let record = match self.store.insert(record) {
            Ok(record) => record,
            // another admission for the same triple landed first
            Err(PaymentError::ActiveRecordExists { id }) => {
                return Ok(Some(Self::existing_admission(self.store.get(id)?)));
            }
            Err(e) => return Err(e),
        };

        info!(
            record_id = %record.id(),
            payer_id = %record.payer_id(),
            total_due = %record.total_due(),
            status = ?record.status(),
            "admission payment record stored"
        );

        Ok(Some(AdmissionOutcome {
            record,
            created: true,
            coupon_rejection: resolution.coupon_rejection,
            events,
        }))
    }

    /// record a payment against an existing record
    pub fn record_payment(
        &self,
        record_id: RecordId,
        request: PaymentRequest,
        time_provider: &SafeTimeProvider,
    ) -> Result<PaymentOutcome> {
        let mut record = self.store.get(record_id)?;
        let receipt = record.record_payment(request, self.config.allocation_strategy, time_provider)?;
        let events = record.take_events();
        let record = self.store.update(record)?;

        Ok(PaymentOutcome {
            receipt,
            record,
            events,
        })
    }

    /// apply a coupon to an existing record; unknown or inactive codes are errors here
    pub fn apply_coupon(
        &self,
        record_id: RecordId,
        code: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<RecordUpdate> {
        let mut record = self.store.get(record_id)?;
        let fees = self.fee_structure(record.program_id())?;
        let discount = CouponEvaluator::evaluate(code, &fees.coupons, record.total_fee())?;

        record.apply_coupon(&discount, time_provider)?;
        self.save(record)
    }

    /// set up an emi plan on a record created without one
    pub fn setup_emi_plan(
        &self,
        record_id: RecordId,
        option_id: &str,
        time_provider: &SafeTimeProvider,
    ) -> Result<RecordUpdate> {
        let mut record = self.store.get(record_id)?;
        let fees = self.fee_structure(record.program_id())?;
        let option = fees
            .emi_option(option_id)
            .ok_or_else(|| PaymentError::EmiOptionNotFound {
                option_id: option_id.to_string(),
            })?;

        record.setup_emi_plan(option.installments, time_provider)?;
        self.save(record)
    }

    /// run a late fee pass on one record
    pub fn assess_late_fees(
        &self,
        record_id: RecordId,
        time_provider: &SafeTimeProvider,
    ) -> Result<LateFeeOutcome> {
        let mut record = self.store.get(record_id)?;
        let assessment = record.assess_late_fees(self.config.late_fee_basis, time_provider)?;

        if assessment.total.is_positive() {
            info!(
                record_id = %record_id,
                total_late_fee = %assessment.total,
                charged = assessment.charges.len(),
                "late fees assessed"
            );
        }

        let RecordUpdate { record, events } = self.save(record)?;
        Ok(LateFeeOutcome {
            assessment,
            record,
            events,
        })
    }

    pub fn deactivate(&self, record_id: RecordId, time_provider: &SafeTimeProvider) -> Result<RecordUpdate> {
        let mut record = self.store.get(record_id)?;
        record.deactivate(time_provider)?;
        self.save(record)
    }

    pub fn record(&self, record_id: RecordId) -> Result<PaymentRecord> {
        self.store.get(record_id)
    }

    pub fn records_for_payer(&self, payer_id: &str) -> Result<Vec<PaymentRecord>> {
        self.store.find_by_payer(payer_id)
    }

    fn existing_admission(record: PaymentRecord) -> AdmissionOutcome {
        info!(record_id = %record.id(), payer_id = %record.payer_id(), "active payment record already exists");
        AdmissionOutcome {
            record,
            created: false,
            coupon_rejection: None,
            events: Vec::new(),
        }
    }

    fn save(&self, mut record: PaymentRecord) -> Result<RecordUpdate> {
        let events = record.take_events();
        let record = self.store.update(record)?;
        Ok(RecordUpdate { record, events })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fees::{CouponCode, EmiOption};
    use crate::store::InMemoryRecordStore;
    use crate::types::{InstallmentStatus, PaymentStatus};
    use chrono::{Duration, TimeZone, Utc};
    use hourglass_rs::TimeSource;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn catalog() -> HashMap<String, Program> {
        let fees = FeeStructure::new(Money::from_major(50_000))
            .with_registration_fee(Money::from_major(1_000))
            .with_processing_fee(Money::from_major(500))
            .with_emi_option(EmiOption::new("emi-3", 3))
            .with_emi_option(EmiOption::new("emi-12", 12))
            .with_coupon(CouponCode::percentage("SAVE10", dec!(10)))
            .with_coupon(CouponCode::fixed("FLAT1000", Money::from_major(1_000)));

        let mut catalog = HashMap::new();
        catalog.insert("btech".to_string(), Program::new("btech", "B.Tech", Some(fees)));
        catalog.insert("phd".to_string(), Program::new("phd", "Ph.D", None));
        catalog
    }

    fn service() -> PaymentService<InMemoryRecordStore, HashMap<String, Program>> {
        PaymentService::new(InMemoryRecordStore::new(), catalog(), PaymentConfig::standard())
    }

    fn time() -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn test_admission_with_coupon_and_plan() {
        let service = service();
        let time = time();

        let outcome = service
            .submit_admission(
                AdmissionRequest::new("payer-1", "cse", "btech")
                    .with_coupon("save10")
                    .with_emi_option("emi-3"),
                &time,
            )
            .unwrap()
            .unwrap();

        assert!(outcome.created);
        let record = outcome.record;
        assert_eq!(record.total_discount(), Money::from_major(5_000));
        assert_eq!(record.total_due(), Money::from_major(45_000));
        assert_eq!(record.version(), 1);

        let amounts: Vec<_> = record.emi_plan().unwrap().installments.iter().map(|i| i.amount).collect();
        assert_eq!(amounts, vec![Money::from_major(15_000); 3]);
        assert!(outcome.events.iter().any(|e| matches!(e, Event::EmiPlanCreated { .. })));
    }

    #[test]
    fn test_admission_with_initial_payment() {
        let service = service();
        let time = time();

        let record = service
            .submit_admission(
                AdmissionRequest::new("payer-1", "cse", "btech")
                    .with_emi_option("emi-3")
                    .with_initial_payment(Money::from_major(5_000), PaymentMethod::Upi),
                &time,
            )
            .unwrap()
            .unwrap()
            .record;

        assert_eq!(record.total_paid(), Money::from_major(5_000));
        assert_eq!(record.transactions().len(), 1);
        assert_eq!(record.status(), PaymentStatus::Partial);
        // the initial payment is not allocated to any installment
        let plan = record.emi_plan().unwrap();
        assert_eq!(plan.total_scheduled(), Money::from_major(45_000));
        assert!(plan.installments.iter().all(|i| i.status == InstallmentStatus::Pending));
    }

    #[test]
    fn test_initial_payment_requires_method() {
        let service = service();
        let mut request = AdmissionRequest::new("payer-1", "cse", "btech");
        request.initial_payment = Some(Money::from_major(5_000));

        let result = service.submit_admission(request, &time());
        assert!(matches!(result, Err(PaymentError::MissingPaymentMethod)));
    }

    #[test]
    fn test_unknown_coupon_does_not_block_admission() {
        let service = service();
        let outcome = service
            .submit_admission(AdmissionRequest::new("payer-1", "cse", "btech").with_coupon("BOGUS"), &time())
            .unwrap()
            .unwrap();

        assert!(outcome.coupon_rejection.is_some());
        assert_eq!(outcome.record.total_due(), Money::from_major(50_000));
    }

    #[test]
    fn test_program_without_fee_structure() {
        let service = service();
        let result = service
            .submit_admission(AdmissionRequest::new("payer-1", "research", "phd"), &time())
            .unwrap();
        assert!(result.is_none());
        assert!(service.store().is_empty());
    }

    #[test]
    fn test_unknown_program_and_option() {
        let service = service();
        let missing = service.submit_admission(AdmissionRequest::new("payer-1", "cse", "mba"), &time());
        assert!(matches!(missing, Err(PaymentError::ProgramNotFound { .. })));

        let bad_option = service.submit_admission(
            AdmissionRequest::new("payer-1", "cse", "btech").with_emi_option("emi-7"),
            &time(),
        );
        assert!(matches!(bad_option, Err(PaymentError::EmiOptionNotFound { .. })));
    }

    #[test]
    fn test_existing_active_record_returned() {
        let service = service();
        let time = time();
        let first = service
            .submit_admission(AdmissionRequest::new("payer-1", "cse", "btech"), &time)
            .unwrap()
            .unwrap();
        let second = service
            .submit_admission(AdmissionRequest::new("payer-1", "cse", "btech").with_coupon("SAVE10"), &time)
            .unwrap()
            .unwrap();

        assert!(!second.created);
        assert_eq!(first.record.id(), second.record.id());
        assert_eq!(service.store().len(), 1);

        // a deactivated record no longer blocks a fresh one
        service.deactivate(first.record.id(), &time).unwrap();
        let third = service
            .submit_admission(AdmissionRequest::new("payer-1", "cse", "btech"), &time)
            .unwrap()
            .unwrap();
        assert!(third.created);
        assert_eq!(service.records_for_payer("payer-1").unwrap().len(), 2);
    }

    #[test]
    fn test_payment_and_late_fee_flow() {
        let service = service();
        let time = time();
        let id = service
            .submit_admission(AdmissionRequest::new("payer-1", "cse", "btech").with_emi_option("emi-12"), &time)
            .unwrap()
            .unwrap()
            .record
            .id();

        let outcome = service
            .record_payment(id, PaymentRequest::new(Money::from_major(5_000), PaymentMethod::Card), &time)
            .unwrap();
        assert_eq!(outcome.record.version(), 2);
        assert_eq!(outcome.receipt.allocation.unwrap().unapplied, Money::from_major(833));

        // installment 2 falls due 2024-03-15; ten days later
        time.test_control().unwrap().advance(Duration::days(70));
        let late = service.assess_late_fees(id, &time).unwrap();
        assert_eq!(late.assessment.total, Money::from_str_exact("416.70").unwrap());
        assert_eq!(late.record.status(), PaymentStatus::Overdue);
        assert_eq!(
            late.record.total_due(),
            Money::from_major(45_000) + Money::from_str_exact("416.70").unwrap()
        );
    }

    #[test]
    fn test_apply_coupon_later() {
        let service = service();
        let time = time();
        let id = service
            .submit_admission(AdmissionRequest::new("payer-1", "cse", "btech"), &time)
            .unwrap()
            .unwrap()
            .record
            .id();

        let update = service.apply_coupon(id, "flat1000", &time).unwrap();
        assert_eq!(update.record.total_due(), Money::from_major(49_000));

        let again = service.apply_coupon(id, "FLAT1000", &time);
        assert!(matches!(again, Err(PaymentError::CouponAlreadyApplied { .. })));

        let unknown = service.apply_coupon(id, "NOPE", &time);
        assert!(matches!(unknown, Err(PaymentError::CouponNotFound { .. })));
    }

    #[test]
    fn test_coupon_after_plan_rejected() {
        let service = service();
        let time = time();
        let id = service
            .submit_admission(AdmissionRequest::new("payer-1", "cse", "btech").with_emi_option("emi-3"), &time)
            .unwrap()
            .unwrap()
            .record
            .id();

        let result = service.apply_coupon(id, "SAVE10", &time);
        assert!(matches!(result, Err(PaymentError::EmiPlanAlreadyExists { .. })));

        let record = service.record(id).unwrap();
        assert!(record.coupon_usages().is_empty());
        assert_eq!(record.total_due(), record.emi_plan().unwrap().total_scheduled());
        assert_eq!(record.version(), 1);
    }

    /// misses every lookup, as a concurrent admission would before the insert
    #[derive(Default)]
    struct BlindLookupStore(InMemoryRecordStore);

    impl PaymentRecordStore for BlindLookupStore {
        fn insert(&self, record: PaymentRecord) -> Result<PaymentRecord> {
            self.0.insert(record)
        }

        fn get(&self, id: RecordId) -> Result<PaymentRecord> {
            self.0.get(id)
        }

        fn find_active(&self, _: &str, _: &str, _: &str) -> Result<Option<PaymentRecord>> {
            Ok(None)
        }

        fn find_by_payer(&self, payer_id: &str) -> Result<Vec<PaymentRecord>> {
            self.0.find_by_payer(payer_id)
        }

        fn update(&self, record: PaymentRecord) -> Result<PaymentRecord> {
            self.0.update(record)
        }
    }

    #[test]
    fn test_losing_insert_returns_stored_record() {
        let service = PaymentService::new(BlindLookupStore::default(), catalog(), PaymentConfig::standard());
        let time = time();

        let first = service
            .submit_admission(AdmissionRequest::new("payer-1", "cse", "btech"), &time)
            .unwrap()
            .unwrap();
        let second = service
            .submit_admission(AdmissionRequest::new("payer-1", "cse", "btech").with_emi_option("emi-3"), &time)
            .unwrap()
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(second.record.id(), first.record.id());
        assert!(second.record.emi_plan().is_none());
        assert_eq!(service.store().0.len(), 1);
    }

    #[test]
    fn test_setup_plan_after_admission() {
        let service = service();
        let time = time();
        let id = service
            .submit_admission(AdmissionRequest::new("payer-1", "cse", "btech"), &time)
            .unwrap()
            .unwrap()
            .record
            .id();

        let update = service.setup_emi_plan(id, "emi-3", &time).unwrap();
        let plan = update.record.emi_plan().unwrap();
        assert_eq!(plan.installment_count, 3);
        assert_eq!(plan.installment(3).unwrap().amount, Money::from_str_exact("16666").unwrap());
    }

    #[test]
    fn test_missing_record() {
        let service = service();
        let result = service.record_payment(
            uuid::Uuid::new_v4(),
            PaymentRequest::new(Money::from_major(100), PaymentMethod::Cash),
            &time(),
        );
        assert!(matches!(result, Err(PaymentError::RecordNotFound { .. })));
    }
}
