/// late fees - controlled time, grace period and the two late fee bases
use admission_fees::{
    AdmissionRequest, EmiOption, FeeStructure, InMemoryRecordStore, LateFeeBasis, Money,
    PaymentConfig, PaymentMethod, PaymentRequest, PaymentService, Program, SafeTimeProvider,
    TimeSource,
};
use chrono::{Duration, TimeZone, Utc};
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;

fn catalog() -> HashMap<String, Program> {
    let fees = FeeStructure::new(Money::from_major(50_000)).with_emi_option(EmiOption::new("emi-12", 12));
    let mut catalog = HashMap::new();
    catalog.insert("btech".to_string(), Program::new("btech", "B.Tech", Some(fees)));
    catalog
}

fn run(label: &str, config: PaymentConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("--- {} ({:?}) ---", label, config.late_fee_basis);

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    ));
    let controller = time.test_control().unwrap();
    let service = PaymentService::new(InMemoryRecordStore::new(), catalog(), config);

    let id = service
        .submit_admission(AdmissionRequest::new("stu-2002", "ece", "btech").with_emi_option("emi-12"), &time)?
        .ok_or("program has no fee structure")?
        .record
        .id();

    // part-pay the first installment a few days before it falls due
    controller.advance(Duration::days(28));
    service.record_payment(id, PaymentRequest::new(Money::from_major(2_000), PaymentMethod::Cash), &time)?;

    // 5, 10 and 20 days past the first due date
    for step in [8, 5, 10] {
        controller.advance(Duration::days(step));
        let outcome = service.assess_late_fees(id, &time)?;
        println!(
            "{}  late fee {}  due {}  status {:?}",
            time.now().format("%Y-%m-%d"),
            outcome.assessment.total,
            outcome.record.total_due(),
            outcome.record.status()
        );
    }

    println!();
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("=== late fee example ===\n");

    run("standard", PaymentConfig::standard())?;

    let mut remaining = PaymentConfig::standard();
    remaining.late_fee_basis = LateFeeBasis::RemainingBalance;
    run("standard, remaining balance", remaining)?;

    run("lenient", PaymentConfig::lenient())?;

    Ok(())
}
