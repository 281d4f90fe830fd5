/// json state - config from toml and the serialized record view
use admission_fees::{
    AdmissionRequest, EmiOption, FeeStructure, InMemoryRecordStore, Money, PaymentConfig,
    PaymentMethod, PaymentRecordView, PaymentRequest, PaymentService, Program, SafeTimeProvider,
    TimeSource,
};
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;

const CONFIG: &str = r#"
allocation_strategy = "cascade"
late_fee_basis = "remaining_balance"

[late_fee]
rate = "0.75"
grace_period_days = 7
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = PaymentConfig::from_toml_str(CONFIG)?;

    let fees = FeeStructure::new(Money::from_major(24_000))
        .with_registration_fee(Money::from_major(1_000))
        .with_emi_option(EmiOption::new("emi-6", 6));
    let mut catalog = HashMap::new();
    catalog.insert("mba".to_string(), Program::new("mba", "MBA", Some(fees)));

    let service = PaymentService::new(InMemoryRecordStore::new(), catalog, config);
    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap(),
    ));

    let id = service
        .submit_admission(AdmissionRequest::new("stu-3003", "finance", "mba").with_emi_option("emi-6"), &time)?
        .ok_or("program has no fee structure")?
        .record
        .id();

    let outcome = service.record_payment(
        id,
        PaymentRequest::new(Money::from_major(6_500), PaymentMethod::NetBanking)
            .with_transaction_id("NB-00042")
            .with_description("first two installments"),
        &time,
    )?;

    println!("{}", PaymentRecordView::from_record(&outcome.record).to_json_pretty()?);

    Ok(())
}
