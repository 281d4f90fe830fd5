/// admission flow - fee resolution, coupon, emi plan and a first payment
use admission_fees::{
    AdmissionRequest, CouponCode, EmiOption, FeeStructure, InMemoryRecordStore, Money,
    PaymentConfig, PaymentMethod, PaymentRequest, PaymentService, Program, SafeTimeProvider,
    TimeSource,
};
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== admission flow ===\n");

    let fees = FeeStructure::new(Money::from_major(50_000))
        .with_registration_fee(Money::from_major(2_000))
        .with_processing_fee(Money::from_major(500))
        .with_emi_option(EmiOption::new("emi-12", 12))
        .with_coupon(CouponCode::percentage("SAVE10", dec!(10)));

    let mut catalog = HashMap::new();
    catalog.insert("btech".to_string(), Program::new("btech", "B.Tech", Some(fees)));

    let service = PaymentService::new(InMemoryRecordStore::new(), catalog, PaymentConfig::standard());
    let time = SafeTimeProvider::new(TimeSource::System);

    let outcome = service
        .submit_admission(
            AdmissionRequest::new("stu-1001", "cse", "btech")
                .with_coupon("save10")
                .with_emi_option("emi-12")
                .with_initial_payment(Money::from_major(5_000), PaymentMethod::Upi),
            &time,
        )?
        .ok_or("program has no fee structure")?;

    let record = outcome.record;
    println!("record {}", record.id());
    println!("gross fee:      {}", record.total_fee());
    println!("discount:       {}", record.total_discount());
    println!("paid up front:  {}", record.total_paid());
    println!("amount due:     {}", record.total_due());

    if let Some(plan) = record.emi_plan() {
        println!("\n{} installments of {}:", plan.installment_count, plan.installment_amount);
        for inst in &plan.installments {
            println!("  #{:<2} {}  {}", inst.number, inst.due_date.format("%Y-%m-%d"), inst.amount);
        }
    }

    let payment = service.record_payment(
        record.id(),
        PaymentRequest::new(Money::from_major(4_000), PaymentMethod::Card),
        &time,
    )?;

    println!("\npayment {} recorded", payment.receipt.transaction.transaction_id);
    println!("status:         {:?}", payment.record.status());
    println!("amount due:     {}", payment.record.total_due());
    println!("events emitted: {}", payment.events.len());

    Ok(())
}
