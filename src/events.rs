use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{AllocationStrategy, InstallmentStatus, PaymentMethod, PaymentStatus, RecordId};

/// all events that can be emitted by a payment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // lifecycle events
    RecordCreated {
        record_id: RecordId,
        payer_id: String,
        program_id: String,
        total_fee: Money,
        total_due: Money,
        timestamp: DateTime<Utc>,
    },
    RecordDeactivated {
        record_id: RecordId,
        timestamp: DateTime<Utc>,
    },

    // fee events
    CouponApplied {
        record_id: RecordId,
        code: String,
        discount_amount: Money,
        timestamp: DateTime<Utc>,
    },
    EmiPlanCreated {
        record_id: RecordId,
        installment_count: u32,
        installment_amount: Money,
        first_due_date: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    // payment events
    PaymentReceived {
        record_id: RecordId,
        transaction_id: String,
        amount: Money,
        method: PaymentMethod,
        applied: Money,
        unapplied: Money,
        strategy: AllocationStrategy,
        timestamp: DateTime<Utc>,
    },
    InstallmentSettled {
        record_id: RecordId,
        installment_number: u32,
        amount_paid: Money,
        status: InstallmentStatus,
        timestamp: DateTime<Utc>,
    },

    // late fee events
    LateFeeAssessed {
        record_id: RecordId,
        total_late_fee: Money,
        overdue_installments: Vec<u32>,
        timestamp: DateTime<Utc>,
    },

    // status change events
    StatusChanged {
        record_id: RecordId,
        old_status: PaymentStatus,
        new_status: PaymentStatus,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Clone, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }
}
