use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::errors::{PaymentError, Result};
use crate::record::PaymentRecord;
use crate::types::RecordId;

/// persistence for payment records, written back whole with a version check
pub trait PaymentRecordStore {
    /// store a new record at version 1; fails with `ActiveRecordExists` when an
    /// active record already holds the same payer/course/program triple
    fn insert(&self, record: PaymentRecord) -> Result<PaymentRecord>;

    fn get(&self, id: RecordId) -> Result<PaymentRecord>;

    /// the active record for a payer/course/program triple, if any
    fn find_active(&self, payer_id: &str, course_id: &str, program_id: &str) -> Result<Option<PaymentRecord>>;

    fn find_by_payer(&self, payer_id: &str) -> Result<Vec<PaymentRecord>>;

    /// compare-and-swap on `record.version()`; bumps the version on success
    fn update(&self, record: PaymentRecord) -> Result<PaymentRecord>;
}

/// in-process record store
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<RwLock<HashMap<RecordId, PaymentRecord>>>,
}

fn poisoned<T>(_: T) -> PaymentError {
    PaymentError::StoreUnavailable {
        message: "record store lock poisoned".to_string(),
    }
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PaymentRecordStore for InMemoryRecordStore {
    fn insert(&self, mut record: PaymentRecord) -> Result<PaymentRecord> {
        let mut records = self.records.write().map_err(poisoned)?;
        if record.is_active() {
            let existing = records.values().find(|r| {
                r.is_active()
                    && r.payer_id() == record.payer_id()
                    && r.course_id() == record.course_id()
                    && r.program_id() == record.program_id()
            });
            if let Some(existing) = existing {
                warn!(record_id = %existing.id(), payer_id = %record.payer_id(), "second active record rejected");
                return Err(PaymentError::ActiveRecordExists { id: existing.id() });
            }
        }

        record.set_version(1);
        records.insert(record.id(), record.clone());
        debug!(record_id = %record.id(), "record inserted");
        Ok(record)
    }

    fn get(&self, id: RecordId) -> Result<PaymentRecord> {
        let records = self.records.read().map_err(poisoned)?;
        records
            .get(&id)
            .cloned()
            .ok_or(PaymentError::RecordNotFound { id })
    }

    fn find_active(&self, payer_id: &str, course_id: &str, program_id: &str) -> Result<Option<PaymentRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records
            .values()
            .find(|r| {
                r.is_active()
                    && r.payer_id() == payer_id
                    && r.course_id() == course_id
                    && r.program_id() == program_id
            })
            .cloned())
    }

    fn find_by_payer(&self, payer_id: &str) -> Result<Vec<PaymentRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        let mut found: Vec<_> = records
            .values()
            .filter(|r| r.payer_id() == payer_id)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.created_at());
        Ok(found)
    }

    fn update(&self, mut record: PaymentRecord) -> Result<PaymentRecord> {
        let mut records = self.records.write().map_err(poisoned)?;
        let id = record.id();
        let stored = records.get(&id).ok_or(PaymentError::RecordNotFound { id })?;

        let expected = record.version();
        if stored.version() != expected {
            warn!(record_id = %id, expected, found = stored.version(), "stale record write rejected");
            return Err(PaymentError::VersionConflict {
                id,
                expected,
                found: stored.version(),
            });
        }

        record.set_version(expected + 1);
        records.insert(id, record.clone());
        debug!(record_id = %id, version = record.version(), "record updated");
        Ok(record)
    }
}
