//! Append-only audit log of successful logins.
//!
//! The log is an external collaborator: sesame appends a record per
//! successful login or signup and otherwise leaves it alone.

use crate::storage::{keys, Storage};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One successful authentication event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRecord {
    pub user_id: String,
    pub email: String,
    pub timestamp: DateTime<Utc>,
}

impl LoginRecord {
    pub fn now(user_id: &str, email: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            email: email.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Sink accepting audit records.
pub trait AuditSink: Send + Sync {
    fn append(&self, record: &LoginRecord) -> Result<()>;
}

/// Audit log kept as a JSON array under the `logins` storage key.
pub struct StorageAuditLog {
    store: Arc<dyn Storage>,
}

impl StorageAuditLog {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    /// All recorded logins, oldest first. A corrupt or missing log reads as
    /// empty.
    pub fn read_all(&self) -> Result<Vec<LoginRecord>> {
        let Some(raw) = self.store.get(keys::LOGINS)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(records) => Ok(records),
            Err(e) => {
                tracing::warn!(error = %e, "audit log is corrupt, treating as empty");
                Ok(Vec::new())
            }
        }
    }
}

impl AuditSink for StorageAuditLog {
    fn append(&self, record: &LoginRecord) -> Result<()> {
        let mut records = self.read_all()?;
        records.push(record.clone());
        self.store
            .put(keys::LOGINS, &serde_json::to_string(&records)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn log() -> (Arc<MemoryStorage>, StorageAuditLog) {
        let store = Arc::new(MemoryStorage::new());
        let log = StorageAuditLog::new(store.clone() as Arc<dyn Storage>);
        (store, log)
    }

    #[test]
    fn test_append_grows_the_array() {
        let (_, log) = log();
        log.append(&LoginRecord::now("u1", "a@b.com")).unwrap();
        log.append(&LoginRecord::now("u2", "c@d.com")).unwrap();

        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].user_id, "u1");
        assert_eq!(records[1].email, "c@d.com");
    }

    #[test]
    fn test_records_round_trip_timestamps() {
        let (_, log) = log();
        let record = LoginRecord::now("u1", "a@b.com");
        log.append(&record).unwrap();
        assert_eq!(log.read_all().unwrap()[0], record);
    }

    #[test]
    fn test_corrupt_log_reads_as_empty_and_is_replaced() {
        let (store, log) = log();
        store.put(keys::LOGINS, "not json").unwrap();

        assert!(log.read_all().unwrap().is_empty());
        log.append(&LoginRecord::now("u1", "a@b.com")).unwrap();
        assert_eq!(log.read_all().unwrap().len(), 1);
    }
}
