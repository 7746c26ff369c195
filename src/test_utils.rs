//! Shared test doubles for the session collaborators.

use crate::api::{IdentityApi, LoginRequest, SignupRequest};
use crate::audit::{AuditSink, LoginRecord};
use crate::error::AuthError;
use crate::notify::{Notice, Notifier};
use crate::user::IdGenerator;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

/// Identity service double: a scripted queue of results, shared by login and
/// signup, plus a record of the calls that consumed them.
pub struct MockIdentityApi {
    results: Mutex<Vec<Result<Value, AuthError>>>,
    calls: Mutex<Vec<String>>,
}

impl MockIdentityApi {
    pub fn new(results: Vec<Result<Value, AuthError>>) -> Self {
        Self {
            results: Mutex::new(results),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Calls made so far, as `"login:<email>"` / `"signup:<email>"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn next(&self, call: String) -> Result<Value, AuthError> {
        self.calls.lock().expect("calls lock").push(call);
        let mut results = self.results.lock().expect("results lock");
        if results.is_empty() {
            return Err(AuthError::Connectivity("mock exhausted".to_string()));
        }
        results.remove(0)
    }
}

#[async_trait]
impl IdentityApi for MockIdentityApi {
    async fn login(&self, req: &LoginRequest) -> Result<Value, AuthError> {
        self.next(format!("login:{}", req.email))
    }

    async fn signup(&self, req: &SignupRequest) -> Result<Value, AuthError> {
        self.next(format!("signup:{}", req.email))
    }
}

/// Notification sink that keeps every notice for inspection.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("notices lock").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: &Notice) {
        self.notices
            .lock()
            .expect("notices lock")
            .push(notice.clone());
    }
}

/// Audit sink that keeps appended records in memory.
#[derive(Default)]
pub struct RecordingAudit {
    records: Mutex<Vec<LoginRecord>>,
}

impl RecordingAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LoginRecord> {
        self.records.lock().expect("records lock").clone()
    }
}

impl AuditSink for RecordingAudit {
    fn append(&self, record: &LoginRecord) -> Result<()> {
        self.records
            .lock()
            .expect("records lock")
            .push(record.clone());
        Ok(())
    }
}

/// Id generator that always returns the same id.
pub struct FixedIds {
    id: String,
}

impl FixedIds {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

impl IdGenerator for FixedIds {
    fn generate(&self) -> String {
        self.id.clone()
    }
}
