//! The session manager: one server-authenticated identity per client,
//! cached in durable local storage.
//!
//! Lifecycle is construct → [`initialize`](SessionManager::initialize) → use
//! → drop. A manager starts `Uninitialized`; `initialize` rehydrates any
//! persisted session exactly once and moves it to `Ready`, after which
//! login/signup/logout flip it between anonymous and authenticated.
//!
//! Login and signup suspend at the network boundary. Nothing serializes
//! concurrent calls: two racing logins both complete and the last writer
//! wins, in memory and in storage. Callers that abandon a pending attempt
//! simply ignore its result.

use crate::api::{IdentityApi, LoginRequest, SignupRequest};
use crate::audit::{AuditSink, LoginRecord, StorageAuditLog};
use crate::error::AuthError;
use crate::notify::{Notice, Notifier, TraceNotifier};
use crate::storage::{keys, Storage};
use crate::user::{
    normalize_identity, IdGenerator, Identity, ProfileDefaults, Role, User, UuidIds,
};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    Ready,
}

#[derive(Debug)]
struct SessionState {
    phase: Phase,
    user: Option<User>,
    token: Option<String>,
    loading: bool,
}

/// Client-side session cache over a remote identity service.
///
/// Collaborators are injected at construction; cloning a manager shares its
/// state, so an application hands clones to whatever needs identity queries.
#[derive(Clone)]
pub struct SessionManager {
    api: Arc<dyn IdentityApi>,
    store: Arc<dyn Storage>,
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn AuditSink>,
    ids: Arc<dyn IdGenerator>,
    state: Arc<Mutex<SessionState>>,
}

impl SessionManager {
    /// Build a manager over an identity service and a local store. The
    /// notification sink defaults to [`TraceNotifier`], the audit log to a
    /// [`StorageAuditLog`] over the same store, and ids to uuid v4.
    pub fn new(api: Arc<dyn IdentityApi>, store: Arc<dyn Storage>) -> Self {
        let audit = Arc::new(StorageAuditLog::new(store.clone()));
        Self {
            api,
            store,
            notifier: Arc::new(TraceNotifier),
            audit,
            ids: Arc::new(UuidIds),
            state: Arc::new(Mutex::new(SessionState {
                phase: Phase::Uninitialized,
                user: None,
                token: None,
                loading: false,
            })),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Rehydrate any persisted session and become `Ready`.
    ///
    /// A stored record that no longer parses is discarded (the entry is
    /// removed) and the session starts anonymous; storage read trouble
    /// degrades the same way. Never fails. Calling this again after it has
    /// completed is a no-op.
    pub fn initialize(&self) {
        {
            let mut state = self.state.lock().expect("session lock");
            if state.phase == Phase::Ready {
                return;
            }
            state.loading = true;
        }

        let user = self.rehydrate::<User>(keys::SESSION);
        let token = self.rehydrate::<String>(keys::TOKEN);

        let mut state = self.state.lock().expect("session lock");
        state.user = user;
        state.token = token;
        state.phase = Phase::Ready;
        state.loading = false;
        tracing::debug!(
            authenticated = state.user.is_some(),
            "session initialized"
        );
    }

    /// Read and parse one persisted value, removing it when corrupt.
    fn rehydrate<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "could not read persisted value");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                let err = AuthError::CorruptedState(e.to_string());
                tracing::warn!(key, %err, "discarding persisted value");
                if let Err(e) = self.store.remove(key) {
                    tracing::warn!(key, error = %e, "could not remove corrupted value");
                }
                None
            }
        }
    }

    /// Authenticate against the login endpoint.
    ///
    /// On success the response is normalized with login fallbacks (generated
    /// id, echoed email, local-part name, `user` role), replaces the current
    /// session, is persisted, and an audit record is appended; returns true.
    /// On any failure the prior session (in memory and in storage) is left
    /// untouched, an error notice is emitted, and the call returns false.
    pub async fn login(&self, email: &str, password: &str) -> bool {
        self.set_loading(true);
        let req = LoginRequest::new(email, password);
        let defaults = ProfileDefaults::for_login(email);

        let result = match self.api.login(&req).await {
            Ok(body) => normalize_identity(&body, &defaults, self.ids.as_ref()),
            Err(err) => Err(err),
        };

        let ok = match result {
            Ok(identity) => {
                self.commit(&identity);
                self.notifier.notify(&Notice::info(
                    "Logged in",
                    &format!("Welcome back, {}", identity.user.name),
                ));
                true
            }
            Err(err) => {
                self.notifier
                    .notify(&Notice::error("Login failed", &err.to_string()));
                false
            }
        };
        self.set_loading(false);
        ok
    }

    /// Register a new account, requesting `role`.
    ///
    /// Same contract as [`login`](Self::login), with signup fallbacks: a
    /// response missing the role yields the requested role, not `user`.
    pub async fn signup(&self, name: &str, email: &str, password: &str, role: Role) -> bool {
        self.set_loading(true);
        let req = SignupRequest::new(name, email, password, role);
        let defaults = ProfileDefaults::for_signup(name, email, role);

        let result = match self.api.signup(&req).await {
            Ok(body) => normalize_identity(&body, &defaults, self.ids.as_ref()),
            Err(err) => Err(err),
        };

        let ok = match result {
            Ok(identity) => {
                self.commit(&identity);
                self.notifier.notify(&Notice::info(
                    "Account created",
                    &format!("Welcome, {}", identity.user.name),
                ));
                true
            }
            Err(err) => {
                self.notifier
                    .notify(&Notice::error("Signup failed", &err.to_string()));
                false
            }
        };
        self.set_loading(false);
        ok
    }

    /// Make `identity` the current session: persist it, swap it into memory,
    /// and append an audit record. Storage trouble is logged, never fatal.
    fn commit(&self, identity: &Identity) {
        match serde_json::to_string(&identity.user) {
            Ok(json) => {
                if let Err(e) = self.store.put(keys::SESSION, &json) {
                    tracing::warn!(error = %e, "could not persist session record");
                }
            }
            Err(e) => tracing::warn!(error = %e, "could not serialize session record"),
        }

        // The token key mirrors the live session: absent when none was issued.
        let token_result = match &identity.token {
            Some(token) => serde_json::to_string(token)
                .map_err(anyhow::Error::from)
                .and_then(|json| self.store.put(keys::TOKEN, &json)),
            None => self.store.remove(keys::TOKEN),
        };
        if let Err(e) = token_result {
            tracing::warn!(error = %e, "could not persist auth token");
        }

        {
            let mut state = self.state.lock().expect("session lock");
            state.user = Some(identity.user.clone());
            state.token = identity.token.clone();
        }

        let record = LoginRecord::now(&identity.user.id, &identity.user.email);
        if let Err(e) = self.audit.append(&record) {
            tracing::warn!(error = %e, "could not append login audit record");
        }
    }

    /// Clear the session and remove the persisted records. No server call;
    /// idempotent; never fails.
    pub fn logout(&self) {
        {
            let mut state = self.state.lock().expect("session lock");
            state.user = None;
            state.token = None;
        }
        for key in [keys::SESSION, keys::TOKEN] {
            if let Err(e) = self.store.remove(key) {
                tracing::warn!(key, error = %e, "could not remove persisted value");
            }
        }
        self.notifier
            .notify(&Notice::info("Logged out", "Your session has ended"));
    }

    /// The current user, if authenticated.
    ///
    /// # Panics
    /// Querying a manager that has not completed [`initialize`](Self::initialize)
    /// is a programming error and panics.
    pub fn current_user(&self) -> Option<User> {
        let state = self.state.lock().expect("session lock");
        assert_eq!(
            state.phase,
            Phase::Ready,
            "SessionManager queried before initialize()"
        );
        state.user.clone()
    }

    /// True iff the current session's role is `admin`. False when anonymous.
    ///
    /// # Panics
    /// Like [`current_user`](Self::current_user), panics before `initialize`.
    pub fn is_admin(&self) -> bool {
        self.current_user().map_or(false, |u| u.is_admin())
    }

    /// The opaque token issued with the current session, if any.
    ///
    /// # Panics
    /// Like [`current_user`](Self::current_user), panics before `initialize`.
    pub fn auth_token(&self) -> Option<String> {
        let state = self.state.lock().expect("session lock");
        assert_eq!(
            state.phase,
            Phase::Ready,
            "SessionManager queried before initialize()"
        );
        state.token.clone()
    }

    /// True once `initialize` has completed.
    pub fn is_ready(&self) -> bool {
        self.state.lock().expect("session lock").phase == Phase::Ready
    }

    /// True while `initialize` or an in-flight login/signup is running.
    /// State read while this is true is not authoritative.
    pub fn is_loading(&self) -> bool {
        self.state.lock().expect("session lock").loading
    }

    fn set_loading(&self, loading: bool) {
        self.state.lock().expect("session lock").loading = loading;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Severity;
    use crate::storage::MemoryStorage;
    use crate::test_utils::{FixedIds, MockIdentityApi, RecordingAudit, RecordingNotifier};
    use serde_json::json;

    struct Harness {
        manager: SessionManager,
        api: Arc<MockIdentityApi>,
        store: Arc<MemoryStorage>,
        notifier: Arc<RecordingNotifier>,
        audit: Arc<RecordingAudit>,
    }

    fn harness(results: Vec<Result<serde_json::Value, AuthError>>) -> Harness {
        let api = Arc::new(MockIdentityApi::new(results));
        let store = Arc::new(MemoryStorage::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let audit = Arc::new(RecordingAudit::new());
        let manager = SessionManager::new(api.clone(), store.clone())
            .with_notifier(notifier.clone())
            .with_audit(audit.clone())
            .with_ids(Arc::new(FixedIds::new("generated-id")));
        manager.initialize();
        Harness {
            manager,
            api,
            store,
            notifier,
            audit,
        }
    }

    fn admin_login_body() -> serde_json::Value {
        json!({
            "user": {"id": "u1", "email": "a@b.com", "name": "A", "role": "admin"},
            "token": "t1"
        })
    }

    #[tokio::test]
    async fn test_login_success_replaces_session() {
        let h = harness(vec![Ok(admin_login_body())]);

        assert!(h.manager.login("a@b.com", "x").await);

        let user = h.manager.current_user().unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.email, "a@b.com");
        assert_eq!(user.name, "A");
        assert_eq!(user.role, Role::Admin);
        assert!(h.manager.is_admin());
        assert_eq!(h.manager.auth_token().as_deref(), Some("t1"));

        // Persisted too.
        assert_eq!(
            h.store.get(keys::TOKEN).unwrap().as_deref(),
            Some("\"t1\"")
        );
        let stored: User =
            serde_json::from_str(&h.store.get(keys::SESSION).unwrap().unwrap()).unwrap();
        assert_eq!(stored, user);

        assert_eq!(h.api.calls(), vec!["login:a@b.com"]);
    }

    #[tokio::test]
    async fn test_login_success_emits_audit_and_notice() {
        let h = harness(vec![Ok(admin_login_body())]);
        h.manager.login("a@b.com", "x").await;

        let records = h.audit.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user_id, "u1");
        assert_eq!(records[0].email, "a@b.com");

        let notices = h.notifier.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].severity, Severity::Info);
    }

    #[tokio::test]
    async fn test_login_applies_fallback_defaults() {
        let h = harness(vec![Ok(json!({}))]);

        assert!(h.manager.login("a@b.com", "x").await);
        let user = h.manager.current_user().unwrap();
        assert_eq!(user.id, "generated-id");
        assert_eq!(user.email, "a@b.com");
        assert_eq!(user.name, "a");
        assert_eq!(user.role, Role::User);
        assert!(!h.manager.is_admin());
    }

    #[tokio::test]
    async fn test_rejected_login_leaves_prior_session_untouched() {
        let h = harness(vec![
            Ok(admin_login_body()),
            Err(AuthError::InvalidCredentials("bad password".to_string())),
        ]);
        h.manager.login("a@b.com", "x").await;
        let before = h.manager.current_user().unwrap();

        assert!(!h.manager.login("a@b.com", "wrong").await);

        assert_eq!(h.manager.current_user().unwrap(), before);
        assert_eq!(h.manager.auth_token().as_deref(), Some("t1"));
        assert!(h.store.get(keys::SESSION).unwrap().is_some());

        let notices = h.notifier.notices();
        assert_eq!(notices.last().unwrap().severity, Severity::Error);
        assert_eq!(notices.last().unwrap().description, "bad password");
        // Only the first, successful login was audited.
        assert_eq!(h.audit.records().len(), 1);
    }

    #[tokio::test]
    async fn test_connectivity_failure_reports_distinct_message() {
        let h = harness(vec![Err(AuthError::Connectivity(
            "connection refused".to_string(),
        ))]);

        assert!(!h.manager.login("a@b.com", "x").await);
        assert!(h.manager.current_user().is_none());
        let notice = h.notifier.notices().pop().unwrap();
        assert!(notice.description.contains("could not reach"));
    }

    #[tokio::test]
    async fn test_malformed_response_is_a_failure() {
        let h = harness(vec![Err(AuthError::MalformedResponse(
            "response body is not valid JSON".to_string(),
        ))]);

        assert!(!h.manager.login("a@b.com", "x").await);
        assert!(h.manager.current_user().is_none());
        assert!(h.store.get(keys::SESSION).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_signup_missing_role_falls_back_to_requested() {
        let h = harness(vec![Ok(json!({"id": "u2"}))]);

        assert!(h.manager.signup("Jo", "j@x.com", "p", Role::Admin).await);
        let user = h.manager.current_user().unwrap();
        assert_eq!(user.id, "u2");
        assert_eq!(user.email, "j@x.com");
        assert_eq!(user.name, "Jo");
        assert_eq!(user.role, Role::Admin);
        assert_eq!(h.api.calls(), vec!["signup:j@x.com"]);
    }

    #[tokio::test]
    async fn test_login_without_token_removes_stale_token() {
        let h = harness(vec![Ok(admin_login_body()), Ok(json!({"id": "u3"}))]);
        h.manager.login("a@b.com", "x").await;
        assert!(h.store.get(keys::TOKEN).unwrap().is_some());

        h.manager.login("a@b.com", "x").await;
        assert!(h.manager.auth_token().is_none());
        assert!(h.store.get(keys::TOKEN).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_clears_state_and_storage() {
        let h = harness(vec![Ok(admin_login_body())]);
        h.manager.login("a@b.com", "x").await;

        h.manager.logout();
        assert!(h.manager.current_user().is_none());
        assert!(!h.manager.is_admin());
        assert!(h.manager.auth_token().is_none());
        assert!(h.store.get(keys::SESSION).unwrap().is_none());
        assert!(h.store.get(keys::TOKEN).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_when_anonymous_is_idempotent() {
        let h = harness(vec![]);
        h.manager.logout();
        h.manager.logout();
        assert!(h.manager.current_user().is_none());
        assert!(h.store.get(keys::SESSION).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_initialize_round_trips_persisted_session() {
        let h = harness(vec![Ok(admin_login_body())]);
        h.manager.login("a@b.com", "x").await;
        let original = h.manager.current_user().unwrap();

        // A fresh manager over the same store picks the session back up.
        let reborn = SessionManager::new(h.api.clone(), h.store.clone());
        reborn.initialize();
        assert_eq!(reborn.current_user().unwrap(), original);
        assert_eq!(reborn.auth_token().as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn test_initialize_discards_corrupt_session_record() {
        let store = Arc::new(MemoryStorage::new());
        store.put(keys::SESSION, "definitely not json").unwrap();
        let manager =
            SessionManager::new(Arc::new(MockIdentityApi::new(vec![])), store.clone());

        manager.initialize();
        assert!(manager.current_user().is_none());
        // The bad entry is gone.
        assert!(store.get(keys::SESSION).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_initialize_discards_corrupt_token() {
        let store = Arc::new(MemoryStorage::new());
        store
            .put(
                keys::SESSION,
                &serde_json::to_string(&User {
                    id: "u1".to_string(),
                    email: "a@b.com".to_string(),
                    name: "A".to_string(),
                    role: Role::User,
                })
                .unwrap(),
            )
            .unwrap();
        store.put(keys::TOKEN, "{broken").unwrap();
        let manager =
            SessionManager::new(Arc::new(MockIdentityApi::new(vec![])), store.clone());

        manager.initialize();
        // The user survives; only the bad token entry is discarded.
        assert!(manager.current_user().is_some());
        assert!(manager.auth_token().is_none());
        assert!(store.get(keys::TOKEN).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_initialize_is_terminal_and_repeatable() {
        let h = harness(vec![Ok(admin_login_body())]);
        h.manager.login("a@b.com", "x").await;

        // Re-running initialize after Ready must not clobber live state.
        h.manager.initialize();
        assert!(h.manager.current_user().is_some());
        assert!(h.manager.is_ready());
    }

    #[tokio::test]
    async fn test_loading_flag_settles_after_calls() {
        let h = harness(vec![Ok(admin_login_body())]);
        assert!(!h.manager.is_loading());
        h.manager.login("a@b.com", "x").await;
        assert!(!h.manager.is_loading());
    }

    #[test]
    #[should_panic(expected = "queried before initialize")]
    fn test_query_before_initialize_panics() {
        let manager = SessionManager::new(
            Arc::new(MockIdentityApi::new(vec![])),
            Arc::new(MemoryStorage::new()),
        );
        let _ = manager.current_user();
    }

    #[test]
    fn test_clones_share_state() {
        let manager = SessionManager::new(
            Arc::new(MockIdentityApi::new(vec![])),
            Arc::new(MemoryStorage::new()),
        );
        let clone = manager.clone();
        manager.initialize();
        assert!(clone.is_ready());
    }
}
