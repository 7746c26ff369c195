//! HTTP client for the remote identity service.
//!
//! All transport, status and body-shape classification happens at this
//! boundary: callers receive either the raw 2xx JSON body or an
//! [`AuthError`] that already says which kind of failure occurred.

use crate::error::{AuthError, GENERIC_REJECTION};
use crate::user::Role;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

const LOGIN_PATH: &str = "/api/auth/login";
const SIGNUP_PATH: &str = "/api/auth/signup";

/// Credentials for a login attempt. The password lives in a [`SecretString`]
/// and is only exposed while the outbound body is built; it is never
/// persisted or logged.
#[derive(Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: SecretString,
}

impl LoginRequest {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.to_string(),
            password: SecretString::from(password.to_string()),
        }
    }
}

/// Credentials for a registration attempt, including the requested role.
#[derive(Debug)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: SecretString,
    pub role: Role,
}

impl SignupRequest {
    pub fn new(name: &str, email: &str, password: &str, role: Role) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            password: SecretString::from(password.to_string()),
            role,
        }
    }
}

/// Seam to the identity service, mockable in tests.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    async fn login(&self, req: &LoginRequest) -> Result<Value, AuthError>;
    async fn signup(&self, req: &SignupRequest) -> Result<Value, AuthError>;
}

/// reqwest-backed client. No request timeout is configured; a caller that
/// wants to abandon a pending attempt ignores its eventual result.
pub struct HttpIdentityApi {
    base_url: String,
    http: reqwest::Client,
}

impl HttpIdentityApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// POST a JSON body and classify the outcome.
    ///
    /// Transport failure → `Connectivity`. Non-2xx → `InvalidCredentials`,
    /// carrying the server's `message` field when the error body has one.
    /// 2xx with a body that is not JSON → `MalformedResponse`.
    async fn post_json(&self, path: &str, body: Value) -> Result<Value, AuthError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(path, "posting to identity service");

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Connectivity(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| AuthError::Connectivity(e.to_string()))?;

        if status.is_success() {
            serde_json::from_str(&text).map_err(|_| {
                AuthError::MalformedResponse("response body is not valid JSON".to_string())
            })
        } else {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| Some(v.get("message")?.as_str()?.to_string()))
                .unwrap_or_else(|| GENERIC_REJECTION.to_string());
            tracing::debug!(status = status.as_u16(), "identity service rejected request");
            Err(AuthError::InvalidCredentials(message))
        }
    }
}

#[async_trait]
impl IdentityApi for HttpIdentityApi {
    async fn login(&self, req: &LoginRequest) -> Result<Value, AuthError> {
        let body = serde_json::json!({
            "email": req.email,
            "password": req.password.expose_secret(),
        });
        self.post_json(LOGIN_PATH, body).await
    }

    async fn signup(&self, req: &SignupRequest) -> Result<Value, AuthError> {
        let body = serde_json::json!({
            "name": req.name,
            "email": req.email,
            "password": req.password.expose_secret(),
            "role": req.role.as_str(),
        });
        self.post_json(SIGNUP_PATH, body).await
    }
}
