//! User identity model and normalization of identity-service responses.
//!
//! The identity service is loosely typed: the profile may arrive nested under
//! a `user` key or flattened at the top level, and any field may be missing.
//! [`normalize_identity`] turns any 2xx body into a well-formed [`User`] (or a
//! `MalformedResponse` error) using a fixed, ordered fallback chain.

use crate::error::AuthError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role attached to a user record.
///
/// The service speaks lowercase strings; anything it sends that is not a
/// recognized role normalizes to the caller-supplied fallback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    /// Parse a role string as the service sends it. Returns `None` for
    /// anything other than the two known values.
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

/// A user record as cached by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A normalized successful authentication: the user plus an optional
/// opaque token issued by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: User,
    pub token: Option<String>,
}

/// Source of fallback ids for responses that omit one.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Default id generator backed by uuid v4.
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Submitted-credential context that normalization falls back to when the
/// response omits a field. Login and signup differ only here: signup knows
/// the name and role the caller asked for, login does not.
#[derive(Debug, Clone)]
pub struct ProfileDefaults {
    email: String,
    name: Option<String>,
    role: Option<Role>,
}

impl ProfileDefaults {
    /// Defaults for a login attempt: only the submitted email is known.
    pub fn for_login(email: &str) -> Self {
        Self {
            email: email.to_string(),
            name: None,
            role: None,
        }
    }

    /// Defaults for a signup attempt: the submitted name and requested role
    /// take precedence over the login-style derivations.
    pub fn for_signup(name: &str, email: &str, role: Role) -> Self {
        Self {
            email: email.to_string(),
            name: Some(name.to_string()),
            role: Some(role),
        }
    }
}

/// Normalize a 2xx identity-service body into an [`Identity`].
///
/// Ordered steps, no silent coercion:
/// 1. the body must be a JSON object;
/// 2. the profile is `body.user` when that is an object, else the body itself;
/// 3. `id`: profile string (a numeric id is rendered as its decimal string),
///    else a freshly generated id;
/// 4. `email`: profile string, else the submitted email;
/// 5. `name`: profile string, else the submitted name, else the local part of
///    the resolved email (the whole email when it contains no `@`);
/// 6. `role`: profile string parsed as a [`Role`], else the requested role,
///    else [`Role::User`];
/// 7. `token`: optional top-level string.
pub fn normalize_identity(
    body: &Value,
    defaults: &ProfileDefaults,
    ids: &dyn IdGenerator,
) -> Result<Identity, AuthError> {
    if !body.is_object() {
        return Err(AuthError::MalformedResponse(
            "expected a JSON object".to_string(),
        ));
    }

    let profile = match body.get("user") {
        Some(user) if user.is_object() => user,
        _ => body,
    };

    let id = match profile.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => ids.generate(),
    };

    let email = profile
        .get("email")
        .and_then(|e| e.as_str())
        .unwrap_or(&defaults.email)
        .to_string();

    let name = match profile.get("name").and_then(|n| n.as_str()) {
        Some(name) => name.to_string(),
        None => match &defaults.name {
            Some(name) => name.clone(),
            None => local_part(&email).to_string(),
        },
    };

    let role = profile
        .get("role")
        .and_then(|r| r.as_str())
        .and_then(Role::parse)
        .or(defaults.role)
        .unwrap_or_default();

    let token = body
        .get("token")
        .and_then(|t| t.as_str())
        .map(str::to_string);

    Ok(Identity {
        user: User {
            id,
            email,
            name,
            role,
        },
        token,
    })
}

/// Substring before the first `@`, or the whole string when there is none.
fn local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}
