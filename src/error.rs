//! Error taxonomy for authentication and session rehydration.

use thiserror::Error;

/// Everything that can go wrong between the client and the identity service,
/// plus corruption found in the local cache.
///
/// All variants are handled inside [`SessionManager`](crate::SessionManager)
/// and surfaced to callers as a boolean outcome plus a notification; they do
/// not escape its public surface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The service rejected the credentials (any non-2xx status). Carries the
    /// server-supplied message when one was present.
    #[error("{0}")]
    InvalidCredentials(String),

    /// The service could not be reached, or the connection died mid-response.
    #[error("could not reach the identity service: {0}")]
    Connectivity(String),

    /// A 2xx response whose body was not usable as an identity.
    #[error("unusable response from the identity service: {0}")]
    MalformedResponse(String),

    /// A persisted record that no longer parses. Self-healed at initialize by
    /// discarding the record.
    #[error("corrupted local session state: {0}")]
    CorruptedState(String),
}

/// Fallback text when a rejection carries no server message.
pub const GENERIC_REJECTION: &str = "invalid credentials";
