use thiserror::Error;

/// Errors surfaced by the account and phone-verification flows.
///
/// Validation variants are returned synchronously and never retried.
/// `Provider` wraps an external-service failure already reduced to a
/// human-readable message; the failing holder also publishes it through its
/// Error/Failed state.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("this phone number is already registered")]
    PhoneAlreadyRegistered,

    #[error("phone number must be in E.164 format, e.g. +71234567890")]
    InvalidPhoneFormat,

    #[error("no verification code has been requested")]
    NoActiveChallenge,

    #[error("user record not found in database")]
    ProfileNotFound,

    #[error("user record is malformed: {0}")]
    ProfileIncomplete(String),

    #[error("not signed in")]
    NotAuthenticated,

    #[error("{0}")]
    Provider(String),
}

impl AuthError {
    /// Reduce an external-service failure to its message.
    pub fn provider(err: impl std::fmt::Display) -> Self {
        AuthError::Provider(err.to_string())
    }
}
