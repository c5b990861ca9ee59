//! Error types for doorman.

use thiserror::Error;

use crate::auth::password::PasswordError;
use crate::auth::reset::RateLimitError;
use crate::auth::token::TokenError;
use crate::mail::MailError;

/// Common error type for doorman operations.
///
/// Validation faults are carried as a count, not a field list: submit
/// paths collapse to one generic message so a hostile poster learns
/// nothing about which field failed. Per-field detail is available only
/// through the live validation channel in [`crate::auth::validation`].
#[derive(Error, Debug)]
pub enum DoormanError {
    /// One or more submitted fields failed validation.
    #[error("validation failed ({0} fault(s))")]
    Validation(usize),

    /// Account or token owner does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Token mismatch, expiry, or unknown kind prefix.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// Password reset rate limit hit.
    #[error("rate limited: {0}")]
    RateLimited(#[from] RateLimitError),

    /// Wrong username/password combination.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Local login is not enabled for this account.
    #[error("account disabled")]
    Disabled,

    /// Password hashing or verification failed.
    #[error("password error: {0}")]
    Password(#[from] PasswordError),

    /// Opaque persistence failure. Logged in full, surfaced generically.
    #[error("store error: {0}")]
    Store(String),

    /// Outbound collaborator (mail dispatch, CAPTCHA endpoint) failed.
    #[error("external service error: {0}")]
    ExternalService(String),

    /// CAPTCHA verifier rejected the response token.
    #[error("captcha rejected")]
    CaptchaRejected,

    /// I/O error (message log, config file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for DoormanError {
    fn from(e: sqlx::Error) -> Self {
        DoormanError::Store(e.to_string())
    }
}

impl From<MailError> for DoormanError {
    fn from(e: MailError) -> Self {
        DoormanError::ExternalService(e.to_string())
    }
}

/// Result type alias for doorman operations.
pub type Result<T> = std::result::Result<T, DoormanError>;
