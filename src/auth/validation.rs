//! Field validation for doorman.
//!
//! These checks back two surfaces with different disclosure rules. The
//! live-typing channel calls them one field at a time and shows the
//! per-field detail carried in [`ValidationError`]. Submit paths call
//! the same checks but only COUNT faults, collapsing them into one
//! generic error so a hostile poster probing for account existence
//! learns nothing from the submit response.

use thiserror::Error;
use validator::ValidateEmail;

use crate::db::{Account, AccountRepository};

/// Minimum username length.
pub const MIN_USERNAME_LENGTH: usize = 6;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Field-level validation errors (live channel detail).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Field is required.
    #[error("this field is required")]
    Required,

    /// Username is too short.
    #[error("username must be at least {MIN_USERNAME_LENGTH} characters")]
    UsernameTooShort,

    /// Username contains invalid characters.
    #[error("username can only contain letters, digits and underscores")]
    UsernameInvalidChars,

    /// Username belongs to another account.
    #[error("username already taken")]
    UsernameTaken,

    /// Email format is invalid.
    #[error("invalid email address")]
    EmailInvalid,

    /// Email belongs to another account.
    #[error("email already registered")]
    EmailTaken,

    /// No account under this email (reset surface only).
    #[error("no account for this email")]
    EmailNotRegistered,

    /// Password is too short.
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    PasswordTooShort,

    /// Password and verification do not match.
    #[error("passwords do not match")]
    VerifyMismatch,

    /// Store probe failed while checking uniqueness.
    #[error("system error")]
    System,
}

/// Validate a (new) username: length, charset, uniqueness. When
/// `exclude_id` is given, a hit on that same account passes — used when
/// an existing account edits its own username.
pub async fn validate_username(
    repo: &AccountRepository<'_>,
    input: &str,
    exclude_id: Option<&str>,
) -> Result<(), ValidationError> {
    if input.is_empty() {
        return Err(ValidationError::Required);
    }
    if input.len() < MIN_USERNAME_LENGTH {
        return Err(ValidationError::UsernameTooShort);
    }
    if !input.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::UsernameInvalidChars);
    }

    match repo.username_taken(input, exclude_id).await {
        Ok(true) => Err(ValidationError::UsernameTaken),
        Ok(false) => Ok(()),
        Err(_) => Err(ValidationError::System),
    }
}

/// Validate a (new) email: format and uniqueness, with the same
/// self-exclusion rule as [`validate_username`].
pub async fn validate_email(
    repo: &AccountRepository<'_>,
    input: &str,
    exclude_id: Option<&str>,
) -> Result<(), ValidationError> {
    if input.is_empty() {
        return Err(ValidationError::Required);
    }
    if !input.validate_email() {
        return Err(ValidationError::EmailInvalid);
    }

    match repo.email_taken(input, exclude_id).await {
        Ok(true) => Err(ValidationError::EmailTaken),
        Ok(false) => Ok(()),
        Err(_) => Err(ValidationError::System),
    }
}

/// Validate a password.
pub fn validate_password(input: &str) -> Result<(), ValidationError> {
    if input.is_empty() {
        return Err(ValidationError::Required);
    }
    if input.len() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}

/// Validate the password verification field (passwords entered twice).
pub fn validate_verify(password: &str, verify: &str) -> Result<(), ValidationError> {
    if verify.is_empty() {
        return Err(ValidationError::Required);
    }
    if password != verify {
        return Err(ValidationError::VerifyMismatch);
    }
    Ok(())
}

/// Validate an email submitted for password reset. Unlike the
/// registration surface this one requires the account to EXIST and
/// returns it, since the reset flow needs the entity anyway.
pub async fn validate_reset_email(
    repo: &AccountRepository<'_>,
    input: &str,
) -> Result<Account, ValidationError> {
    if input.is_empty() {
        return Err(ValidationError::Required);
    }
    if !input.validate_email() {
        return Err(ValidationError::EmailInvalid);
    }

    match repo.find_by_username_or_email(input).await {
        Ok(Some(account)) => Ok(account),
        Ok(None) => Err(ValidationError::EmailNotRegistered),
        Err(_) => Err(ValidationError::System),
    }
}

/// Validate a contact form name.
pub fn validate_contact_name(input: &str) -> Result<(), ValidationError> {
    if input.is_empty() {
        return Err(ValidationError::Required);
    }
    Ok(())
}

/// Validate a contact form email (format only, no account lookup).
pub fn validate_contact_email(input: &str) -> Result<(), ValidationError> {
    if input.is_empty() {
        return Err(ValidationError::Required);
    }
    if !input.validate_email() {
        return Err(ValidationError::EmailInvalid);
    }
    Ok(())
}

/// Validate a contact form message body.
pub fn validate_contact_text(input: &str) -> Result<(), ValidationError> {
    if input.is_empty() {
        return Err(ValidationError::Required);
    }
    Ok(())
}
