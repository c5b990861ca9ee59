//! Password reset for doorman.
//!
//! Reset requests are rate limited per account: a hard cap over the
//! account's history plus a linearly growing backoff (n requests mean
//! the next one must wait n minutes). The counter only resets when a
//! reset token is actually consumed, so the cap cannot be farmed by
//! waiting out the backoff.

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::identity;
use crate::auth::password::hash_password;
use crate::auth::token::{self, TokenKind};
use crate::auth::validation::{
    validate_password, validate_reset_email, validate_verify, ValidationError,
};
use crate::config::Config;
use crate::db::{Account, AccountRepository};
use crate::mail::{Mailer, TemplateKind};
use crate::{DoormanError, Result};

/// Reset requests beyond this count are refused outright.
pub const MAX_RESET_REQUESTS: i64 = 10;

/// Backoff seconds added per prior request.
pub const RESET_BACKOFF_SECS: i64 = 60;

/// Rate limiting outcomes for reset requests.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    /// The hard request cap was exceeded.
    #[error("too many reset requests")]
    TooMany,

    /// The linear backoff window has not elapsed yet.
    #[error("reset requested too soon")]
    TooSoon,
}

/// Request a password reset for the account under `email`.
///
/// Issues a `p` token, bumps the request counter, persists, then
/// dispatches the reset mail. Returns the address the mail went to.
pub async fn request_reset<M: Mailer>(
    repo: &AccountRepository<'_>,
    mailer: &M,
    email: &str,
    locale: &str,
) -> Result<String> {
    info!(email = %email, "Reset password request");

    let mut account = match validate_reset_email(repo, email).await {
        Ok(account) => account,
        Err(ValidationError::EmailNotRegistered) => {
            return Err(DoormanError::NotFound("account".to_string()))
        }
        Err(ValidationError::System) => {
            return Err(DoormanError::Store("reset email lookup failed".to_string()))
        }
        Err(_) => return Err(DoormanError::Validation(1)),
    };

    // resets only make sense for accounts with local login
    if !account.login.enabled {
        warn!(account = %account.info(), "Reset refused, local login not enabled");
        return Err(DoormanError::Disabled);
    }

    if account.reset.request_count > MAX_RESET_REQUESTS {
        warn!(account = %account.info(), "Reset refused, request cap hit");
        return Err(RateLimitError::TooMany.into());
    }
    let elapsed = Utc::now()
        .signed_duration_since(account.reset.created_at)
        .num_seconds();
    if elapsed < account.reset.request_count * RESET_BACKOFF_SECS {
        warn!(account = %account.info(), elapsed, "Reset refused, backoff not elapsed");
        return Err(RateLimitError::TooSoon.into());
    }

    token::mint(TokenKind::Reset, &mut account);
    account.reset.request_count += 1;
    repo.save(&mut account).await?;

    mailer
        .send(&account, TemplateKind::Reset, locale)
        .await
        .map_err(|e| {
            warn!(account = %account.info(), "Reset mail failed: {e}");
            DoormanError::from(e)
        })?;

    info!(account = %account.info(), "Reset mail sent");
    Ok(account.email)
}

/// New-password form, submitted against a validated reset token.
#[derive(Debug, Clone)]
pub struct SetPasswordRequest {
    pub username: String,
    pub password: String,
    pub verify: String,
}

/// Store a new password hash, consume the outstanding reset token and
/// reset the request counter. Attempts `late_enable` afterwards, so a
/// federated-only account that just gained credentials starts working.
pub async fn apply_password(
    repo: &AccountRepository<'_>,
    config: &Config,
    account: &mut Account,
    password: &str,
) -> Result<()> {
    let hash = hash_password(password, &config.password)?;
    account.password_hash = Some(hash);
    account.reset.auth_token = None;
    account.reset.request_count = 0;
    repo.save(account).await?;

    identity::late_enable(repo, account).await?;
    info!(account = %account.info(), "Password set");
    Ok(())
}

/// Handle the new-password submission of the reset flow.
pub async fn set_password(
    repo: &AccountRepository<'_>,
    config: &Config,
    request: SetPasswordRequest,
) -> Result<Account> {
    if request.password.is_empty() && request.verify.is_empty() {
        return Err(DoormanError::Validation(2));
    }

    let mut faults = 0;
    if validate_password(&request.password).is_err() {
        faults += 1;
    }
    if validate_verify(&request.password, &request.verify).is_err() {
        faults += 1;
    }
    if faults > 0 {
        return Err(DoormanError::Validation(faults));
    }

    let mut account = identity::resolve_local(repo, &request.username).await?;
    apply_password(repo, config, &mut account, &request.password).await?;
    Ok(account)
}
