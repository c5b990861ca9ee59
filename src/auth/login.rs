//! Login state machine for doorman.
//!
//! Two states per account, Enabled / Disabled. Disabled -> Enabled only
//! through activation or [`late_enable`]; Enabled -> Disabled only
//! through the failure lockout below. There is no automatic re-enable
//! after lockout — that requires an operator or a fresh activation flow.
//!
//! [`late_enable`]: crate::auth::identity::late_enable

use chrono::Utc;
use tracing::{info, warn};

use crate::auth::password::verify_password;
use crate::db::{Account, AccountRepository};
use crate::{DoormanError, Result};

/// Failed attempts beyond this count disable local login.
pub const MAX_LOGIN_FAULTS: i64 = 100;

/// Record a successful local login: refresh the success timestamp,
/// bump the counter, zero the fault state.
pub fn record_success(account: &mut Account) {
    account.login.last_success_at = Utc::now();
    account.login.success_count += 1;
    account.login.fault.last_fail_at = None;
    account.login.fault.fail_count = 0;
}

/// Record a failed local login. Crossing the fault threshold locks the
/// account out.
pub fn record_failure(account: &mut Account) {
    account.login.fault.last_fail_at = Some(Utc::now());
    account.login.fault.fail_count += 1;
    if account.login.fault.fail_count > MAX_LOGIN_FAULTS {
        account.login.enabled = false;
        warn!(account = %account.info(), "Fault threshold crossed, account locked out");
    }
}

/// Whether local login is allowed for this account.
pub fn is_login_allowed(account: &Account) -> bool {
    account.login.enabled
}

/// Authenticate a local credential pair and persist the outcome.
///
/// The fault write for a wrong password is persisted before the error is
/// returned, so the lockout counter survives the failed request.
pub async fn authenticate_local(
    repo: &AccountRepository<'_>,
    username: &str,
    password: &str,
) -> Result<Account> {
    let mut account = repo
        .find_by_username_or_email(username)
        .await?
        .ok_or_else(|| DoormanError::NotFound("account".to_string()))?;

    if !is_login_allowed(&account) {
        warn!(account = %account.info(), "Login rejected, account disabled");
        return Err(DoormanError::Disabled);
    }

    let stored_hash = account
        .password_hash
        .clone()
        .ok_or(DoormanError::InvalidCredentials)?;

    match verify_password(password, &stored_hash) {
        Ok(()) => {
            record_success(&mut account);
            repo.save(&mut account).await?;
            info!(account = %account.info(), "Login passed");
            Ok(account)
        }
        Err(_) => {
            record_failure(&mut account);
            repo.save(&mut account).await?;
            warn!(account = %account.info(), "Login failed, wrong password");
            Err(DoormanError::InvalidCredentials)
        }
    }
}
