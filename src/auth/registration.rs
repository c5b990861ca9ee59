//! User registration for doorman.
//!
//! The submit path validates every field but reports only an aggregate
//! fault count; whoever typed the form already saw per-field detail on
//! the live channel, and a hostile poster gets nothing to enumerate
//! accounts with.

use tracing::{info, warn};

use crate::auth::password::hash_password;
use crate::auth::token::{self, TokenKind};
use crate::auth::validation::{
    validate_email, validate_password, validate_username, validate_verify,
};
use crate::auth::identity;
use crate::captcha::CaptchaVerifier;
use crate::config::Config;
use crate::db::{Account, AccountRepository};
use crate::mail::{Mailer, TemplateKind};
use crate::{DoormanError, Result};

/// Registration form data.
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Password entered a second time.
    pub verify: String,
    /// CAPTCHA response token, when the surface demanded one.
    pub captcha_response: Option<String>,
}

impl RegistrationRequest {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        verify: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            verify: verify.into(),
            captcha_response: None,
        }
    }

    pub fn with_captcha_response(mut self, response: impl Into<String>) -> Self {
        self.captcha_response = Some(response.into());
        self
    }
}

/// Register a new account.
///
/// With email confirmation on, the account is created DISABLED with a
/// pre-issued registration token; it only becomes enabled when that
/// token is consumed. A failed confirmation dispatch leaves the account
/// disabled and surfaces a retriable error — no step of this flow can
/// leave a partially-registered account enabled.
pub async fn register<M: Mailer, C: CaptchaVerifier>(
    repo: &AccountRepository<'_>,
    mailer: &M,
    captcha: &C,
    config: &Config,
    request: RegistrationRequest,
    locale: &str,
) -> Result<Account> {
    info!(username = %request.username, email = %request.email, "Registration request");

    // all-blank short-circuit, before any store probe
    if request.username.is_empty()
        && request.email.is_empty()
        && request.password.is_empty()
        && request.verify.is_empty()
    {
        return Err(DoormanError::Validation(4));
    }

    let mut faults = 0;
    if validate_username(repo, &request.username, None).await.is_err() {
        faults += 1;
    }
    if validate_email(repo, &request.email, None).await.is_err() {
        faults += 1;
    }
    if validate_password(&request.password).is_err() {
        faults += 1;
    }
    if validate_verify(&request.password, &request.verify).is_err() {
        faults += 1;
    }
    if faults > 0 {
        warn!(faults, "Registration rejected, validation faults (hostile posting?)");
        return Err(DoormanError::Validation(faults));
    }

    if let Some(response) = &request.captcha_response {
        captcha.verify(response).await?;
    }

    let hash = hash_password(&request.password, &config.password)?;

    let confirm = config.registration.confirm_email;
    let mut account = Account::new(request.email.as_str())
        .with_username(request.username.as_str())
        .with_password_hash(hash);

    if confirm {
        token::mint(TokenKind::Registration, &mut account);
    } else {
        account.login.enabled = true;
    }

    repo.create(&account).await?;

    if confirm {
        mailer
            .send(&account, TemplateKind::Register, locale)
            .await
            .map_err(|e| {
                warn!(account = %account.info(), "Confirmation mail failed: {e}");
                DoormanError::from(e)
            })?;
        info!(account = %account.info(), "Registration passed, confirmation mail sent");
    } else {
        info!(account = %account.info(), "Registration passed, account enabled");
    }

    Ok(account)
}

/// Enable an account whose registration token was consumed, folding in
/// any federated placeholder with a matching email.
pub async fn activate(repo: &AccountRepository<'_>, account: &mut Account) -> Result<()> {
    identity::enable(repo, account).await?;
    info!(account = %account.info(), "Registration activated");
    Ok(())
}
