//! Profile and account mutation for doorman.
//!
//! Username and email edits go through uniqueness validation that
//! excludes the account itself. An email change is never applied
//! directly while confirmation is on: the new address parks in
//! `pending_email` behind an `e` token and only
//! [`apply_email`] — reached by consuming that token — moves it into
//! place. With confirmation off the change applies immediately.

use tracing::{info, warn};

use crate::auth::identity;
use crate::auth::reset::apply_password;
use crate::auth::token::{self, TokenKind};
use crate::auth::validation::{
    validate_email, validate_password, validate_username, validate_verify,
};
use crate::config::Config;
use crate::db::{Account, AccountRepository, Address};
use crate::mail::{Mailer, TemplateKind};
use crate::{DoormanError, Result};

/// Username/email form data.
#[derive(Debug, Clone)]
pub struct AccountUpdate {
    pub username: String,
    pub email: String,
}

/// What happened to a submitted account update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountUpdateOutcome {
    /// All changes applied.
    Updated,
    /// The email change is parked pending confirmation.
    ConfirmationSent,
}

/// Update username and/or email.
///
/// A username change appends the old value to the history. An email
/// change issues an email-change token and, with confirmation on,
/// dispatches it to the PENDING address; the primary email stays
/// untouched until the token is consumed.
pub async fn update_account<M: Mailer>(
    repo: &AccountRepository<'_>,
    mailer: &M,
    config: &Config,
    account: &mut Account,
    update: AccountUpdate,
    locale: &str,
) -> Result<AccountUpdateOutcome> {
    info!(account = %account.info(), "Account change request");

    let mut faults = 0;
    if validate_username(repo, &update.username, Some(account.id.as_str()))
        .await
        .is_err()
    {
        faults += 1;
    }
    if validate_email(repo, &update.email, Some(account.id.as_str()))
        .await
        .is_err()
    {
        faults += 1;
    }
    if faults > 0 {
        warn!(faults, "Account change rejected, validation faults");
        return Err(DoormanError::Validation(faults));
    }

    let new_email = update.email.to_lowercase();
    let username_changed = account.username.as_deref() != Some(update.username.as_str());
    let email_changed = account.email != new_email;

    if username_changed {
        if let Some(old) = account.username.replace(update.username.clone()) {
            account.username_history.insert(0, old);
        }
    }

    if email_changed {
        account.pending_email.email = Some(new_email);
        account.pending_email.request_count += 1;
        token::mint(TokenKind::EmailChange, account);
    }

    repo.save(account).await?;
    identity::late_enable(repo, account).await?;

    if !email_changed {
        info!(account = %account.info(), "Account updated");
        return Ok(AccountUpdateOutcome::Updated);
    }

    if config.registration.confirm_email {
        mailer
            .send(account, TemplateKind::NewEmail, locale)
            .await
            .map_err(|e| {
                warn!(account = %account.info(), "Email-change mail failed: {e}");
                DoormanError::from(e)
            })?;
        info!(account = %account.info(), "Email-change confirmation sent");
        Ok(AccountUpdateOutcome::ConfirmationSent)
    } else {
        apply_email(repo, account, None).await?;
        info!(account = %account.info(), "Account updated, email applied directly");
        Ok(AccountUpdateOutcome::Updated)
    }
}

/// Move an email into place: the given address, or the pending one when
/// `email` is `None` (the token-consumption path). The old address is
/// pushed onto the history and the pending state cleared.
pub async fn apply_email(
    repo: &AccountRepository<'_>,
    account: &mut Account,
    email: Option<&str>,
) -> Result<()> {
    let new_email = match email {
        Some(e) => e.to_lowercase(),
        None => account
            .pending_email
            .email
            .clone()
            .ok_or_else(|| DoormanError::NotFound("pending email change".to_string()))?,
    };

    let old = std::mem::replace(&mut account.email, new_email);
    account.email_history.insert(0, old);
    account.pending_email.email = None;
    account.pending_email.auth_token = None;
    repo.save(account).await?;

    identity::late_enable(repo, account).await?;
    info!(account = %account.info(), "Email applied");
    Ok(())
}

/// Change the password from the profile page.
pub async fn change_password(
    repo: &AccountRepository<'_>,
    config: &Config,
    account: &mut Account,
    password: &str,
    verify: &str,
) -> Result<()> {
    let mut faults = 0;
    if validate_password(password).is_err() {
        faults += 1;
    }
    if validate_verify(password, verify).is_err() {
        faults += 1;
    }
    if faults > 0 {
        return Err(DoormanError::Validation(faults));
    }

    apply_password(repo, config, account, password).await
}

/// Set display names.
pub async fn update_names(
    repo: &AccountRepository<'_>,
    account: &mut Account,
    given_name: Option<String>,
    family_name: Option<String>,
) -> Result<()> {
    account.profile.given_name = given_name;
    account.profile.family_name = family_name;
    repo.save(account).await?;
    info!(account = %account.info(), "Profile names updated");
    Ok(())
}

/// Set the postal address.
pub async fn update_address(
    repo: &AccountRepository<'_>,
    account: &mut Account,
    address: Address,
) -> Result<()> {
    account.address = address;
    repo.save(account).await?;
    info!(account = %account.info(), "Address updated");
    Ok(())
}

/// Point the profile at a new avatar; verification drops until
/// moderation looks at it again.
pub async fn set_avatar(
    repo: &AccountRepository<'_>,
    account: &mut Account,
    avatar_path: &str,
) -> Result<()> {
    account.profile.avatar_path = avatar_path.to_string();
    account.profile.avatar_verified = false;
    repo.save(account).await?;
    info!(account = %account.info(), avatar = %avatar_path, "Avatar updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PasswordConfig;
    use crate::db::Database;
    use crate::mail::MemoryMailer;

    fn test_config(confirm_email: bool) -> Config {
        let mut config = Config::default();
        config.registration.confirm_email = confirm_email;
        config.password = PasswordConfig {
            memory_cost: 8,
            time_cost: 1,
            parallelism: 1,
        };
        config
    }

    async fn account(repo: &AccountRepository<'_>) -> Account {
        let mut account = Account::new("someone@example.com")
            .with_username("someone")
            .with_password_hash("$argon2id$stub");
        account.login.enabled = true;
        repo.create(&account).await.unwrap();
        account
    }

    #[tokio::test]
    async fn test_username_change_keeps_history() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = AccountRepository::new(db.pool());
        let config = test_config(true);
        let mailer = MemoryMailer::new(config.site.clone());
        let mut account = account(&repo).await;

        let outcome = update_account(
            &repo,
            &mailer,
            &config,
            &mut account,
            AccountUpdate {
                username: "someone_else".to_string(),
                email: "someone@example.com".to_string(),
            },
            "en",
        )
        .await
        .unwrap();

        assert_eq!(outcome, AccountUpdateOutcome::Updated);
        assert_eq!(account.username.as_deref(), Some("someone_else"));
        assert_eq!(account.username_history, vec!["someone".to_string()]);
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_email_change_parks_pending_and_mails_new_address() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = AccountRepository::new(db.pool());
        let config = test_config(true);
        let mailer = MemoryMailer::new(config.site.clone());
        let mut account = account(&repo).await;

        let outcome = update_account(
            &repo,
            &mailer,
            &config,
            &mut account,
            AccountUpdate {
                username: "someone".to_string(),
                email: "Next@Example.com".to_string(),
            },
            "en",
        )
        .await
        .unwrap();

        assert_eq!(outcome, AccountUpdateOutcome::ConfirmationSent);
        // primary email untouched, change parked
        assert_eq!(account.email, "someone@example.com");
        assert_eq!(
            account.pending_email.email.as_deref(),
            Some("next@example.com")
        );
        let token = account.pending_email.auth_token.clone().unwrap();
        assert!(token.starts_with('e'));
        assert_eq!(account.pending_email.request_count, 1);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient_addr, "next@example.com");
        assert!(sent[0].link.ends_with(&token));
    }

    #[tokio::test]
    async fn test_email_change_applies_directly_without_confirmation() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = AccountRepository::new(db.pool());
        let config = test_config(false);
        let mailer = MemoryMailer::new(config.site.clone());
        let mut account = account(&repo).await;

        let outcome = update_account(
            &repo,
            &mailer,
            &config,
            &mut account,
            AccountUpdate {
                username: "someone".to_string(),
                email: "next@example.com".to_string(),
            },
            "en",
        )
        .await
        .unwrap();

        assert_eq!(outcome, AccountUpdateOutcome::Updated);
        assert_eq!(account.email, "next@example.com");
        assert_eq!(account.email_history, vec!["someone@example.com".to_string()]);
        assert!(account.pending_email.email.is_none());
        assert!(account.pending_email.auth_token.is_none());
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_update_rejects_taken_identifiers() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = AccountRepository::new(db.pool());
        let config = test_config(true);
        let mailer = MemoryMailer::new(config.site.clone());

        let other = Account::new("other@example.com").with_username("other_one");
        repo.create(&other).await.unwrap();
        let mut account = account(&repo).await;

        let result = update_account(
            &repo,
            &mailer,
            &config,
            &mut account,
            AccountUpdate {
                username: "other_one".to_string(),
                email: "other@example.com".to_string(),
            },
            "en",
        )
        .await;
        assert!(matches!(result, Err(DoormanError::Validation(2))));
    }

    #[tokio::test]
    async fn test_apply_email_consumes_pending_state() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = AccountRepository::new(db.pool());
        let mut account = account(&repo).await;

        account.pending_email.email = Some("next@example.com".to_string());
        account.pending_email.auth_token = Some("e-token".to_string());
        repo.save(&mut account).await.unwrap();

        apply_email(&repo, &mut account, None).await.unwrap();
        assert_eq!(account.email, "next@example.com");
        assert_eq!(account.email_history, vec!["someone@example.com".to_string()]);
        assert!(account.pending_email.auth_token.is_none());

        // nothing pending now
        let result = apply_email(&repo, &mut account, None).await;
        assert!(matches!(result, Err(DoormanError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_change_password_validation() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = AccountRepository::new(db.pool());
        let config = test_config(true);
        let mut account = account(&repo).await;

        let result = change_password(&repo, &config, &mut account, "short", "short").await;
        assert!(matches!(result, Err(DoormanError::Validation(1))));

        change_password(&repo, &config, &mut account, "long-enough", "long-enough")
            .await
            .unwrap();
        let stored = repo.find_by_id(&account.id).await.unwrap().unwrap();
        assert!(stored
            .password_hash
            .as_deref()
            .unwrap()
            .starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_set_avatar_drops_verification() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = AccountRepository::new(db.pool());
        let mut account = account(&repo).await;
        account.profile.avatar_verified = true;
        repo.save(&mut account).await.unwrap();

        set_avatar(&repo, &mut account, "/avatar/1.png").await.unwrap();
        assert_eq!(account.profile.avatar_path, "/avatar/1.png");
        assert!(!account.profile.avatar_verified);
    }

    #[tokio::test]
    async fn test_update_address() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = AccountRepository::new(db.pool());
        let mut account = account(&repo).await;

        let address = Address {
            line1: Some("1 Harbour Rd".to_string()),
            city: Some("Piraeus".to_string()),
            country: Some("GR".to_string()),
            ..Address::default()
        };
        update_address(&repo, &mut account, address).await.unwrap();

        let stored = repo.find_by_id(&account.id).await.unwrap().unwrap();
        assert_eq!(stored.address.city.as_deref(), Some("Piraeus"));
    }
}
