//! Token link consumption for doorman.
//!
//! One endpoint (`/token/:username/:token`) serves all three token
//! kinds; the prefix character picks the continuation. Registration and
//! email-change tokens are consumed here. A reset token is only
//! VALIDATED here — the flow still needs the new password, so
//! consumption happens when [`set_password`] runs against the same
//! token.
//!
//! [`set_password`]: crate::auth::reset::set_password

use tracing::{info, warn};

use crate::auth::identity::resolve_local;
use crate::auth::registration;
use crate::auth::token::{self, TokenKind};
use crate::auth::profile;
use crate::db::{Account, AccountRepository};
use crate::{DoormanError, Result};

/// What consuming a token link led to.
#[derive(Debug)]
pub enum TokenOutcome {
    /// Registration token consumed; the account is now enabled.
    Activated(Account),
    /// Reset token is valid; the caller collects the new password next.
    ResetReady(Account),
    /// Email-change token consumed; the pending address is now primary.
    EmailApplied(Account),
}

/// Resolve the link's owner, validate the token, run the continuation
/// its kind selects.
pub async fn consume(
    repo: &AccountRepository<'_>,
    username: &str,
    token: &str,
) -> Result<TokenOutcome> {
    if username.is_empty() || token.is_empty() {
        warn!("Token link with missing data");
        return Err(DoormanError::Validation(1));
    }

    let mut account = resolve_local(repo, username).await?;

    let kind = token::validate(&account, token).map_err(|e| {
        warn!(account = %account.info(), "Token check failed: {e}");
        DoormanError::from(e)
    })?;
    info!(account = %account.info(), kind = %kind, "Token passed");

    match kind {
        TokenKind::Registration => {
            registration::activate(repo, &mut account).await?;
            Ok(TokenOutcome::Activated(account))
        }
        TokenKind::Reset => Ok(TokenOutcome::ResetReady(account)),
        TokenKind::EmailChange => {
            profile::apply_email(repo, &mut account, None).await?;
            Ok(TokenOutcome::EmailApplied(account))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::TokenError;
    use crate::db::Database;
    use chrono::{Duration, Utc};

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    async fn pending_registration(repo: &AccountRepository<'_>) -> (Account, String) {
        let mut account = Account::new("someone@example.com")
            .with_username("someone")
            .with_password_hash("$argon2id$stub");
        let token = token::mint(TokenKind::Registration, &mut account);
        repo.create(&account).await.unwrap();
        (account, token)
    }

    #[tokio::test]
    async fn test_registration_token_activates() {
        let db = setup().await;
        let repo = AccountRepository::new(db.pool());
        let (_, token) = pending_registration(&repo).await;

        let outcome = consume(&repo, "someone", &token).await.unwrap();
        let account = match outcome {
            TokenOutcome::Activated(account) => account,
            other => panic!("expected Activated, got {other:?}"),
        };
        assert!(account.login.enabled);
        assert!(account.login.auth_token.is_none());

        // second visit finds no outstanding token
        let result = consume(&repo, "someone", &token).await;
        assert!(matches!(
            result,
            Err(DoormanError::Token(TokenError::Mismatch))
        ));
    }

    #[tokio::test]
    async fn test_reset_token_defers_consumption() {
        let db = setup().await;
        let repo = AccountRepository::new(db.pool());

        let mut account = Account::new("someone@example.com").with_username("someone");
        let token = token::mint(TokenKind::Reset, &mut account);
        repo.create(&account).await.unwrap();

        let outcome = consume(&repo, "someone", &token).await.unwrap();
        assert!(matches!(outcome, TokenOutcome::ResetReady(_)));

        // the token survives validation and the link still works
        let outcome = consume(&repo, "someone", &token).await.unwrap();
        assert!(matches!(outcome, TokenOutcome::ResetReady(_)));
    }

    #[tokio::test]
    async fn test_email_change_token_applies_pending_address() {
        let db = setup().await;
        let repo = AccountRepository::new(db.pool());

        let mut account = Account::new("someone@example.com").with_username("someone");
        account.pending_email.email = Some("next@example.com".to_string());
        let token = token::mint(TokenKind::EmailChange, &mut account);
        repo.create(&account).await.unwrap();

        let outcome = consume(&repo, "someone", &token).await.unwrap();
        let account = match outcome {
            TokenOutcome::EmailApplied(account) => account,
            other => panic!("expected EmailApplied, got {other:?}"),
        };
        assert_eq!(account.email, "next@example.com");
        assert!(account.pending_email.auth_token.is_none());
    }

    #[tokio::test]
    async fn test_unknown_owner() {
        let db = setup().await;
        let repo = AccountRepository::new(db.pool());

        let result = consume(&repo, "nobody", "r0000").await;
        assert!(matches!(result, Err(DoormanError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let db = setup().await;
        let repo = AccountRepository::new(db.pool());
        let (mut account, token) = pending_registration(&repo).await;

        account.login.created_at = Utc::now() - Duration::minutes(61);
        repo.save(&mut account).await.unwrap();

        let result = consume(&repo, "someone", &token).await;
        assert!(matches!(
            result,
            Err(DoormanError::Token(TokenError::Expired))
        ));
    }

    #[tokio::test]
    async fn test_missing_data() {
        let db = setup().await;
        let repo = AccountRepository::new(db.pool());

        assert!(matches!(
            consume(&repo, "", "r000").await,
            Err(DoormanError::Validation(_))
        ));
        assert!(matches!(
            consume(&repo, "someone", "").await,
            Err(DoormanError::Validation(_))
        ));
    }
}
