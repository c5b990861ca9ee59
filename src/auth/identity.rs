//! Identity resolution for doorman.
//!
//! Maps a local or federated identity assertion to exactly one account.
//! A federated login that cannot be matched creates a placeholder
//! account (no username, no credentials, login disabled); when the same
//! person later completes local registration with that email, activation
//! folds the placeholder back in so the two identities converge.

use chrono::Utc;
use tracing::info;

use crate::db::{Account, AccountRepository, FederatedIdentity, Provider};
use crate::{DoormanError, Result};

/// A provider's identity assertion, produced by an external consent flow
/// this crate never initiates or terminates.
#[derive(Debug, Clone)]
pub struct FederatedAssertion {
    /// Provider-side subject id.
    pub external_id: String,
    /// Primary email asserted by the provider.
    pub email: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

/// Resolve a local username (or email) to an account.
pub async fn resolve_local(repo: &AccountRepository<'_>, username: &str) -> Result<Account> {
    repo.find_by_username_or_email(username)
        .await?
        .ok_or_else(|| DoormanError::NotFound("account".to_string()))
}

/// Resolve a federated assertion to an account, creating a placeholder
/// when nothing matches. Returns the account and whether it is new.
pub async fn resolve_federated(
    repo: &AccountRepository<'_>,
    provider: Provider,
    assertion: &FederatedAssertion,
) -> Result<(Account, bool)> {
    let email = assertion.email.to_lowercase();

    match repo
        .find_by_federated(provider, &assertion.external_id, &email)
        .await?
    {
        Some(mut account) => {
            let sub = account.federated.entry(
                provider,
                FederatedIdentity::new(
                    assertion.external_id.as_str(),
                    email.as_str(),
                    assertion.given_name.clone(),
                    assertion.family_name.clone(),
                ),
            );
            if sub.external_id.is_none() {
                sub.external_id = Some(assertion.external_id.clone());
            }
            sub.email = email;
            sub.given_name = assertion.given_name.clone();
            sub.family_name = assertion.family_name.clone();
            sub.last_at = Utc::now();
            sub.count += 1;

            // backfill display names from the provider when unset locally
            if account.profile.given_name.is_none() {
                account.profile.given_name = assertion.given_name.clone();
            }
            if account.profile.family_name.is_none() {
                account.profile.family_name = assertion.family_name.clone();
            }

            repo.save(&mut account).await?;
            info!(provider = %provider, account = %account.info(), "Federated login linked");
            Ok((account, false))
        }
        None => {
            let mut account = Account::new(email.as_str());
            account.profile.given_name = assertion.given_name.clone();
            account.profile.family_name = assertion.family_name.clone();
            account.federated.insert(
                provider,
                FederatedIdentity::new(
                    assertion.external_id.as_str(),
                    email.as_str(),
                    assertion.given_name.clone(),
                    assertion.family_name.clone(),
                ),
            );

            repo.create(&account).await?;
            info!(provider = %provider, account = %account.info(), "Federated placeholder created");
            Ok((account, true))
        }
    }
}

/// Enable local login, then reconcile any federation-only placeholder
/// sharing this email: its sub-records are folded in and the placeholder
/// row removed.
///
/// The enabling write is persisted first; the merge is a follow-up save.
pub async fn enable(repo: &AccountRepository<'_>, account: &mut Account) -> Result<()> {
    account.login.enabled = true;
    account.login.created_at = Utc::now();
    account.login.auth_token = None;
    repo.save(account).await?;

    if let Some(placeholder) = repo
        .remove_federated_and_return(&account.email, &account.id)
        .await?
    {
        info!(
            account = %account.info(),
            placeholder = %placeholder.id,
            "Folding federated placeholder into activated account"
        );
        account.federated.merge_missing_from(placeholder.federated);
        repo.save(account).await?;
    }

    Ok(())
}

/// Flip to enabled once username, email and password hash are all
/// present, typically when profile completion supplies the missing local
/// credential after a federated-only start.
///
/// Returns whether the flip occurred; `false` is a no-op success.
pub async fn late_enable(repo: &AccountRepository<'_>, account: &mut Account) -> Result<bool> {
    if !account.has_local_credentials() {
        return Ok(false);
    }

    account.login.enabled = true;
    account.login.created_at = Utc::now();
    account.login.auth_token = None;
    repo.save(account).await?;
    info!(account = %account.info(), "Local login enabled");
    Ok(true)
}
