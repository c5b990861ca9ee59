//! Single-use token engine for doorman.
//!
//! Tokens are typed, time-boxed secrets embedded in links of the form
//! `/token/:username/:token`. The kind is self-describing via a prefix
//! character so one endpoint can dispatch without an extra lookup:
//! `r` registration, `p` password reset, `e` email change. The prefix is
//! always prepended explicitly, never inferred from digest content.
//!
//! Validation does NOT clear the token; consumption is the caller's
//! responsibility because different flows clear different fields at
//! different times.

use std::fmt;

use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::db::{Account, AccountRepository};
use crate::Result;

/// Tokens older than this (minutes, measured from the owning field's
/// `created_at`) are rejected. Computed from stored timestamps only, so
/// the check survives process restarts.
pub const TOKEN_TTL_MINUTES: i64 = 60;

/// Random seed length fed into the digest, in bytes.
const SEED_LEN: usize = 20;

/// Token validation errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Prefix character is not a known kind.
    #[error("unknown token kind")]
    UnknownKind,

    /// Stored token differs or no token is outstanding.
    #[error("wrong token")]
    Mismatch,

    /// Token is older than the validity window.
    #[error("expired token")]
    Expired,
}

/// Token kind, encoded as the first character of the token string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Registration,
    Reset,
    EmailChange,
}

impl TokenKind {
    /// Prefix character prepended to the digest.
    pub fn prefix(&self) -> char {
        match self {
            TokenKind::Registration => 'r',
            TokenKind::Reset => 'p',
            TokenKind::EmailChange => 'e',
        }
    }

    /// Parse a kind from a token's first character.
    pub fn from_prefix(c: char) -> Option<Self> {
        match c {
            'r' => Some(TokenKind::Registration),
            'p' => Some(TokenKind::Reset),
            'e' => Some(TokenKind::EmailChange),
            _ => None,
        }
    }

    /// Human-readable tag for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Registration => "registration",
            TokenKind::Reset => "reset",
            TokenKind::EmailChange => "email-change",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Generate a token and stamp it onto the account field owned by `kind`,
/// refreshing that field's `created_at`. Does not persist; callers that
/// batch further changes save once through the store.
///
/// The previous token of the same kind, live or dead, is overwritten —
/// at most one token per kind is ever valid.
pub fn mint(kind: TokenKind, account: &mut Account) -> String {
    let mut seed = [0u8; SEED_LEN];
    OsRng.fill_bytes(&mut seed);

    let mut hasher = Sha256::new();
    hasher.update(seed);
    hasher.update(account.email.as_bytes());
    let token = format!("{}{}", kind.prefix(), hex::encode(hasher.finalize()));

    let now = Utc::now();
    match kind {
        TokenKind::Registration => {
            account.login.auth_token = Some(token.clone());
            account.login.created_at = now;
        }
        TokenKind::Reset => {
            account.reset.auth_token = Some(token.clone());
            account.reset.created_at = now;
        }
        TokenKind::EmailChange => {
            account.pending_email.auth_token = Some(token.clone());
            account.pending_email.created_at = now;
        }
    }

    debug!(kind = %kind, account = %account.info(), "Token minted");
    token
}

/// Mint a token and persist the account through the store.
pub async fn issue(
    repo: &AccountRepository<'_>,
    kind: TokenKind,
    account: &mut Account,
) -> Result<String> {
    let token = mint(kind, account);
    repo.save(account).await?;
    Ok(token)
}

/// Check a submitted token against the stored one for the field implied
/// by its prefix. Succeeds without clearing anything.
pub fn validate(account: &Account, token: &str) -> std::result::Result<TokenKind, TokenError> {
    let kind = token
        .chars()
        .next()
        .and_then(TokenKind::from_prefix)
        .ok_or(TokenError::UnknownKind)?;

    let (stored, created_at): (&Option<String>, DateTime<Utc>) = match kind {
        TokenKind::Registration => (&account.login.auth_token, account.login.created_at),
        TokenKind::Reset => (&account.reset.auth_token, account.reset.created_at),
        TokenKind::EmailChange => (
            &account.pending_email.auth_token,
            account.pending_email.created_at,
        ),
    };

    match stored {
        Some(stored) if stored == token => {}
        _ => return Err(TokenError::Mismatch),
    }

    let age = Utc::now().signed_duration_since(created_at).num_minutes();
    if age > TOKEN_TTL_MINUTES {
        return Err(TokenError::Expired);
    }

    Ok(kind)
}
