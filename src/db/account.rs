//! Account model for doorman.
//!
//! The Account is the aggregate root: one row per local and/or federated
//! identity. Embedded state (login counters, tokens, federated links,
//! profile, address) is owned by the account and persisted with it as a
//! whole document; the repository is the only writer of durable state.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default avatar path assigned to new accounts.
pub const DEFAULT_AVATAR: &str = "/img/avatar.jpg";

/// Federated identity provider tag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Facebook,
    Google,
    LinkedIn,
}

impl Provider {
    /// All providers, in match order for cross-provider email lookups.
    pub const ALL: [Provider; 3] = [Provider::Facebook, Provider::Google, Provider::LinkedIn];

    /// Stable string tag, used as the JSON map key and in queries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Facebook => "facebook",
            Provider::Google => "google",
            Provider::LinkedIn => "linkedin",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "facebook" => Ok(Provider::Facebook),
            "google" => Ok(Provider::Google),
            "linkedin" => Ok(Provider::LinkedIn),
            _ => Err(format!("unknown provider: {s}")),
        }
    }
}

/// Failed-login counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailState {
    /// Time of the most recent failed attempt.
    pub last_fail_at: Option<DateTime<Utc>>,
    /// Consecutive failed attempts since the last success.
    pub fail_count: i64,
}

/// Local-login state and the outstanding registration token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginState {
    /// When this state was (re)established; registration token age is
    /// measured from here.
    pub created_at: DateTime<Utc>,
    /// Time of the most recent successful login.
    pub last_success_at: DateTime<Utc>,
    /// Successful login count.
    pub success_count: i64,
    /// Gate on local login.
    pub enabled: bool,
    /// Outstanding registration token, `r`-prefixed. Null when no
    /// activation is pending.
    pub auth_token: Option<String>,
    /// Failed-login counters.
    pub fault: FailState,
}

impl Default for LoginState {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            last_success_at: now,
            success_count: 0,
            enabled: false,
            auth_token: None,
            fault: FailState::default(),
        }
    }
}

/// One provider's identity assertion linked to this account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederatedIdentity {
    /// Provider-side subject id. May be unset when the link was made by
    /// email match and the provider has not asserted an id yet.
    pub external_id: Option<String>,
    /// Email asserted by the provider, lower-cased.
    pub email: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    /// Time of the most recent login through this provider.
    pub last_at: DateTime<Utc>,
    /// Login count through this provider.
    pub count: i64,
    pub created_at: DateTime<Utc>,
}

impl FederatedIdentity {
    /// Create a fresh sub-record from a provider assertion.
    pub fn new(
        external_id: impl Into<String>,
        email: impl Into<String>,
        given_name: Option<String>,
        family_name: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            external_id: Some(external_id.into()),
            email: email.into().to_lowercase(),
            given_name,
            family_name,
            last_at: now,
            count: 0,
            created_at: now,
        }
    }
}

/// Provider tag -> sub-record map; at most one entry per provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FederatedIdentities(BTreeMap<Provider, FederatedIdentity>);

impl FederatedIdentities {
    pub fn get(&self, provider: Provider) -> Option<&FederatedIdentity> {
        self.0.get(&provider)
    }

    pub fn get_mut(&mut self, provider: Provider) -> Option<&mut FederatedIdentity> {
        self.0.get_mut(&provider)
    }

    pub fn insert(&mut self, provider: Provider, identity: FederatedIdentity) {
        self.0.insert(provider, identity);
    }

    /// Get the provider's sub-record, inserting `default` if absent.
    pub fn entry(
        &mut self,
        provider: Provider,
        default: FederatedIdentity,
    ) -> &mut FederatedIdentity {
        self.0.entry(provider).or_insert(default)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Provider, &FederatedIdentity)> {
        self.0.iter()
    }

    /// Fold another account's sub-records in, keeping existing entries.
    ///
    /// Used during merge-on-activation: the placeholder's links move over
    /// without clobbering providers this account already linked.
    pub fn merge_missing_from(&mut self, other: FederatedIdentities) {
        for (provider, identity) in other.0 {
            self.0.entry(provider).or_insert(identity);
        }
    }
}

/// Password-reset state: the outstanding token and the request counters
/// that gate rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetState {
    /// Outstanding reset token, `p`-prefixed.
    pub auth_token: Option<String>,
    /// When the current token was issued; token age and the linear
    /// backoff are measured from here.
    pub created_at: DateTime<Utc>,
    /// Reset requests since the last consumed token.
    pub request_count: i64,
}

impl Default for ResetState {
    fn default() -> Self {
        Self {
            auth_token: None,
            created_at: Utc::now(),
            request_count: 0,
        }
    }
}

/// A requested-but-unconfirmed email change. The new address stays here
/// until its token is consumed; the primary email is untouched meanwhile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingEmailChange {
    /// The address awaiting confirmation. Null when no change pending.
    pub email: Option<String>,
    /// Outstanding email-change token, `e`-prefixed.
    pub auth_token: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Total change requests over the account's history.
    pub request_count: i64,
}

impl Default for PendingEmailChange {
    fn default() -> Self {
        Self {
            email: None,
            auth_token: None,
            created_at: Utc::now(),
            request_count: 0,
        }
    }
}

/// Display profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub avatar_path: String,
    /// Cleared whenever a new avatar is set; flipped back by moderation,
    /// which is outside this crate.
    pub avatar_verified: bool,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            given_name: None,
            family_name: None,
            avatar_path: DEFAULT_AVATAR.to_string(),
            avatar_verified: false,
        }
    }
}

/// Free-form postal address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub postcode: Option<String>,
}

/// Account entity: the persisted identity for one user.
#[derive(Debug, Clone)]
pub struct Account {
    /// Unique account id (uuid v4).
    pub id: String,
    /// Login username (unique, case-sensitive). Absent on accounts
    /// created by federated login only.
    pub username: Option<String>,
    /// Primary email (unique, lower-cased).
    pub email: String,
    /// Argon2 PHC hash. Absent until local credentials are set.
    pub password_hash: Option<String>,
    /// Role tag.
    pub group_tag: String,
    pub login: LoginState,
    pub federated: FederatedIdentities,
    pub reset: ResetState,
    pub pending_email: PendingEmailChange,
    pub profile: Profile,
    pub address: Address,
    /// Prior usernames, most-recent-first.
    pub username_history: Vec<String>,
    /// Prior emails, most-recent-first.
    pub email_history: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Compare-and-swap counter; bumped by every successful save.
    pub revision: i64,
}

impl Account {
    /// Create a new account with only an email set.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username: None,
            email: email.into().to_lowercase(),
            password_hash: None,
            group_tag: "user".to_string(),
            login: LoginState::default(),
            federated: FederatedIdentities::default(),
            reset: ResetState::default(),
            pending_email: PendingEmailChange::default(),
            profile: Profile::default(),
            address: Address::default(),
            username_history: Vec::new(),
            email_history: Vec::new(),
            created_at: Utc::now(),
            revision: 0,
        }
    }

    /// Set the username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password hash (pre-hashed).
    pub fn with_password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    /// Set the role tag.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group_tag = group.into();
        self
    }

    /// Short log label: `[id] username (email)`.
    pub fn info(&self) -> String {
        format!(
            "[{}] {} ({})",
            self.id,
            self.username.as_deref().unwrap_or("-"),
            self.email
        )
    }

    /// Whether username, email and password hash are all present.
    ///
    /// This is the precondition for flipping a federated-only account to
    /// enabled once profile completion supplies the missing credential.
    pub fn has_local_credentials(&self) -> bool {
        self.username.is_some() && !self.email.is_empty() && self.password_hash.is_some()
    }
}
