//! Account repository for doorman.
//!
//! The repository is the Account Store: the sole durable mutation path.
//! Entities are read, mutated in memory and handed back to [`save`],
//! which guards the whole-document write with a per-account
//! compare-and-swap on the revision column.
//!
//! [`save`]: AccountRepository::save

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::account::{
    Account, Address, FederatedIdentities, LoginState, PendingEmailChange, Profile, Provider,
    ResetState,
};
use crate::{DoormanError, Result};

const ACCOUNT_COLUMNS: &str = "id, username, email, password, group_tag, login, federated, \
     reset, pending_email, profile, address, username_history, email_history, revision, created_at";

/// Raw row shape; JSON columns are expanded in the `Account` conversion.
#[derive(sqlx::FromRow)]
struct AccountRow {
    id: String,
    username: Option<String>,
    email: String,
    password: Option<String>,
    group_tag: String,
    login: String,
    federated: String,
    reset: String,
    pending_email: String,
    profile: String,
    address: String,
    username_history: String,
    email_history: String,
    revision: i64,
    created_at: String,
}

fn decode<T: serde::de::DeserializeOwned>(column: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| DoormanError::Store(format!("corrupt {column} column: {e}")))
}

impl TryFrom<AccountRow> for Account {
    type Error = DoormanError;

    fn try_from(row: AccountRow) -> Result<Account> {
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| DoormanError::Store(format!("corrupt created_at column: {e}")))?
            .with_timezone(&Utc);

        Ok(Account {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password,
            group_tag: row.group_tag,
            login: decode::<LoginState>("login", &row.login)?,
            federated: decode::<FederatedIdentities>("federated", &row.federated)?,
            reset: decode::<ResetState>("reset", &row.reset)?,
            pending_email: decode::<PendingEmailChange>("pending_email", &row.pending_email)?,
            profile: decode::<Profile>("profile", &row.profile)?,
            address: decode::<Address>("address", &row.address)?,
            username_history: decode::<Vec<String>>("username_history", &row.username_history)?,
            email_history: decode::<Vec<String>>("email_history", &row.email_history)?,
            revision: row.revision,
            created_at,
        })
    }
}

fn encode<T: serde::Serialize>(column: &str, value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| DoormanError::Store(format!("encode {column} column: {e}")))
}

/// Repository for account persistence.
pub struct AccountRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AccountRepository<'a> {
    /// Create a new repository over the given pool.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new account.
    ///
    /// Uniqueness violations on username or email surface as the opaque
    /// store error, like any other persistence failure.
    pub async fn create(&self, account: &Account) -> Result<()> {
        sqlx::query(
            "INSERT INTO accounts (id, username, email, password, group_tag, login, federated, \
             reset, pending_email, profile, address, username_history, email_history, revision, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&account.id)
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.group_tag)
        .bind(encode("login", &account.login)?)
        .bind(encode("federated", &account.federated)?)
        .bind(encode("reset", &account.reset)?)
        .bind(encode("pending_email", &account.pending_email)?)
        .bind(encode("profile", &account.profile)?)
        .bind(encode("address", &account.address)?)
        .bind(encode("username_history", &account.username_history)?)
        .bind(encode("email_history", &account.email_history)?)
        .bind(account.revision)
        .bind(account.created_at.to_rfc3339())
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Persist the whole document, guarded by the revision counter.
    ///
    /// A concurrent writer that saved first makes this call fail; the
    /// caller must re-fetch before retrying, since the in-memory entity
    /// has diverged from the store.
    pub async fn save(&self, account: &mut Account) -> Result<()> {
        let result = sqlx::query(
            "UPDATE accounts SET username = ?, email = ?, password = ?, group_tag = ?, \
             login = ?, federated = ?, reset = ?, pending_email = ?, profile = ?, address = ?, \
             username_history = ?, email_history = ?, revision = revision + 1
             WHERE id = ? AND revision = ?",
        )
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.group_tag)
        .bind(encode("login", &account.login)?)
        .bind(encode("federated", &account.federated)?)
        .bind(encode("reset", &account.reset)?)
        .bind(encode("pending_email", &account.pending_email)?)
        .bind(encode("profile", &account.profile)?)
        .bind(encode("address", &account.address)?)
        .bind(encode("username_history", &account.username_history)?)
        .bind(encode("email_history", &account.email_history)?)
        .bind(&account.id)
        .bind(account.revision)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DoormanError::Store(format!(
                "concurrent modification of account {}",
                account.id
            )));
        }

        account.revision += 1;
        Ok(())
    }

    /// Find by username or, when the identifier contains `@`, by email.
    pub async fn find_by_username_or_email(&self, identifier: &str) -> Result<Option<Account>> {
        let sql = if identifier.contains('@') {
            format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ?")
        } else {
            format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = ?")
        };
        let bound = if identifier.contains('@') {
            identifier.to_lowercase()
        } else {
            identifier.to_string()
        };

        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(bound)
            .fetch_optional(self.pool)
            .await?;

        row.map(Account::try_from).transpose()
    }

    /// Find by account id.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?");
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(Account::try_from).transpose()
    }

    /// Resolve a federated assertion to an account. First match wins,
    /// in order: exact provider id, primary email, then the email stored
    /// under any OTHER provider's sub-record.
    pub async fn find_by_federated(
        &self,
        provider: Provider,
        external_id: &str,
        email: &str,
    ) -> Result<Option<Account>> {
        let email = email.to_lowercase();

        // 1. provider + external id
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts \
             WHERE json_extract(federated, '$.{}.external_id') = ?",
            provider.as_str()
        );
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(external_id)
            .fetch_optional(self.pool)
            .await?;
        if let Some(row) = row {
            return Ok(Some(Account::try_from(row)?));
        }

        // 2. primary email
        if let Some(account) = self.find_by_username_or_email(&email).await? {
            return Ok(Some(account));
        }

        // 3. other providers' stored emails
        for other in Provider::ALL {
            if other == provider {
                continue;
            }
            let sql = format!(
                "SELECT {ACCOUNT_COLUMNS} FROM accounts \
                 WHERE json_extract(federated, '$.{}.email') = ?",
                other.as_str()
            );
            let row = sqlx::query_as::<_, AccountRow>(&sql)
                .bind(&email)
                .fetch_optional(self.pool)
                .await?;
            if let Some(row) = row {
                return Ok(Some(Account::try_from(row)?));
            }
        }

        Ok(None)
    }

    /// Detach and return the federation-only placeholder whose stored
    /// provider emails match, so its sub-records can be folded into the
    /// account being activated. That account itself is excluded by id.
    pub async fn remove_federated_and_return(
        &self,
        email: &str,
        exclude_id: &str,
    ) -> Result<Option<Account>> {
        let email = email.to_lowercase();
        // subquery pins the delete to one row even if several match
        let sql = format!(
            "DELETE FROM accounts \
             WHERE id = (SELECT id FROM accounts \
                WHERE id != ? AND (json_extract(federated, '$.facebook.email') = ? \
                   OR json_extract(federated, '$.google.email') = ? \
                   OR json_extract(federated, '$.linkedin.email') = ?) \
                LIMIT 1) \
             RETURNING {ACCOUNT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(exclude_id)
            .bind(&email)
            .bind(&email)
            .bind(&email)
            .fetch_optional(self.pool)
            .await?;

        row.map(Account::try_from).transpose()
    }

    /// Whether a username is taken by an account other than `exclude_id`.
    pub async fn username_taken(&self, username: &str, exclude_id: Option<&str>) -> Result<bool> {
        let taken: bool = match exclude_id {
            Some(id) => {
                sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM accounts WHERE username = ? AND id != ?)",
                )
                .bind(username)
                .bind(id)
                .fetch_one(self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts WHERE username = ?)")
                    .bind(username)
                    .fetch_one(self.pool)
                    .await?
            }
        };
        Ok(taken)
    }

    /// Whether an email is taken by an account other than `exclude_id`.
    pub async fn email_taken(&self, email: &str, exclude_id: Option<&str>) -> Result<bool> {
        let email = email.to_lowercase();
        let taken: bool = match exclude_id {
            Some(id) => {
                sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM accounts WHERE email = ? AND id != ?)",
                )
                .bind(email)
                .bind(id)
                .fetch_one(self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts WHERE email = ?)")
                    .bind(email)
                    .fetch_one(self.pool)
                    .await?
            }
        };
        Ok(taken)
    }
}
