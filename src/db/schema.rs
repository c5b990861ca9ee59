//! Database schema and migrations for doorman.
//!
//! Migrations are applied sequentially; the schema_version table tracks
//! which have been applied.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: Initial schema - accounts table
    //
    // Accounts are stored document-style: scalar columns carry identity
    // (and the uniqueness constraints on it), embedded state lives in
    // JSON TEXT columns written back as a whole on save.
    r#"
-- Accounts table: one row per local and/or federated identity
CREATE TABLE accounts (
    id               TEXT PRIMARY KEY,            -- uuid v4
    username         TEXT UNIQUE,                 -- case-sensitive, absent on federated placeholders
    email            TEXT NOT NULL UNIQUE,        -- stored lower-cased
    password         TEXT,                        -- argon2 PHC hash, absent until local credentials set
    group_tag        TEXT NOT NULL DEFAULT 'user',
    login            TEXT NOT NULL,               -- LoginState JSON
    federated        TEXT NOT NULL,               -- provider -> FederatedIdentity JSON
    reset            TEXT NOT NULL,               -- ResetState JSON
    pending_email    TEXT NOT NULL,               -- PendingEmailChange JSON
    profile          TEXT NOT NULL,               -- Profile JSON
    address          TEXT NOT NULL,               -- Address JSON
    username_history TEXT NOT NULL,               -- JSON array, most-recent-first
    email_history    TEXT NOT NULL,               -- JSON array, most-recent-first
    revision         INTEGER NOT NULL DEFAULT 0,  -- compare-and-swap counter
    created_at       TEXT NOT NULL
);

CREATE INDEX idx_accounts_email ON accounts(email);
"#,
];
