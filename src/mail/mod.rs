//! Outbound mail interface for doorman.
//!
//! Actual delivery is an external collaborator; this module specifies
//! the contract: which template goes out, which token field and
//! recipient address each template uses, and the activation link format
//! (`<site.url>/token/<user>/<token>`). [`MemoryMailer`] is the in-crate
//! implementation used by tests; deployments plug their own transport in
//! behind [`Mailer`].

use std::fmt;
use std::sync::Mutex;

use thiserror::Error;

use crate::config::SiteConfig;
use crate::db::Account;

/// Mail dispatch errors.
#[derive(Error, Debug)]
pub enum MailError {
    /// The token field the template needs is not outstanding.
    #[error("no outstanding token for this template")]
    MissingToken,

    /// The template's recipient address is absent (no pending email).
    #[error("no recipient address for this template")]
    MissingRecipient,

    /// Transport failure.
    #[error("mail dispatch failed: {0}")]
    Dispatch(String),
}

/// Which message goes out; determines token field and recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// Registration confirmation -> registration token, primary address.
    Register,
    /// Password reset -> reset token, primary address.
    Reset,
    /// Email-change confirmation -> email-change token, PENDING address.
    NewEmail,
}

impl TemplateKind {
    /// Template directory tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::Register => "register",
            TemplateKind::Reset => "reset",
            TemplateKind::NewEmail => "newemail",
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A composed message, ready for a transport.
#[derive(Debug, Clone)]
pub struct MailMessage {
    pub kind: TemplateKind,
    pub recipient_name: String,
    pub recipient_addr: String,
    /// Full activation link carrying the token.
    pub link: String,
    pub locale: String,
}

impl MailMessage {
    /// Resolve recipient, token and link for a template.
    pub fn compose(
        account: &Account,
        kind: TemplateKind,
        site: &SiteConfig,
        locale: &str,
    ) -> Result<Self, MailError> {
        let (token, recipient_addr) = match kind {
            TemplateKind::Register => (&account.login.auth_token, account.email.clone()),
            TemplateKind::Reset => (&account.reset.auth_token, account.email.clone()),
            TemplateKind::NewEmail => (
                &account.pending_email.auth_token,
                account
                    .pending_email
                    .email
                    .clone()
                    .ok_or(MailError::MissingRecipient)?,
            ),
        };
        let token = token.as_deref().ok_or(MailError::MissingToken)?;

        // the link identifier doubles as the recipient name; accounts
        // without a username are addressed by email, which the token
        // endpoint resolves the same way
        let recipient_name = account
            .username
            .clone()
            .unwrap_or_else(|| account.email.clone());
        let link = format!("{}/token/{}/{}", site.url, recipient_name, token);

        Ok(Self {
            kind,
            recipient_name,
            recipient_addr,
            link,
            locale: locale.to_string(),
        })
    }
}

/// Outbound mail dispatch seam.
#[allow(async_fn_in_trait)]
pub trait Mailer {
    /// Compose and dispatch one template for the account. Must not block
    /// other requests; errors surface as a distinct retriable failure.
    async fn send(
        &self,
        account: &Account,
        kind: TemplateKind,
        locale: &str,
    ) -> Result<(), MailError>;
}

/// Mailer that records composed messages instead of delivering them.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    site: SiteConfig,
    sent: Mutex<Vec<MailMessage>>,
}

impl MemoryMailer {
    pub fn new(site: SiteConfig) -> Self {
        Self {
            site,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Messages recorded so far.
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().expect("mailer lock poisoned").clone()
    }
}

impl Mailer for MemoryMailer {
    async fn send(
        &self,
        account: &Account,
        kind: TemplateKind,
        locale: &str,
    ) -> Result<(), MailError> {
        let message = MailMessage::compose(account, kind, &self.site, locale)?;
        self.sent.lock().expect("mailer lock poisoned").push(message);
        Ok(())
    }
}

/// Mailer whose every dispatch fails; exercises collaborator-failure
/// paths in tests.
#[derive(Debug, Default)]
pub struct FailingMailer;

impl Mailer for FailingMailer {
    async fn send(
        &self,
        _account: &Account,
        _kind: TemplateKind,
        _locale: &str,
    ) -> Result<(), MailError> {
        Err(MailError::Dispatch("mailer offline".to_string()))
    }
}
