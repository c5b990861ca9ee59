//! doorman - session-based account management core
//!
//! Local credential login, federated social login, registration with
//! optional email confirmation, password reset via single-use tokens,
//! and profile mutation with side-effect mail. The hard center is the
//! token-and-state lifecycle: three classes of single-use, time-boxed
//! tokens issued, validated and consumed against concurrent,
//! partially-failing I/O.

pub mod auth;
pub mod captcha;
pub mod config;
pub mod contact;
pub mod db;
pub mod error;
pub mod logging;
pub mod mail;

pub use auth::{
    activate, apply_email, authenticate_local, change_password, consume, enable, late_enable,
    register, request_reset, resolve_federated, resolve_local, set_password, update_account,
    AccountUpdate, AccountUpdateOutcome, FederatedAssertion, PasswordError, RateLimitError,
    RegistrationRequest, SetPasswordRequest, TokenError, TokenKind, TokenOutcome, ValidationError,
};
pub use captcha::{CaptchaDisabled, CaptchaVerifier, HttpCaptchaVerifier};
pub use config::Config;
pub use contact::{contact, ContactForm, MessageLog};
pub use db::{
    Account, AccountRepository, Address, Database, FederatedIdentities, FederatedIdentity,
    Provider,
};
pub use error::{DoormanError, Result};
pub use mail::{MailError, MailMessage, Mailer, MemoryMailer, TemplateKind};
