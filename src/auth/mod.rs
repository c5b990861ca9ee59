//! Authentication module for doorman.
//!
//! Credential hashing, the single-use token engine, login state,
//! identity resolution and the lifecycle orchestrators.

pub mod identity;
pub mod login;
pub mod password;
pub mod profile;
pub mod registration;
pub mod reset;
pub mod token;
pub mod token_flow;
pub mod validation;

pub use identity::{enable, late_enable, resolve_federated, resolve_local, FederatedAssertion};
pub use login::{
    authenticate_local, is_login_allowed, record_failure, record_success, MAX_LOGIN_FAULTS,
};
pub use password::{hash_password, verify_password, PasswordError};
pub use profile::{
    apply_email, change_password, set_avatar, update_account, update_address, update_names,
    AccountUpdate, AccountUpdateOutcome,
};
pub use registration::{activate, register, RegistrationRequest};
pub use reset::{
    request_reset, set_password, RateLimitError, SetPasswordRequest, MAX_RESET_REQUESTS,
    RESET_BACKOFF_SECS,
};
pub use token::{issue, mint, validate, TokenError, TokenKind, TOKEN_TTL_MINUTES};
pub use token_flow::{consume, TokenOutcome};
pub use validation::{ValidationError, MIN_PASSWORD_LENGTH, MIN_USERNAME_LENGTH};
