//! Credential hashing and verification for doorman.
//!
//! Uses Argon2id with costs taken from [`PasswordConfig`]. Purely
//! functional: no state beyond the configured parameters.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use rand_core::OsRng;
use thiserror::Error;

use crate::config::PasswordConfig;

/// Password-related errors.
#[derive(Error, Debug)]
pub enum PasswordError {
    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    HashError(String),

    /// Stored hash is not a valid PHC string.
    #[error("invalid password hash format")]
    InvalidHash,

    /// Wrong password.
    #[error("password verification failed")]
    VerificationFailed,
}

fn create_argon2(config: &PasswordConfig) -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(config.memory_cost, config.time_cost, config.parallelism, None)
        .map_err(|e| PasswordError::HashError(e.to_string()))?;
    Ok(Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params,
    ))
}

/// Hash a password with Argon2id.
///
/// Returns a PHC-formatted string carrying salt and parameters.
pub fn hash_password(password: &str, config: &PasswordConfig) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = create_argon2(config)?;
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(e.to_string()))?;

    Ok(hash.to_string())
}

/// Verify a password against a stored PHC hash.
///
/// Parameters are taken from the stored hash, not from config, so old
/// hashes keep verifying after a cost change.
pub fn verify_password(password: &str, hash: &str) -> Result<(), PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHash)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| PasswordError::VerificationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> PasswordConfig {
        // cheap parameters so the test suite stays quick
        PasswordConfig {
            memory_cost: 8,
            time_cost: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_hash_produces_phc_string() {
        let hash = hash_password("correct horse", &fast_config()).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("$v=19$"));
    }

    #[test]
    fn test_same_password_different_salts() {
        let config = fast_config();
        let h1 = hash_password("same_password", &config).unwrap();
        let h2 = hash_password("same_password", &config).unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_verify_roundtrip() {
        let hash = hash_password("correct horse", &fast_config()).unwrap();
        assert!(verify_password("correct horse", &hash).is_ok());

        let result = verify_password("wrong horse", &hash);
        assert!(matches!(result, Err(PasswordError::VerificationFailed)));
    }

    #[test]
    fn test_verify_invalid_hash() {
        let result = verify_password("anything", "not_a_phc_string");
        assert!(matches!(result, Err(PasswordError::InvalidHash)));
    }

    #[test]
    fn test_configured_costs_end_up_in_hash() {
        let hash = hash_password("correct horse", &fast_config()).unwrap();
        assert!(hash.contains("m=8"));
        assert!(hash.contains("t=1"));
        assert!(hash.contains("p=1"));
    }
}
