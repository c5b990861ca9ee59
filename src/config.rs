//! Configuration module for doorman.

use serde::Deserialize;
use std::path::Path;

use crate::{DoormanError, Result};

/// Site identity used in outbound mail and token links.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Site display name.
    #[serde(default = "default_site_name")]
    pub name: String,
    /// Base URL token links are built against.
    #[serde(default = "default_site_url")]
    pub url: String,
    /// From-address for outbound mail.
    #[serde(default = "default_site_email")]
    pub email: String,
}

fn default_site_name() -> String {
    "doorman".to_string()
}

fn default_site_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_site_email() -> String {
    "support@localhost".to_string()
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: default_site_name(),
            url: default_site_url(),
            email: default_site_email(),
        }
    }
}

/// Registration behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationConfig {
    /// Require email confirmation before local login is enabled.
    #[serde(default = "default_confirm_email")]
    pub confirm_email: bool,
}

fn default_confirm_email() -> bool {
    true
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            confirm_email: default_confirm_email(),
        }
    }
}

/// Argon2id cost parameters for credential hashing.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    /// Memory cost in KiB.
    #[serde(default = "default_memory_cost")]
    pub memory_cost: u32,
    /// Time cost (iterations).
    #[serde(default = "default_time_cost")]
    pub time_cost: u32,
    /// Parallelism (lanes).
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

fn default_memory_cost() -> u32 {
    65536
}

fn default_time_cost() -> u32 {
    3
}

fn default_parallelism() -> u32 {
    4
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: default_memory_cost(),
            time_cost: default_time_cost(),
            parallelism: default_parallelism(),
        }
    }
}

/// CAPTCHA verification settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptchaConfig {
    /// Require CAPTCHA from authenticated users.
    #[serde(default)]
    pub for_users: bool,
    /// Require CAPTCHA from guests.
    #[serde(default = "default_captcha_guests")]
    pub for_guests: bool,
    /// Shared secret for the verify endpoint.
    #[serde(default)]
    pub secret: String,
    /// Verify endpoint URL.
    #[serde(default = "default_captcha_url")]
    pub verify_url: String,
}

fn default_captcha_guests() -> bool {
    true
}

fn default_captcha_url() -> String {
    "https://www.google.com/recaptcha/api/siteverify".to_string()
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            for_users: false,
            for_guests: default_captcha_guests(),
            secret: String::new(),
            verify_url: default_captcha_url(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/doorman.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file path.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/doorman.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Contact form configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactConfig {
    /// Append-only message log path.
    #[serde(default = "default_message_log")]
    pub message_log: String,
}

fn default_message_log() -> String {
    "logs/messages.log".to_string()
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            message_log: default_message_log(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Site identity.
    #[serde(default)]
    pub site: SiteConfig,
    /// Registration behavior.
    #[serde(default)]
    pub registration: RegistrationConfig,
    /// Password hashing costs.
    #[serde(default)]
    pub password: PasswordConfig,
    /// CAPTCHA settings.
    #[serde(default)]
    pub captcha: CaptchaConfig,
    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Contact form settings.
    #[serde(default)]
    pub contact: ContactConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Missing sections and fields fall back to their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&content).map_err(|e| DoormanError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.registration.confirm_email);
        assert_eq!(config.password.memory_cost, 65536);
        assert_eq!(config.database.path, "data/doorman.db");
        assert!(config.captcha.for_guests);
        assert!(!config.captcha.for_users);
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml = r#"
[site]
name = "farside"
url = "https://farside.example"

[registration]
confirm_email = false
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.site.name, "farside");
        assert_eq!(config.site.url, "https://farside.example");
        assert!(!config.registration.confirm_email);
        // untouched sections keep defaults
        assert_eq!(config.password.time_cost, 3);
        assert_eq!(config.contact.message_log, "logs/messages.log");
    }

    #[test]
    fn test_parse_empty_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.site.name, "doorman");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = Config::load("/nonexistent/doorman.toml");
        assert!(result.is_err());
    }
}
