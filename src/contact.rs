//! Contact form handling for doorman.
//!
//! Independent of accounts; it shares the validation-fault-counting
//! pattern with the registration surfaces and appends accepted messages
//! to an append-only log file. Whether a CAPTCHA is demanded depends on
//! the audience: authenticated users and guests are configured
//! separately.

use std::path::PathBuf;

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::auth::validation::{
    validate_contact_email, validate_contact_name, validate_contact_text,
};
use crate::captcha::CaptchaVerifier;
use crate::config::Config;
use crate::{DoormanError, Result};

/// Contact form data.
#[derive(Debug, Clone)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub text: String,
    /// CAPTCHA response token, when the form displayed one.
    pub captcha_response: Option<String>,
}

/// Append-only message log.
pub struct MessageLog {
    path: PathBuf,
}

impl MessageLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one message record.
    pub async fn append(&self, form: &ContactForm) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let record = format!(
            "Date: {}\nName: {}\nEmail: {}\n{}\n\n\n",
            Utc::now().format("%B %e %Y, %H:%M:%S"),
            form.name,
            form.email,
            form.text
        );

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(record.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Handle a contact form submission.
pub async fn contact<C: CaptchaVerifier>(
    captcha: &C,
    config: &Config,
    log: &MessageLog,
    form: ContactForm,
    is_authenticated: bool,
) -> Result<()> {
    info!(name = %form.name, email = %form.email, "Contact request");

    // all-blank short-circuit
    if form.name.is_empty() && form.email.is_empty() && form.text.is_empty() {
        return Err(DoormanError::Validation(3));
    }

    let mut faults = 0;
    if validate_contact_name(&form.name).is_err() {
        faults += 1;
    }
    if validate_contact_email(&form.email).is_err() {
        faults += 1;
    }
    if validate_contact_text(&form.text).is_err() {
        faults += 1;
    }
    if faults > 0 {
        warn!(faults, "Contact rejected, validation faults");
        return Err(DoormanError::Validation(faults));
    }

    let captcha_required = (config.captcha.for_users && is_authenticated)
        || (config.captcha.for_guests && !is_authenticated);
    if captcha_required {
        match &form.captcha_response {
            None => {
                warn!("Contact rejected, missing captcha response");
                return Err(DoormanError::CaptchaRejected);
            }
            Some(response) => captcha.verify(response).await?,
        }
    }

    log.append(&form).await?;
    info!("Contact message logged");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captcha::{CaptchaDisabled, RejectingCaptcha};

    fn form() -> ContactForm {
        ContactForm {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            text: "hello there".to_string(),
            captcha_response: None,
        }
    }

    fn guest_config() -> Config {
        let mut config = Config::default();
        config.captcha.for_guests = false;
        config.captcha.for_users = false;
        config
    }

    #[tokio::test]
    async fn test_contact_appends_record() {
        let dir = tempfile::tempdir().unwrap();
        let log = MessageLog::new(dir.path().join("messages.log"));
        let config = guest_config();

        contact(&CaptchaDisabled, &config, &log, form(), false)
            .await
            .unwrap();
        contact(&CaptchaDisabled, &config, &log, form(), false)
            .await
            .unwrap();

        let content = std::fs::read_to_string(dir.path().join("messages.log")).unwrap();
        assert_eq!(content.matches("Name: Ada").count(), 2);
        assert!(content.contains("Email: ada@example.com"));
        assert!(content.contains("hello there"));
    }

    #[tokio::test]
    async fn test_contact_counts_faults() {
        let dir = tempfile::tempdir().unwrap();
        let log = MessageLog::new(dir.path().join("messages.log"));
        let config = guest_config();

        let bad = ContactForm {
            name: String::new(),
            email: "not-an-email".to_string(),
            text: "hi".to_string(),
            captcha_response: None,
        };
        let result = contact(&CaptchaDisabled, &config, &log, bad, false).await;
        assert!(matches!(result, Err(DoormanError::Validation(2))));
        assert!(!dir.path().join("messages.log").exists());
    }

    #[tokio::test]
    async fn test_contact_all_blank() {
        let dir = tempfile::tempdir().unwrap();
        let log = MessageLog::new(dir.path().join("messages.log"));
        let config = guest_config();

        let blank = ContactForm {
            name: String::new(),
            email: String::new(),
            text: String::new(),
            captcha_response: None,
        };
        let result = contact(&CaptchaDisabled, &config, &log, blank, false).await;
        assert!(matches!(result, Err(DoormanError::Validation(3))));
    }

    #[tokio::test]
    async fn test_guest_captcha_gate() {
        let dir = tempfile::tempdir().unwrap();
        let log = MessageLog::new(dir.path().join("messages.log"));
        let mut config = guest_config();
        config.captcha.for_guests = true;

        // missing response is rejected before the verifier runs
        let result = contact(&CaptchaDisabled, &config, &log, form(), false).await;
        assert!(matches!(result, Err(DoormanError::CaptchaRejected)));

        // robot verdict from the verifier
        let mut with_response = form();
        with_response.captcha_response = Some("token".to_string());
        let result = contact(&RejectingCaptcha, &config, &log, with_response, false).await;
        assert!(matches!(result, Err(DoormanError::CaptchaRejected)));

        // authenticated users skip the guest gate
        contact(&RejectingCaptcha, &config, &log, form(), true)
            .await
            .unwrap();
    }
}
