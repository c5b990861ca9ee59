//! CAPTCHA verification seam for doorman.
//!
//! The core only consumes the success/failure contract; everything else
//! about the challenge is the third-party verifier's business. A robot
//! verdict and a transport failure are surfaced differently: the first
//! is user-actionable, the second says "retry later".

use serde::Deserialize;
use tracing::{error, warn};

use crate::config::CaptchaConfig;
use crate::{DoormanError, Result};

/// CAPTCHA verification seam.
#[allow(async_fn_in_trait)]
pub trait CaptchaVerifier {
    /// Check one response token. `Ok` means human.
    async fn verify(&self, response_token: &str) -> Result<()>;
}

/// Verifier used when CAPTCHA is switched off; always passes.
#[derive(Debug, Default, Clone, Copy)]
pub struct CaptchaDisabled;

impl CaptchaVerifier for CaptchaDisabled {
    async fn verify(&self, _response_token: &str) -> Result<()> {
        Ok(())
    }
}

/// Verifier that rejects everything; exercises robot paths in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectingCaptcha;

impl CaptchaVerifier for RejectingCaptcha {
    async fn verify(&self, _response_token: &str) -> Result<()> {
        Err(DoormanError::CaptchaRejected)
    }
}

#[derive(Deserialize)]
struct SiteVerifyResponse {
    success: bool,
}

/// Verifier calling the configured siteverify endpoint over HTTPS.
pub struct HttpCaptchaVerifier {
    client: reqwest::Client,
    config: CaptchaConfig,
}

impl HttpCaptchaVerifier {
    pub fn new(config: CaptchaConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

impl CaptchaVerifier for HttpCaptchaVerifier {
    async fn verify(&self, response_token: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.config.verify_url)
            .form(&[
                ("secret", self.config.secret.as_str()),
                ("response", response_token),
            ])
            .send()
            .await
            .map_err(|e| {
                error!("captcha verify request failed: {e}");
                DoormanError::ExternalService(e.to_string())
            })?;

        let body = response
            .text()
            .await
            .map_err(|e| DoormanError::ExternalService(e.to_string()))?;
        let verdict: SiteVerifyResponse = serde_json::from_str(&body)
            .map_err(|e| DoormanError::ExternalService(format!("bad verify response: {e}")))?;

        if verdict.success {
            Ok(())
        } else {
            warn!("captcha rejected a response token");
            Err(DoormanError::CaptchaRejected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_verifier_passes_anything() {
        assert!(CaptchaDisabled.verify("whatever").await.is_ok());
        assert!(CaptchaDisabled.verify("").await.is_ok());
    }

    #[tokio::test]
    async fn test_rejecting_verifier() {
        let result = RejectingCaptcha.verify("whatever").await;
        assert!(matches!(result, Err(DoormanError::CaptchaRejected)));
    }

    #[test]
    fn test_siteverify_response_parsing() {
        let ok: SiteVerifyResponse = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(ok.success);
        let no: SiteVerifyResponse =
            serde_json::from_str(r#"{"success": false, "error-codes": ["timeout-or-duplicate"]}"#)
                .unwrap();
        assert!(!no.success);
    }
}
