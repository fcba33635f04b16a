//! Human verification
//!
//! Browsers pass an hCaptcha response token in the `Sec-WebSocket-Protocol`
//! header of the upgrade request. The token is checked against the
//! siteverify endpoint before the socket is accepted.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::server::config::CaptchaConfig;

/// Verifies captcha tokens
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// Returns `Ok(false)` when the provider rejects the token and `Err`
    /// when the provider could not be asked.
    async fn verify(&self, token: &str, remote_ip: Option<IpAddr>) -> Result<bool>;
}

/// Build the verifier selected by configuration
pub fn verifier_from_config(config: &CaptchaConfig) -> Result<Arc<dyn CaptchaVerifier>> {
    if !config.enabled {
        return Ok(Arc::new(NoopVerifier));
    }
    let secret = config
        .secret
        .clone()
        .context("captcha secret is not configured")?;
    let verifier = HCaptchaVerifier::new(
        secret,
        config.verify_url.clone(),
        Duration::from_secs(config.timeout_secs),
    )?;
    Ok(Arc::new(verifier))
}

/// siteverify response body
#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

/// hCaptcha siteverify client
pub struct HCaptchaVerifier {
    client: reqwest::Client,
    secret: String,
    verify_url: String,
}

impl HCaptchaVerifier {
    /// Create a verifier
    pub fn new(secret: String, verify_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            secret,
            verify_url,
        })
    }
}

#[async_trait]
impl CaptchaVerifier for HCaptchaVerifier {
    async fn verify(&self, token: &str, remote_ip: Option<IpAddr>) -> Result<bool> {
        if token.trim().is_empty() {
            debug!("Empty captcha token");
            return Ok(false);
        }

        let mut form = vec![("response", token.to_string()), ("secret", self.secret.clone())];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip.to_string()));
        }

        let response: SiteVerifyResponse = self
            .client
            .post(&self.verify_url)
            .form(&form)
            .send()
            .await
            .context("error verifying hCaptcha")?
            .error_for_status()
            .context("hCaptcha endpoint returned an error status")?
            .json()
            .await
            .context("error decoding hCaptcha response")?;

        if !response.success {
            warn!(errors = ?response.error_codes, "hCaptcha verification failed");
        }
        Ok(response.success)
    }
}

/// Accepts every token (captcha disabled)
pub struct NoopVerifier;

#[async_trait]
impl CaptchaVerifier for NoopVerifier {
    async fn verify(&self, _token: &str, _remote_ip: Option<IpAddr>) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Form, Json, Router};
    use std::collections::HashMap;

    /// Local stand-in for the siteverify endpoint
    async fn spawn_siteverify() -> String {
        async fn siteverify(Form(form): Form<HashMap<String, String>>) -> Json<serde_json::Value> {
            let ok = form.get("response").map(String::as_str) == Some("good-token")
                && form.get("secret").map(String::as_str) == Some("test-secret");
            if ok {
                Json(serde_json::json!({"success": true}))
            } else {
                Json(serde_json::json!({"success": false, "error-codes": ["invalid-input-response"]}))
            }
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/siteverify", post(siteverify));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/siteverify", addr)
    }

    fn verifier(url: String) -> HCaptchaVerifier {
        HCaptchaVerifier::new("test-secret".to_string(), url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_accepts_valid_token() {
        let url = spawn_siteverify().await;
        assert!(verifier(url).verify("good-token", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_invalid_token() {
        let url = spawn_siteverify().await;
        let verifier = verifier(url);
        assert!(!verifier.verify("bad-token", None).await.unwrap());
        assert!(!verifier.verify("", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_error() {
        // Port 9 (discard) is closed on test machines
        let verifier = verifier("http://127.0.0.1:9/siteverify".to_string());
        assert!(verifier.verify("good-token", None).await.is_err());
    }

    #[test]
    fn test_config_selects_verifier() {
        let mut config = CaptchaConfig::default();
        assert!(verifier_from_config(&config).is_err());

        config.secret = Some("s".to_string());
        assert!(verifier_from_config(&config).is_ok());

        config.enabled = false;
        config.secret = None;
        assert!(verifier_from_config(&config).is_ok());
    }
}
