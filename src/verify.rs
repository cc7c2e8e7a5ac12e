//! Advisory bot verification against a reCAPTCHA-style `siteverify` endpoint.
//!
//! The outcome is only reported back in response headers; it never blocks a request.

use serde::Deserialize;
use std::fmt;

pub const TOKEN_HEADER: &str = "x-recaptcha-token";
pub const VERIFIED_HEADER: &str = "x-recaptcha-verified";
pub const SCORE_HEADER: &str = "x-recaptcha-score";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verification {
    Passed { score: Option<f64> },
    Failed { score: Option<f64> },
    Skipped,
}

impl Verification {
    pub fn score(&self) -> Option<f64> {
        match self {
            Verification::Passed { score } | Verification::Failed { score } => *score,
            Verification::Skipped => None,
        }
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verification::Passed { .. } => write!(f, "passed"),
            Verification::Failed { .. } => write!(f, "failed"),
            Verification::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Verifier {
    client: reqwest::Client,
    url: String,
    secret: String,
    threshold: f64,
}

impl Verifier {
    pub fn new(client: reqwest::Client, url: String, secret: String, threshold: f64) -> Self {
        Self {
            client,
            url,
            secret,
            threshold,
        }
    }

    // Secret goes in the form body; a request URL never carries it
    async fn siteverify(&self, token: &str, remote_ip: &str) -> Result<SiteVerifyResponse, reqwest::Error> {
        self.client
            .post(&self.url)
            .form(&[
                ("secret", self.secret.as_str()),
                ("response", token),
                ("remoteip", remote_ip),
            ])
            .send()
            .await?
            .json::<SiteVerifyResponse>()
            .await
    }

    pub async fn verify(&self, token: &str, remote_ip: &str) -> Verification {
        let body = match self.siteverify(token, remote_ip).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "verification request failed");
                return Verification::Failed { score: None };
            }
        };

        let passed = body.success && body.score.is_none_or(|s| s >= self.threshold);
        tracing::info!(
            success = body.success,
            score = ?body.score,
            errors = ?body.error_codes,
            passed,
            "verification result"
        );
        if passed {
            Verification::Passed { score: body.score }
        } else {
            Verification::Failed { score: body.score }
        }
    }
}
