use axum::body::Bytes;
use serde_json::Value;

use crate::error::UpstreamError;

pub const COMPLETIONS_PATH: &str = "/v1/chat/completions";

// Chat-completion API client. The key stays server-side.
#[derive(Debug, Clone)]
pub struct Upstream {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl Upstream {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: String) -> Self {
        Self {
            client,
            url: format!("{}{}", base_url.trim_end_matches('/'), COMPLETIONS_PATH),
            api_key,
        }
    }

    /// Forward the validated payload once and hand back the raw response body.
    pub async fn chat_completion(&self, payload: &Value) -> Result<Bytes, UpstreamError> {
        let res = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await?;

        let status = res.status();
        let body = res.bytes().await?;
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(body)
    }
}

// OpenAI errors look like {"error": {"message": "..."}}; fall back to the raw text
fn error_message(body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned())
}
